use crate::db::path::validate_key;
use crate::error::PinsyncError;
use crate::middleware::auth::RequireDashboardKey;
use crate::pinterest::types::{PinterestAccount, PinterestBoard, ScheduledPin};
use crate::server::router::PinsyncState;
use crate::store::{AccountState, StoreEvent};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt, stream};
use oauth2::CsrfToken;
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionBody {
    #[serde(default)]
    pub account_id: Option<String>,
}

fn user_id(uid: &str) -> Result<&str, PinsyncError> {
    validate_key(uid)
}

/// POST /users/{uid}/session
pub async fn initialize_session(
    _guard: RequireDashboardKey,
    State(state): State<PinsyncState>,
    Path(uid): Path<String>,
) -> Result<Json<AccountState>, PinsyncError> {
    let snapshot = state.accounts.store().initialize(user_id(&uid)?).await?;
    Ok(Json(snapshot))
}

/// DELETE /users/{uid}/session
pub async fn cleanup_session(
    _guard: RequireDashboardKey,
    State(state): State<PinsyncState>,
    Path(uid): Path<String>,
) -> Result<Json<AccountState>, PinsyncError> {
    let snapshot = state.accounts.store().cleanup(user_id(&uid)?).await?;
    Ok(Json(snapshot))
}

pub async fn state_snapshot(
    _guard: RequireDashboardKey,
    State(state): State<PinsyncState>,
    Path(uid): Path<String>,
) -> Result<Json<AccountState>, PinsyncError> {
    let snapshot = state.accounts.store().snapshot(user_id(&uid)?).await?;
    Ok(Json(snapshot))
}

/// GET /users/{uid}/events -> current state, then every state change and notice.
pub async fn state_events(
    _guard: RequireDashboardKey,
    State(state): State<PinsyncState>,
    Path(uid): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, PinsyncError> {
    let uid = user_id(&uid)?;
    let store = state.accounts.store();
    // Subscribe before snapshotting so nothing between the two is lost.
    let rx = store.listen(uid).await?;
    let current = store.snapshot(uid).await?;
    debug!(uid, "store event stream opened");

    let updates = BroadcastStream::new(rx).filter_map(|item| async move {
        match item {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(error = %e, "store event stream lagged");
                None
            }
        }
    });
    let events = stream::once(async move { StoreEvent::State(current) })
        .chain(updates)
        .map(|event| Ok(to_sse(&event)));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &StoreEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

pub async fn select_account(
    _guard: RequireDashboardKey,
    State(state): State<PinsyncState>,
    Path(uid): Path<String>,
    Json(body): Json<SelectionBody>,
) -> Result<Json<AccountState>, PinsyncError> {
    let snapshot = state
        .accounts
        .store()
        .select_account(user_id(&uid)?, body.account_id)
        .await?;
    Ok(Json(snapshot))
}

pub async fn list_accounts(
    _guard: RequireDashboardKey,
    State(state): State<PinsyncState>,
    Path(uid): Path<String>,
) -> Result<Json<Vec<PinterestAccount>>, PinsyncError> {
    let accounts = state.accounts.storage().accounts.get_all(user_id(&uid)?).await?;
    Ok(Json(accounts))
}

pub async fn add_account(
    _guard: RequireDashboardKey,
    State(state): State<PinsyncState>,
    Path(uid): Path<String>,
    Json(account): Json<PinterestAccount>,
) -> Result<(StatusCode, Json<AccountState>), PinsyncError> {
    validate_key(&account.id)?;
    let snapshot = state
        .accounts
        .store()
        .add_account(user_id(&uid)?, account)
        .await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

pub async fn get_account(
    _guard: RequireDashboardKey,
    State(state): State<PinsyncState>,
    Path((uid, account_id)): Path<(String, String)>,
) -> Result<Json<PinterestAccount>, PinsyncError> {
    let account = state
        .accounts
        .store()
        .get_account(user_id(&uid)?, account_id)
        .await?;
    Ok(Json(account))
}

pub async fn remove_account(
    _guard: RequireDashboardKey,
    State(state): State<PinsyncState>,
    Path((uid, account_id)): Path<(String, String)>,
) -> Result<Json<AccountState>, PinsyncError> {
    let snapshot = state
        .accounts
        .store()
        .remove_account(user_id(&uid)?, account_id)
        .await?;
    Ok(Json(snapshot))
}

pub async fn refresh_account_token(
    _guard: RequireDashboardKey,
    State(state): State<PinsyncState>,
    Path((uid, account_id)): Path<(String, String)>,
) -> Result<Json<PinterestAccount>, PinsyncError> {
    let account = state
        .accounts
        .refresh_token(user_id(&uid)?, &account_id)
        .await?;
    Ok(Json(account))
}

pub async fn refresh_boards(
    _guard: RequireDashboardKey,
    State(state): State<PinsyncState>,
    Path((uid, account_id)): Path<(String, String)>,
) -> Result<Json<Vec<PinterestBoard>>, PinsyncError> {
    let boards = state
        .accounts
        .refresh_boards(user_id(&uid)?, &account_id)
        .await?;
    Ok(Json(boards))
}

pub async fn get_boards(
    _guard: RequireDashboardKey,
    State(state): State<PinsyncState>,
    Path((uid, account_id)): Path<(String, String)>,
) -> Result<Json<Vec<PinterestBoard>>, PinsyncError> {
    let boards = state
        .accounts
        .storage()
        .boards
        .get(user_id(&uid)?, &account_id)
        .await?;
    Ok(Json(boards))
}

pub async fn set_boards(
    _guard: RequireDashboardKey,
    State(state): State<PinsyncState>,
    Path((uid, account_id)): Path<(String, String)>,
    Json(boards): Json<Vec<PinterestBoard>>,
) -> Result<Json<AccountState>, PinsyncError> {
    validate_key(&account_id)?;
    let snapshot = state
        .accounts
        .store()
        .set_boards(user_id(&uid)?, account_id, boards)
        .await?;
    Ok(Json(snapshot))
}

pub async fn list_pins(
    _guard: RequireDashboardKey,
    State(state): State<PinsyncState>,
    Path(uid): Path<String>,
) -> Result<Json<Vec<ScheduledPin>>, PinsyncError> {
    let pins = state.accounts.storage().pins.get_all(user_id(&uid)?).await?;
    Ok(Json(pins))
}

/// POST /users/{uid}/pins -> stores a scheduled pin, assigning an id when absent.
pub async fn save_pin(
    _guard: RequireDashboardKey,
    State(state): State<PinsyncState>,
    Path(uid): Path<String>,
    Json(mut pin): Json<ScheduledPin>,
) -> Result<(StatusCode, Json<ScheduledPin>), PinsyncError> {
    if pin.id.is_empty() {
        pin.id = CsrfToken::new_random_len(12).secret().clone();
    }
    state.accounts.storage().pins.save(user_id(&uid)?, &pin).await?;
    Ok((StatusCode::CREATED, Json(pin)))
}

pub async fn remove_pin(
    _guard: RequireDashboardKey,
    State(state): State<PinsyncState>,
    Path((uid, pin_id)): Path<(String, String)>,
) -> Result<StatusCode, PinsyncError> {
    state
        .accounts
        .storage()
        .pins
        .remove(user_id(&uid)?, &pin_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
