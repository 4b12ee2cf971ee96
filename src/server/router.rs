use crate::config::BasicConfig;
use crate::handlers::{dashboard, oauth, pinterest};
use crate::middleware::auth::DashboardKey;
use crate::service::AccountService;

use axum::{Router, middleware};
use axum::extract::FromRef;
use axum::http::{Method, header};
use axum::routing::{get, post, put};
use axum_extra::extract::cookie::Key;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

#[derive(Clone)]
pub struct PinsyncState {
    pub accounts: AccountService,
    pub dashboard_key: Arc<str>,
    pub cookie_key: Key,
    pub insecure_cookie: bool,
}

impl PinsyncState {
    pub fn new(accounts: AccountService, basic: &BasicConfig) -> Self {
        let cookie_key = match basic.cookie_secret.as_deref() {
            Some(secret) if secret.len() >= 64 => Key::from(secret.as_bytes()),
            Some(_) => {
                warn!("cookie_secret shorter than 64 bytes; using a random cookie key");
                Key::generate()
            }
            None => Key::generate(),
        };
        Self {
            accounts,
            dashboard_key: Arc::from(basic.dashboard_key.as_str()),
            cookie_key,
            insecure_cookie: basic.insecure_cookie,
        }
    }
}

impl FromRef<PinsyncState> for Key {
    fn from_ref(state: &PinsyncState) -> Self {
        state.cookie_key.clone()
    }
}

impl FromRef<PinsyncState> for DashboardKey {
    fn from_ref(state: &PinsyncState) -> Self {
        DashboardKey(state.dashboard_key.clone())
    }
}

fn relay_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .max_age(Duration::from_secs(86400))
}

pub fn pinsync_router(state: PinsyncState) -> Router {
    let relay = Router::new()
        .route(
            "/pinterest",
            post(pinterest::exchange_code_handler)
                .get(pinterest::boards_handler)
                .fallback(pinterest::method_not_allowed),
        )
        .layer(relay_cors())
        .layer(middleware::from_fn(pinterest::preflight_no_content));

    let dashboard = Router::new()
        .route(
            "/users/{uid}/session",
            post(dashboard::initialize_session).delete(dashboard::cleanup_session),
        )
        .route("/users/{uid}/state", get(dashboard::state_snapshot))
        .route("/users/{uid}/events", get(dashboard::state_events))
        .route("/users/{uid}/selection", put(dashboard::select_account))
        .route(
            "/users/{uid}/accounts",
            get(dashboard::list_accounts).post(dashboard::add_account),
        )
        .route(
            "/users/{uid}/accounts/{account_id}",
            get(dashboard::get_account).delete(dashboard::remove_account),
        )
        .route(
            "/users/{uid}/accounts/{account_id}/refresh",
            post(dashboard::refresh_account_token),
        )
        .route(
            "/users/{uid}/accounts/{account_id}/boards/refresh",
            post(dashboard::refresh_boards),
        )
        .route(
            "/users/{uid}/boards/{account_id}",
            get(dashboard::get_boards).put(dashboard::set_boards),
        )
        .route(
            "/users/{uid}/pins",
            get(dashboard::list_pins).post(dashboard::save_pin),
        )
        .route(
            "/users/{uid}/pins/{pin_id}",
            axum::routing::delete(dashboard::remove_pin),
        )
        .route("/users/{uid}/authorize", get(oauth::pinterest_oauth_entry));

    Router::new()
        .merge(relay)
        .merge(dashboard)
        .route("/callback", get(oauth::pinterest_oauth_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
