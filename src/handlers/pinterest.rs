use crate::error::PinsyncError;
use crate::pinterest::types::RelayedUser;
use crate::server::router::PinsyncState;
use axum::{
    Json,
    body::Bytes,
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

/// POST /pinterest -> exchanges an authorization code for `{token, user}`.
/// An empty body reads as `{}`; the code is forwarded to Pinterest as given.
pub async fn exchange_code_handler(
    State(state): State<PinsyncState>,
    body: Bytes,
) -> Result<Json<RelayedUser>, PinsyncError> {
    let body = parse_exchange_body(&body)?;
    let relayed = state
        .accounts
        .pinterest()
        .relay_exchange(
            body.code.as_deref().unwrap_or_default(),
            body.redirect_uri.as_deref(),
        )
        .await?;
    info!("relay token exchange completed");
    Ok(Json(relayed))
}

fn parse_exchange_body(body: &[u8]) -> Result<ExchangeRequest, PinsyncError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| PinsyncError::RelayBody(e.to_string()))
}

/// GET /pinterest -> forwards the caller's boards from Pinterest.
pub async fn boards_handler(
    State(state): State<PinsyncState>,
    headers: HeaderMap,
) -> Result<Json<Value>, PinsyncError> {
    let token = bearer_token(&headers).ok_or(PinsyncError::MissingAccessToken)?;
    let boards = state.accounts.pinterest().boards_payload(token).await?;
    Ok(Json(boards))
}

/// Preflights are answered by the CORS layer; report them as 204.
pub async fn preflight_no_content(req: Request, next: Next) -> Response {
    let preflight = req.method() == Method::OPTIONS;
    let mut resp = next.run(req).await;
    if preflight && resp.status() == StatusCode::OK {
        *resp.status_mut() = StatusCode::NO_CONTENT;
    }
    resp
}

pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({"error": "Method not allowed"})),
    )
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
