use axum::Json;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{HeaderMap, StatusCode, request::Parts};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::sync::Arc;
use subtle::ConstantTimeEq;

pub const DASHBOARD_KEY_HEADER: &str = "x-pinsync-key";

/// Shared secret guarding the dashboard routes.
#[derive(Clone)]
pub struct DashboardKey(pub Arc<str>);

/// Ensure the inbound request carries the dashboard key.
/// Accepts either:
/// - Header: `x-pinsync-key: ...`
/// - Query string: `?key=...`
pub fn ensure_authorized(
    expected: &str,
    headers: &HeaderMap,
    query: Option<&str>,
) -> Result<(), Response> {
    let matches = |candidate: &str| bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()));

    if let Some(hv) = headers
        .get(DASHBOARD_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        && matches(hv)
    {
        return Ok(());
    }

    if let Some(qs) = query {
        for (k, v) in url::form_urlencoded::parse(qs.as_bytes()) {
            if k == "key" && matches(&v) {
                return Ok(());
            }
        }
    }

    Err((
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"code": "UNAUTHORIZED", "message": "invalid or missing dashboard key"}})),
    )
        .into_response())
}

/// Route guard for dashboard endpoints.
#[derive(Debug, Clone, Copy)]
pub struct RequireDashboardKey;

impl<S> FromRequestParts<S> for RequireDashboardKey
where
    S: Send + Sync,
    DashboardKey: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let DashboardKey(expected) = DashboardKey::from_ref(state);
        ensure_authorized(&expected, &parts.headers, parts.uri.query())?;
        Ok(Self)
    }
}
