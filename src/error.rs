use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum PinsyncError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Failed to connect to Pinterest API: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    /// Token exchange or profile fetch rejected upstream.
    #[error("Pinterest auth error: {}", .0.message)]
    PinterestAuth(UpstreamError),

    /// Any other Pinterest API call rejected upstream.
    #[error("Pinterest API error: {}", .0.message)]
    PinterestApi(UpstreamError),

    #[error("{0}")]
    MissingConfig(&'static str),

    /// Relay request body that is not valid JSON.
    #[error("{0}")]
    RelayBody(String),

    #[error("No access token provided")]
    MissingAccessToken,

    #[error("OAuth flow error: {0}")]
    OauthFlow(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid database path: {0}")]
    InvalidPath(String),

    #[error("Invalid account selection: {0}")]
    InvalidSelection(String),

    #[error("Ractor error: {0}")]
    RactorError(String),
}

/// Error payload forwarded from a failed Pinterest call.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamError {
    #[serde(skip)]
    pub status: u16,
    pub message: String,
    pub code: Value,
    pub details: Value,
}

impl UpstreamError {
    /// Builds the forwarded payload, preferring the upstream `message` and
    /// `code` and falling back to a generic message and the numeric status.
    /// A present, truthy upstream `code` is forwarded with its JSON type.
    pub fn from_body(status: u16, body: Value) -> Self {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or("Pinterest API request failed")
            .to_string();
        let code = match body.get("code") {
            Some(code) if is_truthy(code) => code.clone(),
            _ => Value::String(status.to_string()),
        };
        Self {
            status,
            message,
            code,
            details: body,
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl PinsyncError {
    /// Short machine code used in dashboard error bodies and notices.
    pub fn code(&self) -> &'static str {
        match self {
            PinsyncError::PinterestAuth(_) | PinsyncError::OauthFlow(_) => "AUTH_ERROR",
            PinsyncError::PinterestApi(_) => "API_ERROR",
            PinsyncError::Network(_) => "NETWORK_ERROR",
            PinsyncError::InvalidPath(_) | PinsyncError::InvalidSelection(_) => {
                "VALIDATION_ERROR"
            }
            PinsyncError::NotFound(_) => "NOT_FOUND",
            PinsyncError::MissingAccessToken => "UNAUTHORIZED",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for PinsyncError {
    fn into_response(self) -> axum::response::Response {
        match self {
            PinsyncError::PinterestAuth(upstream) | PinsyncError::PinterestApi(upstream) => {
                let status =
                    StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
                (status, Json(upstream)).into_response()
            }
            PinsyncError::Network(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "message": "Failed to connect to Pinterest API",
                    "code": "NETWORK_ERROR",
                    "details": e.to_string(),
                })),
            )
                .into_response(),
            PinsyncError::MissingConfig(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": msg })),
            )
                .into_response(),
            PinsyncError::RelayBody(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": msg })),
            )
                .into_response(),
            PinsyncError::MissingAccessToken => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "No access token provided" })),
            )
                .into_response(),
            other => {
                let status = match &other {
                    PinsyncError::NotFound(_) => StatusCode::NOT_FOUND,
                    PinsyncError::OauthFlow(_)
                    | PinsyncError::InvalidPath(_)
                    | PinsyncError::InvalidSelection(_)
                    | PinsyncError::Json(_)
                    | PinsyncError::UrlParse(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let message = match status {
                    StatusCode::INTERNAL_SERVER_ERROR => {
                        "An internal server error occurred.".to_string()
                    }
                    _ => other.to_string(),
                };
                let body = ApiErrorResponse {
                    error: ApiErrorBody {
                        code: other.code().to_string(),
                        message,
                    },
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_prefers_upstream_fields() {
        let err = UpstreamError::from_body(
            400,
            json!({"code": 283, "message": "Invalid authorization code"}),
        );
        assert_eq!(err.message, "Invalid authorization code");
        assert_eq!(err.code, 283);
        assert_eq!(err.details["code"], 283);
    }

    #[test]
    fn upstream_error_falls_back_to_status() {
        let err = UpstreamError::from_body(503, Value::Null);
        assert_eq!(err.message, "Pinterest API request failed");
        assert_eq!(err.code, "503");

        let err = UpstreamError::from_body(400, json!({"code": 0, "message": ""}));
        assert_eq!(err.code, "400");
        assert_eq!(err.message, "Pinterest API request failed");
    }

    #[test]
    fn forwarded_status_is_preserved() {
        let resp = PinsyncError::PinterestAuth(UpstreamError::from_body(401, json!({})))
            .into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn internal_errors_hide_details() {
        let resp = PinsyncError::RactorError("mailbox closed".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
