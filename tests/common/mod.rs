#![allow(dead_code)]

use axum::{
    Form, Json, Router,
    body::{Body, to_bytes},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use pinsync::config::{BasicConfig, PinterestConfig};
use pinsync::db::RealtimeDb;
use pinsync::server::{PinsyncState, pinsync_router};
use pinsync::storage::Storage;
use pinsync::store::LocalStorage;
use pinsync::{AccountService, PinterestService};
use serde_json::{Value, json};
use std::collections::HashMap;
use tokio::net::TcpListener;
use url::Url;

pub const DASHBOARD_KEY: &str = "pwd";
pub const GOOD_CODE: &str = "good-code";
// base64("client:secret")
const CLIENT_BASIC: &str = "Basic Y2xpZW50OnNlY3JldA==";

fn upstream_error(status: StatusCode, code: u32, message: &str) -> Response {
    (status, Json(json!({"code": code, "message": message}))).into_response()
}

fn bearer_ok(headers: &HeaderMap) -> bool {
    matches!(
        headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
        Some("Bearer access-1" | "Bearer access-2")
    )
}

async fn fake_token(headers: HeaderMap, Form(form): Form<HashMap<String, String>>) -> Response {
    if headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some(CLIENT_BASIC) {
        return upstream_error(StatusCode::UNAUTHORIZED, 1, "Invalid client credentials");
    }
    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") if form.get("code").map(String::as_str) == Some(GOOD_CODE) => {
            Json(json!({
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "expires_in": 2592000,
                "refresh_token_expires_in": 31536000,
                "token_type": "bearer",
                "scope": "boards:read,pins:read"
            }))
            .into_response()
        }
        Some("refresh_token") if form.get("refresh_token").map(String::as_str) == Some("refresh-1") => {
            Json(json!({
                "access_token": "access-2",
                "expires_in": 2592000,
                "token_type": "bearer",
                "scope": "boards:read,pins:read"
            }))
            .into_response()
        }
        _ => upstream_error(StatusCode::BAD_REQUEST, 283, "Invalid authorization code"),
    }
}

async fn fake_user_account(headers: HeaderMap) -> Response {
    if !bearer_ok(&headers) {
        return upstream_error(StatusCode::UNAUTHORIZED, 2, "Authentication failed.");
    }
    Json(json!({
        "id": "549755885175",
        "username": "alice",
        "account_type": "BUSINESS",
        "business_name": "Alice Bakes",
        "profile_image": "https://i.pinimg.com/alice.jpg",
        "website_url": null
    }))
    .into_response()
}

async fn fake_boards(headers: HeaderMap) -> Response {
    if !bearer_ok(&headers) {
        return upstream_error(StatusCode::UNAUTHORIZED, 2, "Authentication failed.");
    }
    Json(json!({
        "items": [
            {"id": "b1", "name": "Recipes", "description": "Food", "privacy": "PUBLIC"},
            {"id": "b2", "name": "Travel", "description": null, "privacy": "SECRET", "image_thumbnail_url": null}
        ],
        "bookmark": null
    }))
    .into_response()
}

/// Serves a minimal Pinterest API on a random local port and returns its
/// `/v5` base URL.
pub async fn spawn_fake_pinterest() -> Url {
    let app = Router::new()
        .route("/v5/oauth/token", post(fake_token))
        .route("/v5/user_account", get(fake_user_account))
        .route("/v5/boards", get(fake_boards));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/v5")).unwrap()
}

/// A base URL nothing listens on.
pub async fn unreachable_api() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}/v5")).unwrap()
}

pub fn pinterest_config(api_url: Url) -> PinterestConfig {
    PinterestConfig {
        client_id: Some("client".to_string()),
        client_secret: Some("secret".to_string()),
        redirect_uri: Some("http://localhost:8000/callback".to_string()),
        api_url,
        ..PinterestConfig::default()
    }
}

pub struct TestApp {
    pub router: Router,
    pub accounts: AccountService,
}

pub async fn build_app(pinterest_cfg: PinterestConfig) -> TestApp {
    let basic = BasicConfig {
        dashboard_key: DASHBOARD_KEY.to_string(),
        insecure_cookie: true,
        ..BasicConfig::default()
    };
    let db = RealtimeDb::connect("sqlite::memory:").await.unwrap();
    let storage = Storage::new(db);
    let store = pinsync::store::spawn(storage.clone(), LocalStorage::in_memory())
        .await
        .unwrap();
    let pinterest = PinterestService::new(&basic, pinterest_cfg).unwrap();
    let accounts = AccountService::new(pinterest, storage, store);
    let router = pinsync_router(PinsyncState::new(accounts.clone(), &basic));
    TestApp { router, accounts }
}

pub async fn json_body(resp: Response<Body>) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
