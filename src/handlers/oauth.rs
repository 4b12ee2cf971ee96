use crate::db::path::validate_key;
use crate::error::PinsyncError;
use crate::middleware::auth::RequireDashboardKey;
use crate::server::router::PinsyncState;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use time::Duration;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct PinterestCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

const CSRF_COOKIE: &str = "pinterest_oauth_state";
const UID_COOKIE: &str = "pinterest_oauth_uid";

/// GET /users/{uid}/authorize -> redirects to Pinterest's consent page.
pub async fn pinterest_oauth_entry(
    _guard: RequireDashboardKey,
    State(state): State<PinsyncState>,
    Path(uid): Path<String>,
    jar: PrivateCookieJar,
) -> Result<impl IntoResponse, PinsyncError> {
    validate_key(&uid)?;
    let (auth_url, csrf_token) = state.accounts.pinterest().authorize_url()?;

    let secure = !state.insecure_cookie;
    let jar = jar
        .add(build_cookie(CSRF_COOKIE, csrf_token.secret().to_string(), secure))
        .add(build_cookie(UID_COOKIE, uid.clone(), secure));

    info!(uid = %uid, "Dispatching Pinterest OAuth redirect");
    Ok((jar, Redirect::temporary(auth_url.as_str())))
}

/// GET /callback -> completes the connect flow for the user that started it.
pub async fn pinterest_oauth_callback(
    State(state): State<PinsyncState>,
    Query(query): Query<PinterestCallbackQuery>,
    jar: PrivateCookieJar,
) -> Response {
    if let Some(error) = query.error.as_deref() {
        let message = query
            .error_description
            .clone()
            .unwrap_or_else(|| format!("Pinterest authorization failed: {error}"));
        warn!(error, "Pinterest returned an authorization error");
        return respond_with_error(clear_oauth_cookies(jar), PinsyncError::OauthFlow(message));
    }

    let (Some(code), Some(state_param)) = (query.code.as_deref(), query.state.as_deref()) else {
        return respond_with_error(
            clear_oauth_cookies(jar),
            PinsyncError::OauthFlow("Invalid Pinterest callback URL".to_string()),
        );
    };

    let (csrf_cookie, uid, jar) = match load_oauth_session(jar) {
        Ok(data) => data,
        Err((jar, err)) => return respond_with_error(jar, err),
    };

    if !bool::from(state_param.as_bytes().ct_eq(csrf_cookie.as_bytes())) {
        return respond_with_error(
            jar,
            PinsyncError::OauthFlow("CSRF token mismatch".to_string()),
        );
    }

    match state.accounts.connect(&uid, code, None).await {
        Ok(account) => {
            info!(uid = %uid, account = %account.id, "OAuth callback stored account");
            (jar, Json(account)).into_response()
        }
        Err(err) => respond_with_error(jar, err),
    }
}

fn load_oauth_session(
    jar: PrivateCookieJar,
) -> Result<(String, String, PrivateCookieJar), (PrivateCookieJar, PinsyncError)> {
    let Some(csrf_cookie) = jar.get(CSRF_COOKIE).map(|c| c.value().to_owned()) else {
        return Err((
            clear_oauth_cookies(jar),
            PinsyncError::OauthFlow("Missing OAuth state in cookie".to_string()),
        ));
    };

    let Some(uid) = jar.get(UID_COOKIE).map(|c| c.value().to_owned()) else {
        return Err((
            clear_oauth_cookies(jar),
            PinsyncError::OauthFlow("Missing user in cookie".to_string()),
        ));
    };

    Ok((csrf_cookie, uid, clear_oauth_cookies(jar)))
}

fn clear_oauth_cookies(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(clear_cookie(CSRF_COOKIE))
        .remove(clear_cookie(UID_COOKIE))
}

fn build_cookie(name: &str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(15))
        .build()
}

fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn respond_with_error(jar: PrivateCookieJar, err: PinsyncError) -> Response {
    (jar, err.into_response()).into_response()
}
