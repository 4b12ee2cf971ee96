use crate::config::PinterestConfig;
use crate::error::{PinsyncError, UpstreamError};
use crate::pinterest::types::PinterestToken;

use oauth2::{AuthUrl, ClientId, CsrfToken, RedirectUrl, basic::BasicClient};
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::{error, info};
use url::Url;

/// Client credentials checked before any call to the token endpoint.
#[derive(Debug, Clone)]
pub struct ClientCredentials<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub redirect_uri: &'a str,
}

impl<'a> ClientCredentials<'a> {
    pub fn validate(
        cfg: &'a PinterestConfig,
        redirect_override: Option<&'a str>,
    ) -> Result<Self, PinsyncError> {
        let client_id = non_empty(cfg.client_id.as_deref())
            .ok_or(PinsyncError::MissingConfig("Pinterest client ID is required"))?;
        let client_secret = non_empty(cfg.client_secret.as_deref())
            .ok_or(PinsyncError::MissingConfig("Pinterest client secret is required"))?;
        let redirect_uri = non_empty(redirect_override)
            .or_else(|| non_empty(cfg.redirect_uri.as_deref()))
            .ok_or(PinsyncError::MissingConfig("Pinterest redirect URI is required"))?;
        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
        })
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.is_empty())
}

/// Stateless Pinterest endpoints.
pub(crate) struct PinterestEndpoints;

impl PinterestEndpoints {
    /// Consent page URL with a fresh CSRF state. Pinterest expects
    /// comma-separated scopes, so the scope is passed as a raw parameter.
    pub(crate) fn build_authorize_url(
        cfg: &PinterestConfig,
        creds: &ClientCredentials<'_>,
    ) -> Result<(Url, CsrfToken), PinsyncError> {
        let auth_url = format!("{}/", cfg.oauth_url.as_str().trim_end_matches('/'));
        let client = BasicClient::new(ClientId::new(creds.client_id.to_string()))
            .set_auth_uri(AuthUrl::new(auth_url)?)
            .set_redirect_uri(RedirectUrl::new(creds.redirect_uri.to_string())?);
        let (url, csrf) = client
            .authorize_url(CsrfToken::new_random)
            .add_extra_param("scope", cfg.scope_param())
            .url();
        Ok((url, csrf))
    }

    pub(crate) async fn exchange_authorization_code(
        cfg: &PinterestConfig,
        creds: &ClientCredentials<'_>,
        code: &str,
        http_client: &reqwest::Client,
    ) -> Result<Value, PinsyncError> {
        let req = http_client
            .post(cfg.endpoint("/oauth/token"))
            .basic_auth(creds.client_id, Some(creds.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", creds.redirect_uri),
            ]);
        let payload = send_json(req, "/oauth/token", PinsyncError::PinterestAuth).await?;
        info!("Pinterest authorization code exchanged");
        Ok(payload)
    }

    pub(crate) async fn refresh_access_token(
        cfg: &PinterestConfig,
        creds: &ClientCredentials<'_>,
        refresh_token: &str,
        http_client: &reqwest::Client,
    ) -> Result<PinterestToken, PinsyncError> {
        let req = http_client
            .post(cfg.endpoint("/oauth/token"))
            .basic_auth(creds.client_id, Some(creds.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ]);
        let payload = send_json(req, "/oauth/token", PinsyncError::PinterestAuth).await?;
        info!("Pinterest access token refreshed");
        Ok(serde_json::from_value(payload)?)
    }

    pub(crate) async fn fetch_user_account(
        cfg: &PinterestConfig,
        access_token: &str,
        http_client: &reqwest::Client,
    ) -> Result<Value, PinsyncError> {
        let req = http_client
            .get(cfg.endpoint("/user_account"))
            .bearer_auth(access_token);
        send_json(req, "/user_account", PinsyncError::PinterestAuth).await
    }

    /// Raw `/boards` page as returned by Pinterest.
    pub(crate) async fn fetch_boards(
        cfg: &PinterestConfig,
        access_token: &str,
        http_client: &reqwest::Client,
    ) -> Result<Value, PinsyncError> {
        let req = http_client
            .get(cfg.endpoint("/boards"))
            .bearer_auth(access_token);
        send_json(req, "/boards", PinsyncError::PinterestApi).await
    }
}

/// Sends the request and decodes a JSON body. Non-2xx answers are turned into
/// an [`UpstreamError`] carrying the upstream status and body.
async fn send_json(
    req: reqwest::RequestBuilder,
    endpoint: &str,
    fail: fn(UpstreamError) -> PinsyncError,
) -> Result<Value, PinsyncError> {
    let resp = req
        .header(ACCEPT, "application/json")
        .send()
        .await
        .inspect_err(|e| error!(endpoint, error = %e, "Pinterest API network error"))?;

    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json::<Value>().await?);
    }

    let bytes = resp.bytes().await?;
    let body = serde_json::from_slice::<Value>(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    error!(endpoint, status = status.as_u16(), error = %body, "Pinterest API error");
    Err(fail(UpstreamError::from_body(status.as_u16(), body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> PinterestConfig {
        PinterestConfig {
            client_id: Some("client-1".into()),
            client_secret: Some("s3cret".into()),
            redirect_uri: Some("https://dash.example/callback".into()),
            ..PinterestConfig::default()
        }
    }

    #[test]
    fn validate_reports_first_missing_field() {
        let cfg = PinterestConfig::default();
        let err = ClientCredentials::validate(&cfg, None).unwrap_err();
        assert_eq!(err.to_string(), "Pinterest client ID is required");

        let cfg = PinterestConfig {
            client_id: Some("id".into()),
            ..PinterestConfig::default()
        };
        let err = ClientCredentials::validate(&cfg, None).unwrap_err();
        assert_eq!(err.to_string(), "Pinterest client secret is required");

        let cfg = PinterestConfig {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            ..PinterestConfig::default()
        };
        let err = ClientCredentials::validate(&cfg, None).unwrap_err();
        assert_eq!(err.to_string(), "Pinterest redirect URI is required");
    }

    #[test]
    fn redirect_override_wins() {
        let cfg = configured();
        let creds = ClientCredentials::validate(&cfg, Some("http://localhost/cb")).unwrap();
        assert_eq!(creds.redirect_uri, "http://localhost/cb");
        let creds = ClientCredentials::validate(&cfg, Some("")).unwrap();
        assert_eq!(creds.redirect_uri, "https://dash.example/callback");
    }

    #[test]
    fn authorize_url_carries_code_flow_params() {
        let cfg = configured();
        let creds = ClientCredentials::validate(&cfg, None).unwrap();
        let (url, csrf) = PinterestEndpoints::build_authorize_url(&cfg, &creds).unwrap();

        assert!(url.as_str().starts_with("https://www.pinterest.com/oauth/?"));
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "client-1");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["redirect_uri"], "https://dash.example/callback");
        assert_eq!(params["scope"], cfg.scope_param());
        assert_eq!(&params["state"], csrf.secret());
    }
}
