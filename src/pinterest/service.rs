use super::endpoints::{ClientCredentials, PinterestEndpoints};
use super::types::{ConnectedUser, PinterestAccount, PinterestBoard, PinterestToken, RelayedUser};
use crate::config::{BasicConfig, PinterestConfig};
use crate::error::PinsyncError;

use chrono::Utc;
use oauth2::CsrfToken;
use reqwest::header::{CONNECTION, HeaderMap, HeaderValue};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Service layer composing the Pinterest OAuth relay and API calls.
#[derive(Clone)]
pub struct PinterestService {
    cfg: Arc<PinterestConfig>,
    client: reqwest::Client,
}

impl PinterestService {
    /// Create a new service with a preconfigured HTTP client.
    pub fn new(basic: &BasicConfig, cfg: PinterestConfig) -> Result<Self, PinsyncError> {
        let mut headers = HeaderMap::new();
        let mut builder = reqwest::Client::builder()
            .user_agent("pinsync/1.0".to_string())
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15));
        if let Some(proxy_url) = basic.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }
        if !basic.enable_multiplexing {
            headers.insert(CONNECTION, HeaderValue::from_static("close"));
            builder = builder
                .http1_only()
                .pool_max_idle_per_host(0)
                .pool_idle_timeout(Duration::from_secs(0));
        } else {
            builder = builder.http2_adaptive_window(true);
        }
        let client = builder.default_headers(headers).build()?;
        Ok(Self {
            cfg: Arc::new(cfg),
            client,
        })
    }

    pub fn authorize_url(&self) -> Result<(Url, CsrfToken), PinsyncError> {
        let creds = ClientCredentials::validate(&self.cfg, None)?;
        PinterestEndpoints::build_authorize_url(&self.cfg, &creds)
    }

    /// Exchange an authorization code for a token, then fetch the profile
    /// the token belongs to. Both payloads are kept as Pinterest sent them
    /// and the first upstream failure is returned as is.
    pub async fn relay_exchange(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> Result<RelayedUser, PinsyncError> {
        let creds = ClientCredentials::validate(&self.cfg, redirect_uri)?;
        let token =
            PinterestEndpoints::exchange_authorization_code(&self.cfg, &creds, code, &self.client)
                .await?;
        let access_token = token
            .get("access_token")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let user = PinterestEndpoints::fetch_user_account(&self.cfg, access_token, &self.client)
            .await?;
        info!(
            username = user.get("username").and_then(serde_json::Value::as_str).unwrap_or("<unknown>"),
            "Pinterest user resolved"
        );
        Ok(RelayedUser { token, user })
    }

    /// Typed variant of [`Self::relay_exchange`] used by the connect flow.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> Result<ConnectedUser, PinsyncError> {
        let relayed = self.relay_exchange(code, redirect_uri).await?;
        Ok(ConnectedUser::try_from(relayed)?)
    }

    /// Raw upstream boards payload, forwarded by the relay.
    pub async fn boards_payload(&self, access_token: &str) -> Result<Value, PinsyncError> {
        PinterestEndpoints::fetch_boards(&self.cfg, access_token, &self.client).await
    }

    pub async fn list_boards(&self, access_token: &str) -> Result<Vec<PinterestBoard>, PinsyncError> {
        let mut payload = self.boards_payload(access_token).await?;
        match payload.get_mut("items").map(Value::take) {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(items) => Ok(serde_json::from_value(items)?),
        }
    }

    /// Refresh the account's access token in place.
    pub async fn refresh_account(&self, account: &mut PinterestAccount) -> Result<(), PinsyncError> {
        if account.token.refresh_token.is_empty() {
            return Err(PinsyncError::OauthFlow(format!(
                "account {} has no refresh token",
                account.id
            )));
        }
        let creds = ClientCredentials::validate(&self.cfg, None)?;
        let fresh: PinterestToken = PinterestEndpoints::refresh_access_token(
            &self.cfg,
            &creds,
            &account.token.refresh_token,
            &self.client,
        )
        .await?;
        let previous_refresh = std::mem::take(&mut account.token.refresh_token);
        account.token = fresh;
        if account.token.refresh_token.is_empty() {
            account.token.refresh_token = previous_refresh;
        }
        account.last_refreshed = Utc::now().timestamp_millis();
        info!(account = %account.id, "Pinterest account token refreshed");
        Ok(())
    }
}
