use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use url::Url;

pub const PINTEREST_API_URL: &str = "https://api.pinterest.com/v5";
pub const PINTEREST_OAUTH_URL: &str = "https://www.pinterest.com/oauth";

pub const PINTEREST_SCOPES: [&str; 5] = [
    "boards:read",
    "pins:read",
    "pins:write",
    "user_accounts:read",
    "boards:write",
];

/// Global configuration, resolved once from defaults, `config.toml` and
/// `PINSYNC_*` environment variables (`__` separates nested keys).
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::load().unwrap_or_else(|e| panic!("FATAL: invalid configuration: {e}"))
});

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub basic: BasicConfig,
    #[serde(default)]
    pub pinterest: PinterestConfig,
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("PINSYNC_").split("__"))
            .extract()
    }

    pub fn pinterest(&self) -> &PinterestConfig {
        &self.pinterest
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub database_url: String,
    pub loglevel: String,
    /// Shared key guarding the dashboard routes.
    pub dashboard_key: String,
    /// Master key for private cookies; at least 64 bytes. Random when unset.
    pub cookie_secret: Option<String>,
    pub insecure_cookie: bool,
    /// Local key/value file holding persisted UI selection.
    pub state_path: PathBuf,
    pub proxy: Option<Url>,
    pub enable_multiplexing: bool,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite://pinsync.sqlite".to_string(),
            loglevel: "info".to_string(),
            dashboard_key: "pinsync".to_string(),
            cookie_secret: None,
            insecure_cookie: false,
            state_path: PathBuf::from("pinsync-state.json"),
            proxy: None,
            enable_multiplexing: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinterestConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub api_url: Url,
    pub oauth_url: Url,
    pub scopes: Vec<String>,
}

impl Default for PinterestConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            api_url: Url::parse(PINTEREST_API_URL).expect("valid default Pinterest API url"),
            oauth_url: Url::parse(PINTEREST_OAUTH_URL).expect("valid default Pinterest OAuth url"),
            scopes: PINTEREST_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PinterestConfig {
    /// Joins `path` onto the API base without dropping its `/v5` segment.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn scope_param(&self) -> String {
        self.scopes.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_version_segment() {
        let cfg = PinterestConfig::default();
        assert_eq!(
            cfg.endpoint("/oauth/token"),
            "https://api.pinterest.com/v5/oauth/token"
        );
        assert_eq!(
            cfg.endpoint("boards"),
            "https://api.pinterest.com/v5/boards"
        );
    }

    #[test]
    fn default_scopes_are_comma_joined() {
        let cfg = PinterestConfig::default();
        assert_eq!(
            cfg.scope_param(),
            "boards:read,pins:read,pins:write,user_accounts:read,boards:write"
        );
    }
}
