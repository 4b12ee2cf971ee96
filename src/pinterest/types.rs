use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Pinterest sends `null` for unset optional fields; read those as the default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PinterestToken {
    pub access_token: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub refresh_token: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expires_in: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub token_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scope: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PinterestUser {
    pub username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub account_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub profile_image: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub website_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PinterestBoard {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub privacy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_thumbnail_url: Option<String>,
}

/// A connected Pinterest account. `id` is the Pinterest username.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinterestAccount {
    #[serde(default)]
    pub id: String,
    pub user: PinterestUser,
    pub token: PinterestToken,
    /// Epoch millis of the last token exchange or refresh.
    pub last_refreshed: i64,
}

impl PinterestAccount {
    pub fn connected(user: PinterestUser, token: PinterestToken) -> Self {
        Self {
            id: user.username.clone(),
            user,
            token,
            last_refreshed: Utc::now().timestamp_millis(),
        }
    }
}

/// Result of a successful code exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedUser {
    pub token: PinterestToken,
    pub user: PinterestUser,
}

/// Code-exchange result exactly as Pinterest returned it.
#[derive(Debug, Clone, Serialize)]
pub struct RelayedUser {
    pub token: Value,
    pub user: Value,
}

impl TryFrom<RelayedUser> for ConnectedUser {
    type Error = serde_json::Error;

    fn try_from(relayed: RelayedUser) -> Result<Self, Self::Error> {
        Ok(Self {
            token: serde_json::from_value(relayed.token)?,
            user: serde_json::from_value(relayed.user)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinStatus {
    Scheduled,
    Published,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinData {
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub link: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledPin {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    pub board_id: String,
    pub account_id: String,
    #[serde(flatten)]
    pub pin: PinData,
    pub scheduled_time: DateTime<Utc>,
    pub status: PinStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinterest_id: Option<String>,
}
