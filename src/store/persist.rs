use crate::error::PinsyncError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::warn;

pub const SELECTION_KEY: &str = "pinterest-accounts";
pub const SELECTION_VERSION: u32 = 1;

/// Small JSON key/value file, the server-side stand-in for browser local
/// storage. The whole file is rewritten on every `set`.
pub struct LocalStorage {
    path: Option<PathBuf>,
    entries: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSelection {
    state: SelectionSlice,
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectionSlice {
    selected_account_id: Option<String>,
}

impl LocalStorage {
    /// Load from `path`; a missing or unreadable file starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "local state unreadable; starting empty");
                Map::new()
            }),
            Err(_) => Map::new(),
        };
        Self {
            path: Some(path),
            entries,
        }
    }

    /// Not backed by a file.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Map::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub async fn set(&mut self, key: &str, value: Value) -> Result<(), PinsyncError> {
        self.entries.insert(key.to_string(), value);
        self.flush().await
    }

    /// Persisted selection for `uid`; entries of another version are ignored.
    pub fn selection(&self, uid: &str) -> Option<String> {
        let entry = self.get(SELECTION_KEY)?.get(uid)?.clone();
        let persisted: PersistedSelection = serde_json::from_value(entry).ok()?;
        (persisted.version == SELECTION_VERSION)
            .then_some(persisted.state.selected_account_id)
            .flatten()
    }

    pub async fn save_selection(
        &mut self,
        uid: &str,
        selected_account_id: Option<&str>,
    ) -> Result<(), PinsyncError> {
        let persisted = PersistedSelection {
            state: SelectionSlice {
                selected_account_id: selected_account_id.map(str::to_string),
            },
            version: SELECTION_VERSION,
        };
        let mut users = match self.entries.remove(SELECTION_KEY) {
            Some(Value::Object(users)) => users,
            _ => Map::new(),
        };
        users.insert(uid.to_string(), serde_json::to_value(persisted)?);
        self.set(SELECTION_KEY, Value::Object(users)).await
    }

    async fn flush(&self) -> Result<(), PinsyncError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(&self.entries)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "pinsync-local-{}-{}.json",
            std::process::id(),
            nanos
        ))
    }

    #[tokio::test]
    async fn selection_survives_reopen() {
        let path = temp_file();
        let mut local = LocalStorage::open(&path).await;
        assert_eq!(local.selection("u1"), None);

        local.save_selection("u1", Some("alice")).await.unwrap();
        local.save_selection("u2", None).await.unwrap();

        let reopened = LocalStorage::open(&path).await;
        assert_eq!(reopened.selection("u1").as_deref(), Some("alice"));
        assert_eq!(reopened.selection("u2"), None);
        assert_eq!(
            reopened.get(SELECTION_KEY).unwrap()["u1"],
            json!({"state": {"selectedAccountId": "alice"}, "version": 1})
        );

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn other_versions_are_ignored() {
        let mut local = LocalStorage::in_memory();
        local
            .set(
                SELECTION_KEY,
                json!({"u1": {"state": {"selectedAccountId": "alice"}, "version": 0}}),
            )
            .await
            .unwrap();
        assert_eq!(local.selection("u1"), None);
    }
}
