use crate::db::path;
use crate::db::schema::SQLITE_INIT;
use crate::db::subscription::Subscription;
use crate::error::PinsyncError;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tokio::sync::broadcast;
use tracing::debug;

pub type SqlitePool = Pool<Sqlite>;

const CHANGE_BUFFER: usize = 256;

/// Realtime database handle. Cheap to clone; all clones share the pool and
/// the change feed.
#[derive(Clone)]
pub struct RealtimeDb {
    pool: SqlitePool,
    changes: broadcast::Sender<String>,
}

impl RealtimeDb {
    pub fn new(pool: SqlitePool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self { pool, changes }
    }

    /// Open (creating if missing) the database at `database_url` and apply
    /// the schema. In-memory databases are pinned to one connection so every
    /// caller sees the same data.
    pub async fn connect(database_url: &str) -> Result<Self, PinsyncError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let in_memory = database_url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .min_connections(if in_memory { 1 } else { 0 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_opts)
            .await?;
        let db = Self::new(pool);
        db.init_schema().await?;
        Ok(db)
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), PinsyncError> {
        // sqlx::query runs one statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Replace the subtree at `path` with `value`. `null` or `{}` deletes it.
    pub async fn write(&self, path: &str, value: &Value) -> Result<(), PinsyncError> {
        let path = path::normalize(path)?;
        let mut leaves = Vec::new();
        path::flatten(&path, value, &mut leaves)?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        // a scalar stored above this path would shadow the new subtree
        for ancestor in path::ancestors(&path) {
            sqlx::query("DELETE FROM nodes WHERE path = ?")
                .bind(ancestor)
                .execute(&mut *tx)
                .await?;
        }
        delete_subtree(&mut tx, &path).await?;
        for (leaf_path, json) in leaves {
            sqlx::query("INSERT INTO nodes (path, value, updated_at) VALUES (?, ?, ?)")
                .bind(leaf_path)
                .bind(json)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(path = %path, "data written");
        self.notify(path);
        Ok(())
    }

    /// Snapshot of the subtree at `path`, or `None` when nothing is stored.
    pub async fn read(&self, path: &str) -> Result<Option<Value>, PinsyncError> {
        let path = path::normalize(path)?;

        let exact: Option<(String,)> = sqlx::query_as("SELECT value FROM nodes WHERE path = ?")
            .bind(&path)
            .fetch_optional(&self.pool)
            .await?;
        if let Some((json,)) = exact {
            return Ok(Some(serde_json::from_str(&json)?));
        }

        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT path, value FROM nodes WHERE path > ? AND path < ? ORDER BY path",
        )
        .bind(format!("{path}/"))
        .bind(format!("{path}0"))
        .fetch_all(&self.pool)
        .await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let leaves = rows
            .into_iter()
            .map(|(p, json)| Ok((p, serde_json::from_str(&json)?)))
            .collect::<Result<Vec<_>, PinsyncError>>()?;
        Ok(Some(path::assemble(&path, leaves)))
    }

    /// Remove the subtree at `path`. Removing a missing path is not an error.
    pub async fn delete(&self, path: &str) -> Result<(), PinsyncError> {
        let path = path::normalize(path)?;
        let mut tx = self.pool.begin().await?;
        delete_subtree(&mut tx, &path).await?;
        tx.commit().await?;

        debug!(path = %path, "data deleted");
        self.notify(path);
        Ok(())
    }

    /// Listen to whole-snapshot updates of `path`. The current snapshot is
    /// delivered first.
    pub fn subscribe(&self, path: &str) -> Result<Subscription, PinsyncError> {
        let path = path::normalize(path)?;
        Ok(Subscription::spawn(self.clone(), path, self.changes.subscribe()))
    }

    fn notify(&self, path: String) {
        // no receivers is fine
        let _ = self.changes.send(path);
    }
}

async fn delete_subtree(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    path: &str,
) -> Result<(), PinsyncError> {
    sqlx::query("DELETE FROM nodes WHERE path = ? OR (path > ? AND path < ?)")
        .bind(path)
        .bind(format!("{path}/"))
        .bind(format!("{path}0"))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn memory_db() -> RealtimeDb {
        RealtimeDb::connect("sqlite::memory:")
            .await
            .expect("in-memory database")
    }

    #[tokio::test]
    async fn write_read_delete_round_trip() {
        let db = memory_db().await;
        let account = json!({"user": {"username": "alice"}, "lastRefreshed": 7});

        db.write("users/u1/accounts/alice", &account).await.unwrap();
        assert_eq!(db.read("users/u1/accounts/alice").await.unwrap(), Some(account.clone()));
        assert_eq!(
            db.read("users/u1/accounts").await.unwrap(),
            Some(json!({"alice": account}))
        );

        db.delete("users/u1/accounts/alice").await.unwrap();
        assert_eq!(db.read("users/u1/accounts/alice").await.unwrap(), None);
        assert_eq!(db.read("users/u1/accounts").await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_replaces_whole_subtree() {
        let db = memory_db().await;
        db.write("users/u1/boards/alice", &json!({"a": 1, "b": 2}))
            .await
            .unwrap();
        db.write("users/u1/boards/alice", &json!([{"id": "b1"}]))
            .await
            .unwrap();
        assert_eq!(
            db.read("users/u1/boards").await.unwrap(),
            Some(json!({"alice": [{"id": "b1"}]}))
        );
    }

    #[tokio::test]
    async fn descendant_write_overrides_scalar_ancestor() {
        let db = memory_db().await;
        db.write("users/u1", &json!("placeholder")).await.unwrap();
        db.write("users/u1/accounts/alice", &json!(1)).await.unwrap();
        assert_eq!(
            db.read("users/u1").await.unwrap(),
            Some(json!({"accounts": {"alice": 1}}))
        );
    }

    #[tokio::test]
    async fn sibling_prefixes_do_not_leak() {
        let db = memory_db().await;
        db.write("users/u1/boards", &json!(1)).await.unwrap();
        db.write("users/u1/boards2", &json!(2)).await.unwrap();
        db.delete("users/u1/boards").await.unwrap();
        assert_eq!(db.read("users/u1/boards2").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn writing_null_deletes() {
        let db = memory_db().await;
        db.write("users/u1/accounts/alice", &json!({"x": 1}))
            .await
            .unwrap();
        db.write("users/u1/accounts/alice", &Value::Null).await.unwrap();
        assert_eq!(db.read("users/u1/accounts").await.unwrap(), None);
    }
}
