//! Realtime sync: one listener per watched path, forwarding whole snapshots.

use crate::error::PinsyncError;
use crate::pinterest::types::PinterestAccount;
use crate::storage::{BoardsByAccount, Storage, accounts_from_map};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Receiver of synced snapshots.
pub trait SyncTarget: Clone + Send + Sync + 'static {
    fn accounts_synced(&self, uid: &str, accounts: Vec<PinterestAccount>);
    fn boards_synced(&self, uid: &str, boards: BoardsByAccount);
    fn sync_failed(&self, uid: &str, message: String);
}

pub struct SyncManager<T: SyncTarget> {
    storage: Storage,
    target: T,
    active: HashMap<String, Vec<JoinHandle<()>>>,
}

impl<T: SyncTarget> SyncManager<T> {
    pub fn new(storage: Storage, target: T) -> Self {
        Self {
            storage,
            target,
            active: HashMap::new(),
        }
    }

    pub fn is_active(&self, uid: &str) -> bool {
        self.active.contains_key(uid)
    }

    /// Start watching the user's accounts and boards. Returns `false` when
    /// the user is already watched.
    pub fn initialize(&mut self, uid: &str) -> Result<bool, PinsyncError> {
        if self.is_active(uid) {
            return Ok(false);
        }
        let accounts_path = self.storage.accounts.path(uid)?;
        let boards_path = self.storage.boards.path(uid)?;

        let handles = vec![
            self.watch(uid, &accounts_path, "Failed to sync accounts", |target, uid, value| {
                let map: BTreeMap<String, PinterestAccount> = match value {
                    Some(v) => serde_json::from_value(v)?,
                    None => BTreeMap::new(),
                };
                target.accounts_synced(uid, accounts_from_map(map));
                Ok(())
            })?,
            self.watch(uid, &boards_path, "Failed to sync boards", |target, uid, value| {
                let boards: BoardsByAccount = match value {
                    Some(v) => serde_json::from_value(v)?,
                    None => BoardsByAccount::new(),
                };
                target.boards_synced(uid, boards);
                Ok(())
            })?,
        ];
        self.active.insert(uid.to_string(), handles);
        info!(uid, "realtime sync started");
        Ok(true)
    }

    /// Stop watching the user. Returns `false` when nothing was watched.
    pub fn cleanup(&mut self, uid: &str) -> bool {
        let Some(handles) = self.active.remove(uid) else {
            return false;
        };
        for handle in handles {
            handle.abort();
        }
        info!(uid, "realtime sync stopped");
        true
    }

    fn watch<F>(
        &self,
        uid: &str,
        path: &str,
        failure: &'static str,
        forward: F,
    ) -> Result<JoinHandle<()>, PinsyncError>
    where
        F: Fn(&T, &str, Option<Value>) -> Result<(), PinsyncError> + Send + 'static,
    {
        let mut subscription = self.storage.db().subscribe(path)?;
        let target = self.target.clone();
        let uid = uid.to_string();
        Ok(tokio::spawn(async move {
            while let Some(snapshot) = subscription.next().await {
                let outcome = snapshot.and_then(|value| forward(&target, &uid, value));
                match outcome {
                    Ok(()) => debug!(uid = %uid, path = %subscription.path(), "snapshot forwarded"),
                    Err(e) => {
                        warn!(uid = %uid, path = %subscription.path(), error = %e, "sync error");
                        target.sync_failed(&uid, failure.to_string());
                    }
                }
            }
        }))
    }
}

impl<T: SyncTarget> Drop for SyncManager<T> {
    fn drop(&mut self) {
        for handle in self.active.values().flatten() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RealtimeDb;
    use crate::pinterest::types::{PinterestBoard, PinterestToken, PinterestUser};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    #[derive(Debug)]
    enum Synced {
        Accounts(Vec<String>),
        Boards(Vec<String>),
        Failed(String),
    }

    #[derive(Clone)]
    struct ChannelTarget(mpsc::UnboundedSender<Synced>);

    impl SyncTarget for ChannelTarget {
        fn accounts_synced(&self, _uid: &str, accounts: Vec<PinterestAccount>) {
            let ids = accounts.into_iter().map(|a| a.id).collect();
            let _ = self.0.send(Synced::Accounts(ids));
        }
        fn boards_synced(&self, _uid: &str, boards: BoardsByAccount) {
            let _ = self.0.send(Synced::Boards(boards.into_keys().collect()));
        }
        fn sync_failed(&self, _uid: &str, message: String) {
            let _ = self.0.send(Synced::Failed(message));
        }
    }

    async fn recv(rx: &mut mpsc::UnboundedReceiver<Synced>) -> Synced {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("sync event in time")
            .expect("sync channel open")
    }

    fn account(id: &str) -> PinterestAccount {
        PinterestAccount {
            id: id.to_string(),
            user: PinterestUser {
                username: id.to_string(),
                ..Default::default()
            },
            token: PinterestToken::default(),
            last_refreshed: 0,
        }
    }

    #[tokio::test]
    async fn forwards_initial_and_changed_snapshots() {
        let storage = Storage::new(RealtimeDb::connect("sqlite::memory:").await.unwrap());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = SyncManager::new(storage.clone(), ChannelTarget(tx));

        assert!(manager.initialize("u1").unwrap());
        assert!(!manager.initialize("u1").unwrap());

        let mut initial = vec![recv(&mut rx).await, recv(&mut rx).await];
        initial.sort_by_key(|s| matches!(s, Synced::Boards(_)));
        assert!(matches!(&initial[0], Synced::Accounts(ids) if ids.is_empty()));
        assert!(matches!(&initial[1], Synced::Boards(ids) if ids.is_empty()));

        storage.accounts.save("u1", &account("alice")).await.unwrap();
        match recv(&mut rx).await {
            Synced::Accounts(ids) => assert_eq!(ids, vec!["alice".to_string()]),
            other => panic!("unexpected {other:?}"),
        }

        storage
            .boards
            .save("u1", "alice", &[PinterestBoard::default()])
            .await
            .unwrap();
        match recv(&mut rx).await {
            Synced::Boards(ids) => assert_eq!(ids, vec!["alice".to_string()]),
            other => panic!("unexpected {other:?}"),
        }

        assert!(manager.cleanup("u1"));
        assert!(!manager.cleanup("u1"));
    }

    #[tokio::test]
    async fn malformed_snapshot_reports_failure() {
        let storage = Storage::new(RealtimeDb::connect("sqlite::memory:").await.unwrap());
        storage
            .db()
            .write("users/u1/accounts/alice", &serde_json::json!("not an account"))
            .await
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = SyncManager::new(storage, ChannelTarget(tx));
        manager.initialize("u1").unwrap();

        let mut failed = false;
        for _ in 0..2 {
            if let Synced::Failed(message) = recv(&mut rx).await {
                assert_eq!(message, "Failed to sync accounts");
                failed = true;
            }
        }
        assert!(failed);
    }

    #[tokio::test]
    async fn malformed_boards_report_board_failure() {
        let storage = Storage::new(RealtimeDb::connect("sqlite::memory:").await.unwrap());
        storage
            .db()
            .write("users/u1/boards/alice", &serde_json::json!("not a board list"))
            .await
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = SyncManager::new(storage, ChannelTarget(tx));
        manager.initialize("u1").unwrap();

        let mut failures = Vec::new();
        for _ in 0..2 {
            if let Synced::Failed(message) = recv(&mut rx).await {
                failures.push(message);
            }
        }
        assert_eq!(failures, vec!["Failed to sync boards".to_string()]);
    }
}
