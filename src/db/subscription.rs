use crate::db::path;
use crate::db::sqlite::RealtimeDb;
use crate::error::PinsyncError;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub type Snapshot = Result<Option<Value>, PinsyncError>;

/// A listener bound to one path. Dropping it stops delivery.
pub struct Subscription {
    path: String,
    rx: mpsc::Receiver<Snapshot>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn spawn(
        db: RealtimeDb,
        path: String,
        mut changes: broadcast::Receiver<String>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(16);
        let watched = path.clone();
        let task = tokio::spawn(async move {
            if tx.send(db.read(&watched).await).await.is_err() {
                return;
            }
            loop {
                match changes.recv().await {
                    Ok(changed) if !path::overlaps(&changed, &watched) => continue,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(path = %watched, skipped, "change feed lagged; re-reading snapshot");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                if tx.send(db.read(&watched).await).await.is_err() {
                    break;
                }
            }
            debug!(path = %watched, "listener stopped");
        });
        Self { path, rx, task }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Next whole snapshot; `None` once the listener has stopped.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
