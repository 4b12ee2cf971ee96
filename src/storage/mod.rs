//! Account, board and scheduled-pin storage on top of the realtime database.
//!
//! Every collection lives under `users/{uid}/{root}/{id}`.

mod collection;

pub use collection::Collection;

use crate::db::RealtimeDb;
use crate::error::PinsyncError;
use crate::pinterest::types::{PinterestAccount, PinterestBoard, ScheduledPin};
use std::collections::BTreeMap;
use tracing::info;

pub type BoardsByAccount = BTreeMap<String, Vec<PinterestBoard>>;

#[derive(Clone)]
pub struct AccountStorage(Collection<PinterestAccount>);

#[derive(Clone)]
pub struct BoardStorage(Collection<Vec<PinterestBoard>>);

#[derive(Clone)]
pub struct PinStorage(Collection<ScheduledPin>);

impl AccountStorage {
    pub async fn save(&self, uid: &str, account: &PinterestAccount) -> Result<(), PinsyncError> {
        self.0.save(uid, &account.id, account).await
    }

    pub async fn get(&self, uid: &str, account_id: &str) -> Result<PinterestAccount, PinsyncError> {
        let mut account = self.0.get(uid, account_id).await?;
        account.id = account_id.to_string();
        Ok(account)
    }

    /// All accounts, with ids taken from their keys.
    pub async fn get_all(&self, uid: &str) -> Result<Vec<PinterestAccount>, PinsyncError> {
        Ok(accounts_from_map(self.0.get_all(uid).await?))
    }

    pub async fn remove(&self, uid: &str, account_id: &str) -> Result<(), PinsyncError> {
        self.0.remove(uid, account_id).await
    }

    pub fn path(&self, uid: &str) -> Result<String, PinsyncError> {
        self.0.path(uid, None)
    }
}

pub fn accounts_from_map(map: BTreeMap<String, PinterestAccount>) -> Vec<PinterestAccount> {
    map.into_iter()
        .map(|(id, mut account)| {
            account.id = id;
            account
        })
        .collect()
}

impl BoardStorage {
    pub async fn save(
        &self,
        uid: &str,
        account_id: &str,
        boards: &[PinterestBoard],
    ) -> Result<(), PinsyncError> {
        self.0.save(uid, account_id, &boards.to_vec()).await
    }

    pub async fn get(&self, uid: &str, account_id: &str) -> Result<Vec<PinterestBoard>, PinsyncError> {
        self.0.get(uid, account_id).await
    }

    pub async fn get_all(&self, uid: &str) -> Result<BoardsByAccount, PinsyncError> {
        self.0.get_all(uid).await
    }

    pub async fn remove(&self, uid: &str, account_id: &str) -> Result<(), PinsyncError> {
        self.0.remove(uid, account_id).await
    }

    pub fn path(&self, uid: &str) -> Result<String, PinsyncError> {
        self.0.path(uid, None)
    }
}

impl PinStorage {
    pub async fn save(&self, uid: &str, pin: &ScheduledPin) -> Result<(), PinsyncError> {
        self.0.save(uid, &pin.id, pin).await
    }

    pub async fn get(&self, uid: &str, pin_id: &str) -> Result<ScheduledPin, PinsyncError> {
        let mut pin = self.0.get(uid, pin_id).await?;
        pin.id = pin_id.to_string();
        Ok(pin)
    }

    pub async fn get_all(&self, uid: &str) -> Result<Vec<ScheduledPin>, PinsyncError> {
        Ok(self
            .0
            .get_all(uid)
            .await?
            .into_iter()
            .map(|(id, mut pin)| {
                pin.id = id;
                pin
            })
            .collect())
    }

    pub async fn remove(&self, uid: &str, pin_id: &str) -> Result<(), PinsyncError> {
        self.0.remove(uid, pin_id).await
    }
}

/// Entry point for all domain storage.
#[derive(Clone)]
pub struct Storage {
    pub accounts: AccountStorage,
    pub boards: BoardStorage,
    pub pins: PinStorage,
    db: RealtimeDb,
}

impl Storage {
    pub fn new(db: RealtimeDb) -> Self {
        Self {
            accounts: AccountStorage(Collection::new(db.clone(), "accounts")),
            boards: BoardStorage(Collection::new(db.clone(), "boards")),
            pins: PinStorage(Collection::new(db.clone(), "pins")),
            db,
        }
    }

    pub fn db(&self) -> &RealtimeDb {
        &self.db
    }

    /// Remove an account together with its boards.
    pub async fn remove_account(&self, uid: &str, account_id: &str) -> Result<(), PinsyncError> {
        let (accounts, boards) = tokio::join!(
            self.accounts.remove(uid, account_id),
            self.boards.remove(uid, account_id)
        );
        accounts?;
        boards?;
        info!(uid, account = account_id, "account and boards removed");
        Ok(())
    }
}
