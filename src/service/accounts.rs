use crate::error::PinsyncError;
use crate::pinterest::service::PinterestService;
use crate::pinterest::types::{PinterestAccount, PinterestBoard};
use crate::storage::Storage;
use crate::store::StoreHandle;
use tracing::{error, info};

/// Account lifecycle flows that span Pinterest, storage and the store.
#[derive(Clone)]
pub struct AccountService {
    pinterest: PinterestService,
    storage: Storage,
    store: StoreHandle,
}

impl AccountService {
    pub fn new(pinterest: PinterestService, storage: Storage, store: StoreHandle) -> Self {
        Self {
            pinterest,
            storage,
            store,
        }
    }

    pub fn pinterest(&self) -> &PinterestService {
        &self.pinterest
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Exchange the code, save the account, then fetch and save its boards.
    pub async fn connect(
        &self,
        uid: &str,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> Result<PinterestAccount, PinsyncError> {
        info!(uid, "starting Pinterest account connection");
        let result = async {
            let connected = self.pinterest.exchange_code(code, redirect_uri).await?;
            let account = PinterestAccount::connected(connected.user, connected.token);
            self.store.add_account(uid, account.clone()).await?;

            let boards = self
                .pinterest
                .list_boards(&account.token.access_token)
                .await?;
            info!(uid, account = %account.id, count = boards.len(), "boards fetched");
            self.store.set_boards(uid, &account.id, boards).await?;
            Ok(account)
        }
        .await;

        if let Err(e) = &result {
            error!(uid, error = %e, "failed to connect Pinterest account");
        }
        result
    }

    /// Re-fetch an account's boards from Pinterest and store them.
    pub async fn refresh_boards(
        &self,
        uid: &str,
        account_id: &str,
    ) -> Result<Vec<PinterestBoard>, PinsyncError> {
        let account = self.storage.accounts.get(uid, account_id).await?;
        let boards = self
            .pinterest
            .list_boards(&account.token.access_token)
            .await?;
        self.store.set_boards(uid, account_id, boards.clone()).await?;
        Ok(boards)
    }

    /// Refresh the stored access token of an account.
    pub async fn refresh_token(
        &self,
        uid: &str,
        account_id: &str,
    ) -> Result<PinterestAccount, PinsyncError> {
        let mut account = self.storage.accounts.get(uid, account_id).await?;
        self.pinterest.refresh_account(&mut account).await?;
        self.store.add_account(uid, account.clone()).await?;
        Ok(account)
    }
}
