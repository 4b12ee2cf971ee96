use crate::error::PinsyncError;
use crate::pinterest::types::{PinterestAccount, PinterestBoard};
use crate::storage::{BoardsByAccount, Storage};
use crate::store::persist::LocalStorage;
use crate::store::state::AccountState;
use crate::sync::{SyncManager, SyncTarget};

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

type Reply<T> = RpcReplyPort<Result<T, PinsyncError>>;

/// Events published to a user's listeners.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StoreEvent {
    State(AccountState),
    Notice { level: NoticeLevel, message: String },
}

impl StoreEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StoreEvent::State(_) => "state",
            StoreEvent::Notice { .. } => "notice",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Messages handled by the store actor.
#[derive(Debug)]
pub enum StoreMessage {
    Initialize(String, Reply<AccountState>),
    Cleanup(String, Reply<AccountState>),
    Snapshot(String, Reply<AccountState>),
    SelectAccount(String, Option<String>, Reply<AccountState>),
    AddAccount(String, PinterestAccount, Reply<AccountState>),
    SetBoards(String, String, Vec<PinterestBoard>, Reply<AccountState>),
    RemoveAccount(String, String, Reply<AccountState>),
    GetAccount(String, String, Reply<PinterestAccount>),
    Listen(String, Reply<broadcast::Receiver<StoreEvent>>),

    // Internal messages (sent by the sync listeners)
    AccountsSynced {
        uid: String,
        accounts: Vec<PinterestAccount>,
    },
    BoardsSynced {
        uid: String,
        boards: BoardsByAccount,
    },
    SyncFailed {
        uid: String,
        message: String,
    },
}

impl SyncTarget for ActorRef<StoreMessage> {
    fn accounts_synced(&self, uid: &str, accounts: Vec<PinterestAccount>) {
        let _ = ractor::cast!(
            self,
            StoreMessage::AccountsSynced {
                uid: uid.to_string(),
                accounts
            }
        );
    }

    fn boards_synced(&self, uid: &str, boards: BoardsByAccount) {
        let _ = ractor::cast!(
            self,
            StoreMessage::BoardsSynced {
                uid: uid.to_string(),
                boards
            }
        );
    }

    fn sync_failed(&self, uid: &str, message: String) {
        let _ = ractor::cast!(
            self,
            StoreMessage::SyncFailed {
                uid: uid.to_string(),
                message
            }
        );
    }
}

/// Handle for interacting with the store actor.
#[derive(Clone)]
pub struct StoreHandle {
    actor: ActorRef<StoreMessage>,
}

macro_rules! store_call {
    ($actor:expr, $name:literal, $variant:expr $(, $arg:expr)*) => {
        ractor::call!($actor, $variant $(, $arg)*)
            .map_err(|e| PinsyncError::RactorError(format!("{} RPC failed: {e}", $name)))?
    };
}

impl StoreHandle {
    /// Load the user's accounts and boards and start realtime sync.
    /// Calling it again for an initialized user returns the current state.
    pub async fn initialize(&self, uid: impl Into<String>) -> Result<AccountState, PinsyncError> {
        store_call!(self.actor, "Initialize", StoreMessage::Initialize, uid.into())
    }

    pub async fn cleanup(&self, uid: impl Into<String>) -> Result<AccountState, PinsyncError> {
        store_call!(self.actor, "Cleanup", StoreMessage::Cleanup, uid.into())
    }

    pub async fn snapshot(&self, uid: impl Into<String>) -> Result<AccountState, PinsyncError> {
        store_call!(self.actor, "Snapshot", StoreMessage::Snapshot, uid.into())
    }

    pub async fn select_account(
        &self,
        uid: impl Into<String>,
        account_id: Option<String>,
    ) -> Result<AccountState, PinsyncError> {
        store_call!(
            self.actor,
            "SelectAccount",
            StoreMessage::SelectAccount,
            uid.into(),
            account_id
        )
    }

    pub async fn add_account(
        &self,
        uid: impl Into<String>,
        account: PinterestAccount,
    ) -> Result<AccountState, PinsyncError> {
        store_call!(
            self.actor,
            "AddAccount",
            StoreMessage::AddAccount,
            uid.into(),
            account
        )
    }

    pub async fn set_boards(
        &self,
        uid: impl Into<String>,
        account_id: impl Into<String>,
        boards: Vec<PinterestBoard>,
    ) -> Result<AccountState, PinsyncError> {
        store_call!(
            self.actor,
            "SetBoards",
            StoreMessage::SetBoards,
            uid.into(),
            account_id.into(),
            boards
        )
    }

    pub async fn remove_account(
        &self,
        uid: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Result<AccountState, PinsyncError> {
        store_call!(
            self.actor,
            "RemoveAccount",
            StoreMessage::RemoveAccount,
            uid.into(),
            account_id.into()
        )
    }

    pub async fn get_account(
        &self,
        uid: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Result<PinterestAccount, PinsyncError> {
        store_call!(
            self.actor,
            "GetAccount",
            StoreMessage::GetAccount,
            uid.into(),
            account_id.into()
        )
    }

    /// Receiver of the user's state snapshots and notices.
    pub async fn listen(
        &self,
        uid: impl Into<String>,
    ) -> Result<broadcast::Receiver<StoreEvent>, PinsyncError> {
        store_call!(self.actor, "Listen", StoreMessage::Listen, uid.into())
    }
}

struct UserSession {
    state: AccountState,
    persisted_selection: Option<String>,
    events: broadcast::Sender<StoreEvent>,
}

impl UserSession {
    fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: AccountState::default(),
            persisted_selection: None,
            events,
        }
    }

    fn publish_state(&self) {
        let _ = self.events.send(StoreEvent::State(self.state.clone()));
    }

    fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NoticeLevel::Success => debug!("{message}"),
            NoticeLevel::Error => warn!("{message}"),
        }
        let _ = self.events.send(StoreEvent::Notice { level, message });
    }

    fn fail(&mut self, err: &PinsyncError) {
        error!(error = %err, "store operation failed");
        self.state.error = Some(err.to_string());
        self.notice(NoticeLevel::Error, err.to_string());
    }
}

/// Internal state held by the ractor-driven store actor
struct StoreActorState {
    storage: Storage,
    local: LocalStorage,
    sync: SyncManager<ActorRef<StoreMessage>>,
    users: HashMap<String, UserSession>,
}

impl StoreActorState {
    fn session(&mut self, uid: &str) -> &mut UserSession {
        self.users
            .entry(uid.to_string())
            .or_insert_with(UserSession::new)
    }

    /// Write the selection through to local storage when it changed.
    async fn persist_selection(&mut self, uid: &str) {
        let Some(session) = self.users.get_mut(uid) else {
            return;
        };
        if session.persisted_selection == session.state.selected_account_id {
            return;
        }
        let selected = session.state.selected_account_id.clone();
        match self.local.save_selection(uid, selected.as_deref()).await {
            Ok(()) => session.persisted_selection = selected,
            Err(e) => warn!(uid, error = %e, "failed to persist selection"),
        }
    }

    /// Publish the state, clearing `loading`.
    async fn settle(&mut self, uid: &str) -> AccountState {
        self.persist_selection(uid).await;
        let session = self.session(uid);
        session.state.loading = false;
        session.publish_state();
        session.state.clone()
    }

    fn begin(&mut self, uid: &str) {
        let session = self.session(uid);
        session.state.loading = true;
        session.publish_state();
    }
}

/// ractor-based store actor
struct StoreActor;

#[ractor::async_trait]
impl Actor for StoreActor {
    type Msg = StoreMessage;
    type State = StoreActorState;
    type Arguments = (Storage, LocalStorage);

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        arguments: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let (storage, local) = arguments;
        let sync = SyncManager::new(storage.clone(), myself);
        info!("StoreActor started");
        Ok(StoreActorState {
            storage,
            local,
            sync,
            users: HashMap::new(),
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            StoreMessage::Initialize(uid, rp) => {
                let result = self.handle_initialize(state, &uid).await;
                let _ = rp.send(result);
            }
            StoreMessage::Cleanup(uid, rp) => {
                let stopped = state.sync.cleanup(&uid);
                let session = state.session(&uid);
                session.state.initialized = false;
                if stopped {
                    session.notice(NoticeLevel::Success, "Real-time synchronization stopped");
                }
                session.publish_state();
                let _ = rp.send(Ok(session.state.clone()));
            }
            StoreMessage::Snapshot(uid, rp) => {
                let snapshot = state
                    .users
                    .get(&uid)
                    .map(|session| session.state.clone())
                    .unwrap_or_default();
                let _ = rp.send(Ok(snapshot));
            }
            StoreMessage::SelectAccount(uid, account_id, rp) => {
                let result = state.session(&uid).state.select_account(account_id);
                let result = match result {
                    Ok(()) => Ok(state.settle(&uid).await),
                    Err(e) => Err(e),
                };
                let _ = rp.send(result);
            }
            StoreMessage::AddAccount(uid, account, rp) => {
                let result = self.handle_add_account(state, &uid, account).await;
                let _ = rp.send(result);
            }
            StoreMessage::SetBoards(uid, account_id, boards, rp) => {
                let result = self
                    .handle_set_boards(state, &uid, &account_id, boards)
                    .await;
                let _ = rp.send(result);
            }
            StoreMessage::RemoveAccount(uid, account_id, rp) => {
                let result = self.handle_remove_account(state, &uid, &account_id).await;
                let _ = rp.send(result);
            }
            StoreMessage::GetAccount(uid, account_id, rp) => {
                let result = match state.users.get(&uid) {
                    Some(session) => session.state.get_account(&account_id).cloned(),
                    None => Err(PinsyncError::NotFound("Account not found".to_string())),
                };
                let _ = rp.send(result);
            }
            // Listeners register ahead of the first mutation, so this one creates the session.
            StoreMessage::Listen(uid, rp) => {
                let _ = rp.send(Ok(state.session(&uid).events.subscribe()));
            }
            StoreMessage::AccountsSynced { uid, accounts } => {
                debug!(uid = %uid, count = accounts.len(), "accounts updated");
                state.session(&uid).state.set_accounts(accounts);
                state.settle(&uid).await;
            }
            StoreMessage::BoardsSynced { uid, boards } => {
                debug!(uid = %uid, count = boards.len(), "boards updated");
                state.session(&uid).state.replace_boards(boards);
                state.settle(&uid).await;
            }
            StoreMessage::SyncFailed { uid, message } => {
                let session = state.session(&uid);
                session.state.error = Some(message.clone());
                session.notice(NoticeLevel::Error, message);
                session.publish_state();
            }
        }
        Ok(())
    }
}

impl StoreActor {
    async fn handle_initialize(
        &self,
        state: &mut StoreActorState,
        uid: &str,
    ) -> Result<AccountState, PinsyncError> {
        if state.session(uid).state.initialized {
            return Ok(state.session(uid).state.clone());
        }
        info!(uid, "initializing store");
        state.begin(uid);
        state.session(uid).state.error = None;

        let (accounts, boards) = tokio::join!(
            state.storage.accounts.get_all(uid),
            state.storage.boards.get_all(uid)
        );
        let loaded = match (accounts, boards) {
            (Ok(accounts), Ok(boards)) => Ok((accounts, boards)),
            (Err(e), _) | (_, Err(e)) => Err(e),
        };

        let (accounts, boards) = match loaded {
            Ok(data) => data,
            Err(e) => {
                let session = state.session(uid);
                session.fail(&e);
                session.state.initialized = true;
                state.settle(uid).await;
                return Err(e);
            }
        };

        let persisted = state.local.selection(uid);
        let session = state.session(uid);
        session.persisted_selection = persisted.clone();
        session.state.set_accounts(accounts);
        session.state.replace_boards(boards);
        session.state.restore_selection(persisted);
        session.state.initialized = true;
        session.notice(NoticeLevel::Success, "Account data loaded successfully");

        match state.sync.initialize(uid) {
            Ok(_) => state
                .session(uid)
                .notice(NoticeLevel::Success, "Real-time synchronization started"),
            Err(e) => state.session(uid).fail(&e),
        }
        Ok(state.settle(uid).await)
    }

    async fn handle_add_account(
        &self,
        state: &mut StoreActorState,
        uid: &str,
        account: PinterestAccount,
    ) -> Result<AccountState, PinsyncError> {
        state.begin(uid);
        if let Err(e) = state.storage.accounts.save(uid, &account).await {
            state.session(uid).fail(&e);
            state.settle(uid).await;
            return Err(e);
        }
        let session = state.session(uid);
        session.state.add_account(account);
        session.notice(NoticeLevel::Success, "Account added successfully");
        Ok(state.settle(uid).await)
    }

    async fn handle_set_boards(
        &self,
        state: &mut StoreActorState,
        uid: &str,
        account_id: &str,
        boards: Vec<PinterestBoard>,
    ) -> Result<AccountState, PinsyncError> {
        state.begin(uid);
        if let Err(e) = state.storage.boards.save(uid, account_id, &boards).await {
            state.session(uid).fail(&e);
            state.settle(uid).await;
            return Err(e);
        }
        let session = state.session(uid);
        session.state.set_boards(account_id, boards);
        session.notice(NoticeLevel::Success, "Boards updated successfully");
        Ok(state.settle(uid).await)
    }

    async fn handle_remove_account(
        &self,
        state: &mut StoreActorState,
        uid: &str,
        account_id: &str,
    ) -> Result<AccountState, PinsyncError> {
        state.begin(uid);
        if let Err(e) = state.storage.remove_account(uid, account_id).await {
            state.session(uid).fail(&e);
            state.settle(uid).await;
            return Err(e);
        }
        let session = state.session(uid);
        session.state.remove_account(account_id);
        session.notice(NoticeLevel::Success, "Account removed successfully");
        Ok(state.settle(uid).await)
    }
}

/// Async spawn of the store actor and return a handle.
pub async fn spawn(storage: Storage, local: LocalStorage) -> Result<StoreHandle, PinsyncError> {
    let (actor, _jh) = Actor::spawn(None, StoreActor, (storage, local))
        .await
        .map_err(|e| PinsyncError::RactorError(format!("failed to spawn StoreActor: {e}")))?;
    Ok(StoreHandle { actor })
}
