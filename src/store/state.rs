use crate::error::PinsyncError;
use crate::pinterest::types::{PinterestAccount, PinterestBoard};
use crate::storage::BoardsByAccount;
use serde::Serialize;

/// Per-user account state. Every mutation keeps `selected_account_id`
/// pointing at an existing account or `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    pub accounts: Vec<PinterestAccount>,
    pub selected_account_id: Option<String>,
    pub boards: BoardsByAccount,
    pub initialized: bool,
    pub loading: bool,
    pub error: Option<String>,
}

impl AccountState {
    pub fn set_accounts(&mut self, accounts: Vec<PinterestAccount>) {
        self.accounts = accounts;
        self.error = None;
        self.repair_selection();
    }

    /// Select an account, or clear the selection with `None`.
    pub fn select_account(&mut self, account_id: Option<String>) -> Result<(), PinsyncError> {
        if let Some(id) = account_id.as_deref()
            && !self.has_account(id)
        {
            return Err(PinsyncError::InvalidSelection(format!(
                "account {id} does not exist"
            )));
        }
        self.selected_account_id = account_id;
        self.error = None;
        Ok(())
    }

    /// Insert or replace by id; selects the account when nothing is selected.
    pub fn add_account(&mut self, account: PinterestAccount) {
        let id = account.id.clone();
        match self.accounts.iter_mut().find(|a| a.id == id) {
            Some(existing) => *existing = account,
            None => self.accounts.push(account),
        }
        if self.selected_account_id.is_none() {
            self.selected_account_id = Some(id);
        }
        self.error = None;
    }

    /// Drop the account and its boards; the selection moves to the first
    /// remaining account.
    pub fn remove_account(&mut self, account_id: &str) {
        self.accounts.retain(|a| a.id != account_id);
        self.boards.remove(account_id);
        self.repair_selection();
        self.error = None;
    }

    pub fn set_boards(&mut self, account_id: &str, boards: Vec<PinterestBoard>) {
        self.boards.insert(account_id.to_string(), boards);
        self.error = None;
    }

    pub fn replace_boards(&mut self, boards: BoardsByAccount) {
        self.boards = boards;
    }

    /// Prefer `persisted` when it still exists, else the first account.
    pub fn restore_selection(&mut self, persisted: Option<String>) {
        self.selected_account_id = persisted
            .filter(|id| self.has_account(id))
            .or_else(|| self.accounts.first().map(|a| a.id.clone()));
    }

    pub fn get_account(&self, account_id: &str) -> Result<&PinterestAccount, PinsyncError> {
        self.accounts
            .iter()
            .find(|a| a.id == account_id)
            .ok_or_else(|| PinsyncError::NotFound("Account not found".to_string()))
    }

    pub fn selected_account(&self) -> Option<&PinterestAccount> {
        let id = self.selected_account_id.as_deref()?;
        self.accounts.iter().find(|a| a.id == id)
    }

    pub fn account_boards(&self, account_id: &str) -> &[PinterestBoard] {
        self.boards
            .get(account_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn has_account(&self, account_id: &str) -> bool {
        self.accounts.iter().any(|a| a.id == account_id)
    }

    /// An explicit `None` stays; a dangling id moves to the first account.
    fn repair_selection(&mut self) {
        let dangling = self
            .selected_account_id
            .as_deref()
            .is_some_and(|id| !self.has_account(id));
        if dangling {
            self.selected_account_id = self.accounts.first().map(|a| a.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pinterest::types::{PinterestToken, PinterestUser};

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

    fn with_accounts(ids: &[&str]) -> AccountState {
        let mut state = AccountState::default();
        state.set_accounts(ids.iter().map(|id| account(id)).collect());
        state.restore_selection(None);
        state
    }

    #[test]
    fn selecting_unknown_account_is_rejected() {
        let mut state = with_accounts(&["alice"]);
        let err = state.select_account(Some("ghost".into())).unwrap_err();
        assert!(matches!(err, PinsyncError::InvalidSelection(_)));
        assert_eq!(state.selected_account_id.as_deref(), Some("alice"));

        state.select_account(None).unwrap();
        assert_eq!(state.selected_account_id, None);
        assert!(state.selected_account().is_none());
    }

    #[test]
    fn first_added_account_becomes_selected() {
        let mut state = AccountState::default();
        state.add_account(account("alice"));
        state.add_account(account("bob"));
        assert_eq!(state.selected_account_id.as_deref(), Some("alice"));
        assert_eq!(state.accounts.len(), 2);

        state.add_account(account("alice"));
        assert_eq!(state.accounts.len(), 2);
    }

    #[test]
    fn removing_selected_account_falls_back() {
        let mut state = with_accounts(&["alice", "bob"]);
        state.select_account(Some("bob".into())).unwrap();
        state.set_boards("bob", vec![PinterestBoard::default()]);

        state.remove_account("bob");
        assert_eq!(state.selected_account_id.as_deref(), Some("alice"));
        assert!(state.account_boards("bob").is_empty());

        state.remove_account("alice");
        assert_eq!(state.selected_account_id, None);
    }

    #[test]
    fn removing_other_account_keeps_selection() {
        let mut state = with_accounts(&["alice", "bob", "carol"]);
        state.select_account(Some("carol".into())).unwrap();
        state.remove_account("alice");
        assert_eq!(state.selected_account_id.as_deref(), Some("carol"));
    }

    #[test]
    fn synced_accounts_repair_stale_selection() {
        let mut state = with_accounts(&["alice", "bob"]);
        state.select_account(Some("bob".into())).unwrap();
        state.set_accounts(vec![account("alice")]);
        assert_eq!(state.selected_account_id.as_deref(), Some("alice"));
    }

    #[test]
    fn cleared_selection_survives_sync() {
        let mut state = with_accounts(&["alice"]);
        state.select_account(None).unwrap();
        state.set_accounts(vec![account("alice"), account("bob")]);
        assert_eq!(state.selected_account_id, None);
    }

    #[test]
    fn restore_selection_ignores_missing_ids() {
        let mut state = with_accounts(&["alice", "bob"]);
        state.restore_selection(Some("bob".into()));
        assert_eq!(state.selected_account_id.as_deref(), Some("bob"));
        state.restore_selection(Some("ghost".into()));
        assert_eq!(state.selected_account_id.as_deref(), Some("alice"));
    }

    #[test]
    fn get_account_reports_missing() {
        let state = with_accounts(&["alice"]);
        assert_eq!(state.get_account("alice").unwrap().id, "alice");
        assert_eq!(
            state.get_account("bob").unwrap_err().to_string(),
            "Account not found"
        );
    }
}
