//! Per-user account store: accounts, boards, selection and status flags.

pub mod actor;
pub mod persist;
pub mod state;

pub use actor::{NoticeLevel, StoreEvent, StoreHandle, spawn};
pub use persist::LocalStorage;
pub use state::AccountState;
