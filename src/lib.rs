pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod pinterest;
pub mod server;
pub mod service;
pub mod storage;
pub mod store;
pub mod sync;

pub use error::PinsyncError;
pub use pinterest::PinterestService;
pub use service::AccountService;
