//! Realtime database: a path-addressed JSON tree persisted in SQLite.
//!
//! Layout:
//! - `path.rs`: key validation, flattening and reassembly of JSON trees
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: read/write/delete primitives and change notification
//! - `subscription.rs`: snapshot listeners bound to a path

pub mod path;
pub mod schema;
pub mod sqlite;
pub mod subscription;

pub use schema::SQLITE_INIT;
pub use sqlite::{RealtimeDb, SqlitePool};
pub use subscription::Subscription;
