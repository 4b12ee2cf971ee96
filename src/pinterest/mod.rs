//! Pinterest OAuth relay and REST API v5 client.

pub mod endpoints;
pub mod service;
pub mod types;

pub use service::PinterestService;
