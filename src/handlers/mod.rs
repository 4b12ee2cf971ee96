pub mod dashboard;
pub mod oauth;
pub mod pinterest;
