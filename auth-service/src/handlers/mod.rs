//! HTTP handlers for banking-auth.

pub mod auth;
pub mod metrics;

pub use auth::*;
