//! hajiri-client library interface
//!
//! Client core of the Sajilo Hajiri attendance front-end: an HTTP client
//! with bearer auth and coalesced reads, the attendance session controller,
//! and services for the academics, accounts and records screens.

pub mod error;
pub mod http;
pub mod inflight;
pub mod services;

pub use crate::error::{ClientError, ClientResult};
pub use crate::http::{ApiClient, Query};

/// Build identifier baked in at compile time
pub fn build_info() -> String {
    format!(
        "{} ({}, {} build, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP"),
    )
}
