//! # Sajilo Hajiri Common Library
//!
//! Shared code for the Sajilo Hajiri client crates:
//! - Backend request/response types
//! - Roles, token claims and token providers
//! - Configuration loading
//! - Common error type

pub mod api;
pub mod config;
pub mod error;

pub use error::{Error, Result};
