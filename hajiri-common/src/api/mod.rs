//! Shared API types for talking to the Sajilo Hajiri backend

pub mod auth;
pub mod types;
