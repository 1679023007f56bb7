//! # warden-core
//!
//! Core types, traits, and abstractions for the warden authorization server.
//!
//! This crate provides the data records, the [`TokenStore`] interface, the
//! error type and the credential primitives that the storage and OAuth crates
//! build on.

pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod scope;
pub mod secrets;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use config::OAuthConfig;
pub use error::{Error, Result};
pub use models::*;
pub use scope::Scope;
pub use traits::*;
pub use uuid_utils::{extract_timestamp, is_v7, new_v7};
