//! # warden-oauth
//!
//! OAuth2 authorization-code issuance and validation for warden.
//!
//! This crate provides:
//! - Client and user authentication
//! - Single-use authorization codes with optional PKCE
//! - Token exchange for the `authorization_code`, `refresh_token` and
//!   `client_credentials` grants, with refresh token rotation
//! - Token validation, introspection and revocation
//! - Client and user registration
//! - A background sweeper for expired codes and tokens
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use warden_db::Database;
//! use warden_oauth::{AuthorizationServer, OAuthConfig, TokenRequest};
//!
//! let db = Database::connect("postgres://...").await?;
//! let server = AuthorizationServer::new(Arc::new(db.store), OAuthConfig::from_env())?;
//!
//! let response = server
//!     .token(TokenRequest {
//!         grant_type: "authorization_code".to_string(),
//!         code: Some(code),
//!         redirect_uri: Some("https://app.example/cb".to_string()),
//!         client_id: Some(client_id),
//!         client_secret: Some(client_secret),
//!         ..Default::default()
//!     })
//!     .await?;
//! ```

pub mod authenticator;
pub mod exchanger;
pub mod inspector;
pub mod issuer;
pub mod registrar;
pub mod server;
pub mod sweeper;

// Re-export core types
pub use warden_core::*;

pub use authenticator::{ClientAuthenticator, UserAuthenticator};
pub use exchanger::{CodeExchange, RefreshExchange, TokenExchanger};
pub use inspector::TokenInspector;
pub use issuer::{CodeIssuer, CodeRequest};
pub use registrar::Registrar;
pub use server::AuthorizationServer;
pub use sweeper::{ExpirySweeper, SweeperConfig, SweeperEvent, SweeperHandle};
