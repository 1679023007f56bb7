//! Storage interface for the authorization server.
//!
//! Everything above the store (authentication, issuance, exchange) is written
//! against [`TokenStore`] so the same logic runs on PostgreSQL and in memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

/// Durable keyed storage for clients, users, authorization codes and tokens.
///
/// Getters return `Error::NotFound` for absent keys. Deletes of absent keys
/// also return `Error::NotFound` so callers can tell whether they removed
/// the row themselves.
#[async_trait]
pub trait TokenStore: Send + Sync {
    // ── Clients ────────────────────────────────────────────────────────────

    /// Fetch a client by its public identifier.
    async fn get_client(&self, client_id: &str) -> Result<Client>;

    /// Insert or replace a client.
    ///
    /// Fails with `Error::Conflict` when `client.user_id` is already linked to
    /// a different client.
    async fn put_client(&self, client: Client) -> Result<()>;

    async fn delete_client(&self, client_id: &str) -> Result<()>;

    // ── Users ──────────────────────────────────────────────────────────────

    async fn get_user(&self, id: Uuid) -> Result<User>;

    async fn get_user_by_username(&self, username: &str) -> Result<User>;

    /// Insert or replace a user. Fails with `Error::Conflict` when the
    /// username belongs to a different user.
    async fn put_user(&self, user: User) -> Result<()>;

    /// Delete a user. Clients and codes it owned are detached (owner becomes
    /// null); its access and refresh tokens are deleted.
    async fn delete_user(&self, id: Uuid) -> Result<()>;

    // ── Authorization codes ────────────────────────────────────────────────

    async fn get_auth_code(&self, code: &str) -> Result<AuthCode>;

    /// Insert a new code. Fails with `Error::Conflict` if the code exists.
    async fn put_auth_code(&self, code: AuthCode) -> Result<()>;

    /// Atomically flip `consumed` from false to true.
    ///
    /// Exactly one of any number of concurrent callers succeeds; the rest get
    /// `Error::Conflict`. An absent code yields `Error::NotFound`.
    async fn consume_auth_code(&self, code: &str) -> Result<AuthCode>;

    async fn delete_auth_code(&self, code: &str) -> Result<()>;

    // ── Access tokens ──────────────────────────────────────────────────────

    async fn get_access_token(&self, token_hash: &str) -> Result<AccessToken>;

    async fn put_access_token(&self, token: AccessToken) -> Result<()>;

    async fn delete_access_token(&self, token_hash: &str) -> Result<()>;

    // ── Refresh tokens ─────────────────────────────────────────────────────

    async fn get_refresh_token(&self, token_hash: &str) -> Result<RefreshToken>;

    async fn put_refresh_token(&self, token: RefreshToken) -> Result<()>;

    /// Atomically remove a refresh token. Of two concurrent callers exactly
    /// one succeeds; the other gets `Error::NotFound`.
    async fn delete_refresh_token(&self, token_hash: &str) -> Result<RefreshToken>;

    // ── Maintenance ────────────────────────────────────────────────────────

    /// Remove codes and tokens whose expiry is at or before `now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<CleanupStats>;
}
