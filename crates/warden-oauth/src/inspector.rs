//! Access token validation, introspection (RFC 7662) and revocation (RFC 7009).

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use warden_core::defaults::TOKEN_TYPE_BEARER;
use warden_core::secrets::hash_secret;
use warden_core::{AccessToken, Error, RefreshToken, Result, TokenIntrospectionResponse, TokenStore};

const REFRESH_TOKEN_HINT: &str = "refresh_token";

/// Read-side view over issued tokens.
#[derive(Clone)]
pub struct TokenInspector {
    store: Arc<dyn TokenStore>,
}

impl TokenInspector {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Resolve a bearer token to its stored grant.
    ///
    /// Unknown, revoked and expired tokens all yield `InvalidToken`.
    #[instrument(
        skip_all,
        fields(subsystem = "oauth", component = "token_inspector", op = "validate")
    )]
    pub async fn validate_access_token(&self, token: &str) -> Result<AccessToken> {
        let stored = match self.store.get_access_token(&hash_secret(token)).await {
            Ok(stored) => stored,
            Err(Error::NotFound(_)) => {
                return Err(Error::InvalidToken("unknown access token".to_string()))
            }
            Err(e) => return Err(e),
        };
        if stored.is_expired(Utc::now()) {
            debug!(client_id = %stored.client_id, "Expired access token presented");
            return Err(Error::InvalidToken("access token has expired".to_string()));
        }
        Ok(stored)
    }

    /// Describe a token. Anything that is not a live token is reported as
    /// `{"active": false}` with no other fields.
    #[instrument(
        skip(self, token),
        fields(subsystem = "oauth", component = "token_inspector", op = "introspect")
    )]
    pub async fn introspect(
        &self,
        token: &str,
        token_type_hint: Option<&str>,
    ) -> Result<TokenIntrospectionResponse> {
        let hash = hash_secret(token);
        let now = Utc::now();

        let found = if token_type_hint == Some(REFRESH_TOKEN_HINT) {
            match self.find_refresh(&hash).await? {
                Some(t) => Some(Found::Refresh(t)),
                None => self.find_access(&hash).await?.map(Found::Access),
            }
        } else {
            match self.find_access(&hash).await? {
                Some(t) => Some(Found::Access(t)),
                None => self.find_refresh(&hash).await?.map(Found::Refresh),
            }
        };

        let response = match found {
            Some(Found::Access(t)) if !t.is_expired(now) => TokenIntrospectionResponse {
                active: true,
                scope: Some(t.scope.to_string()),
                client_id: Some(t.client_id),
                username: self.username(t.user_id).await?,
                token_type: Some(TOKEN_TYPE_BEARER.to_string()),
                exp: Some(t.expires_at.timestamp()),
                iat: Some(t.created_at.timestamp()),
                sub: t.user_id.map(|id| id.to_string()),
            },
            Some(Found::Refresh(t)) if !t.is_expired(now) => TokenIntrospectionResponse {
                active: true,
                scope: Some(t.scope.to_string()),
                client_id: Some(t.client_id),
                username: self.username(t.user_id).await?,
                token_type: Some(REFRESH_TOKEN_HINT.to_string()),
                exp: t.expires_at.map(|e| e.timestamp()),
                iat: Some(t.created_at.timestamp()),
                sub: t.user_id.map(|id| id.to_string()),
            },
            _ => TokenIntrospectionResponse::inactive(),
        };

        debug!(active = response.active, "Token introspected");
        Ok(response)
    }

    /// Revoke a token on behalf of `client_id`.
    ///
    /// Revoking a refresh token also revokes the access token issued with it.
    /// Returns `false` for tokens that are already gone; a token owned by
    /// another client is `Unauthorized`.
    #[instrument(
        skip(self, token),
        fields(subsystem = "oauth", component = "token_inspector", op = "revoke", client_id = %client_id)
    )]
    pub async fn revoke(
        &self,
        client_id: &str,
        token: &str,
        token_type_hint: Option<&str>,
    ) -> Result<bool> {
        let hash = hash_secret(token);

        let revoked = if token_type_hint == Some(REFRESH_TOKEN_HINT) {
            match self.revoke_refresh(client_id, &hash).await? {
                true => true,
                false => self.revoke_access(client_id, &hash).await?,
            }
        } else {
            match self.revoke_access(client_id, &hash).await? {
                true => true,
                false => self.revoke_refresh(client_id, &hash).await?,
            }
        };

        if revoked {
            info!("Token revoked");
        } else {
            debug!("Revocation of unknown token ignored");
        }
        Ok(revoked)
    }

    async fn revoke_access(&self, client_id: &str, hash: &str) -> Result<bool> {
        let Some(token) = self.find_access(hash).await? else {
            return Ok(false);
        };
        ensure_owner(client_id, &token.client_id)?;
        ignore_missing(self.store.delete_access_token(hash).await)
    }

    async fn revoke_refresh(&self, client_id: &str, hash: &str) -> Result<bool> {
        let Some(token) = self.find_refresh(hash).await? else {
            return Ok(false);
        };
        ensure_owner(client_id, &token.client_id)?;
        let removed = match self.store.delete_refresh_token(hash).await {
            Ok(_) => true,
            Err(Error::NotFound(_)) => false,
            Err(e) => return Err(e),
        };
        ignore_missing(self.store.delete_access_token(&token.access_token_hash).await)?;
        Ok(removed)
    }

    async fn find_access(&self, hash: &str) -> Result<Option<AccessToken>> {
        match self.store.get_access_token(hash).await {
            Ok(t) => Ok(Some(t)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_refresh(&self, hash: &str) -> Result<Option<RefreshToken>> {
        match self.store.get_refresh_token(hash).await {
            Ok(t) => Ok(Some(t)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn username(&self, user_id: Option<Uuid>) -> Result<Option<String>> {
        let Some(id) = user_id else {
            return Ok(None);
        };
        match self.store.get_user(id).await {
            Ok(user) => Ok(Some(user.username)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

enum Found {
    Access(AccessToken),
    Refresh(RefreshToken),
}

fn ensure_owner(client_id: &str, owner: &str) -> Result<()> {
    if client_id == owner {
        Ok(())
    } else {
        warn!(client_id, "Client attempted to revoke another client's token");
        Err(Error::Unauthorized(
            "token was issued to another client".to_string(),
        ))
    }
}

fn ignore_missing(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(Error::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}
