//! Token issuance: authorization code, refresh token and client credentials
//! grants.
//!
//! Authorization codes are redeemed through the store's compare-and-mark
//! operation, so two concurrent redemptions of one code produce exactly one
//! token pair. Refresh tokens rotate: each use removes the presented token
//! (atomically, through the store) and issues a new pair.
//!
//! Refresh tokens are only issued to clients registered for the
//! `refresh_token` grant.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use warden_core::defaults::{
    ACCESS_TOKEN_PREFIX, PKCE_VERIFIER_MAX_LENGTH, PKCE_VERIFIER_MIN_LENGTH, REDEEM_MAX_ATTEMPTS,
    REFRESH_TOKEN_PREFIX, TOKEN_LENGTH,
};
use warden_core::secrets::{generate_secret, hash_secret};
use warden_core::{
    AccessToken, AuthCode, Client, Error, GrantType, IssuedTokens, OAuthConfig, RefreshToken,
    Result, Scope, TokenStore,
};

use crate::authenticator::ClientAuthenticator;

/// Parameters of an authorization code redemption.
#[derive(Debug, Clone, Copy)]
pub struct CodeExchange<'a> {
    pub code: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    /// Must equal the redirect URI the code was issued for.
    pub redirect_uri: &'a str,
    pub code_verifier: Option<&'a str>,
}

/// Parameters of a refresh token grant.
#[derive(Debug, Clone, Copy)]
pub struct RefreshExchange<'a> {
    pub refresh_token: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    /// Optional narrower scope; `None` keeps the original grant's scope.
    pub scope: Option<&'a Scope>,
}

/// Validates grants and issues access/refresh token pairs.
#[derive(Clone)]
pub struct TokenExchanger {
    store: Arc<dyn TokenStore>,
    authenticator: ClientAuthenticator,
    config: OAuthConfig,
}

impl TokenExchanger {
    pub fn new(store: Arc<dyn TokenStore>, config: OAuthConfig) -> Self {
        Self {
            authenticator: ClientAuthenticator::new(Arc::clone(&store)),
            store,
            config,
        }
    }

    /// Redeem an authorization code for an access/refresh token pair.
    ///
    /// Fails with `InvalidGrant` when the code is unknown, consumed, expired,
    /// bound to another client or the PKCE verifier does not match, and with
    /// `RedirectMismatch` when `redirect_uri` differs from the issuance one.
    #[instrument(
        skip(self, req),
        fields(
            subsystem = "oauth",
            component = "token_exchanger",
            op = "exchange_code",
            client_id = %req.client_id,
            grant_type = "authorization_code",
        )
    )]
    pub async fn exchange_code(&self, req: CodeExchange<'_>) -> Result<IssuedTokens> {
        let start = Instant::now();
        let client = self
            .authenticator
            .authenticate(
                req.client_id,
                req.client_secret,
                GrantType::AuthorizationCode,
                None,
            )
            .await?;
        let now = Utc::now();

        for attempt in 1..=REDEEM_MAX_ATTEMPTS {
            let code = match self.store.get_auth_code(req.code).await {
                Ok(code) => code,
                Err(Error::NotFound(_)) => {
                    warn!(attempt, "Unknown authorization code presented");
                    return Err(Error::InvalidGrant("unknown authorization code".to_string()));
                }
                Err(e) => return Err(e),
            };

            check_code(&code, &client, &req, now)?;

            match self.store.consume_auth_code(req.code).await {
                Ok(consumed) => {
                    let with_refresh = client.allows_grant(GrantType::RefreshToken);
                    let issued = self
                        .issue_pair(&client.client_id, consumed.user_id, consumed.scope, with_refresh)
                        .await?;
                    info!(
                        user_id = ?issued.user_id,
                        scope = %issued.scope,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Authorization code redeemed"
                    );
                    return Ok(issued);
                }
                Err(Error::Conflict(_)) => {
                    // Lost the race; the re-read on the next attempt sees the
                    // consumed flag.
                    warn!(attempt, "Concurrent redemption of authorization code");
                    continue;
                }
                Err(Error::NotFound(_)) => {
                    return Err(Error::InvalidGrant("unknown authorization code".to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::InvalidGrant(
            "authorization code has already been used".to_string(),
        ))
    }

    /// Rotate a refresh token into a new access/refresh pair.
    #[instrument(
        skip(self, req),
        fields(
            subsystem = "oauth",
            component = "token_exchanger",
            op = "refresh",
            client_id = %req.client_id,
            grant_type = "refresh_token",
        )
    )]
    pub async fn refresh(&self, req: RefreshExchange<'_>) -> Result<IssuedTokens> {
        let client = self
            .authenticator
            .authenticate(req.client_id, req.client_secret, GrantType::RefreshToken, None)
            .await?;
        let now = Utc::now();
        let token_hash = hash_secret(req.refresh_token);

        let stored = match self.store.get_refresh_token(&token_hash).await {
            Ok(token) => token,
            Err(Error::NotFound(_)) => {
                warn!("Unknown refresh token presented");
                return Err(Error::InvalidGrant("invalid refresh token".to_string()));
            }
            Err(e) => return Err(e),
        };

        if stored.client_id != client.client_id {
            warn!("Refresh token presented by a different client");
            return Err(Error::InvalidGrant("invalid refresh token".to_string()));
        }
        if stored.is_expired(now) {
            return Err(Error::InvalidGrant("refresh token has expired".to_string()));
        }

        let scope = match req.scope {
            Some(requested) => Scope::narrow(requested, &stored.scope).ok_or_else(|| {
                Error::InvalidScope(format!(
                    "requested scope '{}' exceeds the original grant",
                    requested
                ))
            })?,
            None => stored.scope.clone(),
        };

        // Delete before issuing: the store's atomic removal decides which of
        // two concurrent refreshes wins, and the loser never sees a new pair.
        // A store failure after this point leaves the grant revoked, never
        // duplicated.
        match self.store.delete_refresh_token(&token_hash).await {
            Ok(_) => {}
            Err(Error::NotFound(_)) => {
                warn!("Refresh token rotated concurrently");
                return Err(Error::InvalidGrant("invalid refresh token".to_string()));
            }
            Err(e) => return Err(e),
        }

        match self.store.delete_access_token(&stored.access_token_hash).await {
            Ok(()) | Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let issued = self
            .issue_pair(&client.client_id, stored.user_id, scope, true)
            .await?;
        info!(scope = %issued.scope, "Refresh token rotated");
        Ok(issued)
    }

    /// Issue an access token to a client acting on its own behalf. No user is
    /// bound and no refresh token is issued.
    #[instrument(
        skip(self, client_secret, scope),
        fields(
            subsystem = "oauth",
            component = "token_exchanger",
            op = "client_credentials",
            grant_type = "client_credentials",
        )
    )]
    pub async fn client_credentials(
        &self,
        client_id: &str,
        client_secret: &str,
        scope: &Scope,
    ) -> Result<IssuedTokens> {
        let client = self
            .authenticator
            .authenticate(client_id, client_secret, GrantType::ClientCredentials, None)
            .await?;

        let granted = Scope::narrow(scope, &client.scope).ok_or_else(|| {
            Error::InvalidScope(format!(
                "requested scope '{}' exceeds the client's scope",
                scope
            ))
        })?;

        let issued = self
            .issue_pair(&client.client_id, None, granted, false)
            .await?;
        info!(scope = %issued.scope, "Client credentials token issued");
        Ok(issued)
    }

    async fn issue_pair(
        &self,
        client_id: &str,
        user_id: Option<Uuid>,
        scope: Scope,
        with_refresh: bool,
    ) -> Result<IssuedTokens> {
        let now = Utc::now();
        let access_expires_at = self.config.access_token_expiry(now)?;
        let refresh_expires_at = self.config.refresh_token_expiry(now)?;
        let access_token = format!("{}{}", ACCESS_TOKEN_PREFIX, generate_secret(TOKEN_LENGTH));
        let access_token_hash = hash_secret(&access_token);

        self.store
            .put_access_token(AccessToken {
                token_hash: access_token_hash.clone(),
                client_id: client_id.to_string(),
                user_id,
                scope: scope.clone(),
                expires_at: access_expires_at,
                created_at: now,
            })
            .await?;

        let refresh_token = if with_refresh {
            let refresh_token =
                format!("{}{}", REFRESH_TOKEN_PREFIX, generate_secret(TOKEN_LENGTH));
            let stored = self
                .store
                .put_refresh_token(RefreshToken {
                    token_hash: hash_secret(&refresh_token),
                    access_token_hash: access_token_hash.clone(),
                    client_id: client_id.to_string(),
                    user_id,
                    scope: scope.clone(),
                    expires_at: refresh_expires_at,
                    created_at: now,
                })
                .await;
            if let Err(e) = stored {
                // Never hand out half a pair.
                if let Err(cleanup) = self.store.delete_access_token(&access_token_hash).await {
                    warn!(error = %cleanup, "Failed to remove access token of incomplete pair");
                }
                return Err(e);
            }
            Some(refresh_token)
        } else {
            None
        };

        debug!(with_refresh, "Token pair stored");

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            expires_in: self.config.access_token_ttl_secs,
            scope,
            client_id: client_id.to_string(),
            user_id,
        })
    }
}

/// Validate a stored code against the redemption request.
fn check_code(
    code: &AuthCode,
    client: &Client,
    req: &CodeExchange<'_>,
    now: DateTime<Utc>,
) -> Result<()> {
    if code.consumed {
        warn!("Replayed authorization code");
        return Err(Error::InvalidGrant(
            "authorization code has already been used".to_string(),
        ));
    }
    if code.is_expired(now) {
        return Err(Error::InvalidGrant("authorization code has expired".to_string()));
    }
    if code.client_id != client.client_id {
        warn!("Authorization code presented by a different client");
        return Err(Error::InvalidGrant(
            "authorization code was issued to another client".to_string(),
        ));
    }
    if code.redirect_uri != req.redirect_uri {
        return Err(Error::RedirectMismatch(
            "redirect_uri does not match the authorization request".to_string(),
        ));
    }
    if let Some(challenge) = &code.code_challenge {
        let verifier = req
            .code_verifier
            .ok_or_else(|| Error::InvalidGrant("code_verifier is required".to_string()))?;
        let len_ok =
            (PKCE_VERIFIER_MIN_LENGTH..=PKCE_VERIFIER_MAX_LENGTH).contains(&verifier.len());
        if !len_ok || !challenge.verify(verifier) {
            return Err(Error::InvalidGrant("invalid code_verifier".to_string()));
        }
    }
    Ok(())
}
