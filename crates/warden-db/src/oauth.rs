//! PostgreSQL token store.
//!
//! Rows map onto `warden_core` records through the `*_from_row` functions at
//! the bottom of this module; the records themselves know nothing about SQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, trace};
use uuid::Uuid;

use warden_core::{
    AccessToken, AuthCode, CleanupStats, Client, CodeChallengeMethod, Error, GrantType,
    PkceChallenge, RefreshToken, Result, Scope, TokenStore, User,
};

const CLIENT_COLUMNS: &str = "id, client_id, client_name, secret_hash, redirect_uris, \
     grant_types, scope, user_id, is_active, created_at";

const USER_COLUMNS: &str = "id, username, email, password_hash, roles, enabled, created_at";

const AUTH_CODE_COLUMNS: &str = "code, client_id, user_id, redirect_uri, scope, state, \
     code_challenge, code_challenge_method, expires_at, consumed, created_at";

const ACCESS_TOKEN_COLUMNS: &str = "token_hash, client_id, user_id, scope, expires_at, created_at";

const REFRESH_TOKEN_COLUMNS: &str =
    "token_hash, access_token_hash, client_id, user_id, scope, expires_at, created_at";

/// PostgreSQL implementation of [`TokenStore`].
#[derive(Clone)]
pub struct PgTokenStore {
    pool: Pool<Postgres>,
}

impl PgTokenStore {
    /// Create a new PgTokenStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Map a unique-constraint violation to `Conflict`, everything else to `Database`.
fn map_write_error(e: sqlx::Error, what: &str) -> Error {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::Conflict(format!("{} violates a uniqueness constraint", what))
        }
        _ => Error::Database(e),
    }
}

fn not_found_if_zero(rows: u64, what: impl FnOnce() -> String) -> Result<()> {
    if rows == 0 {
        Err(Error::NotFound(what()))
    } else {
        Ok(())
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    // =========================================================================
    // CLIENTS
    // =========================================================================

    async fn get_client(&self, client_id: &str) -> Result<Client> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM oauth_client WHERE client_id = $1",
            CLIENT_COLUMNS
        ))
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("client {}", client_id)))?;

        client_from_row(&row)
    }

    async fn put_client(&self, client: Client) -> Result<()> {
        let grant_types: Vec<String> = client
            .grant_types
            .iter()
            .map(|g| g.as_str().to_string())
            .collect();

        sqlx::query(
            r#"INSERT INTO oauth_client (
                id, client_id, client_name, secret_hash, redirect_uris,
                grant_types, scope, user_id, is_active, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (client_id) DO UPDATE SET
                client_name = EXCLUDED.client_name,
                secret_hash = EXCLUDED.secret_hash,
                redirect_uris = EXCLUDED.redirect_uris,
                grant_types = EXCLUDED.grant_types,
                scope = EXCLUDED.scope,
                user_id = EXCLUDED.user_id,
                is_active = EXCLUDED.is_active"#,
        )
        .bind(client.id)
        .bind(&client.client_id)
        .bind(&client.client_name)
        .bind(&client.secret_hash)
        .bind(&client.redirect_uris)
        .bind(&grant_types)
        .bind(client.scope.to_string())
        .bind(client.user_id)
        .bind(client.is_active)
        .bind(client.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "client"))?;

        Ok(())
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        // Codes and tokens go with the client via ON DELETE CASCADE.
        let rows = sqlx::query("DELETE FROM oauth_client WHERE client_id = $1")
            .bind(client_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?
            .rows_affected();
        not_found_if_zero(rows, || format!("client {}", client_id))
    }

    // =========================================================================
    // USERS
    // =========================================================================

    async fn get_user(&self, id: Uuid) -> Result<User> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM oauth_user WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("user {}", id)))?;

        Ok(user_from_row(&row))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM oauth_user WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("user {}", username)))?;

        Ok(user_from_row(&row))
    }

    async fn put_user(&self, user: User) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO oauth_user (
                id, username, email, password_hash, roles, enabled, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                username = EXCLUDED.username,
                email = EXCLUDED.email,
                password_hash = EXCLUDED.password_hash,
                roles = EXCLUDED.roles,
                enabled = EXCLUDED.enabled"#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.roles)
        .bind(user.enabled)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "user"))?;

        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Owned clients and codes are detached; owned tokens are deleted.
        sqlx::query("UPDATE oauth_client SET user_id = NULL WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        sqlx::query("UPDATE oauth_auth_code SET user_id = NULL WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        sqlx::query("DELETE FROM oauth_access_token WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        sqlx::query("DELETE FROM oauth_refresh_token WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let rows = sqlx::query("DELETE FROM oauth_user WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();

        if rows == 0 {
            tx.rollback().await.map_err(Error::Database)?;
            return Err(Error::NotFound(format!("user {}", id)));
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    // =========================================================================
    // AUTHORIZATION CODES
    // =========================================================================

    async fn get_auth_code(&self, code: &str) -> Result<AuthCode> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM oauth_auth_code WHERE code = $1",
            AUTH_CODE_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound("authorization code".to_string()))?;

        auth_code_from_row(&row)
    }

    async fn put_auth_code(&self, code: AuthCode) -> Result<()> {
        let (challenge, method) = match &code.code_challenge {
            Some(pkce) => (Some(pkce.challenge.as_str()), Some(pkce.method.as_str())),
            None => (None, None),
        };

        sqlx::query(
            r#"INSERT INTO oauth_auth_code (
                code, client_id, user_id, redirect_uri, scope, state,
                code_challenge, code_challenge_method, expires_at, consumed, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
        )
        .bind(&code.code)
        .bind(&code.client_id)
        .bind(code.user_id)
        .bind(&code.redirect_uri)
        .bind(code.scope.to_string())
        .bind(&code.state)
        .bind(challenge)
        .bind(method)
        .bind(code.expires_at)
        .bind(code.consumed)
        .bind(code.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "authorization code"))?;

        Ok(())
    }

    async fn consume_auth_code(&self, code: &str) -> Result<AuthCode> {
        // A single conditional UPDATE: of any number of concurrent callers,
        // only one sees consumed = false.
        let row = sqlx::query(&format!(
            "UPDATE oauth_auth_code SET consumed = true \
             WHERE code = $1 AND consumed = false RETURNING {}",
            AUTH_CODE_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if let Some(row) = row {
            return auth_code_from_row(&row);
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM oauth_auth_code WHERE code = $1)")
                .bind(code)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;

        if exists {
            trace!(
                subsystem = "store",
                component = "postgres",
                op = "consume_auth_code",
                "Compare-and-mark lost: code already consumed"
            );
            Err(Error::Conflict("authorization code already consumed".to_string()))
        } else {
            Err(Error::NotFound("authorization code".to_string()))
        }
    }

    async fn delete_auth_code(&self, code: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM oauth_auth_code WHERE code = $1")
            .bind(code)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?
            .rows_affected();
        not_found_if_zero(rows, || "authorization code".to_string())
    }

    // =========================================================================
    // ACCESS TOKENS
    // =========================================================================

    async fn get_access_token(&self, token_hash: &str) -> Result<AccessToken> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM oauth_access_token WHERE token_hash = $1",
            ACCESS_TOKEN_COLUMNS
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound("access token".to_string()))?;

        Ok(access_token_from_row(&row))
    }

    async fn put_access_token(&self, token: AccessToken) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO oauth_access_token (
                token_hash, client_id, user_id, scope, expires_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(&token.token_hash)
        .bind(&token.client_id)
        .bind(token.user_id)
        .bind(token.scope.to_string())
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "access token"))?;

        Ok(())
    }

    async fn delete_access_token(&self, token_hash: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM oauth_access_token WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?
            .rows_affected();
        not_found_if_zero(rows, || "access token".to_string())
    }

    // =========================================================================
    // REFRESH TOKENS
    // =========================================================================

    async fn get_refresh_token(&self, token_hash: &str) -> Result<RefreshToken> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM oauth_refresh_token WHERE token_hash = $1",
            REFRESH_TOKEN_COLUMNS
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound("refresh token".to_string()))?;

        Ok(refresh_token_from_row(&row))
    }

    async fn put_refresh_token(&self, token: RefreshToken) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO oauth_refresh_token (
                token_hash, access_token_hash, client_id, user_id, scope, expires_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(&token.token_hash)
        .bind(&token.access_token_hash)
        .bind(&token.client_id)
        .bind(token.user_id)
        .bind(token.scope.to_string())
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "refresh token"))?;

        Ok(())
    }

    async fn delete_refresh_token(&self, token_hash: &str) -> Result<RefreshToken> {
        let row = sqlx::query(&format!(
            "DELETE FROM oauth_refresh_token WHERE token_hash = $1 RETURNING {}",
            REFRESH_TOKEN_COLUMNS
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound("refresh token".to_string()))?;

        Ok(refresh_token_from_row(&row))
    }

    // =========================================================================
    // CLEANUP
    // =========================================================================

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<CleanupStats> {
        let codes_deleted = sqlx::query("DELETE FROM oauth_auth_code WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?
            .rows_affected();

        let access_tokens_deleted =
            sqlx::query("DELETE FROM oauth_access_token WHERE expires_at <= $1")
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?
                .rows_affected();

        let refresh_tokens_deleted = sqlx::query(
            "DELETE FROM oauth_refresh_token WHERE expires_at IS NOT NULL AND expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        let stats = CleanupStats {
            codes_deleted,
            access_tokens_deleted,
            refresh_tokens_deleted,
        };
        debug!(
            subsystem = "store",
            component = "postgres",
            op = "delete_expired",
            codes_deleted = stats.codes_deleted,
            tokens_deleted = stats.tokens_deleted(),
            "Expired rows removed"
        );
        Ok(stats)
    }
}

// =============================================================================
// ROW MAPPING
// =============================================================================

fn client_from_row(r: &PgRow) -> Result<Client> {
    let grant_types = r
        .get::<Vec<String>, _>("grant_types")
        .iter()
        .map(|g| g.parse::<GrantType>().map_err(Error::Serialization))
        .collect::<Result<Vec<_>>>()?;

    Ok(Client {
        id: r.get("id"),
        client_id: r.get("client_id"),
        client_name: r.get("client_name"),
        secret_hash: r.get("secret_hash"),
        redirect_uris: r.get("redirect_uris"),
        grant_types,
        scope: Scope::parse(r.get("scope")),
        user_id: r.get("user_id"),
        is_active: r.get("is_active"),
        created_at: r.get("created_at"),
    })
}

fn user_from_row(r: &PgRow) -> User {
    User {
        id: r.get("id"),
        username: r.get("username"),
        email: r.get("email"),
        password_hash: r.get("password_hash"),
        roles: r.get("roles"),
        enabled: r.get("enabled"),
        created_at: r.get("created_at"),
    }
}

fn auth_code_from_row(r: &PgRow) -> Result<AuthCode> {
    let challenge: Option<String> = r.get("code_challenge");
    let method: Option<String> = r.get("code_challenge_method");
    let code_challenge = match challenge {
        Some(challenge) => {
            let method = match method {
                Some(m) => m
                    .parse::<CodeChallengeMethod>()
                    .map_err(Error::Serialization)?,
                None => CodeChallengeMethod::Plain,
            };
            Some(PkceChallenge { challenge, method })
        }
        None => None,
    };

    Ok(AuthCode {
        code: r.get("code"),
        client_id: r.get("client_id"),
        user_id: r.get("user_id"),
        redirect_uri: r.get("redirect_uri"),
        scope: Scope::parse(r.get("scope")),
        state: r.get("state"),
        code_challenge,
        expires_at: r.get("expires_at"),
        consumed: r.get("consumed"),
        created_at: r.get("created_at"),
    })
}

fn access_token_from_row(r: &PgRow) -> AccessToken {
    AccessToken {
        token_hash: r.get("token_hash"),
        client_id: r.get("client_id"),
        user_id: r.get("user_id"),
        scope: Scope::parse(r.get("scope")),
        expires_at: r.get("expires_at"),
        created_at: r.get("created_at"),
    }
}

fn refresh_token_from_row(r: &PgRow) -> RefreshToken {
    RefreshToken {
        token_hash: r.get("token_hash"),
        access_token_hash: r.get("access_token_hash"),
        client_id: r.get("client_id"),
        user_id: r.get("user_id"),
        scope: Scope::parse(r.get("scope")),
        expires_at: r.get("expires_at"),
        created_at: r.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_if_zero() {
        assert!(not_found_if_zero(1, || "x".to_string()).is_ok());
        assert!(not_found_if_zero(0, || "x".to_string())
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_non_unique_write_error_is_database() {
        let err = map_write_error(sqlx::Error::RowNotFound, "client");
        assert!(matches!(err, Error::Database(_)));
    }
}
