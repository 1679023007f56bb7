//! In-memory token store.
//!
//! Each entity kind lives in its own `RwLock`-guarded map. Operations that
//! touch several maps acquire the locks in one fixed order (users, clients,
//! codes, access tokens, refresh tokens) so they cannot deadlock each other.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, trace};
use uuid::Uuid;

use warden_core::{
    AccessToken, AuthCode, CleanupStats, Client, Error, RefreshToken, Result, TokenStore, User,
};

/// [`TokenStore`] backed by process memory. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    users: RwLock<HashMap<Uuid, User>>,
    clients: RwLock<HashMap<String, Client>>,
    codes: RwLock<HashMap<String, AuthCode>>,
    access_tokens: RwLock<HashMap<String, AccessToken>>,
    refresh_tokens: RwLock<HashMap<String, RefreshToken>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get_client(&self, client_id: &str) -> Result<Client> {
        self.clients
            .read()
            .await
            .get(client_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("client {}", client_id)))
    }

    async fn put_client(&self, client: Client) -> Result<()> {
        let mut clients = self.clients.write().await;
        if let Some(user_id) = client.user_id {
            let taken = clients
                .values()
                .any(|c| c.user_id == Some(user_id) && c.client_id != client.client_id);
            if taken {
                return Err(Error::Conflict(format!(
                    "user {} already owns a client",
                    user_id
                )));
            }
        }
        clients.insert(client.client_id.clone(), client);
        Ok(())
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        let mut clients = self.clients.write().await;
        let mut codes = self.codes.write().await;
        let mut access = self.access_tokens.write().await;
        let mut refresh = self.refresh_tokens.write().await;

        clients
            .remove(client_id)
            .ok_or_else(|| Error::NotFound(format!("client {}", client_id)))?;
        codes.retain(|_, c| c.client_id != client_id);
        access.retain(|_, t| t.client_id != client_id);
        refresh.retain(|_, t| t.client_id != client_id);
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<User> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("user {}", id)))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("user {}", username)))
    }

    async fn put_user(&self, user: User) -> Result<()> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.username == user.username && u.id != user.id)
        {
            return Err(Error::Conflict(format!(
                "username {} is taken",
                user.username
            )));
        }
        users.insert(user.id, user);
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<()> {
        let mut users = self.users.write().await;
        let mut clients = self.clients.write().await;
        let mut codes = self.codes.write().await;
        let mut access = self.access_tokens.write().await;
        let mut refresh = self.refresh_tokens.write().await;

        users
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("user {}", id)))?;

        for client in clients.values_mut().filter(|c| c.user_id == Some(id)) {
            client.user_id = None;
        }
        for code in codes.values_mut().filter(|c| c.user_id == Some(id)) {
            code.user_id = None;
        }
        access.retain(|_, t| t.user_id != Some(id));
        refresh.retain(|_, t| t.user_id != Some(id));
        Ok(())
    }

    async fn get_auth_code(&self, code: &str) -> Result<AuthCode> {
        self.codes
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or_else(|| Error::NotFound("authorization code".to_string()))
    }

    async fn put_auth_code(&self, code: AuthCode) -> Result<()> {
        let mut codes = self.codes.write().await;
        if codes.contains_key(&code.code) {
            return Err(Error::Conflict("authorization code exists".to_string()));
        }
        codes.insert(code.code.clone(), code);
        Ok(())
    }

    async fn consume_auth_code(&self, code: &str) -> Result<AuthCode> {
        let mut codes = self.codes.write().await;
        let entry = codes
            .get_mut(code)
            .ok_or_else(|| Error::NotFound("authorization code".to_string()))?;
        if entry.consumed {
            trace!(
                subsystem = "store",
                component = "memory",
                op = "consume_auth_code",
                client_id = %entry.client_id,
                "Compare-and-mark lost: code already consumed"
            );
            return Err(Error::Conflict("authorization code already consumed".to_string()));
        }
        entry.consumed = true;
        Ok(entry.clone())
    }

    async fn delete_auth_code(&self, code: &str) -> Result<()> {
        self.codes
            .write()
            .await
            .remove(code)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound("authorization code".to_string()))
    }

    async fn get_access_token(&self, token_hash: &str) -> Result<AccessToken> {
        self.access_tokens
            .read()
            .await
            .get(token_hash)
            .cloned()
            .ok_or_else(|| Error::NotFound("access token".to_string()))
    }

    async fn put_access_token(&self, token: AccessToken) -> Result<()> {
        self.access_tokens
            .write()
            .await
            .insert(token.token_hash.clone(), token);
        Ok(())
    }

    async fn delete_access_token(&self, token_hash: &str) -> Result<()> {
        self.access_tokens
            .write()
            .await
            .remove(token_hash)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound("access token".to_string()))
    }

    async fn get_refresh_token(&self, token_hash: &str) -> Result<RefreshToken> {
        self.refresh_tokens
            .read()
            .await
            .get(token_hash)
            .cloned()
            .ok_or_else(|| Error::NotFound("refresh token".to_string()))
    }

    async fn put_refresh_token(&self, token: RefreshToken) -> Result<()> {
        self.refresh_tokens
            .write()
            .await
            .insert(token.token_hash.clone(), token);
        Ok(())
    }

    async fn delete_refresh_token(&self, token_hash: &str) -> Result<RefreshToken> {
        self.refresh_tokens
            .write()
            .await
            .remove(token_hash)
            .ok_or_else(|| Error::NotFound("refresh token".to_string()))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<CleanupStats> {
        let mut codes = self.codes.write().await;
        let mut access = self.access_tokens.write().await;
        let mut refresh = self.refresh_tokens.write().await;

        let (codes_before, access_before, refresh_before) =
            (codes.len(), access.len(), refresh.len());
        codes.retain(|_, c| !c.is_expired(now));
        access.retain(|_, t| !t.is_expired(now));
        refresh.retain(|_, t| !t.is_expired(now));

        let stats = CleanupStats {
            codes_deleted: (codes_before - codes.len()) as u64,
            access_tokens_deleted: (access_before - access.len()) as u64,
            refresh_tokens_deleted: (refresh_before - refresh.len()) as u64,
        };
        debug!(
            subsystem = "store",
            component = "memory",
            op = "delete_expired",
            codes_deleted = stats.codes_deleted,
            tokens_deleted = stats.tokens_deleted(),
            "Expired rows removed"
        );
        Ok(stats)
    }
}
