//! Authorization code issuance.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use warden_core::defaults::AUTH_CODE_LENGTH;
use warden_core::secrets::generate_secret;
use warden_core::{
    AuthCode, Client, Error, GrantType, IssuedCode, OAuthConfig, PkceChallenge, Result, Scope,
    TokenStore, User,
};

use crate::authenticator::check_redirect;

/// What the resource owner approved at the authorization step.
#[derive(Debug, Clone)]
pub struct CodeRequest {
    pub redirect_uri: String,
    /// Requested scope; empty means the client's full scope.
    pub scope: Scope,
    pub state: Option<String>,
    pub code_challenge: Option<PkceChallenge>,
}

/// Generates single-use authorization codes bound to a client and a user.
#[derive(Clone)]
pub struct CodeIssuer {
    store: Arc<dyn TokenStore>,
    config: OAuthConfig,
}

impl CodeIssuer {
    pub fn new(store: Arc<dyn TokenStore>, config: OAuthConfig) -> Self {
        Self { store, config }
    }

    /// Issue a code for an already authenticated client and user.
    ///
    /// The plaintext code is returned once; the stored row expires after the
    /// configured code lifetime.
    #[instrument(
        skip(self, client, user, request),
        fields(
            subsystem = "oauth",
            component = "code_issuer",
            op = "issue",
            client_id = %client.client_id,
            user_id = %user.id,
        )
    )]
    pub async fn issue(
        &self,
        client: &Client,
        user: &User,
        request: CodeRequest,
    ) -> Result<IssuedCode> {
        check_redirect(client, &request.redirect_uri)?;

        if !client.allows_grant(GrantType::AuthorizationCode) {
            return Err(Error::UnauthorizedGrantType(
                "client may not use authorization_code".to_string(),
            ));
        }

        if !user.enabled {
            warn!("Code requested for disabled user");
            return Err(Error::Unauthorized("user is disabled".to_string()));
        }

        let scope = Scope::narrow(&request.scope, &client.scope).ok_or_else(|| {
            Error::InvalidScope(format!(
                "requested scope '{}' exceeds the client's scope",
                request.scope
            ))
        })?;

        if self.config.require_pkce && request.code_challenge.is_none() {
            return Err(Error::InvalidRequest("code_challenge is required".to_string()));
        }

        let now = Utc::now();
        let code = generate_secret(AUTH_CODE_LENGTH);
        let expires_at = self.config.auth_code_expiry(now)?;

        self.store
            .put_auth_code(AuthCode {
                code: code.clone(),
                client_id: client.client_id.clone(),
                user_id: Some(user.id),
                redirect_uri: request.redirect_uri.clone(),
                scope: scope.clone(),
                state: request.state.clone(),
                code_challenge: request.code_challenge,
                expires_at,
                consumed: false,
                created_at: now,
            })
            .await?;

        info!(scope = %scope, "Authorization code issued");

        Ok(IssuedCode {
            code,
            redirect_uri: request.redirect_uri,
            state: request.state,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use warden_core::defaults::DEFAULT_USER_ROLE;
    use warden_db::InMemoryTokenStore;

    fn client() -> Client {
        Client {
            id: Uuid::now_v7(),
            client_id: "c1".to_string(),
            client_name: "Test".to_string(),
            secret_hash: String::new(),
            redirect_uris: vec!["https://app.example/cb".to_string()],
            grant_types: vec![GrantType::AuthorizationCode],
            scope: Scope::parse("read write"),
            user_id: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn user() -> User {
        User {
            id: Uuid::now_v7(),
            username: "u1@example.com".to_string(),
            email: "u1@example.com".to_string(),
            password_hash: String::new(),
            roles: vec![DEFAULT_USER_ROLE.to_string()],
            enabled: true,
            created_at: Utc::now(),
        }
    }

    fn request(scope: &str) -> CodeRequest {
        CodeRequest {
            redirect_uri: "https://app.example/cb".to_string(),
            scope: Scope::parse(scope),
            state: Some("st".to_string()),
            code_challenge: None,
        }
    }

    #[tokio::test]
    async fn test_issue_persists_code() {
        let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
        let issuer = CodeIssuer::new(Arc::clone(&store), OAuthConfig::default());
        let (client, user) = (client(), user());

        let issued = issuer.issue(&client, &user, request("")).await.unwrap();
        assert_eq!(issued.code.len(), AUTH_CODE_LENGTH);
        assert_eq!(issued.state.as_deref(), Some("st"));

        let stored = store.get_auth_code(&issued.code).await.unwrap();
        assert_eq!(stored.user_id, Some(user.id));
        assert_eq!(stored.scope, client.scope);
        assert!(!stored.consumed);
        assert_eq!(stored.expires_at, issued.expires_at);
    }

    #[tokio::test]
    async fn test_issue_rejects_wider_scope() {
        let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
        let issuer = CodeIssuer::new(store, OAuthConfig::default());
        let err = issuer
            .issue(&client(), &user(), request("read admin"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidScope(_)));
    }

    #[tokio::test]
    async fn test_issue_rejects_unregistered_redirect() {
        let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
        let issuer = CodeIssuer::new(store, OAuthConfig::default());
        let mut req = request("read");
        req.redirect_uri = "https://elsewhere.example/cb".to_string();
        let err = issuer.issue(&client(), &user(), req).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRedirectUri(_)));
    }

    #[tokio::test]
    async fn test_issue_requires_pkce_when_configured() {
        let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
        let issuer = CodeIssuer::new(store, OAuthConfig::default().with_require_pkce(true));
        let err = issuer
            .issue(&client(), &user(), request("read"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_issue_rejects_disabled_user() {
        let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
        let issuer = CodeIssuer::new(store, OAuthConfig::default());
        let mut user = user();
        user.enabled = false;
        let err = issuer
            .issue(&client(), &user, request("read"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_codes_are_unique() {
        let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
        let issuer = CodeIssuer::new(store, OAuthConfig::default());
        let (client, user) = (client(), user());
        let a = issuer.issue(&client, &user, request("read")).await.unwrap();
        let b = issuer.issue(&client, &user, request("read")).await.unwrap();
        assert_ne!(a.code, b.code);
    }
}
