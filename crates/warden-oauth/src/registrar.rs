//! Client and user registration and lifecycle.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use warden_core::defaults::{
    CLIENT_ID_LENGTH, CLIENT_ID_PREFIX, CLIENT_SECRET_LENGTH, OAUTH_DEFAULT_SCOPE,
};
use warden_core::secrets::{generate_secret, hash_password, hash_secret};
use warden_core::{
    new_v7, Client, ClientRegistrationRequest, ClientRegistrationResponse, CreateUserRequest,
    Error, GrantType, Result, Scope, TokenStore, User,
};

use crate::authenticator::run_blocking;

/// Creates and maintains clients and users.
#[derive(Clone)]
pub struct Registrar {
    store: Arc<dyn TokenStore>,
}

impl Registrar {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Register a new confidential client.
    ///
    /// The generated secret is returned in the response and never again;
    /// only its hash is stored. Grant types default to `authorization_code`
    /// and `refresh_token`, scope defaults to `read`.
    #[instrument(
        skip(self, req),
        fields(subsystem = "oauth", component = "registrar", op = "register_client")
    )]
    pub async fn register_client(
        &self,
        req: ClientRegistrationRequest,
    ) -> Result<ClientRegistrationResponse> {
        let client_name = req.client_name.trim().to_string();
        if client_name.is_empty() {
            return Err(Error::InvalidRequest("client_name is required".to_string()));
        }

        let grant_types = if req.grant_types.is_empty() {
            GrantType::registration_defaults()
        } else {
            req.grant_types
                .iter()
                .map(|g| g.parse::<GrantType>().map_err(Error::InvalidRequest))
                .collect::<Result<Vec<_>>>()?
        };

        if grant_types.contains(&GrantType::AuthorizationCode) && req.redirect_uris.is_empty() {
            return Err(Error::InvalidRequest(
                "redirect_uris is required for authorization_code".to_string(),
            ));
        }
        for uri in &req.redirect_uris {
            validate_redirect_uri(uri)?;
        }

        let scope = match req.scope.as_deref().map(Scope::parse) {
            Some(scope) if !scope.is_empty() => scope,
            _ => Scope::parse(OAUTH_DEFAULT_SCOPE),
        };

        if let Some(user_id) = req.user_id {
            // Surfaces NotFound before anything is written.
            self.store.get_user(user_id).await?;
        }

        let now = Utc::now();
        let client_id = format!("{}{}", CLIENT_ID_PREFIX, generate_secret(CLIENT_ID_LENGTH));
        let client_secret = generate_secret(CLIENT_SECRET_LENGTH);

        self.store
            .put_client(Client {
                id: new_v7(),
                client_id: client_id.clone(),
                client_name: client_name.clone(),
                secret_hash: hash_secret(&client_secret),
                redirect_uris: req.redirect_uris.clone(),
                grant_types: grant_types.clone(),
                scope: scope.clone(),
                user_id: req.user_id,
                is_active: true,
                created_at: now,
            })
            .await?;

        info!(client_id = %client_id, "Client registered");

        Ok(ClientRegistrationResponse {
            client_id,
            client_secret,
            client_id_issued_at: now.timestamp(),
            client_name,
            redirect_uris: req.redirect_uris,
            grant_types: grant_types.iter().map(|g| g.as_str().to_string()).collect(),
            scope: scope.to_string(),
        })
    }

    /// Register a user. The email doubles as the login name.
    #[instrument(
        skip(self, req),
        fields(subsystem = "oauth", component = "registrar", op = "register_user")
    )]
    pub async fn register_user(&self, req: CreateUserRequest) -> Result<User> {
        let email = req.email.trim().to_string();
        if !email.contains('@') {
            return Err(Error::InvalidRequest("email is invalid".to_string()));
        }
        if req.password.is_empty() {
            return Err(Error::InvalidRequest("password is required".to_string()));
        }

        let roles = req.effective_roles();
        let password = req.password;
        let password_hash = run_blocking(move || hash_password(&password)).await?;

        let mut user = User {
            id: new_v7(),
            username: String::new(),
            email: String::new(),
            password_hash,
            roles,
            enabled: true,
            created_at: Utc::now(),
        };
        user.set_email(email);

        self.store.put_user(user.clone()).await?;
        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Link a user to a client. A user owns at most one client.
    #[instrument(
        skip(self),
        fields(subsystem = "oauth", component = "registrar", op = "link_user")
    )]
    pub async fn link_user(&self, client_id: &str, user_id: Uuid) -> Result<Client> {
        self.store.get_user(user_id).await?;
        let mut client = self.store.get_client(client_id).await?;
        if client.user_id == Some(user_id) {
            return Ok(client);
        }
        client.user_id = Some(user_id);
        self.store.put_client(client.clone()).await.inspect_err(|e| {
            if matches!(e, Error::Conflict(_)) {
                warn!("User already owns another client");
            }
        })?;
        info!("User linked to client");
        Ok(client)
    }

    /// Deactivate a client. Its outstanding codes and tokens stop working
    /// because the client no longer authenticates.
    #[instrument(
        skip(self),
        fields(subsystem = "oauth", component = "registrar", op = "deactivate_client")
    )]
    pub async fn deactivate_client(&self, client_id: &str) -> Result<()> {
        let mut client = self.store.get_client(client_id).await?;
        if !client.is_active {
            return Ok(());
        }
        client.is_active = false;
        self.store.put_client(client).await?;
        info!("Client deactivated");
        Ok(())
    }

    /// Change a user's email; the username follows it.
    #[instrument(
        skip(self, email),
        fields(subsystem = "oauth", component = "registrar", op = "update_user_email")
    )]
    pub async fn update_user_email(&self, user_id: Uuid, email: &str) -> Result<User> {
        let email = email.trim();
        if !email.contains('@') {
            return Err(Error::InvalidRequest("email is invalid".to_string()));
        }
        let mut user = self.store.get_user(user_id).await?;
        user.set_email(email);
        self.store.put_user(user.clone()).await?;
        Ok(user)
    }

    /// Delete a user. Their clients and codes survive without an owner; their
    /// tokens are removed.
    #[instrument(
        skip(self),
        fields(subsystem = "oauth", component = "registrar", op = "delete_user")
    )]
    pub async fn delete_user(&self, user_id: Uuid) -> Result<()> {
        self.store.delete_user(user_id).await?;
        info!("User deleted");
        Ok(())
    }
}

/// Registered redirect URIs must be absolute and carry no fragment.
///
/// Hierarchical custom schemes (`com.example.app:/cb`) are accepted for
/// native clients; opaque URIs like `mailto:` are not.
fn validate_redirect_uri(uri: &str) -> Result<()> {
    let parsed = url::Url::parse(uri).map_err(|e| {
        Error::InvalidRequest(format!("redirect_uri '{}' is not an absolute URI: {}", uri, e))
    })?;
    if parsed.cannot_be_a_base() {
        return Err(Error::InvalidRequest(format!(
            "redirect_uri '{}' is not a hierarchical URI",
            uri
        )));
    }
    if parsed.has_host() && parsed.host_str().map_or(true, str::is_empty) {
        return Err(Error::InvalidRequest(format!(
            "redirect_uri '{}' has an empty host",
            uri
        )));
    }
    if parsed.fragment().is_some() {
        return Err(Error::InvalidRequest(format!(
            "redirect_uri '{}' must not contain a fragment",
            uri
        )));
    }
    Ok(())
}
