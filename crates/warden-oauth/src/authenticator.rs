//! Client and user authentication.

use std::sync::{Arc, OnceLock};

use tracing::{debug, instrument, warn};

use warden_core::secrets::{hash_password, verify_password, verify_secret};
use warden_core::{Client, Error, GrantType, Result, TokenStore, User};

/// Validates client credentials, grant types and redirect URIs.
///
/// Every failure that would reveal whether a client exists (unknown id,
/// inactive client, wrong secret) is reported as the same `InvalidClient`.
#[derive(Clone)]
pub struct ClientAuthenticator {
    store: Arc<dyn TokenStore>,
}

impl ClientAuthenticator {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Authenticate a confidential client presenting its secret.
    ///
    /// `redirect_uri`, when given, must be one of the client's registered URIs.
    #[instrument(
        skip(self, client_secret, redirect_uri),
        fields(subsystem = "oauth", component = "client_authenticator", op = "authenticate", grant_type = %grant_type)
    )]
    pub async fn authenticate(
        &self,
        client_id: &str,
        client_secret: &str,
        grant_type: GrantType,
        redirect_uri: Option<&str>,
    ) -> Result<Client> {
        let client = self.verify(client_id, client_secret).await?;

        check_grant(&client, grant_type)?;
        if let Some(uri) = redirect_uri {
            check_redirect(&client, uri)?;
        }

        debug!(client_id, "Client authenticated");
        Ok(client)
    }

    /// Check only that the client exists, is active and presented its secret.
    /// Used by endpoints that are not tied to a grant type, like revocation.
    pub async fn verify(&self, client_id: &str, client_secret: &str) -> Result<Client> {
        let client = self.load_active(client_id).await?;
        if !verify_secret(client_secret, &client.secret_hash) {
            warn!(client_id, "Client secret rejected");
            return Err(Error::InvalidClient("invalid client credentials".to_string()));
        }
        Ok(client)
    }

    /// Identify a client at the authorization step, where no secret is
    /// presented. Performs every check of [`authenticate`](Self::authenticate)
    /// except the secret comparison.
    #[instrument(
        skip(self, redirect_uri),
        fields(subsystem = "oauth", component = "client_authenticator", op = "identify", grant_type = %grant_type)
    )]
    pub async fn identify(
        &self,
        client_id: &str,
        grant_type: GrantType,
        redirect_uri: &str,
    ) -> Result<Client> {
        let client = self.load_active(client_id).await?;
        check_grant(&client, grant_type)?;
        check_redirect(&client, redirect_uri)?;
        Ok(client)
    }

    async fn load_active(&self, client_id: &str) -> Result<Client> {
        let client = match self.store.get_client(client_id).await {
            Ok(client) => client,
            Err(Error::NotFound(_)) => {
                warn!(client_id, "Unknown client");
                return Err(Error::InvalidClient("invalid client credentials".to_string()));
            }
            Err(e) => return Err(e),
        };

        if !client.is_active {
            warn!(client_id, "Inactive client");
            return Err(Error::InvalidClient("invalid client credentials".to_string()));
        }
        Ok(client)
    }
}

fn check_grant(client: &Client, grant_type: GrantType) -> Result<()> {
    if client.allows_grant(grant_type) {
        Ok(())
    } else {
        warn!(client_id = %client.client_id, grant_type = %grant_type, "Grant type not allowed for client");
        Err(Error::UnauthorizedGrantType(format!(
            "client may not use {}",
            grant_type
        )))
    }
}

pub(crate) fn check_redirect(client: &Client, redirect_uri: &str) -> Result<()> {
    if client.allows_redirect(redirect_uri) {
        Ok(())
    } else {
        warn!(client_id = %client.client_id, "Redirect URI not registered for client");
        Err(Error::InvalidRedirectUri(
            "redirect_uri is not registered for this client".to_string(),
        ))
    }
}

/// Authenticates resource owners by username and password.
#[derive(Clone)]
pub struct UserAuthenticator {
    store: Arc<dyn TokenStore>,
}

impl UserAuthenticator {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Verify a username/password pair. Unknown users, disabled users and
    /// wrong passwords all yield the same `Unauthorized`, and all of them pay
    /// for one Argon2 verification.
    #[instrument(
        skip(self, password),
        fields(subsystem = "oauth", component = "user_authenticator", op = "authenticate")
    )]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let user = match self.store.get_user_by_username(username).await {
            Ok(user) => Some(user),
            Err(Error::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        let password = password.to_string();
        let phc = user.as_ref().map(|u| u.password_hash.clone());
        let matches = run_blocking(move || match phc {
            Some(phc) => verify_password(&password, &phc),
            None => {
                if let Some(dummy) = dummy_password_hash() {
                    let _ = verify_password(&password, dummy);
                }
                Ok(false)
            }
        })
        .await?;

        let Some(user) = user else {
            warn!("Unknown username");
            return Err(Error::Unauthorized("invalid username or password".to_string()));
        };
        if !user.enabled {
            warn!(user_id = %user.id, "Disabled user attempted login");
            return Err(Error::Unauthorized("invalid username or password".to_string()));
        }
        if !matches {
            warn!(user_id = %user.id, "Password rejected");
            return Err(Error::Unauthorized("invalid username or password".to_string()));
        }

        debug!(user_id = %user.id, "User authenticated");
        Ok(user)
    }
}

/// PHC string verified against when the username is unknown. Computed once,
/// on first use; `None` if hashing failed.
fn dummy_password_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password("warden-unknown-user").ok())
        .as_deref()
}

/// Run CPU-heavy credential work (Argon2) off the async executor.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("blocking task failed: {e}")))?
}
