//! Request-level facade over the OAuth components.
//!
//! An HTTP layer deserializes form parameters into [`AuthorizeRequest`] /
//! [`TokenRequest`], calls [`AuthorizationServer`], and renders the typed
//! response or converts the error with [`OAuthError::from`].
//!
//! [`OAuthError::from`]: warden_core::OAuthError

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use warden_core::defaults::{PKCE_VERIFIER_MAX_LENGTH, PKCE_VERIFIER_MIN_LENGTH};
use warden_core::{
    AuthorizeRequest, AuthorizeResponse, CodeChallengeMethod, Error, GrantType,
    IntrospectionRequest, OAuthConfig, PkceChallenge, Result, RevocationRequest, Scope,
    TokenIntrospectionResponse, TokenRequest, TokenResponse, TokenStore,
};

use crate::authenticator::{ClientAuthenticator, UserAuthenticator};
use crate::exchanger::{CodeExchange, RefreshExchange, TokenExchanger};
use crate::inspector::TokenInspector;
use crate::issuer::{CodeIssuer, CodeRequest};
use crate::registrar::Registrar;

const RESPONSE_TYPE_CODE: &str = "code";

/// All OAuth components wired to one store and one configuration.
#[derive(Clone)]
pub struct AuthorizationServer {
    store: Arc<dyn TokenStore>,
    config: OAuthConfig,
    clients: ClientAuthenticator,
    users: UserAuthenticator,
    issuer: CodeIssuer,
    exchanger: TokenExchanger,
    inspector: TokenInspector,
    registrar: Registrar,
}

impl AuthorizationServer {
    /// Build a server. Fails with `Config` if the configuration is invalid.
    pub fn new(store: Arc<dyn TokenStore>, config: OAuthConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            auth_code_ttl_secs = config.auth_code_ttl_secs,
            access_token_ttl_secs = config.access_token_ttl_secs,
            refresh_token_ttl_secs = config.refresh_token_ttl_secs,
            require_pkce = config.require_pkce,
            "Authorization server configured"
        );
        Ok(Self {
            clients: ClientAuthenticator::new(Arc::clone(&store)),
            users: UserAuthenticator::new(Arc::clone(&store)),
            issuer: CodeIssuer::new(Arc::clone(&store), config.clone()),
            exchanger: TokenExchanger::new(Arc::clone(&store), config.clone()),
            inspector: TokenInspector::new(Arc::clone(&store)),
            registrar: Registrar::new(Arc::clone(&store)),
            store,
            config,
        })
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn clients(&self) -> &ClientAuthenticator {
        &self.clients
    }

    pub fn users(&self) -> &UserAuthenticator {
        &self.users
    }

    pub fn issuer(&self) -> &CodeIssuer {
        &self.issuer
    }

    pub fn exchanger(&self) -> &TokenExchanger {
        &self.exchanger
    }

    pub fn inspector(&self) -> &TokenInspector {
        &self.inspector
    }

    pub fn registrar(&self) -> &Registrar {
        &self.registrar
    }

    /// Handle an approved authorization request and produce the redirect back
    /// to the client.
    #[instrument(
        skip(self, req),
        fields(subsystem = "oauth", component = "authorization_server", op = "authorize", client_id = %req.client_id)
    )]
    pub async fn authorize(&self, req: AuthorizeRequest) -> Result<AuthorizeResponse> {
        if req.response_type != RESPONSE_TYPE_CODE {
            return Err(Error::InvalidRequest(format!(
                "unsupported response_type '{}'",
                req.response_type
            )));
        }

        let client = self
            .clients
            .identify(&req.client_id, GrantType::AuthorizationCode, &req.redirect_uri)
            .await?;

        let user = match self.store.get_user(req.user_id).await {
            Ok(user) => user,
            Err(Error::NotFound(_)) => {
                warn!(user_id = %req.user_id, "Authorization for unknown user");
                return Err(Error::Unauthorized("unknown user".to_string()));
            }
            Err(e) => return Err(e),
        };

        let code_challenge = parse_pkce(
            req.code_challenge.as_deref(),
            req.code_challenge_method.as_deref(),
        )?;
        let scope = req
            .scope
            .as_deref()
            .map(Scope::parse)
            .unwrap_or_else(Scope::empty);

        let issued = self
            .issuer
            .issue(
                &client,
                &user,
                CodeRequest {
                    redirect_uri: req.redirect_uri,
                    scope,
                    state: req.state,
                    code_challenge,
                },
            )
            .await?;

        Ok(AuthorizeResponse {
            redirect_to: build_redirect(&issued.redirect_uri, &issued.code, issued.state.as_deref()),
            code: issued.code,
            state: issued.state,
            expires_at: issued.expires_at,
        })
    }

    /// Handle a token request, dispatching on `grant_type`.
    #[instrument(
        skip(self, req),
        fields(subsystem = "oauth", component = "authorization_server", op = "token", grant_type = %req.grant_type)
    )]
    pub async fn token(&self, req: TokenRequest) -> Result<TokenResponse> {
        let grant_type: GrantType = req
            .grant_type
            .parse()
            .map_err(Error::UnsupportedGrantType)?;

        let (client_id, client_secret) = client_credentials(
            req.client_id.as_deref(),
            req.client_secret.as_deref(),
        )?;
        let scope = req
            .scope
            .as_deref()
            .map(Scope::parse)
            .filter(|s| !s.is_empty());

        let issued = match grant_type {
            GrantType::AuthorizationCode => {
                let code = required(req.code.as_deref(), "code")?;
                let redirect_uri = required(req.redirect_uri.as_deref(), "redirect_uri")?;
                self.exchanger
                    .exchange_code(CodeExchange {
                        code,
                        client_id,
                        client_secret,
                        redirect_uri,
                        code_verifier: req.code_verifier.as_deref(),
                    })
                    .await?
            }
            GrantType::RefreshToken => {
                let refresh_token = required(req.refresh_token.as_deref(), "refresh_token")?;
                self.exchanger
                    .refresh(RefreshExchange {
                        refresh_token,
                        client_id,
                        client_secret,
                        scope: scope.as_ref(),
                    })
                    .await?
            }
            GrantType::ClientCredentials => {
                let scope = scope.unwrap_or_else(Scope::empty);
                self.exchanger
                    .client_credentials(client_id, client_secret, &scope)
                    .await?
            }
        };

        Ok(issued.into_response())
    }

    /// RFC 7662 introspection. Never fails for unknown tokens.
    pub async fn introspect(&self, req: IntrospectionRequest) -> Result<TokenIntrospectionResponse> {
        self.inspector
            .introspect(&req.token, req.token_type_hint.as_deref())
            .await
    }

    /// RFC 7009 revocation by an authenticated client. Unknown tokens succeed.
    #[instrument(
        skip(self, req),
        fields(subsystem = "oauth", component = "authorization_server", op = "revoke")
    )]
    pub async fn revoke(&self, req: RevocationRequest) -> Result<()> {
        let (client_id, client_secret) = client_credentials(
            req.client_id.as_deref(),
            req.client_secret.as_deref(),
        )?;
        let client = self.clients.verify(client_id, client_secret).await?;
        self.inspector
            .revoke(&client.client_id, &req.token, req.token_type_hint.as_deref())
            .await?;
        Ok(())
    }
}

fn client_credentials<'a>(
    client_id: Option<&'a str>,
    client_secret: Option<&'a str>,
) -> Result<(&'a str, &'a str)> {
    match (client_id, client_secret) {
        (Some(id), Some(secret)) if !id.is_empty() => Ok((id, secret)),
        _ => Err(Error::InvalidClient(
            "client credentials are required".to_string(),
        )),
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::InvalidRequest(format!("{} is required", name))),
    }
}

fn parse_pkce(challenge: Option<&str>, method: Option<&str>) -> Result<Option<PkceChallenge>> {
    let Some(challenge) = challenge else {
        if method.is_some() {
            return Err(Error::InvalidRequest(
                "code_challenge_method given without code_challenge".to_string(),
            ));
        }
        return Ok(None);
    };

    if !(PKCE_VERIFIER_MIN_LENGTH..=PKCE_VERIFIER_MAX_LENGTH).contains(&challenge.len()) {
        return Err(Error::InvalidRequest(
            "code_challenge has an invalid length".to_string(),
        ));
    }

    let method = match method {
        Some(m) => m.parse::<CodeChallengeMethod>().map_err(Error::InvalidRequest)?,
        None => CodeChallengeMethod::Plain,
    };

    Ok(Some(PkceChallenge {
        challenge: challenge.to_string(),
        method,
    }))
}

/// Append `code` and `state` to the client's redirect URI.
fn build_redirect(redirect_uri: &str, code: &str, state: Option<&str>) -> String {
    let separator = if redirect_uri.contains('?') { '&' } else { '?' };
    let mut url = format!(
        "{}{}code={}",
        redirect_uri,
        separator,
        urlencoding::encode(code)
    );
    if let Some(state) = state {
        url.push_str("&state=");
        url.push_str(&urlencoding::encode(state));
    }
    url
}
