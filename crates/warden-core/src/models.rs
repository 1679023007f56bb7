//! Data records and wire types for the authorization server.
//!
//! Records (`Client`, `User`, `AuthCode`, `AccessToken`, `RefreshToken`) are
//! plain data. How they map onto storage is the concern of the store
//! implementation, not of these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults::{DEFAULT_USER_ROLE, TOKEN_TYPE_BEARER};
use crate::error::Error;
use crate::scope::Scope;
use crate::secrets::{constant_time_eq, s256_challenge};

// =============================================================================
// ENUMS
// =============================================================================

/// OAuth2 grant types supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    ClientCredentials,
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::RefreshToken => "refresh_token",
        }
    }

    /// Grant types given to a client that registers without naming any.
    pub fn registration_defaults() -> Vec<GrantType> {
        vec![GrantType::AuthorizationCode, GrantType::RefreshToken]
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GrantType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "client_credentials" => Ok(Self::ClientCredentials),
            "refresh_token" => Ok(Self::RefreshToken),
            _ => Err(format!("Invalid grant type: {}", s)),
        }
    }
}

/// PKCE code challenge method (RFC 7636 section 4.2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    #[default]
    #[serde(rename = "plain")]
    Plain,
    S256,
}

impl CodeChallengeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeChallengeMethod::Plain => "plain",
            CodeChallengeMethod::S256 => "S256",
        }
    }

    /// Check a verifier against a stored challenge.
    pub fn verify(&self, verifier: &str, challenge: &str) -> bool {
        match self {
            CodeChallengeMethod::Plain => constant_time_eq(verifier, challenge),
            CodeChallengeMethod::S256 => constant_time_eq(&s256_challenge(verifier), challenge),
        }
    }
}

impl std::fmt::Display for CodeChallengeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CodeChallengeMethod {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        // Method names are case-sensitive per RFC 7636.
        match s {
            "plain" => Ok(Self::Plain),
            "S256" => Ok(Self::S256),
            _ => Err(format!("Invalid code challenge method: {}", s)),
        }
    }
}

/// A PKCE challenge bound to an authorization code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkceChallenge {
    pub challenge: String,
    pub method: CodeChallengeMethod,
}

impl PkceChallenge {
    pub fn verify(&self, verifier: &str) -> bool {
        self.method.verify(verifier, &self.challenge)
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// A registered OAuth2 client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub client_id: String,
    pub client_name: String,
    /// SHA-256 hex of the client secret. Never the secret itself.
    #[serde(skip_serializing, default)]
    pub secret_hash: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<GrantType>,
    pub scope: Scope,
    /// Owning user. A user owns at most one client.
    pub user_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Client {
    /// Exact string membership; no prefix or normalisation matching.
    pub fn allows_redirect(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }

    pub fn allows_grant(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }
}

/// A resource owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Argon2id PHC string.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub roles: Vec<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Set the email address. The username follows the email.
    pub fn set_email(&mut self, email: impl Into<String>) {
        let email = email.into();
        self.username = email.clone();
        self.email = email;
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// A single-use authorization code.
#[derive(Debug, Clone)]
pub struct AuthCode {
    pub code: String,
    pub client_id: String,
    /// Owning user; null once the user has been deleted.
    pub user_id: Option<Uuid>,
    pub redirect_uri: String,
    pub scope: Scope,
    pub state: Option<String>,
    pub code_challenge: Option<PkceChallenge>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    pub created_at: DateTime<Utc>,
}

impl AuthCode {
    /// A code is expired at and after its expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// An issued access token, keyed by the hash of the opaque value.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token_hash: String,
    pub client_id: String,
    /// None for client-credentials tokens.
    pub user_id: Option<Uuid>,
    pub scope: Scope,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// An issued refresh token, keyed by the hash of the opaque value.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub token_hash: String,
    /// Hash of the access token issued alongside this refresh token.
    pub access_token_hash: String,
    pub client_id: String,
    pub user_id: Option<Uuid>,
    pub scope: Scope,
    /// None means the refresh token does not expire.
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Rows removed by an expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupStats {
    pub codes_deleted: u64,
    pub access_tokens_deleted: u64,
    pub refresh_tokens_deleted: u64,
}

impl CleanupStats {
    pub fn tokens_deleted(&self) -> u64 {
        self.access_tokens_deleted + self.refresh_tokens_deleted
    }

    pub fn total(&self) -> u64 {
        self.codes_deleted + self.tokens_deleted()
    }
}

// =============================================================================
// ISSUANCE RESULTS
// =============================================================================

/// A freshly issued authorization code. The plaintext exists only here.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub code: String,
    pub redirect_uri: String,
    pub state: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// A freshly issued token pair. The plaintexts exist only here.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub scope: Scope,
    pub client_id: String,
    pub user_id: Option<Uuid>,
}

impl IssuedTokens {
    pub fn into_response(self) -> TokenResponse {
        TokenResponse {
            access_token: self.access_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.expires_in,
            refresh_token: self.refresh_token,
            scope: if self.scope.is_empty() {
                None
            } else {
                Some(self.scope.to_string())
            },
        }
    }
}

// =============================================================================
// REQUESTS AND RESPONSES
// =============================================================================

/// Authorization request after the HTTP layer has authenticated the resource
/// owner and obtained consent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code_challenge: Option<String>,
    #[serde(default)]
    pub code_challenge_method: Option<String>,
    /// The authenticated resource owner.
    pub user_id: Uuid,
}

/// Result of a successful authorization request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    /// Client redirect URI with `code` and `state` query parameters appended.
    pub redirect_to: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// OAuth2 token request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub code_verifier: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
}

/// OAuth2 token response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// OAuth2 token introspection response (RFC 7662).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenIntrospectionResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

impl TokenIntrospectionResponse {
    /// Response for unknown, expired or revoked tokens. Carries nothing else.
    pub fn inactive() -> Self {
        Self::default()
    }
}

/// Token introspection request (RFC 7662).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectionRequest {
    pub token: String,
    #[serde(default)]
    pub token_type_hint: Option<String>,
}

/// Token revocation request (RFC 7009).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationRequest {
    pub token: String,
    #[serde(default)]
    pub token_type_hint: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
}

/// OAuth2 client registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistrationRequest {
    pub client_name: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub scope: Option<String>,
    /// Link the new client to this user.
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

/// OAuth2 client registration response. The secret appears here only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistrationResponse {
    pub client_id: String,
    pub client_secret: String,
    pub client_id_issued_at: i64,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub scope: String,
}

/// User registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    /// Defaults to `ROLE_USER` when empty.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl CreateUserRequest {
    pub fn effective_roles(&self) -> Vec<String> {
        if self.roles.is_empty() {
            vec![DEFAULT_USER_ROLE.to_string()]
        } else {
            self.roles.clone()
        }
    }
}

// =============================================================================
// WIRE ERRORS
// =============================================================================

/// OAuth2 error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
    /// Overrides the status derived from `error`.
    #[serde(skip)]
    status: Option<u16>,
}

impl OAuthError {
    fn new(error: &str, description: &str) -> Self {
        Self {
            error: error.to_string(),
            error_description: Some(description.to_string()),
            error_uri: None,
            status: None,
        }
    }

    pub fn invalid_request(description: &str) -> Self {
        Self::new("invalid_request", description)
    }

    pub fn invalid_client(description: &str) -> Self {
        Self::new("invalid_client", description)
    }

    pub fn invalid_grant(description: &str) -> Self {
        Self::new("invalid_grant", description)
    }

    pub fn unauthorized_client(description: &str) -> Self {
        Self::new("unauthorized_client", description)
    }

    pub fn unsupported_grant_type(description: &str) -> Self {
        Self::new("unsupported_grant_type", description)
    }

    pub fn unsupported_response_type(description: &str) -> Self {
        Self::new("unsupported_response_type", description)
    }

    pub fn invalid_scope(description: &str) -> Self {
        Self::new("invalid_scope", description)
    }

    pub fn invalid_token(description: &str) -> Self {
        Self::new("invalid_token", description)
    }

    pub fn access_denied(description: &str) -> Self {
        Self::new("access_denied", description)
    }

    pub fn server_error(description: &str) -> Self {
        Self::new("server_error", description)
    }

    /// HTTP status an HTTP layer should answer with.
    pub fn http_status(&self) -> u16 {
        if let Some(status) = self.status {
            return status;
        }
        match self.error.as_str() {
            "invalid_client" | "invalid_token" => 401,
            "access_denied" => 403,
            "server_error" => 500,
            _ => 400,
        }
    }
}

impl From<&Error> for OAuthError {
    fn from(err: &Error) -> Self {
        match err {
            Error::InvalidClient(msg) => Self::invalid_client(msg),
            Error::UnauthorizedGrantType(msg) => Self::unauthorized_client(msg),
            Error::InvalidRedirectUri(msg) => Self::invalid_request(msg),
            Error::InvalidGrant(msg) => Self::invalid_grant(msg),
            Error::RedirectMismatch(_) => Self::invalid_grant("redirect_uri mismatch"),
            Error::Conflict(_) => Self::invalid_grant("authorization code already used"),
            Error::InvalidScope(msg) => Self::invalid_scope(msg),
            Error::InvalidRequest(msg) => Self::invalid_request(msg),
            Error::UnsupportedGrantType(msg) => Self::unsupported_grant_type(msg),
            Error::InvalidToken(msg) => Self::invalid_token(msg),
            Error::Unauthorized(msg) => Self::access_denied(msg),
            Error::NotFound(msg) => Self {
                status: Some(404),
                ..Self::invalid_request(msg)
            },
            // Storage and internal details stay out of client-facing errors.
            Error::Database(_) | Error::Config(_) | Error::Serialization(_) | Error::Internal(_) => {
                Self::server_error("internal server error")
            }
        }
    }
}

impl From<Error> for OAuthError {
    fn from(err: Error) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_client() -> Client {
        Client {
            id: Uuid::now_v7(),
            client_id: "c1".to_string(),
            client_name: "Test".to_string(),
            secret_hash: String::new(),
            redirect_uris: vec!["https://app.example/cb".to_string()],
            grant_types: vec![GrantType::AuthorizationCode],
            scope: Scope::parse("read"),
            user_id: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_oauth_error_constructors() {
        let err = OAuthError::invalid_request("bad param");
        assert_eq!(err.error, "invalid_request");
        assert_eq!(err.error_description, Some("bad param".to_string()));

        assert_eq!(OAuthError::invalid_client("x").error, "invalid_client");
        assert_eq!(OAuthError::invalid_grant("x").error, "invalid_grant");
        assert_eq!(OAuthError::unauthorized_client("x").error, "unauthorized_client");
        assert_eq!(
            OAuthError::unsupported_grant_type("x").error,
            "unsupported_grant_type"
        );
        assert_eq!(OAuthError::invalid_scope("x").error, "invalid_scope");
        assert_eq!(OAuthError::invalid_token("x").error, "invalid_token");
        assert_eq!(OAuthError::access_denied("x").error, "access_denied");
        assert_eq!(OAuthError::server_error("x").error, "server_error");
    }

    #[test]
    fn test_error_mapping_and_status() {
        let cases = vec![
            (Error::InvalidClient("x".into()), "invalid_client", 401),
            (Error::UnauthorizedGrantType("x".into()), "unauthorized_client", 400),
            (Error::InvalidRedirectUri("x".into()), "invalid_request", 400),
            (Error::InvalidGrant("x".into()), "invalid_grant", 400),
            (Error::RedirectMismatch("x".into()), "invalid_grant", 400),
            (Error::Conflict("x".into()), "invalid_grant", 400),
            (Error::InvalidScope("x".into()), "invalid_scope", 400),
            (Error::InvalidRequest("x".into()), "invalid_request", 400),
            (Error::UnsupportedGrantType("x".into()), "unsupported_grant_type", 400),
            (Error::InvalidToken("x".into()), "invalid_token", 401),
            (Error::Unauthorized("x".into()), "access_denied", 403),
            (Error::Internal("boom".into()), "server_error", 500),
        ];

        for (err, code, status) in cases {
            let wire = OAuthError::from(&err);
            assert_eq!(wire.error, code, "{err}");
            assert_eq!(wire.http_status(), status, "{err}");
        }
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let wire = OAuthError::from(Error::NotFound("client".into()));
        assert_eq!(wire.error, "invalid_request");
        assert_eq!(wire.http_status(), 404);
    }

    #[test]
    fn test_internal_error_detail_is_hidden() {
        let wire = OAuthError::from(Error::Internal("connection string leaked".into()));
        assert_eq!(
            wire.error_description.as_deref(),
            Some("internal server error")
        );
    }

    #[test]
    fn test_grant_type_serialization() {
        let types = vec![
            (GrantType::AuthorizationCode, "authorization_code"),
            (GrantType::ClientCredentials, "client_credentials"),
            (GrantType::RefreshToken, "refresh_token"),
        ];

        for (grant_type, expected) in types {
            let json = serde_json::to_string(&grant_type).unwrap();
            assert_eq!(json, format!("\"{}\"", expected));
            assert_eq!(expected.parse::<GrantType>().unwrap(), grant_type);
            assert_eq!(grant_type.to_string(), expected);
        }
        assert!("password".parse::<GrantType>().is_err());
    }

    #[test]
    fn test_code_challenge_method_parse_is_case_sensitive() {
        assert_eq!(
            "S256".parse::<CodeChallengeMethod>().unwrap(),
            CodeChallengeMethod::S256
        );
        assert_eq!(
            "plain".parse::<CodeChallengeMethod>().unwrap(),
            CodeChallengeMethod::Plain
        );
        assert!("s256".parse::<CodeChallengeMethod>().is_err());
    }

    #[test]
    fn test_pkce_verify() {
        let s256 = PkceChallenge {
            challenge: "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".to_string(),
            method: CodeChallengeMethod::S256,
        };
        assert!(s256.verify("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"));
        assert!(!s256.verify("wrong"));

        let plain = PkceChallenge {
            challenge: "verifier".to_string(),
            method: CodeChallengeMethod::Plain,
        };
        assert!(plain.verify("verifier"));
        assert!(!plain.verify("other"));
    }

    #[test]
    fn test_client_redirect_membership_is_exact() {
        let client = sample_client();
        assert!(client.allows_redirect("https://app.example/cb"));
        assert!(!client.allows_redirect("https://app.example/cb/"));
        assert!(!client.allows_redirect("https://app.example/cb?x=1"));
    }

    #[test]
    fn test_client_grant_membership() {
        let client = sample_client();
        assert!(client.allows_grant(GrantType::AuthorizationCode));
        assert!(!client.allows_grant(GrantType::ClientCredentials));
    }

    #[test]
    fn test_set_email_updates_username() {
        let mut user = User {
            id: Uuid::now_v7(),
            username: "old".to_string(),
            email: "old@example.com".to_string(),
            password_hash: String::new(),
            roles: vec![DEFAULT_USER_ROLE.to_string()],
            enabled: true,
            created_at: Utc::now(),
        };
        user.set_email("new@example.com");
        assert_eq!(user.email, "new@example.com");
        assert_eq!(user.username, "new@example.com");
        assert!(user.has_role("ROLE_USER"));
    }

    #[test]
    fn test_auth_code_expiry_boundary() {
        let now = Utc::now();
        let code = AuthCode {
            code: "abc123".to_string(),
            client_id: "c1".to_string(),
            user_id: None,
            redirect_uri: "https://app.example/cb".to_string(),
            scope: Scope::parse("read"),
            state: None,
            code_challenge: None,
            expires_at: now,
            consumed: false,
            created_at: now - Duration::minutes(10),
        };
        assert!(code.is_expired(now));
        assert!(!code.is_expired(now - Duration::seconds(1)));
    }

    #[test]
    fn test_refresh_token_without_expiry_never_expires() {
        let token = RefreshToken {
            token_hash: "h".to_string(),
            access_token_hash: "a".to_string(),
            client_id: "c1".to_string(),
            user_id: None,
            scope: Scope::empty(),
            expires_at: None,
            created_at: Utc::now(),
        };
        assert!(!token.is_expired(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn test_issued_tokens_into_response() {
        let issued = IssuedTokens {
            access_token: "wd_at_x".to_string(),
            refresh_token: None,
            expires_in: 3600,
            scope: Scope::parse("read"),
            client_id: "c1".to_string(),
            user_id: None,
        };
        let response = issued.into_response();
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.scope.as_deref(), Some("read"));

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("refresh_token").is_none());
    }

    #[test]
    fn test_inactive_introspection_serializes_only_active() {
        let json = serde_json::to_value(TokenIntrospectionResponse::inactive()).unwrap();
        assert_eq!(json, serde_json::json!({ "active": false }));
    }

    #[test]
    fn test_create_user_default_role() {
        let req = CreateUserRequest {
            email: "a@example.com".to_string(),
            password: "pw".to_string(),
            roles: vec![],
        };
        assert_eq!(req.effective_roles(), vec!["ROLE_USER".to_string()]);
    }

    #[test]
    fn test_client_secret_hash_not_serialized() {
        let mut client = sample_client();
        client.secret_hash = "deadbeef".to_string();
        let json = serde_json::to_string(&client).unwrap();
        assert!(!json.contains("deadbeef"));
    }
}
