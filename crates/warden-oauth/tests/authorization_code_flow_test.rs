//! End-to-end authorization code flow against the in-memory store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;
use warden_db::InMemoryTokenStore;
use warden_oauth::secrets::{hash_secret, s256_challenge};
use warden_oauth::{
    AuthCode, AuthorizationServer, AuthorizeRequest, Client, ClientRegistrationRequest,
    ClientRegistrationResponse, CreateUserRequest, Error, GrantType, OAuthConfig, OAuthError,
    Scope, TokenRequest, TokenStore, User,
};

const REDIRECT: &str = "https://app.example/cb";

struct Fixture {
    store: Arc<dyn TokenStore>,
    server: AuthorizationServer,
    client: ClientRegistrationResponse,
    user: User,
}

async fn fixture_with(config: OAuthConfig) -> Fixture {
    let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
    let server = AuthorizationServer::new(Arc::clone(&store), config).unwrap();

    let client = server
        .registrar()
        .register_client(ClientRegistrationRequest {
            client_name: "Flow test".to_string(),
            redirect_uris: vec![REDIRECT.to_string(), "https://app.example/other".to_string()],
            grant_types: vec![],
            scope: Some("read write".to_string()),
            user_id: None,
        })
        .await
        .unwrap();
    let user = server
        .registrar()
        .register_user(CreateUserRequest {
            email: "u1@example.com".to_string(),
            password: "correct horse battery".to_string(),
            roles: vec![],
        })
        .await
        .unwrap();

    Fixture {
        store,
        server,
        client,
        user,
    }
}

async fn fixture() -> Fixture {
    fixture_with(OAuthConfig::default()).await
}

fn authorize_request(f: &Fixture) -> AuthorizeRequest {
    AuthorizeRequest {
        response_type: "code".to_string(),
        client_id: f.client.client_id.clone(),
        redirect_uri: REDIRECT.to_string(),
        scope: Some("read".to_string()),
        state: Some("xyz".to_string()),
        code_challenge: None,
        code_challenge_method: None,
        user_id: f.user.id,
    }
}

fn code_request(f: &Fixture, code: &str) -> TokenRequest {
    TokenRequest {
        grant_type: "authorization_code".to_string(),
        code: Some(code.to_string()),
        redirect_uri: Some(REDIRECT.to_string()),
        client_id: Some(f.client.client_id.clone()),
        client_secret: Some(f.client.client_secret.clone()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_abc123_redeems_exactly_once() {
    let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
    let server = AuthorizationServer::new(Arc::clone(&store), OAuthConfig::default()).unwrap();
    let u1 = Uuid::now_v7();
    let now = Utc::now();

    store
        .put_user(User {
            id: u1,
            username: "u1".to_string(),
            email: "u1".to_string(),
            password_hash: String::new(),
            roles: vec!["ROLE_USER".to_string()],
            enabled: true,
            created_at: now,
        })
        .await
        .unwrap();
    store
        .put_client(Client {
            id: Uuid::now_v7(),
            client_id: "c1".to_string(),
            client_name: "c1".to_string(),
            secret_hash: hash_secret("c1-secret"),
            redirect_uris: vec![REDIRECT.to_string()],
            grant_types: GrantType::registration_defaults(),
            scope: Scope::parse("read"),
            user_id: None,
            is_active: true,
            created_at: now,
        })
        .await
        .unwrap();
    store
        .put_auth_code(AuthCode {
            code: "abc123".to_string(),
            client_id: "c1".to_string(),
            user_id: Some(u1),
            redirect_uri: REDIRECT.to_string(),
            scope: Scope::parse("read"),
            state: None,
            code_challenge: None,
            expires_at: now + Duration::minutes(10),
            consumed: false,
            created_at: now,
        })
        .await
        .unwrap();

    let request = TokenRequest {
        grant_type: "authorization_code".to_string(),
        code: Some("abc123".to_string()),
        redirect_uri: Some(REDIRECT.to_string()),
        client_id: Some("c1".to_string()),
        client_secret: Some("c1-secret".to_string()),
        ..Default::default()
    };

    let response = server.token(request.clone()).await.unwrap();
    assert_eq!(response.scope.as_deref(), Some("read"));
    assert_eq!(response.token_type, "Bearer");

    let token = server
        .inspector()
        .validate_access_token(&response.access_token)
        .await
        .unwrap();
    assert_eq!(token.user_id, Some(u1));

    let err = server.token(request).await.unwrap_err();
    assert!(matches!(err, Error::InvalidGrant(_)));
    assert_eq!(OAuthError::from(err).error, "invalid_grant");
}

#[tokio::test]
async fn test_authorize_then_exchange() {
    let f = fixture().await;
    let auth = f.server.authorize(authorize_request(&f)).await.unwrap();

    assert_eq!(
        auth.redirect_to,
        format!("{}?code={}&state=xyz", REDIRECT, auth.code)
    );
    assert_eq!(auth.state.as_deref(), Some("xyz"));

    let response = f.server.token(code_request(&f, &auth.code)).await.unwrap();
    assert!(response.refresh_token.is_some());
    assert_eq!(response.expires_in, OAuthConfig::default().access_token_ttl_secs);
    assert_eq!(response.scope.as_deref(), Some("read"));

    let stored = f.store.get_auth_code(&auth.code).await.unwrap();
    assert!(stored.consumed);
}

#[tokio::test]
async fn test_sequential_double_redeem() {
    let f = fixture().await;
    let auth = f.server.authorize(authorize_request(&f)).await.unwrap();

    assert!(f.server.token(code_request(&f, &auth.code)).await.is_ok());
    assert!(matches!(
        f.server.token(code_request(&f, &auth.code)).await,
        Err(Error::InvalidGrant(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redeem_has_one_winner() {
    let f = fixture().await;
    let auth = f.server.authorize(authorize_request(&f)).await.unwrap();
    let server = Arc::new(f.server.clone());

    let attempts = (0..8).map(|_| {
        let server = Arc::clone(&server);
        let request = code_request(&f, &auth.code);
        tokio::spawn(async move { server.token(request).await })
    });
    let results: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let wins = results.iter().filter(|r| r.is_ok()).count();
    let losses = results
        .iter()
        .filter(|r| matches!(r, Err(Error::InvalidGrant(_)) | Err(Error::Conflict(_))))
        .count();
    assert_eq!(wins, 1);
    assert_eq!(losses, 7);
}

#[tokio::test]
async fn test_expired_code_is_rejected_even_if_unconsumed() {
    let f = fixture().await;
    let now = Utc::now();
    f.store
        .put_auth_code(AuthCode {
            code: "stale".to_string(),
            client_id: f.client.client_id.clone(),
            user_id: Some(f.user.id),
            redirect_uri: REDIRECT.to_string(),
            scope: Scope::parse("read"),
            state: None,
            code_challenge: None,
            expires_at: now - Duration::seconds(1),
            consumed: false,
            created_at: now - Duration::minutes(11),
        })
        .await
        .unwrap();

    assert!(matches!(
        f.server.token(code_request(&f, "stale")).await,
        Err(Error::InvalidGrant(_))
    ));
}

#[tokio::test]
async fn test_redirect_mismatch() {
    let f = fixture().await;
    let auth = f.server.authorize(authorize_request(&f)).await.unwrap();

    let mut request = code_request(&f, &auth.code);
    request.redirect_uri = Some("https://app.example/other".to_string());
    let err = f.server.token(request).await.unwrap_err();
    assert!(matches!(err, Error::RedirectMismatch(_)));
    assert_eq!(OAuthError::from(&err).http_status(), 400);
}

#[tokio::test]
async fn test_code_bound_to_issuing_client() {
    let f = fixture().await;
    let other = f
        .server
        .registrar()
        .register_client(ClientRegistrationRequest {
            client_name: "Other".to_string(),
            redirect_uris: vec![REDIRECT.to_string()],
            grant_types: vec![],
            scope: None,
            user_id: None,
        })
        .await
        .unwrap();
    let auth = f.server.authorize(authorize_request(&f)).await.unwrap();

    let mut request = code_request(&f, &auth.code);
    request.client_id = Some(other.client_id);
    request.client_secret = Some(other.client_secret);
    assert!(matches!(
        f.server.token(request).await,
        Err(Error::InvalidGrant(_))
    ));
    // Still redeemable by its owner.
    assert!(f.server.token(code_request(&f, &auth.code)).await.is_ok());
}

#[tokio::test]
async fn test_pkce_s256_flow() {
    let f = fixture_with(OAuthConfig::default().with_require_pkce(true)).await;
    let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

    let err = f.server.authorize(authorize_request(&f)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));

    let mut request = authorize_request(&f);
    request.code_challenge = Some(s256_challenge(verifier));
    request.code_challenge_method = Some("S256".to_string());
    let auth = f.server.authorize(request).await.unwrap();

    let mut token = code_request(&f, &auth.code);
    token.code_verifier = Some("wrong-verifier-wrong-verifier-wrong-verifier".to_string());
    assert!(matches!(
        f.server.token(token.clone()).await,
        Err(Error::InvalidGrant(_))
    ));

    token.code_verifier = Some(verifier.to_string());
    assert!(f.server.token(token).await.is_ok());
}

#[tokio::test]
async fn test_authorize_rejections() {
    let f = fixture().await;

    let mut request = authorize_request(&f);
    request.response_type = "token".to_string();
    assert!(matches!(
        f.server.authorize(request).await,
        Err(Error::InvalidRequest(_))
    ));

    let mut request = authorize_request(&f);
    request.redirect_uri = "https://evil.example/cb".to_string();
    assert!(matches!(
        f.server.authorize(request).await,
        Err(Error::InvalidRedirectUri(_))
    ));

    let mut request = authorize_request(&f);
    request.user_id = Uuid::now_v7();
    assert!(matches!(
        f.server.authorize(request).await,
        Err(Error::Unauthorized(_))
    ));

    let mut request = authorize_request(&f);
    request.scope = Some("admin".to_string());
    assert!(matches!(
        f.server.authorize(request).await,
        Err(Error::InvalidScope(_))
    ));

    f.server
        .registrar()
        .deactivate_client(&f.client.client_id)
        .await
        .unwrap();
    let err = f.server.authorize(authorize_request(&f)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidClient(_)));
    assert_eq!(OAuthError::from(err).http_status(), 401);
}

#[tokio::test]
async fn test_omitted_scope_grants_client_scope() {
    let f = fixture().await;
    let mut request = authorize_request(&f);
    request.scope = None;
    let auth = f.server.authorize(request).await.unwrap();

    let response = f.server.token(code_request(&f, &auth.code)).await.unwrap();
    assert_eq!(response.scope.as_deref(), Some("read write"));
}
