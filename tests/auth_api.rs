//! End-to-end tests for the auth and account endpoints behind the gate.
//!
//! The full router is driven with `tower::ServiceExt::oneshot` over an
//! in-memory store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use gateway::api::{self, auth::AuthenticationResponse};
use gateway::auth::password::hash_password;
use gateway::auth::TokenIssuer;
use gateway::config::DEFAULT_BYPASS;
use gateway::middleware::auth_gate::BypassPaths;
use gateway::middleware::rbac::Role;
use gateway::models::account::NewAccount;
use gateway::store::memory::MemoryStore;
use gateway::store::{AccountStore, TokenLedger};
use gateway::AppState;

const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

fn app_with_store(store: MemoryStore) -> Router {
    let state = AppState::new(
        store,
        TokenIssuer::new(SECRET).unwrap(),
        BypassPaths::new(DEFAULT_BYPASS),
        Duration::hours(1),
        Duration::days(7),
    );
    api::router(Arc::new(state))
}

fn app() -> Router {
    app_with_store(MemoryStore::new())
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let resp = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &Router, email: &str, password: &str) -> AuthenticationResponse {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({
            "nickname": "traveler",
            "email": email,
            "password": password,
            "gender": "F",
            "age": 31
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    serde_json::from_value(body).unwrap()
}

async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/v1/auth/authenticate",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

async fn refresh(app: &Router, refresh_token: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/v1/auth/refresh-token",
        Some(refresh_token),
        None,
    )
    .await
}

async fn me(app: &Router, token: &str) -> StatusCode {
    send(app, Method::GET, "/api/v1/users/me", Some(token), None)
        .await
        .0
}

#[tokio::test]
async fn test_health_endpoints_need_no_token() {
    let app = app();
    assert_eq!(send(&app, Method::GET, "/healthz", None, None).await.0, StatusCode::OK);
    assert_eq!(send(&app, Method::GET, "/readyz", None, None).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_register_then_me() {
    let app = app();
    let session = register(&app, "Alice@Example.com", "password123").await;
    assert_eq!(session.token_type, "Bearer");

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/users/me",
        Some(&session.access_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["role"], "USER");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_rejects_duplicate_email() {
    let app = app();
    register(&app, "alice@example.com", "password123").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({
            "nickname": "again",
            "email": "ALICE@example.com",
            "password": "password123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "email_taken");
}

#[tokio::test]
async fn test_protected_route_without_token_is_401() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthenticated");

    for junk in ["null", "undefined", "abc.def.ghi"] {
        assert_eq!(me(&app, junk).await, StatusCode::UNAUTHORIZED, "{}", junk);
    }
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = app();
    let session = register(&app, "alice@example.com", "password123").await;
    assert_eq!(me(&app, &session.access_token).await, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/logout",
        Some(&session.access_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(me(&app, &session.access_token).await, StatusCode::UNAUTHORIZED);

    // Logging out twice, or with no token at all, is still a no-op success.
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/logout",
        Some(&session.access_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::POST, "/api/v1/auth/logout", None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let store = MemoryStore::new();
    let app = app_with_store(store.clone());
    let session = register(&app, "alice@example.com", "password123").await;

    for token in [
        Some(session.access_token.as_str()),
        Some(session.access_token.as_str()),
        Some("not-a-token"),
        None,
    ] {
        let (status, _) = send(&app, Method::POST, "/api/v1/auth/logout", token, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT, "{:?}", token);
    }

    let record = store.find(&session.access_token).await.unwrap().unwrap();
    assert!(record.revoked);
    assert!(!record.is_live());
    assert!(store.find("not-a-token").await.unwrap().is_none());
}

#[tokio::test]
async fn test_login_supersedes_previous_session() {
    let app = app();
    let first = register(&app, "alice@example.com", "password123").await;

    let (status, body) = login(&app, "alice@example.com", "password123").await;
    assert_eq!(status, StatusCode::OK);
    let second: AuthenticationResponse = serde_json::from_value(body).unwrap();

    assert_ne!(first.access_token, second.access_token);
    assert_eq!(me(&app, &first.access_token).await, StatusCode::UNAUTHORIZED);
    assert_eq!(me(&app, &second.access_token).await, StatusCode::OK);
}

#[tokio::test]
async fn test_login_with_wrong_password_is_401() {
    let app = app();
    register(&app, "alice@example.com", "password123").await;

    let (status, body) = login(&app, "alice@example.com", "wrong-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "invalid_credentials");

    let (status, _) = login(&app, "nobody@example.com", "password123").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_change_revokes_all_sessions() {
    let app = app();
    let session = register(&app, "alice@example.com", "password123").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/users/me/password",
        Some(&session.access_token),
        Some(json!({
            "current_password": "password123",
            "new_password": "correct-horse",
            "confirmation_password": "correct-horse"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(me(&app, &session.access_token).await, StatusCode::UNAUTHORIZED);

    assert_eq!(
        login(&app, "alice@example.com", "password123").await.0,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        login(&app, "alice@example.com", "correct-horse").await.0,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_password_change_rejects_mismatched_confirmation() {
    let app = app();
    let session = register(&app, "alice@example.com", "password123").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/users/me/password",
        Some(&session.access_token),
        Some(json!({
            "current_password": "password123",
            "new_password": "correct-horse",
            "confirmation_password": "battery-staple"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    // Nothing changed, the session is still live.
    assert_eq!(me(&app, &session.access_token).await, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_rotates_the_session() {
    let app = app();
    let session = register(&app, "alice@example.com", "password123").await;

    let (status, refreshed) = refresh(&app, &session.refresh_token).await;
    assert_eq!(status, StatusCode::OK);
    let refreshed: AuthenticationResponse = serde_json::from_value(refreshed).unwrap();

    assert_ne!(refreshed.refresh_token, session.refresh_token);
    assert_eq!(me(&app, &refreshed.access_token).await, StatusCode::OK);
    assert_eq!(me(&app, &session.access_token).await, StatusCode::UNAUTHORIZED);

    // A used refresh token cannot be replayed.
    assert_eq!(
        refresh(&app, &session.refresh_token).await.0,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        refresh(&app, &refreshed.refresh_token).await.0,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_logout_kills_the_paired_refresh_token() {
    let app = app();
    let session = register(&app, "alice@example.com", "password123").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/logout",
        Some(&session.access_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(
        refresh(&app, &session.refresh_token).await.0,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_password_change_kills_refresh_tokens() {
    let app = app();
    let first = register(&app, "alice@example.com", "password123").await;
    send(
        &app,
        Method::POST,
        "/api/v1/auth/logout",
        Some(&first.access_token),
        None,
    )
    .await;

    let (_, body) = login(&app, "alice@example.com", "password123").await;
    let second: AuthenticationResponse = serde_json::from_value(body).unwrap();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/users/me/password",
        Some(&second.access_token),
        Some(json!({
            "current_password": "password123",
            "new_password": "correct-horse",
            "confirmation_password": "correct-horse"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    for token in [&first.refresh_token, &second.refresh_token] {
        let (status, _) = refresh(&app, token).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_login_supersedes_previous_refresh_token() {
    let app = app();
    let first = register(&app, "alice@example.com", "password123").await;
    assert_eq!(
        login(&app, "alice@example.com", "password123").await.0,
        StatusCode::OK
    );

    assert_eq!(
        refresh(&app, &first.refresh_token).await.0,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let app = app();
    let session = register(&app, "alice@example.com", "password123").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/refresh-token",
        Some(&session.access_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_is_not_accepted_by_the_gate() {
    let app = app();
    let session = register(&app, "alice@example.com", "password123").await;
    assert_eq!(me(&app, &session.refresh_token).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_profile() {
    let app = app();
    let session = register(&app, "alice@example.com", "password123").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/v1/users/me/profile",
        Some(&session.access_token),
        Some(json!({ "nickname": "  wanderer ", "age": 45 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nickname"], "wanderer");
    assert_eq!(body["age"], 45);
    assert_eq!(body["gender"], "F");

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/users/me",
        Some(&session.access_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nickname"], "wanderer");
}

#[tokio::test]
async fn test_update_profile_validates_and_requires_login() {
    let app = app();
    let session = register(&app, "alice@example.com", "password123").await;

    for bad in [
        json!({ "gender": "X" }),
        json!({ "age": 200 }),
        json!({ "nickname": "   " }),
    ] {
        let (status, _) = send(
            &app,
            Method::PUT,
            "/api/v1/users/me/profile",
            Some(&session.access_token),
            Some(bad.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", bad);
    }

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/v1/users/me/profile",
        None,
        Some(json!({ "age": 30 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deleted_account_loses_access() {
    let app = app();
    let session = register(&app, "alice@example.com", "password123").await;

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/api/v1/users/me",
        Some(&session.access_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(me(&app, &session.access_token).await, StatusCode::UNAUTHORIZED);
    assert_eq!(
        login(&app, "alice@example.com", "password123").await.0,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_admin_restore_requires_admin_role() {
    let store = MemoryStore::new();
    store
        .create_account(&NewAccount {
            email: "root@example.com".to_string(),
            nickname: "root".to_string(),
            gender: None,
            age: None,
            password_hash: hash_password("admin-password").unwrap(),
            role: Role::Admin,
        })
        .await
        .unwrap();
    let app = app_with_store(store);

    let user = register(&app, "alice@example.com", "password123").await;
    let bob = register(&app, "bob@example.com", "password123").await;
    send(&app, Method::DELETE, "/api/v1/users/me", Some(&bob.access_token), None).await;

    let restore = "/api/v1/admin/users/bob@example.com/restore";

    let (status, _) = send(&app, Method::POST, restore, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::POST, restore, Some(&user.access_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");

    let (status, body) = login(&app, "root@example.com", "admin-password").await;
    assert_eq!(status, StatusCode::OK);
    let admin: AuthenticationResponse = serde_json::from_value(body).unwrap();

    let (status, _) = send(&app, Method::POST, restore, Some(&admin.access_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        login(&app, "bob@example.com", "password123").await.0,
        StatusCode::OK
    );

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/admin/users/ghost@example.com/restore",
        Some(&admin.access_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_deactivate_revokes_target_sessions() {
    let store = MemoryStore::new();
    store
        .create_account(&NewAccount {
            email: "root@example.com".to_string(),
            nickname: "root".to_string(),
            gender: None,
            age: None,
            password_hash: hash_password("admin-password").unwrap(),
            role: Role::Admin,
        })
        .await
        .unwrap();
    let app = app_with_store(store);

    let alice = register(&app, "alice@example.com", "password123").await;
    let (_, body) = login(&app, "root@example.com", "admin-password").await;
    let admin: AuthenticationResponse = serde_json::from_value(body).unwrap();

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/api/v1/admin/users/alice@example.com",
        Some(&admin.access_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(me(&app, &alice.access_token).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = app();
    let (status, _) = send(&app, Method::GET, "/api/v1/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
