use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::password::{hash_password_task, verify_password_task};
use crate::auth::TokenKind;
use crate::errors::AppError;
use crate::middleware::auth_gate::bearer_token;
use crate::middleware::rbac::Role;
use crate::models::account::NewAccount;
use crate::models::token::NewToken;
use crate::store::DirectoryError;
use crate::AppState;

pub const MIN_PASSWORD_LEN: usize = 8;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub nickname: String,
    pub email: String,
    pub password: String,
    pub gender: Option<String>,
    pub age: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct AuthenticationRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthenticationResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

// ── Helpers ──────────────────────────────────────────────────

/// Login identifiers are compared case-insensitively.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn validate_registration(req: &RegisterRequest, email: &str) -> Result<(), AppError> {
    if req.nickname.trim().is_empty() {
        return Err(AppError::Validation("nickname must not be empty".into()));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => return Err(AppError::Validation("email is not valid".into())),
    }
    validate_password(&req.password)?;
    validate_demographics(req.gender.as_deref(), req.age)
}

/// Shared by registration and profile edits.
pub fn validate_demographics(gender: Option<&str>, age: Option<i32>) -> Result<(), AppError> {
    if let Some(g) = gender {
        if g != "M" && g != "F" {
            return Err(AppError::Validation("gender must be 'M' or 'F'".into()));
        }
    }
    if let Some(age) = age {
        if !(0..=150).contains(&age) {
            return Err(AppError::Validation("age must be between 0 and 150".into()));
        }
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Issue an access/refresh pair for `owner_id` and record both in the ledger.
async fn open_session(
    state: &AppState,
    subject: &str,
    owner_id: Uuid,
) -> Result<AuthenticationResponse, AppError> {
    let access = state.issuer.issue(subject, state.access_ttl)?;
    let refresh = state.issuer.issue_refresh(subject, state.refresh_ttl)?;

    state
        .ledger
        .record(&NewToken::from_issued(&access, owner_id))
        .await?;
    state
        .ledger
        .record(&NewToken::from_issued(&refresh, owner_id))
        .await?;

    Ok(AuthenticationResponse {
        access_token: access.value,
        refresh_token: refresh.value,
        token_type: "Bearer".to_string(),
        expires_at: access.expires_at,
    })
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /api/v1/auth/register: create an account and open its first session.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthenticationResponse>), AppError> {
    let email = normalize_email(&req.email);
    validate_registration(&req, &email)?;
    let password_hash = hash_password_task(req.password).await?;

    let account = state
        .accounts
        .create_account(&NewAccount {
            email,
            nickname: req.nickname.trim().to_string(),
            gender: req.gender,
            age: req.age,
            password_hash,
            role: Role::User,
        })
        .await?;

    tracing::info!(account_id = %account.id, "account registered");
    let session = open_session(&state, &account.email, account.id).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/v1/auth/authenticate: password login.
///
/// Live tokens from earlier sessions of the same account are flagged expired.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AuthenticationRequest>,
) -> Result<Json<AuthenticationResponse>, AppError> {
    let email = normalize_email(&req.email);
    let account = state
        .accounts
        .find_account(&email)
        .await?
        .filter(|a| !a.deleted)
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password_task(req.password, account.password_hash.clone()).await? {
        tracing::info!(account_id = %account.id, "login rejected: wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let superseded = state.ledger.expire_all_for_owner(account.id).await?;
    tracing::info!(account_id = %account.id, superseded, "login succeeded");

    Ok(Json(open_session(&state, &account.email, account.id).await?))
}

/// POST /api/v1/auth/refresh-token: trade a refresh token for a new session.
///
/// The refresh token is carried as `Authorization: Bearer <refresh>`. It must be
/// live in the ledger; it is retired together with the rest of the session and a
/// fresh access/refresh pair is returned.
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AuthenticationResponse>, AppError> {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let refresh = bearer_token(header).ok_or(AppError::InvalidToken)?;

    let subject = state.issuer.verify_refresh(refresh)?;
    let principal = match state.directory.resolve(&subject).await {
        Ok(p) if p.enabled => p,
        Ok(_) | Err(DirectoryError::PrincipalNotFound) => return Err(AppError::InvalidToken),
        Err(e) => return Err(AppError::Internal(e.into())),
    };

    let record = state
        .ledger
        .find(refresh)
        .await?
        .ok_or(AppError::InvalidToken)?;
    if !record.is_live() || record.kind != TokenKind::Refresh || record.owner_id != principal.id {
        tracing::info!(
            account_id = %principal.id,
            revoked = record.revoked,
            expired = record.expired,
            "refresh rejected"
        );
        return Err(AppError::InvalidToken);
    }

    state.ledger.expire_all_for_owner(principal.id).await?;
    let session = open_session(&state, &principal.subject, principal.id).await?;

    tracing::info!(account_id = %principal.id, "session refreshed");
    Ok(Json(session))
}

/// POST /api/v1/auth/logout: end the session of the presented token.
///
/// A live token revokes every live token of its owner, so the paired refresh
/// token dies with the access token. Always 204: unknown, superseded or already
/// revoked tokens are a no-op.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let Some(token) = bearer_token(header) else {
        return Ok(StatusCode::NO_CONTENT);
    };

    match state.ledger.find(token).await? {
        Some(record) if record.is_live() => {
            let revoked = state.ledger.revoke_all_for_owner(record.owner_id).await?;
            tracing::info!(account_id = %record.owner_id, revoked, "session logged out");
        }
        Some(_) => state.ledger.revoke(token).await?,
        None => {}
    }
    Ok(StatusCode::NO_CONTENT)
}
