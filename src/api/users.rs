use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::api::auth::{validate_demographics, validate_password};
use crate::auth::password::{hash_password_task, verify_password_task};
use crate::errors::AppError;
use crate::middleware::principal::CurrentPrincipal;
use crate::models::account::{AccountView, ProfileUpdate};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirmation_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub nickname: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i32>,
}

/// GET /api/v1/users/me: the caller's own account.
pub async fn me(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(ctx): CurrentPrincipal,
) -> Result<Json<AccountView>, AppError> {
    let account = state
        .accounts
        .find_account(ctx.subject())
        .await?
        .ok_or_else(|| AppError::NotFound("account".into()))?;
    Ok(Json(account.into()))
}

/// POST /api/v1/users/me/password: rotate the caller's password.
///
/// Every live token of the account is revoked, including the one used for
/// this request.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(ctx): CurrentPrincipal,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    let account = state
        .accounts
        .find_account(ctx.subject())
        .await?
        .ok_or_else(|| AppError::NotFound("account".into()))?;

    if !verify_password_task(req.current_password, account.password_hash.clone()).await? {
        return Err(AppError::Validation("current password is wrong".into()));
    }
    if req.new_password != req.confirmation_password {
        return Err(AppError::Validation("passwords do not match".into()));
    }
    validate_password(&req.new_password)?;

    state
        .accounts
        .update_password(account.id, &hash_password_task(req.new_password).await?)
        .await?;
    let revoked = state.ledger.revoke_all_for_owner(account.id).await?;
    tracing::info!(account_id = %account.id, revoked, "password changed");

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/users/me/profile: edit nickname, gender or age.
///
/// Omitted fields keep their stored value.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(ctx): CurrentPrincipal,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<AccountView>, AppError> {
    let nickname = req.nickname.map(|n| n.trim().to_string());
    if nickname.as_deref() == Some("") {
        return Err(AppError::Validation("nickname must not be empty".into()));
    }
    validate_demographics(req.gender.as_deref(), req.age)?;

    let account = state
        .accounts
        .update_profile(
            ctx.principal_id(),
            &ProfileUpdate {
                nickname,
                gender: req.gender,
                age: req.age,
            },
        )
        .await?;
    tracing::info!(account_id = %account.id, "profile updated");
    Ok(Json(account.into()))
}

/// DELETE /api/v1/users/me: soft-delete the caller's account.
pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(ctx): CurrentPrincipal,
) -> Result<StatusCode, AppError> {
    state.accounts.set_deleted(ctx.subject(), true).await?;
    let revoked = state.ledger.revoke_all_for_owner(ctx.principal_id()).await?;
    tracing::info!(account_id = %ctx.principal_id(), revoked, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}
