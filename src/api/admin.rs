use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
};

use crate::api::auth::normalize_email;
use crate::errors::AppError;
use crate::middleware::principal::MaybePrincipal;
use crate::middleware::rbac::{enforce, Permission};
use crate::AppState;

/// POST /api/v1/admin/users/:email/restore: clear an account's soft-delete flag.
pub async fn restore_user(
    State(state): State<Arc<AppState>>,
    MaybePrincipal(ctx): MaybePrincipal,
    Path(email): Path<String>,
) -> Result<StatusCode, AppError> {
    let admin = enforce(ctx.as_ref(), Permission::Admin)?;
    let email = normalize_email(&email);

    if !state.accounts.set_deleted(&email, false).await? {
        return Err(AppError::NotFound("account".into()));
    }
    tracing::info!(admin = %admin.subject(), "account restored");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/admin/users/:email: soft-delete another account and revoke its tokens.
pub async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    MaybePrincipal(ctx): MaybePrincipal,
    Path(email): Path<String>,
) -> Result<StatusCode, AppError> {
    let admin = enforce(ctx.as_ref(), Permission::Admin)?;
    let email = normalize_email(&email);

    let account = state
        .accounts
        .find_account(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("account".into()))?;
    state.accounts.set_deleted(&email, true).await?;
    let revoked = state.ledger.revoke_all_for_owner(account.id).await?;
    tracing::info!(admin = %admin.subject(), account_id = %account.id, revoked, "account deactivated");
    Ok(StatusCode::NO_CONTENT)
}
