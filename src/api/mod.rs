use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::middleware::auth_gate::auth_gate;
use crate::AppState;

pub mod admin;
pub mod auth;
pub mod users;

/// Build the full HTTP application.
///
/// Every route, including the auth endpoints and health checks, sits behind the
/// auth gate; the gate's bypass list decides which ones skip token inspection.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(|| async { "ok" }))
        .nest("/api/v1", api_router())
        .fallback(fallback_404)
        .layer(middleware::from_fn_with_state(state.gate.clone(), auth_gate))
        .with_state(state)
}

/// Routes mounted under `/api/v1`.
fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/authenticate", post(auth::authenticate))
        .route("/auth/refresh-token", post(auth::refresh_token))
        .route("/auth/logout", post(auth::logout))
        .route("/users/me", get(users::me).delete(users::delete_me))
        .route("/users/me/password", post(users::change_password))
        .route("/users/me/profile", put(users::update_profile))
        .route("/admin/users/:email/restore", post(admin::restore_user))
        .route("/admin/users/:email", delete(admin::deactivate_user))
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}
