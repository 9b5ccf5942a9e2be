//! SmartRoute gateway — library crate.
//!
//! Hosts the request authentication gate, the token issuer and ledger, and the
//! auth/account API. Re-exported for the binary and for integration tests in `tests/`.

use std::sync::Arc;

use chrono::Duration;

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod store;

use auth::TokenIssuer;
use middleware::auth_gate::{BypassPaths, RequestAuthGate};
use store::{AccountStore, PrincipalDirectory, TokenLedger};

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub issuer: Arc<TokenIssuer>,
    pub ledger: Arc<dyn TokenLedger>,
    pub directory: Arc<dyn PrincipalDirectory>,
    pub accounts: Arc<dyn AccountStore>,
    pub gate: Arc<RequestAuthGate>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl AppState {
    /// Wire every seam to one backing store.
    pub fn new<S>(
        store: S,
        issuer: TokenIssuer,
        bypass: BypassPaths,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self
    where
        S: TokenLedger + PrincipalDirectory + AccountStore + 'static,
    {
        let store = Arc::new(store);
        let issuer = Arc::new(issuer);
        let ledger: Arc<dyn TokenLedger> = store.clone();
        let directory: Arc<dyn PrincipalDirectory> = store.clone();
        let accounts: Arc<dyn AccountStore> = store;

        let gate = Arc::new(RequestAuthGate::new(
            issuer.clone(),
            directory.clone(),
            ledger.clone(),
            bypass,
        ));

        Self {
            issuer,
            ledger,
            directory,
            accounts,
            gate,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config<S>(store: S, cfg: &config::Config) -> anyhow::Result<Self>
    where
        S: TokenLedger + PrincipalDirectory + AccountStore + 'static,
    {
        let issuer = TokenIssuer::new(&cfg.jwt_secret)?;
        Ok(Self::new(
            store,
            issuer,
            cfg.bypass.clone(),
            cfg.access_ttl,
            cfg.refresh_ttl,
        ))
    }
}
