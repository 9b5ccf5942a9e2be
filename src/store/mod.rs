//! Persistence seams used by the auth gate and the auth API.
//!
//! Every trait has a Postgres implementation (`PgStore`) and an in-memory one
//! (`MemoryStore`). Both give read-your-writes on the revoked/expired flags:
//! a `revoke` that returned is visible to every later `find`.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::account::{Account, NewAccount, ProfileUpdate};
use crate::models::principal::Principal;
use crate::models::token::{NewToken, TokenRecord};

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("token already recorded")]
    DuplicateToken,

    #[error("token ledger unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("principal not found")]
    PrincipalNotFound,

    #[error("principal directory unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("email already registered")]
    EmailTaken,

    #[error("account not found")]
    NotFound,

    #[error("account store unavailable: {0}")]
    Unavailable(String),
}

/// Persisted record of every issued access token.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Insert a new live record. Fails with `DuplicateToken` if the value exists.
    async fn record(&self, token: &NewToken) -> Result<TokenRecord, LedgerError>;

    /// Point lookup by token value.
    async fn find(&self, value: &str) -> Result<Option<TokenRecord>, LedgerError>;

    /// Mark the token revoked. Idempotent; unknown tokens are a no-op.
    async fn revoke(&self, value: &str) -> Result<(), LedgerError>;

    /// Revoke every live token of an owner (credential rotation). Returns rows changed.
    async fn revoke_all_for_owner(&self, owner_id: Uuid) -> Result<u64, LedgerError>;

    /// Flag every live token of an owner as expired (session replacement). Returns rows changed.
    async fn expire_all_for_owner(&self, owner_id: Uuid) -> Result<u64, LedgerError>;
}

/// Resolves login subjects to principals.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    /// Fails with `PrincipalNotFound` for unknown or soft-deleted subjects.
    async fn resolve(&self, subject: &str) -> Result<Principal, DirectoryError>;
}

/// User accounts backing the principal directory.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create_account(&self, account: &NewAccount) -> Result<Account, AccountError>;

    /// Lookup by e-mail, including soft-deleted accounts.
    async fn find_account(&self, email: &str) -> Result<Option<Account>, AccountError>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AccountError>;

    /// Apply the `Some` fields of `update`. Fails with `NotFound` for an unknown id.
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Account, AccountError>;

    /// Set or clear the soft-delete flag. Returns false if the account does not exist.
    async fn set_deleted(&self, email: &str, deleted: bool) -> Result<bool, AccountError>;
}
