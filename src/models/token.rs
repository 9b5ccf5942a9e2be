// Ledger model for issued bearer tokens, access and refresh alike.
// Token values are never stored; rows are keyed by the SHA-256 digest of the value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::{IssuedToken, TokenKind};

/// A persisted ledger entry for one issued token.
///
/// `revoked` and `expired` only ever move from `false` to `true`. A renewed
/// session always produces a new record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TokenRecord {
    pub id: Uuid,
    pub token_hash: String,
    pub owner_id: Uuid,
    #[sqlx(try_from = "String")]
    pub kind: TokenKind,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub expired: bool,
}

impl TokenRecord {
    /// Usable from the ledger's point of view (wall-clock expiry is the issuer's job).
    pub fn is_live(&self) -> bool {
        !self.revoked && !self.expired
    }
}

/// Insert payload for `TokenLedger::record`.
#[derive(Debug, Clone)]
pub struct NewToken {
    pub value: String,
    pub owner_id: Uuid,
    pub kind: TokenKind,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewToken {
    pub fn from_issued(token: &IssuedToken, owner_id: Uuid) -> Self {
        Self {
            value: token.value.clone(),
            owner_id,
            kind: token.claims.kind,
            issued_at: token.issued_at,
            expires_at: token.expires_at,
        }
    }
}

/// Hex SHA-256 of a token value. This is the ledger key.
pub fn token_digest(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Short, log-safe fingerprint of a token value.
pub fn fingerprint(value: &str) -> String {
    let mut digest = token_digest(value);
    digest.truncate(12);
    digest
}
