//! Bearer token issuing and verification.
//!
//! Tokens are HS256 JWTs carrying `{sub, iat, exp, jti, kind}`. Verification is a
//! pure signature + wall-clock check; it never looks at the token ledger.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Shortest HMAC secret accepted at startup.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Decodes the `kind` column of the token ledger.
impl TryFrom<String> for TokenKind {
    type Error = TokenError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "access" => Ok(TokenKind::Access),
            "refresh" => Ok(TokenKind::Refresh),
            _ => Err(TokenError::Malformed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    /// Random per-token id; keeps every issued value unique.
    pub jti: String,
    pub kind: TokenKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("token expired")]
    Expired,

    #[error("ttl must be at least one second")]
    InvalidTtl,

    #[error("subject must not be empty")]
    InvalidSubject,

    #[error("signing secret must be at least 32 bytes")]
    WeakSecret,

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// A freshly signed token with its decoded claims.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub value: String,
    pub claims: Claims,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies bearer tokens with a process-wide secret.
///
/// The key material is fixed at construction; there is no rotation.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked in `verify_at` so that `now >= exp` is already expired
        // and so the caller's clock is used.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Issue an access token valid for `ttl` from now.
    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<IssuedToken, TokenError> {
        self.issue_at(subject, TokenKind::Access, ttl, Utc::now())
    }

    /// Issue a refresh token valid for `ttl` from now.
    pub fn issue_refresh(&self, subject: &str, ttl: Duration) -> Result<IssuedToken, TokenError> {
        self.issue_at(subject, TokenKind::Refresh, ttl, Utc::now())
    }

    pub fn issue_at(
        &self,
        subject: &str,
        kind: TokenKind,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        if ttl < Duration::seconds(1) {
            return Err(TokenError::InvalidTtl);
        }
        if subject.trim().is_empty() {
            return Err(TokenError::InvalidSubject);
        }

        let expires_at = now + ttl;
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
            kind,
        };
        let value = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            value,
            claims,
            issued_at: now,
            expires_at,
        })
    }

    /// Verify an access token and return its subject.
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        self.verify_at(token, TokenKind::Access, Utc::now())
            .map(|c| c.sub)
    }

    /// Verify a refresh token and return its subject.
    pub fn verify_refresh(&self, token: &str) -> Result<String, TokenError> {
        self.verify_at(token, TokenKind::Refresh, Utc::now())
            .map(|c| c.sub)
    }

    /// Full verification against an explicit clock.
    ///
    /// A bad signature, bad structure or the wrong token kind is `Malformed`;
    /// a well-signed token with `now >= exp` is `Expired`.
    pub fn verify_at(
        &self,
        token: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|_| TokenError::Malformed)?;
        let claims = data.claims;

        if claims.kind != kind || claims.sub.is_empty() {
            return Err(TokenError::Malformed);
        }
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}
