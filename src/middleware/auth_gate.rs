//! Request authentication gate.
//!
//! Runs once per request, in front of every route:
//! 1. Bypass-listed paths are forwarded untouched.
//! 2. `Authorization: Bearer <token>` is read; anything else is anonymous.
//! 3. The token is verified (signature + expiry), its subject resolved in the
//!    principal directory, and its ledger record checked for revocation.
//! 4. On success an [`AuthContext`] is inserted into the request extensions.
//!
//! The gate never rejects a request. Every failure degrades to anonymous and the
//! next handler always runs exactly once; 401/403 decisions belong to the
//! extractors and RBAC checks downstream.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::{TokenError, TokenIssuer};
use crate::models::principal::AuthContext;
use crate::models::token::fingerprint;
use crate::store::{DirectoryError, PrincipalDirectory, TokenLedger};

pub const BEARER_PREFIX: &str = "Bearer ";

/// Values some clients send when they serialize a missing token.
const NULLISH_TOKENS: [&str; 2] = ["null", "undefined"];

/// Why a request ended up anonymous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnonymousReason {
    MissingCredential,
    Malformed,
    Expired,
    SubjectUnknown,
    UnknownToken,
    Revoked,
    Superseded,
    OwnerMismatch,
    LedgerUnavailable,
    DirectoryUnavailable,
}

impl From<TokenError> for AnonymousReason {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AnonymousReason::Expired,
            _ => AnonymousReason::Malformed,
        }
    }
}

/// Terminal state of the gate for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Bypassed,
    Anonymous(AnonymousReason),
    Authenticated(AuthContext),
}

/// Copy of the outcome without the identity, left in request extensions for
/// handlers and logs that care how the request was classified.
///
/// Outside bypassed paths, `Authenticated` holds exactly when an [`AuthContext`]
/// is in the extensions after the gate. An identity attached by an earlier layer
/// is never removed, so it reports `Authenticated` even if the bearer token
/// itself was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Bypassed,
    Anonymous(AnonymousReason),
    Authenticated,
}

impl GateOutcome {
    pub fn state(&self) -> GateState {
        match self {
            GateOutcome::Bypassed => GateState::Bypassed,
            GateOutcome::Anonymous(r) => GateState::Anonymous(*r),
            GateOutcome::Authenticated(_) => GateState::Authenticated,
        }
    }
}

/// Ordered list of path prefixes exempt from the gate.
///
/// A prefix matches the path itself and anything below it on a segment
/// boundary: `/api/v1/auth` matches `/api/v1/auth/login` but not `/api/v1/authors`.
#[derive(Debug, Clone, Default)]
pub struct BypassPaths(Vec<String>);

impl BypassPaths {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        )
    }

    pub fn matches(&self, path: &str) -> bool {
        self.0.iter().any(|prefix| match path.strip_prefix(prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
            None => false,
        })
    }

    pub fn prefixes(&self) -> &[String] {
        &self.0
    }
}

/// Extract the raw bearer token from an `Authorization` header value.
///
/// Returns `None` for a missing header, a non-bearer scheme, or an empty,
/// blank or null-literal token.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix(BEARER_PREFIX)?.trim();
    if token.is_empty() || NULLISH_TOKENS.contains(&token) {
        return None;
    }
    Some(token)
}

pub struct RequestAuthGate {
    issuer: Arc<TokenIssuer>,
    directory: Arc<dyn PrincipalDirectory>,
    ledger: Arc<dyn TokenLedger>,
    bypass: BypassPaths,
}

impl RequestAuthGate {
    pub fn new(
        issuer: Arc<TokenIssuer>,
        directory: Arc<dyn PrincipalDirectory>,
        ledger: Arc<dyn TokenLedger>,
        bypass: BypassPaths,
    ) -> Self {
        Self {
            issuer,
            directory,
            ledger,
            bypass,
        }
    }

    pub fn bypass(&self) -> &BypassPaths {
        &self.bypass
    }

    /// Classify one request. Never fails.
    ///
    /// `existing` is an identity already attached by an earlier layer; when
    /// present and the token verifies, it is kept as is.
    pub async fn evaluate(
        &self,
        path: &str,
        authorization: Option<&str>,
        existing: Option<&AuthContext>,
    ) -> GateOutcome {
        if self.bypass.matches(path) {
            return GateOutcome::Bypassed;
        }

        let Some(token) = bearer_token(authorization) else {
            return GateOutcome::Anonymous(AnonymousReason::MissingCredential);
        };

        match self.authenticate(token, existing).await {
            Ok(ctx) => {
                tracing::debug!(path, subject = %ctx.subject(), "request authenticated");
                GateOutcome::Authenticated(ctx)
            }
            Err(reason) => {
                tracing::debug!(path, token = %fingerprint(token), ?reason, "bearer token not accepted, continuing anonymously");
                GateOutcome::Anonymous(reason)
            }
        }
    }

    async fn authenticate(
        &self,
        token: &str,
        existing: Option<&AuthContext>,
    ) -> Result<AuthContext, AnonymousReason> {
        let subject = self.issuer.verify(token)?;

        if let Some(ctx) = existing {
            return Ok(ctx.clone());
        }

        let principal = match self.directory.resolve(&subject).await {
            Ok(p) if p.enabled => p,
            Ok(_) | Err(DirectoryError::PrincipalNotFound) => {
                return Err(AnonymousReason::SubjectUnknown)
            }
            Err(DirectoryError::Unavailable(e)) => {
                tracing::warn!(error = %e, "principal directory unavailable, continuing anonymously");
                return Err(AnonymousReason::DirectoryUnavailable);
            }
        };

        let record = self
            .ledger
            .find(token)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "token ledger unavailable, continuing anonymously");
                AnonymousReason::LedgerUnavailable
            })?
            .ok_or(AnonymousReason::UnknownToken)?;

        if record.revoked {
            return Err(AnonymousReason::Revoked);
        }
        if record.expired {
            return Err(AnonymousReason::Superseded);
        }
        if record.owner_id != principal.id {
            return Err(AnonymousReason::OwnerMismatch);
        }

        Ok(AuthContext::new(principal))
    }
}

/// Axum middleware wrapping [`RequestAuthGate::evaluate`].
///
/// Mount with `axum::middleware::from_fn_with_state(gate, auth_gate)`.
pub async fn auth_gate(
    State(gate): State<Arc<RequestAuthGate>>,
    mut req: Request,
    next: Next,
) -> Response {
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let existing = req.extensions().get::<AuthContext>().cloned();
    let path = req.uri().path().to_owned();

    let outcome = gate
        .evaluate(&path, authorization.as_deref(), existing.as_ref())
        .await;

    let state = match (&outcome, &existing) {
        (GateOutcome::Bypassed, _) => GateState::Bypassed,
        (_, Some(_)) => GateState::Authenticated,
        _ => outcome.state(),
    };
    req.extensions_mut().insert(state);
    if let GateOutcome::Authenticated(ctx) = outcome {
        if existing.is_none() {
            req.extensions_mut().insert(ctx);
        }
    }

    next.run(req).await
}
