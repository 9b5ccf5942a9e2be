use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::rbac::Role;

/// An identity known to the principal directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    /// Unique login identifier (the account e-mail).
    pub subject: String,
    pub authorities: BTreeSet<Role>,
    pub enabled: bool,
}

impl Principal {
    /// Builds a principal whose authority set is exactly its stored role.
    pub fn new(id: Uuid, subject: impl Into<String>, role: Role, enabled: bool) -> Self {
        Self {
            id,
            subject: subject.into(),
            authorities: BTreeSet::from([role]),
            enabled,
        }
    }
}

/// Request-scoped authenticated identity.
///
/// Inserted into request extensions by the auth gate, at most once per request,
/// and dropped with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub principal: Principal,
    pub authorities: BTreeSet<Role>,
}

impl AuthContext {
    pub fn new(principal: Principal) -> Self {
        let authorities = principal.authorities.clone();
        Self {
            principal,
            authorities,
        }
    }

    pub fn subject(&self) -> &str {
        &self.principal.subject
    }

    pub fn principal_id(&self) -> Uuid {
        self.principal.id
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.authorities.contains(&role)
    }
}
