use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::principal::AuthContext;

/// Roles supported by the RBAC system.
/// Matches the `role` column in the `users` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Manager,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Manager => "MANAGER",
            Role::Admin => "ADMIN",
        }
    }

    /// Check if this role has the required permission level.
    pub fn has_permission(&self, required: Permission) -> bool {
        match (self, required) {
            (_, Permission::Read) => true,
            (Role::Admin | Role::Manager, Permission::Write) => true,
            (Role::User, Permission::Write) => false,
            (Role::Admin, Permission::Admin) => true,
            (Role::Manager | Role::User, Permission::Admin) => false,
        }
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Ok(Role::User),
            "MANAGER" => Ok(Role::Manager),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission levels for RBAC enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
    Admin,
}

impl AuthContext {
    /// Any of the caller's authorities grants the permission.
    pub fn has_permission(&self, required: Permission) -> bool {
        self.authorities.iter().any(|r| r.has_permission(required))
    }
}

/// Authorization check for handlers.
///
/// Anonymous callers get 401, authenticated callers lacking the permission get 403.
pub fn enforce(ctx: Option<&AuthContext>, permission: Permission) -> Result<&AuthContext, AppError> {
    let ctx = ctx.ok_or(AppError::Unauthenticated)?;
    if ctx.has_permission(permission) {
        return Ok(ctx);
    }
    tracing::warn!(
        subject = %ctx.subject(),
        authorities = ?ctx.authorities,
        required = ?permission,
        "RBAC access denied"
    );
    Err(AppError::Forbidden(format!(
        "{:?} permission required",
        permission
    )))
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::principal::Principal;
    use uuid::Uuid;

    fn ctx(role: Role) -> AuthContext {
        AuthContext::new(Principal::new(Uuid::new_v4(), "u@example.com", role, true))
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("USER".parse::<Role>(), Ok(Role::User));
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("Manager".parse::<Role>(), Ok(Role::Manager));
        assert_eq!(
            "owner".parse::<Role>(),
            Err(UnknownRole("owner".to_string()))
        );
    }

    #[test]
    fn test_role_serde_uses_stored_spelling() {
        assert_eq!(serde_json::to_string(&Role::Manager).unwrap(), "\"MANAGER\"");
        let r: Role = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(r, Role::Admin);
        assert_eq!(Role::User.to_string(), "USER");
    }

    #[test]
    fn test_admin_has_all_permissions() {
        let admin = Role::Admin;
        assert!(admin.has_permission(Permission::Read));
        assert!(admin.has_permission(Permission::Write));
        assert!(admin.has_permission(Permission::Admin));
    }

    #[test]
    fn test_manager_has_read_write() {
        let manager = Role::Manager;
        assert!(manager.has_permission(Permission::Read));
        assert!(manager.has_permission(Permission::Write));
        assert!(!manager.has_permission(Permission::Admin));
    }

    #[test]
    fn test_user_has_read_only() {
        let user = Role::User;
        assert!(user.has_permission(Permission::Read));
        assert!(!user.has_permission(Permission::Write));
        assert!(!user.has_permission(Permission::Admin));
    }

    #[test]
    fn test_enforce_anonymous_is_401() {
        let err = enforce(None, Permission::Read).unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));
    }

    #[test]
    fn test_enforce_insufficient_role_is_403() {
        let c = ctx(Role::User);
        let err = enforce(Some(&c), Permission::Admin).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_enforce_passes_through_context() {
        let c = ctx(Role::Admin);
        let out = enforce(Some(&c), Permission::Admin).unwrap();
        assert_eq!(out.subject(), "u@example.com");
    }
}
