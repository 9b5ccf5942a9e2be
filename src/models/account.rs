use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::rbac::Role;
use crate::models::principal::Principal;

/// A registered travel planner user, as owned by the account store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub nickname: String,
    pub gender: Option<String>,
    pub age: Option<i32>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub enrolled_at: DateTime<Utc>,
}

impl Account {
    /// Soft-deleted accounts resolve as disabled principals.
    pub fn to_principal(&self) -> Principal {
        Principal::new(self.id, self.email.clone(), self.role, !self.deleted)
    }
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub nickname: String,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub password_hash: String,
    pub role: Role,
}

/// Partial profile edit; `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub nickname: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i32>,
}

/// Public view returned by `/users/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountView {
    pub id: Uuid,
    pub email: String,
    pub nickname: String,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub role: Role,
    pub enrolled_at: DateTime<Utc>,
}

impl From<Account> for AccountView {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            email: a.email,
            nickname: a.nickname,
            gender: a.gender,
            age: a.age,
            role: a.role,
            enrolled_at: a.enrolled_at,
        }
    }
}
