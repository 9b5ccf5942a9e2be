use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::{
    AccountError, AccountStore, DirectoryError, LedgerError, PrincipalDirectory, TokenLedger,
};
use crate::models::account::{Account, NewAccount, ProfileUpdate};
use crate::models::principal::Principal;
use crate::models::token::{token_digest, NewToken, TokenRecord};

/// In-process store for tests and `serve --memory`.
///
/// Each record lives in one DashMap shard and is only mutated under that
/// shard's write lock, so flag updates are atomic per record and visible to
/// the next read.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tokens: Arc<DashMap<String, TokenRecord>>,
    accounts: Arc<DashMap<String, Account>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    fn set_owner_flag(&self, owner_id: Uuid, apply: impl Fn(&mut TokenRecord) -> bool) -> u64 {
        let mut changed = 0;
        for mut entry in self.tokens.iter_mut() {
            if entry.owner_id == owner_id && apply(entry.value_mut()) {
                changed += 1;
            }
        }
        changed
    }
}

#[async_trait]
impl TokenLedger for MemoryStore {
    async fn record(&self, token: &NewToken) -> Result<TokenRecord, LedgerError> {
        match self.tokens.entry(token_digest(&token.value)) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateToken),
            Entry::Vacant(slot) => {
                let rec = TokenRecord {
                    id: Uuid::new_v4(),
                    token_hash: slot.key().clone(),
                    owner_id: token.owner_id,
                    kind: token.kind,
                    issued_at: token.issued_at,
                    expires_at: token.expires_at,
                    revoked: false,
                    expired: false,
                };
                slot.insert(rec.clone());
                Ok(rec)
            }
        }
    }

    async fn find(&self, value: &str) -> Result<Option<TokenRecord>, LedgerError> {
        Ok(self
            .tokens
            .get(&token_digest(value))
            .map(|r| r.value().clone()))
    }

    async fn revoke(&self, value: &str) -> Result<(), LedgerError> {
        if let Some(mut rec) = self.tokens.get_mut(&token_digest(value)) {
            rec.revoked = true;
        }
        Ok(())
    }

    async fn revoke_all_for_owner(&self, owner_id: Uuid) -> Result<u64, LedgerError> {
        Ok(self.set_owner_flag(owner_id, |rec| {
            if rec.is_live() {
                rec.revoked = true;
                true
            } else {
                false
            }
        }))
    }

    async fn expire_all_for_owner(&self, owner_id: Uuid) -> Result<u64, LedgerError> {
        Ok(self.set_owner_flag(owner_id, |rec| {
            if rec.is_live() {
                rec.expired = true;
                true
            } else {
                false
            }
        }))
    }
}

#[async_trait]
impl PrincipalDirectory for MemoryStore {
    async fn resolve(&self, subject: &str) -> Result<Principal, DirectoryError> {
        match self.accounts.get(subject) {
            Some(account) if !account.deleted => Ok(account.to_principal()),
            _ => Err(DirectoryError::PrincipalNotFound),
        }
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_account(&self, account: &NewAccount) -> Result<Account, AccountError> {
        match self.accounts.entry(account.email.clone()) {
            Entry::Occupied(_) => Err(AccountError::EmailTaken),
            Entry::Vacant(slot) => {
                let created = Account {
                    id: Uuid::new_v4(),
                    email: account.email.clone(),
                    nickname: account.nickname.clone(),
                    gender: account.gender.clone(),
                    age: account.age,
                    password_hash: account.password_hash.clone(),
                    role: account.role,
                    deleted: false,
                    deleted_at: None,
                    enrolled_at: Utc::now(),
                };
                slot.insert(created.clone());
                Ok(created)
            }
        }
    }

    async fn find_account(&self, email: &str) -> Result<Option<Account>, AccountError> {
        Ok(self.accounts.get(email).map(|a| a.value().clone()))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AccountError> {
        let mut entry = self
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AccountError::NotFound)?;
        entry.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Account, AccountError> {
        let mut entry = self
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AccountError::NotFound)?;
        if let Some(nickname) = &update.nickname {
            entry.nickname = nickname.clone();
        }
        if let Some(gender) = &update.gender {
            entry.gender = Some(gender.clone());
        }
        if let Some(age) = update.age {
            entry.age = Some(age);
        }
        Ok(entry.value().clone())
    }

    async fn set_deleted(&self, email: &str, deleted: bool) -> Result<bool, AccountError> {
        let Some(mut account) = self.accounts.get_mut(email) else {
            return Ok(false);
        };
        account.deleted = deleted;
        account.deleted_at = deleted.then(Utc::now);
        Ok(true)
    }
}
