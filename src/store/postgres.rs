use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    AccountError, AccountStore, DirectoryError, LedgerError, PrincipalDirectory, TokenLedger,
};
use crate::middleware::rbac::Role;
use crate::models::account::{Account, NewAccount, ProfileUpdate};
use crate::models::principal::Principal;
use crate::models::token::{token_digest, NewToken, TokenRecord};

/// Postgres-backed store. All reads go straight to the database; there is no
/// cache in front of the token ledger.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

const TOKEN_COLUMNS: &str =
    "id, token_hash, owner_id, kind, issued_at, expires_at, revoked, expired";
const ACCOUNT_COLUMNS: &str =
    "id, email, nickname, gender, age, password_hash, role, deleted, deleted_at, enrolled_at";

fn ledger_err(e: sqlx::Error) -> LedgerError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => LedgerError::DuplicateToken,
        _ => LedgerError::Unavailable(e.to_string()),
    }
}

fn account_err(e: sqlx::Error) -> AccountError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => AccountError::EmailTaken,
        _ => AccountError::Unavailable(e.to_string()),
    }
}

// -- Token Ledger --

#[async_trait]
impl TokenLedger for PgStore {
    async fn record(&self, token: &NewToken) -> Result<TokenRecord, LedgerError> {
        sqlx::query_as::<_, TokenRecord>(&format!(
            r#"INSERT INTO tokens (token_hash, owner_id, kind, issued_at, expires_at)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {TOKEN_COLUMNS}"#
        ))
        .bind(token_digest(&token.value))
        .bind(token.owner_id)
        .bind(token.kind.as_str())
        .bind(token.issued_at)
        .bind(token.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(ledger_err)
    }

    async fn find(&self, value: &str) -> Result<Option<TokenRecord>, LedgerError> {
        sqlx::query_as::<_, TokenRecord>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_hash = $1"
        ))
        .bind(token_digest(value))
        .fetch_optional(&self.pool)
        .await
        .map_err(ledger_err)
    }

    async fn revoke(&self, value: &str) -> Result<(), LedgerError> {
        // Single-row update; the flag is never written back to false.
        sqlx::query("UPDATE tokens SET revoked = true WHERE token_hash = $1 AND revoked = false")
            .bind(token_digest(value))
            .execute(&self.pool)
            .await
            .map_err(ledger_err)?;
        Ok(())
    }

    async fn revoke_all_for_owner(&self, owner_id: Uuid) -> Result<u64, LedgerError> {
        let result = sqlx::query(
            "UPDATE tokens SET revoked = true WHERE owner_id = $1 AND revoked = false AND expired = false",
        )
        .bind(owner_id)
        .execute(&self.pool)
        .await
        .map_err(ledger_err)?;
        Ok(result.rows_affected())
    }

    async fn expire_all_for_owner(&self, owner_id: Uuid) -> Result<u64, LedgerError> {
        let result = sqlx::query(
            "UPDATE tokens SET expired = true WHERE owner_id = $1 AND revoked = false AND expired = false",
        )
        .bind(owner_id)
        .execute(&self.pool)
        .await
        .map_err(ledger_err)?;
        Ok(result.rows_affected())
    }
}

// -- Principal Directory / Accounts --

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    nickname: String,
    gender: Option<String>,
    age: Option<i32>,
    password_hash: String,
    role: String,
    deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    enrolled_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = crate::middleware::rbac::UnknownRole;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: row.id,
            email: row.email,
            nickname: row.nickname,
            gender: row.gender,
            age: row.age,
            password_hash: row.password_hash,
            role: row.role.parse::<Role>()?,
            deleted: row.deleted,
            deleted_at: row.deleted_at,
            enrolled_at: row.enrolled_at,
        })
    }
}

#[async_trait]
impl PrincipalDirectory for PgStore {
    async fn resolve(&self, subject: &str) -> Result<Principal, DirectoryError> {
        let row = sqlx::query_as::<_, (Uuid, String, String)>(
            "SELECT id, email, role FROM users WHERE email = $1 AND deleted = false",
        )
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        let (id, email, role) = row.ok_or(DirectoryError::PrincipalNotFound)?;
        let role = role.parse::<Role>().map_err(|e| {
            tracing::error!(subject = %email, "stored role is invalid: {}", e);
            DirectoryError::PrincipalNotFound
        })?;
        Ok(Principal::new(id, email, role, true))
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn create_account(&self, account: &NewAccount) -> Result<Account, AccountError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"INSERT INTO users (email, nickname, gender, age, password_hash, role)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {ACCOUNT_COLUMNS}"#
        ))
        .bind(&account.email)
        .bind(&account.nickname)
        .bind(&account.gender)
        .bind(account.age)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(account_err)?;

        Account::try_from(row).map_err(|e| AccountError::Unavailable(e.to_string()))
    }

    async fn find_account(&self, email: &str) -> Result<Option<Account>, AccountError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(account_err)?;

        row.map(Account::try_from)
            .transpose()
            .map_err(|e| AccountError::Unavailable(e.to_string()))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AccountError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(account_err)?;
        if result.rows_affected() == 0 {
            return Err(AccountError::NotFound);
        }
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Account, AccountError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"UPDATE users
               SET nickname = COALESCE($1, nickname),
                   gender = COALESCE($2, gender),
                   age = COALESCE($3, age)
               WHERE id = $4
               RETURNING {ACCOUNT_COLUMNS}"#
        ))
        .bind(&update.nickname)
        .bind(&update.gender)
        .bind(update.age)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(account_err)?
        .ok_or(AccountError::NotFound)?;

        Account::try_from(row).map_err(|e| AccountError::Unavailable(e.to_string()))
    }

    async fn set_deleted(&self, email: &str, deleted: bool) -> Result<bool, AccountError> {
        let result = sqlx::query(
            r#"UPDATE users
               SET deleted = $1,
                   deleted_at = CASE WHEN $1 THEN NOW() ELSE NULL END
               WHERE email = $2"#,
        )
        .bind(deleted)
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(account_err)?;
        Ok(result.rows_affected() > 0)
    }
}
