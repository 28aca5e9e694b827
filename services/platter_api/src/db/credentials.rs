// services/platter_api/src/db/credentials.rs

//! One credential lookup across admin, delivery-agent and user accounts.

use crate::errors::{AppError, Result};
use crate::models::{Credential, NewAccount, Role};
use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

#[async_trait]
pub trait CredentialStore: Send + Sync {
  /// Resolves `email` in one dispatch. When the email exists under several
  /// roles the highest-priority role wins (see [`Role::priority`]).
  async fn lookup(&self, email: &str) -> Result<Option<Credential>>;

  /// Fails with `Conflict` when the email is already taken for that role.
  async fn create(&self, account: NewAccount) -> Result<Credential>;

  async fn find_by_id(&self, account_id: Uuid) -> Result<Option<Credential>>;
}

fn normalize_email(email: &str) -> String {
  email.trim().to_ascii_lowercase()
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
  accounts: RwLock<Vec<Credential>>,
}

impl InMemoryCredentialStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
  async fn lookup(&self, email: &str) -> Result<Option<Credential>> {
    let email = normalize_email(email);
    Ok(
      self
        .accounts
        .read()
        .iter()
        .filter(|c| c.email == email)
        .min_by_key(|c| c.role.priority())
        .cloned(),
    )
  }

  async fn create(&self, account: NewAccount) -> Result<Credential> {
    let email = normalize_email(&account.email);
    let mut accounts = self.accounts.write();
    if accounts.iter().any(|c| c.email == email && c.role == account.role) {
      return Err(AppError::Conflict("An account with this email already exists".to_string()));
    }
    let credential = Credential {
      account_id: Uuid::new_v4(),
      role: account.role,
      name: account.name,
      email,
      password_hash: account.password_hash,
    };
    accounts.push(credential.clone());
    Ok(credential)
  }

  async fn find_by_id(&self, account_id: Uuid) -> Result<Option<Credential>> {
    Ok(self.accounts.read().iter().find(|c| c.account_id == account_id).cloned())
  }
}

// --- Postgres ---

#[derive(Debug, FromRow)]
struct CredentialRow {
  id: Uuid,
  role: String,
  name: String,
  email: String,
  password_hash: String,
}

impl TryFrom<CredentialRow> for Credential {
  type Error = AppError;

  fn try_from(row: CredentialRow) -> Result<Self> {
    Ok(Credential {
      account_id: row.id,
      role: row.role.parse::<Role>().map_err(|e| AppError::Store(e.to_string()))?,
      name: row.name,
      email: row.email,
      password_hash: row.password_hash,
    })
  }
}

/// Every role table contributes one branch; `ORDER BY priority` applies the tie-break.
const ACCOUNTS_UNION: &str = "\
  SELECT id, 'admin' AS role, 0 AS priority, name, email, password_hash FROM admins \
  UNION ALL SELECT id, 'delivery_agent', 1, name, email, password_hash FROM delivery_agents \
  UNION ALL SELECT id, 'user', 2, name, email, password_hash FROM users";

fn table_for(role: Role) -> &'static str {
  match role {
    Role::Admin => "admins",
    Role::DeliveryAgent => "delivery_agents",
    Role::User => "users",
  }
}

#[derive(Clone)]
pub struct PgCredentialStore {
  pool: PgPool,
}

impl PgCredentialStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
  #[instrument(name = "pg_credentials::lookup", skip(self, email))]
  async fn lookup(&self, email: &str) -> Result<Option<Credential>> {
    let sql = format!(
      "SELECT id, role, name, email, password_hash FROM ({}) AS accounts WHERE email = $1 ORDER BY priority LIMIT 1",
      ACCOUNTS_UNION
    );
    let row = sqlx::query_as::<_, CredentialRow>(&sql)
      .bind(normalize_email(email))
      .fetch_optional(&self.pool)
      .await?;
    row.map(Credential::try_from).transpose()
  }

  async fn create(&self, account: NewAccount) -> Result<Credential> {
    let credential = Credential {
      account_id: Uuid::new_v4(),
      role: account.role,
      name: account.name,
      email: normalize_email(&account.email),
      password_hash: account.password_hash,
    };
    let sql = format!(
      "INSERT INTO {} (id, name, email, password_hash) VALUES ($1, $2, $3, $4)",
      table_for(credential.role)
    );
    sqlx::query(&sql)
      .bind(credential.account_id)
      .bind(&credential.name)
      .bind(&credential.email)
      .bind(&credential.password_hash)
      .execute(&self.pool)
      .await
      .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
          AppError::Conflict("An account with this email already exists".to_string())
        }
        _ => AppError::Sqlx(e),
      })?;
    Ok(credential)
  }

  async fn find_by_id(&self, account_id: Uuid) -> Result<Option<Credential>> {
    let sql = format!(
      "SELECT id, role, name, email, password_hash FROM ({}) AS accounts WHERE id = $1 ORDER BY priority LIMIT 1",
      ACCOUNTS_UNION
    );
    let row = sqlx::query_as::<_, CredentialRow>(&sql)
      .bind(account_id)
      .fetch_optional(&self.pool)
      .await?;
    row.map(Credential::try_from).transpose()
  }
}
