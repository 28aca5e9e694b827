// services/platter_api/src/seed.rs

//! Development accounts created at startup when `SEED_DB` is set.

use crate::errors::{AppError, Result};
use crate::models::{NewAccount, Role};
use crate::services::auth_service::hash_password;
use crate::state::AppState;
use tracing::info;

const SEED_ACCOUNTS: [(Role, &str, &str); 2] = [
  (Role::Admin, "Platter Admin", "admin@platter.local"),
  (Role::DeliveryAgent, "Platter Rider", "rider@platter.local"),
];

/// Creates the staff accounts. Existing ones are left untouched.
pub async fn seed_accounts(state: &AppState) -> Result<()> {
  let password = state
    .config
    .seed_password
    .as_deref()
    .ok_or_else(|| AppError::Config("SEED_PASSWORD not set".to_string()))?;

  for (role, name, email) in SEED_ACCOUNTS {
    let account = NewAccount {
      role,
      name: name.to_string(),
      email: email.to_string(),
      password_hash: hash_password(password)?,
    };
    match state.credentials.create(account).await {
      Ok(created) => info!(account_id = %created.account_id, role = role.as_str(), %email, "Seeded account."),
      Err(AppError::Conflict(_)) => info!(role = role.as_str(), %email, "Seed account already present."),
      Err(e) => return Err(e),
    }
  }
  Ok(())
}
