// services/platter_api/src/models/account.rs

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::order::UnknownVariant;

/// Account kinds. When one email exists under several roles, sign-in resolves
/// to the highest priority: Admin, then DeliveryAgent, then User.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Admin,
  DeliveryAgent,
  User,
}

impl Role {
  /// Lower sorts first.
  pub fn priority(self) -> u8 {
    match self {
      Role::Admin => 0,
      Role::DeliveryAgent => 1,
      Role::User => 2,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Role::Admin => "admin",
      Role::DeliveryAgent => "delivery_agent",
      Role::User => "user",
    }
  }
}

impl FromStr for Role {
  type Err = UnknownVariant;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    [Role::Admin, Role::DeliveryAgent, Role::User]
      .into_iter()
      .find(|r| r.as_str() == s)
      .ok_or_else(|| UnknownVariant {
        kind: "role",
        value: s.to_string(),
      })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
  pub account_id: Uuid,
  pub role: Role,
  pub name: String,
  pub email: String,
  #[serde(skip_serializing)]
  pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
  pub role: Role,
  pub name: String,
  pub email: String,
  pub password_hash: String,
}
