// services/platter_api/src/services/auth_service.rs

//! Password hashing (Argon2) and session tokens (HS256 JWT).

use crate::errors::AppError;
use crate::models::{Credential, Role};
use argon2::{
  password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument};
use uuid::Uuid;

#[instrument(name = "auth_service::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> Result<String, AppError> {
  if password.is_empty() {
    return Err(AppError::Validation("Password cannot be empty.".to_string()));
  }
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| {
      error!(error = %e, "Argon2 password hashing failed.");
      AppError::Internal(format!("Password hashing failed: {}", e))
    })
}

/// `Ok(false)` on a wrong password; `Err` only when the stored hash is unusable.
#[instrument(name = "auth_service::verify_password", skip_all, err(Display))]
pub fn verify_password(stored_hash: &str, provided_password: &str) -> Result<bool, AppError> {
  if provided_password.is_empty() {
    return Ok(false);
  }
  let parsed = PasswordHash::new(stored_hash).map_err(|e| {
    error!(error = %e, "Stored password hash is unparseable.");
    AppError::Internal(format!("Invalid stored password hash: {}", e))
  })?;
  match Argon2::default().verify_password(provided_password.as_bytes(), &parsed) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => {
      debug!("Password mismatch.");
      Ok(false)
    }
    Err(e) => Err(AppError::Internal(format!("Password verification failed: {}", e))),
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
  pub sub: Uuid,
  pub role: Role,
  pub iat: i64,
  pub exp: i64,
}

pub fn issue_session_token(secret: &str, ttl: Duration, credential: &Credential) -> Result<String, AppError> {
  let iat = Utc::now().timestamp();
  let claims = SessionClaims {
    sub: credential.account_id,
    role: credential.role,
    iat,
    exp: iat + ttl.as_secs() as i64,
  };
  encode(
    &Header::new(Algorithm::HS256),
    &claims,
    &EncodingKey::from_secret(secret.as_bytes()),
  )
  .map_err(|e| AppError::Internal(format!("Session token signing failed: {}", e)))
}

pub fn decode_session_token(secret: &str, token: &str) -> Result<SessionClaims, AppError> {
  let validation = Validation::new(Algorithm::HS256);
  decode::<SessionClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
      ErrorKind::ExpiredSignature => AppError::Auth("Session expired.".to_string()),
      _ => AppError::Auth("Invalid session token.".to_string()),
    })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hashes_and_verifies_passwords() {
    let hash = hash_password("correct horse").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password(&hash, "correct horse").unwrap());
    assert!(!verify_password(&hash, "wrong horse").unwrap());
    assert!(!verify_password(&hash, "").unwrap());
    assert!(matches!(hash_password(""), Err(AppError::Validation(_))));
    assert!(verify_password("not-a-hash", "pw").is_err());
  }

  #[test]
  fn session_token_round_trip_and_secret_binding() {
    let credential = Credential {
      account_id: Uuid::new_v4(),
      role: Role::DeliveryAgent,
      name: "Kiran".into(),
      email: "kiran@platter.test".into(),
      password_hash: String::new(),
    };
    let token = issue_session_token("session", Duration::from_secs(60), &credential).unwrap();
    let claims = decode_session_token("session", &token).unwrap();
    assert_eq!(claims.sub, credential.account_id);
    assert_eq!(claims.role, Role::DeliveryAgent);
    assert!(matches!(decode_session_token("other", &token), Err(AppError::Auth(_))));
  }
}
