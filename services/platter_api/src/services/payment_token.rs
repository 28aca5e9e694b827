// services/platter_api/src/services/payment_token.rs

//! Signed, time-boxed bearer token carrying a pending order between checkout
//! and verification. HS256 with its own secret and zero clock leeway.

use crate::db::TokenKey;
use crate::models::{CustomerContact, OrderDraft, OrderItem};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentClaims {
  /// Owning user.
  pub sub: Uuid,
  pub jti: Uuid,
  pub gateway_order_id: String,
  pub customer: CustomerContact,
  pub items: Vec<OrderItem>,
  pub total_amount: Decimal,
  pub delivery_address: String,
  pub iat: i64,
  pub exp: i64,
}

impl PaymentClaims {
  pub fn draft(&self) -> OrderDraft {
    OrderDraft {
      user_id: self.sub,
      customer: self.customer.clone(),
      items: self.items.clone(),
      total_amount: self.total_amount,
      delivery_address: self.delivery_address.clone(),
    }
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaymentTokenError {
  #[error("payment token expired")]
  Expired,
  #[error("payment token invalid: {0}")]
  Invalid(String),
  #[error("payment token could not be signed: {0}")]
  Signing(String),
}

pub struct PaymentTokenIssuer {
  encoding: EncodingKey,
  decoding: DecodingKey,
  ttl: Duration,
}

impl PaymentTokenIssuer {
  pub fn new(secret: &str, ttl: Duration) -> Self {
    Self {
      encoding: EncodingKey::from_secret(secret.as_bytes()),
      decoding: DecodingKey::from_secret(secret.as_bytes()),
      ttl,
    }
  }

  pub fn issue(&self, draft: &OrderDraft, gateway_order_id: &str) -> Result<String, PaymentTokenError> {
    self.issue_at(draft, gateway_order_id, Utc::now())
  }

  /// Issues a token as if signed at `issued_at`.
  pub fn issue_at(
    &self,
    draft: &OrderDraft,
    gateway_order_id: &str,
    issued_at: DateTime<Utc>,
  ) -> Result<String, PaymentTokenError> {
    let iat = issued_at.timestamp();
    let claims = PaymentClaims {
      sub: draft.user_id,
      jti: Uuid::new_v4(),
      gateway_order_id: gateway_order_id.to_string(),
      customer: draft.customer.clone(),
      items: draft.items.clone(),
      total_amount: draft.total_amount,
      delivery_address: draft.delivery_address.clone(),
      iat,
      exp: iat + self.ttl.as_secs() as i64,
    };
    encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| PaymentTokenError::Signing(e.to_string()))
  }

  pub fn decode(&self, token: &str) -> Result<PaymentClaims, PaymentTokenError> {
    self.decode_with(token, true)
  }

  /// Checks the signature but not the expiry. Only for settling a payment
  /// that was captured after its token lapsed.
  pub fn decode_lapsed(&self, token: &str) -> Result<PaymentClaims, PaymentTokenError> {
    self.decode_with(token, false)
  }

  fn decode_with(&self, token: &str, validate_exp: bool) -> Result<PaymentClaims, PaymentTokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = validate_exp;
    validation.set_required_spec_claims(&["exp", "sub"]);
    decode::<PaymentClaims>(token, &self.decoding, &validation)
      .map(|data| data.claims)
      .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => PaymentTokenError::Expired,
        _ => PaymentTokenError::Invalid(e.to_string()),
      })
  }
}

/// Token Store key for a raw token.
pub fn token_key(token: &str) -> TokenKey {
  TokenKey::from_token(token)
}
