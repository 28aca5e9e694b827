// services/platter_api/src/services/gateway.rs

//! Payment gateway seam: order creation and refunds against an external
//! processor. Amounts cross this boundary in minor units (paise).

use crate::errors::AppError;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
  pub id: String,
  /// Minor units.
  pub amount: u64,
  pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundSpeed {
  Normal,
  Optimum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundCall {
  pub payment_id: String,
  pub amount_minor: u64,
  pub speed: RefundSpeed,
  pub notes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayRefund {
  pub id: String,
  pub amount: u64,
  pub status: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
  #[error("gateway unreachable: {0}")]
  Transport(String),
  #[error("gateway rejected the request ({status}): {body}")]
  Rejected { status: u16, body: String },
  #[error("unexpected gateway response: {0}")]
  Decode(String),
  #[error("gateway unavailable: {0}")]
  Unavailable(String),
}

impl From<GatewayError> for AppError {
  fn from(err: GatewayError) -> Self {
    AppError::Gateway(err.to_string())
  }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  fn name(&self) -> &'static str;

  /// Not idempotent: each call creates a new gateway order.
  async fn create_order(&self, amount_minor: u64, currency: &str, receipt: &str) -> Result<GatewayOrder, GatewayError>;

  async fn refund(&self, call: RefundCall) -> Result<GatewayRefund, GatewayError>;
}

/// Rupees to paise, rounding half-to-even at the paisa.
pub fn to_minor_units(amount: Decimal) -> Result<u64, AppError> {
  if amount.is_sign_negative() && !amount.is_zero() {
    return Err(AppError::Validation(format!("Amount {} is negative", amount)));
  }
  (amount * Decimal::ONE_HUNDRED)
    .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
    .to_u64()
    .ok_or_else(|| AppError::Validation(format!("Amount {} is out of range", amount)))
}

pub fn from_minor_units(amount_minor: u64) -> Decimal {
  Decimal::from(amount_minor) / Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::str::FromStr;

  #[test]
  fn converts_rupees_to_paise() {
    assert_eq!(to_minor_units(Decimal::from(500)).unwrap(), 50_000);
    assert_eq!(to_minor_units(Decimal::from_str("499.99").unwrap()).unwrap(), 49_999);
    assert_eq!(to_minor_units(Decimal::from_str("0.005").unwrap()).unwrap(), 0);
    assert_eq!(to_minor_units(Decimal::from_str("0.015").unwrap()).unwrap(), 2);
    assert!(to_minor_units(Decimal::from_str("-1").unwrap()).is_err());
  }

  #[test]
  fn converts_paise_back_to_rupees() {
    assert_eq!(from_minor_units(50_000), Decimal::from(500));
    assert_eq!(from_minor_units(49_999), Decimal::from_str("499.99").unwrap());
  }
}
