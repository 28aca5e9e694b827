// services/platter_api/src/models/order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
  Placed,
  Preparing,
  OutForDelivery,
  Delivered,
  Cancelled,
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 5] = [
    OrderStatus::Placed,
    OrderStatus::Preparing,
    OrderStatus::OutForDelivery,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
  ];

  pub fn is_terminal(self) -> bool {
    matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      OrderStatus::Placed => "placed",
      OrderStatus::Preparing => "preparing",
      OrderStatus::OutForDelivery => "out_for_delivery",
      OrderStatus::Delivered => "delivered",
      OrderStatus::Cancelled => "cancelled",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
  #[serde(rename = "COD")]
  Cod,
  #[serde(rename = "online")]
  Online,
}

impl PaymentMethod {
  pub fn as_str(self) -> &'static str {
    match self {
      PaymentMethod::Cod => "COD",
      PaymentMethod::Online => "online",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
  Pending,
  Paid,
}

impl PaymentStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      PaymentStatus::Pending => "pending",
      PaymentStatus::Paid => "paid",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
  #[default]
  None,
  Initiated,
  Completed,
  Failed,
}

impl RefundStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      RefundStatus::None => "none",
      RefundStatus::Initiated => "initiated",
      RefundStatus::Completed => "completed",
      RefundStatus::Failed => "failed",
    }
  }
}

/// Error for text columns that do not hold a known enum value.
#[derive(Debug, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
  pub kind: &'static str,
  pub value: String,
}

macro_rules! impl_from_str_via_as_str {
  ($ty:ty, $kind:literal, [$($variant:expr),+ $(,)?]) => {
    impl FromStr for $ty {
      type Err = UnknownVariant;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        [$($variant),+]
          .into_iter()
          .find(|v| v.as_str() == s)
          .ok_or_else(|| UnknownVariant { kind: $kind, value: s.to_string() })
      }
    }

    impl fmt::Display for $ty {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
      }
    }
  };
}

impl_from_str_via_as_str!(
  OrderStatus,
  "order status",
  [
    OrderStatus::Placed,
    OrderStatus::Preparing,
    OrderStatus::OutForDelivery,
    OrderStatus::Delivered,
    OrderStatus::Cancelled
  ]
);
impl_from_str_via_as_str!(PaymentMethod, "payment method", [PaymentMethod::Cod, PaymentMethod::Online]);
impl_from_str_via_as_str!(PaymentStatus, "payment status", [PaymentStatus::Pending, PaymentStatus::Paid]);
impl_from_str_via_as_str!(
  RefundStatus,
  "refund status",
  [
    RefundStatus::None,
    RefundStatus::Initiated,
    RefundStatus::Completed,
    RefundStatus::Failed
  ]
);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("refund cannot move from {from} to {to}")]
pub struct RefundTransitionError {
  pub from: RefundStatus,
  pub to: RefundStatus,
}

/// Refund sub-state of an order: `none -> initiated -> completed | failed`.
///
/// `failed` is also reachable from `none` when the gateway rejects the refund
/// call outright. Fields are written once and never reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRecord {
  pub status: RefundStatus,
  pub refund_id: Option<String>,
  pub amount: Option<Decimal>,
}

impl RefundRecord {
  pub fn initiate(&mut self, refund_id: impl Into<String>, amount: Decimal) -> Result<(), RefundTransitionError> {
    self.guard(&[RefundStatus::None], RefundStatus::Initiated)?;
    self.status = RefundStatus::Initiated;
    self.refund_id = Some(refund_id.into());
    self.amount = Some(amount);
    Ok(())
  }

  pub fn complete(&mut self) -> Result<(), RefundTransitionError> {
    self.guard(&[RefundStatus::Initiated], RefundStatus::Completed)?;
    self.status = RefundStatus::Completed;
    Ok(())
  }

  pub fn fail(&mut self) -> Result<(), RefundTransitionError> {
    self.guard(&[RefundStatus::None, RefundStatus::Initiated], RefundStatus::Failed)?;
    self.status = RefundStatus::Failed;
    Ok(())
  }

  fn guard(&self, allowed_from: &[RefundStatus], to: RefundStatus) -> Result<(), RefundTransitionError> {
    if allowed_from.contains(&self.status) {
      Ok(())
    } else {
      Err(RefundTransitionError { from: self.status, to })
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
  pub product_id: String,
  pub name: String,
  pub quantity: u32,
  pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerContact {
  pub name: String,
  pub phone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRefs {
  pub order_id: Option<String>,
  pub payment_id: Option<String>,
  pub signature: Option<String>,
}

/// Proposed order contents, before any order row exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
  pub user_id: Uuid,
  pub customer: CustomerContact,
  pub items: Vec<OrderItem>,
  pub total_amount: Decimal,
  pub delivery_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: Uuid,
  pub user_id: Uuid,
  pub items: Vec<OrderItem>,
  pub total_amount: Decimal,
  pub payment_method: PaymentMethod,
  pub payment_status: PaymentStatus,
  pub status: OrderStatus,
  pub delivery_address: String,
  pub customer: CustomerContact,
  pub delivery_agent_id: Option<Uuid>,
  pub gateway: GatewayRefs,
  pub delivery_otp: Option<String>,
  pub delivery_otp_verified: bool,
  pub refund: RefundRecord,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Order {
  /// A cash-on-delivery order: unpaid until handed over.
  pub fn cash_on_delivery(draft: OrderDraft) -> Self {
    Self::from_draft(draft, PaymentMethod::Cod, PaymentStatus::Pending, GatewayRefs::default(), None)
  }

  /// An order whose payment was captured and verified at the gateway.
  pub fn paid_online(draft: OrderDraft, gateway: GatewayRefs, delivery_otp: String) -> Self {
    Self::from_draft(draft, PaymentMethod::Online, PaymentStatus::Paid, gateway, Some(delivery_otp))
  }

  fn from_draft(
    draft: OrderDraft,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    gateway: GatewayRefs,
    delivery_otp: Option<String>,
  ) -> Self {
    let now = Utc::now();
    Self {
      id: Uuid::new_v4(),
      user_id: draft.user_id,
      items: draft.items,
      total_amount: draft.total_amount,
      payment_method,
      payment_status,
      status: OrderStatus::Placed,
      delivery_address: draft.delivery_address,
      customer: draft.customer,
      delivery_agent_id: None,
      gateway,
      delivery_otp,
      delivery_otp_verified: false,
      refund: RefundRecord::default(),
      created_at: now,
      updated_at: now,
    }
  }

  /// Copy for delivery agents: the handoff code stays with the customer.
  pub fn without_otp(&self) -> Self {
    Self {
      delivery_otp: None,
      ..self.clone()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  #[test]
  fn refund_record_follows_lifecycle() {
    let mut refund = RefundRecord::default();
    assert_eq!(refund.complete(), Err(RefundTransitionError { from: RefundStatus::None, to: RefundStatus::Completed }));

    refund.initiate("rfnd_1", Decimal::from(500)).unwrap();
    assert_eq!(refund.status, RefundStatus::Initiated);
    assert!(refund.initiate("rfnd_2", Decimal::from(500)).is_err());
    assert_eq!(refund.refund_id.as_deref(), Some("rfnd_1"));

    refund.complete().unwrap();
    assert!(refund.fail().is_err());
    assert!(refund.complete().is_err());
    assert_eq!(refund.status, RefundStatus::Completed);
    assert_eq!(refund.amount, Some(Decimal::from(500)));
  }

  #[test]
  fn failed_refund_is_terminal() {
    let mut refund = RefundRecord::default();
    refund.fail().unwrap();
    assert!(refund.initiate("rfnd_1", Decimal::from(10)).is_err());
    assert!(refund.complete().is_err());
    assert_eq!(refund.refund_id, None);
  }

  #[test]
  fn wire_names_match_stored_names() {
    for status in OrderStatus::ALL {
      let json = serde_json::to_string(&status).unwrap();
      assert_eq!(json, format!("\"{}\"", status.as_str()));
      assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
    }
    assert_eq!(serde_json::to_string(&PaymentMethod::Cod).unwrap(), "\"COD\"");
    assert_eq!("online".parse::<PaymentMethod>().unwrap(), PaymentMethod::Online);
    assert!("shipped".parse::<OrderStatus>().is_err());
  }

  #[test]
  fn only_delivered_and_cancelled_are_terminal() {
    let terminal: Vec<_> = OrderStatus::ALL.into_iter().filter(|s| s.is_terminal()).collect();
    assert_eq!(terminal, vec![OrderStatus::Delivered, OrderStatus::Cancelled]);
  }
}
