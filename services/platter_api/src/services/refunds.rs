// services/platter_api/src/services/refunds.rs

//! Auto-refund: returns a captured payment that cannot become an order.
//!
//! Refund failures are recorded on the order, logged and left for manual
//! follow-up. They never propagate to the caller.

use crate::db::OrderRepository;
use crate::errors::AppError;
use crate::models::{Order, RefundStatus};
use crate::services::events::{OrderEvent, OrderEventHub, OrderEventKind};
use crate::services::gateway::{to_minor_units, PaymentGateway, RefundCall, RefundSpeed};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
  /// Verification arrived for a token the store no longer holds.
  StaleToken,
  /// Payment captured after the payment token lapsed.
  ExpiredToken,
  /// Verification attempts exhausted.
  RetryLimit,
  Manual,
}

impl RefundReason {
  pub fn as_str(self) -> &'static str {
    match self {
      RefundReason::StaleToken => "stale_token",
      RefundReason::ExpiredToken => "expired_token",
      RefundReason::RetryLimit => "retry_limit",
      RefundReason::Manual => "manual",
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefundRequest {
  /// When set, the order's refund record guards against a second refund.
  pub order_id: Option<Uuid>,
  pub payment_id: String,
  /// Major units.
  pub amount: Decimal,
  pub reason: RefundReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundOutcome {
  Initiated { refund_id: String },
  /// The order already carries a refund; no gateway call was made.
  AlreadyHandled(RefundStatus),
  Failed { reason: String },
}

pub struct RefundService {
  gateway: Arc<dyn PaymentGateway>,
  orders: Arc<dyn OrderRepository>,
  events: OrderEventHub,
}

impl RefundService {
  pub fn new(gateway: Arc<dyn PaymentGateway>, orders: Arc<dyn OrderRepository>, events: OrderEventHub) -> Self {
    Self { gateway, orders, events }
  }

  #[instrument(
    name = "refunds::auto_refund",
    skip(self, request),
    fields(payment_id = %request.payment_id, amount = %request.amount, reason = request.reason.as_str(), order_id = ?request.order_id)
  )]
  pub async fn auto_refund(&self, request: RefundRequest) -> RefundOutcome {
    if let Some(order_id) = request.order_id {
      match self.orders.find(order_id).await {
        Ok(Some(order)) if order.refund.status != RefundStatus::None => {
          info!(status = %order.refund.status, "refund already recorded, skipping gateway call");
          return RefundOutcome::AlreadyHandled(order.refund.status);
        }
        Ok(_) => {}
        // Money is captured; attempting the refund beats leaving it.
        Err(e) => warn!(error = %e, "could not load order for refund guard, refunding anyway"),
      }
    }

    let amount_minor = match to_minor_units(request.amount) {
      Ok(minor) => minor,
      Err(e) => return self.record_failure(&request, e.to_string()).await,
    };
    let mut notes = BTreeMap::new();
    notes.insert("reason".to_string(), request.reason.as_str().to_string());
    if let Some(order_id) = request.order_id {
      notes.insert("order_id".to_string(), order_id.to_string());
    }

    let call = RefundCall {
      payment_id: request.payment_id.clone(),
      amount_minor,
      speed: RefundSpeed::Optimum,
      notes,
    };
    match self.gateway.refund(call).await {
      Ok(refund) => {
        info!(refund_id = %refund.id, gateway = self.gateway.name(), "refund initiated");
        if let Some(order_id) = request.order_id {
          let refund_id = refund.id.clone();
          let amount = request.amount;
          let recorded = self
            .orders
            .update(
              order_id,
              Box::new(move |order: &mut Order| -> Result<(), AppError> {
                // A webhook may already have completed this refund.
                if order.refund.status == RefundStatus::None {
                  order.refund.initiate(refund_id, amount)?;
                }
                Ok(())
              }),
            )
            .await;
          match recorded {
            Ok(order) => self.events.publish(OrderEvent::from_order(OrderEventKind::RefundUpdated, &order)),
            Err(e) => error!(error = %e, "refund initiated at gateway but not recorded on order"),
          }
        }
        RefundOutcome::Initiated { refund_id: refund.id }
      }
      Err(e) => self.record_failure(&request, e.to_string()).await,
    }
  }

  async fn record_failure(&self, request: &RefundRequest, reason: String) -> RefundOutcome {
    error!(%reason, "refund failed, manual action required");
    if let Some(order_id) = request.order_id {
      let result = self
        .orders
        .update(
          order_id,
          Box::new(|order: &mut Order| -> Result<(), AppError> {
            if matches!(order.refund.status, RefundStatus::None | RefundStatus::Initiated) {
              order.refund.fail()?;
            }
            Ok(())
          }),
        )
        .await;
      match result {
        Ok(order) => self.events.publish(OrderEvent::from_order(OrderEventKind::RefundUpdated, &order)),
        Err(e) => error!(error = %e, "could not record refund failure on order"),
      }
    }
    RefundOutcome::Failed { reason }
  }
}
