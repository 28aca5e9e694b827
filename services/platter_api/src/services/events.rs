// services/platter_api/src/services/events.rs

//! Real-time order notifications. A side channel for dashboards and customers;
//! nothing depends on delivery.

use crate::models::{Order, OrderStatus, RefundStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventKind {
  Created,
  StatusChanged,
  AgentAssigned,
  RefundUpdated,
}

impl OrderEventKind {
  pub fn as_str(self) -> &'static str {
    match self {
      OrderEventKind::Created => "order_created",
      OrderEventKind::StatusChanged => "order_status_changed",
      OrderEventKind::AgentAssigned => "order_agent_assigned",
      OrderEventKind::RefundUpdated => "order_refund_updated",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
  pub kind: OrderEventKind,
  pub order_id: Uuid,
  pub user_id: Uuid,
  pub status: OrderStatus,
  pub delivery_agent_id: Option<Uuid>,
  pub refund_status: RefundStatus,
  pub at: DateTime<Utc>,
}

impl OrderEvent {
  pub fn from_order(kind: OrderEventKind, order: &Order) -> Self {
    Self {
      kind,
      order_id: order.id,
      user_id: order.user_id,
      status: order.status,
      delivery_agent_id: order.delivery_agent_id,
      refund_status: order.refund.status,
      at: Utc::now(),
    }
  }
}

#[derive(Clone)]
pub struct OrderEventHub {
  sender: broadcast::Sender<OrderEvent>,
}

impl OrderEventHub {
  pub fn new(capacity: usize) -> Self {
    let (sender, _) = broadcast::channel(capacity);
    Self { sender }
  }

  pub fn publish(&self, event: OrderEvent) {
    let kind = event.kind.as_str();
    let order_id = event.order_id;
    match self.sender.send(event) {
      Ok(receivers) => debug!(kind, %order_id, receivers, "order event published"),
      Err(_) => debug!(kind, %order_id, "order event dropped, no subscribers"),
    }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
    self.sender.subscribe()
  }
}

impl Default for OrderEventHub {
  fn default() -> Self {
    Self::new(256)
  }
}
