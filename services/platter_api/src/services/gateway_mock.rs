// services/platter_api/src/services/gateway_mock.rs

//! In-process gateway for development and tests. Records every call and can be
//! switched into failure modes.

use crate::services::gateway::{GatewayError, GatewayOrder, GatewayRefund, PaymentGateway, RefundCall};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::info;

#[derive(Default)]
pub struct MockGateway {
  sequence: AtomicU64,
  fail_orders: AtomicBool,
  fail_refunds: AtomicBool,
  orders: Mutex<Vec<GatewayOrder>>,
  refunds: Mutex<Vec<RefundCall>>,
}

impl MockGateway {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn fail_order_creation(&self, fail: bool) {
    self.fail_orders.store(fail, Ordering::SeqCst);
  }

  pub fn fail_refunds(&self, fail: bool) {
    self.fail_refunds.store(fail, Ordering::SeqCst);
  }

  pub fn created_orders(&self) -> Vec<GatewayOrder> {
    self.orders.lock().clone()
  }

  pub fn refund_calls(&self) -> Vec<RefundCall> {
    self.refunds.lock().clone()
  }

  fn next_id(&self, prefix: &str) -> String {
    format!("{}_mock_{:06}", prefix, self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
  }
}

#[async_trait]
impl PaymentGateway for MockGateway {
  fn name(&self) -> &'static str {
    "mock"
  }

  async fn create_order(&self, amount_minor: u64, currency: &str, receipt: &str) -> Result<GatewayOrder, GatewayError> {
    if self.fail_orders.load(Ordering::SeqCst) {
      return Err(GatewayError::Unavailable("mock order creation disabled".to_string()));
    }
    let order = GatewayOrder {
      id: self.next_id("order"),
      amount: amount_minor,
      currency: currency.to_string(),
    };
    info!(gateway_order_id = %order.id, %receipt, amount_minor, "mock gateway order created");
    self.orders.lock().push(order.clone());
    Ok(order)
  }

  async fn refund(&self, call: RefundCall) -> Result<GatewayRefund, GatewayError> {
    // Failed attempts are recorded too; callers assert on attempts, not successes.
    self.refunds.lock().push(call.clone());
    if self.fail_refunds.load(Ordering::SeqCst) {
      return Err(GatewayError::Rejected {
        status: 400,
        body: "mock refund rejected".to_string(),
      });
    }
    let refund = GatewayRefund {
      id: self.next_id("rfnd"),
      amount: call.amount_minor,
      status: "pending".to_string(),
    };
    info!(refund_id = %refund.id, payment_id = %call.payment_id, "mock refund issued");
    Ok(refund)
  }
}
