// services/platter_api/src/web/handlers/mod.rs

pub mod admin_handlers;
pub mod auth_handlers;
pub mod order_handlers;
pub mod payment_handlers;

use crate::errors::AppError;
use crate::models::{CustomerContact, OrderDraft, OrderItem};
use crate::state::AppState;
use platter_flow::{Ctx, FlowOutcome};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

/// Order contents as submitted for checkout or cash-on-delivery.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequestPayload {
  pub items: Vec<OrderItem>,
  pub total_amount: Decimal,
  pub delivery_address: String,
  pub customer: CustomerContact,
}

impl OrderRequestPayload {
  pub fn into_draft(self, user_id: Uuid) -> OrderDraft {
    OrderDraft {
      user_id,
      customer: self.customer,
      items: self.items,
      total_amount: self.total_amount,
      delivery_address: self.delivery_address,
    }
  }
}

/// Runs the flow for `T`. None of the service's flows stop early on success,
/// so a `Stopped` outcome is an internal fault.
pub(crate) async fn run_flow<T: Send + Sync + 'static>(state: &AppState, ctx: Ctx<T>) -> Result<(), AppError> {
  match state.flows.run(ctx).await? {
    FlowOutcome::Completed => Ok(()),
    FlowOutcome::Stopped => {
      tracing::error!(ctx_type = %std::any::type_name::<T>(), "flow stopped before completing");
      Err(AppError::Internal("Operation did not complete.".to_string()))
    }
  }
}
