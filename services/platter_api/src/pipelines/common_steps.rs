// services/platter_api/src/pipelines/common_steps.rs

//! Steps shared by more than one flow.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Order, OrderDraft};
use crate::services::email;
use crate::services::gateway::to_minor_units;
use crate::services::events::{OrderEvent, OrderEventKind};
use crate::state::AppState;
use rust_decimal::Decimal;
use tracing::{event, warn, Level};

/// Rejects drafts that cannot become an order. Pure; runs before any side effect.
pub fn validate_order_draft(draft: &OrderDraft) -> AppResult<()> {
  if draft.items.is_empty() {
    return Err(AppError::Validation("Order must contain at least one item".to_string()));
  }
  if let Some(item) = draft.items.iter().find(|item| item.quantity == 0) {
    return Err(AppError::Validation(format!(
      "Quantity for '{}' must be at least 1",
      item.name
    )));
  }
  if draft.items.iter().any(|item| item.unit_price < Decimal::ZERO) {
    return Err(AppError::Validation("Item prices cannot be negative".to_string()));
  }
  // Checked in paise: the gateway charges whole minor units.
  if draft.total_amount <= Decimal::ZERO || to_minor_units(draft.total_amount)? == 0 {
    return Err(AppError::Validation("Total amount must be positive".to_string()));
  }
  if draft.delivery_address.trim().is_empty() {
    return Err(AppError::Validation("Delivery address is required".to_string()));
  }
  if draft.customer.phone.trim().is_empty() {
    return Err(AppError::Validation("Customer phone is required".to_string()));
  }
  Ok(())
}

/// Broadcasts `order_created` and queues the confirmation email.
///
/// Never fails: a missing account only skips the email.
pub async fn announce_order(state: &AppState, order: &Order) {
  state.events.publish(OrderEvent::from_order(OrderEventKind::Created, order));

  match state.credentials.find_by_id(order.user_id).await {
    Ok(Some(account)) => {
      let message = email::order_confirmation(&account.email, &order.customer.name, order);
      email::send_detached(state.mailer.clone(), message);
      event!(Level::DEBUG, order_id = %order.id, "order confirmation queued");
    }
    Ok(None) => warn!(order_id = %order.id, user_id = %order.user_id, "no account for order owner, skipping email"),
    Err(e) => warn!(order_id = %order.id, error = %e, "account lookup failed, skipping email"),
  }
}
