// services/platter_api/src/pipelines/webhook_pipeline.rs

//! Gateway webhooks. The signature covers the exact request bytes, so the
//! body reaches this flow unparsed.
//!
//! Refund events may arrive before, during or after the local auto-refund
//! records its result; the branch sub-flows only ever move a refund forward.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Order, RefundStatus};
use crate::pipelines::contexts::{RefundEntity, RefundEventCtx, RefundEventKind, WebhookCtx};
use crate::services::events::{OrderEvent, OrderEventKind};
use crate::services::gateway::from_minor_units;
use crate::services::signature::verify_webhook_signature;
use platter_flow::{Ctx, Flow, FlowError, FlowRegistry, Step, StepControl};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{event, info, warn, Level};

pub const REFUND_PROCESSED: &str = "refund.processed";
pub const REFUND_FAILED: &str = "refund.failed";

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
  event: String,
  #[serde(default)]
  payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookPayload {
  refund: Option<Entity<RefundEntity>>,
}

#[derive(Debug, Deserialize)]
struct Entity<T> {
  entity: T,
}

pub fn register_webhook_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<WebhookCtx, AppError>::new(vec![
    Step::required("verify_webhook_signature"),
    Step::required("parse_webhook_event"),
    Step::required("route_webhook_event"),
    Step::required("acknowledge_webhook"),
  ]);

  flow.on("verify_webhook_signature", |ctx: Ctx<WebhookCtx>| {
    Box::pin(async move {
      let guard = ctx.read();
      let provided = guard
        .signature
        .as_deref()
        .ok_or_else(|| AppError::Integrity("Missing webhook signature".to_string()))?;
      verify_webhook_signature(&guard.state.config.razorpay_webhook_secret, &guard.raw_body, provided).map_err(|e| {
        warn!(error = %e, body_len = guard.raw_body.len(), "webhook signature rejected");
        AppError::Integrity("Invalid webhook signature".to_string())
      })?;
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("parse_webhook_event", |ctx: Ctx<WebhookCtx>| {
    Box::pin(async move {
      let (state, envelope) = {
        let guard = ctx.read();
        let envelope: WebhookEnvelope = serde_json::from_slice(&guard.raw_body)
          .map_err(|e| AppError::Validation(format!("Malformed webhook payload: {}", e)))?;
        (guard.state.clone(), envelope)
      };
      event!(Level::INFO, event = %envelope.event, "webhook received");

      let kind = match envelope.event.as_str() {
        REFUND_PROCESSED => Some(RefundEventKind::Processed),
        REFUND_FAILED => Some(RefundEventKind::Failed),
        _ => None,
      };
      let refund_event = match kind {
        Some(kind) => {
          let refund = envelope
            .payload
            .refund
            .ok_or_else(|| AppError::Validation(format!("{} event carries no refund entity", envelope.event)))?
            .entity;
          Some(Ctx::new(RefundEventCtx {
            state,
            kind,
            refund,
            order: None,
            applied: false,
          }))
        }
        None => None,
      };

      let mut guard = ctx.write();
      guard.event_name = Some(envelope.event);
      guard.refund_event = refund_event;
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow
    .branch("route_webhook_event")
    .scope(Arc::new(refund_event_flow(RefundEventKind::Processed)), refund_event_ctx)
    .when(|ctx: Ctx<WebhookCtx>| ctx.read().event_name.as_deref() == Some(REFUND_PROCESSED))
    .scope(Arc::new(refund_event_flow(RefundEventKind::Failed)), refund_event_ctx)
    .when(|ctx: Ctx<WebhookCtx>| ctx.read().event_name.as_deref() == Some(REFUND_FAILED))
    .otherwise(StepControl::Continue)
    .finish(false);

  flow.on("acknowledge_webhook", |ctx: Ctx<WebhookCtx>| {
    Box::pin(async move {
      let guard = ctx.read();
      let applied = guard.refund_event.as_ref().map(|sub| sub.read().applied);
      info!(event = ?guard.event_name, ?applied, "webhook acknowledged");
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  registry.register(flow);
  info!("Webhook flow registered.");
}

fn refund_event_ctx(ctx: Ctx<WebhookCtx>) -> Result<Ctx<RefundEventCtx>, FlowError> {
  ctx.read().refund_event.clone().ok_or_else(|| FlowError::ExtractorFailure {
    step_name: "route_webhook_event".to_string(),
    source: anyhow::anyhow!("refund event was not parsed"),
  })
}

/// Sub-flow for one refund event kind.
fn refund_event_flow(kind: RefundEventKind) -> Flow<RefundEventCtx, AppError> {
  let mut flow = Flow::<RefundEventCtx, AppError>::new(vec![
    Step::required("locate_refund_order"),
    Step::required("apply_refund_update").skip_when(|ctx: Ctx<RefundEventCtx>| ctx.read().order.is_none()),
    Step::optional("publish_refund_event").skip_when(|ctx: Ctx<RefundEventCtx>| !ctx.read().applied),
  ]);

  flow.on("locate_refund_order", locate_refund_order);

  flow.on("apply_refund_update", move |ctx: Ctx<RefundEventCtx>| {
    Box::pin(async move {
      let (state, order_id, before, refund) = {
        let guard = ctx.read();
        let Some(order) = guard.order.as_ref() else {
          return Ok::<_, AppError>(StepControl::Continue);
        };
        (guard.state.clone(), order.id, order.refund.status, guard.refund.clone())
      };

      let updated = state
        .orders
        .update(
          order_id,
          Box::new(move |order: &mut Order| -> AppResult<()> {
            match kind {
              RefundEventKind::Processed => complete_refund(order, &refund),
              RefundEventKind::Failed => fail_refund(order),
            }
          }),
        )
        .await?;

      let applied = updated.refund.status != before;
      info!(
        order_id = %order_id,
        refund_id = %ctx.read().refund.id,
        from = %before,
        to = %updated.refund.status,
        applied,
        "refund webhook processed"
      );
      let mut guard = ctx.write();
      guard.order = Some(updated);
      guard.applied = applied;
      Ok(StepControl::Continue)
    })
  });

  flow.on("publish_refund_event", |ctx: Ctx<RefundEventCtx>| {
    Box::pin(async move {
      let guard = ctx.read();
      if let Some(order) = guard.order.as_ref() {
        guard.state.events.publish(OrderEvent::from_order(OrderEventKind::RefundUpdated, order));
      }
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow
}

/// Finds the order by refund id, falling back to the payment id when the
/// local auto-refund has not recorded its refund id yet.
async fn locate_refund_order(ctx: Ctx<RefundEventCtx>) -> AppResult<StepControl> {
  let (state, refund) = {
    let guard = ctx.read();
    (guard.state.clone(), guard.refund.clone())
  };
  let order = match state.orders.find_by_refund_id(&refund.id).await? {
    Some(order) => Some(order),
    None => state.orders.find_by_gateway_payment_id(&refund.payment_id).await?,
  };
  if order.is_none() {
    warn!(refund_id = %refund.id, payment_id = %refund.payment_id, "no order for refund event, acknowledging");
  }
  ctx.write().order = order;
  Ok(StepControl::Continue)
}

/// `none` goes through `initiated` so no transition is skipped. Terminal
/// states are left alone.
fn complete_refund(order: &mut Order, refund: &RefundEntity) -> AppResult<()> {
  match order.refund.status {
    RefundStatus::None => {
      order.refund.initiate(refund.id.clone(), from_minor_units(refund.amount))?;
      order.refund.complete()?;
    }
    RefundStatus::Initiated => order.refund.complete()?,
    RefundStatus::Completed | RefundStatus::Failed => {}
  }
  Ok(())
}

fn fail_refund(order: &mut Order) -> AppResult<()> {
  if matches!(order.refund.status, RefundStatus::None | RefundStatus::Initiated) {
    order.refund.fail()?;
  }
  Ok(())
}
