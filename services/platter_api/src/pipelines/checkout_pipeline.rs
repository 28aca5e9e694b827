// services/platter_api/src/pipelines/checkout_pipeline.rs

//! Checkout: gateway order, signed payment token and a fresh Token Store
//! entry. No order row exists until verification succeeds.

use crate::db::TokenEntry;
use crate::errors::AppError;
use crate::pipelines::common_steps;
use crate::pipelines::contexts::CheckoutCtx;
use crate::services::gateway::to_minor_units;
use crate::services::payment_token::token_key;
use platter_flow::{Ctx, Flow, FlowRegistry, Step, StepControl};
use tracing::{event, info, Level};

pub fn register_checkout_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<CheckoutCtx, AppError>::new(vec![
    Step::required("validate_checkout_request"),
    Step::required("create_gateway_order"),
    Step::required("issue_payment_token"),
    Step::required("register_token_entry"),
  ]);

  flow.on("validate_checkout_request", |ctx: Ctx<CheckoutCtx>| {
    Box::pin(async move {
      common_steps::validate_order_draft(&ctx.read().draft)?;
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("create_gateway_order", |ctx: Ctx<CheckoutCtx>| {
    Box::pin(async move {
      let (gateway, currency, total, receipt) = {
        let guard = ctx.read();
        (
          guard.state.gateway.clone(),
          guard.state.config.payment_currency.clone(),
          guard.draft.total_amount,
          guard.checkout_id.to_string(),
        )
      };
      let amount_minor = to_minor_units(total)?;
      let gateway_order = gateway.create_order(amount_minor, &currency, &receipt).await?;
      info!(gateway_order_id = %gateway_order.id, amount_minor, %currency, "gateway order created");
      ctx.write().gateway_order = Some(gateway_order);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("issue_payment_token", |ctx: Ctx<CheckoutCtx>| {
    Box::pin(async move {
      let token = {
        let guard = ctx.read();
        let gateway_order = guard
          .gateway_order
          .as_ref()
          .ok_or_else(|| AppError::Internal("gateway order missing before token issue".to_string()))?;
        guard
          .state
          .payment_tokens
          .issue(&guard.draft, &gateway_order.id)
          .map_err(|e| AppError::PaymentInit(e.to_string()))?
      };
      ctx.write().payment_token = Some(token);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("register_token_entry", |ctx: Ctx<CheckoutCtx>| {
    Box::pin(async move {
      let (store, ttl, key) = {
        let guard = ctx.read();
        let token = guard
          .payment_token
          .as_deref()
          .ok_or_else(|| AppError::Internal("payment token missing before registration".to_string()))?;
        (guard.state.token_store.clone(), guard.state.config.token_store_ttl, token_key(token))
      };
      let version = store.put(&key, TokenEntry::available(0), ttl).await?;
      event!(Level::DEBUG, version, ttl_secs = ttl.as_secs(), "token entry registered");
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  registry.register(flow);
  info!("Checkout flow registered.");
}
