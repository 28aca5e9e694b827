// services/platter_api/src/pipelines/verify_pipeline.rs

//! Payment verification: turns a captured payment into exactly one order, or
//! refunds it.
//!
//! Signature and token checks come first and touch nothing. From the Token
//! Store lookup on, every failure either releases the token for a retry
//! within the attempt ceiling or triggers an auto-refund. The entry stays in
//! the store, marked in flight, until the order row exists.

use crate::db::{TokenEntry, TokenKey};
use crate::errors::AppError;
use crate::models::{GatewayRefs, Order};
use crate::pipelines::common_steps;
use crate::pipelines::contexts::VerifyCtx;
use crate::services::otp::generate_delivery_otp;
use crate::services::payment_token::{token_key, PaymentTokenError};
use crate::services::refunds::{RefundReason, RefundRequest};
use crate::services::signature::verify_payment_signature;
use crate::state::AppState;
use platter_flow::{Ctx, Flow, FlowRegistry, Step, StepControl};
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

pub fn register_verify_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<VerifyCtx, AppError>::new(vec![
    Step::required("verify_gateway_signature"),
    Step::required("decode_payment_token"),
    Step::required("claim_token_entry"),
    Step::required("issue_delivery_otp"),
    Step::required("persist_paid_order"),
    Step::optional("announce_order").skip_when(|ctx: Ctx<VerifyCtx>| ctx.read().order.is_none()),
  ]);

  flow.on("verify_gateway_signature", |ctx: Ctx<VerifyCtx>| {
    Box::pin(async move {
      let guard = ctx.read();
      let input = &guard.input;
      if [&input.gateway_order_id, &input.gateway_payment_id, &input.gateway_signature, &input.payment_token]
        .iter()
        .any(|field| field.trim().is_empty())
      {
        return Err(AppError::Validation("Missing payment verification fields".to_string()));
      }
      verify_payment_signature(
        &guard.state.config.razorpay_key_secret,
        &input.gateway_order_id,
        &input.gateway_payment_id,
        &input.gateway_signature,
      )
      .map_err(|e| {
        warn!(gateway_order_id = %input.gateway_order_id, error = %e, "payment signature rejected");
        AppError::Integrity("Invalid payment signature".to_string())
      })?;
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("decode_payment_token", |ctx: Ctx<VerifyCtx>| {
    Box::pin(async move {
      let (claims, expired, key) = {
        let guard = ctx.read();
        let tokens = &guard.state.payment_tokens;
        let token = &guard.input.payment_token;
        let invalid = |e: PaymentTokenError| AppError::Integrity(format!("Invalid payment token: {}", e));
        let (claims, expired) = match tokens.decode(token) {
          Ok(claims) => (claims, false),
          // The gateway signature already held, so the money is real: keep the
          // claims to settle it.
          Err(PaymentTokenError::Expired) => (tokens.decode_lapsed(token).map_err(invalid)?, true),
          Err(other) => return Err(invalid(other)),
        };
        if claims.gateway_order_id != guard.input.gateway_order_id {
          return Err(AppError::Integrity("Payment token does not belong to this order".to_string()));
        }
        (claims, expired, token_key(token))
      };
      let mut guard = ctx.write();
      guard.token_key = Some(key);
      guard.token_expired = expired;
      guard.claims = Some(claims);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("claim_token_entry", claim_token_entry);

  flow.on("issue_delivery_otp", |ctx: Ctx<VerifyCtx>| {
    Box::pin(async move {
      ctx.write().delivery_otp = Some(generate_delivery_otp());
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("persist_paid_order", persist_paid_order);

  flow.on("announce_order", |ctx: Ctx<VerifyCtx>| {
    Box::pin(async move {
      let (state, order) = {
        let guard = ctx.read();
        (guard.state.clone(), guard.order.clone())
      };
      if let Some(order) = order {
        common_steps::announce_order(&state, &order).await;
      }
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  registry.register(flow);
  info!("Payment verification flow registered.");
}

/// Snapshot of what the store and refund steps need, taken under one read lock.
struct ClaimInputs {
  state: AppState,
  key: TokenKey,
  payment_id: String,
  amount: Decimal,
}

fn claim_inputs(ctx: &Ctx<VerifyCtx>) -> Result<ClaimInputs, AppError> {
  let guard = ctx.read();
  let claims = guard
    .claims
    .as_ref()
    .ok_or_else(|| AppError::Internal("claims missing before token claim".to_string()))?;
  let key = guard
    .token_key
    .clone()
    .ok_or_else(|| AppError::Internal("token key missing before token claim".to_string()))?;
  Ok(ClaimInputs {
    state: guard.state.clone(),
    key,
    payment_id: guard.input.gateway_payment_id.clone(),
    amount: claims.total_amount,
  })
}

/// Existing order for a payment, so the refund guard can see it.
async fn order_for_payment(state: &AppState, payment_id: &str) -> Option<Uuid> {
  match state.orders.find_by_gateway_payment_id(payment_id).await {
    Ok(order) => order.map(|o| o.id),
    Err(e) => {
      warn!(%payment_id, error = %e, "order lookup for refund guard failed");
      None
    }
  }
}

async fn refund(inputs: &ClaimInputs, reason: RefundReason) {
  let order_id = order_for_payment(&inputs.state, &inputs.payment_id).await;
  let outcome = inputs
    .state
    .refunds
    .auto_refund(RefundRequest {
      order_id,
      payment_id: inputs.payment_id.clone(),
      amount: inputs.amount,
      reason,
    })
    .await;
  info!(payment_id = %inputs.payment_id, reason = reason.as_str(), ?outcome, "auto-refund finished");
}

async fn claim_token_entry(ctx: Ctx<VerifyCtx>) -> Result<StepControl, AppError> {
  let inputs = claim_inputs(&ctx)?;
  let expired = ctx.read().token_expired;
  let store = inputs.state.token_store.clone();
  let config = inputs.state.config.clone();

  let entry = store.fetch(&inputs.key).await?;
  if entry.map_or(false, |e| e.value.claimed) {
    warn!(payment_id = %inputs.payment_id, "token in flight on a concurrent verification");
    return Err(AppError::Conflict("Payment verification already in progress".to_string()));
  }

  if expired {
    warn!(payment_id = %inputs.payment_id, "payment captured after token expiry");
    let retired = match entry {
      Some(entry) => store.compare_and_delete(&inputs.key, entry.version).await?,
      None => true,
    };
    if !retired {
      return Err(AppError::Conflict("Payment verification already in progress".to_string()));
    }
    refund(&inputs, RefundReason::ExpiredToken).await;
    return Err(AppError::PaymentTokenExpired);
  }

  let Some(entry) = entry else {
    warn!(payment_id = %inputs.payment_id, "token entry absent, treating as stale verification");
    refund(&inputs, RefundReason::StaleToken).await;
    return Err(AppError::TokenStaleRefunded);
  };

  if entry.value.attempts >= config.max_verify_attempts {
    warn!(payment_id = %inputs.payment_id, attempts = entry.value.attempts, "verification attempts exhausted");
    // Only the request that retires the entry pays out.
    if store.compare_and_delete(&inputs.key, entry.version).await? {
      refund(&inputs, RefundReason::RetryLimit).await;
    }
    return Err(AppError::TooManyAttempts);
  }

  let in_flight = TokenEntry::in_flight(entry.value.attempts);
  let Some(version) = store
    .compare_and_swap(&inputs.key, entry.version, in_flight, config.token_store_ttl)
    .await?
  else {
    warn!(payment_id = %inputs.payment_id, "token claimed by a concurrent verification");
    return Err(AppError::Conflict("Payment verification already in progress".to_string()));
  };

  let mut guard = ctx.write();
  guard.claim_version = Some(version);
  guard.attempts_used = entry.value.attempts + 1;
  Ok(StepControl::Continue)
}

async fn persist_paid_order(ctx: Ctx<VerifyCtx>) -> Result<StepControl, AppError> {
  let (state, order, claim, attempts_used) = {
    let guard = ctx.read();
    let claims = guard
      .claims
      .as_ref()
      .ok_or_else(|| AppError::Internal("claims missing before persist".to_string()))?;
    let otp = guard
      .delivery_otp
      .clone()
      .ok_or_else(|| AppError::Internal("delivery OTP missing before persist".to_string()))?;
    let claim = guard
      .token_key
      .clone()
      .zip(guard.claim_version)
      .ok_or_else(|| AppError::Internal("token claim missing before persist".to_string()))?;
    let refs = GatewayRefs {
      order_id: Some(guard.input.gateway_order_id.clone()),
      payment_id: Some(guard.input.gateway_payment_id.clone()),
      signature: Some(guard.input.gateway_signature.clone()),
    };
    (
      guard.state.clone(),
      Order::paid_online(claims.draft(), refs, otp),
      claim,
      guard.attempts_used,
    )
  };
  let (key, version) = claim;
  let store = state.token_store.clone();

  match state.orders.insert(order).await {
    Ok(order) => {
      info!(order_id = %order.id, user_id = %order.user_id, total = %order.total_amount, "paid order created");
      match store.compare_and_delete(&key, version).await {
        Ok(true) => {}
        Ok(false) => warn!(order_id = %order.id, "in-flight token entry lapsed before release"),
        Err(e) => error!(order_id = %order.id, error = %e, "could not release token entry"),
      }
      ctx.write().order = Some(order);
      Ok(StepControl::Continue)
    }
    Err(e) => {
      error!(error = %e, attempts_used, "persisting paid order failed, releasing token for retry");
      let released = store
        .compare_and_swap(&key, version, TokenEntry::available(attempts_used), state.config.token_store_ttl)
        .await;
      match released {
        Ok(Some(_)) => {}
        Ok(None) => error!("in-flight token entry lapsed before release"),
        Err(put_err) => error!(error = %put_err, "could not release token after failed persist"),
      }
      Err(e)
    }
  }
}
