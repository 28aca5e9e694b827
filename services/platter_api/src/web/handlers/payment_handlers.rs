// services/platter_api/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, instrument};

use crate::errors::AppError;
use crate::pipelines::contexts::{CheckoutCtx, VerifyCtx, VerifyInput, WebhookCtx};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;
use crate::web::handlers::{run_flow, OrderRequestPayload};
use platter_flow::Ctx;

pub const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequestPayload {
  pub razorpay_order_id: String,
  pub razorpay_payment_id: String,
  pub razorpay_signature: String,
  pub payment_token: String,
}

#[instrument(
  name = "handler::checkout",
  skip(app_state, auth_user, req_payload),
  fields(user_id = %auth_user.account_id, total = %req_payload.total_amount)
)]
pub async fn checkout_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<OrderRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let draft = req_payload.into_inner().into_draft(auth_user.account_id);
  let ctx = Ctx::new(CheckoutCtx::new(app_state.get_ref().clone(), draft));

  // Clients only learn that checkout failed; validation stays specific.
  run_flow(&app_state, ctx.clone()).await.map_err(|e| match e {
    AppError::Validation(_) => e,
    other => {
      error!(error = %other, "Checkout failed.");
      AppError::PaymentInit(other.to_string())
    }
  })?;

  let guard = ctx.read();
  match (guard.gateway_order.as_ref(), guard.payment_token.as_ref()) {
    (Some(order), Some(token)) => {
      info!(gateway_order_id = %order.id, "Checkout ready for payment.");
      Ok(HttpResponse::Ok().json(json!({
        "order": order,
        "paymentToken": token,
      })))
    }
    _ => Err(AppError::PaymentInit("checkout finished without token".to_string())),
  }
}

#[instrument(
  name = "handler::verify_payment",
  skip(app_state, req_payload),
  fields(gateway_order_id = %req_payload.razorpay_order_id, gateway_payment_id = %req_payload.razorpay_payment_id)
)]
pub async fn verify_payment_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<VerifyRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let input = VerifyInput {
    gateway_order_id: payload.razorpay_order_id,
    gateway_payment_id: payload.razorpay_payment_id,
    gateway_signature: payload.razorpay_signature,
    payment_token: payload.payment_token,
  };
  let ctx = Ctx::new(VerifyCtx::new(app_state.get_ref().clone(), input));

  run_flow(&app_state, ctx.clone()).await?;

  let guard = ctx.read();
  let order = guard
    .order
    .as_ref()
    .ok_or_else(|| AppError::Internal("Verification completed without an order.".to_string()))?;
  Ok(HttpResponse::Created().json(json!({
    "message": "Payment verified, order placed.",
    "order": order,
  })))
}

#[instrument(name = "handler::payment_webhook", skip(app_state, req, body), fields(body_len = body.len()))]
pub async fn payment_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let signature = req
    .headers()
    .get(SIGNATURE_HEADER)
    .and_then(|value| value.to_str().ok())
    .map(String::from);
  let ctx = Ctx::new(WebhookCtx::new(app_state.get_ref().clone(), body.to_vec(), signature));

  run_flow(&app_state, ctx).await?;

  Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}
