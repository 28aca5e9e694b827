// services/platter_api/src/web/handlers/auth_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::pipelines::contexts::{SigninCtx, SignupCtx};
use crate::state::AppState;
use crate::web::handlers::run_flow;
use platter_flow::Ctx;

#[derive(Deserialize, Debug)]
pub struct SignupRequestPayload {
  pub name: String,
  pub email: String,
  pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct SigninRequestPayload {
  pub email: String,
  pub password: String,
}

#[instrument(name = "handler::signup", skip(app_state, req_payload), fields(req_email = %req_payload.email))]
pub async fn signup_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<SignupRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let ctx = Ctx::new(SignupCtx {
    state: app_state.get_ref().clone(),
    name: payload.name,
    email: payload.email,
    password: payload.password,
    password_hash: None,
    account: None,
  });

  run_flow(&app_state, ctx.clone()).await?;

  let guard = ctx.read();
  let account = guard.account.as_ref().ok_or_else(|| {
    warn!("Signup flow completed without an account in context.");
    AppError::Internal("Signup completed without creating an account.".to_string())
  })?;
  info!(account_id = %account.account_id, "Signup successful.");
  Ok(HttpResponse::Created().json(json!({
    "message": "Account created successfully.",
    "account": account,
  })))
}

#[instrument(name = "handler::signin", skip(app_state, req_payload), fields(req_email = %req_payload.email))]
pub async fn signin_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<SigninRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let ctx = Ctx::new(SigninCtx {
    state: app_state.get_ref().clone(),
    email: payload.email,
    password: payload.password,
    credential: None,
    session_token: None,
    role: None,
  });

  run_flow(&app_state, ctx.clone()).await?;

  let guard = ctx.read();
  match (guard.session_token.as_ref(), guard.credential.as_ref()) {
    (Some(token), Some(credential)) => Ok(HttpResponse::Ok().json(json!({
      "token": token,
      "role": credential.role,
      "account": credential,
    }))),
    _ => Err(AppError::Internal("Sign-in completed without a session.".to_string())),
  }
}
