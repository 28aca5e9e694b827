// services/platter_api/src/web/handlers/admin_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::Role;
use crate::pipelines::contexts::AssignAgentCtx;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;
use crate::web::handlers::order_handlers::event_stream_response;
use crate::web::handlers::run_flow;
use platter_flow::Ctx;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AssignAgentPayload {
  pub delivery_agent_id: Uuid,
}

#[instrument(
  name = "handler::assign_agent",
  skip(app_state, auth_user, req_payload),
  fields(admin_id = %auth_user.account_id, agent_id = %req_payload.delivery_agent_id)
)]
pub async fn assign_agent_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
  req_payload: web::Json<AssignAgentPayload>,
) -> Result<HttpResponse, AppError> {
  let ctx = Ctx::new(AssignAgentCtx {
    state: app_state.get_ref().clone(),
    actor: auth_user.actor(),
    order_id: order_id.into_inner(),
    delivery_agent_id: req_payload.delivery_agent_id,
    order: None,
  });

  run_flow(&app_state, ctx.clone()).await?;

  let guard = ctx.read();
  let order = guard
    .order
    .as_ref()
    .ok_or_else(|| AppError::Internal("Assignment completed without an order.".to_string()))?;
  Ok(HttpResponse::Ok().json(json!({ "order": order })))
}

#[instrument(name = "handler::all_orders", skip(app_state, auth_user))]
pub async fn all_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  auth_user.require_role(Role::Admin)?;
  let orders = app_state.orders.list_all().await?;
  Ok(HttpResponse::Ok().json(json!({ "orders": orders })))
}

#[instrument(name = "handler::admin_events", skip(app_state, auth_user))]
pub async fn admin_events_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  auth_user.require_role(Role::Admin)?;
  Ok(event_stream_response(app_state.events.subscribe(), |_| true))
}
