// services/platter_api/src/web/handlers/order_handlers.rs

use actix_web::{http::header, web, HttpResponse};
use futures_util::stream;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Order, OrderStatus, Role};
use crate::pipelines::contexts::{CodOrderCtx, OrderStatusCtx};
use crate::services::events::OrderEvent;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;
use crate::web::handlers::{run_flow, OrderRequestPayload};
use platter_flow::Ctx;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdatePayload {
  pub status: OrderStatus,
  pub delivery_agent_id: Option<Uuid>,
  pub otp: Option<String>,
}

/// What `user` may see of `order`. Agents never see the handoff code.
pub(crate) fn visible_to(order: Order, user: &AuthenticatedUser) -> Result<Order, AppError> {
  match user.role {
    Role::Admin => Ok(order),
    Role::DeliveryAgent if order.delivery_agent_id == Some(user.account_id) => Ok(order.without_otp()),
    Role::User if order.user_id == user.account_id => Ok(order),
    _ => Err(AppError::Forbidden("You cannot access this order.".to_string())),
  }
}

async fn load_order(state: &AppState, order_id: Uuid) -> Result<Order, AppError> {
  state
    .orders
    .find(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))
}

#[instrument(name = "handler::place_cod_order", skip(app_state, auth_user, req_payload), fields(user_id = %auth_user.account_id))]
pub async fn place_cod_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<OrderRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let draft = req_payload.into_inner().into_draft(auth_user.account_id);
  let ctx = Ctx::new(CodOrderCtx {
    state: app_state.get_ref().clone(),
    draft,
    order: None,
  });

  run_flow(&app_state, ctx.clone()).await?;

  let guard = ctx.read();
  let order = guard
    .order
    .as_ref()
    .ok_or_else(|| AppError::Internal("COD flow completed without an order.".to_string()))?;
  Ok(HttpResponse::Created().json(json!({ "order": order })))
}

#[instrument(name = "handler::my_orders", skip(app_state, auth_user), fields(user_id = %auth_user.account_id))]
pub async fn my_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.orders.list_for_user(auth_user.account_id).await?;
  Ok(HttpResponse::Ok().json(json!({ "orders": orders })))
}

#[instrument(name = "handler::get_order", skip(app_state, auth_user), fields(user_id = %auth_user.account_id))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = load_order(&app_state, order_id.into_inner()).await?;
  let order = visible_to(order, &auth_user)?;
  Ok(HttpResponse::Ok().json(json!({ "order": order })))
}

#[instrument(
  name = "handler::update_order_status",
  skip(app_state, auth_user, req_payload),
  fields(actor_id = %auth_user.account_id, target = %req_payload.status)
)]
pub async fn update_order_status_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
  req_payload: web::Json<StatusUpdatePayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let ctx = Ctx::new(OrderStatusCtx {
    state: app_state.get_ref().clone(),
    actor: auth_user.actor(),
    order_id: order_id.into_inner(),
    target: payload.status,
    otp: payload.otp,
    delivery_agent_id: payload.delivery_agent_id,
    order: None,
  });

  run_flow(&app_state, ctx.clone()).await?;

  let order = ctx
    .read()
    .order
    .clone()
    .ok_or_else(|| AppError::Internal("Status flow completed without an order.".to_string()))?;
  info!(order_id = %order.id, status = %order.status, "Order status updated.");
  let order = match auth_user.role {
    Role::Admin => order,
    _ => order.without_otp(),
  };
  Ok(HttpResponse::Ok().json(json!({ "order": order })))
}

#[instrument(name = "handler::delivery_orders", skip(app_state, auth_user), fields(agent_id = %auth_user.account_id))]
pub async fn delivery_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  auth_user.require_role(Role::DeliveryAgent)?;
  let orders: Vec<Order> = app_state
    .orders
    .list_for_agent(auth_user.account_id)
    .await?
    .iter()
    .map(Order::without_otp)
    .collect();
  Ok(HttpResponse::Ok().json(json!({ "orders": orders })))
}

#[instrument(name = "handler::order_events", skip(app_state, auth_user), fields(user_id = %auth_user.account_id))]
pub async fn order_events_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = load_order(&app_state, order_id.into_inner()).await?;
  let order = visible_to(order, &auth_user)?;
  let watched = order.id;
  Ok(event_stream_response(app_state.events.subscribe(), move |event| {
    event.order_id == watched
  }))
}

/// Server-sent events over an event hub subscription.
pub(crate) fn event_stream_response(
  receiver: broadcast::Receiver<OrderEvent>,
  filter: impl Fn(&OrderEvent) -> bool + 'static,
) -> HttpResponse {
  let frames = stream::unfold((receiver, filter), |(mut receiver, filter)| async move {
    loop {
      match receiver.recv().await {
        Ok(event) if filter(&event) => match serde_json::to_string(&event) {
          Ok(data) => {
            let frame = format!("event: {}\ndata: {}\n\n", event.kind.as_str(), data);
            return Some((Ok::<_, Infallible>(web::Bytes::from(frame)), (receiver, filter)));
          }
          Err(e) => warn!(error = %e, "could not encode order event"),
        },
        Ok(_) => {}
        Err(RecvError::Lagged(skipped)) => warn!(skipped, "event subscriber lagged, events dropped"),
        Err(RecvError::Closed) => return None,
      }
    }
  });

  HttpResponse::Ok()
    .content_type("text/event-stream")
    .insert_header((header::CACHE_CONTROL, "no-cache"))
    .streaming(frames)
}
