// services/platter_api/src/pipelines/order_status_pipeline.rs

//! Status changes and delivery assignment. Both run the order machine inside
//! the repository's atomic update and publish the result.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Order, Role};
use crate::pipelines::contexts::{AssignAgentCtx, OrderStatusCtx};
use crate::services::events::{OrderEvent, OrderEventKind};
use crate::services::order_machine::{apply_transition, assign_agent, ActorRole};
use crate::state::AppState;
use platter_flow::{Ctx, Flow, FlowRegistry, Step, StepControl};
use tracing::{info, warn};
use uuid::Uuid;

/// Fails unless `agent_id` names a delivery agent account.
async fn ensure_delivery_agent(state: &AppState, agent_id: Uuid) -> AppResult<()> {
  match state.credentials.find_by_id(agent_id).await? {
    Some(account) if account.role == Role::DeliveryAgent => Ok(()),
    Some(_) => Err(AppError::Validation(format!("{} is not a delivery agent", agent_id))),
    None => Err(AppError::NotFound(format!("Delivery agent {} not found", agent_id))),
  }
}

pub fn register_order_status_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<OrderStatusCtx, AppError>::new(vec![
    Step::required("authorize_status_request"),
    Step::required("apply_status_change"),
    Step::optional("publish_status_event"),
  ]);

  flow.on("authorize_status_request", |ctx: Ctx<OrderStatusCtx>| {
    Box::pin(async move {
      let (state, actor, agent_id) = {
        let guard = ctx.read();
        (guard.state.clone(), guard.actor, guard.delivery_agent_id)
      };
      if !matches!(actor.role, ActorRole::Admin | ActorRole::DeliveryAgent) {
        return Err(AppError::Forbidden("Only staff can change order status".to_string()));
      }
      if let Some(agent_id) = agent_id {
        if actor.role != ActorRole::Admin {
          return Err(AppError::Forbidden("only admins assign delivery agents".to_string()));
        }
        ensure_delivery_agent(&state, agent_id).await?;
      }
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("apply_status_change", |ctx: Ctx<OrderStatusCtx>| {
    Box::pin(async move {
      let (state, actor, order_id, target, otp, agent_id) = {
        let guard = ctx.read();
        (
          guard.state.clone(),
          guard.actor,
          guard.order_id,
          guard.target,
          guard.otp.clone(),
          guard.delivery_agent_id,
        )
      };
      let order = state
        .orders
        .update(
          order_id,
          Box::new(move |order: &mut Order| -> AppResult<()> {
            if let Some(agent_id) = agent_id {
              assign_agent(order, &actor, agent_id)?;
            }
            apply_transition(order, &actor, target, otp.as_deref())
          }),
        )
        .await?;
      info!(order_id = %order.id, status = %order.status, actor = ?actor.role, "order status changed");
      ctx.write().order = Some(order);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("publish_status_event", |ctx: Ctx<OrderStatusCtx>| {
    Box::pin(async move {
      let guard = ctx.read();
      if let Some(order) = guard.order.as_ref() {
        if guard.delivery_agent_id.is_some() {
          guard.state.events.publish(OrderEvent::from_order(OrderEventKind::AgentAssigned, order));
        }
        guard.state.events.publish(OrderEvent::from_order(OrderEventKind::StatusChanged, order));
      }
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  registry.register(flow);
  info!("Order status flow registered.");
}

pub fn register_assign_agent_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<AssignAgentCtx, AppError>::new(vec![
    Step::required("verify_delivery_agent"),
    Step::required("assign_delivery_agent"),
    Step::optional("publish_assignment_event"),
  ]);

  flow.on("verify_delivery_agent", |ctx: Ctx<AssignAgentCtx>| {
    Box::pin(async move {
      let (state, actor, agent_id) = {
        let guard = ctx.read();
        (guard.state.clone(), guard.actor, guard.delivery_agent_id)
      };
      if actor.role != ActorRole::Admin {
        warn!(actor = ?actor.role, "non-admin attempted assignment");
        return Err(AppError::Forbidden("only admins assign delivery agents".to_string()));
      }
      ensure_delivery_agent(&state, agent_id).await?;
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("assign_delivery_agent", |ctx: Ctx<AssignAgentCtx>| {
    Box::pin(async move {
      let (state, actor, order_id, agent_id) = {
        let guard = ctx.read();
        (guard.state.clone(), guard.actor, guard.order_id, guard.delivery_agent_id)
      };
      let order = state
        .orders
        .update(
          order_id,
          Box::new(move |order: &mut Order| -> AppResult<()> { assign_agent(order, &actor, agent_id) }),
        )
        .await?;
      info!(order_id = %order.id, delivery_agent_id = %agent_id, "delivery agent assigned");
      ctx.write().order = Some(order);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("publish_assignment_event", |ctx: Ctx<AssignAgentCtx>| {
    Box::pin(async move {
      let guard = ctx.read();
      if let Some(order) = guard.order.as_ref() {
        guard.state.events.publish(OrderEvent::from_order(OrderEventKind::AgentAssigned, order));
      }
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  registry.register(flow);
  info!("Assign agent flow registered.");
}
