// services/platter_api/src/pipelines/cod_pipeline.rs

use crate::errors::AppError;
use crate::models::Order;
use crate::pipelines::common_steps;
use crate::pipelines::contexts::CodOrderCtx;
use platter_flow::{Ctx, Flow, FlowRegistry, Step, StepControl};
use tracing::info;

/// Cash-on-delivery placement: validated like checkout, stored unpaid.
pub fn register_cod_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<CodOrderCtx, AppError>::new(vec![
    Step::required("validate_order_request"),
    Step::required("persist_cod_order"),
    Step::optional("announce_order"),
  ]);

  flow.on("validate_order_request", |ctx: Ctx<CodOrderCtx>| {
    Box::pin(async move {
      common_steps::validate_order_draft(&ctx.read().draft)?;
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("persist_cod_order", |ctx: Ctx<CodOrderCtx>| {
    Box::pin(async move {
      let (orders, order) = {
        let guard = ctx.read();
        (guard.state.orders.clone(), Order::cash_on_delivery(guard.draft.clone()))
      };
      let order = orders.insert(order).await?;
      info!(order_id = %order.id, user_id = %order.user_id, total = %order.total_amount, "COD order placed");
      ctx.write().order = Some(order);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("announce_order", |ctx: Ctx<CodOrderCtx>| {
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
  info!("COD order flow registered.");
}
