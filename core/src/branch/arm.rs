// src/branch/arm.rs

use crate::core::control::{FlowOutcome, StepControl};
use crate::core::ctx::Ctx;
use crate::error::FlowError;
use crate::flow::Flow;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{event, instrument, Level};

pub(crate) type Condition<TData> = Arc<dyn Fn(Ctx<TData>) -> bool + Send + Sync + 'static>;
pub(crate) type Extractor<TData, SData> =
  Arc<dyn Fn(Ctx<TData>) -> Result<Ctx<SData>, FlowError> + Send + Sync + 'static>;

/// Type-erased branch so arms with different sub-context types share one list.
#[async_trait]
pub(crate) trait Branch<TData, Err>: Send + Sync
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn matches(&self, ctx: Ctx<TData>) -> bool;

  async fn run(&self, ctx: Ctx<TData>) -> Result<StepControl, Err>;
}

/// One arm: condition, extractor and the sub-flow it feeds.
pub(crate) struct Arm<TData, SData, Err>
where
  TData: 'static + Send + Sync,
  SData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) step_name: String,
  pub(crate) condition: Condition<TData>,
  pub(crate) extractor: Extractor<TData, SData>,
  pub(crate) sub_flow: Arc<Flow<SData, Err>>,
}

#[async_trait]
impl<TData, SData, Err> Branch<TData, Err> for Arm<TData, SData, Err>
where
  TData: 'static + Send + Sync,
  SData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn matches(&self, ctx: Ctx<TData>) -> bool {
    (self.condition)(ctx)
  }

  #[instrument(
    name = "Branch::run",
    skip(self, ctx),
    fields(
      step_name = %self.step_name,
      sub_ctx_type = %std::any::type_name::<SData>(),
    ),
    err(Display)
  )]
  async fn run(&self, ctx: Ctx<TData>) -> Result<StepControl, Err> {
    let sub_ctx = (self.extractor)(ctx).map_err(|e| {
      event!(Level::ERROR, error = %e, "branch extractor failed");
      let source = match e {
        FlowError::ExtractorFailure { source, .. } | FlowError::Handler { source } => source,
        other => anyhow::Error::new(other),
      };
      Err::from(FlowError::ExtractorFailure {
        step_name: self.step_name.clone(),
        source,
      })
    })?;

    match self.sub_flow.run(sub_ctx).await? {
      FlowOutcome::Completed => Ok(StepControl::Continue),
      FlowOutcome::Stopped => {
        event!(Level::INFO, "sub-flow stopped, halting parent flow");
        Ok(StepControl::Stop)
      }
    }
  }
}
