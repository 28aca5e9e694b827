// src/branch/builder.rs

//! Fluent API for attaching branches to a step:
//! `flow.branch("route").scope(sub_flow, extractor).when(cond).otherwise(..).finish(optional)`.

use crate::branch::arm::{Arm, Branch, Condition, Extractor};
use crate::core::control::StepControl;
use crate::core::ctx::Ctx;
use crate::core::handler::Hook;
use crate::error::FlowError;
use crate::flow::Flow;
use std::sync::Arc;
use tracing::{event, Level};

/// Collects branches for one step of a `Flow<TData, Err>`.
pub struct BranchBuilder<'flow, TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  flow: &'flow mut Flow<TData, Err>,
  step_name: String,
  branches: Vec<Arc<dyn Branch<TData, Err>>>,
  otherwise: StepControl,
}

impl<TData, Err> Flow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Starts configuring branches for an existing step.
  pub fn branch(&mut self, step_name: &str) -> BranchBuilder<'_, TData, Err> {
    self.step_index(step_name);
    BranchBuilder {
      flow: self,
      step_name: step_name.to_string(),
      branches: Vec::new(),
      otherwise: StepControl::Continue,
    }
  }
}

impl<'flow, TData, Err> BranchBuilder<'flow, TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Adds a sub-flow and the extractor producing its context. Complete it with
  /// [`BranchConfigurator::when`].
  pub fn scope<SData>(
    self,
    sub_flow: Arc<Flow<SData, Err>>,
    extractor: impl Fn(Ctx<TData>) -> Result<Ctx<SData>, FlowError> + Send + Sync + 'static,
  ) -> BranchConfigurator<'flow, TData, SData, Err>
  where
    SData: 'static + Send + Sync,
  {
    BranchConfigurator {
      builder: self,
      sub_flow,
      extractor: Arc::new(extractor),
    }
  }

  /// What the step returns when no branch matches. Defaults to `Continue`.
  pub fn otherwise(mut self, control: StepControl) -> Self {
    self.otherwise = control;
    self
  }

  /// Installs the dispatching hook as the step's only `on` hook.
  ///
  /// When `optional` is set, a failing branch is logged and the parent flow
  /// continues.
  pub fn finish(self, optional: bool) {
    let branches = Arc::new(self.branches);
    let otherwise = self.otherwise;
    let step_name = self.step_name.clone();

    let dispatch: Hook<TData, Err> = Box::new(move |ctx: Ctx<TData>| {
      let branches = branches.clone();
      let step_name = step_name.clone();
      Box::pin(async move {
        for branch in branches.iter() {
          if !branch.matches(ctx.clone()) {
            continue;
          }
          event!(Level::DEBUG, %step_name, "branch matched");
          return match branch.run(ctx.clone()).await {
            Ok(control) => Ok(control),
            Err(e) if optional => {
              event!(Level::WARN, %step_name, error = %e, "optional branch failed, continuing");
              Ok(StepControl::Continue)
            }
            Err(e) => Err(e),
          };
        }
        event!(Level::DEBUG, %step_name, ?otherwise, "no branch matched");
        Ok(otherwise)
      })
    });

    let idx = self.flow.step_index(&self.step_name);
    self.flow.steps[idx].optional = optional;
    self.flow.hooks_mut(&self.step_name).on = vec![dispatch];
    event!(Level::DEBUG, step_name = %self.step_name, "branches installed");
  }
}

/// Pending branch waiting for its condition.
pub struct BranchConfigurator<'flow, TData, SData, Err>
where
  TData: 'static + Send + Sync,
  SData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  builder: BranchBuilder<'flow, TData, Err>,
  sub_flow: Arc<Flow<SData, Err>>,
  extractor: Extractor<TData, SData>,
}

impl<'flow, TData, SData, Err> BranchConfigurator<'flow, TData, SData, Err>
where
  TData: 'static + Send + Sync,
  SData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn when(
    mut self,
    condition: impl Fn(Ctx<TData>) -> bool + Send + Sync + 'static,
  ) -> BranchBuilder<'flow, TData, Err> {
    let condition: Condition<TData> = Arc::new(condition);
    let arm = Arm {
      step_name: self.builder.step_name.clone(),
      condition,
      extractor: self.extractor,
      sub_flow: self.sub_flow,
    };
    self.builder.branches.push(Arc::new(arm));
    self.builder
  }
}
