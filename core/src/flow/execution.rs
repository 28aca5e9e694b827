// src/flow/execution.rs

//! `Flow::run`: executes steps in order against a shared context.

use crate::core::control::{FlowOutcome, StepControl};
use crate::core::ctx::Ctx;
use crate::core::handler::Hook;
use crate::error::FlowError;
use crate::flow::definition::Flow;
use tracing::{event, instrument, Instrument, Level};

/// Result of running one phase of hooks.
enum PhaseResult {
  Continue,
  Stopped,
}

impl<TData, Err> Flow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs the flow to completion, to the first `Stop`, or to the first error.
  ///
  /// A required step with no hooks fails with [`FlowError::HandlerMissing`],
  /// converted into `Err`.
  #[instrument(
    name = "Flow::run",
    skip_all,
    fields(
      ctx_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx: Ctx<TData>) -> Result<FlowOutcome, Err> {
    event!(Level::DEBUG, "flow starting");

    for (step_idx, step) in self.steps.iter().enumerate() {
      let step_name = step.name.as_str();

      if let Some(skip_if) = &step.skip_if {
        if skip_if(ctx.clone()) {
          event!(Level::DEBUG, %step_name, "step skipped by predicate");
          continue;
        }
      }

      let hooks = match self.hooks.get(step_name) {
        Some(hooks) if !hooks.is_empty() => hooks,
        _ if step.optional => {
          event!(Level::DEBUG, %step_name, "optional step has no hooks, skipping");
          continue;
        }
        _ => {
          event!(Level::ERROR, %step_name, "required step has no hooks");
          return Err(Err::from(FlowError::HandlerMissing {
            step_name: step.name.clone(),
          }));
        }
      };

      let span = tracing::info_span!("flow_step", step_name, step_index = step_idx, optional = step.optional);
      let stopped = async {
        for (phase, phase_hooks) in [("before", &hooks.before), ("on", &hooks.on), ("after", &hooks.after)] {
          if let PhaseResult::Stopped = run_phase(phase, phase_hooks, &ctx).await? {
            return Ok::<bool, Err>(true);
          }
        }
        Ok(false)
      }
      .instrument(span)
      .await?;

      if stopped {
        event!(Level::INFO, %step_name, "flow stopped by a hook");
        return Ok(FlowOutcome::Stopped);
      }
    }

    event!(Level::DEBUG, "flow completed");
    Ok(FlowOutcome::Completed)
  }
}

async fn run_phase<TData, Err>(phase: &str, hooks: &[Hook<TData, Err>], ctx: &Ctx<TData>) -> Result<PhaseResult, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + Send + Sync + 'static,
{
  for (hook_idx, hook) in hooks.iter().enumerate() {
    match hook(ctx.clone()).await {
      Ok(StepControl::Continue) => {}
      Ok(StepControl::Stop) => {
        event!(Level::DEBUG, %phase, hook_index = hook_idx, "hook requested stop");
        return Ok(PhaseResult::Stopped);
      }
      Err(e) => {
        event!(Level::ERROR, %phase, hook_index = hook_idx, error = %e, "hook failed");
        return Err(e);
      }
    }
  }
  Ok(PhaseResult::Continue)
}
