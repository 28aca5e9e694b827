// src/flow/hooks.rs

//! Registration of `before`, `on` and `after` hooks.

use crate::core::control::StepControl;
use crate::core::ctx::Ctx;
use crate::core::handler::boxed_hook;
use crate::error::FlowError;
use crate::flow::definition::Flow;
use std::future::Future;
use tracing::{event, Level};

impl<TData, Err> Flow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Registers a hook that runs before the step's `on` hooks.
  ///
  /// The hook's own error type only needs to convert into the flow's `Err`.
  pub fn before<F, UserErr>(&mut self, step_name: &str, hook_fn: impl Fn(Ctx<TData>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<StepControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.hooks_mut(step_name).before.push(boxed_hook(hook_fn));
    event!(Level::TRACE, %step_name, "before hook registered");
  }

  /// Registers the main hook of a step.
  pub fn on<F, UserErr>(&mut self, step_name: &str, hook_fn: impl Fn(Ctx<TData>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<StepControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.hooks_mut(step_name).on.push(boxed_hook(hook_fn));
    event!(Level::TRACE, %step_name, "on hook registered");
  }

  /// Registers a hook that runs after the step's `on` hooks.
  pub fn after<F, UserErr>(&mut self, step_name: &str, hook_fn: impl Fn(Ctx<TData>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<StepControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.hooks_mut(step_name).after.push(boxed_hook(hook_fn));
    event!(Level::TRACE, %step_name, "after hook registered");
  }
}
