// src/flow/definition.rs

//! `Flow<TData, Err>` definition and structural operations.

use crate::core::handler::Hook;
use crate::core::step::Step;
use crate::error::FlowError;
use std::collections::HashMap;

/// Hooks attached to one step, run in phase order before, on, after.
pub(crate) struct StepHooks<TData: Send + Sync + 'static, Err> {
  pub(crate) before: Vec<Hook<TData, Err>>,
  pub(crate) on: Vec<Hook<TData, Err>>,
  pub(crate) after: Vec<Hook<TData, Err>>,
}

impl<TData: Send + Sync + 'static, Err> Default for StepHooks<TData, Err> {
  fn default() -> Self {
    Self {
      before: Vec::new(),
      on: Vec::new(),
      after: Vec::new(),
    }
  }
}

impl<TData: Send + Sync + 'static, Err> StepHooks<TData, Err> {
  pub(crate) fn is_empty(&self) -> bool {
    self.before.is_empty() && self.on.is_empty() && self.after.is_empty()
  }
}

/// An ordered list of named steps over a root context `TData`.
///
/// `Err` is what the hooks return; it must absorb [`FlowError`] so framework
/// failures (missing hooks, extractor failures) surface through the same type.
pub struct Flow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<Step<TData>>,
  pub(crate) hooks: HashMap<String, StepHooks<TData, Err>>,
}

impl<TData, Err> Flow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn new(steps: Vec<Step<TData>>) -> Self {
    let mut flow = Self {
      steps: Vec::with_capacity(steps.len()),
      hooks: HashMap::new(),
    };
    for step in steps {
      flow.ensure_step_absent(&step.name);
      flow.steps.push(step);
    }
    flow
  }

  /// Names of the steps in execution order.
  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  /// Inserts `step` right after `existing`.
  pub fn insert_after(&mut self, existing: &str, step: Step<TData>) {
    let idx = self.step_index(existing);
    self.ensure_step_absent(&step.name);
    self.steps.insert(idx + 1, step);
  }

  /// Looks a step up without panicking.
  pub fn find_step(&self, step_name: &str) -> Result<&Step<TData>, FlowError> {
    self
      .steps
      .iter()
      .find(|s| s.name == step_name)
      .ok_or_else(|| FlowError::StepNotFound {
        step_name: step_name.to_string(),
      })
  }

  /// Unknown step names in hook registration are programming errors.
  pub(crate) fn step_index(&self, step_name: &str) -> usize {
    self
      .steps
      .iter()
      .position(|s| s.name == step_name)
      .unwrap_or_else(|| panic!("flow setup error: step '{}' is not defined", step_name))
  }

  fn ensure_step_absent(&self, step_name: &str) {
    if self.steps.iter().any(|s| s.name == step_name) {
      panic!("flow setup error: step '{}' is defined twice", step_name);
    }
  }

  pub(crate) fn hooks_mut(&mut self, step_name: &str) -> &mut StepHooks<TData, Err> {
    self.step_index(step_name);
    self.hooks.entry(step_name.to_string()).or_default()
  }
}
