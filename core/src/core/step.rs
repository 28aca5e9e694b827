// src/core/step.rs

use super::Ctx;
use std::sync::Arc;

/// Predicate evaluated before a step runs; `true` skips the step.
pub type SkipPredicate<TData> = Arc<dyn Fn(Ctx<TData>) -> bool + Send + Sync + 'static>;

/// A named step of a flow.
#[derive(Clone)]
pub struct Step<TData: Send + Sync + 'static> {
  pub name: String,
  pub optional: bool,
  pub skip_if: Option<SkipPredicate<TData>>,
}

impl<TData: Send + Sync + 'static> Step<TData> {
  /// A step that must have at least one hook.
  pub fn required(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      optional: false,
      skip_if: None,
    }
  }

  /// A step that is silently skipped when no hook is attached.
  pub fn optional(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      optional: true,
      skip_if: None,
    }
  }

  pub fn skip_when(mut self, predicate: impl Fn(Ctx<TData>) -> bool + Send + Sync + 'static) -> Self {
    self.skip_if = Some(Arc::new(predicate));
    self
  }
}

impl<TData: Send + Sync + 'static> std::fmt::Debug for Step<TData> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Step")
      .field("name", &self.name)
      .field("optional", &self.optional)
      .field("has_skip_predicate", &self.skip_if.is_some())
      .finish()
  }
}
