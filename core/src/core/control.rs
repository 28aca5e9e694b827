// src/core/control.rs

//! Signals for controlling flow execution and the outcome of a run.

/// Returned by every hook: keep going or halt the whole flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
  /// Run the remaining hooks of this step and the following steps.
  Continue,
  /// Halt immediately. No further hooks of this or any later step run.
  Stop,
}

/// Outcome of a full flow run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
  /// Every non-skipped step ran to completion.
  Completed,
  /// A hook returned [`StepControl::Stop`].
  Stopped,
}

impl FlowOutcome {
  pub fn is_completed(self) -> bool {
    matches!(self, FlowOutcome::Completed)
  }
}
