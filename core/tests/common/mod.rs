// tests/common/mod.rs
#![allow(dead_code)]

use platter_flow::{Ctx, FlowError, Hook, StepControl};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use tracing::Level;

#[derive(Clone, Debug, Default)]
pub struct TicketCtx {
  pub counter: i32,
  pub log: String,
  pub steps_executed: Vec<String>,
  pub stop_at: Option<String>,
  pub route: String,
  pub payload: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct KitchenCtx {
  pub input: String,
  pub prepared: String,
}

#[derive(Clone, Debug, Default)]
pub struct CourierCtx {
  pub input: String,
  pub dispatched: String,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("flow error: {0}")]
  Flow(String),

  #[error("hook failed: {0}")]
  Hook(String),
}

impl From<FlowError> for TestError {
  fn from(fe: FlowError) -> Self {
    TestError::Flow(format!("{:?}", fe))
  }
}

pub fn recording_hook(step_name: &'static str, note: &'static str) -> Hook<TicketCtx, TestError> {
  Box::new(move |ctx: Ctx<TicketCtx>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.counter += 1;
      guard.log.push_str(note);
      guard.steps_executed.push(step_name.to_string());
      if guard.stop_at.as_deref() == Some(step_name) {
        return Ok(StepControl::Stop);
      }
      Ok(StepControl::Continue)
    })
  })
}

pub fn failing_hook(step_name: &'static str, message: &'static str) -> Hook<TicketCtx, TestError> {
  Box::new(move |ctx: Ctx<TicketCtx>| {
    Box::pin(async move {
      ctx.write().steps_executed.push(step_name.to_string());
      Err(TestError::Hook(message.to_string()))
    })
  })
}

use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub static KITCHEN_RUNS: Lazy<Arc<AtomicUsize>> = Lazy::new(|| Arc::new(AtomicUsize::new(0)));
pub static COURIER_RUNS: Lazy<Arc<AtomicUsize>> = Lazy::new(|| Arc::new(AtomicUsize::new(0)));

pub fn reset_counters() {
  KITCHEN_RUNS.store(0, Ordering::SeqCst);
  COURIER_RUNS.store(0, Ordering::SeqCst);
}
