// tests/error_handling_tests.rs
mod common;

use common::*;
use platter_flow::{Ctx, Flow, FlowError, Step, StepControl};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn required_step_without_hooks_fails() {
  setup_tracing();
  let flow = Flow::<TicketCtx, TestError>::new(vec![Step::required("missing")]);
  let err = flow.run(Ctx::new(TicketCtx::default())).await.unwrap_err();
  match err {
    TestError::Flow(s) => {
      assert!(s.contains("HandlerMissing"));
      assert!(s.contains("missing"));
    }
    other => panic!("expected HandlerMissing, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn flow_can_use_flow_error_directly() {
  setup_tracing();
  let mut flow = Flow::<TicketCtx, FlowError>::new(vec![Step::required("task")]);
  flow.on("task", |_ctx: Ctx<TicketCtx>| {
    Box::pin(async move { Err::<StepControl, FlowError>(FlowError::Internal("intentional".to_string())) })
  });

  match flow.run(Ctx::new(TicketCtx::default())).await {
    Err(FlowError::Internal(msg)) => assert_eq!(msg, "intentional"),
    other => panic!("expected FlowError::Internal, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn anyhow_errors_convert_into_handler_variant() {
  setup_tracing();
  let mut flow = Flow::<TicketCtx, FlowError>::new(vec![Step::required("task")]);
  flow.on("task", |_ctx: Ctx<TicketCtx>| {
    Box::pin(async move { Err::<StepControl, anyhow::Error>(anyhow::anyhow!("upstream down")) })
  });

  let err = flow.run(Ctx::new(TicketCtx::default())).await.unwrap_err();
  assert!(matches!(err, FlowError::Handler { .. }));
  assert!(err.to_string().contains("upstream down"));
}

#[test]
fn find_step_reports_unknown_names() {
  let flow = Flow::<TicketCtx, TestError>::new(vec![Step::required("known")]);
  assert!(flow.find_step("known").is_ok());
  assert!(matches!(flow.find_step("nope"), Err(FlowError::StepNotFound { .. })));
}
