// tests/branch_tests.rs
mod common;

use common::*;
use platter_flow::{Ctx, Flow, FlowError, FlowOutcome, Step, StepControl};
use serial_test::serial;
use std::sync::{atomic::Ordering, Arc};

fn kitchen_flow() -> Flow<KitchenCtx, TestError> {
  let mut flow = Flow::<KitchenCtx, TestError>::new(vec![Step::required("prepare")]);
  flow.on("prepare", |ctx: Ctx<KitchenCtx>| {
    Box::pin(async move {
      KITCHEN_RUNS.fetch_add(1, Ordering::SeqCst);
      let mut guard = ctx.write();
      guard.prepared = format!("plated {}", guard.input);
      Ok::<_, TestError>(StepControl::Continue)
    })
  });
  flow
}

fn courier_flow(stop: bool) -> Flow<CourierCtx, TestError> {
  let mut flow = Flow::<CourierCtx, TestError>::new(vec![Step::required("dispatch")]);
  flow.on("dispatch", move |ctx: Ctx<CourierCtx>| {
    Box::pin(async move {
      COURIER_RUNS.fetch_add(1, Ordering::SeqCst);
      let mut guard = ctx.write();
      guard.dispatched = format!("sent {}", guard.input);
      Ok::<_, TestError>(if stop { StepControl::Stop } else { StepControl::Continue })
    })
  });
  flow
}

fn kitchen_extractor(ctx: Ctx<TicketCtx>) -> Result<Ctx<KitchenCtx>, FlowError> {
  let input = ctx.read().payload.clone().unwrap_or_default();
  Ok(Ctx::new(KitchenCtx {
    input,
    ..Default::default()
  }))
}

fn courier_extractor(ctx: Ctx<TicketCtx>) -> Result<Ctx<CourierCtx>, FlowError> {
  let input = ctx.read().payload.clone().unwrap_or_default();
  Ok(Ctx::new(CourierCtx {
    input,
    ..Default::default()
  }))
}

fn routed_flow(courier_stops: bool) -> Flow<TicketCtx, TestError> {
  let mut flow = Flow::<TicketCtx, TestError>::new(vec![
    Step::required("intake"),
    Step::required("route"),
    Step::required("close"),
  ]);
  flow.on("intake", recording_hook("intake", "I"));
  flow.on("close", recording_hook("close", "C"));
  flow
    .branch("route")
    .scope(Arc::new(kitchen_flow()), kitchen_extractor)
    .when(|ctx: Ctx<TicketCtx>| ctx.read().route == "kitchen")
    .scope(Arc::new(courier_flow(courier_stops)), courier_extractor)
    .when(|ctx: Ctx<TicketCtx>| ctx.read().route == "courier")
    .finish(false);
  flow
}

#[tokio::test]
#[serial]
async fn first_matching_branch_runs() {
  setup_tracing();
  reset_counters();
  let flow = routed_flow(false);
  let ctx = Ctx::new(TicketCtx {
    route: "kitchen".to_string(),
    payload: Some("thali".to_string()),
    ..Default::default()
  });

  assert_eq!(flow.run(ctx.clone()).await.unwrap(), FlowOutcome::Completed);
  assert_eq!(KITCHEN_RUNS.load(Ordering::SeqCst), 1);
  assert_eq!(COURIER_RUNS.load(Ordering::SeqCst), 0);
  assert_eq!(ctx.read().log, "IC");
}

#[tokio::test]
#[serial]
async fn unmatched_branch_continues_by_default() {
  setup_tracing();
  reset_counters();
  let flow = routed_flow(false);
  let ctx = Ctx::new(TicketCtx {
    route: "nowhere".to_string(),
    ..Default::default()
  });

  assert_eq!(flow.run(ctx.clone()).await.unwrap(), FlowOutcome::Completed);
  assert_eq!(KITCHEN_RUNS.load(Ordering::SeqCst), 0);
  assert_eq!(COURIER_RUNS.load(Ordering::SeqCst), 0);
  assert_eq!(ctx.read().steps_executed, vec!["intake", "close"]);
}

#[tokio::test]
#[serial]
async fn otherwise_stop_halts_parent() {
  setup_tracing();
  reset_counters();
  let mut flow = Flow::<TicketCtx, TestError>::new(vec![Step::required("route"), Step::required("close")]);
  flow.on("close", recording_hook("close", "C"));
  flow
    .branch("route")
    .scope(Arc::new(kitchen_flow()), kitchen_extractor)
    .when(|ctx: Ctx<TicketCtx>| ctx.read().route == "kitchen")
    .otherwise(StepControl::Stop)
    .finish(false);

  let ctx = Ctx::new(TicketCtx::default());
  assert_eq!(flow.run(ctx.clone()).await.unwrap(), FlowOutcome::Stopped);
  assert!(ctx.read().steps_executed.is_empty());
}

#[tokio::test]
#[serial]
async fn sub_flow_stop_propagates_to_parent() {
  setup_tracing();
  reset_counters();
  let flow = routed_flow(true);
  let ctx = Ctx::new(TicketCtx {
    route: "courier".to_string(),
    payload: Some("parcel".to_string()),
    ..Default::default()
  });

  assert_eq!(flow.run(ctx.clone()).await.unwrap(), FlowOutcome::Stopped);
  assert_eq!(COURIER_RUNS.load(Ordering::SeqCst), 1);
  assert_eq!(ctx.read().steps_executed, vec!["intake"]);
}

#[tokio::test]
#[serial]
async fn extractor_failure_surfaces_as_flow_error() {
  setup_tracing();
  reset_counters();
  let mut flow = Flow::<TicketCtx, TestError>::new(vec![Step::required("route")]);
  flow
    .branch("route")
    .scope(Arc::new(kitchen_flow()), |_ctx: Ctx<TicketCtx>| {
      Err::<Ctx<KitchenCtx>, FlowError>(FlowError::Internal("no payload".to_string()))
    })
    .when(|_ctx: Ctx<TicketCtx>| true)
    .finish(false);

  let err = flow.run(Ctx::new(TicketCtx::default())).await.unwrap_err();
  match err {
    TestError::Flow(s) => assert!(s.contains("ExtractorFailure")),
    other => panic!("expected extractor failure, got {:?}", other),
  }
  assert_eq!(KITCHEN_RUNS.load(Ordering::SeqCst), 0);
}

#[tokio::test]
#[serial]
async fn optional_branch_swallows_sub_flow_error() {
  setup_tracing();
  reset_counters();
  let mut failing = Flow::<KitchenCtx, TestError>::new(vec![Step::required("prepare")]);
  failing.on("prepare", |_ctx: Ctx<KitchenCtx>| {
    Box::pin(async move { Err::<StepControl, _>(TestError::Hook("burnt".to_string())) })
  });

  let mut flow = Flow::<TicketCtx, TestError>::new(vec![Step::required("route"), Step::required("close")]);
  flow.on("close", recording_hook("close", "C"));
  flow
    .branch("route")
    .scope(Arc::new(failing), kitchen_extractor)
    .when(|_ctx: Ctx<TicketCtx>| true)
    .finish(true);

  let ctx = Ctx::new(TicketCtx::default());
  assert_eq!(flow.run(ctx.clone()).await.unwrap(), FlowOutcome::Completed);
  assert_eq!(ctx.read().log, "C");
}
