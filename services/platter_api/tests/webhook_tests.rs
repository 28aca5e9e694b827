// services/platter_api/tests/webhook_tests.rs

#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use common::TestContext;
use platter_api::db::OrderRepository;
use platter_api::models::{CustomerContact, GatewayRefs, Order, OrderDraft, OrderItem, RefundStatus};
use platter_api::services::refunds::{RefundOutcome, RefundReason, RefundRequest};
use rust_decimal::Decimal;
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;

async fn paid_order(ctx: &TestContext, payment_id: &str) -> Order {
  let draft = OrderDraft {
    user_id: Uuid::new_v4(),
    customer: CustomerContact {
      name: "Kiran".into(),
      phone: "9000011111".into(),
    },
    items: vec![OrderItem {
      product_id: "biryani".into(),
      name: "Chicken Biryani".into(),
      quantity: 1,
      unit_price: Decimal::from(500),
    }],
    total_amount: Decimal::from(500),
    delivery_address: "3 Park Lane".into(),
  };
  let refs = GatewayRefs {
    order_id: Some("order_gw_1".into()),
    payment_id: Some(payment_id.into()),
    signature: Some("sig".into()),
  };
  ctx.orders.inner.insert(Order::paid_online(draft, refs, "123456".into())).await.unwrap()
}

fn refund_event(event: &str, refund_id: &str, payment_id: &str) -> Vec<u8> {
  serde_json::to_vec(&json!({
    "entity": "event",
    "event": event,
    "payload": {
      "refund": {
        "entity": { "id": refund_id, "payment_id": payment_id, "amount": 50000, "status": "processed" }
      }
    }
  }))
  .unwrap()
}

macro_rules! post_webhook {
  ($app:expr, $body:expr, $signature:expr) => {{
    let mut req = test::TestRequest::post()
      .uri("/api/v1/payments/webhook")
      .insert_header(("Content-Type", "application/json"))
      .set_payload($body.clone());
    if let Some(signature) = $signature {
      req = req.insert_header(("X-Razorpay-Signature", signature));
    }
    test::call_service(&$app, req.to_request()).await
  }};
}

#[actix_web::test]
#[serial]
async fn processed_event_completes_initiated_refund() {
  let ctx = TestContext::new();
  let order = paid_order(&ctx, "pay_wh_1").await;
  let outcome = ctx
    .state
    .refunds
    .auto_refund(RefundRequest {
      order_id: Some(order.id),
      payment_id: "pay_wh_1".into(),
      amount: Decimal::from(500),
      reason: RefundReason::Manual,
    })
    .await;
  let refund_id = match outcome {
    RefundOutcome::Initiated { refund_id } => refund_id,
    other => panic!("expected refund to be initiated, got {:?}", other),
  };
  let app = test_app!(ctx.state);

  let body = refund_event("refund.processed", &refund_id, "pay_wh_1");
  let resp = post_webhook!(app, body, Some(ctx.webhook_signature(&body)));
  assert_eq!(resp.status(), StatusCode::OK);

  let stored = ctx.orders.inner.find(order.id).await.unwrap().unwrap();
  assert_eq!(stored.refund.status, RefundStatus::Completed);
  assert_eq!(stored.refund.refund_id.as_deref(), Some(refund_id.as_str()));

  // Redelivery is harmless.
  let resp = post_webhook!(app, body, Some(ctx.webhook_signature(&body)));
  assert_eq!(resp.status(), StatusCode::OK);
  let stored = ctx.orders.inner.find(order.id).await.unwrap().unwrap();
  assert_eq!(stored.refund.status, RefundStatus::Completed);
}

#[actix_web::test]
#[serial]
async fn processed_event_before_local_record_goes_through_initiated() {
  let ctx = TestContext::new();
  let order = paid_order(&ctx, "pay_wh_2").await;
  let app = test_app!(ctx.state);

  let body = refund_event("refund.processed", "rfnd_early", "pay_wh_2");
  let resp = post_webhook!(app, body, Some(ctx.webhook_signature(&body)));
  assert_eq!(resp.status(), StatusCode::OK);

  let stored = ctx.orders.inner.find(order.id).await.unwrap().unwrap();
  assert_eq!(stored.refund.status, RefundStatus::Completed);
  assert_eq!(stored.refund.refund_id.as_deref(), Some("rfnd_early"));
  assert_eq!(stored.refund.amount, Some(Decimal::from(500)));

  // A late local auto-refund must not go back to the gateway.
  let outcome = ctx
    .state
    .refunds
    .auto_refund(RefundRequest {
      order_id: Some(order.id),
      payment_id: "pay_wh_2".into(),
      amount: Decimal::from(500),
      reason: RefundReason::StaleToken,
    })
    .await;
  assert_eq!(outcome, RefundOutcome::AlreadyHandled(RefundStatus::Completed));
  assert!(ctx.gateway.refund_calls().is_empty());
}

#[actix_web::test]
#[serial]
async fn failed_event_marks_refund_failed() {
  let ctx = TestContext::new();
  let order = paid_order(&ctx, "pay_wh_3").await;
  let app = test_app!(ctx.state);

  let body = refund_event("refund.failed", "rfnd_x", "pay_wh_3");
  let resp = post_webhook!(app, body, Some(ctx.webhook_signature(&body)));
  assert_eq!(resp.status(), StatusCode::OK);
  let stored = ctx.orders.inner.find(order.id).await.unwrap().unwrap();
  assert_eq!(stored.refund.status, RefundStatus::Failed);

  // Failed is terminal.
  let body = refund_event("refund.processed", "rfnd_x", "pay_wh_3");
  let resp = post_webhook!(app, body, Some(ctx.webhook_signature(&body)));
  assert_eq!(resp.status(), StatusCode::OK);
  let stored = ctx.orders.inner.find(order.id).await.unwrap().unwrap();
  assert_eq!(stored.refund.status, RefundStatus::Failed);
}

#[actix_web::test]
#[serial]
async fn bad_or_missing_signature_is_rejected() {
  let ctx = TestContext::new();
  let order = paid_order(&ctx, "pay_wh_4").await;
  let app = test_app!(ctx.state);
  let body = refund_event("refund.processed", "rfnd_4", "pay_wh_4");

  let resp = post_webhook!(app, body, Some("00".repeat(32)));
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let resp = post_webhook!(app, body, None::<String>);
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  // Signature over different bytes.
  let other = refund_event("refund.processed", "rfnd_4", "pay_other");
  let resp = post_webhook!(app, body, Some(ctx.webhook_signature(&other)));
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let stored = ctx.orders.inner.find(order.id).await.unwrap().unwrap();
  assert_eq!(stored.refund.status, RefundStatus::None);
}

#[actix_web::test]
#[serial]
async fn malformed_or_unrelated_events() {
  let ctx = TestContext::new();
  let app = test_app!(ctx.state);

  let garbage = b"{not json".to_vec();
  let resp = post_webhook!(app, garbage, Some(ctx.webhook_signature(&garbage)));
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let unrelated = serde_json::to_vec(&json!({ "event": "payment.captured", "payload": {} })).unwrap();
  let resp = post_webhook!(app, unrelated, Some(ctx.webhook_signature(&unrelated)));
  assert_eq!(resp.status(), StatusCode::OK);

  // Valid refund event for an order this service never saw.
  let unknown = refund_event("refund.processed", "rfnd_unknown", "pay_unknown");
  let resp = post_webhook!(app, unknown, Some(ctx.webhook_signature(&unknown)));
  assert_eq!(resp.status(), StatusCode::OK);

  let missing_entity = serde_json::to_vec(&json!({ "event": "refund.processed", "payload": {} })).unwrap();
  let resp = post_webhook!(app, missing_entity, Some(ctx.webhook_signature(&missing_entity)));
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
