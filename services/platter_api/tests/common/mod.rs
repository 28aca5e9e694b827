// services/platter_api/tests/common/mod.rs

#![allow(dead_code)]

use async_trait::async_trait;
use once_cell::sync::Lazy;
use platter_api::config::AppConfig;
use platter_api::db::{
  CredentialStore, InMemoryCredentialStore, InMemoryOrderRepository, InMemoryTokenStore, OrderMutation,
  OrderRepository,
};
use platter_api::errors::{AppError, Result};
use platter_api::models::{Credential, NewAccount, Order, Role};
use platter_api::services::auth_service::{hash_password, issue_session_token};
use platter_api::services::email::LogMailer;
use platter_api::services::gateway_mock::MockGateway;
use platter_api::services::signature::{payment_signature, webhook_signature};
use platter_api::state::{AppState, Stores};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

static TRACING: Lazy<()> = Lazy::new(|| {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING);
}

/// Wraps the in-memory repository; `insert` fails while failures remain and
/// waits `insert_delay_ms` before writing.
#[derive(Default)]
pub struct FlakyOrders {
  pub inner: InMemoryOrderRepository,
  failing_inserts: AtomicU32,
  insert_delay_ms: AtomicU64,
}

impl FlakyOrders {
  pub fn fail_next_inserts(&self, count: u32) {
    self.failing_inserts.store(count, Ordering::SeqCst);
  }

  pub fn delay_inserts(&self, delay: Duration) {
    self.insert_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
  }
}

#[async_trait]
impl OrderRepository for FlakyOrders {
  async fn insert(&self, order: Order) -> Result<Order> {
    let delay = self.insert_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
      tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let remaining = self.failing_inserts.load(Ordering::SeqCst);
    if remaining > 0 {
      self.failing_inserts.store(remaining - 1, Ordering::SeqCst);
      return Err(AppError::Store("simulated write failure".to_string()));
    }
    self.inner.insert(order).await
  }

  async fn find(&self, id: Uuid) -> Result<Option<Order>> {
    self.inner.find(id).await
  }

  async fn find_by_refund_id(&self, refund_id: &str) -> Result<Option<Order>> {
    self.inner.find_by_refund_id(refund_id).await
  }

  async fn find_by_gateway_payment_id(&self, payment_id: &str) -> Result<Option<Order>> {
    self.inner.find_by_gateway_payment_id(payment_id).await
  }

  async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
    self.inner.list_for_user(user_id).await
  }

  async fn list_for_agent(&self, agent_id: Uuid) -> Result<Vec<Order>> {
    self.inner.list_for_agent(agent_id).await
  }

  async fn list_all(&self) -> Result<Vec<Order>> {
    self.inner.list_all().await
  }

  async fn update(&self, id: Uuid, mutation: OrderMutation) -> Result<Order> {
    self.inner.update(id, mutation).await
  }
}

pub struct TestContext {
  pub state: AppState,
  pub gateway: Arc<MockGateway>,
  pub orders: Arc<FlakyOrders>,
  pub tokens: Arc<InMemoryTokenStore>,
  pub credentials: Arc<InMemoryCredentialStore>,
}

impl TestContext {
  pub fn new() -> Self {
    Self::with_config(AppConfig::default())
  }

  pub fn with_config(config: AppConfig) -> Self {
    setup_tracing();
    let gateway = Arc::new(MockGateway::new());
    let orders = Arc::new(FlakyOrders::default());
    let tokens = Arc::new(InMemoryTokenStore::new());
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let stores = Stores {
      orders: orders.clone(),
      credentials: credentials.clone(),
      token_store: tokens.clone(),
    };
    let config = Arc::new(config);
    let state = AppState::assemble(config, stores, gateway.clone(), Arc::new(LogMailer::new("test@platter.local")));
    Self {
      state,
      gateway,
      orders,
      tokens,
      credentials,
    }
  }

  /// Creates an account directly in the store and returns it with a session token.
  pub async fn account(&self, role: Role, email: &str) -> (Credential, String) {
    let credential = self
      .credentials
      .create(NewAccount {
        role,
        name: format!("{} account", role.as_str()),
        email: email.to_string(),
        password_hash: hash_password("s3cret-pass").unwrap(),
      })
      .await
      .unwrap();
    let config = &self.state.config;
    let token = issue_session_token(&config.session_secret, config.session_ttl, &credential).unwrap();
    (credential, token)
  }

  pub fn payment_signature(&self, gateway_order_id: &str, payment_id: &str) -> String {
    payment_signature(&self.state.config.razorpay_key_secret, gateway_order_id, payment_id).unwrap()
  }

  pub fn webhook_signature(&self, body: &[u8]) -> String {
    webhook_signature(&self.state.config.razorpay_webhook_secret, body).unwrap()
  }
}

pub fn bearer(token: &str) -> (&'static str, String) {
  ("Authorization", format!("Bearer {}", token))
}

/// A valid order payload totalling 500.
pub fn order_payload() -> Value {
  json!({
    "items": [
      { "productId": "paneer-tikka", "name": "Paneer Tikka", "quantity": 2, "unitPrice": 200 },
      { "productId": "lassi", "name": "Sweet Lassi", "quantity": 1, "unitPrice": 100 }
    ],
    "totalAmount": 500,
    "deliveryAddress": "21 MG Road, Bengaluru",
    "customer": { "name": "Asha", "phone": "9876543210" }
  })
}

pub fn verify_payload(gateway_order_id: &str, payment_id: &str, signature: &str, token: &str) -> Value {
  json!({
    "razorpayOrderId": gateway_order_id,
    "razorpayPaymentId": payment_id,
    "razorpaySignature": signature,
    "paymentToken": token,
  })
}

/// Builds the actix app over `state`.
macro_rules! test_app {
  ($state:expr) => {
    actix_web::test::init_service(
      actix_web::App::new()
        .app_data(actix_web::web::Data::new($state.clone()))
        .configure(platter_api::web::configure_app_routes),
    )
    .await
  };
}
