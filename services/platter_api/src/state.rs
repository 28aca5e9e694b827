// services/platter_api/src/state.rs

use crate::config::{AppConfig, GatewayKind};
use crate::db::{
  CredentialStore, InMemoryCredentialStore, InMemoryOrderRepository, InMemoryTokenStore, OrderRepository,
  PgCredentialStore, PgOrderRepository, TokenStore,
};
use crate::errors::{AppError, Result};
use crate::pipelines;
use crate::services::email::{LogMailer, Mailer};
use crate::services::events::OrderEventHub;
use crate::services::gateway::PaymentGateway;
use crate::services::gateway_mock::MockGateway;
use crate::services::payment_token::PaymentTokenIssuer;
use crate::services::razorpay::RazorpayGateway;
use crate::services::refunds::RefundService;
use platter_flow::FlowRegistry;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;

/// Shared handles cloned into every request and every flow context.
#[derive(Clone)]
pub struct AppState {
  pub config: Arc<AppConfig>,
  pub flows: Arc<FlowRegistry<AppError>>,
  pub orders: Arc<dyn OrderRepository>,
  pub credentials: Arc<dyn CredentialStore>,
  pub token_store: Arc<dyn TokenStore>,
  pub gateway: Arc<dyn PaymentGateway>,
  pub payment_tokens: Arc<PaymentTokenIssuer>,
  pub refunds: Arc<RefundService>,
  pub events: OrderEventHub,
  pub mailer: Arc<dyn Mailer>,
}

/// Storage backends chosen at startup.
pub struct Stores {
  pub orders: Arc<dyn OrderRepository>,
  pub credentials: Arc<dyn CredentialStore>,
  pub token_store: Arc<dyn TokenStore>,
}

impl Stores {
  pub fn in_memory() -> Self {
    Self {
      orders: Arc::new(InMemoryOrderRepository::new()),
      credentials: Arc::new(InMemoryCredentialStore::new()),
      token_store: Arc::new(InMemoryTokenStore::new()),
    }
  }
}

impl AppState {
  /// Wires services together and registers every flow.
  pub fn assemble(
    config: Arc<AppConfig>,
    stores: Stores,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
  ) -> Self {
    let events = OrderEventHub::default();
    let refunds = Arc::new(RefundService::new(gateway.clone(), stores.orders.clone(), events.clone()));
    let payment_tokens = Arc::new(PaymentTokenIssuer::new(&config.payment_token_secret, config.payment_token_ttl));
    let flows = Arc::new(FlowRegistry::<AppError>::new());
    pipelines::register_all_flows(&flows);

    Self {
      config,
      flows,
      orders: stores.orders,
      credentials: stores.credentials,
      token_store: stores.token_store,
      gateway,
      payment_tokens,
      refunds,
      events,
      mailer,
    }
  }

  /// Builds state from configuration: Postgres when `DATABASE_URL` is set,
  /// in-memory stores otherwise. The token store is supplied by the caller so
  /// it can also run the expiry sweep.
  pub async fn from_config(config: Arc<AppConfig>, token_store: Arc<InMemoryTokenStore>) -> Result<Self> {
    let stores = match &config.database_url {
      Some(url) => {
        let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
        info!("Connected to the database.");
        sqlx::migrate!("./migrations")
          .run(&pool)
          .await
          .map_err(|e| AppError::Config(format!("migration failed: {}", e)))?;
        info!("Database migrations applied.");
        Stores {
          orders: Arc::new(PgOrderRepository::new(pool.clone())),
          credentials: Arc::new(PgCredentialStore::new(pool)),
          token_store,
        }
      }
      None => {
        info!("DATABASE_URL not set, using in-memory stores.");
        Stores {
          token_store,
          ..Stores::in_memory()
        }
      }
    };

    let gateway: Arc<dyn PaymentGateway> = match config.gateway {
      GatewayKind::Razorpay => Arc::new(RazorpayGateway::new(&config)?),
      GatewayKind::Mock => Arc::new(MockGateway::new()),
    };
    info!(gateway = gateway.name(), "Payment gateway selected.");
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer::new(config.email_sender.clone()));

    Ok(Self::assemble(config, stores, gateway, mailer))
  }
}
