// services/platter_api/src/main.rs

use platter_api::config::AppConfig;
use platter_api::db::InMemoryTokenStore;
use platter_api::seed::seed_accounts;
use platter_api::state::AppState;
use platter_api::web::configure_app_routes;

use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

const TOKEN_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_span_events(FmtSpan::CLOSE)
    .init();

  tracing::info!("Starting Platter API server...");

  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
    }
  };

  let token_store = Arc::new(InMemoryTokenStore::new());
  let app_state = match AppState::from_config(app_config.clone(), token_store.clone()).await {
    Ok(state) => state,
    Err(e) => {
      tracing::error!(error = %e, "Failed to initialise application state.");
      return Err(std::io::Error::other(e.to_string()));
    }
  };

  if app_config.seed_db {
    if let Err(e) = seed_accounts(&app_state).await {
      tracing::error!(error = %e, "Failed to seed accounts.");
    }
  }

  // Expired entries already read as absent; the sweep only bounds memory.
  actix_rt::spawn(async move {
    let mut interval = tokio::time::interval(TOKEN_SWEEP_INTERVAL);
    loop {
      interval.tick().await;
      let purged = token_store.purge_expired();
      if purged > 0 {
        tracing::debug!(purged, "Expired payment token entries purged.");
      }
    }
  });

  let server_address = app_config.server_address();
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(web::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
