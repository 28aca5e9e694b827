// services/platter_api/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which payment gateway backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
  Razorpay,
  Mock,
}

impl FromStr for GatewayKind {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "razorpay" => Ok(GatewayKind::Razorpay),
      "mock" => Ok(GatewayKind::Mock),
      other => Err(AppError::Config(format!("Unknown PAYMENT_GATEWAY '{}'", other))),
    }
  }
}

/// Process configuration, built once at startup and shared as `Arc<AppConfig>`.
#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  /// In-memory stores are used when absent.
  pub database_url: Option<String>,

  pub gateway: GatewayKind,
  pub razorpay_key_id: String,
  /// Signs `order_id|payment_id` payment signatures.
  pub razorpay_key_secret: String,
  /// Signs raw webhook bodies.
  pub razorpay_webhook_secret: String,
  pub razorpay_api_base: String,
  pub payment_currency: String,

  pub payment_token_secret: String,
  pub payment_token_ttl: Duration,
  pub token_store_ttl: Duration,
  pub max_verify_attempts: u32,

  pub session_secret: String,
  pub session_ttl: Duration,

  pub email_sender: String,
  pub seed_db: bool,
  /// Password for the seeded admin and delivery agent; required with `seed_db`.
  pub seed_password: Option<String>,
}

impl Default for AppConfig {
  /// Local development values. Never use these secrets outside a dev box.
  fn default() -> Self {
    Self {
      server_host: "127.0.0.1".to_string(),
      server_port: 8080,
      database_url: None,
      gateway: GatewayKind::Mock,
      razorpay_key_id: "rzp_test_local".to_string(),
      razorpay_key_secret: "local_key_secret".to_string(),
      razorpay_webhook_secret: "local_webhook_secret".to_string(),
      razorpay_api_base: "https://api.razorpay.com".to_string(),
      payment_currency: "INR".to_string(),
      payment_token_secret: "local_payment_token_secret".to_string(),
      payment_token_ttl: Duration::from_secs(300),
      token_store_ttl: Duration::from_secs(300),
      max_verify_attempts: 3,
      session_secret: "local_session_secret".to_string(),
      session_ttl: Duration::from_secs(12 * 60 * 60),
      email_sender: "orders@platter.local".to_string(),
      seed_db: false,
      seed_password: None,
    }
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();
    let defaults = AppConfig::default();

    let get_env = |var_name: &str| {
      env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
    };
    let get_or = |var_name: &str, fallback: &str| get_env(var_name).unwrap_or_else(|_| fallback.to_string());
    let get_secs = |var_name: &str, fallback: Duration| -> Result<Duration> {
      match env::var(var_name) {
        Ok(raw) => raw
          .parse::<u64>()
          .map(Duration::from_secs)
          .map_err(|e| AppError::Config(format!("Invalid {}: {}", var_name, e))),
        Err(_) => Ok(fallback),
      }
    };

    let server_host = get_or("SERVER_HOST", &defaults.server_host);
    let server_port = get_or("SERVER_PORT", "8080")
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;
    let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty());

    let gateway = get_or("PAYMENT_GATEWAY", "razorpay").parse::<GatewayKind>()?;
    // The mock gateway still signs payments, so its secrets fall back to dev values.
    let (razorpay_key_id, razorpay_key_secret, razorpay_webhook_secret) = match gateway {
      GatewayKind::Razorpay => (
        get_env("RAZORPAY_KEY_ID")?,
        get_env("RAZORPAY_KEY_SECRET")?,
        get_env("RAZORPAY_WEBHOOK_SECRET")?,
      ),
      GatewayKind::Mock => (
        get_or("RAZORPAY_KEY_ID", &defaults.razorpay_key_id),
        get_or("RAZORPAY_KEY_SECRET", &defaults.razorpay_key_secret),
        get_or("RAZORPAY_WEBHOOK_SECRET", &defaults.razorpay_webhook_secret),
      ),
    };

    let max_verify_attempts = get_or("MAX_VERIFY_ATTEMPTS", "3")
      .parse::<u32>()
      .map_err(|e| AppError::Config(format!("Invalid MAX_VERIFY_ATTEMPTS: {}", e)))?;
    let seed_db = get_or("SEED_DB", "false")
      .parse::<bool>()
      .map_err(|e| AppError::Config(format!("Invalid SEED_DB value: {}", e)))?;

    let config = Self {
      server_host,
      server_port,
      database_url,
      gateway,
      razorpay_key_id,
      razorpay_key_secret,
      razorpay_webhook_secret,
      razorpay_api_base: get_or("RAZORPAY_API_BASE", &defaults.razorpay_api_base),
      payment_currency: get_or("PAYMENT_CURRENCY", &defaults.payment_currency),
      payment_token_secret: get_env("PAYMENT_TOKEN_SECRET")?,
      payment_token_ttl: get_secs("PAYMENT_TOKEN_TTL_SECS", defaults.payment_token_ttl)?,
      token_store_ttl: get_secs("TOKEN_STORE_TTL_SECS", defaults.token_store_ttl)?,
      max_verify_attempts,
      session_secret: get_env("SESSION_SECRET")?,
      session_ttl: get_secs("SESSION_TTL_SECS", defaults.session_ttl)?,
      email_sender: get_or("EMAIL_SENDER", &defaults.email_sender),
      seed_db,
      seed_password: env::var("SEED_PASSWORD").ok().filter(|pw| !pw.is_empty()),
    };

    if config.seed_db && config.seed_password.is_none() {
      return Err(AppError::Config("SEED_DB requires SEED_PASSWORD".to_string()));
    }

    if config.payment_token_secret == config.session_secret {
      return Err(AppError::Config(
        "PAYMENT_TOKEN_SECRET and SESSION_SECRET must differ".to_string(),
      ));
    }

    tracing::info!(
      gateway = ?config.gateway,
      persistent = config.database_url.is_some(),
      "Application configuration loaded successfully."
    );
    Ok(config)
  }

  pub fn server_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }
}
