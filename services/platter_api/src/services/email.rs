// services/platter_api/src/services/email.rs

//! Transactional email. Sends are fire-and-forget and never retried.

use crate::errors::{AppError, Result};
use crate::models::Order;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
  pub to: String,
  pub subject: String,
  pub html_body: String,
}

#[derive(Debug, Clone)]
pub struct SentEmail {
  pub message_id: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
  async fn send(&self, message: EmailMessage) -> Result<SentEmail>;
}

/// Logs messages instead of delivering them.
pub struct LogMailer {
  sender: String,
  latency: Duration,
}

impl LogMailer {
  pub fn new(sender: impl Into<String>) -> Self {
    Self {
      sender: sender.into(),
      latency: Duration::from_millis(20),
    }
  }
}

#[async_trait]
impl Mailer for LogMailer {
  async fn send(&self, message: EmailMessage) -> Result<SentEmail> {
    if message.to.trim().is_empty() {
      return Err(AppError::Validation("Email recipient is empty".to_string()));
    }
    tokio::time::sleep(self.latency).await;
    let message_id = format!("log_email_{}", uuid::Uuid::new_v4());
    info!(to = %message.to, from = %self.sender, subject = %message.subject, %message_id, "email sent (logged)");
    Ok(SentEmail { message_id })
  }
}

pub fn order_confirmation(to: &str, recipient_name: &str, order: &Order) -> EmailMessage {
  let otp_line = order
    .delivery_otp
    .as_deref()
    .map(|otp| format!("<p>Share code <b>{}</b> with your delivery partner at handoff.</p>", otp))
    .unwrap_or_default();
  EmailMessage {
    to: to.to_string(),
    subject: format!("Your Platter order #{} is confirmed", order.id),
    html_body: format!(
      "<p>Hi {},</p><p>We received your order for Rs. {} ({} payment).</p>{}",
      recipient_name, order.total_amount, order.payment_method, otp_line
    ),
  }
}

pub fn welcome(to: &str, recipient_name: &str) -> EmailMessage {
  EmailMessage {
    to: to.to_string(),
    subject: format!("Welcome to Platter, {}!", recipient_name),
    html_body: format!("<p>Hi {},</p><p>Your account is ready. Hungry yet?</p>", recipient_name),
  }
}

/// Sends on a background task; failures are logged and dropped.
pub fn send_detached(mailer: Arc<dyn Mailer>, message: EmailMessage) {
  tokio::spawn(async move {
    let to = message.to.clone();
    if let Err(e) = mailer.send(message).await {
      warn!(%to, error = %e, "email send failed, not retrying");
    }
  });
}
