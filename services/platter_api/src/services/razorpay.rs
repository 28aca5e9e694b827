// services/platter_api/src/services/razorpay.rs

use crate::config::AppConfig;
use crate::services::gateway::{GatewayError, GatewayOrder, GatewayRefund, PaymentGateway, RefundCall};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Razorpay REST client (`/v1/orders`, `/v1/payments/{id}/refund`).
#[derive(Clone)]
pub struct RazorpayGateway {
  http: Client,
  api_base: String,
  key_id: String,
  key_secret: String,
}

impl RazorpayGateway {
  pub fn new(config: &AppConfig) -> Result<Self, GatewayError> {
    let http = Client::builder()
      .use_rustls_tls()
      .timeout(Duration::from_secs(15))
      .build()
      .map_err(|e| GatewayError::Transport(e.to_string()))?;
    Ok(Self {
      http,
      api_base: config.razorpay_api_base.trim_end_matches('/').to_string(),
      key_id: config.razorpay_key_id.clone(),
      key_secret: config.razorpay_key_secret.clone(),
    })
  }

  async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, GatewayError> {
    let url = format!("{}{}", self.api_base, path);
    let response = self
      .http
      .post(&url)
      .basic_auth(&self.key_id, Some(&self.key_secret))
      .json(body)
      .send()
      .await
      .map_err(|e| GatewayError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      warn!(%status, path, "razorpay rejected request");
      return Err(GatewayError::Rejected {
        status: status.as_u16(),
        body,
      });
    }
    response.json::<R>().await.map_err(|e| GatewayError::Decode(e.to_string()))
  }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
  fn name(&self) -> &'static str {
    "razorpay"
  }

  #[instrument(name = "razorpay::create_order", skip(self), err(Display))]
  async fn create_order(&self, amount_minor: u64, currency: &str, receipt: &str) -> Result<GatewayOrder, GatewayError> {
    let order: GatewayOrder = self
      .post(
        "/v1/orders",
        &json!({ "amount": amount_minor, "currency": currency, "receipt": receipt }),
      )
      .await?;
    debug!(gateway_order_id = %order.id, "razorpay order created");
    Ok(order)
  }

  #[instrument(name = "razorpay::refund", skip(self, call), fields(payment_id = %call.payment_id, amount_minor = call.amount_minor), err(Display))]
  async fn refund(&self, call: RefundCall) -> Result<GatewayRefund, GatewayError> {
    let path = format!("/v1/payments/{}/refund", call.payment_id);
    self
      .post(
        &path,
        &json!({ "amount": call.amount_minor, "speed": call.speed, "notes": call.notes }),
      )
      .await
  }
}
