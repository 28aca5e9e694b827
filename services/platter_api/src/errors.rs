// services/platter_api/src/errors.rs

use crate::models::RefundTransitionError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use platter_flow::FlowError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  /// Forged or mismatched signatures and tokens.
  #[error("Integrity Error: {0}")]
  Integrity(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  /// Payment captured after its token lapsed; the payment was refunded.
  #[error("Payment token expired, refunded")]
  PaymentTokenExpired,

  /// The token store no longer knows the token; the captured payment was refunded.
  #[error("Token expired, refunded")]
  TokenStaleRefunded,

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Too many verification attempts, refunded")]
  TooManyAttempts,

  #[error("Payment init failed: {0}")]
  PaymentInit(String),

  #[error("Payment Gateway Error: {0}")]
  Gateway(String),

  #[error("Store Error: {0}")]
  Store(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

impl From<RefundTransitionError> for AppError {
  fn from(err: RefundTransitionError) -> Self {
    AppError::Internal(err.to_string())
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) | AppError::Integrity(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) | AppError::PaymentTokenExpired | AppError::TokenStaleRefunded => StatusCode::UNAUTHORIZED,
      AppError::Forbidden(_) => StatusCode::FORBIDDEN,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Conflict(_) => StatusCode::CONFLICT,
      AppError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
      AppError::PaymentInit(_)
      | AppError::Gateway(_)
      | AppError::Store(_)
      | AppError::Config(_)
      | AppError::Sqlx(_)
      | AppError::Workflow { .. }
      | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Responding with error");
    }
    // Client errors carry their message; server errors stay generic.
    let message = match self {
      AppError::Validation(m)
      | AppError::Integrity(m)
      | AppError::Auth(m)
      | AppError::Forbidden(m)
      | AppError::NotFound(m)
      | AppError::Conflict(m) => m.clone(),
      AppError::PaymentTokenExpired => "Payment token expired, refunded".to_string(),
      AppError::TokenStaleRefunded => "Token expired, refunded".to_string(),
      AppError::TooManyAttempts => "Too many verification attempts, refunded".to_string(),
      AppError::PaymentInit(_) => "Payment init failed".to_string(),
      AppError::Gateway(_) => "Payment provider error".to_string(),
      AppError::Store(_) | AppError::Sqlx(_) => "Storage operation failed".to_string(),
      AppError::Config(_) => "Configuration issue".to_string(),
      AppError::Workflow { .. } | AppError::Internal(_) => "An internal error occurred".to_string(),
    };
    HttpResponse::build(status).json(json!({ "error": message }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn maps_taxonomy_to_status_codes() {
    assert_eq!(AppError::Integrity("sig".into()).status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::TokenStaleRefunded.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::PaymentTokenExpired.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
    assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
    assert_eq!(AppError::TooManyAttempts.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(AppError::PaymentInit("gw down".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn flow_errors_become_workflow_errors() {
    let err: AppError = FlowError::Internal("boom".into()).into();
    assert!(matches!(err, AppError::Workflow { .. }));
  }
}
