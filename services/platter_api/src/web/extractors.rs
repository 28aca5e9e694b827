// services/platter_api/src/web/extractors.rs

use crate::errors::AppError;
use crate::models::Role;
use crate::services::auth_service::decode_session_token;
use crate::services::order_machine::{Actor, ActorRole};
use crate::state::AppState;
use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::warn;
use uuid::Uuid;

/// Caller identity decoded from `Authorization: Bearer <session token>`.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
  pub account_id: Uuid,
  pub role: Role,
}

impl AuthenticatedUser {
  pub fn actor(&self) -> Actor {
    Actor::new(ActorRole::from(self.role), self.account_id)
  }

  pub fn require_role(&self, role: Role) -> Result<(), AppError> {
    if self.role == role {
      Ok(())
    } else {
      Err(AppError::Forbidden(format!("{} access required", role.as_str())))
    }
  }
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
  let state = req
    .app_data::<web::Data<AppState>>()
    .ok_or_else(|| AppError::Internal("application state not configured".to_string()))?;
  let token = req
    .headers()
    .get(header::AUTHORIZATION)
    .and_then(|value| value.to_str().ok())
    .and_then(|value| value.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|token| !token.is_empty())
    .ok_or_else(|| AppError::Auth("Authentication required.".to_string()))?;
  let claims = decode_session_token(&state.config.session_secret, token)?;
  Ok(AuthenticatedUser {
    account_id: claims.sub,
    role: claims.role,
  })
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let result = authenticate(req);
    if let Err(e) = &result {
      warn!(path = %req.path(), error = %e, "AuthenticatedUser extractor rejected request");
    }
    ready(result)
  }
}
