// services/platter_api/src/pipelines/signin_pipeline.rs

use crate::errors::AppError;
use crate::pipelines::contexts::SigninCtx;
use crate::services::auth_service;
use platter_flow::{Ctx, Flow, FlowRegistry, Step, StepControl};
use tracing::{event, info, warn, Level};

const INVALID_CREDENTIALS: &str = "Invalid email or password.";

/// Unified sign-in for customers, delivery agents and admins.
pub fn register_signin_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<SigninCtx, AppError>::new(vec![
    Step::required("validate_signin_input"),
    Step::required("lookup_credential"),
    Step::required("verify_password"),
    Step::required("issue_session_token"),
  ]);

  flow.on("validate_signin_input", |ctx: Ctx<SigninCtx>| {
    Box::pin(async move {
      let guard = ctx.read();
      event!(Level::DEBUG, email = %guard.email, "Validating sign-in input.");
      if guard.email.trim().is_empty() || !guard.email.contains('@') {
        return Err(AppError::Validation("Valid email is required.".to_string()));
      }
      if guard.password.is_empty() {
        return Err(AppError::Validation("Password is required.".to_string()));
      }
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("lookup_credential", |ctx: Ctx<SigninCtx>| {
    Box::pin(async move {
      let (credentials, email) = {
        let guard = ctx.read();
        (guard.state.credentials.clone(), guard.email.trim().to_string())
      };
      // One lookup across all account kinds; priority is the store's job.
      let Some(credential) = credentials.lookup(&email).await? else {
        warn!(%email, "Sign-in for unknown email.");
        return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
      };
      event!(Level::DEBUG, account_id = %credential.account_id, role = credential.role.as_str(), "Credential resolved.");
      ctx.write().credential = Some(credential);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("verify_password", |ctx: Ctx<SigninCtx>| {
    Box::pin(async move {
      let (stored_hash, password) = {
        let guard = ctx.read();
        let credential = guard
          .credential
          .as_ref()
          .ok_or_else(|| AppError::Internal("credential missing before password check".to_string()))?;
        (credential.password_hash.clone(), guard.password.clone())
      };
      let matches = tokio::task::spawn_blocking(move || auth_service::verify_password(&stored_hash, &password))
        .await
        .map_err(|e| AppError::Internal(format!("verification task failed: {}", e)))??;
      if !matches {
        warn!("Password mismatch on sign-in.");
        return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
      }
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("issue_session_token", |ctx: Ctx<SigninCtx>| {
    Box::pin(async move {
      let (token, role, account_id) = {
        let guard = ctx.read();
        let credential = guard
          .credential
          .as_ref()
          .ok_or_else(|| AppError::Internal("credential missing before token issue".to_string()))?;
        let config = &guard.state.config;
        (
          auth_service::issue_session_token(&config.session_secret, config.session_ttl, credential)?,
          credential.role,
          credential.account_id,
        )
      };
      info!(%account_id, role = role.as_str(), "Session issued.");
      let mut guard = ctx.write();
      guard.session_token = Some(token);
      guard.role = Some(role);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  registry.register(flow);
  info!("Sign-in flow registered.");
}
