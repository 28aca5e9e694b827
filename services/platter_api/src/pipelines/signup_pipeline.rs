// services/platter_api/src/pipelines/signup_pipeline.rs

use crate::errors::AppError;
use crate::models::{NewAccount, Role};
use crate::pipelines::contexts::SignupCtx;
use crate::services::{auth_service, email};
use platter_flow::{Ctx, Flow, FlowRegistry, Step, StepControl};
use tracing::{event, info, warn, Level};

/// Customer sign-up. Staff accounts are provisioned out of band.
pub fn register_signup_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<SignupCtx, AppError>::new(vec![
    Step::required("validate_signup_input"),
    Step::required("hash_password"),
    Step::required("create_account"),
    Step::optional("send_welcome_email"),
  ]);

  flow.on("validate_signup_input", |ctx: Ctx<SignupCtx>| {
    Box::pin(async move {
      let (name, email, password_len) = {
        let guard = ctx.read();
        (guard.name.trim().to_string(), guard.email.trim().to_string(), guard.password.len())
      };
      event!(Level::DEBUG, %email, "Validating signup input.");
      if name.is_empty() {
        return Err(AppError::Validation("Name is required.".to_string()));
      }
      if email.is_empty() || !email.contains('@') {
        warn!("Invalid email format provided for signup.");
        return Err(AppError::Validation("Valid email is required.".to_string()));
      }
      if password_len < 8 {
        return Err(AppError::Validation(
          "Password must be at least 8 characters long.".to_string(),
        ));
      }
      let mut guard = ctx.write();
      guard.name = name;
      guard.email = email;
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("hash_password", |ctx: Ctx<SignupCtx>| {
    Box::pin(async move {
      let password = ctx.read().password.clone();
      // Argon2 is CPU bound.
      let hash = tokio::task::spawn_blocking(move || auth_service::hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))??;
      ctx.write().password_hash = Some(hash);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("create_account", |ctx: Ctx<SignupCtx>| {
    Box::pin(async move {
      let (credentials, account) = {
        let guard = ctx.read();
        let password_hash = guard
          .password_hash
          .clone()
          .ok_or_else(|| AppError::Internal("password hash missing".to_string()))?;
        (
          guard.state.credentials.clone(),
          NewAccount {
            role: Role::User,
            name: guard.name.clone(),
            email: guard.email.clone(),
            password_hash,
          },
        )
      };
      let created = credentials.create(account).await?;
      info!(account_id = %created.account_id, email = %created.email, "User account created");
      ctx.write().account = Some(created);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  flow.on("send_welcome_email", |ctx: Ctx<SignupCtx>| {
    Box::pin(async move {
      let guard = ctx.read();
      match guard.account.as_ref() {
        Some(account) => email::send_detached(guard.state.mailer.clone(), email::welcome(&account.email, &account.name)),
        None => warn!("Cannot send welcome email, account missing from signup context."),
      }
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  registry.register(flow);
  info!("Sign-up flow registered.");
}
