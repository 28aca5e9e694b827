// services/platter_api/src/pipelines/mod.rs

//! Every multi-step operation of the service, expressed as a flow keyed by its
//! context type.

use crate::errors::AppError;
use platter_flow::FlowRegistry;

pub mod contexts;
pub mod common_steps;

pub mod checkout_pipeline;
pub mod cod_pipeline;
pub mod order_status_pipeline;
pub mod signin_pipeline;
pub mod signup_pipeline;
pub mod verify_pipeline;
pub mod webhook_pipeline;

/// Registers all flows. Called once while assembling `AppState`.
pub fn register_all_flows(registry: &FlowRegistry<AppError>) {
  tracing::info!("Registering flows...");

  signup_pipeline::register_signup_flow(registry);
  signin_pipeline::register_signin_flow(registry);
  checkout_pipeline::register_checkout_flow(registry);
  verify_pipeline::register_verify_flow(registry);
  webhook_pipeline::register_webhook_flow(registry);
  cod_pipeline::register_cod_flow(registry);
  order_status_pipeline::register_order_status_flow(registry);
  order_status_pipeline::register_assign_agent_flow(registry);

  tracing::info!("All application flows registered.");
}
