// services/platter_api/src/pipelines/contexts.rs

//! Context data for every flow. Handlers build one, run it through the
//! registry and read the results back out of the same `Ctx`.

use crate::db::TokenKey;
use crate::models::{Credential, Order, OrderDraft, OrderStatus, Role};
use crate::services::gateway::GatewayOrder;
use crate::services::order_machine::Actor;
use crate::services::payment_token::PaymentClaims;
use crate::state::AppState;
use platter_flow::Ctx;
use serde::Deserialize;
use uuid::Uuid;

// --- Payments ---

#[derive(Clone)]
pub struct CheckoutCtx {
  pub state: AppState,
  pub draft: OrderDraft,
  /// Receipt sent to the gateway; not an order id.
  pub checkout_id: Uuid,
  pub gateway_order: Option<GatewayOrder>,
  pub payment_token: Option<String>,
}

impl CheckoutCtx {
  pub fn new(state: AppState, draft: OrderDraft) -> Self {
    Self {
      state,
      draft,
      checkout_id: Uuid::new_v4(),
      gateway_order: None,
      payment_token: None,
    }
  }
}

/// What the client reports after the gateway captured a payment.
#[derive(Debug, Clone)]
pub struct VerifyInput {
  pub gateway_order_id: String,
  pub gateway_payment_id: String,
  pub gateway_signature: String,
  pub payment_token: String,
}

#[derive(Clone)]
pub struct VerifyCtx {
  pub state: AppState,
  pub input: VerifyInput,
  pub claims: Option<PaymentClaims>,
  pub token_key: Option<TokenKey>,
  /// Token signature is valid but its expiry has passed.
  pub token_expired: bool,
  /// Version of the in-flight entry this request owns.
  pub claim_version: Option<u64>,
  /// Attempts charged to the token once this request claimed it.
  pub attempts_used: u32,
  pub delivery_otp: Option<String>,
  pub order: Option<Order>,
}

impl VerifyCtx {
  pub fn new(state: AppState, input: VerifyInput) -> Self {
    Self {
      state,
      input,
      claims: None,
      token_key: None,
      token_expired: false,
      claim_version: None,
      attempts_used: 0,
      delivery_otp: None,
      order: None,
    }
  }
}

// --- Webhook ---

/// Refund entity as delivered in gateway webhooks. Amounts are minor units.
#[derive(Debug, Clone, Deserialize)]
pub struct RefundEntity {
  pub id: String,
  pub payment_id: String,
  pub amount: u64,
  #[serde(default)]
  pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundEventKind {
  Processed,
  Failed,
}

/// Sub-context for the refund branches of the webhook flow.
#[derive(Clone)]
pub struct RefundEventCtx {
  pub state: AppState,
  pub kind: RefundEventKind,
  pub refund: RefundEntity,
  pub order: Option<Order>,
  pub applied: bool,
}

#[derive(Clone)]
pub struct WebhookCtx {
  pub state: AppState,
  pub raw_body: Vec<u8>,
  pub signature: Option<String>,
  pub event_name: Option<String>,
  /// Set by the parse step for refund events; the route step hands it to a branch.
  pub refund_event: Option<Ctx<RefundEventCtx>>,
}

impl WebhookCtx {
  pub fn new(state: AppState, raw_body: Vec<u8>, signature: Option<String>) -> Self {
    Self {
      state,
      raw_body,
      signature,
      event_name: None,
      refund_event: None,
    }
  }
}

// --- Orders ---

#[derive(Clone)]
pub struct CodOrderCtx {
  pub state: AppState,
  pub draft: OrderDraft,
  pub order: Option<Order>,
}

#[derive(Clone)]
pub struct OrderStatusCtx {
  pub state: AppState,
  pub actor: Actor,
  pub order_id: Uuid,
  pub target: OrderStatus,
  pub otp: Option<String>,
  /// Optional assignment carried on the same request (admins only).
  pub delivery_agent_id: Option<Uuid>,
  pub order: Option<Order>,
}

#[derive(Clone)]
pub struct AssignAgentCtx {
  pub state: AppState,
  pub actor: Actor,
  pub order_id: Uuid,
  pub delivery_agent_id: Uuid,
  pub order: Option<Order>,
}

// --- Accounts ---

#[derive(Clone)]
pub struct SignupCtx {
  pub state: AppState,
  pub name: String,
  pub email: String,
  pub password: String,
  pub password_hash: Option<String>,
  pub account: Option<Credential>,
}

#[derive(Clone)]
pub struct SigninCtx {
  pub state: AppState,
  pub email: String,
  pub password: String,
  pub credential: Option<Credential>,
  pub session_token: Option<String>,
  pub role: Option<Role>,
}
