// services/platter_api/src/models/mod.rs

//! Persisted entities and the value types embedded in them.

pub mod account;
pub mod order;

pub use account::{Credential, NewAccount, Role};
pub use order::{
  CustomerContact, GatewayRefs, Order, OrderDraft, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, RefundRecord,
  RefundStatus, RefundTransitionError,
};
