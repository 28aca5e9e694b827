// services/platter_api/src/db/mod.rs

//! Storage seams. Every store is a trait with an in-memory implementation
//! (development, tests) and, where rows are durable, a Postgres one.

pub mod credentials;
pub mod orders;
pub mod token_store;

pub use credentials::{CredentialStore, InMemoryCredentialStore, PgCredentialStore};
pub use orders::{InMemoryOrderRepository, OrderMutation, OrderRepository, PgOrderRepository};
pub use token_store::{InMemoryTokenStore, TokenEntry, TokenKey, TokenStore, Versioned};
