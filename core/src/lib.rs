// src/lib.rs

//! platter-flow: an async, type-safe step-flow engine.
//!
//! A [`Flow`] is an ordered list of named steps. Each step carries `before`,
//! `on` and `after` hooks that receive a shared [`Ctx`] and return a
//! [`StepControl`]. Flows support:
//!  - optional steps and per-step skip predicates,
//!  - early stopping (`StepControl::Stop`) and error propagation,
//!  - conditional branches that hand an extracted sub-context to a sub-flow,
//!  - a type-keyed [`FlowRegistry`] so callers run a flow by its context type.

pub mod branch;
pub mod core;
pub mod error;
pub mod flow;
pub mod registry;

pub use crate::branch::{BranchBuilder, BranchConfigurator};
pub use crate::core::control::{FlowOutcome, StepControl};
pub use crate::core::ctx::Ctx;
pub use crate::core::handler::Hook;
pub use crate::core::step::{SkipPredicate, Step};
pub use crate::error::{FlowError, FlowResult};
pub use crate::flow::Flow;
pub use crate::registry::FlowRegistry;

/*
    Typical usage:
    1. Define a context struct `CheckoutCtx`.
    2. Build `Flow::<CheckoutCtx, AppError>::new(vec![Step::required("a"), Step::optional("b")])`.
    3. Attach hooks with `.on("a", |ctx| Box::pin(async move { ... }))`.
    4. For routing inside a step: `flow.branch("route").scope(sub_flow, extractor).when(cond)...finish(false)`.
    5. Register the flow in a `FlowRegistry<AppError>` and call `registry.run(Ctx::new(data)).await`.
*/
