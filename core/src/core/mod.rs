// src/core/mod.rs

//! Building blocks shared by flows, branches and the registry.

pub mod control;
pub mod ctx;
pub mod handler;
pub mod step;

pub use control::{FlowOutcome, StepControl};
pub use ctx::Ctx;
pub use handler::Hook;
pub use step::Step;
