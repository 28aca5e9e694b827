// src/branch/mod.rs

//! Conditional branches: a step that dispatches to one of several sub-flows.
//!
//! Each branch pairs a condition over the root context with a sub-flow and an
//! extractor that derives the sub-flow's own [`Ctx`](crate::Ctx) from the root
//! context. The first branch whose condition holds runs.

pub mod arm;
pub mod builder;

pub use builder::{BranchBuilder, BranchConfigurator};
