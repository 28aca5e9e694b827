// services/platter_api/src/lib.rs

//! Platter API: checkout, payment verification with auto-refund, refund
//! webhooks and the order lifecycle, served over actix-web.

pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod seed;
pub mod services;
pub mod state;
pub mod web;
