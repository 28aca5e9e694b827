// services/platter_api/src/services/mod.rs

pub mod auth_service;
pub mod email;
pub mod events;
pub mod gateway;
pub mod gateway_mock;
pub mod order_machine;
pub mod otp;
pub mod payment_token;
pub mod razorpay;
pub mod refunds;
pub mod signature;
