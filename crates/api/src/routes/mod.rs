//! HTTP route handlers.

pub mod cart;
pub mod checkout;
pub mod ops;
pub mod orders;
pub mod webhook;
