//! Subscription Billing - Stripe-backed billing endpoints
//!
//! This crate exposes HTTP endpoints that delegate customer, checkout,
//! portal and subscription operations to Stripe, keep a local record of each
//! user's Stripe customer and subscription state, and react to signed
//! invoice webhooks.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
