//! Application layer - the billing facade and webhook dispatch.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;

pub use handlers::{
    dispatch_webhook_event, BillingService, BillingSettings, CreateCheckoutCommand,
    DispatchOutcome, SubscriberSummary,
};
