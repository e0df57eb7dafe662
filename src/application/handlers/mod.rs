//! Application handlers.
//!
//! Orchestrate domain operations over the ports.

pub mod billing;

pub use billing::{
    dispatch_webhook_event, BillingService, BillingSettings, CreateCheckoutCommand,
    DispatchOutcome, SubscriberSummary,
};
