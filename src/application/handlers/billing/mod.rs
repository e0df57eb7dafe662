//! Billing handlers.
//!
//! `BillingService` serves the request handlers:
//!
//! - Get-or-create the provider customer
//! - Portal and checkout sessions
//! - Price and subscription listings
//! - Cancellation toggles and trial cancellation
//!
//! Verified invoice webhooks are routed by `dispatch_webhook_event` to the
//! service's `PaymentEventHandler` implementation.

mod billing_service;
mod dispatch_webhook_event;

pub use billing_service::{
    BillingService, BillingSettings, CreateCheckoutCommand, SubscriberSummary,
};
pub use dispatch_webhook_event::{dispatch_webhook_event, DispatchOutcome};
