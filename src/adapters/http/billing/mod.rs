//! HTTP adapter for billing endpoints.
//!
//! Exposes the billing facade via REST API:
//! - `GET /billing/portal` - Customer portal session
//! - `GET /billing/subscriptions/me` - Caller's recorded subscription state
//! - `POST /billing/customer` - Get or create the provider customer
//! - `POST /billing/checkout-sessions` - Start a subscription checkout
//! - `GET /billing/checkout-sessions?sessionId=` - Retrieve a checkout session
//! - `GET /billing/prices?activeProduct=` - Recurring prices
//! - `POST /billing/subscriptions/update` - Toggle cancellation at period end
//! - `GET /billing/subscriptions?status=` - Provider subscriptions
//! - `POST /billing/trial/cancel` - Cancel the open trial
//! - `POST /billing/webhook` - Stripe webhooks

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::ErrorResponse;
pub use handlers::{BillingApiError, BillingAppState, STRIPE_SIGNATURE_HEADER};
pub use routes::{billing_router, billing_routes, webhook_routes};
