//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port for Stripe, including:
//! - Customer creation and billing portal sessions
//! - Subscription checkout sessions
//! - Price and subscription listings, cancellation
//! - Webhook signature verification
//!
//! # Security
//!
//! - Webhook signatures use HMAC-SHA256 with constant-time comparison
//! - Timestamps are validated to prevent replay attacks (5-minute window)
//! - All secrets are handled via `secrecy::SecretString`

mod api_types;
mod mock_payment_provider;
mod stripe_adapter;
mod webhook_types;

pub use api_types::{
    StripeCheckoutSession, StripeCustomer, StripeInvoice, StripePrice, StripeSubscription,
};
pub use mock_payment_provider::{MethodCall, MockPaymentProvider};
pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
pub use webhook_types::{hex_encode, SignatureHeader, SignatureParseError, StripeWebhookEvent};
