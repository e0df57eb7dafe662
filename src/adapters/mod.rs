//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the billing application to external systems:
//! - `stripe` - Stripe REST API and webhook verification, plus a mock
//! - `memory` - In-memory customer repository
//! - `http` - axum routes, handlers and middleware

pub mod http;
pub mod memory;
pub mod stripe;

pub use memory::InMemoryCustomerRepository;
pub use stripe::{MockPaymentProvider, StripeConfig, StripePaymentAdapter};
