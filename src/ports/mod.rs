//! Ports - interfaces between the billing application and the outside world.
//!
//! - `PaymentProvider` - billing provider API (Stripe)
//! - `CustomerRepository` - customer record storage
//! - `PaymentEventHandler` - reactions to verified invoice webhooks

mod customer_repository;
mod payment_event_handler;
mod payment_provider;

pub use customer_repository::CustomerRepository;
pub use payment_event_handler::PaymentEventHandler;
pub use payment_provider::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, InvoiceData,
    PaymentError, PaymentErrorCode, PaymentProvider, PortalSession, Price, PriceRecurring,
    Product, Subscription, WebhookEvent, WebhookEventData, WebhookEventType,
};
