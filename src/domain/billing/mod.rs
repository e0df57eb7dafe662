//! Billing domain - customer records, subscription and trial state.

mod customer;
mod errors;
mod subscription;

pub use customer::CustomerRecord;
pub use errors::{BillingError, WEBHOOK_VERIFICATION_FAILED};
pub use subscription::{is_provider_id, ActiveSubscription, FreeTrial, SubscriptionStatus};
