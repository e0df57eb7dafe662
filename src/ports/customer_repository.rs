//! Customer repository port.
//!
//! Persists the link between an application user and the billing-provider
//! customer, together with the subscription and trial state the webhook
//! handlers maintain.

use async_trait::async_trait;

use crate::domain::billing::CustomerRecord;
use crate::domain::foundation::{DomainError, UserId};

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// `ErrorCode::Conflict` if the user or provider customer already has a record.
    async fn save(&self, record: &CustomerRecord) -> Result<(), DomainError>;

    /// Replace an existing record.
    ///
    /// # Errors
    ///
    /// `ErrorCode::NotFound` if no record with this id exists.
    async fn update(&self, record: &CustomerRecord) -> Result<(), DomainError>;

    async fn find_by_user_id(&self, user_id: &UserId)
        -> Result<Option<CustomerRecord>, DomainError>;

    async fn find_by_stripe_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<CustomerRecord>, DomainError>;
}
