//! In-Memory Customer Repository
//!
//! Keeps customer records in a map keyed by record id, with secondary
//! indexes for the user and the provider customer.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::CustomerRecord;
use crate::domain::foundation::{CustomerRecordId, DomainError, ErrorCode, UserId};
use crate::ports::CustomerRepository;

#[derive(Debug, Default)]
struct Records {
    by_id: HashMap<CustomerRecordId, CustomerRecord>,
    by_user: HashMap<UserId, CustomerRecordId>,
    by_stripe_customer: HashMap<String, CustomerRecordId>,
}

/// In-memory storage for customer records
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustomerRepository {
    records: Arc<RwLock<Records>>,
}

impl InMemoryCustomerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn save(&self, record: &CustomerRecord) -> Result<(), DomainError> {
        let mut records = self.records.write().await;

        if records.by_user.contains_key(&record.user_id) {
            return Err(DomainError::new(
                ErrorCode::Conflict,
                "Customer record already exists for user",
            )
            .with_detail("user_id", record.user_id.to_string()));
        }
        if records
            .by_stripe_customer
            .contains_key(&record.customer_stripe_id)
        {
            return Err(DomainError::new(
                ErrorCode::Conflict,
                "Provider customer already linked",
            )
            .with_detail("customer_id", record.customer_stripe_id.clone()));
        }

        records.by_user.insert(record.user_id.clone(), record.id);
        records
            .by_stripe_customer
            .insert(record.customer_stripe_id.clone(), record.id);
        records.by_id.insert(record.id, record.clone());
        Ok(())
    }

    async fn update(&self, record: &CustomerRecord) -> Result<(), DomainError> {
        let mut records = self.records.write().await;

        let existing = records.by_id.get_mut(&record.id).ok_or_else(|| {
            DomainError::new(ErrorCode::NotFound, "Customer record not found")
                .with_detail("id", record.id.to_string())
        })?;

        // User and provider customer are fixed at creation; indexes stay valid.
        if existing.user_id != record.user_id
            || existing.customer_stripe_id != record.customer_stripe_id
        {
            return Err(DomainError::new(
                ErrorCode::Conflict,
                "Customer identity cannot change",
            )
            .with_detail("id", record.id.to_string()));
        }

        *existing = record.clone();
        Ok(())
    }

    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<CustomerRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .by_user
            .get(user_id)
            .and_then(|id| records.by_id.get(id))
            .cloned())
    }

    async fn find_by_stripe_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<CustomerRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .by_stripe_customer
            .get(customer_id)
            .and_then(|id| records.by_id.get(id))
            .cloned())
    }
}
