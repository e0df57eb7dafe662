//! Port for application-side reactions to verified invoice webhooks.

use async_trait::async_trait;

use crate::domain::billing::BillingError;

use super::InvoiceData;

/// Receives invoice payment outcomes after the webhook has been verified.
///
/// Invoked from a detached task; the provider may redeliver an event, so
/// implementations must tolerate seeing the same invoice twice.
#[async_trait]
pub trait PaymentEventHandler: Send + Sync {
    async fn handle_payment_succeeded(&self, invoice: InvoiceData) -> Result<(), BillingError>;

    async fn handle_payment_failed(&self, invoice: InvoiceData) -> Result<(), BillingError>;
}
