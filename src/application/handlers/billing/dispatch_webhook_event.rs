//! Routes a verified webhook event to the payment event handler.
//!
//! The provider only needs an acknowledgement, so the handler runs on a
//! detached task and its failures are logged rather than returned.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::ports::{InvoiceData, PaymentEventHandler, WebhookEvent, WebhookEventData, WebhookEventType};

/// What happened to a verified event.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// A handler was spawned for the event.
    Dispatched(JoinHandle<()>),

    /// The event type is not acted upon.
    Ignored,
}

impl DispatchOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, DispatchOutcome::Dispatched(_))
    }

    /// Waits for the spawned handler, if any.
    pub async fn join(self) {
        if let DispatchOutcome::Dispatched(handle) = self {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Webhook handler task panicked");
            }
        }
    }
}

/// Spawns the handler matching the event type.
pub fn dispatch_webhook_event(
    handler: Arc<dyn PaymentEventHandler>,
    event: WebhookEvent,
) -> DispatchOutcome {
    let succeeded = match event.event_type {
        WebhookEventType::InvoicePaymentSucceeded => true,
        WebhookEventType::InvoicePaymentFailed => false,
        WebhookEventType::Other(ref other) => {
            tracing::info!(event_id = %event.id, event_type = %other, "Unhandled webhook event type");
            return DispatchOutcome::Ignored;
        }
    };

    let invoice = match event.data {
        WebhookEventData::Invoice(invoice) => invoice,
        WebhookEventData::Raw { .. } => {
            tracing::warn!(
                event_id = %event.id,
                event_type = event.event_type.as_str(),
                "Invoice event without invoice payload"
            );
            return DispatchOutcome::Ignored;
        }
    };

    let event_id = event.id;
    let handle = tokio::spawn(async move {
        let invoice_id = invoice.invoice_id.clone();
        let result = run(handler.as_ref(), succeeded, invoice).await;

        if let Err(e) = result {
            tracing::error!(
                event_id = %event_id,
                invoice_id = %invoice_id,
                error = %e,
                "Webhook handler failed"
            );
        }
    });

    DispatchOutcome::Dispatched(handle)
}

async fn run(
    handler: &dyn PaymentEventHandler,
    succeeded: bool,
    invoice: InvoiceData,
) -> Result<(), crate::domain::billing::BillingError> {
    if succeeded {
        handler.handle_payment_succeeded(invoice).await
    } else {
        handler.handle_payment_failed(invoice).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::BillingError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        calls: Mutex<Vec<(&'static str, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl PaymentEventHandler for RecordingHandler {
        async fn handle_payment_succeeded(&self, invoice: InvoiceData) -> Result<(), BillingError> {
            self.calls
                .lock()
                .unwrap()
                .push(("succeeded", invoice.invoice_id));
            if self.fail {
                return Err(BillingError::infrastructure("boom"));
            }
            Ok(())
        }

        async fn handle_payment_failed(&self, invoice: InvoiceData) -> Result<(), BillingError> {
            self.calls.lock().unwrap().push(("failed", invoice.invoice_id));
            Ok(())
        }
    }

    fn invoice_event(event_type: &str) -> WebhookEvent {
        WebhookEvent {
            id: "evt_1".to_string(),
            event_type: WebhookEventType::from_provider(event_type),
            data: WebhookEventData::Invoice(InvoiceData {
                invoice_id: "in_1".to_string(),
                customer_id: "cus_1".to_string(),
                subscription_id: Some("sub_1".to_string()),
                amount_paid: 500,
                currency: "usd".to_string(),
                period_end: None,
                billing_reason: None,
            }),
            created_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn succeeded_event_runs_success_handler_once() {
        let handler = Arc::new(RecordingHandler::default());

        let outcome = dispatch_webhook_event(handler.clone(), invoice_event("invoice.payment_succeeded"));
        assert!(outcome.is_dispatched());
        outcome.join().await;

        let calls = handler.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![("succeeded", "in_1".to_string())]);
    }

    #[tokio::test]
    async fn failed_event_runs_failure_handler() {
        let handler = Arc::new(RecordingHandler::default());

        dispatch_webhook_event(handler.clone(), invoice_event("invoice.payment_failed"))
            .join()
            .await;

        let calls = handler.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![("failed", "in_1".to_string())]);
    }

    #[tokio::test]
    async fn other_events_are_ignored() {
        let handler = Arc::new(RecordingHandler::default());

        let outcome = dispatch_webhook_event(handler.clone(), invoice_event("customer.created"));

        assert!(!outcome.is_dispatched());
        assert!(handler.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invoice_type_without_invoice_payload_is_ignored() {
        let handler = Arc::new(RecordingHandler::default());
        let mut event = invoice_event("invoice.payment_succeeded");
        event.data = WebhookEventData::Raw {
            json: "{}".to_string(),
        };

        let outcome = dispatch_webhook_event(handler.clone(), event);

        assert!(!outcome.is_dispatched());
    }

    #[tokio::test]
    async fn handler_failure_does_not_propagate() {
        let handler = Arc::new(RecordingHandler {
            fail: true,
            ..Default::default()
        });

        dispatch_webhook_event(handler.clone(), invoice_event("invoice.payment_succeeded"))
            .join()
            .await;

        assert_eq!(handler.calls.lock().unwrap().len(), 1);
    }
}
