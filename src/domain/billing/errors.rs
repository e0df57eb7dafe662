//! Billing error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | CustomerNotFound | 400 |
//! | CheckoutSessionNotFound | 400 |
//! | SubscriptionNotFound | 400 |
//! | TrialCancelFailed | 400 |
//! | InvalidWebhookSignature | 400 |
//! | ValidationFailed | 400 |
//! | Provider | 500 |
//! | Infrastructure | 500 |

use thiserror::Error;

use crate::domain::foundation::DomainError;

/// Fixed message returned when a webhook fails verification.
pub const WEBHOOK_VERIFICATION_FAILED: &str = "Webhook signature verification failed.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingError {
    /// The user has no billing-provider customer.
    #[error("customer not found")]
    CustomerNotFound,

    /// The requested checkout session does not exist at the provider.
    #[error("checkout session not found")]
    CheckoutSessionNotFound(String),

    /// No subscription with this id belongs to the caller.
    #[error("subscription not found")]
    SubscriptionNotFound(String),

    /// The trial is not open or there is no subscription to cancel.
    #[error("trial canceling failed")]
    TrialCancelFailed,

    #[error("{}", WEBHOOK_VERIFICATION_FAILED)]
    InvalidWebhookSignature,

    #[error("{field}: {message}")]
    ValidationFailed { field: String, message: String },

    /// The billing provider call failed.
    #[error("billing provider error: {0}")]
    Provider(String),

    /// Storage or other internal failure.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl BillingError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        BillingError::Provider(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        BillingError::Infrastructure(message.into())
    }

    /// Precondition failures the caller can act on (rendered as 400).
    pub fn is_precondition_failure(&self) -> bool {
        !matches!(
            self,
            BillingError::Provider(_) | BillingError::Infrastructure(_)
        )
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        BillingError::Infrastructure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    #[test]
    fn messages_match_wire_contract() {
        assert_eq!(BillingError::CustomerNotFound.to_string(), "customer not found");
        assert_eq!(BillingError::TrialCancelFailed.to_string(), "trial canceling failed");
        assert_eq!(
            BillingError::SubscriptionNotFound("sub_1".to_string()).to_string(),
            "subscription not found"
        );
        assert_eq!(
            BillingError::InvalidWebhookSignature.to_string(),
            "Webhook signature verification failed."
        );
    }

    #[test]
    fn provider_and_infrastructure_are_not_preconditions() {
        assert!(BillingError::CustomerNotFound.is_precondition_failure());
        assert!(BillingError::validation("priceId", "required").is_precondition_failure());
        assert!(!BillingError::provider("boom").is_precondition_failure());
        assert!(!BillingError::infrastructure("db").is_precondition_failure());
    }

    #[test]
    fn domain_error_becomes_infrastructure() {
        let err: BillingError = DomainError::new(ErrorCode::DatabaseError, "down").into();
        assert!(matches!(err, BillingError::Infrastructure(ref m) if m.contains("down")));
    }
}
