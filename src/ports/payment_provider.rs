//! Payment provider port for external payment processing.
//!
//! Defines the contract for the billing provider integration (Stripe).
//! Implementations perform the actual provider calls: customers, checkout
//! and portal sessions, prices, subscriptions and webhook verification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::billing::{BillingError, SubscriptionStatus};
use crate::domain::foundation::UserId;

/// Port for payment provider integrations.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a customer in the payment system.
    ///
    /// Returns the provider's customer for future reference.
    async fn create_customer(&self, request: CreateCustomerRequest)
        -> Result<Customer, PaymentError>;

    /// Find the provider customer previously created for `user_id`.
    ///
    /// Used when no local record exists, so a lost record does not lead to
    /// a second customer. Returns the oldest match.
    async fn find_customer_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Customer>, PaymentError>;

    /// Create a billing portal session for subscription management.
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError>;

    /// Create a subscription-mode checkout session.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Get checkout session by provider ID.
    async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CheckoutSession>, PaymentError>;

    /// List prices whose product's `active` flag equals `active_product`.
    async fn list_prices(&self, active_product: bool) -> Result<Vec<Price>, PaymentError>;

    /// Get subscription by provider ID.
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Subscription>, PaymentError>;

    /// Toggle cancellation at period end.
    async fn update_subscription(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<Subscription, PaymentError>;

    /// List a customer's subscriptions, optionally filtered by status.
    async fn list_subscriptions(
        &self,
        customer_id: &str,
        status: Option<SubscriptionStatus>,
    ) -> Result<Vec<Subscription>, PaymentError>;

    /// Cancel a subscription immediately.
    async fn cancel_subscription(&self, subscription_id: &str)
        -> Result<Subscription, PaymentError>;

    /// Verify a webhook signature and parse the event.
    ///
    /// Returns the parsed event if valid, error if signature invalid.
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError>;
}

/// Request to create a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    /// Internal user ID (stored as metadata).
    pub user_id: UserId,

    /// Customer email address.
    pub email: String,

    /// Customer name (optional).
    pub name: Option<String>,
}

/// Customer in the payment system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Provider's customer ID.
    pub id: String,

    pub email: String,

    pub name: Option<String>,

    /// When the customer was created (provider timestamp).
    pub created_at: i64,
}

/// Request to create a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCheckoutRequest {
    /// Provider's customer ID.
    pub customer_id: String,

    /// Price to subscribe to.
    pub price_id: String,

    /// URL to redirect after successful checkout.
    pub success_url: String,

    /// URL to redirect after canceled checkout.
    pub cancel_url: String,

    /// Trial length to attach, when the customer may still trial.
    pub trial_period_days: Option<u32>,
}

/// Checkout session as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    /// Provider's session ID.
    pub id: String,

    /// Hosted checkout URL; absent once the session is complete.
    pub url: Option<String>,

    /// open, complete or expired.
    pub status: Option<String>,

    pub payment_status: Option<String>,

    pub customer_id: Option<String>,

    pub subscription_id: Option<String>,

    /// When the session expires (Unix timestamp).
    pub expires_at: Option<i64>,
}

/// Portal session for subscription management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalSession {
    pub id: String,
    pub url: String,
}

/// A recurring price with its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    pub id: String,
    pub active: bool,
    pub product: Product,
    /// Unit amount in the currency's minor unit.
    pub unit_amount: Option<i64>,
    pub currency: String,
    pub recurring: Option<PriceRecurring>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecurring {
    /// day, week, month or year.
    pub interval: String,
    pub interval_count: i32,
}

/// Subscription in the payment system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Provider's subscription ID.
    pub id: String,

    /// Provider's customer ID.
    pub customer_id: String,

    pub status: SubscriptionStatus,

    /// Current billing period start (Unix timestamp).
    pub current_period_start: i64,

    /// Current billing period end (Unix timestamp).
    pub current_period_end: i64,

    /// Whether subscription cancels at period end.
    pub cancel_at_period_end: bool,

    /// When cancellation was requested (if applicable).
    pub canceled_at: Option<i64>,

    /// End of the trial period (if any).
    pub trial_end: Option<i64>,

    /// Price of the first subscription item.
    pub price_id: Option<String>,
}

/// Webhook event from payment provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID from provider.
    pub id: String,

    pub event_type: WebhookEventType,

    pub data: WebhookEventData,

    /// When the event occurred (Unix timestamp).
    pub created_at: i64,
}

/// Types of webhook events we dispatch on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// `invoice.payment_succeeded`
    InvoicePaymentSucceeded,

    /// `invoice.payment_failed`
    InvoicePaymentFailed,

    /// Any other type; logged and ignored.
    Other(String),
}

impl WebhookEventType {
    /// Maps the provider's type tag.
    pub fn from_provider(event_type: &str) -> Self {
        match event_type {
            "invoice.payment_succeeded" => WebhookEventType::InvoicePaymentSucceeded,
            "invoice.payment_failed" => WebhookEventType::InvoicePaymentFailed,
            other => WebhookEventType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            WebhookEventType::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            WebhookEventType::InvoicePaymentFailed => "invoice.payment_failed",
            WebhookEventType::Other(s) => s,
        }
    }
}

/// Webhook event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WebhookEventData {
    #[serde(rename = "invoice")]
    Invoice(InvoiceData),

    /// Raw/unknown event data.
    #[serde(rename = "raw")]
    Raw { json: String },
}

/// Invoice fields the payment handlers act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceData {
    pub invoice_id: String,
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub amount_paid: i64,
    pub currency: String,
    /// End of the billed period (Unix timestamp).
    pub period_end: Option<i64>,
    /// subscription_create, subscription_cycle, ...
    pub billing_reason: Option<String>,
}

/// Errors from payment provider operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    /// Create a new payment error.
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    /// Create with provider code.
    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    /// Create a not found error.
    pub fn not_found(resource: &str) -> Self {
        Self::new(
            PaymentErrorCode::NotFound,
            format!("{} not found", resource),
        )
    }

    /// Create an invalid webhook error.
    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidWebhook, message)
    }

    /// Create a provider API error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for BillingError {
    fn from(err: PaymentError) -> Self {
        match err.code {
            PaymentErrorCode::InvalidWebhook => BillingError::InvalidWebhookSignature,
            _ => BillingError::provider(err.to_string()),
        }
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// API authentication failed.
    AuthenticationError,

    /// Request rejected by the provider as invalid.
    InvalidRequest,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Invalid webhook signature.
    InvalidWebhook,

    /// Provider API error.
    ProviderError,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError | PaymentErrorCode::RateLimitExceeded
        )
    }

    /// Classify an HTTP status returned by the provider.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 402 => PaymentErrorCode::InvalidRequest,
            401 | 403 => PaymentErrorCode::AuthenticationError,
            404 => PaymentErrorCode::NotFound,
            429 => PaymentErrorCode::RateLimitExceeded,
            _ => PaymentErrorCode::ProviderError,
        }
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::InvalidRequest => "invalid_request",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::InvalidWebhook => "invalid_webhook",
            PaymentErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_provider_is_object_safe() {
        fn _accepts_dyn(_provider: &dyn PaymentProvider) {}
    }

    #[test]
    fn payment_error_retryable() {
        assert!(PaymentErrorCode::NetworkError.is_retryable());
        assert!(PaymentErrorCode::RateLimitExceeded.is_retryable());

        assert!(!PaymentErrorCode::InvalidRequest.is_retryable());
        assert!(!PaymentErrorCode::NotFound.is_retryable());
    }

    #[test]
    fn http_status_classification() {
        assert_eq!(PaymentErrorCode::from_http_status(404), PaymentErrorCode::NotFound);
        assert_eq!(PaymentErrorCode::from_http_status(429), PaymentErrorCode::RateLimitExceeded);
        assert_eq!(PaymentErrorCode::from_http_status(401), PaymentErrorCode::AuthenticationError);
        assert_eq!(PaymentErrorCode::from_http_status(503), PaymentErrorCode::ProviderError);
    }

    #[test]
    fn payment_error_display() {
        let err = PaymentError::provider("No such price");
        assert!(err.to_string().contains("provider_error"));
        assert!(err.to_string().contains("No such price"));
    }

    #[test]
    fn invalid_webhook_converts_to_signature_failure() {
        let err: BillingError = PaymentError::invalid_webhook("bad").into();
        assert_eq!(err, BillingError::InvalidWebhookSignature);

        let err: BillingError = PaymentError::network("timeout").into();
        assert!(matches!(err, BillingError::Provider(_)));
    }

    #[test]
    fn webhook_event_type_mapping() {
        assert_eq!(
            WebhookEventType::from_provider("invoice.payment_succeeded"),
            WebhookEventType::InvoicePaymentSucceeded
        );
        assert_eq!(
            WebhookEventType::from_provider("invoice.payment_failed"),
            WebhookEventType::InvoicePaymentFailed
        );
        let other = WebhookEventType::from_provider("customer.created");
        assert_eq!(other.as_str(), "customer.created");
    }
}
