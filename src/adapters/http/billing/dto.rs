//! HTTP DTOs (Data Transfer Objects) for billing endpoints.
//!
//! Every response body carries `status`, mirroring the HTTP status code,
//! next to a payload key. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::application::handlers::billing::SubscriberSummary;
use crate::domain::billing::{BillingError, CustomerRecord, SubscriptionStatus};
use crate::ports::{CheckoutSession, PortalSession, Price, Subscription};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `POST /billing/checkout-sessions`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutSessionRequest {
    #[serde(default)]
    pub price_id: String,

    /// Overrides the configured success redirect.
    #[serde(default)]
    pub success_url: Option<String>,

    /// Overrides the configured cancel redirect.
    #[serde(default)]
    pub cancel_url: Option<String>,
}

/// Query of `GET /billing/checkout-sessions`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionQuery {
    #[serde(default)]
    pub session_id: String,
}

/// Query of `GET /billing/prices`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricesQuery {
    pub active_product: Option<String>,
}

impl PricesQuery {
    /// The requested product activity; `true` when absent.
    pub fn active_product(&self) -> Result<bool, BillingError> {
        match self.active_product.as_deref().map(str::trim) {
            None | Some("") => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(false),
            Some(_) => Err(BillingError::validation(
                "activeProduct",
                "activeProduct must be true or false",
            )),
        }
    }
}

/// Body of `POST /billing/subscriptions/update`.
///
/// The cancellation flag arrives as `bool`; `cancelAtPeriodEnd` is accepted
/// too.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscriptionRequest {
    #[serde(default)]
    pub subscription_id: String,

    #[serde(rename = "bool", alias = "cancelAtPeriodEnd", default)]
    pub cancel_at_period_end: bool,
}

/// Query of `GET /billing/subscriptions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionsQuery {
    pub status: Option<String>,
}

impl SubscriptionsQuery {
    /// Parsed status filter; absent or `all` means no filter.
    pub fn status_filter(&self) -> Result<Option<SubscriptionStatus>, BillingError> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => Ok(None),
            Some(raw) => match SubscriptionStatus::from_provider(raw) {
                SubscriptionStatus::Unknown => Err(BillingError::validation(
                    "status",
                    format!("unknown subscription status '{}'", raw),
                )),
                status => Ok(Some(status)),
            },
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct PortalResponse {
    pub status: u16,
    pub session: PortalSession,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriberMeResponse {
    pub status: u16,
    pub subscriptions: Option<SubscriberSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerResponse {
    pub status: u16,
    pub customer: CustomerRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSessionResponse {
    pub status: u16,
    pub session: CheckoutSession,
}

#[derive(Debug, Clone, Serialize)]
pub struct PricesResponse {
    pub status: u16,
    pub prices: Vec<Price>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionResponse {
    pub status: u16,
    pub subscription: Subscription,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionsResponse {
    pub status: u16,
    pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub status: u16,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookReceivedResponse {
    pub received: bool,
}

/// Error body: `{ "status": 400, "message": "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}
