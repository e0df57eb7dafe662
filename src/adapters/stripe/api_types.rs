//! Stripe API objects as returned by the REST endpoints and embedded in
//! webhook payloads, with conversions into port types.
//!
//! Only the fields the billing flows read are modelled; everything else in
//! the JSON is ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::billing::SubscriptionStatus;
use crate::ports::{
    CheckoutSession, Customer, PortalSession, Price, PriceRecurring, Product, Subscription,
};

/// Paginated list envelope (`{"object": "list", "data": [...]}`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,

    #[serde(default)]
    pub has_more: bool,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    /// api_error, card_error, invalid_request_error, ...
    #[serde(rename = "type")]
    pub error_type: Option<String>,

    pub code: Option<String>,

    pub message: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Customer & Sessions
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Customer object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCustomer {
    /// Unique customer identifier (cus_...).
    pub id: String,

    pub email: Option<String>,

    pub name: Option<String>,

    /// Unix timestamp of creation.
    pub created: i64,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl From<StripeCustomer> for Customer {
    fn from(c: StripeCustomer) -> Self {
        Customer {
            id: c.id,
            email: c.email.unwrap_or_default(),
            name: c.name,
            created_at: c.created,
        }
    }
}

/// Stripe Checkout Session object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCheckoutSession {
    /// Unique session identifier (cs_...).
    pub id: String,

    /// Hosted page URL, null once the session is complete or expired.
    pub url: Option<String>,

    pub customer: Option<String>,

    pub subscription: Option<String>,

    pub payment_status: Option<String>,

    /// open, complete or expired.
    pub status: Option<String>,

    /// payment, setup or subscription.
    pub mode: Option<String>,

    pub expires_at: Option<i64>,
}

impl From<StripeCheckoutSession> for CheckoutSession {
    fn from(s: StripeCheckoutSession) -> Self {
        CheckoutSession {
            id: s.id,
            url: s.url,
            status: s.status,
            payment_status: s.payment_status,
            customer_id: s.customer,
            subscription_id: s.subscription,
            expires_at: s.expires_at,
        }
    }
}

/// Stripe billing portal session.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePortalSession {
    /// bps_...
    pub id: String,
    pub url: String,
}

impl From<StripePortalSession> for PortalSession {
    fn from(s: StripePortalSession) -> Self {
        PortalSession { id: s.id, url: s.url }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Prices
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Price object.
///
/// `product` is an id unless the request expanded it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePrice {
    pub id: String,

    #[serde(default)]
    pub active: bool,

    pub product: StripeProductRef,

    /// Unit amount in the currency's minor unit.
    pub unit_amount: Option<i64>,

    pub currency: String,

    pub recurring: Option<StripePriceRecurring>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StripeProductRef {
    Expanded(StripeProduct),
    Id(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeProduct {
    pub id: String,

    pub name: Option<String>,

    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePriceRecurring {
    /// Billing interval (day, week, month, year).
    pub interval: String,

    pub interval_count: i32,
}

impl StripePrice {
    /// Whether the price's product has the given `active` flag.
    ///
    /// Unexpanded products have unknown activity and never match.
    pub fn product_active_is(&self, active: bool) -> bool {
        match &self.product {
            StripeProductRef::Expanded(product) => product.active == active,
            StripeProductRef::Id(_) => false,
        }
    }
}

impl From<StripePrice> for Price {
    fn from(p: StripePrice) -> Self {
        let product = match p.product {
            StripeProductRef::Expanded(product) => Product {
                id: product.id,
                name: product.name,
                active: product.active,
            },
            StripeProductRef::Id(id) => Product {
                id,
                name: None,
                active: false,
            },
        };

        Price {
            id: p.id,
            active: p.active,
            product,
            unit_amount: p.unit_amount,
            currency: p.currency,
            recurring: p.recurring.map(|r| PriceRecurring {
                interval: r.interval,
                interval_count: r.interval_count,
            }),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscriptions
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Subscription object.
///
/// Newer API versions report the billing period on the items instead of the
/// subscription, so both places are read.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    /// Unique subscription identifier (sub_...).
    pub id: String,

    pub customer: String,

    pub status: String,

    pub current_period_start: Option<i64>,

    pub current_period_end: Option<i64>,

    #[serde(default)]
    pub cancel_at_period_end: bool,

    pub canceled_at: Option<i64>,

    pub trial_end: Option<i64>,

    #[serde(default)]
    pub items: StripeSubscriptionItems,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StripeSubscriptionItems {
    #[serde(default)]
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscriptionItem {
    pub id: String,

    pub price: StripeItemPrice,

    pub current_period_start: Option<i64>,

    pub current_period_end: Option<i64>,
}

/// Price as embedded in a subscription item.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeItemPrice {
    pub id: String,
}

impl From<StripeSubscription> for Subscription {
    fn from(s: StripeSubscription) -> Self {
        let first_item = s.items.data.first();
        let current_period_start = s
            .current_period_start
            .or_else(|| first_item.and_then(|i| i.current_period_start))
            .unwrap_or_default();
        let current_period_end = s
            .current_period_end
            .or_else(|| first_item.and_then(|i| i.current_period_end))
            .unwrap_or_default();
        let price_id = first_item.map(|i| i.price.id.clone());

        Subscription {
            id: s.id,
            customer_id: s.customer,
            status: SubscriptionStatus::from_provider(&s.status),
            current_period_start,
            current_period_end,
            cancel_at_period_end: s.cancel_at_period_end,
            canceled_at: s.canceled_at,
            trial_end: s.trial_end,
            price_id,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Invoices
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Invoice object, as carried by `invoice.*` events.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoice {
    /// Unique invoice identifier (in_...).
    pub id: String,

    pub customer: String,

    /// Present on older API versions.
    pub subscription: Option<String>,

    /// Subscription reference on newer API versions.
    pub parent: Option<StripeInvoiceParent>,

    /// draft, open, paid, void or uncollectible.
    pub status: Option<String>,

    pub amount_paid: i64,

    #[serde(default)]
    pub amount_due: i64,

    pub currency: String,

    pub billing_reason: Option<String>,

    #[serde(default)]
    pub attempt_count: i32,

    pub period_end: Option<i64>,

    #[serde(default)]
    pub lines: StripeInvoiceLines,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoiceParent {
    pub subscription_details: Option<StripeInvoiceSubscriptionDetails>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoiceSubscriptionDetails {
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StripeInvoiceLines {
    #[serde(default)]
    pub data: Vec<StripeInvoiceLineItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoiceLineItem {
    pub id: String,

    pub amount: i64,

    /// Billing period for this line.
    pub period: StripeInvoicePeriod,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoicePeriod {
    pub start: i64,
    pub end: i64,
}

impl StripeInvoice {
    pub fn subscription_id(&self) -> Option<String> {
        self.subscription.clone().or_else(|| {
            self.parent
                .as_ref()
                .and_then(|p| p.subscription_details.as_ref())
                .and_then(|d| d.subscription.clone())
        })
    }

    /// End of the subscription period this invoice pays for.
    ///
    /// The invoice-level `period_end` is the invoicing period, not the
    /// service period, so the line items are preferred.
    pub fn period_end(&self) -> Option<i64> {
        self.lines
            .data
            .iter()
            .map(|line| line.period.end)
            .max()
            .or(self.period_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_with_expanded_product_converts() {
        let json = r#"{
            "id": "price_monthly",
            "object": "price",
            "active": true,
            "currency": "usd",
            "unit_amount": 1999,
            "product": { "id": "prod_pro", "object": "product", "name": "Pro", "active": true },
            "recurring": { "interval": "month", "interval_count": 1 }
        }"#;

        let price: StripePrice = serde_json::from_str(json).unwrap();
        assert!(price.product_active_is(true));
        assert!(!price.product_active_is(false));

        let price: Price = price.into();
        assert_eq!(price.product.name.as_deref(), Some("Pro"));
        assert_eq!(price.recurring.unwrap().interval, "month");
    }

    #[test]
    fn price_with_product_id_never_matches_activity() {
        let json = r#"{
            "id": "price_1",
            "active": true,
            "currency": "usd",
            "unit_amount": null,
            "product": "prod_1",
            "recurring": null
        }"#;

        let price: StripePrice = serde_json::from_str(json).unwrap();

        assert!(!price.product_active_is(true));
        assert!(!price.product_active_is(false));
    }

    #[test]
    fn subscription_reads_period_from_items_when_missing() {
        let json = r#"{
            "id": "sub_1",
            "object": "subscription",
            "customer": "cus_1",
            "status": "trialing",
            "cancel_at_period_end": true,
            "trial_end": 1706745600,
            "items": {
                "object": "list",
                "data": [{
                    "id": "si_1",
                    "price": { "id": "price_monthly" },
                    "current_period_start": 1704067200,
                    "current_period_end": 1706745600
                }]
            }
        }"#;

        let sub: Subscription = serde_json::from_str::<StripeSubscription>(json).unwrap().into();

        assert_eq!(sub.status, SubscriptionStatus::Trialing);
        assert_eq!(sub.current_period_start, 1704067200);
        assert_eq!(sub.current_period_end, 1706745600);
        assert!(sub.cancel_at_period_end);
        assert_eq!(sub.price_id.as_deref(), Some("price_monthly"));
    }

    #[test]
    fn invoice_reads_subscription_from_parent() {
        let json = r#"{
            "id": "in_1",
            "customer": "cus_1",
            "amount_paid": 1999,
            "currency": "usd",
            "period_end": 1704067200,
            "parent": { "subscription_details": { "subscription": "sub_9" } }
        }"#;

        let invoice: StripeInvoice = serde_json::from_str(json).unwrap();

        assert_eq!(invoice.subscription_id().as_deref(), Some("sub_9"));
        assert_eq!(invoice.period_end(), Some(1704067200));
    }

    #[test]
    fn checkout_session_converts() {
        let json = r#"{
            "id": "cs_test_abc",
            "object": "checkout.session",
            "url": "https://checkout.stripe.com/c/pay/cs_test_abc",
            "customer": "cus_123",
            "subscription": null,
            "payment_status": "unpaid",
            "status": "open",
            "mode": "subscription",
            "expires_at": 1704153600
        }"#;

        let session: CheckoutSession =
            serde_json::from_str::<StripeCheckoutSession>(json).unwrap().into();

        assert_eq!(session.customer_id.as_deref(), Some("cus_123"));
        assert_eq!(session.status.as_deref(), Some("open"));
        assert!(session.url.is_some());
    }

    #[test]
    fn error_body_parses() {
        let json = r#"{"error": {"type": "invalid_request_error", "code": "resource_missing", "message": "No such price: 'price_x'"}}"#;

        let body: StripeErrorResponse = serde_json::from_str(json).unwrap();

        assert_eq!(body.error.code.as_deref(), Some("resource_missing"));
    }
}
