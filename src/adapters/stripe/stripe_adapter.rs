//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` trait against the Stripe REST API with
//! form-encoded requests.
//!
//! # Security
//!
//! - HMAC-SHA256 signature verification with constant-time comparison
//! - Timestamp validation (5-minute window) for replay attack prevention
//! - Secrets handled via `secrecy::SecretString`
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::from_payment_config(&app_config.payment);
//! let adapter = StripePaymentAdapter::new(config);
//! ```

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{IntoUrl, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::PaymentConfig;
use crate::domain::billing::{is_provider_id, SubscriptionStatus};
use crate::domain::foundation::UserId;
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, PaymentError,
    PaymentErrorCode, PaymentProvider, PortalSession, Price, Subscription, WebhookEvent,
};

use super::api_types::{
    StripeCheckoutSession, StripeCustomer, StripeErrorResponse, StripeList, StripePortalSession,
    StripePrice, StripeSubscription,
};
use super::webhook_types::{SignatureHeader, StripeWebhookEvent};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age for webhook events (5 minutes).
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps (60 seconds).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Stripe list endpoints cap `limit` at 100.
const LIST_LIMIT: &str = "100";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    webhook_secret: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Reject test-mode events.
    require_livemode: bool,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            require_livemode: false,
        }
    }

    /// Builds the adapter configuration from the loaded payment section.
    pub fn from_payment_config(config: &PaymentConfig) -> Self {
        let mut stripe = Self::new(
            config.stripe_api_key.clone(),
            config.stripe_webhook_secret.clone(),
        )
        .with_require_livemode(config.require_livemode);

        if let Some(url) = &config.api_base_url {
            stripe = stripe.with_base_url(url.clone());
        }

        stripe
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    /// URL of a single object under `collection`.
    ///
    /// The id is appended as exactly one path segment and must look like a
    /// Stripe object id, so it can never address another endpoint.
    fn object_url(&self, collection: &str, id: &str) -> Result<Url, PaymentError> {
        if !is_provider_id(id) {
            tracing::warn!(collection, "Rejected malformed Stripe object id");
            return Err(PaymentError::new(
                PaymentErrorCode::InvalidRequest,
                "Malformed Stripe object id",
            ));
        }

        let mut url = Url::parse(&self.url(collection))
            .map_err(|e| PaymentError::provider(format!("Invalid Stripe URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| PaymentError::provider("Stripe base URL cannot have a path"))?
            .push(id);

        Ok(url)
    }

    fn get(&self, url: impl IntoUrl) -> reqwest::RequestBuilder {
        self.http_client
            .get(url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
    }

    fn post(&self, url: impl IntoUrl) -> reqwest::RequestBuilder {
        self.http_client
            .post(url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
    }

    fn delete(&self, url: impl IntoUrl) -> reqwest::RequestBuilder {
        self.http_client
            .delete(url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
    }

    /// Sends a request and decodes the JSON body, mapping failures to
    /// `PaymentError`.
    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, PaymentError> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(operation, error = %e, "Stripe request failed");
            PaymentError::network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = error_from_response(status.as_u16(), &body);
            if error.code == PaymentErrorCode::NotFound {
                tracing::debug!(operation, "Stripe resource not found");
            } else {
                tracing::error!(
                    operation,
                    status = status.as_u16(),
                    provider_code = error.provider_code.as_deref().unwrap_or(""),
                    error = %error.message,
                    "Stripe API error"
                );
            }
            return Err(error);
        }

        response.json::<T>().await.map_err(|e| {
            tracing::error!(operation, error = %e, "Failed to parse Stripe response");
            PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
        })
    }

    /// Verify webhook signature using HMAC-SHA256.
    ///
    /// Any `v1` entry matching the expected signature is accepted.
    fn verify_signature(&self, payload: &[u8], header: &SignatureHeader) -> Result<(), PaymentError> {
        let now = chrono::Utc::now().timestamp();
        let Some(age) = now.checked_sub(header.timestamp) else {
            tracing::warn!(
                event_timestamp = header.timestamp,
                "Webhook timestamp out of range"
            );
            return Err(PaymentError::invalid_webhook("Event timestamp out of range"));
        };

        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                age_secs = age,
                "Webhook event too old - possible replay attack"
            );
            return Err(PaymentError::invalid_webhook(format!(
                "Event too old ({} seconds)",
                age
            )));
        }

        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                "Webhook event from future - clock skew or manipulation"
            );
            return Err(PaymentError::invalid_webhook("Event timestamp in future"));
        }

        let mut mac = HmacSha256::new_from_slice(self.config.webhook_secret.expose_secret().as_bytes())
            .map_err(|e| PaymentError::invalid_webhook(format!("Invalid signing key: {}", e)))?;
        mac.update(header.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        let matched = header
            .v1_signatures
            .iter()
            .any(|provided| bool::from(expected.as_slice().ct_eq(provided.as_slice())));

        if !matched {
            tracing::warn!(
                signatures = header.v1_signatures.len(),
                "Invalid webhook signature"
            );
            return Err(PaymentError::invalid_webhook("Invalid signature"));
        }

        Ok(())
    }

    /// Parse a verified payload into a port event.
    fn parse_event(&self, payload: &[u8]) -> Result<WebhookEvent, PaymentError> {
        let stripe_event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook payload");
            PaymentError::invalid_webhook(format!("Invalid JSON: {}", e))
        })?;

        if self.config.require_livemode && !stripe_event.livemode {
            tracing::warn!(
                event_id = %stripe_event.id,
                "Rejected test mode event in production"
            );
            return Err(PaymentError::invalid_webhook(
                "Test mode events not allowed in production",
            ));
        }

        Ok(stripe_event.into_port_event())
    }
}

fn error_from_response(status: u16, body: &str) -> PaymentError {
    let code = PaymentErrorCode::from_http_status(status);

    match serde_json::from_str::<StripeErrorResponse>(body) {
        Ok(parsed) => {
            let message = parsed
                .error
                .message
                .unwrap_or_else(|| format!("Stripe returned HTTP {}", status));
            let error = PaymentError::new(code, message);
            match parsed.error.code.or(parsed.error.error_type) {
                Some(provider_code) => error.with_provider_code(provider_code),
                None => error,
            }
        }
        Err(_) => PaymentError::new(code, format!("Stripe returned HTTP {}: {}", status, body)),
    }
}

/// Stripe search query matching customers created for `user_id`.
fn customer_search_query(user_id: &UserId) -> String {
    let escaped = user_id
        .to_string()
        .replace('\\', "\\\\")
        .replace('\'', "\\'");
    format!("metadata['user_id']:'{}'", escaped)
}

fn checkout_params(request: &CreateCheckoutRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("mode", "subscription".to_string()),
        ("customer", request.customer_id.clone()),
        ("line_items[0][price]", request.price_id.clone()),
        ("line_items[0][quantity]", "1".to_string()),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
    ];

    if let Some(days) = request.trial_period_days {
        params.push(("subscription_data[trial_period_days]", days.to_string()));
    }

    params
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        let mut params = vec![
            ("email", request.email.clone()),
            ("metadata[user_id]", request.user_id.to_string()),
        ];

        if let Some(name) = &request.name {
            params.push(("name", name.clone()));
        }

        let customer: StripeCustomer = self
            .send("create_customer", self.post(self.url("/v1/customers")).form(&params))
            .await?;

        let mut customer = Customer::from(customer);
        if customer.email.is_empty() {
            customer.email = request.email;
        }
        Ok(customer)
    }

    async fn find_customer_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Customer>, PaymentError> {
        let query = [
            ("query", customer_search_query(user_id)),
            ("limit", LIST_LIMIT.to_string()),
        ];

        let customers: StripeList<StripeCustomer> = self
            .send(
                "find_customer_by_user_id",
                self.get(self.url("/v1/customers/search")).query(&query),
            )
            .await?;

        // The oldest match is the one every earlier request linked to.
        Ok(customers
            .data
            .into_iter()
            .min_by_key(|customer| customer.created)
            .map(Customer::from))
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        let params = [("customer", customer_id), ("return_url", return_url)];

        let session: StripePortalSession = self
            .send(
                "create_portal_session",
                self.post(self.url("/v1/billing_portal/sessions")).form(&params),
            )
            .await?;

        Ok(session.into())
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let params = checkout_params(&request);

        let session: StripeCheckoutSession = self
            .send(
                "create_checkout_session",
                self.post(self.url("/v1/checkout/sessions")).form(&params),
            )
            .await?;

        Ok(session.into())
    }

    async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CheckoutSession>, PaymentError> {
        let url = self.object_url("/v1/checkout/sessions", session_id)?;

        match self
            .send::<StripeCheckoutSession>("get_checkout_session", self.get(url))
            .await
        {
            Ok(session) => Ok(Some(session.into())),
            Err(e) if e.code == PaymentErrorCode::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_prices(&self, active_product: bool) -> Result<Vec<Price>, PaymentError> {
        let query = [
            ("active", "true"),
            ("type", "recurring"),
            ("expand[]", "data.product"),
            ("limit", LIST_LIMIT),
        ];

        let prices: StripeList<StripePrice> = self
            .send("list_prices", self.get(self.url("/v1/prices")).query(&query))
            .await?;

        Ok(prices
            .data
            .into_iter()
            .filter(|price| price.product_active_is(active_product))
            .map(Price::from)
            .collect())
    }

    async fn update_subscription(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<Subscription, PaymentError> {
        let url = self.object_url("/v1/subscriptions", subscription_id)?;
        let params = [("cancel_at_period_end", cancel_at_period_end.to_string())];

        let subscription: StripeSubscription = self
            .send("update_subscription", self.post(url).form(&params))
            .await?;

        Ok(subscription.into())
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Subscription>, PaymentError> {
        let url = self.object_url("/v1/subscriptions", subscription_id)?;

        match self
            .send::<StripeSubscription>("get_subscription", self.get(url))
            .await
        {
            Ok(subscription) => Ok(Some(subscription.into())),
            Err(e) if e.code == PaymentErrorCode::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_subscriptions(
        &self,
        customer_id: &str,
        status: Option<SubscriptionStatus>,
    ) -> Result<Vec<Subscription>, PaymentError> {
        // Without a status filter Stripe omits canceled subscriptions.
        let status = status.map(|s| s.as_provider_str()).unwrap_or("all");
        let query = [
            ("customer", customer_id),
            ("status", status),
            ("limit", LIST_LIMIT),
        ];

        let subscriptions: StripeList<StripeSubscription> = self
            .send("list_subscriptions", self.get(self.url("/v1/subscriptions")).query(&query))
            .await?;

        Ok(subscriptions.data.into_iter().map(Subscription::from).collect())
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentError> {
        let url = self.object_url("/v1/subscriptions", subscription_id)?;

        let subscription: StripeSubscription =
            self.send("cancel_subscription", self.delete(url)).await?;

        Ok(subscription.into())
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        let header = SignatureHeader::parse(signature).map_err(|e| {
            tracing::warn!(error = %e, "Malformed Stripe-Signature header");
            PaymentError::invalid_webhook(e.to_string())
        })?;

        self.verify_signature(payload, &header)?;
        let event = self.parse_event(payload)?;

        tracing::info!(
            event_id = %event.id,
            event_type = event.event_type.as_str(),
            "Verified Stripe webhook"
        );

        Ok(event)
    }
}
