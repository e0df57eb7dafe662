//! Mock payment provider for testing.
//!
//! Provides a configurable in-process implementation of `PaymentProvider`
//! for unit and integration tests. Supports:
//! - Seeded prices, subscriptions and checkout sessions
//! - Error injection
//! - Call tracking
//! - Webhook acceptance modes

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::billing::SubscriptionStatus;
use crate::domain::foundation::UserId;
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, PaymentError,
    PaymentProvider, PortalSession, Price, PriceRecurring, Product, Subscription, WebhookEvent,
};

use super::webhook_types::StripeWebhookEvent;

/// Mock payment provider for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockPaymentProvider::new();
/// mock.add_subscription(MockPaymentProvider::subscription("sub_1", "cus_1", SubscriptionStatus::Active));
/// mock.set_method_error("list_prices", PaymentError::network("down"));
///
/// assert_eq!(mock.call_count("create_customer"), 0);
/// ```
#[derive(Default)]
pub struct MockPaymentProvider {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    customers: HashMap<String, Customer>,

    /// Provider customer id per user, as the `user_id` metadata would hold.
    customer_users: HashMap<String, String>,

    subscriptions: HashMap<String, Subscription>,

    checkout_sessions: HashMap<String, CheckoutSession>,

    prices: Vec<Price>,

    /// Event returned by `verify_webhook` instead of parsing the payload.
    next_webhook_event: Option<WebhookEvent>,

    /// Error to return on next call.
    next_error: Option<PaymentError>,

    /// Specific errors by method name.
    method_errors: HashMap<String, PaymentError>,

    call_log: Vec<MethodCall>,

    webhook_verify_mode: WebhookVerifyMode,

    sequence: u64,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

#[derive(Default, Clone)]
enum WebhookVerifyMode {
    /// Accept any signature.
    #[default]
    AcceptAll,

    /// Accept only this exact signature header.
    RequireSignature(String),

    /// Always fail verification.
    AlwaysFail,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that fails all webhook verifications.
    pub fn rejecting_webhooks() -> Self {
        let mock = Self::new();
        mock.state().webhook_verify_mode = WebhookVerifyMode::AlwaysFail;
        mock
    }

    /// Create a mock that only accepts the given signature header.
    pub fn requiring_signature(signature: impl Into<String>) -> Self {
        let mock = Self::new();
        mock.state().webhook_verify_mode = WebhookVerifyMode::RequireSignature(signature.into());
        mock
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Fixtures
    // ════════════════════════════════════════════════════════════════════════════

    /// A monthly USD price for `product`.
    pub fn price(id: &str, product: Product) -> Price {
        Price {
            id: id.to_string(),
            active: true,
            product,
            unit_amount: Some(1999),
            currency: "usd".to_string(),
            recurring: Some(PriceRecurring {
                interval: "month".to_string(),
                interval_count: 1,
            }),
        }
    }

    /// A subscription in its first 30-day period.
    pub fn subscription(id: &str, customer_id: &str, status: SubscriptionStatus) -> Subscription {
        let now = chrono::Utc::now().timestamp();
        Subscription {
            id: id.to_string(),
            customer_id: customer_id.to_string(),
            status,
            current_period_start: now,
            current_period_end: now + 30 * 24 * 60 * 60,
            cancel_at_period_end: false,
            canceled_at: None,
            trial_end: None,
            price_id: Some("price_monthly".to_string()),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    pub fn set_prices(&self, prices: Vec<Price>) {
        self.state().prices = prices;
    }

    /// Seed a customer that was created for `user_id` in an earlier run.
    pub fn add_customer(&self, user_id: &UserId, customer: Customer) {
        let mut state = self.state();
        state
            .customer_users
            .insert(user_id.to_string(), customer.id.clone());
        state.customers.insert(customer.id.clone(), customer);
    }

    pub fn add_subscription(&self, subscription: Subscription) {
        let id = subscription.id.clone();
        self.state().subscriptions.insert(id, subscription);
    }

    pub fn add_checkout_session(&self, session: CheckoutSession) {
        let id = session.id.clone();
        self.state().checkout_sessions.insert(id, session);
    }

    /// Set the webhook event to return on verification.
    pub fn set_webhook_event(&self, event: WebhookEvent) {
        self.state().next_webhook_event = Some(event);
    }

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: PaymentError) {
        self.state().next_error = Some(error);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.next_error = None;
        state.method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not poison every later assertion.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.state().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), PaymentError> {
        let mut state = self.state();

        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }

        // Global error is consumed by the first call.
        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.state();
        state.sequence += 1;
        format!("{}_mock_{}", prefix, state.sequence)
    }
}

impl Clone for MockPaymentProvider {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        self.record_call(
            "create_customer",
            vec![request.user_id.to_string(), request.email.clone()],
        );
        self.check_error("create_customer")?;

        let customer = Customer {
            id: self.next_id("cus"),
            email: request.email,
            name: request.name,
            created_at: chrono::Utc::now().timestamp(),
        };
        self.add_customer(&request.user_id, customer.clone());

        Ok(customer)
    }

    async fn find_customer_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Customer>, PaymentError> {
        self.record_call("find_customer_by_user_id", vec![user_id.to_string()]);
        self.check_error("find_customer_by_user_id")?;

        let state = self.state();
        Ok(state
            .customer_users
            .get(user_id.as_str())
            .and_then(|id| state.customers.get(id))
            .cloned())
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        self.record_call(
            "create_portal_session",
            vec![customer_id.to_string(), return_url.to_string()],
        );
        self.check_error("create_portal_session")?;

        let id = self.next_id("bps");
        Ok(PortalSession {
            url: format!("https://billing.stripe.test/session/{}", id),
            id,
        })
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        self.record_call(
            "create_checkout_session",
            vec![
                request.customer_id.clone(),
                request.price_id.clone(),
                format!("{:?}", request.trial_period_days),
            ],
        );
        self.check_error("create_checkout_session")?;

        let id = self.next_id("cs");
        let session = CheckoutSession {
            url: Some(format!("https://checkout.stripe.test/c/pay/{}", id)),
            id,
            status: Some("open".to_string()),
            payment_status: Some("unpaid".to_string()),
            customer_id: Some(request.customer_id),
            subscription_id: None,
            expires_at: Some(chrono::Utc::now().timestamp() + 24 * 60 * 60),
        };
        self.add_checkout_session(session.clone());

        Ok(session)
    }

    async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CheckoutSession>, PaymentError> {
        self.record_call("get_checkout_session", vec![session_id.to_string()]);
        self.check_error("get_checkout_session")?;

        Ok(self.state().checkout_sessions.get(session_id).cloned())
    }

    async fn list_prices(&self, active_product: bool) -> Result<Vec<Price>, PaymentError> {
        self.record_call("list_prices", vec![active_product.to_string()]);
        self.check_error("list_prices")?;

        Ok(self
            .state()
            .prices
            .iter()
            .filter(|p| p.product.active == active_product)
            .cloned()
            .collect())
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Subscription>, PaymentError> {
        self.record_call("get_subscription", vec![subscription_id.to_string()]);
        self.check_error("get_subscription")?;

        Ok(self.state().subscriptions.get(subscription_id).cloned())
    }

    async fn update_subscription(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<Subscription, PaymentError> {
        self.record_call(
            "update_subscription",
            vec![subscription_id.to_string(), cancel_at_period_end.to_string()],
        );
        self.check_error("update_subscription")?;

        let mut state = self.state();
        let subscription = state
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| PaymentError::not_found("Subscription"))?;

        subscription.cancel_at_period_end = cancel_at_period_end;
        subscription.canceled_at = cancel_at_period_end.then(|| chrono::Utc::now().timestamp());

        Ok(subscription.clone())
    }

    async fn list_subscriptions(
        &self,
        customer_id: &str,
        status: Option<SubscriptionStatus>,
    ) -> Result<Vec<Subscription>, PaymentError> {
        self.record_call(
            "list_subscriptions",
            vec![customer_id.to_string(), format!("{:?}", status)],
        );
        self.check_error("list_subscriptions")?;

        let mut subscriptions: Vec<Subscription> = self
            .state()
            .subscriptions
            .values()
            .filter(|s| s.customer_id == customer_id)
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .cloned()
            .collect();
        subscriptions.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(subscriptions)
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentError> {
        self.record_call("cancel_subscription", vec![subscription_id.to_string()]);
        self.check_error("cancel_subscription")?;

        let mut state = self.state();
        let subscription = state
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| PaymentError::not_found("Subscription"))?;

        subscription.status = SubscriptionStatus::Canceled;
        subscription.canceled_at = Some(chrono::Utc::now().timestamp());

        Ok(subscription.clone())
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        self.record_call(
            "verify_webhook",
            vec![String::from_utf8_lossy(payload).to_string(), signature.to_string()],
        );
        self.check_error("verify_webhook")?;

        let mode = self.state().webhook_verify_mode.clone();
        match mode {
            WebhookVerifyMode::AcceptAll => {}
            WebhookVerifyMode::RequireSignature(expected) if expected == signature => {}
            WebhookVerifyMode::RequireSignature(_) => {
                return Err(PaymentError::invalid_webhook("Signature mismatch"));
            }
            WebhookVerifyMode::AlwaysFail => {
                return Err(PaymentError::invalid_webhook("Mock verification failure"));
            }
        }

        if let Some(event) = self.state().next_webhook_event.take() {
            return Ok(event);
        }

        let event: StripeWebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::invalid_webhook(format!("Invalid JSON: {}", e)))?;

        Ok(event.into_port_event())
    }
}
