//! BillingService - facade over the payment provider and customer storage.
//!
//! Every HTTP handler goes through this type. It owns the get-or-create
//! customer flow, trial bookkeeping and the reactions to invoice webhooks.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::billing::{
    is_provider_id, ActiveSubscription, BillingError, CustomerRecord, FreeTrial,
    SubscriptionStatus,
};
use crate::domain::foundation::{AuthenticatedUser, ErrorCode, UserId};
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, CustomerRepository,
    InvoiceData, PaymentEventHandler, PaymentProvider, PortalSession, Price, Subscription,
};

/// Placeholder the provider substitutes with the created session id.
const CHECKOUT_SESSION_ID_TEMPLATE: &str = "{CHECKOUT_SESSION_ID}";

/// Settings the facade needs from configuration.
#[derive(Debug, Clone)]
pub struct BillingSettings {
    /// Base URL of the web frontend, without trailing slash.
    pub frontend_url: String,

    /// Trial length granted to first-time subscribers.
    pub trial_period_days: u32,
}

impl BillingSettings {
    pub fn new(frontend_url: impl Into<String>, trial_period_days: u32) -> Self {
        Self {
            frontend_url: frontend_url.into().trim_end_matches('/').to_string(),
            trial_period_days,
        }
    }

    pub fn portal_return_url(&self) -> String {
        format!("{}/account", self.frontend_url)
    }

    pub fn default_success_url(&self) -> String {
        format!(
            "{}/checkout/success?session_id={}",
            self.frontend_url, CHECKOUT_SESSION_ID_TEMPLATE
        )
    }

    pub fn default_cancel_url(&self) -> String {
        format!("{}/pricing", self.frontend_url)
    }
}

/// Command to start a subscription checkout.
#[derive(Debug, Clone)]
pub struct CreateCheckoutCommand {
    pub customer_id: String,
    pub price_id: String,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
    pub trial_eligible: bool,
}

/// The caller's locally recorded subscription state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberSummary {
    pub customer_stripe_id: String,
    pub active_subscription: ActiveSubscription,
    pub free_trial: FreeTrial,
}

impl From<CustomerRecord> for SubscriberSummary {
    fn from(record: CustomerRecord) -> Self {
        Self {
            customer_stripe_id: record.customer_stripe_id,
            active_subscription: record.active_subscription,
            free_trial: record.free_trial,
        }
    }
}

pub struct BillingService {
    repository: Arc<dyn CustomerRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
    settings: BillingSettings,
}

impl BillingService {
    pub fn new(
        repository: Arc<dyn CustomerRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
        settings: BillingSettings,
    ) -> Self {
        Self {
            repository,
            payment_provider,
            settings,
        }
    }

    pub fn settings(&self) -> &BillingSettings {
        &self.settings
    }

    /// Returns the user's customer record, creating the provider customer on
    /// first use.
    ///
    /// Without a local record the provider is searched first, so a customer
    /// created before local state was lost is linked again instead of being
    /// duplicated.
    pub async fn stripe_customer(
        &self,
        user: &AuthenticatedUser,
    ) -> Result<CustomerRecord, BillingError> {
        if let Some(existing) = self.repository.find_by_user_id(&user.id).await? {
            return Ok(existing);
        }

        let record = match self.payment_provider.find_customer_by_user_id(&user.id).await? {
            Some(customer) => self.relink_customer(user, customer).await?,
            None => {
                let customer = self
                    .payment_provider
                    .create_customer(CreateCustomerRequest {
                        user_id: user.id.clone(),
                        email: user.email.clone(),
                        name: user.display_name.clone(),
                    })
                    .await?;
                CustomerRecord::new(user.id.clone(), customer.id, customer.email)
            }
        };

        match self.repository.save(&record).await {
            Ok(()) => {
                tracing::info!(
                    user_id = %user.id,
                    customer_id = %record.customer_stripe_id,
                    "Stored billing customer"
                );
                Ok(record)
            }
            Err(e) if e.code == ErrorCode::Conflict => {
                // A concurrent request stored its customer first; keep that one.
                tracing::warn!(
                    user_id = %user.id,
                    orphaned_customer_id = %record.customer_stripe_id,
                    "Customer record created concurrently"
                );
                self.repository
                    .find_by_user_id(&user.id)
                    .await?
                    .ok_or_else(|| BillingError::infrastructure(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Record for a provider customer found by search, with the state of its
    /// most recent subscription.
    async fn relink_customer(
        &self,
        user: &AuthenticatedUser,
        customer: Customer,
    ) -> Result<CustomerRecord, BillingError> {
        let email = if customer.email.is_empty() {
            user.email.clone()
        } else {
            customer.email
        };
        let mut record = CustomerRecord::new(user.id.clone(), customer.id, email);

        let latest = self
            .payment_provider
            .list_subscriptions(&record.customer_stripe_id, None)
            .await?
            .into_iter()
            .max_by_key(|s| s.current_period_end);
        if let Some(subscription) = latest {
            record.restore_subscription(
                subscription.id,
                subscription.status,
                unix_to_datetime(subscription.current_period_end),
                subscription.trial_end.and_then(unix_to_datetime),
            );
        }

        tracing::info!(
            user_id = %user.id,
            customer_id = %record.customer_stripe_id,
            "Relinked existing billing customer"
        );

        Ok(record)
    }

    pub async fn find_customer(
        &self,
        user_id: &UserId,
    ) -> Result<Option<CustomerRecord>, BillingError> {
        Ok(self.repository.find_by_user_id(user_id).await?)
    }

    pub async fn get_subscriber_me(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriberSummary>, BillingError> {
        Ok(self.find_customer(user_id).await?.map(SubscriberSummary::from))
    }

    pub async fn create_portal_session(
        &self,
        user_id: &UserId,
    ) -> Result<PortalSession, BillingError> {
        let customer = self
            .find_customer(user_id)
            .await?
            .ok_or(BillingError::CustomerNotFound)?;

        let session = self
            .payment_provider
            .create_portal_session(&customer.customer_stripe_id, &self.settings.portal_return_url())
            .await?;

        Ok(session)
    }

    pub async fn create_checkout_session(
        &self,
        cmd: CreateCheckoutCommand,
    ) -> Result<CheckoutSession, BillingError> {
        if cmd.price_id.trim().is_empty() {
            return Err(BillingError::validation("priceId", "priceId is required"));
        }

        let request = CreateCheckoutRequest {
            customer_id: cmd.customer_id,
            price_id: cmd.price_id,
            success_url: cmd
                .success_url
                .unwrap_or_else(|| self.settings.default_success_url()),
            cancel_url: cmd
                .cancel_url
                .unwrap_or_else(|| self.settings.default_cancel_url()),
            trial_period_days: cmd.trial_eligible.then_some(self.settings.trial_period_days),
        };

        let session = self.payment_provider.create_checkout_session(request).await?;

        tracing::info!(
            session_id = %session.id,
            trial = cmd.trial_eligible,
            "Created checkout session"
        );

        Ok(session)
    }

    /// A checkout session of the caller's customer.
    ///
    /// Sessions of other customers read as not found.
    pub async fn checkout_session(
        &self,
        user_id: &UserId,
        session_id: &str,
    ) -> Result<CheckoutSession, BillingError> {
        if session_id.trim().is_empty() {
            return Err(BillingError::validation("sessionId", "sessionId is required"));
        }
        if !is_provider_id(session_id) {
            return Err(BillingError::validation("sessionId", "sessionId is invalid"));
        }

        let not_found = || BillingError::CheckoutSessionNotFound(session_id.to_string());
        let customer = self.find_customer(user_id).await?.ok_or_else(not_found)?;

        let session = self
            .payment_provider
            .get_checkout_session(session_id)
            .await?
            .ok_or_else(not_found)?;

        if session.customer_id.as_deref() != Some(customer.customer_stripe_id.as_str()) {
            tracing::warn!(
                user_id = %user_id,
                session_id,
                "Checkout session of another customer requested"
            );
            return Err(not_found());
        }

        Ok(session)
    }

    pub async fn list_prices(&self, active_product: bool) -> Result<Vec<Price>, BillingError> {
        Ok(self.payment_provider.list_prices(active_product).await?)
    }

    /// Sets or clears cancellation at the end of the current period.
    ///
    /// Only subscriptions of the caller's own customer can be changed.
    pub async fn update_subscription_plan(
        &self,
        user_id: &UserId,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<Subscription, BillingError> {
        if subscription_id.trim().is_empty() {
            return Err(BillingError::validation(
                "subscriptionId",
                "subscriptionId is required",
            ));
        }
        if !is_provider_id(subscription_id) {
            return Err(BillingError::validation(
                "subscriptionId",
                "subscriptionId is invalid",
            ));
        }

        let customer = self
            .find_customer(user_id)
            .await?
            .ok_or(BillingError::CustomerNotFound)?;

        let owned = self
            .payment_provider
            .get_subscription(subscription_id)
            .await?
            .is_some_and(|s| s.customer_id == customer.customer_stripe_id);
        if !owned {
            tracing::warn!(
                user_id = %user_id,
                subscription_id,
                "Update of a subscription the caller does not own"
            );
            return Err(BillingError::SubscriptionNotFound(subscription_id.to_string()));
        }

        let subscription = self
            .payment_provider
            .update_subscription(subscription_id, cancel_at_period_end)
            .await?;

        tracing::info!(
            subscription_id = %subscription.id,
            cancel_at_period_end,
            "Updated subscription"
        );

        Ok(subscription)
    }

    /// Provider subscriptions of the user's customer; empty when the user has
    /// never become a customer.
    pub async fn get_subscriptions(
        &self,
        user_id: &UserId,
        status: Option<SubscriptionStatus>,
    ) -> Result<Vec<Subscription>, BillingError> {
        let Some(customer) = self.find_customer(user_id).await? else {
            return Ok(Vec::new());
        };

        Ok(self
            .payment_provider
            .list_subscriptions(&customer.customer_stripe_id, status)
            .await?)
    }

    /// Cancels the subscription of an open trial.
    pub async fn handle_trial_end(&self, user_id: &UserId) -> Result<(), BillingError> {
        let mut customer = self
            .find_customer(user_id)
            .await?
            .ok_or(BillingError::TrialCancelFailed)?;

        let subscription_id = customer
            .cancellable_trial_subscription()
            .ok_or(BillingError::TrialCancelFailed)?
            .to_string();

        self.payment_provider
            .cancel_subscription(&subscription_id)
            .await?;

        customer.record_trial_cancelled();
        self.repository.update(&customer).await?;

        tracing::info!(
            user_id = %user_id,
            subscription_id = %subscription_id,
            "Trial cancelled"
        );

        Ok(())
    }

    async fn customer_for_invoice(
        &self,
        invoice: &InvoiceData,
    ) -> Result<Option<CustomerRecord>, BillingError> {
        let customer = self
            .repository
            .find_by_stripe_customer_id(&invoice.customer_id)
            .await?;

        if customer.is_none() {
            tracing::warn!(
                invoice_id = %invoice.invoice_id,
                customer_id = %invoice.customer_id,
                "Invoice for unknown customer"
            );
        }

        Ok(customer)
    }
}

#[async_trait]
impl PaymentEventHandler for BillingService {
    async fn handle_payment_succeeded(&self, invoice: InvoiceData) -> Result<(), BillingError> {
        let Some(mut customer) = self.customer_for_invoice(&invoice).await? else {
            return Ok(());
        };

        let period_end = invoice.period_end.and_then(unix_to_datetime);
        let applied = customer.record_payment_succeeded(
            &invoice.invoice_id,
            invoice.subscription_id.clone(),
            period_end,
            invoice.amount_paid,
        );
        if !applied {
            tracing::info!(
                invoice_id = %invoice.invoice_id,
                customer_id = %invoice.customer_id,
                "Ignored duplicate or outdated paid invoice"
            );
            return Ok(());
        }
        self.repository.update(&customer).await?;

        tracing::info!(
            invoice_id = %invoice.invoice_id,
            customer_id = %invoice.customer_id,
            amount_paid = invoice.amount_paid,
            "Payment succeeded"
        );

        Ok(())
    }

    async fn handle_payment_failed(&self, invoice: InvoiceData) -> Result<(), BillingError> {
        let Some(mut customer) = self.customer_for_invoice(&invoice).await? else {
            return Ok(());
        };

        if !customer.record_payment_failed(&invoice.invoice_id, invoice.subscription_id.clone()) {
            tracing::info!(
                invoice_id = %invoice.invoice_id,
                customer_id = %invoice.customer_id,
                "Ignored outdated failed invoice"
            );
            return Ok(());
        }
        self.repository.update(&customer).await?;

        tracing::warn!(
            invoice_id = %invoice.invoice_id,
            customer_id = %invoice.customer_id,
            "Payment failed"
        );

        Ok(())
    }
}

fn unix_to_datetime(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
}
