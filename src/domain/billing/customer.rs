//! Customer record linking an application user to a billing-provider customer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CustomerRecordId, UserId};

use super::subscription::{ActiveSubscription, FreeTrial, SubscriptionStatus};

/// A user's billing identity.
///
/// `customer_stripe_id` is assigned once, when the provider customer is
/// created, and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub id: CustomerRecordId,
    pub user_id: UserId,
    pub customer_stripe_id: String,
    pub email: String,
    pub active_subscription: ActiveSubscription,
    pub free_trial: FreeTrial,
    /// Last invoice applied through `record_payment_succeeded`.
    #[serde(default)]
    pub last_paid_invoice_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CustomerRecord {
    pub fn new(
        user_id: UserId,
        customer_stripe_id: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: CustomerRecordId::new(),
            user_id,
            customer_stripe_id: customer_stripe_id.into(),
            email: email.into(),
            active_subscription: ActiveSubscription::default(),
            free_trial: FreeTrial::default(),
            last_paid_invoice_id: None,
            created_at: Utc::now(),
        }
    }

    /// Whether a new checkout may include a free trial.
    pub fn trial_eligible_for_checkout(&self) -> bool {
        self.active_subscription.never_expired()
    }

    /// The subscription whose trial may be cancelled, if the trial is open.
    pub fn cancellable_trial_subscription(&self) -> Option<&str> {
        if !self.free_trial.eligible {
            return None;
        }
        self.active_subscription.subscription_id.as_deref()
    }

    /// Whether an invoice event for `subscription_id` arrived after the
    /// subscription was already cancelled here.
    fn belongs_to_cancelled_subscription(&self, subscription_id: Option<&str>) -> bool {
        self.active_subscription.status == Some(SubscriptionStatus::Canceled)
            && subscription_id.is_some()
            && subscription_id == self.active_subscription.subscription_id.as_deref()
    }

    /// Applies a successful invoice payment. Returns `false` when the
    /// invoice was left unapplied.
    ///
    /// A zero-amount invoice is the trial invoice: it opens the trial until
    /// `period_end`. Any paid invoice closes the trial.
    ///
    /// Redelivered invoices, invoices of a subscription cancelled here and
    /// invoices billing an older period of the recorded subscription change
    /// nothing.
    pub fn record_payment_succeeded(
        &mut self,
        invoice_id: &str,
        subscription_id: Option<String>,
        period_end: Option<DateTime<Utc>>,
        amount_paid: i64,
    ) -> bool {
        if self.last_paid_invoice_id.as_deref() == Some(invoice_id)
            || self.belongs_to_cancelled_subscription(subscription_id.as_deref())
        {
            return false;
        }
        let same_subscription = subscription_id.is_some()
            && subscription_id == self.active_subscription.subscription_id;
        let outdated = match (period_end, self.active_subscription.subscription_expire) {
            (Some(end), Some(recorded)) => same_subscription && end < recorded,
            _ => false,
        };
        if outdated {
            return false;
        }

        let trial_invoice = amount_paid == 0;
        self.last_paid_invoice_id = Some(invoice_id.to_string());

        if subscription_id.is_some() {
            self.active_subscription.subscription_id = subscription_id;
        }
        self.active_subscription.status = Some(if trial_invoice {
            SubscriptionStatus::Trialing
        } else {
            SubscriptionStatus::Active
        });
        if period_end.is_some() {
            self.active_subscription.subscription_expire = period_end;
        }

        self.free_trial = if trial_invoice {
            FreeTrial {
                eligible: true,
                expires_at: period_end,
            }
        } else {
            FreeTrial {
                eligible: false,
                expires_at: self.free_trial.expires_at,
            }
        };

        true
    }

    /// Applies a failed invoice payment. Returns `false` when the failure
    /// is older than the recorded state.
    ///
    /// A failure of the invoice that was already paid here, or of a
    /// subscription cancelled here, is ignored.
    pub fn record_payment_failed(
        &mut self,
        invoice_id: &str,
        subscription_id: Option<String>,
    ) -> bool {
        if self.last_paid_invoice_id.as_deref() == Some(invoice_id)
            || self.belongs_to_cancelled_subscription(subscription_id.as_deref())
        {
            return false;
        }

        if subscription_id.is_some() {
            self.active_subscription.subscription_id = subscription_id;
        }
        self.active_subscription.status = Some(SubscriptionStatus::PastDue);
        true
    }

    /// Rebuilds the subscription state from the provider, for a record
    /// recreated after local storage lost it. Only a trialing subscription
    /// reopens the trial.
    pub fn restore_subscription(
        &mut self,
        subscription_id: impl Into<String>,
        status: SubscriptionStatus,
        period_end: Option<DateTime<Utc>>,
        trial_end: Option<DateTime<Utc>>,
    ) {
        self.active_subscription = ActiveSubscription {
            subscription_id: Some(subscription_id.into()),
            status: Some(status),
            subscription_expire: period_end,
        };
        if status == SubscriptionStatus::Trialing {
            self.free_trial = FreeTrial {
                eligible: true,
                expires_at: trial_end.or(period_end),
            };
        }
    }

    /// Closes the trial after its subscription was cancelled at the provider.
    pub fn record_trial_cancelled(&mut self) {
        self.free_trial.eligible = false;
        self.active_subscription.status = Some(SubscriptionStatus::Canceled);
    }
}
