//! Subscription state as tracked on a customer record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription status as reported by the billing provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Subscription is active and current.
    Active,

    /// Subscription is in its trial period.
    Trialing,

    /// Payment is past due, provider is retrying.
    PastDue,

    /// Subscription is canceled.
    Canceled,

    /// Initial payment incomplete.
    Incomplete,

    /// Initial payment never completed.
    IncompleteExpired,

    /// Retries exhausted, invoice left unpaid.
    Unpaid,

    /// Subscription is paused.
    Paused,

    /// Status string the provider added after this was written.
    Unknown,
}

impl SubscriptionStatus {
    /// Maps the provider's status string.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "active" => SubscriptionStatus::Active,
            "trialing" => SubscriptionStatus::Trialing,
            "past_due" => SubscriptionStatus::PastDue,
            "canceled" => SubscriptionStatus::Canceled,
            "incomplete" => SubscriptionStatus::Incomplete,
            "incomplete_expired" => SubscriptionStatus::IncompleteExpired,
            "unpaid" => SubscriptionStatus::Unpaid,
            "paused" => SubscriptionStatus::Paused,
            _ => SubscriptionStatus::Unknown,
        }
    }

    /// The provider's wire name, used for list filters.
    pub fn as_provider_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Unknown => "unknown",
        }
    }

    /// Check if the subscription currently grants access.
    pub fn has_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing | SubscriptionStatus::PastDue
        )
    }
}

/// The customer's current subscription, if any.
///
/// `subscription_expire` stays set once a subscription has ever been paid
/// for; checkout uses its absence to decide trial eligibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSubscription {
    pub subscription_id: Option<String>,
    pub status: Option<SubscriptionStatus>,
    pub subscription_expire: Option<DateTime<Utc>>,
}

impl ActiveSubscription {
    /// Whether no subscription has ever recorded an expiry.
    pub fn never_expired(&self) -> bool {
        self.subscription_expire.is_none()
    }
}

/// Free-trial state of a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeTrial {
    pub eligible: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Whether `id` has the shape of a provider object id (`sub_...`, `cs_test_...`).
///
/// Ids end up as URL path segments, so only ASCII letters, digits and `_`
/// are accepted.
pub fn is_provider_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_ids_are_single_safe_segments() {
        assert!(is_provider_id("sub_1PqR2sT3"));
        assert!(is_provider_id("cs_test_a1B2c3"));

        assert!(!is_provider_id(""));
        assert!(!is_provider_id(".."));
        assert!(!is_provider_id("sub_1/../../customers"));
        assert!(!is_provider_id("sub_1?expand[]=customer"));
        assert!(!is_provider_id("sub_1%2F"));
        assert!(!is_provider_id("sub 1"));
    }

    #[test]
    fn maps_provider_status_strings() {
        assert_eq!(SubscriptionStatus::from_provider("active"), SubscriptionStatus::Active);
        assert_eq!(SubscriptionStatus::from_provider("trialing"), SubscriptionStatus::Trialing);
        assert_eq!(SubscriptionStatus::from_provider("unpaid"), SubscriptionStatus::Unpaid);
        assert_eq!(SubscriptionStatus::from_provider("brand_new"), SubscriptionStatus::Unknown);
    }

    #[test]
    fn provider_str_matches_parse() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Canceled,
            SubscriptionStatus::IncompleteExpired,
        ] {
            assert_eq!(SubscriptionStatus::from_provider(status.as_provider_str()), status);
        }
    }

    #[test]
    fn access_checks() {
        assert!(SubscriptionStatus::Active.has_access());
        assert!(SubscriptionStatus::Trialing.has_access());
        assert!(SubscriptionStatus::PastDue.has_access());
        assert!(!SubscriptionStatus::Canceled.has_access());
        assert!(!SubscriptionStatus::Unpaid.has_access());
    }

    #[test]
    fn active_subscription_serializes_camel_case() {
        let sub = ActiveSubscription {
            subscription_id: Some("sub_1".to_string()),
            status: Some(SubscriptionStatus::PastDue),
            subscription_expire: None,
        };
        let json = serde_json::to_value(&sub).unwrap();
        assert_eq!(json["subscriptionId"], "sub_1");
        assert_eq!(json["status"], "past_due");
        assert!(json["subscriptionExpire"].is_null());
    }
}
