//! Payment configuration

use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Longest free trial the service will offer.
const MAX_TRIAL_PERIOD_DAYS: u32 = 730;

/// Payment configuration (Stripe and the billing frontend)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe API key
    pub stripe_api_key: String,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,

    /// Base URL of the frontend; portal and checkout redirects are built from it
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// Free trial length granted on a first checkout
    #[serde(default = "default_trial_period_days")]
    pub trial_period_days: u32,

    /// Reject webhook events whose `livemode` flag is false
    #[serde(default)]
    pub require_livemode: bool,

    /// Override for the Stripe API base URL
    pub api_base_url: Option<String>,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: String::new(),
            stripe_webhook_secret: String::new(),
            frontend_url: default_frontend_url(),
            trial_period_days: default_trial_period_days(),
            require_livemode: false,
            api_base_url: None,
        }
    }
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_live_")
    }

    /// Validate payment configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }

        if !self.stripe_api_key.starts_with("sk_") && !self.stripe_api_key.starts_with("rk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if self.require_livemode && self.is_test_mode() {
            return Err(ValidationError::LivemodeRequiresLiveKey);
        }

        if !self.frontend_url.starts_with("http://") && !self.frontend_url.starts_with("https://")
        {
            return Err(ValidationError::InvalidFrontendUrl);
        }
        if *environment == Environment::Production && !self.frontend_url.starts_with("https://") {
            return Err(ValidationError::FrontendUrlMustBeHttps);
        }

        if self.trial_period_days == 0 || self.trial_period_days > MAX_TRIAL_PERIOD_DAYS {
            return Err(ValidationError::InvalidTrialPeriod);
        }

        Ok(())
    }
}

fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_trial_period_days() -> u32 {
    7
}
