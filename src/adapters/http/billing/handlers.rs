//! HTTP handlers for billing endpoints.
//!
//! These handlers connect Axum routes to the `BillingService` facade.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::billing::{
    dispatch_webhook_event, BillingService, BillingSettings, CreateCheckoutCommand,
};
use crate::domain::billing::BillingError;
use crate::ports::{CustomerRepository, PaymentEventHandler, PaymentProvider};

use super::dto::{
    CheckoutSessionQuery, CheckoutSessionResponse, CreateCheckoutSessionRequest, CustomerResponse,
    ErrorResponse, MessageResponse, PortalResponse, PricesQuery, PricesResponse,
    SubscriberMeResponse, SubscriptionResponse, SubscriptionsQuery, SubscriptionsResponse,
    UpdateSubscriptionRequest, WebhookReceivedResponse,
};

/// Header carrying the provider's webhook signature.
pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

const OK: u16 = 200;

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned per request; every dependency is behind an `Arc`.
#[derive(Clone)]
pub struct BillingAppState {
    pub customer_repository: Arc<dyn CustomerRepository>,
    pub payment_provider: Arc<dyn PaymentProvider>,
    /// Receives verified invoice webhooks.
    pub payment_events: Arc<dyn PaymentEventHandler>,
    pub settings: BillingSettings,
}

impl BillingAppState {
    /// State whose webhook reactions are handled by a `BillingService` over
    /// the same repository and provider.
    pub fn new(
        customer_repository: Arc<dyn CustomerRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
        settings: BillingSettings,
    ) -> Self {
        let payment_events: Arc<dyn PaymentEventHandler> = Arc::new(BillingService::new(
            customer_repository.clone(),
            payment_provider.clone(),
            settings.clone(),
        ));

        Self {
            customer_repository,
            payment_provider,
            payment_events,
            settings,
        }
    }

    pub fn with_payment_events(mut self, handler: Arc<dyn PaymentEventHandler>) -> Self {
        self.payment_events = handler;
        self
    }

    /// Create the facade on demand from the shared state.
    pub fn billing_service(&self) -> BillingService {
        BillingService::new(
            self.customer_repository.clone(),
            self.payment_provider.clone(),
            self.settings.clone(),
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Customer & Portal
// ════════════════════════════════════════════════════════════════════════════════

/// GET /billing/portal - Customer portal session for the caller
pub async fn customer_portal(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, BillingApiError> {
    let session = state
        .billing_service()
        .create_portal_session(&user.id)
        .await?;

    Ok(Json(PortalResponse {
        status: OK,
        session,
    }))
}

/// GET /billing/subscriptions/me - Locally recorded subscription state
pub async fn get_subscriber_me(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, BillingApiError> {
    let subscriptions = state.billing_service().get_subscriber_me(&user.id).await?;

    Ok(Json(SubscriberMeResponse {
        status: OK,
        subscriptions,
    }))
}

/// POST /billing/customer - Get or create the caller's provider customer
pub async fn create_customer(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, BillingApiError> {
    let customer = state.billing_service().stripe_customer(&user).await?;

    Ok(Json(CustomerResponse {
        status: OK,
        customer,
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Checkout & Prices
// ════════════════════════════════════════════════════════════════════════════════

/// POST /billing/checkout-sessions - Start a subscription checkout
///
/// The trial is offered only to customers that never had a paid period.
pub async fn create_checkout_session(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<CreateCheckoutSessionRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    // Checked before get-or-create so a bad request leaves no provider customer.
    if request.price_id.trim().is_empty() {
        return Err(BillingError::validation("priceId", "priceId is required").into());
    }

    let service = state.billing_service();
    let customer = service.stripe_customer(&user).await?;

    let cmd = CreateCheckoutCommand {
        trial_eligible: customer.trial_eligible_for_checkout(),
        customer_id: customer.customer_stripe_id,
        price_id: request.price_id,
        success_url: request.success_url,
        cancel_url: request.cancel_url,
    };

    let session = service.create_checkout_session(cmd).await?;

    Ok(Json(CheckoutSessionResponse {
        status: OK,
        session,
    }))
}

/// GET /billing/checkout-sessions?sessionId= - Retrieve a checkout session
pub async fn get_checkout_session(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<CheckoutSessionQuery>,
) -> Result<impl IntoResponse, BillingApiError> {
    let session = state
        .billing_service()
        .checkout_session(&user.id, &query.session_id)
        .await?;

    Ok(Json(CheckoutSessionResponse {
        status: OK,
        session,
    }))
}

/// GET /billing/prices?activeProduct= - Recurring prices
pub async fn list_prices(
    State(state): State<BillingAppState>,
    Query(query): Query<PricesQuery>,
) -> Result<impl IntoResponse, BillingApiError> {
    let active_product = query.active_product()?;
    let prices = state.billing_service().list_prices(active_product).await?;

    Ok(Json(PricesResponse { status: OK, prices }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscriptions
// ════════════════════════════════════════════════════════════════════════════════

/// POST /billing/subscriptions/update - Toggle cancellation at period end
pub async fn update_subscription_plan(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<UpdateSubscriptionRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let subscription = state
        .billing_service()
        .update_subscription_plan(
            &user.id,
            &request.subscription_id,
            request.cancel_at_period_end,
        )
        .await?;

    Ok(Json(SubscriptionResponse {
        status: OK,
        subscription,
    }))
}

/// GET /billing/subscriptions?status= - Provider subscriptions of the caller
pub async fn list_subscriptions(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<SubscriptionsQuery>,
) -> Result<impl IntoResponse, BillingApiError> {
    let status = query.status_filter()?;
    let subscriptions = state
        .billing_service()
        .get_subscriptions(&user.id, status)
        .await?;

    Ok(Json(SubscriptionsResponse {
        status: OK,
        subscriptions,
    }))
}

/// POST /billing/trial/cancel - Cancel the caller's open trial
pub async fn cancel_trial(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, BillingApiError> {
    state.billing_service().handle_trial_end(&user.id).await?;

    Ok(Json(MessageResponse {
        status: OK,
        message: "trial cancelled".to_string(),
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook
// ════════════════════════════════════════════════════════════════════════════════

/// POST /billing/webhook - Receive Stripe events
///
/// Acknowledges as soon as the event is verified; the payment handlers run
/// in the background.
pub async fn stripe_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, BillingApiError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Webhook without Stripe-Signature header");
            BillingError::InvalidWebhookSignature
        })?;

    let event = state
        .payment_provider
        .verify_webhook(&body, signature)
        .await
        .map_err(BillingError::from)?;

    // Not awaited: the provider only needs the acknowledgement.
    let _ = dispatch_webhook_event(state.payment_events.clone(), event);

    Ok(Json(WebhookReceivedResponse { received: true }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub struct BillingApiError(BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl From<crate::domain::foundation::DomainError> for BillingApiError {
    fn from(err: crate::domain::foundation::DomainError) -> Self {
        Self(BillingError::from(err))
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = if self.0.is_precondition_failure() {
            let message = match &self.0 {
                BillingError::ValidationFailed { message, .. } => message.clone(),
                other => other.to_string(),
            };
            (StatusCode::BAD_REQUEST, message)
        } else {
            tracing::error!(error = %self.0, "Billing request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            )
        };

        let body = ErrorResponse::new(status.as_u16(), message);
        (status, Json(body)).into_response()
    }
}
