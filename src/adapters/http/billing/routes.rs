//! Axum router configuration for billing endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    cancel_trial, create_checkout_session, create_customer, customer_portal,
    get_checkout_session, get_subscriber_me, list_prices, list_subscriptions, stripe_webhook,
    update_subscription_plan, BillingAppState,
};

/// Create the billing API router.
///
/// # Routes
///
/// ## User Endpoints (require authentication)
/// - `GET /portal` - Customer portal session
/// - `GET /subscriptions/me` - Locally recorded subscription state
/// - `POST /customer` - Get or create the provider customer
/// - `POST /checkout-sessions` - Start a subscription checkout
/// - `GET /checkout-sessions?sessionId=` - Retrieve a checkout session
/// - `POST /subscriptions/update` - Toggle cancellation at period end
/// - `GET /subscriptions?status=` - Provider subscriptions
/// - `POST /trial/cancel` - Cancel the open trial
///
/// ## Public Endpoints
/// - `GET /prices?activeProduct=` - Recurring prices
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/portal", get(customer_portal))
        .route("/subscriptions/me", get(get_subscriber_me))
        .route("/customer", post(create_customer))
        .route(
            "/checkout-sessions",
            post(create_checkout_session).get(get_checkout_session),
        )
        .route("/prices", get(list_prices))
        .route("/subscriptions/update", post(update_subscription_plan))
        .route("/subscriptions", get(list_subscriptions))
        .route("/trial/cancel", post(cancel_trial))
}

/// Create the Stripe webhook router.
///
/// Separate from the user routes because webhooks carry no user identity;
/// they are verified via signature.
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new().route("/webhook", post(stripe_webhook))
}

/// Create the complete billing router, suitable for mounting at `/billing`.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .nest("/billing", billing_router())
///     .with_state(state);
/// ```
pub fn billing_router() -> Router<BillingAppState> {
    billing_routes().merge(webhook_routes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::middleware;
    use axum::response::Response;
    use tower::ServiceExt;

    use crate::adapters::http::middleware::header_auth_middleware;
    use crate::adapters::memory::InMemoryCustomerRepository;
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::application::handlers::billing::BillingSettings;
    use crate::domain::billing::SubscriptionStatus;
    use crate::ports::{PaymentError, Product};

    struct TestApp {
        router: Router,
        provider: Arc<MockPaymentProvider>,
    }

    fn test_app_with(provider: MockPaymentProvider) -> TestApp {
        let provider = Arc::new(provider);
        let state = BillingAppState::new(
            Arc::new(InMemoryCustomerRepository::new()),
            provider.clone(),
            BillingSettings::new("https://app.example.com", 7),
        );

        let router = Router::new()
            .nest("/billing", billing_router())
            .layer(middleware::from_fn(header_auth_middleware))
            .with_state(state);

        TestApp { router, provider }
    }

    fn test_app() -> TestApp {
        test_app_with(MockPaymentProvider::new())
    }

    fn get_as(uri: &str, user: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("X-User-Id", user)
            .header("X-User-Email", format!("{}@example.com", user))
            .body(Body::empty())
            .unwrap()
    }

    fn post_json_as(uri: &str, user: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("X-User-Id", user)
            .header("X-User-Email", format!("{}@example.com", user))
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Provider customer id of `user`, creating it through the API.
    async fn customer_of(app: &TestApp, user: &str) -> String {
        let response = app
            .router
            .clone()
            .oneshot(post_json_as("/billing/customer", user, serde_json::json!({})))
            .await
            .unwrap();
        let body = json_body(response).await;
        body["customer"]["customerStripeId"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn portal_without_customer_is_400() {
        let app = test_app();

        let response = app
            .router
            .oneshot(get_as("/billing/portal", "alice"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["status"], 400);
        assert_eq!(body["message"], "customer not found");
    }

    #[tokio::test]
    async fn portal_after_customer_creation_returns_session() {
        let app = test_app();

        let response = app
            .router
            .clone()
            .oneshot(post_json_as("/billing/customer", "alice", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["customer"]["customerStripeId"]
            .as_str()
            .unwrap()
            .starts_with("cus_"));

        let response = app
            .router
            .oneshot(get_as("/billing/portal", "alice"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], 200);
        assert!(body["session"]["url"].is_string());
    }

    #[tokio::test]
    async fn unauthenticated_request_is_401() {
        let app = test_app();

        let response = app
            .router
            .oneshot(
                Request::builder()
                    .uri("/billing/subscriptions/me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn subscriber_me_is_null_without_record() {
        let app = test_app();

        let response = app
            .router
            .oneshot(get_as("/billing/subscriptions/me", "bob"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["subscriptions"].is_null());
    }

    #[tokio::test]
    async fn checkout_for_new_customer_includes_trial() {
        let app = test_app();

        let response = app
            .router
            .oneshot(post_json_as(
                "/billing/checkout-sessions",
                "carol",
                serde_json::json!({"priceId": "price_monthly"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["session"]["url"].is_string());

        let call = app
            .provider
            .calls()
            .into_iter()
            .find(|c| c.method == "create_checkout_session")
            .unwrap();
        assert_eq!(call.args[1], "price_monthly");
        assert_eq!(call.args[2], "Some(7)");
    }

    #[tokio::test]
    async fn checkout_without_price_creates_no_customer() {
        let app = test_app();

        let response = app
            .router
            .clone()
            .oneshot(post_json_as(
                "/billing/checkout-sessions",
                "carol",
                serde_json::json!({"priceId": "  "}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["message"], "priceId is required");
        assert_eq!(app.provider.call_count("create_customer"), 0);
        assert_eq!(app.provider.call_count("find_customer_by_user_id"), 0);

        let response = app
            .router
            .oneshot(get_as("/billing/subscriptions/me", "carol"))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert!(body["subscriptions"].is_null());
    }

    #[tokio::test]
    async fn checkout_session_of_another_user_is_400() {
        let app = test_app();
        let response = app
            .router
            .clone()
            .oneshot(post_json_as(
                "/billing/checkout-sessions",
                "alice",
                serde_json::json!({"priceId": "price_monthly"}),
            ))
            .await
            .unwrap();
        let session_id = json_body(response).await["session"]["id"]
            .as_str()
            .unwrap()
            .to_string();
        customer_of(&app, "bob").await;

        let uri = format!("/billing/checkout-sessions?sessionId={}", session_id);
        let response = app.router.clone().oneshot(get_as(&uri, "bob")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "checkout session not found");

        let response = app.router.oneshot(get_as(&uri, "alice")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn checkout_session_lookup_unknown_is_400() {
        let app = test_app();

        let response = app
            .router
            .oneshot(get_as("/billing/checkout-sessions?sessionId=cs_nope", "dave"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["message"], "checkout session not found");
    }

    #[tokio::test]
    async fn prices_default_to_active_products() {
        let app = test_app();
        app.provider.set_prices(vec![
            MockPaymentProvider::price(
                "price_live",
                Product {
                    id: "prod_live".to_string(),
                    name: Some("Pro".to_string()),
                    active: true,
                },
            ),
            MockPaymentProvider::price(
                "price_archived",
                Product {
                    id: "prod_old".to_string(),
                    name: None,
                    active: false,
                },
            ),
        ]);

        let response = app
            .router
            .oneshot(Request::builder().uri("/billing/prices").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let prices = body["prices"].as_array().unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0]["id"], "price_live");
        assert_eq!(app.provider.calls()[0].args[0], "true");
    }

    #[tokio::test]
    async fn prices_with_invalid_flag_is_400() {
        let app = test_app();

        let response = app
            .router
            .oneshot(
                Request::builder()
                    .uri("/billing/prices?activeProduct=perhaps")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_subscription_passes_bool_flag() {
        let app = test_app();
        let customer_id = customer_of(&app, "erin").await;
        app.provider.add_subscription(MockPaymentProvider::subscription(
            "sub_1",
            &customer_id,
            SubscriptionStatus::Active,
        ));

        let response = app
            .router
            .oneshot(post_json_as(
                "/billing/subscriptions/update",
                "erin",
                serde_json::json!({"subscriptionId": "sub_1", "bool": true}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["subscription"]["cancelAtPeriodEnd"], true);
    }

    #[tokio::test]
    async fn update_of_another_users_subscription_is_400() {
        let app = test_app();
        let alice = customer_of(&app, "alice").await;
        customer_of(&app, "bob").await;
        app.provider.add_subscription(MockPaymentProvider::subscription(
            "sub_alice",
            &alice,
            SubscriptionStatus::Active,
        ));

        let response = app
            .router
            .oneshot(post_json_as(
                "/billing/subscriptions/update",
                "bob",
                serde_json::json!({"subscriptionId": "sub_alice", "bool": true}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "subscription not found");
        assert_eq!(app.provider.call_count("update_subscription"), 0);
    }

    #[tokio::test]
    async fn update_with_path_like_subscription_id_is_400() {
        let app = test_app();
        customer_of(&app, "erin").await;

        let response = app
            .router
            .oneshot(post_json_as(
                "/billing/subscriptions/update",
                "erin",
                serde_json::json!({"subscriptionId": "../customers/cus_1", "bool": true}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "subscriptionId is invalid");
        assert!(!app.provider.was_called("get_subscription"));
    }

    #[tokio::test]
    async fn list_subscriptions_without_customer_is_empty() {
        let app = test_app();

        let response = app
            .router
            .oneshot(get_as("/billing/subscriptions?status=active", "frank"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["subscriptions"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn trial_cancel_without_trial_is_400() {
        let app = test_app();

        let response = app
            .router
            .oneshot(post_json_as("/billing/trial/cancel", "gina", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["message"], "trial canceling failed");
    }

    #[tokio::test]
    async fn provider_failure_is_generic_500() {
        let app = test_app();
        app.provider
            .set_method_error("create_customer", PaymentError::network("connection reset"));

        let response = app
            .router
            .oneshot(post_json_as("/billing/customer", "hank", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Internal Server Error");
    }

    #[tokio::test]
    async fn webhook_without_signature_is_400() {
        let app = test_app();

        let response = app
            .router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/billing/webhook")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Webhook signature verification failed.");
        assert!(!app.provider.was_called("verify_webhook"));
    }

    #[tokio::test]
    async fn webhook_rejected_by_provider_is_400() {
        let app = test_app_with(MockPaymentProvider::rejecting_webhooks());

        let response = app
            .router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/billing/webhook")
                    .header("Stripe-Signature", "t=1,v1=00")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_accepted_acknowledges_receipt() {
        let app = test_app();
        let payload = serde_json::json!({
            "id": "evt_1",
            "type": "customer.created",
            "created": 1704067200,
            "data": { "object": { "id": "cus_1" } }
        });

        let response = app
            .router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/billing/webhook")
                    .header("Stripe-Signature", "t=1,v1=00")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({"received": true}));
    }
}
