//! End-to-end API flows over the in-memory database
//!
//! Drives the real router with `tower::ServiceExt::oneshot`; the payment
//! processor is a scripted in-process provider.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use shop_server::api;
use shop_server::auth::{JwtConfig, JwtService};
use shop_server::core::{Config, ServerState};
use shop_server::db::DbService;
use shop_server::payment::{
    PaymentError, PaymentLineItem, PaymentProvider, PaymentSession, PaymentStatus,
};

// =============================================================================
// Scripted payment provider
// =============================================================================

#[derive(Default)]
struct MockState {
    counter: u32,
    statuses: HashMap<String, PaymentStatus>,
    last_items: Vec<PaymentLineItem>,
}

#[derive(Clone, Default)]
struct MockPayment {
    inner: Arc<Mutex<MockState>>,
}

impl MockPayment {
    fn set_status(&self, session_id: &str, status: PaymentStatus) {
        self.inner
            .lock()
            .unwrap()
            .statuses
            .insert(session_id.to_string(), status);
    }

    fn last_items(&self) -> Vec<PaymentLineItem> {
        self.inner.lock().unwrap().last_items.clone()
    }
}

#[async_trait]
impl PaymentProvider for MockPayment {
    async fn create_session(
        &self,
        items: &[PaymentLineItem],
    ) -> Result<PaymentSession, PaymentError> {
        let mut state = self.inner.lock().unwrap();
        state.counter += 1;
        let id = format!("cs_test_{}", state.counter);
        state.statuses.insert(id.clone(), PaymentStatus::Unpaid);
        state.last_items = items.to_vec();
        Ok(PaymentSession {
            id: id.clone(),
            url: format!("https://checkout.test/pay/{id}"),
        })
    }

    async fn session_status(&self, session_id: &str) -> Result<PaymentStatus, PaymentError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .statuses
            .get(session_id)
            .copied()
            .unwrap_or(PaymentStatus::Unpaid))
    }
}

// =============================================================================
// Harness
// =============================================================================

fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "integration-test-secret-key-32-bytes-min".to_string(),
        expiration_minutes: 60,
        issuer: "shop-server".to_string(),
        audience: "shop-clients".to_string(),
    }
}

async fn test_app() -> (Router, MockPayment) {
    let db = DbService::memory().await.expect("in-memory db").db;
    let payment = MockPayment::default();

    let config = Config {
        work_dir: "/tmp/shop-test".to_string(),
        http_port: 0,
        jwt: jwt_config(),
        environment: "test".to_string(),
        stripe_secret_key: "sk_test_unused".to_string(),
        client_url: "http://localhost:5173".to_string(),
        allowed_origins: vec!["http://localhost:5173".to_string()],
    };

    let state = ServerState::with_parts(
        config,
        db,
        Arc::new(JwtService::with_config(jwt_config())),
        Arc::new(payment.clone()),
    );

    (api::build_router(state), payment)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Register + login; returns (token, user_id)
async fn login_as(app: &Router, email: &str, password: &str, admin: bool) -> (String, String) {
    let (status, _) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"email": email, "password": password, "isAdmin": admin})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": email, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

async fn seed_product(app: &Router, admin_token: &str, name: &str, price: &str, stock: u32) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/products",
        Some(admin_token),
        Some(json!({
            "name": name,
            "price": price,
            "description": "integration seed",
            "image": "http://img.test/p.png",
            "category": "misc",
            "stock": stock,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "seed product failed: {body}");
    body["id"].as_str().unwrap().to_string()
}

async fn stock_of(app: &Router, product_id: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::GET,
        &format!("/api/products/{product_id}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["stock"].as_i64().unwrap()
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn register_rejects_duplicates_and_login_verifies_credentials() {
    let (app, _) = test_app().await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"email": "a@x.com", "password": "hunter22"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Same email again
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"email": "a@x.com", "password": "other-pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User already exists");

    // Wrong password
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "a@x.com", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid credentials");

    // Correct password: token decodes back to the registered user id
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "a@x.com", "password": "hunter22"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap();
    let user_id = body["user"]["id"].as_str().unwrap();

    let claims = JwtService::with_config(jwt_config())
        .validate_token(token)
        .expect("token must validate");
    assert_eq!(claims.sub, user_id);
}

#[tokio::test]
async fn missing_fields_are_a_400() {
    let (app, _) = test_app().await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"email": "a@x.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn protected_routes_reject_missing_and_garbage_tokens() {
    let (app, _) = test_app().await;

    let (status, _) = send(&app, Method::GET, "/api/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/api/cart", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn product_mutations_are_admin_gated() {
    let (app, _) = test_app().await;
    let (admin, _) = login_as(&app, "admin@x.com", "adminpw1", true).await;
    let (user, _) = login_as(&app, "user@x.com", "userpw11", false).await;

    // Non-admin create → 403
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/products",
        Some(&user),
        Some(json!({
            "name": "Widget", "price": "9.99", "description": "d",
            "image": "http://img/x.png", "category": "c", "stock": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let id = seed_product(&app, &admin, "Widget", "9.99", 3).await;

    // Public reads need no token
    let (status, body) = send(&app, Method::GET, "/api/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    // Admin partial update
    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/products/{id}"),
        Some(&admin),
        Some(json!({"stock": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock"], 10);
    assert_eq!(body["name"], "Widget");

    // Non-admin delete → 403, admin delete → gone
    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/products/{id}"),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/products/{id}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, &format!("/api/products/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Cart
// =============================================================================

#[tokio::test]
async fn cart_merges_lines_and_removals_are_idempotent() {
    let (app, _) = test_app().await;
    let (admin, _) = login_as(&app, "admin@x.com", "adminpw1", true).await;
    let (user, _) = login_as(&app, "shopper@x.com", "shopper1", false).await;
    let p1 = seed_product(&app, &admin, "Widget", "9.99", 10).await;

    // First read persists an empty cart
    let (status, body) = send(&app, Method::GET, "/api/cart", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["items"].as_array().unwrap().is_empty());

    // Same product twice → one merged line
    for _ in 0..2 {
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/cart",
            Some(&user),
            Some(json!({"productId": p1, "quantity": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = send(&app, Method::GET, "/api/cart", Some(&user), None).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 4);
    assert_eq!(items[0]["product"]["name"], "Widget");

    // Removing an absent product is a no-op, not an error
    let (status, body) = send(
        &app,
        Method::DELETE,
        "/api/cart/product:does-not-exist",
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    // Removing the real line empties the cart
    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/cart/{p1}"),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn cart_rejects_unknown_products_and_zero_quantities() {
    let (app, _) = test_app().await;
    let (user, _) = login_as(&app, "shopper@x.com", "shopper1", false).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/cart",
        Some(&user),
        Some(json!({"productId": "product:nope", "quantity": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/cart",
        Some(&user),
        Some(json!({"productId": "product:nope", "quantity": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Direct orders
// =============================================================================

#[tokio::test]
async fn direct_orders_reserve_stock_all_or_nothing() {
    let (app, _) = test_app().await;
    let (admin, _) = login_as(&app, "admin@x.com", "adminpw1", true).await;
    let (user, _) = login_as(&app, "buyer@x.com", "buyerpw1", false).await;
    let p1 = seed_product(&app, &admin, "Widget", "10.00", 5).await;

    // 3 of 5 succeeds
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&user),
        Some(json!({"items": [{"productId": p1, "quantity": 3}]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "Pending");
    assert_eq!(body["totalAmount"], "30.00");
    assert_eq!(stock_of(&app, &p1).await, 2);

    // Another 3 exceeds the remaining 2: stock error names the product,
    // stock unchanged
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&user),
        Some(json!({"items": [{"productId": p1, "quantity": 3}]})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(
        body["message"].as_str().unwrap().contains("Widget"),
        "stock error must name the product: {body}"
    );
    assert_eq!(stock_of(&app, &p1).await, 2);

    // Listing shows the single order, materialized
    let (status, body) = send(&app, Method::GET, "/api/orders", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    let orders = body.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["items"][0]["product"]["name"], "Widget");
}

#[tokio::test]
async fn empty_and_unknown_orders_are_rejected() {
    let (app, _) = test_app().await;
    let (user, _) = login_as(&app, "buyer@x.com", "buyerpw1", false).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&user),
        Some(json!({"items": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Order must contain items");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&user),
        Some(json!({"items": [{"productId": "product:ghost", "quantity": 1}]})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_status_endpoint_only_cancels_pending_orders() {
    let (app, _) = test_app().await;
    let (admin, _) = login_as(&app, "admin@x.com", "adminpw1", true).await;
    let (user, _) = login_as(&app, "buyer@x.com", "buyerpw1", false).await;
    let p1 = seed_product(&app, &admin, "Widget", "10.00", 5).await;

    let (_, body) = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&user),
        Some(json!({"items": [{"productId": p1, "quantity": 1}]})),
    )
    .await;
    let order_id = body["id"].as_str().unwrap().to_string();

    // Non-admin → 403
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/orders/{order_id}"),
        Some(&user),
        Some(json!({"status": "Cancelled"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Admin may not mint Paid orders
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/orders/{order_id}"),
        Some(&admin),
        Some(json!({"status": "Paid"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Pending -> Cancelled works; terminal state then rejects updates
    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/orders/{order_id}"),
        Some(&admin),
        Some(json!({"status": "Cancelled"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Cancelled");

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/orders/{order_id}"),
        Some(&admin),
        Some(json!({"status": "Pending"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Admin listing sees the order
    let (status, body) = send(&app, Method::GET, "/api/orders/all", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    // Non-admin listing of /all → 403
    let (status, _) = send(&app, Method::GET, "/api/orders/all", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// =============================================================================
// Checkout + confirmation
// =============================================================================

#[tokio::test]
async fn checkout_snapshots_prices_and_clears_the_cart() {
    let (app, payment) = test_app().await;
    let (admin, _) = login_as(&app, "admin@x.com", "adminpw1", true).await;
    let (user, user_id) = login_as(&app, "buyer@x.com", "buyerpw1", false).await;
    let p1 = seed_product(&app, &admin, "Widget", "19.99", 5).await;

    // Shopper builds a cart first
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/cart",
        Some(&user),
        Some(json!({"productId": p1, "quantity": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/checkout",
        None,
        Some(json!({
            "items": [{"productId": p1, "quantity": 2}],
            "userId": user_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "checkout failed: {body}");
    assert!(
        body["redirectUrl"]
            .as_str()
            .unwrap()
            .starts_with("https://checkout.test/")
    );

    // Cart is consumed by checkout
    let (_, body) = send(&app, Method::GET, "/api/cart", Some(&user), None).await;
    assert!(body["items"].as_array().unwrap().is_empty());

    // The order total matches the line items sent to the processor exactly
    let (_, body) = send(&app, Method::GET, "/api/orders", Some(&user), None).await;
    let order = &body.as_array().unwrap()[0];
    assert_eq!(order["status"], "Pending");
    assert_eq!(order["totalAmount"], "39.98");

    let charged: i64 = payment
        .last_items()
        .iter()
        .map(|i| i.unit_amount * i64::from(i.quantity))
        .sum();
    assert_eq!(charged, 3998);

    // Stock untouched until confirmation
    assert_eq!(stock_of(&app, &p1).await, 5);
}

#[tokio::test]
async fn confirmation_is_idempotent_and_gated_on_payment_status() {
    let (app, payment) = test_app().await;
    let (admin, _) = login_as(&app, "admin@x.com", "adminpw1", true).await;
    let (_, user_id) = login_as(&app, "buyer@x.com", "buyerpw1", false).await;
    let p1 = seed_product(&app, &admin, "Widget", "19.99", 5).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/checkout",
        None,
        Some(json!({
            "items": [{"productId": p1, "quantity": 2}],
            "userId": user_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = "cs_test_1";

    // Unpaid session → 400, nothing mutated
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/checkout/confirm-payment",
        None,
        Some(json!({"sessionId": session_id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(stock_of(&app, &p1).await, 5);

    // Paid → stock decremented, order Paid
    payment.set_status(session_id, PaymentStatus::Paid);
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/checkout/confirm-payment",
        None,
        Some(json!({"sessionId": session_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "confirm failed: {body}");
    assert_eq!(body["success"], true);
    assert_eq!(stock_of(&app, &p1).await, 3);

    // Re-confirming the same session decrements exactly once
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/checkout/confirm-payment",
        None,
        Some(json!({"sessionId": session_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(stock_of(&app, &p1).await, 3);
}

#[tokio::test]
async fn confirmation_handles_unknown_sessions_and_deleted_products() {
    let (app, payment) = test_app().await;
    let (admin, _) = login_as(&app, "admin@x.com", "adminpw1", true).await;
    let (_, user_id) = login_as(&app, "buyer@x.com", "buyerpw1", false).await;
    let p1 = seed_product(&app, &admin, "Widget", "5.00", 5).await;
    let p2 = seed_product(&app, &admin, "Gadget", "7.00", 5).await;

    // Paid session with no recorded order → 404
    payment.set_status("cs_test_void", PaymentStatus::Paid);
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/checkout/confirm-payment",
        None,
        Some(json!({"sessionId": "cs_test_void"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Checkout both products, then delete one before confirmation
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/checkout",
        None,
        Some(json!({
            "items": [
                {"productId": p1, "quantity": 1},
                {"productId": p2, "quantity": 2},
            ],
            "userId": user_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/products/{p1}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Confirmation still succeeds; the deleted line is skipped, the
    // surviving line is applied
    payment.set_status("cs_test_1", PaymentStatus::Paid);
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/checkout/confirm-payment",
        None,
        Some(json!({"sessionId": "cs_test_1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "confirm failed: {body}");
    assert_eq!(body["success"], true);
    assert_eq!(stock_of(&app, &p2).await, 3);
}

// =============================================================================
// Profile + health
// =============================================================================

#[tokio::test]
async fn profile_returns_the_authenticated_user_without_credentials() {
    let (app, _) = test_app().await;
    let (token, user_id) = login_as(&app, "me@x.com", "mypw1234", false).await;

    let (status, body) = send(&app, Method::GET, "/api/user", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user_id.as_str());
    assert_eq!(body["email"], "me@x.com");
    assert_eq!(body["isAdmin"], false);
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn health_reports_database_status_without_auth() {
    let (app, _) = test_app().await;
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn checkout_requires_a_user_and_known_products() {
    let (app, _) = test_app().await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/checkout",
        None,
        Some(json!({"items": [{"productId": "product:x", "quantity": 1}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/checkout",
        None,
        Some(json!({
            "items": [{"productId": "product:ghost", "quantity": 1}],
            "userId": "user:someone",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/checkout/confirm-payment",
        None,
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
