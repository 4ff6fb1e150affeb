//! Test utilities and fixtures for Brokerdesk integration tests

#![allow(dead_code)]

use std::sync::Arc;

pub use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
pub use serde_json::{Value, json};
pub use tower::ServiceExt;

pub use brokerdesk::config::RateLimitConfig;
pub use brokerdesk::db::{AppState, create_memory_pool, init_db, queries};
pub use brokerdesk::email::EmailService;
pub use brokerdesk::feed::ChangeFeed;
pub use brokerdesk::handlers::app_router;
pub use brokerdesk::icons::IconSuggester;
pub use brokerdesk::jwt::SessionKeys;
pub use brokerdesk::models::*;
pub use brokerdesk::payments::StripeClient;

pub const TEST_PASSWORD: &str = "correct-horse-battery";
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Create an AppState over a fresh in-memory database, with no email,
/// payment or AI credentials.
pub fn create_test_app_state() -> AppState {
    let pool = create_memory_pool().unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        base_url: "http://localhost:3000".to_string(),
        sessions: Arc::new(SessionKeys::new(b"test-session-secret", 24)),
        email_service: Arc::new(EmailService::new(None, "test@example.com".to_string())),
        stripe: None,
        icons: Arc::new(IconSuggester::offline()),
        feed: ChangeFeed::new(),
        invite_expiry_days: 7,
    }
}

/// Same as [`create_test_app_state`] but with a Stripe client whose webhook
/// secret is [`TEST_WEBHOOK_SECRET`].
pub fn create_test_app_state_with_stripe() -> AppState {
    AppState {
        stripe: Some(Arc::new(StripeClient::new("sk_test_xxx", TEST_WEBHOOK_SECRET))),
        ..create_test_app_state()
    }
}

/// The full application router with rate limiting disabled.
pub fn test_app(state: &AppState) -> Router {
    app_router(state.clone(), RateLimitConfig::disabled()).with_state(state.clone())
}

/// A user with a live session token.
pub struct TestUser {
    pub account: UserAccount,
    pub token: String,
}

impl TestUser {
    pub fn id(&self) -> &str {
        &self.account.id
    }
}

/// Create a confirmed account without a password and issue it a session.
pub fn create_test_user(state: &AppState, email: &str, role: UserRole) -> TestUser {
    let mut conn = state.db.get().unwrap();
    let account = queries::create_user(
        &mut conn,
        &CreateUser {
            email: email.to_string(),
            password: String::new(),
            full_name: format!("Test User {}", email),
            phone: None,
            role,
            email_confirmed: true,
        },
        None,
    )
    .expect("Failed to create test user");
    let token = state
        .sessions
        .issue(&account.id, &account.email, account.role)
        .expect("Failed to issue session");
    TestUser { account, token }
}

pub fn create_test_client(state: &AppState, email: &str) -> TestUser {
    create_test_user(state, email, UserRole::Client)
}

pub fn create_test_admin(state: &AppState, email: &str) -> TestUser {
    create_test_user(state, email, UserRole::Admin)
}

pub fn create_test_category(state: &AppState, name: &str) -> Category {
    let conn = state.db.get().unwrap();
    queries::create_category(
        &conn,
        &CreateCategory {
            name_en: name.to_string(),
            name_ar: None,
            description_en: None,
            description_ar: None,
            icon: None,
            is_active: true,
        },
        "Folder",
    )
    .expect("Failed to create test category")
}

pub fn create_test_service(state: &AppState, category_id: Option<&str>, price_cents: i64) -> Service {
    let conn = state.db.get().unwrap();
    queries::create_service(
        &conn,
        &CreateService {
            category_id: category_id.map(String::from),
            name_en: "Discovery session".to_string(),
            name_ar: Some("جلسة استكشاف".to_string()),
            description_en: Some("One hour with a consultant".to_string()),
            description_ar: None,
            price_cents,
            currency: "usd".to_string(),
            is_active: true,
        },
    )
    .expect("Failed to create test service")
}

pub fn create_test_package(state: &AppState, service_id: &str, price_cents: i64) -> ServicePackage {
    let conn = state.db.get().unwrap();
    queries::create_package(
        &conn,
        &CreateServicePackage {
            service_id: service_id.to_string(),
            name_en: "Starter".to_string(),
            name_ar: None,
            description_en: None,
            description_ar: None,
            price_cents,
            currency: "usd".to_string(),
            features: vec!["Roadmap".to_string()],
            is_active: true,
        },
    )
    .expect("Failed to create test package")
}

pub fn create_test_appointment(state: &AppState, user: &TestUser, service_id: Option<&str>) -> Appointment {
    let conn = state.db.get().unwrap();
    queries::create_appointment(
        &conn,
        &user.account.id,
        &CreateAppointment {
            service_id: service_id.map(String::from),
            client_name: user.account.full_name.clone(),
            client_email: user.account.email.clone(),
            client_phone: None,
            appointment_date: "2030-01-15".to_string(),
            appointment_time: "10:30".to_string(),
            notes: None,
        },
    )
    .expect("Failed to create test appointment")
}

/// Send a request through the router and decode the response body.
///
/// JSON bodies decode to their value, empty bodies to `Null` and anything
/// else to a string.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    send(app, "GET", uri, token, None).await
}

pub async fn post(app: &Router, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, token, Some(body)).await
}

pub async fn put(app: &Router, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
    send(app, "PUT", uri, token, Some(body)).await
}

pub async fn delete(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    send(app, "DELETE", uri, token, None).await
}

/// Get the current timestamp
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
