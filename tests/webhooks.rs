//! Stripe webhook receiver: signature checks, replay protection and effects.

mod common;
use common::*;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn compute_stripe_signature(payload: &str, secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

async fn deliver(app: &Router, payload: &Value, secret: &str) -> (StatusCode, Value) {
    let body = payload.to_string();
    let timestamp = now();
    let signature = compute_stripe_signature(&body, secret, timestamp);
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/stripe")
                .header("Content-Type", "application/json")
                .header("Stripe-Signature", format!("t={},v1={}", timestamp, signature))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}

fn event(id: &str, event_type: &str, object: Value) -> Value {
    json!({ "id": id, "type": event_type, "data": { "object": object } })
}

/// A pending payment for a booking, attached to checkout session `session_id`.
fn pending_booking_payment(state: &AppState, user: &TestUser, session_id: &str) -> (Appointment, Payment) {
    let service = create_test_service(state, None, 15_000);
    let appointment = create_test_appointment(state, user, Some(&service.id));
    let conn = state.db.get().unwrap();
    let payment = queries::create_payment(
        &conn,
        &CreatePayment {
            user_id: user.id().to_string(),
            appointment_id: Some(appointment.id.clone()),
            order_id: None,
            amount_cents: 15_000,
            currency: "usd".to_string(),
        },
    )
    .unwrap();
    queries::set_payment_session(&conn, &payment.id, session_id).unwrap();
    (appointment, payment)
}

fn checkout_completed(event_id: &str, session_id: &str, payment: &Payment) -> Value {
    event(
        event_id,
        "checkout.session.completed",
        json!({
            "id": session_id,
            "payment_status": "paid",
            "customer": "cus_test_1",
            "customer_email": "client@example.com",
            "payment_intent": "pi_test_1",
            "client_reference_id": payment.user_id,
            "metadata": { "payment_id": payment.id, "user_id": payment.user_id }
        }),
    )
}

#[tokio::test]
async fn test_unconfigured_stripe_acknowledges() {
    let state = create_test_app_state();
    let app = test_app(&state);

    let payload = event("evt_1", "checkout.session.completed", json!({}));
    let (status, body) = deliver(&app, &payload, "whatever").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Stripe not configured");
}

#[tokio::test]
async fn test_signature_is_required_and_checked() {
    let state = create_test_app_state_with_stripe();
    let app = test_app(&state);
    let payload = event("evt_1", "checkout.session.completed", json!({}));

    let (status, _) = send(&app, "POST", "/webhooks/stripe", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "missing signature header");

    let (status, _) = deliver(&app, &payload, "whsec_wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let conn = state.db.get().unwrap();
    assert!(
        queries::try_record_webhook_event(&conn, "stripe", "evt_1").unwrap(),
        "rejected deliveries must not be recorded"
    );
}

#[tokio::test]
async fn test_unknown_event_is_ignored() {
    let state = create_test_app_state_with_stripe();
    let app = test_app(&state);

    let payload = event("evt_2", "invoice.created", json!({ "id": "in_1" }));
    let (status, body) = deliver(&app, &payload, TEST_WEBHOOK_SECRET).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Event ignored");
}

#[tokio::test]
async fn test_checkout_completed_confirms_booking_once() {
    let state = create_test_app_state_with_stripe();
    let app = test_app(&state);
    let client = create_test_client(&state, "client@example.com");
    let (appointment, payment) = pending_booking_payment(&state, &client, "cs_test_1");
    let mut feed = state.feed.subscribe();

    let payload = checkout_completed("evt_checkout_1", "cs_test_1", &payment);
    let (status, body) = deliver(&app, &payload, TEST_WEBHOOK_SECRET).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body, "OK");

    {
        let conn = state.db.get().unwrap();
        let stored = queries::get_payment(&conn, &payment.id).unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert_eq!(stored.stripe_payment_intent.as_deref(), Some("pi_test_1"));
        let booked = queries::get_appointment(&conn, &appointment.id).unwrap().unwrap();
        assert_eq!(booked.status, AppointmentStatus::Confirmed);
        assert_eq!(
            queries::get_user_id_by_stripe_customer(&conn, "cus_test_1").unwrap().as_deref(),
            Some(client.id())
        );
    }

    // Effects are pushed to the paying user after commit
    let mut kinds = Vec::new();
    while let Ok(change) = feed.try_recv() {
        assert_eq!(change.user_id, client.id());
        kinds.push(change.kind);
    }
    assert!(kinds.contains(&brokerdesk::feed::ChangeKind::Payment));
    assert!(kinds.contains(&brokerdesk::feed::ChangeKind::Notification));

    // Redelivery is acknowledged without repeating side effects
    let (status, body) = deliver(&app, &payload, TEST_WEBHOOK_SECRET).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Already processed");
    assert!(feed.try_recv().is_err());

    let (_, notifications) = get(&app, "/notifications", Some(&client.token)).await;
    let received = notifications
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["title"] == "Payment received")
        .count();
    assert_eq!(received, 1);
}

#[tokio::test]
async fn test_unpaid_checkout_changes_nothing() {
    let state = create_test_app_state_with_stripe();
    let app = test_app(&state);
    let client = create_test_client(&state, "client@example.com");
    let (_, payment) = pending_booking_payment(&state, &client, "cs_test_2");

    let mut payload = checkout_completed("evt_unpaid", "cs_test_2", &payment);
    payload["data"]["object"]["payment_status"] = json!("unpaid");
    let (status, _) = deliver(&app, &payload, TEST_WEBHOOK_SECRET).await;
    assert_eq!(status, StatusCode::OK);

    let conn = state.db.get().unwrap();
    let stored = queries::get_payment(&conn, &payment.id).unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_malformed_event_object_is_rejected_and_not_recorded() {
    let state = create_test_app_state_with_stripe();
    let app = test_app(&state);

    let payload = event("evt_bad", "checkout.session.completed", json!({ "id": 42 }));
    let (status, _) = deliver(&app, &payload, TEST_WEBHOOK_SECRET).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let conn = state.db.get().unwrap();
    assert!(queries::try_record_webhook_event(&conn, "stripe", "evt_bad").unwrap());
}

#[tokio::test]
async fn test_subscription_events_update_mirror() {
    let state = create_test_app_state_with_stripe();
    let app = test_app(&state);
    let client = create_test_client(&state, "client@example.com");
    {
        let conn = state.db.get().unwrap();
        queries::set_stripe_customer_id(&conn, client.id(), "cus_sub").unwrap();
    }

    let subscription = |status: &str| {
        json!({
            "id": "sub_1",
            "customer": "cus_sub",
            "status": status,
            "cancel_at_period_end": false,
            "current_period_end": 1_900_000_000,
            "items": { "data": [ { "price": { "id": "price_pro" } } ] }
        })
    };

    let (status, _) = deliver(
        &app,
        &event("evt_sub_1", "customer.subscription.created", subscription("active")),
        TEST_WEBHOOK_SECRET,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = deliver(
        &app,
        &event("evt_sub_2", "customer.subscription.deleted", subscription("canceled")),
        TEST_WEBHOOK_SECRET,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let conn = state.db.get().unwrap();
    let mirrored = queries::list_subscriptions_for_user(&conn, client.id()).unwrap();
    assert_eq!(mirrored.len(), 1);
    assert_eq!(mirrored[0].status, "canceled");
    assert_eq!(mirrored[0].price_id.as_deref(), Some("price_pro"));
}

#[tokio::test]
async fn test_payment_failed_marks_order_failed() {
    let state = create_test_app_state_with_stripe();
    let app = test_app(&state);
    let client = create_test_client(&state, "client@example.com");
    let service = create_test_service(&state, None, 10_000);
    let package = create_test_package(&state, &service.id, 30_000);

    let (_, order) = post(&app, "/orders", Some(&client.token), json!({ "package_id": package.id })).await;
    let order_id = order["id"].as_str().unwrap().to_string();
    let payment = {
        let conn = state.db.get().unwrap();
        queries::create_payment(
            &conn,
            &CreatePayment {
                user_id: client.id().to_string(),
                appointment_id: None,
                order_id: Some(order_id.clone()),
                amount_cents: 30_000,
                currency: "usd".to_string(),
            },
        )
        .unwrap()
    };

    let payload = event(
        "evt_failed",
        "payment_intent.payment_failed",
        json!({
            "id": "pi_declined",
            "metadata": { "payment_id": payment.id, "user_id": client.id() },
            "last_payment_error": { "message": "Your card was declined." }
        }),
    );
    let (status, body) = deliver(&app, &payload, TEST_WEBHOOK_SECRET).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let conn = state.db.get().unwrap();
    let stored = queries::get_payment(&conn, &payment.id).unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Failed);
    let order = queries::get_order(&conn, &order_id).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
}

#[test]
fn test_webhook_event_log_dedupes_and_purges() {
    let state = create_test_app_state();
    let conn = state.db.get().unwrap();

    assert!(queries::try_record_webhook_event(&conn, "stripe", "evt_log").unwrap());
    assert!(!queries::try_record_webhook_event(&conn, "stripe", "evt_log").unwrap());
    // Event ids are scoped per provider
    assert!(queries::try_record_webhook_event(&conn, "other", "evt_log").unwrap());

    conn.execute(
        "UPDATE webhook_events SET created_at = ?1 WHERE provider = 'stripe'",
        rusqlite::params![now() - 10 * 86400],
    )
    .unwrap();
    assert_eq!(queries::purge_old_webhook_events(&conn, 7).unwrap(), 1);
    assert!(queries::try_record_webhook_event(&conn, "stripe", "evt_log").unwrap());
}

#[tokio::test]
async fn test_declined_card_then_successful_retry_completes_payment() {
    let state = create_test_app_state_with_stripe();
    let app = test_app(&state);
    let client = create_test_client(&state, "client@example.com");
    let (appointment, payment) = pending_booking_payment(&state, &client, "cs_retry");

    let declined = event(
        "evt_declined",
        "payment_intent.payment_failed",
        json!({
            "id": "pi_test_1",
            "metadata": { "payment_id": payment.id, "user_id": client.id() },
            "last_payment_error": { "message": "Your card was declined." }
        }),
    );
    let (status, _) = deliver(&app, &declined, TEST_WEBHOOK_SECRET).await;
    assert_eq!(status, StatusCode::OK);
    {
        let conn = state.db.get().unwrap();
        let stored = queries::get_payment(&conn, &payment.id).unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Failed);
    }

    let (status, body) = deliver(
        &app,
        &checkout_completed("evt_retry_paid", "cs_retry", &payment),
        TEST_WEBHOOK_SECRET,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");

    let conn = state.db.get().unwrap();
    let stored = queries::get_payment(&conn, &payment.id).unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Completed);
    let booked = queries::get_appointment(&conn, &appointment.id).unwrap().unwrap();
    assert_eq!(booked.status, AppointmentStatus::Confirmed);
    let titles: Vec<String> = queries::list_notifications(&conn, client.id(), false)
        .unwrap()
        .into_iter()
        .map(|n| n.title)
        .collect();
    assert!(titles.contains(&"Payment failed".to_string()));
    assert!(titles.contains(&"Payment received".to_string()));
}

#[tokio::test]
async fn test_failed_order_is_paid_after_retry() {
    let state = create_test_app_state_with_stripe();
    let app = test_app(&state);
    let client = create_test_client(&state, "client@example.com");
    let service = create_test_service(&state, None, 10_000);
    let package = create_test_package(&state, &service.id, 30_000);

    let (_, order) = post(&app, "/orders", Some(&client.token), json!({ "package_id": package.id })).await;
    let order_id = order["id"].as_str().unwrap().to_string();
    let payment = {
        let conn = state.db.get().unwrap();
        let payment = queries::create_payment(
            &conn,
            &CreatePayment {
                user_id: client.id().to_string(),
                appointment_id: None,
                order_id: Some(order_id.clone()),
                amount_cents: 30_000,
                currency: "usd".to_string(),
            },
        )
        .unwrap();
        queries::set_payment_session(&conn, &payment.id, "cs_order_retry").unwrap();
        payment
    };

    let declined = event(
        "evt_order_declined",
        "payment_intent.payment_failed",
        json!({ "id": "pi_test_1", "metadata": { "payment_id": payment.id } }),
    );
    deliver(&app, &declined, TEST_WEBHOOK_SECRET).await;
    deliver(
        &app,
        &checkout_completed("evt_order_paid", "cs_order_retry", &payment),
        TEST_WEBHOOK_SECRET,
    )
    .await;

    let conn = state.db.get().unwrap();
    let order = queries::get_order(&conn, &order_id).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}
