//! Client portal: bookings, orders, tickets, notifications, payments and
//! the realtime stream.

mod common;
use common::*;

fn booking(service_id: Option<&str>) -> Value {
    json!({
        "service_id": service_id,
        "client_name": "Dana Client",
        "client_email": "dana@example.com",
        "appointment_date": "2030-03-01",
        "appointment_time": "14:00",
        "notes": "Interested in a chatbot"
    })
}

// ============ Bookings ============

#[tokio::test]
async fn test_create_and_cancel_booking() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let client = create_test_client(&state, "dana@example.com");
    let service = create_test_service(&state, None, 15_000);
    let mut feed = state.feed.subscribe();

    let (status, body) = post(&app, "/appointments", Some(&client.token), booking(Some(&service.id))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "pending");
    let id = body["id"].as_str().unwrap().to_string();

    let change = feed.try_recv().unwrap();
    assert_eq!(change.record_id, id);

    let (_, notifications) = get(&app, "/notifications", Some(&client.token)).await;
    let message = notifications[0]["message"].as_str().unwrap();
    assert!(message.contains("Discovery session"), "{}", message);

    let (status, body) = post(&app, &format!("/appointments/{}/cancel", id), Some(&client.token), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (status, _) = post(&app, &format!("/appointments/{}/cancel", id), Some(&client.token), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "cancelled bookings cannot be cancelled again");
}

#[tokio::test]
async fn test_booking_validation() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let client = create_test_client(&state, "dana@example.com");

    let mut bad_date = booking(None);
    bad_date["appointment_date"] = json!("01/03/2030");
    let (status, _) = post(&app, "/appointments", Some(&client.token), bad_date).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut bad_email = booking(None);
    bad_email["client_email"] = json!("nope");
    let (status, _) = post(&app, "/appointments", Some(&client.token), bad_email).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&app, "/appointments", Some(&client.token), booking(Some("missing"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bookings_are_private() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let owner = create_test_client(&state, "owner@example.com");
    let other = create_test_client(&state, "other@example.com");
    let admin = create_test_admin(&state, "admin@example.com");
    let appointment = create_test_appointment(&state, &owner, None);
    let uri = format!("/appointments/{}", appointment.id);

    let (status, _) = get(&app, &uri, Some(&other.token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = post(&app, &format!("{}/cancel", uri), Some(&other.token), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, &uri, Some(&admin.token)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, mine) = get(&app, "/appointments", Some(&other.token)).await;
    assert!(mine.as_array().unwrap().is_empty());
}

// ============ Orders ============

#[tokio::test]
async fn test_order_captures_package_price() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let client = create_test_client(&state, "client@example.com");
    let service = create_test_service(&state, None, 10_000);
    let package = create_test_package(&state, &service.id, 42_000);

    let (status, order) = post(&app, "/orders", Some(&client.token), json!({ "package_id": package.id })).await;
    assert_eq!(status, StatusCode::OK, "{}", order);
    assert_eq!(order["amount_cents"], 42_000);
    assert_eq!(order["status"], "pending");

    let (_, orders) = get(&app, "/orders", Some(&client.token)).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);

    let (status, _) = post(&app, "/orders", Some(&client.token), json!({ "package_id": "missing" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============ Tickets ============

#[tokio::test]
async fn test_ticket_reply_flow() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let client = create_test_client(&state, "client@example.com");
    let other = create_test_client(&state, "other@example.com");

    let (status, ticket) = post(
        &app,
        "/tickets",
        Some(&client.token),
        json!({ "subject": "Invoice", "description": "Wrong amount" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ticket["priority"], "medium");
    let id = ticket["id"].as_str().unwrap().to_string();
    let replies = format!("/tickets/{}/replies", id);

    let (status, reply) = post(&app, &replies, Some(&client.token), json!({ "message": "Any news?" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["is_staff"], false);

    let (status, _) = post(&app, &replies, Some(&client.token), json!({ "message": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = post(&app, &replies, Some(&other.token), json!({ "message": "Me too" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let set_status = |status: TicketStatus| {
        let conn = state.db.get().unwrap();
        queries::update_ticket(
            &conn,
            &id,
            &UpdateTicket {
                status: Some(status),
                priority: None,
            },
        )
        .unwrap();
    };

    // Replying to a resolved ticket reopens it
    set_status(TicketStatus::Resolved);
    let (status, _) = post(&app, &replies, Some(&client.token), json!({ "message": "Still wrong" })).await;
    assert_eq!(status, StatusCode::OK);
    let (_, detail) = get(&app, &format!("/tickets/{}", id), Some(&client.token)).await;
    assert_eq!(detail["status"], "open");
    assert_eq!(detail["replies"].as_array().unwrap().len(), 2);

    set_status(TicketStatus::Closed);
    let (status, _) = post(&app, &replies, Some(&client.token), json!({ "message": "Hello?" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============ Notifications ============

#[tokio::test]
async fn test_mark_notifications_read() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let client = create_test_client(&state, "client@example.com");
    let other = create_test_client(&state, "other@example.com");
    let ids: Vec<String> = {
        let conn = state.db.get().unwrap();
        (0..3)
            .map(|i| {
                queries::create_notification(
                    &conn,
                    client.id(),
                    &NewNotification::new(format!("Note {}", i), "Body"),
                )
                .unwrap()
                .id
            })
            .collect()
    };

    let (status, _) = post(&app, &format!("/notifications/{}/read", ids[0]), Some(&other.token), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "cannot mark someone else's notification");

    let (status, _) = post(&app, &format!("/notifications/{}/read", ids[0]), Some(&client.token), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (_, unread) = get(&app, "/notifications?unread_only=true", Some(&client.token)).await;
    assert_eq!(unread.as_array().unwrap().len(), 2);

    let (status, body) = post(&app, "/notifications/read-all", Some(&client.token), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 2);
    let (_, unread) = get(&app, "/notifications?unread_only=true", Some(&client.token)).await;
    assert!(unread.as_array().unwrap().is_empty());
}

// ============ Payments ============

#[tokio::test]
async fn test_checkout_without_stripe_is_rejected() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let client = create_test_client(&state, "client@example.com");
    let service = create_test_service(&state, None, 10_000);
    let appointment = create_test_appointment(&state, &client, Some(&service.id));

    let (status, body) = post(
        &app,
        "/payments/checkout",
        Some(&client.token),
        json!({ "appointment_id": appointment.id }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].as_str().unwrap_or_default().contains("not configured"), "{}", body);
}

#[tokio::test]
async fn test_checkout_target_validation() {
    let state = create_test_app_state_with_stripe();
    let app = test_app(&state);
    let client = create_test_client(&state, "client@example.com");
    let other = create_test_client(&state, "other@example.com");
    let service = create_test_service(&state, None, 10_000);
    let paid = create_test_appointment(&state, &client, Some(&service.id));
    let free = create_test_appointment(&state, &client, None);
    {
        let conn = state.db.get().unwrap();
        let payment = queries::create_payment(
            &conn,
            &CreatePayment {
                user_id: client.id().to_string(),
                appointment_id: Some(paid.id.clone()),
                order_id: None,
                amount_cents: 10_000,
                currency: "usd".to_string(),
            },
        )
        .unwrap();
        queries::set_payment_session(&conn, &payment.id, "cs_test_paid").unwrap();
        queries::complete_payment_by_session(&conn, "cs_test_paid", None).unwrap();
    }

    let cases = [
        (json!({}), StatusCode::BAD_REQUEST),
        (json!({ "appointment_id": paid.id, "order_id": "o" }), StatusCode::BAD_REQUEST),
        (json!({ "appointment_id": free.id }), StatusCode::BAD_REQUEST),
        (json!({ "appointment_id": paid.id }), StatusCode::CONFLICT),
        (json!({ "order_id": "missing" }), StatusCode::NOT_FOUND),
    ];
    for (body, expected) in cases {
        let (status, response) = post(&app, "/payments/checkout", Some(&client.token), body.clone()).await;
        assert_eq!(status, expected, "{} -> {}", body, response);
    }

    let (status, _) = post(
        &app,
        "/payments/checkout",
        Some(&other.token),
        json!({ "appointment_id": paid.id }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // No stray pending rows were created by the rejected attempts
    let (_, payments) = get(&app, "/payments", Some(&client.token)).await;
    assert_eq!(payments.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_billing_falls_back_to_mirror_without_customer() {
    let state = create_test_app_state_with_stripe();
    let app = test_app(&state);
    let client = create_test_client(&state, "client@example.com");
    {
        let conn = state.db.get().unwrap();
        queries::upsert_subscription(
            &conn,
            &UpsertSubscription {
                id: "sub_123".to_string(),
                user_id: client.id().to_string(),
                status: "active".to_string(),
                price_id: Some("price_monthly".to_string()),
                current_period_end: Some(now() + 86_400),
                cancel_at_period_end: false,
            },
        )
        .unwrap();
    }

    let (status, body) = get(&app, "/billing/subscriptions", Some(&client.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], "sub_123");
    assert_eq!(body[0]["price_id"], "price_monthly");

    let (status, body) = get(&app, "/billing/invoices", Some(&client.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

// ============ Realtime ============

#[tokio::test]
async fn test_realtime_requires_session_and_streams_events() {
    let state = create_test_app_state();
    let app = test_app(&state);
    let client = create_test_client(&state, "client@example.com");

    let (status, _) = get(&app, "/realtime", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/realtime")
                .header("Authorization", format!("Bearer {}", client.token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );
}
