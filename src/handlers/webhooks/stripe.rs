//! Stripe webhook receiver.
//!
//! Every event is verified against `Stripe-Signature`, recorded in
//! `webhook_events` for replay protection, and applied in one transaction
//! together with that record. Emails and realtime pushes run after commit.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use rusqlite::Connection;

use crate::db::{AppState, queries};
use crate::email::PaymentConfirmationEmail;
use crate::error::Result;
use crate::feed::{ChangeAction, ChangeEvent, ChangeKind};
use crate::models::{
    AppointmentStatus, NewNotification, OrderStatus, Payment, UpsertSubscription,
};
use crate::payments::{
    StripeCheckoutSession, StripePaymentIntent, StripeSubscription, StripeWebhookEvent,
};

pub const PROVIDER: &str = "stripe";

/// Result type for webhook operations.
pub type WebhookResult = (StatusCode, &'static str);

/// Parsed webhook payload.
#[derive(Debug)]
pub enum WebhookEvent {
    CheckoutCompleted(StripeCheckoutSession),
    SubscriptionChanged(StripeSubscription),
    PaymentFailed(StripePaymentIntent),
    /// Event type this service does not act on
    Ignored,
}

/// Receipt emailed after a completed checkout.
#[derive(Debug)]
struct PaymentReceipt {
    to: String,
    amount_cents: i64,
    currency: String,
    description: String,
}

/// Side effects to run once the transaction has committed.
#[derive(Debug, Default)]
struct Applied {
    events: Vec<ChangeEvent>,
    receipt: Option<PaymentReceipt>,
}

impl Applied {
    fn notify(&mut self, conn: &Connection, user_id: &str, input: &NewNotification) -> Result<()> {
        let notification = queries::create_notification(conn, user_id, input)?;
        self.events.push(
            ChangeEvent::new(
                ChangeKind::Notification,
                ChangeAction::Insert,
                user_id,
                &notification.id,
            )
            .with_record(&notification),
        );
        Ok(())
    }

    fn payment_changed(&mut self, payment: &Payment) {
        self.events.push(
            ChangeEvent::new(ChangeKind::Payment, ChangeAction::Update, &payment.user_id, &payment.id)
                .with_record(payment),
        );
    }
}

fn extract_signature(headers: &HeaderMap) -> std::result::Result<&str, WebhookResult> {
    headers
        .get("stripe-signature")
        .ok_or((StatusCode::BAD_REQUEST, "Missing stripe-signature header"))?
        .to_str()
        .map_err(|e| {
            tracing::debug!("Invalid UTF-8 in Stripe signature header: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid signature header")
        })
}

fn parse_object<T: serde::de::DeserializeOwned>(
    event: &StripeWebhookEvent,
    what: &'static str,
) -> std::result::Result<T, WebhookResult> {
    serde_json::from_value(event.data.object.clone()).map_err(|e| {
        tracing::error!("Failed to parse Stripe {}: {}", what, e);
        (StatusCode::BAD_REQUEST, "Invalid event object")
    })
}

pub fn parse_event(event: &StripeWebhookEvent) -> std::result::Result<WebhookEvent, WebhookResult> {
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            Ok(WebhookEvent::CheckoutCompleted(parse_object(event, "checkout session")?))
        }
        "customer.subscription.created"
        | "customer.subscription.updated"
        | "customer.subscription.deleted" => {
            Ok(WebhookEvent::SubscriptionChanged(parse_object(event, "subscription")?))
        }
        "payment_intent.payment_failed" => {
            Ok(WebhookEvent::PaymentFailed(parse_object(event, "payment intent")?))
        }
        _ => Ok(WebhookEvent::Ignored),
    }
}

fn apply_checkout(conn: &Connection, session: &StripeCheckoutSession) -> Result<Applied> {
    let mut applied = Applied::default();
    if session.payment_status != "paid" {
        tracing::debug!(session_id = %session.id, status = %session.payment_status, "Checkout not paid yet");
        return Ok(applied);
    }

    let Some(payment) =
        queries::complete_payment_by_session(conn, &session.id, session.payment_intent.as_deref())?
    else {
        tracing::info!(session_id = %session.id, "No open payment for checkout session");
        return Ok(applied);
    };
    applied.payment_changed(&payment);

    let mut description = "your order".to_string();
    if let Some(ref appointment_id) = payment.appointment_id {
        queries::set_appointment_status(conn, appointment_id, AppointmentStatus::Confirmed)?;
        if let Some(appointment) = queries::get_appointment(conn, appointment_id)? {
            description = format!(
                "your appointment on {} at {}",
                appointment.appointment_date, appointment.appointment_time
            );
            applied.events.push(
                ChangeEvent::new(
                    ChangeKind::Appointment,
                    ChangeAction::Update,
                    &appointment.user_id,
                    &appointment.id,
                )
                .with_record(&appointment),
            );
        }
    }
    if let Some(ref order_id) = payment.order_id {
        queries::set_order_status(conn, order_id, OrderStatus::Paid)?;
        if let Some(order) = queries::get_order(conn, order_id)? {
            if let Some(package) = match order.package_id {
                Some(ref id) => queries::get_package(conn, id)?,
                None => None,
            } {
                description = package.name_en;
            }
            applied.events.push(
                ChangeEvent::new(ChangeKind::Order, ChangeAction::Update, &order.user_id, &order.id)
                    .with_record(&order),
            );
        }
    }
    if let Some(ref customer) = session.customer {
        queries::set_stripe_customer_id(conn, &payment.user_id, customer)?;
    }

    applied.notify(
        conn,
        &payment.user_id,
        &NewNotification::new(
            "Payment received",
            format!(
                "We received {} for {}",
                crate::email::format_amount(payment.amount_cents, &payment.currency),
                description
            ),
        )
        .link("/portal/payments"),
    )?;

    let to = queries::get_user_by_id(conn, &payment.user_id)?
        .map(|u| u.email)
        .or_else(|| session.customer_email.clone());
    applied.receipt = to.map(|to| PaymentReceipt {
        to,
        amount_cents: payment.amount_cents,
        currency: payment.currency.clone(),
        description,
    });

    tracing::info!(payment_id = %payment.id, session_id = %session.id, "Payment completed");
    Ok(applied)
}

fn apply_subscription(conn: &Connection, subscription: &StripeSubscription) -> Result<Applied> {
    let by_customer = match subscription.customer {
        Some(ref customer) => queries::get_user_id_by_stripe_customer(conn, customer)?,
        None => None,
    };
    let Some(user_id) = by_customer.or_else(|| subscription.metadata.user_id.clone()) else {
        tracing::warn!(subscription_id = %subscription.id, "Subscription for unknown customer");
        return Ok(Applied::default());
    };

    queries::upsert_subscription(
        conn,
        &UpsertSubscription {
            id: subscription.id.clone(),
            user_id,
            status: subscription.status.clone(),
            price_id: subscription.price_id().map(String::from),
            current_period_end: subscription.current_period_end,
            cancel_at_period_end: subscription.cancel_at_period_end,
        },
    )?;
    tracing::info!(subscription_id = %subscription.id, status = %subscription.status, "Subscription mirrored");
    Ok(Applied::default())
}

fn apply_payment_failed(conn: &Connection, intent: &StripePaymentIntent) -> Result<Applied> {
    let mut applied = Applied::default();
    if let Some(ref payment_id) = intent.metadata.payment_id {
        queries::set_payment_intent(conn, payment_id, &intent.id)?;
    }

    let reason = intent
        .last_payment_error
        .as_ref()
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| "The payment could not be completed".to_string());

    for payment in queries::fail_payments_by_intent(conn, &intent.id)? {
        if let Some(ref order_id) = payment.order_id {
            queries::set_order_status(conn, order_id, OrderStatus::Failed)?;
        }
        applied.payment_changed(&payment);
        applied.notify(
            conn,
            &payment.user_id,
            &NewNotification::new("Payment failed", reason.clone()).link("/portal/payments"),
        )?;
        tracing::info!(payment_id = %payment.id, payment_intent = %intent.id, "Payment failed");
    }
    Ok(applied)
}

/// Record the event and apply it atomically. `Ok(None)` means a replay.
fn apply_event(conn: &mut Connection, event_id: &str, event: &WebhookEvent) -> Result<Option<Applied>> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
    if !queries::try_record_webhook_event(&tx, PROVIDER, event_id)? {
        return Ok(None);
    }
    let applied = match event {
        WebhookEvent::CheckoutCompleted(session) => apply_checkout(&tx, session)?,
        WebhookEvent::SubscriptionChanged(subscription) => apply_subscription(&tx, subscription)?,
        WebhookEvent::PaymentFailed(intent) => apply_payment_failed(&tx, intent)?,
        WebhookEvent::Ignored => Applied::default(),
    };
    tx.commit()?;
    Ok(Some(applied))
}

async fn process(state: &AppState, headers: &HeaderMap, body: &Bytes) -> std::result::Result<WebhookResult, WebhookResult> {
    // Unconfigured deployments acknowledge so Stripe stops retrying.
    let Some(ref stripe) = state.stripe else {
        return Ok((StatusCode::OK, "Stripe not configured"));
    };

    let signature = extract_signature(headers)?;
    match stripe.verify_webhook_signature(body, signature) {
        Ok(true) => {}
        Ok(false) => return Err((StatusCode::UNAUTHORIZED, "Invalid signature")),
        Err(e) => {
            tracing::warn!("Signature verification error: {}", e);
            return Err((StatusCode::BAD_REQUEST, "Invalid signature"));
        }
    }

    let raw: StripeWebhookEvent = serde_json::from_slice(body).map_err(|e| {
        tracing::error!("Failed to parse Stripe webhook: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid JSON")
    })?;
    let event = parse_event(&raw)?;
    if matches!(event, WebhookEvent::Ignored) {
        tracing::debug!(event_type = %raw.event_type, "Ignoring Stripe event");
        return Ok((StatusCode::OK, "Event ignored"));
    }

    let mut conn = state.db.get().map_err(|e| {
        tracing::error!("DB connection error: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
    })?;
    let applied = match apply_event(&mut conn, &raw.id, &event) {
        Ok(Some(applied)) => applied,
        Ok(None) => return Ok((StatusCode::OK, "Already processed")),
        Err(e) => {
            // Rolled back, including the event record, so Stripe's retry is processed.
            tracing::error!(event_id = %raw.id, "Failed to apply Stripe event: {}", e);
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Database error"));
        }
    };
    drop(conn);

    for change in applied.events {
        state.feed.publish(change);
    }
    if let Some(receipt) = applied.receipt
        && let Err(e) = state
            .email_service
            .send_payment_confirmation(PaymentConfirmationEmail {
                to: &receipt.to,
                amount_cents: receipt.amount_cents,
                currency: &receipt.currency,
                description: &receipt.description,
            })
            .await
    {
        tracing::warn!(event_id = %raw.id, "Failed to send payment confirmation: {}", e);
    }

    Ok((StatusCode::OK, "OK"))
}

/// Axum handler for `POST /webhooks/stripe`.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult {
    process(&state, &headers, &body).await.unwrap_or_else(|e| e)
}
