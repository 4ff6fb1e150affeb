use axum::{Extension, extract::State};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::Json;
use crate::middleware::AuthContext;
use crate::models::{
    AppointmentStatus, CreateCheckout, CreatePayment, OrderStatus, Payment, PaymentStatus,
    Subscription,
};
use crate::payments::{CheckoutRequest, StripeInvoice};
use crate::util::site_url;

/// What a checkout pays for, resolved from the request.
struct CheckoutTarget {
    appointment_id: Option<String>,
    order_id: Option<String>,
    amount_cents: i64,
    currency: String,
    description: String,
}

fn already_paid(conn: &Connection, user_id: &str, target: &CheckoutTarget) -> Result<bool> {
    Ok(queries::list_payments_for_user(conn, user_id)?
        .iter()
        .filter(|p| p.status == PaymentStatus::Completed)
        .any(|p| {
            (target.appointment_id.is_some() && p.appointment_id == target.appointment_id)
                || (target.order_id.is_some() && p.order_id == target.order_id)
        }))
}

fn resolve_target(conn: &Connection, auth: &AuthContext, input: &CreateCheckout) -> Result<CheckoutTarget> {
    let target = match (&input.appointment_id, &input.order_id) {
        (Some(appointment_id), None) => {
            let appointment = queries::get_appointment(conn, appointment_id)?
                .filter(|a| a.user_id == auth.user_id)
                .or_not_found(msg::APPOINTMENT_NOT_FOUND)?;
            if appointment.status == AppointmentStatus::Cancelled {
                return Err(AppError::BadRequest(msg::NOTHING_TO_PAY.into()));
            }
            let service = match appointment.service_id {
                Some(ref id) => queries::get_service(conn, id)?,
                None => None,
            }
            .ok_or_else(|| AppError::BadRequest(msg::NOTHING_TO_PAY.into()))?;
            CheckoutTarget {
                appointment_id: Some(appointment.id),
                order_id: None,
                amount_cents: service.price_cents,
                currency: service.currency,
                description: service.name_en,
            }
        }
        (None, Some(order_id)) => {
            let order = queries::get_order(conn, order_id)?
                .filter(|o| o.user_id == auth.user_id)
                .or_not_found(msg::ORDER_NOT_FOUND)?;
            match order.status {
                OrderStatus::Paid => return Err(AppError::Conflict(msg::ALREADY_PAID.into())),
                OrderStatus::Cancelled => {
                    return Err(AppError::BadRequest(msg::NOTHING_TO_PAY.into()));
                }
                OrderStatus::Pending | OrderStatus::Failed => {}
            }
            let description = match order.package_id {
                Some(ref id) => queries::get_package(conn, id)?.map(|p| p.name_en),
                None => None,
            }
            .unwrap_or_else(|| "Service package".to_string());
            CheckoutTarget {
                appointment_id: None,
                order_id: Some(order.id),
                amount_cents: order.amount_cents,
                currency: order.currency,
                description,
            }
        }
        _ => return Err(AppError::BadRequest(msg::CHECKOUT_TARGET_REQUIRED.into())),
    };

    if target.amount_cents <= 0 {
        return Err(AppError::BadRequest(msg::NOTHING_TO_PAY.into()));
    }
    if already_paid(conn, &auth.user_id, &target)? {
        return Err(AppError::Conflict(msg::ALREADY_PAID.into()));
    }
    Ok(target)
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub payment_id: String,
    pub session_id: String,
    pub url: String,
}

/// Start a Stripe checkout for a booking or an order.
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CreateCheckout>,
) -> Result<Json<CheckoutResponse>> {
    let stripe = state
        .stripe
        .clone()
        .ok_or_else(|| AppError::BadRequest(msg::PAYMENTS_NOT_CONFIGURED.into()))?;

    let (payment, description, customer_id) = {
        let conn = state.db.get()?;
        let target = resolve_target(&conn, &auth, &input)?;
        let customer_id = queries::get_profile(&conn, &auth.user_id)?.and_then(|p| p.stripe_customer_id);
        let payment = queries::create_payment(
            &conn,
            &CreatePayment {
                user_id: auth.user_id.clone(),
                appointment_id: target.appointment_id,
                order_id: target.order_id,
                amount_cents: target.amount_cents,
                currency: target.currency,
            },
        )?;
        (payment, target.description, customer_id)
    };

    let success_url = input.success_url.clone().unwrap_or_else(|| {
        site_url(&state.base_url, "portal/payments?status=success&session_id={CHECKOUT_SESSION_ID}")
    });
    let cancel_url = input
        .cancel_url
        .clone()
        .unwrap_or_else(|| site_url(&state.base_url, "portal/payments?status=cancelled"));

    let (session_id, url) = stripe
        .create_checkout_session(&CheckoutRequest {
            payment_id: &payment.id,
            user_id: &auth.user_id,
            customer_id: customer_id.as_deref(),
            customer_email: &auth.email,
            product_name: &description,
            amount_cents: payment.amount_cents,
            currency: &payment.currency,
            success_url: &success_url,
            cancel_url: &cancel_url,
        })
        .await?;

    let conn = state.db.get()?;
    queries::set_payment_session(&conn, &payment.id, &session_id)?;
    tracing::info!(payment_id = %payment.id, session_id = %session_id, "Checkout session created");

    Ok(Json(CheckoutResponse {
        success: true,
        payment_id: payment.id,
        session_id,
        url,
    }))
}

pub async fn list_my_payments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Payment>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_payments_for_user(&conn, &auth.user_id)?))
}

/// Subscription as shown in the billing page, from Stripe or the local mirror.
#[derive(Debug, Serialize)]
pub struct BillingSubscription {
    pub id: String,
    pub status: String,
    pub price_id: Option<String>,
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: bool,
}

impl From<Subscription> for BillingSubscription {
    fn from(s: Subscription) -> Self {
        Self {
            id: s.id,
            status: s.status,
            price_id: s.price_id,
            current_period_end: s.current_period_end,
            cancel_at_period_end: s.cancel_at_period_end,
        }
    }
}

/// The caller's subscriptions. Reads Stripe when a customer exists, falling
/// back to the webhook-maintained mirror if Stripe is unavailable.
pub async fn list_my_subscriptions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<BillingSubscription>>> {
    let (customer_id, mirrored) = {
        let conn = state.db.get()?;
        let customer_id = queries::get_profile(&conn, &auth.user_id)?.and_then(|p| p.stripe_customer_id);
        (customer_id, queries::list_subscriptions_for_user(&conn, &auth.user_id)?)
    };

    if let (Some(stripe), Some(customer_id)) = (state.stripe.as_ref(), customer_id) {
        match stripe.list_subscriptions(&customer_id).await {
            Ok(subscriptions) => {
                return Ok(Json(
                    subscriptions
                        .into_iter()
                        .map(|s| BillingSubscription {
                            price_id: s.price_id().map(String::from),
                            id: s.id,
                            status: s.status,
                            current_period_end: s.current_period_end,
                            cancel_at_period_end: s.cancel_at_period_end,
                        })
                        .collect(),
                ));
            }
            Err(e) => tracing::warn!("Falling back to mirrored subscriptions: {}", e),
        }
    }

    Ok(Json(mirrored.into_iter().map(Into::into).collect()))
}

/// The caller's Stripe invoices. Empty when no customer exists yet.
pub async fn list_my_invoices(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<StripeInvoice>>> {
    let customer_id = {
        let conn = state.db.get()?;
        queries::get_profile(&conn, &auth.user_id)?.and_then(|p| p.stripe_customer_id)
    };
    match (state.stripe.as_ref(), customer_id) {
        (Some(stripe), Some(customer_id)) => Ok(Json(stripe.list_invoices(&customer_id).await?)),
        _ => Ok(Json(Vec::new())),
    }
}
