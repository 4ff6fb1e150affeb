//! Signed-in client routes: bookings, tickets, orders, payments,
//! notifications and the realtime stream. Every handler is scoped to the
//! caller's own rows.

mod appointments;
mod notifications;
mod orders;
mod payments;
mod realtime;
mod tickets;

pub use appointments::*;
pub use notifications::*;
pub use orders::*;
pub use payments::*;
pub use realtime::*;
pub use tickets::*;

use axum::{
    Router,
    routing::{get, post},
};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_my_appointments).post(create_appointment))
        .route("/appointments/{id}", get(get_my_appointment))
        .route("/appointments/{id}/cancel", post(cancel_appointment))
        .route("/tickets", get(list_my_tickets).post(create_ticket))
        .route("/tickets/{id}", get(get_my_ticket))
        .route("/tickets/{id}/replies", post(reply_to_ticket))
        .route("/orders", get(list_my_orders).post(create_order))
        .route("/notifications", get(list_my_notifications))
        .route("/notifications/read-all", post(mark_all_notifications_read))
        .route("/notifications/{id}/read", post(mark_notification_read))
        .route("/payments", get(list_my_payments))
        .route("/payments/checkout", post(create_checkout))
        .route("/billing/subscriptions", get(list_my_subscriptions))
        .route("/billing/invoices", get(list_my_invoices))
        .route("/realtime", get(realtime))
}
