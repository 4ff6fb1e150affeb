//! Platform administration. Mounted behind `session_auth` and `require_admin`.

mod appointments;
mod catalog;
mod payments;
mod settings;
mod tickets;
mod users;

pub use appointments::*;
pub use catalog::*;
pub use payments::*;
pub use settings::*;
pub use tickets::*;
pub use users::*;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // Users
        .route("/admin/users", get(list_users).post(create_user))
        .route("/admin/users/{id}", put(update_user).delete(delete_user))
        // Catalog
        .route("/admin/categories", get(list_categories).post(create_category))
        .route("/admin/categories/suggest-icon", post(suggest_icon))
        .route(
            "/admin/categories/{id}",
            put(update_category).delete(delete_category),
        )
        .route("/admin/services", get(list_services).post(create_service))
        .route(
            "/admin/services/{id}",
            put(update_service).delete(delete_service),
        )
        .route("/admin/packages", get(list_packages).post(create_package))
        .route(
            "/admin/packages/{id}",
            put(update_package).delete(delete_package),
        )
        // Bookings & support
        .route("/admin/appointments", get(list_appointments))
        .route("/admin/appointments/{id}", put(update_appointment))
        .route("/admin/appointments/{id}/remind", post(remind_appointment))
        .route("/admin/tickets", get(list_tickets))
        .route("/admin/tickets/{id}", put(update_ticket))
        .route("/admin/tickets/{id}/replies", post(reply_as_staff))
        // Billing & site
        .route("/admin/payments", get(list_payments))
        .route("/admin/settings/{key}", put(update_setting))
}
