use axum::{Extension, extract::State};

use crate::db::{AppState, queries};
use crate::error::{OptionExt, Result, msg};
use crate::extractors::Json;
use crate::feed::{ChangeAction, ChangeEvent, ChangeKind};
use crate::middleware::AuthContext;
use crate::models::{CreateOrder, Order};

/// Order a service package. The package price is captured on the order.
pub async fn create_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CreateOrder>,
) -> Result<Json<Order>> {
    let conn = state.db.get()?;
    let package = queries::get_package(&conn, &input.package_id)?
        .filter(|p| p.is_active)
        .or_not_found(msg::PACKAGE_NOT_FOUND)?;

    let order = queries::create_order(&conn, &auth.user_id, &package)?;
    tracing::info!(order_id = %order.id, package_id = %package.id, "Order created");
    state.feed.publish(
        ChangeEvent::new(ChangeKind::Order, ChangeAction::Insert, &auth.user_id, &order.id)
            .with_record(&order),
    );
    Ok(Json(order))
}

pub async fn list_my_orders(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Order>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_orders_for_user(&conn, &auth.user_id)?))
}
