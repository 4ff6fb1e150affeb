use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::models::Payment;
use crate::pagination::{Paginated, PaginationQuery};

pub async fn list_payments(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Paginated<Payment>>> {
    let conn = state.db.get()?;
    let page = queries::list_payments_paginated(&conn, pagination.limit(), pagination.offset())?;
    Ok(Json(Paginated::from_page(page, &pagination)))
}
