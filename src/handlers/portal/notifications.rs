use axum::{Extension, extract::State};
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::middleware::AuthContext;
use crate::models::{Notification, NotificationFilter};

pub async fn list_my_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<NotificationFilter>,
) -> Result<Json<Vec<Notification>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_notifications(
        &conn,
        &auth.user_id,
        filter.unread_only,
    )?))
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub success: bool,
    pub updated: usize,
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<MarkReadResponse>> {
    let conn = state.db.get()?;
    if !queries::mark_notification_read(&conn, &id, &auth.user_id)? {
        return Err(AppError::NotFound(msg::NOTIFICATION_NOT_FOUND.into()));
    }
    Ok(Json(MarkReadResponse {
        success: true,
        updated: 1,
    }))
}

pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<MarkReadResponse>> {
    let conn = state.db.get()?;
    let updated = queries::mark_all_notifications_read(&conn, &auth.user_id)?;
    Ok(Json(MarkReadResponse {
        success: true,
        updated,
    }))
}
