use axum::extract::State;
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::feed::{ChangeAction, ChangeEvent, ChangeKind};
use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, NewNotification, UpdateAppointment,
};
use crate::notify::notify_quietly;
use crate::pagination::{Paginated, PaginationQuery};
use crate::reminders::send_reminder;

pub async fn list_appointments(
    State(state): State<AppState>,
    Query(filter): Query<AppointmentFilter>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Paginated<Appointment>>> {
    let conn = state.db.get()?;
    let page = queries::list_appointments_paginated(
        &conn,
        &filter,
        pagination.limit(),
        pagination.offset(),
    )?;
    Ok(Json(Paginated::from_page(page, &pagination)))
}

fn status_notification(appointment: &Appointment) -> Option<NewNotification> {
    let (title, message) = match appointment.status {
        AppointmentStatus::Confirmed => (
            "Booking confirmed",
            format!(
                "Your appointment on {} at {} is confirmed",
                appointment.appointment_date, appointment.appointment_time
            ),
        ),
        AppointmentStatus::Cancelled => (
            "Booking cancelled",
            format!(
                "Your appointment on {} at {} was cancelled",
                appointment.appointment_date, appointment.appointment_time
            ),
        ),
        AppointmentStatus::Completed => (
            "Booking completed",
            "Your appointment has been marked as completed".to_string(),
        ),
        AppointmentStatus::Pending => return None,
    };
    Some(NewNotification::new(title, message).link(format!("/portal/appointments/{}", appointment.id)))
}

/// Status, scheduling and project-tracking changes. The client is notified
/// when the status changes.
pub async fn update_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateAppointment>,
) -> Result<Json<Appointment>> {
    input.validate()?;
    let conn = state.db.get()?;
    let before = queries::get_appointment(&conn, &id)?.or_not_found(msg::APPOINTMENT_NOT_FOUND)?;
    let appointment = queries::update_appointment(&conn, &id, &input)?.or_not_found(msg::APPOINTMENT_NOT_FOUND)?;

    state.feed.publish(
        ChangeEvent::new(
            ChangeKind::Appointment,
            ChangeAction::Update,
            &appointment.user_id,
            &appointment.id,
        )
        .with_record(&appointment),
    );
    if appointment.status != before.status {
        tracing::info!(
            appointment_id = %id,
            from = %before.status.as_ref(),
            to = %appointment.status.as_ref(),
            "Booking status changed"
        );
        if let Some(notification) = status_notification(&appointment) {
            notify_quietly(&conn, &state.feed, &appointment.user_id, &notification);
        }
    }
    Ok(Json(appointment))
}

#[derive(Debug, Serialize)]
pub struct ReminderResponse {
    pub success: bool,
    pub email_configured: bool,
}

pub async fn remind_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReminderResponse>> {
    let appointment = {
        let conn = state.db.get()?;
        queries::get_appointment(&conn, &id)?.or_not_found(msg::APPOINTMENT_NOT_FOUND)?
    };
    if !matches!(
        appointment.status,
        AppointmentStatus::Pending | AppointmentStatus::Confirmed
    ) {
        return Err(AppError::BadRequest(msg::APPOINTMENT_NOT_REMINDABLE.into()));
    }

    send_reminder(&state, &appointment).await?;
    Ok(Json(ReminderResponse {
        success: true,
        email_configured: state.email_service.is_configured(),
    }))
}
