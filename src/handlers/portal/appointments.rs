use axum::{Extension, extract::State};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::feed::{ChangeAction, ChangeEvent, ChangeKind};
use crate::middleware::AuthContext;
use crate::models::{Appointment, AppointmentStatus, CreateAppointment, NewNotification};
use crate::notify::notify_quietly;

pub async fn create_appointment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CreateAppointment>,
) -> Result<Json<Appointment>> {
    input.validate()?;
    let conn = state.db.get()?;

    let service = match input.service_id {
        Some(ref id) => Some(
            queries::get_service(&conn, id)?
                .filter(|s| s.is_active)
                .or_not_found(msg::SERVICE_NOT_FOUND)?,
        ),
        None => None,
    };

    let appointment = queries::create_appointment(&conn, &auth.user_id, &input)?;
    tracing::info!(appointment_id = %appointment.id, "Booking created");

    state.feed.publish(
        ChangeEvent::new(
            ChangeKind::Appointment,
            ChangeAction::Insert,
            &auth.user_id,
            &appointment.id,
        )
        .with_record(&appointment),
    );
    let what = service.map(|s| s.name_en).unwrap_or_else(|| "consultation".into());
    notify_quietly(
        &conn,
        &state.feed,
        &auth.user_id,
        &NewNotification::new(
            "Booking received",
            format!(
                "Your {} on {} at {} is awaiting confirmation",
                what, appointment.appointment_date, appointment.appointment_time
            ),
        )
        .link(format!("/portal/appointments/{}", appointment.id)),
    );

    Ok(Json(appointment))
}

pub async fn list_my_appointments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Appointment>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_appointments_for_user(&conn, &auth.user_id)?))
}

/// Load an appointment visible to the caller. Other users' bookings are
/// reported as missing; admins see everything.
fn visible_appointment(conn: &rusqlite::Connection, auth: &AuthContext, id: &str) -> Result<Appointment> {
    queries::get_appointment(conn, id)?
        .filter(|a| a.user_id == auth.user_id || auth.is_admin())
        .or_not_found(msg::APPOINTMENT_NOT_FOUND)
}

pub async fn get_my_appointment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>> {
    let conn = state.db.get()?;
    Ok(Json(visible_appointment(&conn, &auth, &id)?))
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>> {
    let conn = state.db.get()?;
    let appointment = visible_appointment(&conn, &auth, &id)?;

    if !matches!(
        appointment.status,
        AppointmentStatus::Pending | AppointmentStatus::Confirmed
    ) {
        return Err(AppError::BadRequest(msg::APPOINTMENT_NOT_CANCELLABLE.into()));
    }

    queries::set_appointment_status(&conn, &id, AppointmentStatus::Cancelled)?;
    let appointment = queries::get_appointment(&conn, &id)?.or_not_found(msg::APPOINTMENT_NOT_FOUND)?;
    tracing::info!(appointment_id = %id, "Booking cancelled");

    state.feed.publish(
        ChangeEvent::new(
            ChangeKind::Appointment,
            ChangeAction::Update,
            &appointment.user_id,
            &appointment.id,
        )
        .with_record(&appointment),
    );
    Ok(Json(appointment))
}
