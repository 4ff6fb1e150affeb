//! Booking reminders: emailed once per appointment, ahead of its start.

use std::time::Duration;

use rusqlite::Connection;

use crate::db::{AppState, queries};
use crate::email::BookingReminderEmail;
use crate::error::Result;
use crate::models::{Appointment, NewNotification};
use crate::notify::notify_quietly;
use crate::util::{SECONDS_PER_DAY, now};

/// How far ahead of the start time a reminder goes out.
pub const REMINDER_HORIZON_SECS: i64 = SECONDS_PER_DAY;

fn service_name(conn: &Connection, appointment: &Appointment) -> Result<String> {
    Ok(match appointment.service_id {
        Some(ref id) => queries::get_service(conn, id)?.map(|s| s.name_en),
        None => None,
    }
    .unwrap_or_else(|| "consultation".to_string()))
}

/// Email a booking reminder, stamp `reminder_sent_at` and notify the client.
///
/// A failed send leaves the booking unstamped so the next pass retries it.
pub async fn send_reminder(state: &AppState, appointment: &Appointment) -> Result<()> {
    let service = {
        let conn = state.db.get()?;
        service_name(&conn, appointment)?
    };

    state
        .email_service
        .send_booking_reminder(BookingReminderEmail {
            to: &appointment.client_email,
            client_name: &appointment.client_name,
            service_name: &service,
            date: &appointment.appointment_date,
            time: &appointment.appointment_time,
        })
        .await?;

    let conn = state.db.get()?;
    queries::mark_reminder_sent(&conn, &appointment.id)?;
    notify_quietly(
        &conn,
        &state.feed,
        &appointment.user_id,
        &NewNotification::new(
            "Upcoming appointment",
            format!(
                "Your {} is on {} at {}",
                service, appointment.appointment_date, appointment.appointment_time
            ),
        )
        .link(format!("/portal/appointments/{}", appointment.id)),
    );
    tracing::info!(appointment_id = %appointment.id, "Booking reminder sent");
    Ok(())
}

/// Remind every booking starting within the horizon. Returns how many were sent.
pub async fn run_reminder_pass(state: &AppState) -> Result<usize> {
    let due = {
        let conn = state.db.get()?;
        queries::list_due_reminders(&conn, now(), REMINDER_HORIZON_SECS)?
    };

    let mut sent = 0;
    for appointment in &due {
        match send_reminder(state, appointment).await {
            Ok(()) => sent += 1,
            Err(e) => {
                tracing::warn!(appointment_id = %appointment.id, "Failed to send reminder: {}", e);
            }
        }
    }
    Ok(sent)
}

/// Spawns the periodic reminder task. An interval of 0 disables it.
pub fn spawn_reminder_task(state: AppState, interval_secs: u64) {
    if interval_secs == 0 {
        tracing::info!("Booking reminders disabled");
        return;
    }
    tokio::spawn(async move {
        let interval = Duration::from_secs(interval_secs);
        loop {
            tokio::time::sleep(interval).await;
            match run_reminder_pass(&state).await {
                Ok(0) => {}
                Ok(count) => tracing::debug!("Sent {} booking reminders", count),
                Err(e) => tracing::warn!("Reminder pass failed: {}", e),
            }
        }
    });
    tracing::info!("Booking reminder task started (runs every {}s)", interval_secs);
}
