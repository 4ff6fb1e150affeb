use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::validate_email_format;
use crate::error::{AppError, Result, msg};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectStatus {
    NotStarted,
    InProgress,
    Review,
    Completed,
    OnHold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub user_id: String,
    pub service_id: Option<String>,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    /// YYYY-MM-DD
    pub appointment_date: String,
    /// HH:MM
    pub appointment_time: String,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub progress: i32,
    pub project_status: ProjectStatus,
    pub reminder_sent_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Appointment {
    /// Scheduled start as a Unix timestamp (UTC). None if the stored values are malformed.
    pub fn starts_at(&self) -> Option<i64> {
        let date = parse_date(&self.appointment_date).ok()?;
        let time = parse_time(&self.appointment_time).ok()?;
        Some(NaiveDateTime::new(date, time).and_utc().timestamp())
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(msg::INVALID_DATE.into()))
}

pub fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| AppError::BadRequest(msg::INVALID_TIME.into()))
}

fn validate_progress(progress: i32) -> Result<()> {
    if !(0..=100).contains(&progress) {
        return Err(AppError::BadRequest(msg::INVALID_PROGRESS.into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateAppointment {
    #[serde(default)]
    pub service_id: Option<String>,
    pub client_name: String,
    pub client_email: String,
    #[serde(default)]
    pub client_phone: Option<String>,
    pub appointment_date: String,
    pub appointment_time: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateAppointment {
    pub fn validate(&self) -> Result<()> {
        if self.client_name.trim().is_empty() {
            return Err(AppError::BadRequest(msg::NAME_EMPTY.into()));
        }
        validate_email_format(&self.client_email)?;
        parse_date(&self.appointment_date)?;
        parse_time(&self.appointment_time)?;
        Ok(())
    }
}

/// Admin-side booking update (status, scheduling, project tracking).
#[derive(Debug, Deserialize)]
pub struct UpdateAppointment {
    pub status: Option<AppointmentStatus>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub notes: Option<String>,
    pub progress: Option<i32>,
    pub project_status: Option<ProjectStatus>,
}

impl UpdateAppointment {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref date) = self.appointment_date {
            parse_date(date)?;
        }
        if let Some(ref time) = self.appointment_time {
            parse_time(time)?;
        }
        if let Some(progress) = self.progress {
            validate_progress(progress)?;
        }
        Ok(())
    }

    /// Rescheduling clears the reminder marker so the new slot gets a reminder.
    pub fn reschedules(&self) -> bool {
        self.appointment_date.is_some() || self.appointment_time.is_some()
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
}
