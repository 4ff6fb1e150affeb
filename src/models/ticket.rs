use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result, msg};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub user_id: String,
    pub subject: String,
    pub description: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub service_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketReply {
    pub id: String,
    pub ticket_id: String,
    pub author_id: String,
    pub message: String,
    pub is_staff: bool,
    pub created_at: i64,
}

#[derive(Debug, Serialize)]
pub struct TicketWithReplies {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub replies: Vec<TicketReply>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTicket {
    pub subject: String,
    pub description: String,
    #[serde(default)]
    pub priority: TicketPriority,
    #[serde(default)]
    pub service_id: Option<String>,
}

impl CreateTicket {
    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            return Err(AppError::BadRequest(msg::SUBJECT_EMPTY.into()));
        }
        if self.description.trim().is_empty() {
            return Err(AppError::BadRequest(msg::MESSAGE_EMPTY.into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicket {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketReply {
    pub message: String,
}

impl CreateTicketReply {
    pub fn validate(&self) -> Result<()> {
        if self.message.trim().is_empty() {
            return Err(AppError::BadRequest(msg::MESSAGE_EMPTY.into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}
