use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// User-facing error messages, shared by handlers and tests.
pub mod msg {
    pub const EMAIL_EMPTY: &str = "Email cannot be empty";
    pub const INVALID_EMAIL_FORMAT: &str = "Invalid email format";
    pub const NAME_EMPTY: &str = "Name cannot be empty";
    pub const PASSWORD_TOO_SHORT: &str = "Password must be at least 8 characters";
    pub const EMAIL_TAKEN: &str = "An account with this email already exists";

    pub const NOT_WORKSPACE_OWNER: &str = "Only the workspace owner can manage team membership";
    pub const NOT_ORG_MEMBER: &str = "You are not a member of this organization";
    pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action";
    pub const ADMIN_REQUIRED: &str = "Administrator access required";

    pub const DUPLICATE_INVITE: &str = "A pending invitation already exists for this email";
    pub const ALREADY_MEMBER: &str = "This email is already an active member of the organization";
    pub const CANNOT_INVITE_SELF: &str = "You cannot invite yourself";
    pub const CANNOT_REMOVE_SELF: &str = "You cannot remove yourself from your own workspace";
    pub const MEMBER_NOT_FOUND: &str = "Team member not found";
    pub const MEMBER_NOT_PENDING: &str = "Only pending invitations can be resent";
    pub const MEMBER_STATUS_CHANGE: &str =
        "Members can only be deactivated, or reactivated once they have joined";
    pub const ADMIN_ACCOUNT_PROTECTED: &str =
        "Administrator accounts can only be deleted from the admin console";

    pub const INVITE_NOT_FOUND: &str = "Invalid invitation link";
    pub const INVITE_EXPIRED: &str = "This invitation has expired";
    pub const INVITE_ALREADY_ACCEPTED: &str = "This invitation has already been accepted";
    pub const INVITE_WRONG_STATUS: &str = "This invitation is no longer active";
    pub const INVITE_PASSWORD_REQUIRED: &str =
        "A password is required to create your account";
    pub const INVITE_EMAIL_MISMATCH: &str =
        "You are signed in with a different email than the one invited";
    pub const INVITE_SIGN_IN_REQUIRED: &str =
        "An account already exists for this email; sign in to accept the invitation";

    pub const USER_NOT_FOUND: &str = "User not found";
    pub const SERVICE_NOT_FOUND: &str = "Service not found";
    pub const CATEGORY_NOT_FOUND: &str = "Category not found";
    pub const PACKAGE_NOT_FOUND: &str = "Service package not found";
    pub const APPOINTMENT_NOT_FOUND: &str = "Appointment not found";
    pub const TICKET_NOT_FOUND: &str = "Ticket not found";
    pub const NOTIFICATION_NOT_FOUND: &str = "Notification not found";
    pub const PAYMENT_NOT_FOUND: &str = "Payment not found";
    pub const ORDER_NOT_FOUND: &str = "Order not found";
    pub const ALREADY_PAID: &str = "This item has already been paid";
    pub const APPOINTMENT_NOT_CANCELLABLE: &str = "Only pending or confirmed appointments can be cancelled";
    pub const APPOINTMENT_NOT_REMINDABLE: &str = "Only upcoming appointments can be reminded";
    pub const TICKET_CLOSED: &str = "This ticket is closed";
    pub const SETTING_KEY_INVALID: &str = "Setting keys must be 1-64 characters of a-z, 0-9, '_' or '.'";
    pub const LAST_ADMIN: &str = "Cannot remove the last administrator";

    pub const INVALID_BODY: &str = "Invalid request body";
    pub const INVALID_QUERY: &str = "Invalid query parameters";
    pub const INVALID_PATH: &str = "Invalid path parameter";
    pub const JSON_CONTENT_TYPE: &str = "Expected a JSON body with Content-Type: application/json";

    pub const INVALID_DATE: &str = "Date must be in YYYY-MM-DD format";
    pub const INVALID_TIME: &str = "Time must be in HH:MM format";
    pub const INVALID_PROGRESS: &str = "Progress must be between 0 and 100";
    pub const INVALID_PRICE: &str = "Price cannot be negative";
    pub const INVALID_CURRENCY: &str = "Currency must be a 3-letter ISO code";
    pub const SUBJECT_EMPTY: &str = "Subject cannot be empty";
    pub const MESSAGE_EMPTY: &str = "Message cannot be empty";
    pub const NOTHING_TO_PAY: &str = "Nothing to pay for this item";
    pub const CHECKOUT_TARGET_REQUIRED: &str =
        "Exactly one of appointment_id or order_id is required";

    pub const PAYMENTS_NOT_CONFIGURED: &str = "Payments are not configured";
    pub const INVALID_SIGNATURE_FORMAT: &str = "Invalid signature format";
    pub const INVALID_TIMESTAMP_IN_SIGNATURE: &str = "Invalid timestamp in signature";
    pub const INVALID_WEBHOOK_SECRET: &str = "Invalid webhook secret";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<StatusCode> for AppError {
    fn from(code: StatusCode) -> Self {
        match code {
            StatusCode::UNAUTHORIZED => AppError::Unauthorized,
            StatusCode::FORBIDDEN => AppError::Forbidden(msg::PERMISSION_DENIED.into()),
            StatusCode::NOT_FOUND => AppError::NotFound("Resource not found".into()),
            _ => AppError::Internal(format!("Status: {}", code)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone())),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "Forbidden", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Upstream service error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// True for a UNIQUE or PRIMARY KEY constraint failure.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            AppError::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Converts `Option<T>` lookups into `AppError::NotFound` with a fixed message.
pub trait OptionExt<T> {
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.to_string()))
    }
}
