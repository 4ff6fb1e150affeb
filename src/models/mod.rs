mod appointment;
mod catalog;
mod notification;
mod order;
mod payment;
mod site_setting;
mod team_member;
mod ticket;
mod user;
mod workspace;

pub use appointment::*;
pub use catalog::*;
pub use notification::*;
pub use order::*;
pub use payment::*;
pub use site_setting::*;
pub use team_member::*;
pub use ticket::*;
pub use user::*;
pub use workspace::*;

use crate::error::{AppError, Result, msg};

/// Basic email format validation.
///
/// Validates that email has:
/// - Exactly one @ symbol
/// - Non-empty local part (before @)
/// - Non-empty domain part with at least one dot, not starting or ending with a dot
/// - No spaces in the local part
///
/// Intentionally permissive, not RFC 5322.
pub fn validate_email_format(email: &str) -> Result<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(AppError::BadRequest(msg::EMAIL_EMPTY.into()));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    let local_part = parts[0];
    let domain_part = parts[1];

    if local_part.is_empty() || local_part.contains(' ') {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    if domain_part.is_empty() || !domain_part.contains('.') {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    if domain_part.starts_with('.') || domain_part.ends_with('.') {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    Ok(())
}

/// Lowercased, trimmed email used for storage and comparisons.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(validate_email_format("a@b.com").is_ok());
        assert!(validate_email_format("  first.last+tag@sub.example.org ").is_ok());
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "   ", "no-at-sign", "a@@b.com", "@b.com", "a@b", "a@.com", "a@b.com.", "a b@c.com"] {
            assert!(validate_email_format(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn normalize_lowercases_and_trims() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
