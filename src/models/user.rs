use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::validate_email_format;
use crate::error::{AppError, Result, msg};

const MIN_PASSWORD_LEN: usize = 8;

/// Platform role, one row per user in `user_roles`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserRole {
    Admin,
    Client,
}

/// Authentication identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub email_confirmed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub stripe_customer_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// User joined with profile and role, as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct UserAccount {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub email_confirmed: bool,
    pub created_at: i64,
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(msg::PASSWORD_TOO_SHORT.into()));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest(msg::NAME_EMPTY.into()));
    }
    Ok(())
}

/// Input for creating an account (sign-up, admin creation, invite acceptance).
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_role")]
    pub role: UserRole,
    /// Accounts provisioned by an admin or by invite acceptance skip email confirmation.
    #[serde(default)]
    pub email_confirmed: bool,
}

fn default_role() -> UserRole {
    UserRole::Client
}

impl CreateUser {
    pub fn validate(&self) -> Result<()> {
        validate_email_format(&self.email)?;
        validate_password(&self.password)?;
        validate_name(&self.full_name)
    }
}

#[derive(Debug, Deserialize)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl From<SignUp> for CreateUser {
    fn from(input: SignUp) -> Self {
        CreateUser {
            email: input.email,
            password: input.password,
            full_name: input.full_name,
            phone: input.phone,
            role: UserRole::Client,
            email_confirmed: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignIn {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfile {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

impl UpdateProfile {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.full_name {
            validate_name(name)?;
        }
        Ok(())
    }
}

/// Admin-side account update. Role changes go to `user_roles`.
#[derive(Debug, Deserialize)]
pub struct AdminUpdateUser {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub password: Option<String>,
}

impl AdminUpdateUser {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.full_name {
            validate_name(name)?;
        }
        if let Some(ref password) = self.password {
            validate_password(password)?;
        }
        Ok(())
    }
}

/// Row counts removed by a user deletion cascade.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserDeletionReport {
    pub notifications: usize,
    pub ticket_replies: usize,
    pub tickets: usize,
    pub payments: usize,
    pub subscriptions: usize,
    pub orders: usize,
    pub appointments: usize,
    pub team_members: usize,
    pub workspace_permissions: usize,
    pub workspaces: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(password: &str, name: &str) -> CreateUser {
        CreateUser {
            email: "client@example.com".into(),
            password: password.into(),
            full_name: name.into(),
            phone: None,
            role: UserRole::Client,
            email_confirmed: false,
        }
    }

    #[test]
    fn short_password_rejected() {
        assert!(input("short", "Client").validate().is_err());
        assert!(input("long enough", "Client").validate().is_ok());
    }

    #[test]
    fn blank_name_rejected() {
        assert!(input("long enough", "   ").validate().is_err());
    }

    #[test]
    fn role_round_trips_through_strings() {
        assert_eq!(UserRole::Admin.as_ref(), "admin");
        assert_eq!("client".parse::<UserRole>().unwrap(), UserRole::Client);
    }
}
