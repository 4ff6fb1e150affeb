use serde::{Deserialize, Serialize};

use crate::models::UserRole;

/// Custom claims carried by a session token.
/// Standard claims (iss, sub, iat, exp) are handled by jwt-simple; `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub email: String,
    /// Role at issue time. Authorization re-reads the stored role.
    pub role: UserRole,
}
