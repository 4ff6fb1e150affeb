use std::collections::HashSet;

use jwt_simple::prelude::*;

use super::SessionClaims;
use crate::error::{AppError, Result};
use crate::models::UserRole;

const ISSUER: &str = "brokerdesk";

/// HS256 key used to sign and verify portal session tokens.
pub struct SessionKeys {
    key: HS256Key,
    ttl_hours: u64,
}

/// A verified session: who is calling and with which claims.
#[derive(Debug, Clone)]
pub struct VerifiedSession {
    pub user_id: String,
    pub claims: SessionClaims,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl_hours: u64) -> Self {
        Self {
            key: HS256Key::from_bytes(secret),
            ttl_hours: ttl_hours.max(1),
        }
    }

    pub fn issue(&self, user_id: &str, email: &str, role: UserRole) -> Result<String> {
        let custom = SessionClaims {
            email: email.to_string(),
            role,
        };
        let claims = Claims::with_custom_claims(custom, Duration::from_hours(self.ttl_hours))
            .with_issuer(ISSUER)
            .with_subject(user_id);
        self.key
            .authenticate(claims)
            .map_err(|e| AppError::Internal(format!("Failed to sign session token: {}", e)))
    }

    /// Verify signature, issuer and expiry. Any failure is `Unauthorized`.
    pub fn verify(&self, token: &str) -> Result<VerifiedSession> {
        let options = VerificationOptions {
            allowed_issuers: Some(HashSet::from([ISSUER.to_string()])),
            ..Default::default()
        };
        let claims = self
            .key
            .verify_token::<SessionClaims>(token, Some(options))
            .map_err(|e| {
                tracing::debug!("Session token rejected: {}", e);
                AppError::Unauthorized
            })?;
        let user_id = claims.subject.ok_or(AppError::Unauthorized)?;
        Ok(VerifiedSession {
            user_id,
            claims: claims.custom,
        })
    }
}
