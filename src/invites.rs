//! Invite token lifecycle: issuing, classifying and linking tokens.

use serde::Serialize;

use crate::crypto::{generate_token, hash_secret};
use crate::error::msg;
use crate::models::{MemberStatus, TeamMember};
use crate::util::{SECONDS_PER_DAY, site_url};

/// A freshly generated invite token. Only `hash` is persisted.
pub struct IssuedToken {
    pub token: String,
    pub hash: String,
    pub expires_at: i64,
}

pub fn issue_token(now: i64, expiry_days: i64) -> IssuedToken {
    let token = generate_token();
    let hash = hash_secret(&token);
    IssuedToken {
        token,
        hash,
        expires_at: now + expiry_days.max(1) * SECONDS_PER_DAY,
    }
}

pub fn invite_url(base_url: &str, token: &str) -> String {
    site_url(base_url, &format!("invite?token={}", token))
}

/// Result of looking up an invite token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteOutcome {
    Valid,
    Expired,
    AlreadyAccepted,
    NotFound,
    WrongStatus,
}

impl InviteOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            InviteOutcome::Valid => "",
            InviteOutcome::Expired => msg::INVITE_EXPIRED,
            InviteOutcome::AlreadyAccepted => msg::INVITE_ALREADY_ACCEPTED,
            InviteOutcome::NotFound => msg::INVITE_NOT_FOUND,
            InviteOutcome::WrongStatus => msg::INVITE_WRONG_STATUS,
        }
    }
}

/// Classify the member row a token resolved to (if any).
pub fn classify(member: Option<&TeamMember>, now: i64) -> InviteOutcome {
    let Some(member) = member else {
        return InviteOutcome::NotFound;
    };
    match member.status {
        MemberStatus::Active => InviteOutcome::AlreadyAccepted,
        MemberStatus::Inactive => InviteOutcome::WrongStatus,
        MemberStatus::Pending if member.is_invite_expired(now) => InviteOutcome::Expired,
        MemberStatus::Pending if member.invite_token_hash.is_none() => InviteOutcome::WrongStatus,
        MemberStatus::Pending => InviteOutcome::Valid,
    }
}

/// Tokens are 43-character URL-safe strings; anything else cannot match.
pub fn is_plausible_token(token: &str) -> bool {
    let token = token.trim();
    !token.is_empty()
        && token.len() <= 128
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TeamRole;

    fn member(status: MemberStatus, expires_at: Option<i64>) -> TeamMember {
        TeamMember {
            id: "m1".into(),
            organization_id: "owner".into(),
            user_id: None,
            email: "a@b.com".into(),
            role: TeamRole::Member,
            status,
            invite_token_hash: Some("h".into()),
            invite_expires_at: expires_at,
            invited_by: Some("owner".into()),
            activated_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn classification_covers_every_state() {
        assert_eq!(classify(None, 10), InviteOutcome::NotFound);
        assert_eq!(
            classify(Some(&member(MemberStatus::Pending, Some(100))), 10),
            InviteOutcome::Valid
        );
        assert_eq!(
            classify(Some(&member(MemberStatus::Pending, Some(100))), 100),
            InviteOutcome::Expired
        );
        assert_eq!(
            classify(Some(&member(MemberStatus::Active, Some(100))), 500),
            InviteOutcome::AlreadyAccepted
        );
        assert_eq!(
            classify(Some(&member(MemberStatus::Inactive, Some(100))), 10),
            InviteOutcome::WrongStatus
        );
    }

    #[test]
    fn expired_message_mentions_expiry() {
        assert!(InviteOutcome::Expired.message().contains("expired"));
    }

    #[test]
    fn issued_token_expires_in_the_future() {
        let issued = issue_token(1_000, 7);
        assert_eq!(issued.expires_at, 1_000 + 7 * SECONDS_PER_DAY);
        assert_eq!(issued.hash, hash_secret(&issued.token));
        assert!(is_plausible_token(&issued.token));
    }

    #[test]
    fn implausible_tokens_rejected() {
        assert!(!is_plausible_token(""));
        assert!(!is_plausible_token("has space"));
        assert!(!is_plausible_token(&"a".repeat(200)));
    }

    #[test]
    fn invite_url_embeds_token() {
        assert_eq!(
            invite_url("https://portal.example.com/", "abc"),
            "https://portal.example.com/invite?token=abc"
        );
    }
}
