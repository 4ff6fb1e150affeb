use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};

use super::validate_email_format;
use crate::error::Result;

/// Role of an invited participant inside an organization.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString, EnumIter,
)]
pub enum TeamRole {
    Admin,
    Member,
    Viewer,
}

/// Stored membership status. `expired` is never stored; see [`EffectiveStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MemberStatus {
    Pending,
    Active,
    Inactive,
}

/// Status as seen by clients, with lapsed pending invites reported as expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectiveStatus {
    Pending,
    Active,
    Inactive,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: String,
    /// Owner's user id
    pub organization_id: String,
    pub user_id: Option<String>,
    pub email: String,
    pub role: TeamRole,
    pub status: MemberStatus,
    #[serde(skip_serializing)]
    pub invite_token_hash: Option<String>,
    pub invite_expires_at: Option<i64>,
    pub invited_by: Option<String>,
    pub activated_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TeamMember {
    pub fn is_invite_expired(&self, now: i64) -> bool {
        self.status == MemberStatus::Pending
            && self.invite_expires_at.is_some_and(|exp| exp <= now)
    }

    pub fn effective_status(&self, now: i64) -> EffectiveStatus {
        match self.status {
            MemberStatus::Pending if self.is_invite_expired(now) => EffectiveStatus::Expired,
            MemberStatus::Pending => EffectiveStatus::Pending,
            MemberStatus::Active => EffectiveStatus::Active,
            MemberStatus::Inactive => EffectiveStatus::Inactive,
        }
    }
}

/// Team member as listed to the organization.
#[derive(Debug, Clone, Serialize)]
pub struct TeamMemberView {
    #[serde(flatten)]
    pub member: TeamMember,
    pub effective_status: EffectiveStatus,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvite {
    pub email: String,
    pub role: TeamRole,
    /// Defaults to the requester's own workspace.
    #[serde(default)]
    pub organization_id: Option<String>,
}

impl CreateInvite {
    pub fn validate(&self) -> Result<()> {
        validate_email_format(&self.email)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateTeamMember {
    pub role: Option<TeamRole>,
    pub status: Option<MemberStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(expires_at: Option<i64>) -> TeamMember {
        TeamMember {
            id: "m1".into(),
            organization_id: "owner".into(),
            user_id: None,
            email: "a@b.com".into(),
            role: TeamRole::Member,
            status: MemberStatus::Pending,
            invite_token_hash: Some("hash".into()),
            invite_expires_at: expires_at,
            invited_by: Some("owner".into()),
            activated_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn pending_invite_past_expiry_is_expired() {
        let member = pending(Some(100));
        assert_eq!(member.effective_status(99), EffectiveStatus::Pending);
        assert_eq!(member.effective_status(100), EffectiveStatus::Expired);
        assert_eq!(member.effective_status(500), EffectiveStatus::Expired);
    }

    #[test]
    fn active_member_never_expires() {
        let mut member = pending(Some(100));
        member.status = MemberStatus::Active;
        assert_eq!(member.effective_status(500), EffectiveStatus::Active);
    }

    #[test]
    fn roles_serialize_pascal_case() {
        assert_eq!(serde_json::to_string(&TeamRole::Member).unwrap(), "\"Member\"");
        assert_eq!("Viewer".parse::<TeamRole>().unwrap(), TeamRole::Viewer);
        assert_eq!(serde_json::to_string(&MemberStatus::Pending).unwrap(), "\"pending\"");
    }
}
