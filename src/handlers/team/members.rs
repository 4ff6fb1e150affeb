use axum::{Extension, extract::State};
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::invites::{invite_url, issue_token};
use crate::middleware::AuthContext;
use crate::models::{MemberStatus, TeamMember, TeamMemberView, UpdateTeamMember, UserDeletionReport};
use crate::permissions::PermissionContext;
use crate::util::now;

use super::{OrgQuery, owned_workspace};

/// Load a member and check the caller owns its organization.
///
/// Members of other organizations are refused with 403, not hidden.
fn owned_member(conn: &rusqlite::Connection, auth: &AuthContext, id: &str) -> Result<TeamMember> {
    let member = queries::get_team_member(conn, id)?.or_not_found(msg::MEMBER_NOT_FOUND)?;
    if member.organization_id != auth.user_id {
        return Err(AppError::Forbidden(msg::NOT_WORKSPACE_OWNER.into()));
    }
    Ok(member)
}

/// List an organization's members. Open to the owner and active members.
pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<OrgQuery>,
) -> Result<Json<Vec<TeamMemberView>>> {
    let organization_id = query.organization_id(&auth);
    let conn = state.db.get()?;
    PermissionContext::resolve(&conn, organization_id, &auth.user_id)?.require_member()?;
    Ok(Json(queries::list_team_members(&conn, organization_id)?))
}

#[derive(Debug, Serialize)]
pub struct ResendInviteResponse {
    pub success: bool,
    pub member: TeamMember,
    pub invite_url: String,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Issue a fresh token and expiry for a pending invite and email it again.
pub async fn resend_invite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<ResendInviteResponse>> {
    let (workspace, member, issued) = {
        let mut conn = state.db.get()?;
        let member = owned_member(&conn, &auth, &id)?;
        if member.status != MemberStatus::Pending {
            return Err(AppError::BadRequest(msg::MEMBER_NOT_PENDING.into()));
        }
        let workspace = owned_workspace(&mut conn, &auth)?;

        let issued = issue_token(now(), state.invite_expiry_days);
        if !queries::refresh_invite(&conn, &member.id, &issued.hash, issued.expires_at)? {
            return Err(AppError::BadRequest(msg::MEMBER_NOT_PENDING.into()));
        }
        let member = queries::get_team_member(&conn, &member.id)?.or_not_found(msg::MEMBER_NOT_FOUND)?;
        (workspace, member, issued)
    };

    tracing::info!(member_id = %member.id, "Invitation resent");
    let warning = super::invites::send_invite_email(&state, &auth, &workspace, &member, &issued).await;

    Ok(Json(ResendInviteResponse {
        success: true,
        invite_url: invite_url(&state.base_url, &issued.token),
        token: issued.token,
        member,
        warning,
    }))
}

/// Change a member's role or revoke them (`status: "inactive"`).
pub async fn update_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(input): Json<UpdateTeamMember>,
) -> Result<Json<TeamMember>> {
    let conn = state.db.get()?;
    let current = owned_member(&conn, &auth, &id)?;

    // Pending becomes active only through acceptance.
    match (current.status, input.status) {
        (_, None) | (_, Some(MemberStatus::Inactive)) => {}
        (MemberStatus::Active, Some(MemberStatus::Active)) => {}
        (MemberStatus::Inactive, Some(MemberStatus::Active)) if current.user_id.is_some() => {}
        _ => return Err(AppError::BadRequest(msg::MEMBER_STATUS_CHANGE.into())),
    }

    let member = queries::update_team_member(&conn, &id, &input)?.or_not_found(msg::MEMBER_NOT_FOUND)?;
    tracing::info!(member_id = %member.id, status = %member.status.as_ref(), "Team member updated");
    Ok(Json(member))
}

#[derive(Debug, Serialize)]
pub struct RemoveMemberResponse {
    pub success: bool,
    /// Present when the member's linked account was deleted too
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_account: Option<UserDeletionReport>,
}

/// Remove a member and, if linked, their account with all of its data.
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<RemoveMemberResponse>> {
    let mut conn = state.db.get()?;
    let member = owned_member(&conn, &auth, &id)?;

    if member.user_id.as_deref() == Some(auth.user_id.as_str()) {
        return Err(AppError::BadRequest(msg::CANNOT_REMOVE_SELF.into()));
    }

    let deleted_account = queries::remove_team_member(&mut conn, &member)?;

    tracing::info!(
        member_id = %member.id,
        organization_id = %member.organization_id,
        account_deleted = deleted_account.is_some(),
        "Team member removed"
    );

    Ok(Json(RemoveMemberResponse {
        success: true,
        deleted_account,
    }))
}
