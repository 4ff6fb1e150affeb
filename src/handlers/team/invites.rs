use axum::{Extension, extract::State};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::email::{EmailSendResult, InvitationEmail};
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::invites::{IssuedToken, invite_url, issue_token};
use crate::middleware::AuthContext;
use crate::models::{CreateInvite, MemberStatus, TeamMember, Workspace, normalize_email};
use crate::util::now;

use super::owned_workspace;

#[derive(Debug, Serialize)]
pub struct InviteCreatedResponse {
    pub success: bool,
    pub member: TeamMember,
    pub invite_url: String,
    pub token: String,
    /// Set when the invitation email could not be delivered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Reject an invite that would duplicate an open one.
fn check_existing(conn: &Connection, organization_id: &str, email: &str) -> Result<()> {
    let now = now();
    for existing in queries::list_open_members_by_email(conn, organization_id, email)? {
        match existing.status {
            MemberStatus::Active => return Err(AppError::Conflict(msg::ALREADY_MEMBER.into())),
            MemberStatus::Pending if !existing.is_invite_expired(now) => {
                return Err(AppError::Conflict(msg::DUPLICATE_INVITE.into()));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Email an invite link. Delivery problems become a warning, never an error.
pub(super) async fn send_invite_email(
    state: &AppState,
    auth: &AuthContext,
    workspace: &Workspace,
    member: &TeamMember,
    issued: &IssuedToken,
) -> Option<String> {
    let inviter_name = match state.db.get() {
        Ok(conn) => queries::get_profile(&conn, &auth.user_id)
            .ok()
            .flatten()
            .map(|p| p.full_name)
            .unwrap_or_else(|| auth.email.clone()),
        Err(_) => auth.email.clone(),
    };
    let url = invite_url(&state.base_url, &issued.token);

    let result = state
        .email_service
        .send_invitation(InvitationEmail {
            to: &member.email,
            organization_name: &workspace.name,
            inviter_name: &inviter_name,
            role: member.role,
            invite_url: &url,
            expires_at: issued.expires_at,
        })
        .await;

    match result {
        Ok(EmailSendResult::Sent) => None,
        Ok(EmailSendResult::NoApiKey) => {
            Some("Email delivery is not configured; share the invite link manually".into())
        }
        Err(e) => {
            tracing::warn!(member_id = %member.id, "Failed to send invitation email: {}", e);
            Some("The invitation was created but the email could not be sent".into())
        }
    }
}

/// Invite someone to the caller's workspace.
///
/// Ownership is checked before the payload is interpreted, so a non-owner
/// is refused whatever they send.
pub async fn create_invite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<InviteCreatedResponse>> {
    match body.get("organization_id") {
        None | Some(serde_json::Value::Null) => {}
        Some(serde_json::Value::String(id)) if *id == auth.user_id => {}
        Some(_) => return Err(AppError::Forbidden(msg::NOT_WORKSPACE_OWNER.into())),
    }

    let input: CreateInvite =
        serde_json::from_value(body).map_err(|e| AppError::BadRequest(e.to_string()))?;
    input.validate()?;

    let email = normalize_email(&input.email);
    if email == normalize_email(&auth.email) {
        return Err(AppError::BadRequest(msg::CANNOT_INVITE_SELF.into()));
    }

    let (workspace, member, issued) = {
        let mut conn = state.db.get()?;
        let workspace = owned_workspace(&mut conn, &auth)?;

        // Duplicate check and insert share one write lock.
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        check_existing(&tx, &workspace.owner_id, &email)?;

        let issued = issue_token(now(), state.invite_expiry_days);
        let member = queries::create_invite(
            &tx,
            &queries::NewInvite {
                organization_id: &workspace.owner_id,
                email: &email,
                role: input.role,
                invited_by: &auth.user_id,
                token_hash: &issued.hash,
                expires_at: issued.expires_at,
            },
        )?;
        tx.commit()?;
        (workspace, member, issued)
    };

    tracing::info!(
        member_id = %member.id,
        organization_id = %member.organization_id,
        role = %member.role.as_ref(),
        "Invitation created"
    );

    let warning = send_invite_email(&state, &auth, &workspace, &member, &issued).await;

    Ok(Json(InviteCreatedResponse {
        success: true,
        invite_url: invite_url(&state.base_url, &issued.token),
        token: issued.token,
        member,
        warning,
    }))
}
