use axum::extract::State;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::crypto::{hash_password, hash_secret};
use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::invites::{InviteOutcome, classify, is_plausible_token};
use crate::middleware::{AuthContext, MaybeAuth};
use crate::models::{CreateUser, NewNotification, TeamMember, TeamRole, UserRole, normalize_email};
use crate::notify::notify_quietly;
use crate::util::now;

#[derive(Debug, Deserialize)]
pub struct InviteTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct InviteDetails {
    pub email: String,
    pub role: TeamRole,
    pub organization_id: String,
    pub organization_name: String,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ValidateInviteResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<InviteDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<InviteOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// Resolve a raw token to its member row and outcome.
fn lookup(conn: &Connection, token: &str) -> Result<(Option<TeamMember>, InviteOutcome)> {
    if !is_plausible_token(token) {
        return Ok((None, InviteOutcome::NotFound));
    }
    let member = queries::get_member_by_token_hash(conn, &hash_secret(token.trim()))?;
    let outcome = classify(member.as_ref(), now());
    Ok((member, outcome))
}

fn organization_name(conn: &Connection, organization_id: &str) -> Result<String> {
    if let Some(workspace) = queries::get_workspace(conn, organization_id)? {
        return Ok(workspace.name);
    }
    Ok(queries::get_profile(conn, organization_id)?
        .map(|p| p.full_name)
        .unwrap_or_default())
}

/// Check an invite token without consuming it.
pub async fn validate_invite(
    State(state): State<AppState>,
    Json(input): Json<InviteTokenRequest>,
) -> Result<Json<ValidateInviteResponse>> {
    let conn = state.db.get()?;
    let (member, outcome) = lookup(&conn, &input.token)?;

    let member = match (outcome, member) {
        (InviteOutcome::Valid, Some(member)) => member,
        (outcome, _) => {
            return Ok(Json(ValidateInviteResponse {
                valid: false,
                data: None,
                reason: Some(outcome),
                error: Some(outcome.message()),
            }));
        }
    };

    Ok(Json(ValidateInviteResponse {
        valid: true,
        data: Some(InviteDetails {
            organization_name: organization_name(&conn, &member.organization_id)?,
            email: member.email,
            role: member.role,
            organization_id: member.organization_id,
            expires_at: member.invite_expires_at,
        }),
        reason: None,
        error: None,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AcceptInviteRequest {
    pub token: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize, Default)]
pub struct AcceptInviteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<TeamMember>,
    /// Session for a newly provisioned account
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<InviteOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl AcceptInviteResponse {
    fn failed(outcome: InviteOutcome) -> Self {
        Self {
            reason: Some(outcome),
            error: Some(outcome.message()),
            ..Default::default()
        }
    }

    fn rejected(error: &'static str) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    fn accepted(member: TeamMember, already_accepted: bool) -> Self {
        Self {
            success: true,
            member: Some(member),
            already_accepted,
            ..Default::default()
        }
    }
}

/// Which account the invite is linked to.
enum InviteAccount {
    Existing(String),
    Created { user_id: String, session_token: String },
}

/// Find or provision the account for an invite's email.
///
/// An existing account is only linked for a caller signed in as that account.
fn resolve_account(
    state: &AppState,
    conn: &mut Connection,
    auth: Option<&AuthContext>,
    member: &TeamMember,
    input: &AcceptInviteRequest,
) -> Result<std::result::Result<InviteAccount, &'static str>> {
    if let Some(user) = queries::get_user_by_email(conn, &member.email)? {
        return Ok(match auth {
            Some(auth) if auth.user_id == user.id => Ok(InviteAccount::Existing(user.id)),
            _ => Err(msg::INVITE_SIGN_IN_REQUIRED),
        });
    }

    let Some(password) = input.password.as_deref().filter(|p| !p.is_empty()) else {
        return Ok(Err(msg::INVITE_PASSWORD_REQUIRED));
    };

    let full_name = input
        .full_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| member.email.split('@').next().unwrap_or_default().to_string());
    let create = CreateUser {
        email: member.email.clone(),
        password: password.to_string(),
        full_name,
        phone: None,
        role: UserRole::Client,
        email_confirmed: true,
    };
    create.validate()?;
    let password_hash = hash_password(&create.password)?;

    let account = match queries::create_user(conn, &create, Some(&password_hash)) {
        Ok(account) => account,
        // The account was created meanwhile, e.g. by a concurrent acceptance.
        Err(e) if e.is_constraint_violation() => return Ok(Err(msg::INVITE_SIGN_IN_REQUIRED)),
        Err(e) => return Err(e),
    };
    let session_token = state.sessions.issue(&account.id, &account.email, account.role)?;
    Ok(Ok(InviteAccount::Created {
        user_id: account.id,
        session_token,
    }))
}

/// Accept an invite, linking or provisioning the invited account.
///
/// Replaying an accepted token succeeds without touching the member row.
pub async fn accept_invite(
    State(state): State<AppState>,
    MaybeAuth(auth): MaybeAuth,
    Json(input): Json<AcceptInviteRequest>,
) -> Result<Json<AcceptInviteResponse>> {
    let mut conn = state.db.get()?;
    let (member, outcome) = lookup(&conn, &input.token)?;

    let member = match (outcome, member) {
        (InviteOutcome::Valid, Some(member)) => member,
        (InviteOutcome::AlreadyAccepted, Some(member)) => {
            return Ok(Json(AcceptInviteResponse::accepted(member, true)));
        }
        (outcome, _) => return Ok(Json(AcceptInviteResponse::failed(outcome))),
    };

    if let Some(ref auth) = auth
        && normalize_email(&auth.email) != member.email
    {
        return Ok(Json(AcceptInviteResponse::rejected(msg::INVITE_EMAIL_MISMATCH)));
    }

    let account = match resolve_account(&state, &mut conn, auth.as_ref(), &member, &input)? {
        Ok(account) => account,
        Err(error) => return Ok(Json(AcceptInviteResponse::rejected(error))),
    };
    let (user_id, session_token) = match account {
        InviteAccount::Existing(user_id) => (user_id, None),
        InviteAccount::Created {
            user_id,
            session_token,
        } => (user_id, Some(session_token)),
    };

    let activated = queries::activate_member(&conn, &member.id, &user_id)?;
    let current = queries::get_team_member(&conn, &member.id)?
        .ok_or_else(|| AppError::NotFound(msg::MEMBER_NOT_FOUND.into()))?;

    if !activated {
        // Lost the race to a concurrent acceptance of the same token.
        return Ok(Json(match classify(Some(&current), now()) {
            InviteOutcome::AlreadyAccepted => AcceptInviteResponse::accepted(current, true),
            outcome => AcceptInviteResponse::failed(outcome),
        }));
    }

    tracing::info!(
        member_id = %current.id,
        organization_id = %current.organization_id,
        "Invitation accepted"
    );

    notify_quietly(
        &conn,
        &state.feed,
        &current.organization_id,
        &NewNotification::new(
            "Invitation accepted",
            format!("{} joined your workspace as {}", current.email, current.role.as_ref()),
        )
        .link("/team"),
    );

    Ok(Json(AcceptInviteResponse {
        session_token,
        ..AcceptInviteResponse::accepted(current, false)
    }))
}
