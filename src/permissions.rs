//! Workspace permission resolution and gating.
//!
//! A [`PermissionContext`] is resolved once per request for a (organization,
//! user) pair. [`gate`] turns it into a render decision for a single flag;
//! [`PermissionContext::require`] is the server-side equivalent.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::error::{AppError, Result, msg};
use crate::models::{PermissionFlag, PermissionSet, TeamRole};

/// The caller's standing inside one organization.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionContext {
    pub organization_id: String,
    pub user_id: String,
    pub is_owner: bool,
    /// None for the owner and for users who are not active members
    pub role: Option<TeamRole>,
    pub permissions: PermissionSet,
}

impl PermissionContext {
    /// Context for the organization owner. Owners hold every flag.
    pub fn owner(organization_id: &str) -> Self {
        Self {
            organization_id: organization_id.to_string(),
            user_id: organization_id.to_string(),
            is_owner: true,
            role: None,
            permissions: PermissionSet::all(),
        }
    }

    /// Resolve the caller's role and flag set.
    ///
    /// Non-members resolve to an empty flag set rather than an error, so
    /// [`gate`] can fall back instead of failing.
    pub fn resolve(conn: &Connection, organization_id: &str, user_id: &str) -> Result<Self> {
        if organization_id == user_id {
            return Ok(Self::owner(organization_id));
        }

        let Some(member) = queries::get_active_membership(conn, organization_id, user_id)? else {
            return Ok(Self {
                organization_id: organization_id.to_string(),
                user_id: user_id.to_string(),
                is_owner: false,
                role: None,
                permissions: PermissionSet::default(),
            });
        };

        let permissions = queries::get_role_permissions(conn, organization_id, member.role)?
            .map(|r| r.permissions)
            .unwrap_or_else(|| PermissionSet::default_for(member.role));

        Ok(Self {
            organization_id: organization_id.to_string(),
            user_id: user_id.to_string(),
            is_owner: false,
            role: Some(member.role),
            permissions,
        })
    }

    pub fn is_member(&self) -> bool {
        self.is_owner || self.role.is_some()
    }

    pub fn has(&self, flag: PermissionFlag) -> bool {
        self.is_owner || self.permissions.get(flag)
    }

    pub fn require(&self, flag: PermissionFlag) -> Result<()> {
        if self.has(flag) {
            Ok(())
        } else {
            Err(AppError::Forbidden(msg::PERMISSION_DENIED.into()))
        }
    }

    pub fn require_owner(&self) -> Result<()> {
        if self.is_owner {
            Ok(())
        } else {
            Err(AppError::Forbidden(msg::NOT_WORKSPACE_OWNER.into()))
        }
    }

    pub fn require_member(&self) -> Result<()> {
        if self.is_member() {
            Ok(())
        } else {
            Err(AppError::Forbidden(msg::NOT_ORG_MEMBER.into()))
        }
    }
}

/// What a gated view should do when the flag is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "to", rename_all = "snake_case")]
pub enum GateFallback {
    /// Render the fallback content in place
    #[default]
    Fallback,
    /// Send the viewer elsewhere
    Redirect(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "to", rename_all = "snake_case")]
pub enum GateDecision {
    Render,
    Fallback,
    Redirect(String),
}

/// Decide whether gated content renders for this context.
pub fn gate(ctx: &PermissionContext, flag: PermissionFlag, fallback: &GateFallback) -> GateDecision {
    if ctx.has(flag) {
        return GateDecision::Render;
    }
    match fallback {
        GateFallback::Fallback => GateDecision::Fallback,
        GateFallback::Redirect(to) => GateDecision::Redirect(to.clone()),
    }
}
