use axum::{Extension, extract::State};
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Path, Query};
use crate::middleware::AuthContext;
use crate::models::{PermissionFlag, RolePermissions, TeamRole, UpdateRolePermissions};
use crate::permissions::{GateDecision, GateFallback, PermissionContext, gate};

use super::{OrgQuery, owned_workspace};

/// The caller's role and effective flags in an organization.
pub async fn get_my_permissions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<OrgQuery>,
) -> Result<Json<PermissionContext>> {
    let conn = state.db.get()?;
    let ctx = PermissionContext::resolve(&conn, query.organization_id(&auth), &auth.user_id)?;
    Ok(Json(ctx))
}

/// Every role's flag set. Needs `access_settings` (owners always pass).
pub async fn list_permissions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<OrgQuery>,
) -> Result<Json<Vec<RolePermissions>>> {
    let organization_id = query.organization_id(&auth);
    let mut conn = state.db.get()?;
    let ctx = PermissionContext::resolve(&conn, organization_id, &auth.user_id)?;
    ctx.require(PermissionFlag::AccessSettings)?;
    if ctx.is_owner {
        owned_workspace(&mut conn, &auth)?;
    }
    Ok(Json(queries::list_role_permissions(&conn, organization_id)?))
}

/// Toggle flags for one role in the caller's own workspace.
pub async fn update_permissions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(role): Path<TeamRole>,
    Json(input): Json<UpdateRolePermissions>,
) -> Result<Json<RolePermissions>> {
    let mut conn = state.db.get()?;
    let workspace = owned_workspace(&mut conn, &auth)?;
    let updated = queries::update_role_permissions(&conn, &workspace.owner_id, role, &input)?;
    tracing::info!(
        organization_id = %workspace.owner_id,
        role = %role.as_ref(),
        "Role permissions updated"
    );
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct CheckPermissionRequest {
    #[serde(default)]
    pub organization_id: Option<String>,
    pub flag: PermissionFlag,
    #[serde(default)]
    pub fallback: GateFallback,
}

#[derive(Debug, Serialize)]
pub struct CheckPermissionResponse {
    pub allowed: bool,
    #[serde(flatten)]
    pub decision: GateDecision,
}

/// Evaluate the permission gate for the caller.
pub async fn check_permission(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CheckPermissionRequest>,
) -> Result<Json<CheckPermissionResponse>> {
    let organization_id = input.organization_id.as_deref().unwrap_or(&auth.user_id);
    let conn = state.db.get()?;
    let ctx = PermissionContext::resolve(&conn, organization_id, &auth.user_id)?;
    let decision = gate(&ctx, input.flag, &input.fallback);
    Ok(Json(CheckPermissionResponse {
        allowed: decision == GateDecision::Render,
        decision,
    }))
}
