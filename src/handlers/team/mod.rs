mod invites;
mod members;
mod permissions;

pub use invites::*;
pub use members::*;
pub use permissions::*;

use axum::{
    Router,
    routing::{get, post, put},
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::middleware::AuthContext;
use crate::models::Workspace;

#[derive(Debug, Deserialize, Default)]
pub struct OrgQuery {
    /// Defaults to the caller's own workspace
    pub organization_id: Option<String>,
}

impl OrgQuery {
    pub fn organization_id<'a>(&'a self, auth: &'a AuthContext) -> &'a str {
        self.organization_id.as_deref().unwrap_or(&auth.user_id)
    }
}

/// The caller's own workspace, created with default permissions on first use.
fn owned_workspace(conn: &mut Connection, auth: &AuthContext) -> Result<Workspace> {
    if let Some(workspace) = queries::get_workspace(conn, &auth.user_id)? {
        return Ok(workspace);
    }
    let name = queries::get_profile(conn, &auth.user_id)?
        .map(|p| format!("{}'s workspace", p.full_name))
        .unwrap_or_else(|| "Workspace".to_string());
    queries::ensure_workspace(conn, &auth.user_id, &name)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/team/invites", post(create_invite))
        .route("/team/members", get(list_members))
        .route("/team/members/{id}", put(update_member).delete(remove_member))
        .route("/team/members/{id}/resend", post(resend_invite))
        .route("/team/permissions", get(list_permissions))
        .route("/team/permissions/me", get(get_my_permissions))
        .route("/team/permissions/check", post(check_permission))
        .route("/team/permissions/{role}", put(update_permissions))
}
