use axum::{Extension, extract::State};
use rusqlite::Connection;
use serde::Serialize;

use crate::crypto::hash_password;
use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::middleware::AuthContext;
use crate::models::{
    AdminUpdateUser, CreateUser, UpdateProfile, UserAccount, UserDeletionReport, UserRole,
};
use crate::pagination::{Paginated, PaginationQuery};

pub async fn list_users(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Paginated<UserAccount>>> {
    let conn = state.db.get()?;
    let page = queries::list_accounts_paginated(&conn, pagination.limit(), pagination.offset())?;
    Ok(Json(Paginated::from_page(page, &pagination)))
}

/// Provision an account directly. Admin-created accounts are pre-confirmed.
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(mut input): Json<CreateUser>,
) -> Result<Json<UserAccount>> {
    input.validate()?;
    input.email_confirmed = true;

    let password_hash = hash_password(&input.password)?;
    let mut conn = state.db.get()?;
    let user = match queries::create_user(&mut conn, &input, Some(&password_hash)) {
        Ok(user) => user,
        Err(e) if e.is_constraint_violation() => {
            return Err(AppError::Conflict(msg::EMAIL_TAKEN.into()));
        }
        Err(e) => return Err(e),
    };

    tracing::info!(user_id = %user.id, role = %user.role.as_ref(), by = %auth.user_id, "Account provisioned");
    Ok(Json(user))
}

/// Refuse changes that would leave the platform without an administrator.
fn ensure_not_last_admin(conn: &Connection, user_id: &str) -> Result<()> {
    if queries::get_user_role(conn, user_id)? == Some(UserRole::Admin) && queries::count_admins(conn)? <= 1 {
        return Err(AppError::Conflict(msg::LAST_ADMIN.into()));
    }
    Ok(())
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(input): Json<AdminUpdateUser>,
) -> Result<Json<UserAccount>> {
    input.validate()?;
    let password_hash = input.password.as_deref().map(hash_password).transpose()?;

    let conn = state.db.get()?;
    queries::get_user_by_id(&conn, &id)?.or_not_found(msg::USER_NOT_FOUND)?;

    if let Some(role) = input.role {
        if role != UserRole::Admin {
            ensure_not_last_admin(&conn, &id)?;
        }
        queries::set_user_role(&conn, &id, role)?;
    }
    queries::update_profile(
        &conn,
        &id,
        &UpdateProfile {
            full_name: input.full_name,
            phone: input.phone,
        },
    )?;
    if let Some(ref hash) = password_hash {
        queries::set_password_hash(&conn, &id, hash)?;
    }

    let user = queries::get_account(&conn, &id)?.or_not_found(msg::USER_NOT_FOUND)?;
    tracing::info!(user_id = %id, by = %auth.user_id, "Account updated");
    Ok(Json(user))
}

#[derive(Debug, Serialize)]
pub struct DeleteUserResponse {
    pub success: bool,
    pub deleted: UserDeletionReport,
}

/// Delete an account and every row that references it, in one transaction.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<DeleteUserResponse>> {
    let mut conn = state.db.get()?;
    ensure_not_last_admin(&conn, &id)?;

    let report = queries::delete_user_cascade(&mut conn, &id)?.or_not_found(msg::USER_NOT_FOUND)?;
    tracing::info!(user_id = %id, by = %auth.user_id, ?report, "Account deleted");
    Ok(Json(DeleteUserResponse {
        success: true,
        deleted: report,
    }))
}
