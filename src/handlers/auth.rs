//! Email/password sign-up and sign-in, and the caller's own profile.

use axum::{
    Extension, Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::crypto::{hash_password, verify_password};
use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::Json;
use crate::middleware::AuthContext;
use crate::models::{CreateUser, SignIn, SignUp, UpdateProfile, UserAccount, normalize_email};
use crate::rate_limit;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub token: String,
    pub user: UserAccount,
}

pub async fn sign_up(
    State(state): State<AppState>,
    Json(input): Json<SignUp>,
) -> Result<Json<SessionResponse>> {
    let input = CreateUser::from(input);
    input.validate()?;

    let mut conn = state.db.get()?;
    let password_hash = hash_password(&input.password)?;
    let user = match queries::create_user(&mut conn, &input, Some(&password_hash)) {
        Ok(user) => user,
        Err(e) if e.is_constraint_violation() => {
            return Err(AppError::Conflict(msg::EMAIL_TAKEN.into()));
        }
        Err(e) => return Err(e),
    };

    tracing::info!(user_id = %user.id, "Account created");
    let token = state.sessions.issue(&user.id, &user.email, user.role)?;
    Ok(Json(SessionResponse {
        success: true,
        token,
        user,
    }))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(input): Json<SignIn>,
) -> Result<Json<SessionResponse>> {
    let conn = state.db.get()?;
    let user = queries::get_user_by_email(&conn, &normalize_email(&input.email))?
        .ok_or(AppError::Unauthorized)?;

    let verified = user
        .password_hash
        .as_deref()
        .is_some_and(|hash| verify_password(&input.password, hash));
    if !verified {
        return Err(AppError::Unauthorized);
    }

    let account = queries::get_account(&conn, &user.id)?.ok_or(AppError::Unauthorized)?;
    let token = state.sessions.issue(&account.id, &account.email, account.role)?;
    Ok(Json(SessionResponse {
        success: true,
        token,
        user: account,
    }))
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UserAccount>> {
    let conn = state.db.get()?;
    let account = queries::get_account(&conn, &auth.user_id)?.or_not_found(msg::USER_NOT_FOUND)?;
    Ok(Json(account))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<UpdateProfile>,
) -> Result<Json<UserAccount>> {
    input.validate()?;
    let conn = state.db.get()?;
    queries::update_profile(&conn, &auth.user_id, &input)?;
    let account = queries::get_account(&conn, &auth.user_id)?.or_not_found(msg::USER_NOT_FOUND)?;
    Ok(Json(account))
}

/// Public sign-up and sign-in, strictly rate limited.
pub fn router(rate_limit: RateLimitConfig) -> Router<AppState> {
    let routes = Router::new()
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-in", post(sign_in));
    rate_limit::limit(routes, rate_limit.strict_rpm)
}

/// Routes that need a session; layered by the caller.
pub fn session_router() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me).put(update_me))
}
