use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::models::UserRole;
use crate::util::extract_bearer_token;

/// The authenticated caller, inserted into request extensions by [`session_auth`].
///
/// The role is re-read from `user_roles` on every request, so demotions take
/// effect without waiting for the token to expire.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub email: String,
    pub role: UserRole,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(msg::ADMIN_REQUIRED.into()))
        }
    }
}

/// Resolve a bearer session token to an [`AuthContext`].
pub fn authenticate(state: &AppState, token: &str) -> Result<AuthContext> {
    let session = state.sessions.verify(token)?;
    let conn = state.db.get()?;
    let user = queries::get_user_by_id(&conn, &session.user_id)?.ok_or(AppError::Unauthorized)?;
    let role = queries::get_user_role(&conn, &user.id)?.unwrap_or(UserRole::Client);
    Ok(AuthContext {
        user_id: user.id,
        email: user.email,
        role,
    })
}

pub async fn session_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = extract_bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;
    let context = authenticate(&state, token)?;
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Layered after [`session_auth`] on admin routes.
pub async fn require_admin(request: Request, next: Next) -> Result<Response> {
    let context = request
        .extensions()
        .get::<AuthContext>()
        .ok_or(AppError::Unauthorized)?;
    context.require_admin()?;
    Ok(next.run(request).await)
}

/// Session for routes where signing in is optional (invite acceptance).
///
/// A missing header yields `None`; a present but invalid token is rejected.
pub struct MaybeAuth(pub Option<AuthContext>);

impl FromRequestParts<AppState> for MaybeAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match extract_bearer_token(&parts.headers) {
            Some(token) => Ok(MaybeAuth(Some(authenticate(state, token)?))),
            None => Ok(MaybeAuth(None)),
        }
    }
}
