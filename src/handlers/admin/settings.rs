use axum::{Extension, extract::State};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::{Json, Path};
use crate::middleware::AuthContext;
use crate::models::{SiteSetting, UpdateSiteSetting};

const MAX_SETTING_KEY_LEN: usize = 64;

/// Keys are lowercase dotted identifiers, e.g. `hero.title` or `contact_email`.
pub fn is_valid_setting_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_SETTING_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
}

pub async fn update_setting(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(key): Path<String>,
    Json(input): Json<UpdateSiteSetting>,
) -> Result<Json<SiteSetting>> {
    if !is_valid_setting_key(&key) {
        return Err(AppError::BadRequest(msg::SETTING_KEY_INVALID.into()));
    }
    let conn = state.db.get()?;
    let setting = queries::upsert_site_setting(&conn, &key, &input.value, &auth.user_id)?;
    tracing::info!(key = %key, by = %auth.user_id, "Site setting updated");
    Ok(Json(setting))
}
