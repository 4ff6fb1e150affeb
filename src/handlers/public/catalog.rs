use axum::extract::State;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::models::{Language, LocalizedItem};

#[derive(Debug, Deserialize, Default)]
pub struct CatalogQuery {
    #[serde(default)]
    pub lang: Language,
    pub category_id: Option<String>,
    pub service_id: Option<String>,
}

pub async fn list_public_categories(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<LocalizedItem>>> {
    let conn = state.db.get()?;
    let categories = queries::list_categories(&conn, true)?;
    Ok(Json(
        categories.iter().map(|c| c.localize(query.lang)).collect(),
    ))
}

pub async fn list_public_services(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<LocalizedItem>>> {
    let conn = state.db.get()?;
    let services = queries::list_services(&conn, query.category_id.as_deref(), true)?;
    Ok(Json(services.iter().map(|s| s.localize(query.lang)).collect()))
}

pub async fn list_public_packages(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<LocalizedItem>>> {
    let conn = state.db.get()?;
    let packages = queries::list_packages(&conn, query.service_id.as_deref(), true)?;
    Ok(Json(packages.iter().map(|p| p.localize(query.lang)).collect()))
}

/// Site settings as a single `{key: value}` object.
pub async fn get_site_settings(State(state): State<AppState>) -> Result<Json<Map<String, Value>>> {
    let conn = state.db.get()?;
    let settings = queries::list_site_settings(&conn)?
        .into_iter()
        .map(|s| (s.key, s.value))
        .collect();
    Ok(Json(settings))
}
