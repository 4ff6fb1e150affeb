use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::icons::{IconSuggestion, normalize_icon};
use crate::models::{
    Category, CreateCategory, CreateService, CreateServicePackage, Service, ServicePackage,
    UpdateCategory, UpdateService, UpdateServicePackage,
};

#[derive(Debug, Deserialize, Default)]
pub struct AdminCatalogQuery {
    pub category_id: Option<String>,
    pub service_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    #[serde(flatten)]
    pub category: Category,
    /// Where the icon came from when the request omitted one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_source: Option<&'static str>,
}

// ============ Categories ============

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_categories(&conn, false)?))
}

/// Create a category. Without an explicit icon one is suggested from the name.
pub async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CreateCategory>,
) -> Result<Json<CategoryResponse>> {
    input.validate()?;

    let (icon, icon_source) = match input.icon.as_deref() {
        Some(icon) => (normalize_icon(icon), None),
        None => {
            let suggestion = state
                .icons
                .suggest(&input.name_en, input.description_en.as_deref())
                .await;
            (suggestion.icon, Some(suggestion.source))
        }
    };

    let conn = state.db.get()?;
    let category = queries::create_category(&conn, &input, icon)?;
    tracing::info!(category_id = %category.id, icon, "Category created");
    Ok(Json(CategoryResponse {
        category,
        icon_source,
    }))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut input): Json<UpdateCategory>,
) -> Result<Json<Category>> {
    input.validate()?;
    input.icon = input.icon.map(|icon| normalize_icon(&icon).to_string());
    let conn = state.db.get()?;
    let category = queries::update_category(&conn, &id, &input)?.or_not_found(msg::CATEGORY_NOT_FOUND)?;
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let conn = state.db.get()?;
    if !queries::delete_category(&conn, &id)? {
        return Err(AppError::NotFound(msg::CATEGORY_NOT_FOUND.into()));
    }
    tracing::info!(category_id = %id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SuggestIconRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn suggest_icon(
    State(state): State<AppState>,
    Json(input): Json<SuggestIconRequest>,
) -> Result<Json<IconSuggestion>> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest(msg::NAME_EMPTY.into()));
    }
    Ok(Json(
        state
            .icons
            .suggest(input.name.trim(), input.description.as_deref())
            .await,
    ))
}

// ============ Services ============

pub async fn list_services(
    State(state): State<AppState>,
    Query(query): Query<AdminCatalogQuery>,
) -> Result<Json<Vec<Service>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_services(&conn, query.category_id.as_deref(), false)?))
}

pub async fn create_service(
    State(state): State<AppState>,
    Json(input): Json<CreateService>,
) -> Result<Json<Service>> {
    input.validate()?;
    let conn = state.db.get()?;
    if let Some(ref category_id) = input.category_id {
        queries::get_category(&conn, category_id)?.or_not_found(msg::CATEGORY_NOT_FOUND)?;
    }
    let service = queries::create_service(&conn, &input)?;
    tracing::info!(service_id = %service.id, "Service created");
    Ok(Json(service))
}

pub async fn update_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateService>,
) -> Result<Json<Service>> {
    input.validate()?;
    let conn = state.db.get()?;
    if let Some(ref category_id) = input.category_id {
        queries::get_category(&conn, category_id)?.or_not_found(msg::CATEGORY_NOT_FOUND)?;
    }
    let service = queries::update_service(&conn, &id, &input)?.or_not_found(msg::SERVICE_NOT_FOUND)?;
    Ok(Json(service))
}

pub async fn delete_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let conn = state.db.get()?;
    if !queries::delete_service(&conn, &id)? {
        return Err(AppError::NotFound(msg::SERVICE_NOT_FOUND.into()));
    }
    tracing::info!(service_id = %id, "Service deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============ Packages ============

pub async fn list_packages(
    State(state): State<AppState>,
    Query(query): Query<AdminCatalogQuery>,
) -> Result<Json<Vec<ServicePackage>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_packages(&conn, query.service_id.as_deref(), false)?))
}

pub async fn create_package(
    State(state): State<AppState>,
    Json(input): Json<CreateServicePackage>,
) -> Result<Json<ServicePackage>> {
    input.validate()?;
    let conn = state.db.get()?;
    queries::get_service(&conn, &input.service_id)?.or_not_found(msg::SERVICE_NOT_FOUND)?;
    let package = queries::create_package(&conn, &input)?;
    tracing::info!(package_id = %package.id, service_id = %package.service_id, "Package created");
    Ok(Json(package))
}

pub async fn update_package(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateServicePackage>,
) -> Result<Json<ServicePackage>> {
    input.validate()?;
    let conn = state.db.get()?;
    let package = queries::update_package(&conn, &id, &input)?.or_not_found(msg::PACKAGE_NOT_FOUND)?;
    Ok(Json(package))
}

pub async fn delete_package(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let conn = state.db.get()?;
    if !queries::delete_package(&conn, &id)? {
        return Err(AppError::NotFound(msg::PACKAGE_NOT_FOUND.into()));
    }
    tracing::info!(package_id = %id, "Package deleted");
    Ok(StatusCode::NO_CONTENT)
}
