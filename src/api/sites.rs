//! Site endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    access::Operation,
    error::AppResult,
    models::{site::SiteInput, Site},
};

use super::AuthenticatedUser;

/// List sites
#[utoipa::path(
    get,
    path = "/sites",
    tag = "sites",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Site list", body = Vec<Site>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_sites(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> AppResult<Json<Vec<Site>>> {
    principal.require(Operation::Read)?;
    let sites = state.services.sites.list().await?;
    Ok(Json(sites))
}

/// Get site by ID
#[utoipa::path(
    get,
    path = "/sites/{id}",
    tag = "sites",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Site ID")),
    responses(
        (status = 200, description = "Site details", body = Site),
        (status = 404, description = "Site not found")
    )
)]
pub async fn get_site(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Site>> {
    principal.require(Operation::Read)?;
    let site = state.services.sites.get_by_id(id).await?;
    Ok(Json(site))
}

/// Create site
#[utoipa::path(
    post,
    path = "/sites",
    tag = "sites",
    security(("bearer_auth" = [])),
    request_body = SiteInput,
    responses(
        (status = 201, description = "Site created", body = Site),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_site(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(data): Json<SiteInput>,
) -> AppResult<(StatusCode, Json<Site>)> {
    principal.require(Operation::Create)?;
    data.validate()?;
    let site = state.services.sites.create(&data).await?;
    Ok((StatusCode::CREATED, Json(site)))
}

/// Update site
#[utoipa::path(
    put,
    path = "/sites/{id}",
    tag = "sites",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Site ID")),
    request_body = SiteInput,
    responses(
        (status = 200, description = "Site updated", body = Site),
        (status = 404, description = "Site not found")
    )
)]
pub async fn update_site(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<SiteInput>,
) -> AppResult<Json<Site>> {
    principal.require(Operation::Update)?;
    data.validate()?;
    let site = state.services.sites.update(id, &data).await?;
    Ok(Json(site))
}

/// Delete site and its workshops
#[utoipa::path(
    delete,
    path = "/sites/{id}",
    tag = "sites",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Site ID")),
    responses(
        (status = 204, description = "Site deleted"),
        (status = 409, description = "A workshop of the site still holds equipment", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_site(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    principal.require(Operation::Delete)?;
    state.services.sites.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
