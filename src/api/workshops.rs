//! Workshop endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    access::Operation,
    error::AppResult,
    models::{
        site::{WorkshopInput, WorkshopQuery},
        Workshop,
    },
};

use super::AuthenticatedUser;

/// List workshops
#[utoipa::path(
    get,
    path = "/workshops",
    tag = "workshops",
    security(("bearer_auth" = [])),
    params(WorkshopQuery),
    responses(
        (status = 200, description = "Workshop list", body = Vec<Workshop>)
    )
)]
pub async fn list_workshops(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Query(query): Query<WorkshopQuery>,
) -> AppResult<Json<Vec<Workshop>>> {
    principal.require(Operation::Read)?;
    let workshops = state.services.workshops.list(query.site).await?;
    Ok(Json(workshops))
}

/// Get workshop by ID
#[utoipa::path(
    get,
    path = "/workshops/{id}",
    tag = "workshops",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Workshop ID")),
    responses(
        (status = 200, description = "Workshop details", body = Workshop),
        (status = 404, description = "Workshop not found")
    )
)]
pub async fn get_workshop(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Workshop>> {
    principal.require(Operation::Read)?;
    let workshop = state.services.workshops.get_by_id(id).await?;
    Ok(Json(workshop))
}

/// Create workshop
#[utoipa::path(
    post,
    path = "/workshops",
    tag = "workshops",
    security(("bearer_auth" = [])),
    request_body = WorkshopInput,
    responses(
        (status = 201, description = "Workshop created", body = Workshop),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_workshop(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(data): Json<WorkshopInput>,
) -> AppResult<(StatusCode, Json<Workshop>)> {
    principal.require(Operation::Create)?;
    data.validate()?;
    let workshop = state.services.workshops.create(&data).await?;
    Ok((StatusCode::CREATED, Json(workshop)))
}

/// Update workshop
#[utoipa::path(
    put,
    path = "/workshops/{id}",
    tag = "workshops",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Workshop ID")),
    request_body = WorkshopInput,
    responses(
        (status = 200, description = "Workshop updated", body = Workshop)
    )
)]
pub async fn update_workshop(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<WorkshopInput>,
) -> AppResult<Json<Workshop>> {
    principal.require(Operation::Update)?;
    data.validate()?;
    let workshop = state.services.workshops.update(id, &data).await?;
    Ok(Json(workshop))
}

/// Delete workshop
#[utoipa::path(
    delete,
    path = "/workshops/{id}",
    tag = "workshops",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Workshop ID")),
    responses(
        (status = 204, description = "Workshop deleted"),
        (status = 409, description = "Workshop still holds equipment", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_workshop(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    principal.require(Operation::Delete)?;
    state.services.workshops.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
