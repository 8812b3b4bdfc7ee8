//! Equipment endpoints

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::Multipart;
use validator::Validate;

use crate::{
    access::Operation,
    error::{AppError, AppResult},
    models::{
        equipment::{EquipmentInput, EquipmentPage, EquipmentQuery},
        EquipmentDetail,
    },
};

use super::AuthenticatedUser;

/// Multipart field carrying the scan
const SCAN_FIELD: &str = "file";

/// List equipment with filters, search, ordering and pagination
#[utoipa::path(
    get,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(EquipmentQuery),
    responses(
        (status = 200, description = "One page of equipment", body = EquipmentPage),
        (status = 400, description = "Invalid pagination", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Page past the end", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Query(query): Query<EquipmentQuery>,
) -> AppResult<Json<EquipmentPage>> {
    principal.require(Operation::Read)?;
    let page = state.services.equipment.list(&query).await?;
    Ok(Json(page))
}

/// Get equipment by ID
#[utoipa::path(
    get,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment details", body = EquipmentDetail),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn get_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<EquipmentDetail>> {
    principal.require(Operation::Read)?;
    let equipment = state.services.equipment.get_by_id(id).await?;
    Ok(Json(equipment))
}

/// Create equipment with its characteristic values
#[utoipa::path(
    post,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    request_body = EquipmentInput,
    responses(
        (status = 201, description = "Equipment created", body = EquipmentDetail),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Insufficient rights")
    )
)]
pub async fn create_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(data): Json<EquipmentInput>,
) -> AppResult<(StatusCode, Json<EquipmentDetail>)> {
    principal.require(Operation::Create)?;
    data.validate()?;
    let equipment = state.services.equipment.create(&data).await?;
    Ok((StatusCode::CREATED, Json(equipment)))
}

/// Replace equipment fields; a present `characteristic_values` replaces the whole value set
#[utoipa::path(
    put,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    request_body = EquipmentInput,
    responses(
        (status = 200, description = "Equipment updated", body = EquipmentDetail),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn update_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<EquipmentInput>,
) -> AppResult<Json<EquipmentDetail>> {
    principal.require(Operation::Update)?;
    data.validate()?;
    let equipment = state.services.equipment.update(id, &data).await?;
    Ok(Json(equipment))
}

/// Delete equipment and all of its descendants
#[utoipa::path(
    delete,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 204, description = "Equipment deleted"),
        (status = 403, description = "Insufficient rights"),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn delete_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    principal.require(Operation::Delete)?;
    state.services.equipment.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upload (or replace) the passport scan
#[utoipa::path(
    put,
    path = "/equipment/{id}/passport-scan",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    request_body(content_type = "multipart/form-data", description = "Scan in the `file` field"),
    responses(
        (status = 200, description = "Scan stored", body = EquipmentDetail),
        (status = 400, description = "Missing, empty or oversized file", body = crate::error::ErrorResponse),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn upload_passport_scan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> AppResult<Json<EquipmentDetail>> {
    principal.require(Operation::Update)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(SCAN_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let equipment = state
            .services
            .equipment
            .set_passport_scan(id, file_name.as_deref(), data.to_vec())
            .await?;
        return Ok(Json(equipment));
    }

    Err(AppError::invalid(SCAN_FIELD, "No file was submitted"))
}

/// Download the passport scan
#[utoipa::path(
    get,
    path = "/equipment/{id}/passport-scan",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Scan content", content_type = "application/octet-stream"),
        (status = 404, description = "Equipment or scan not found")
    )
)]
pub async fn download_passport_scan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    principal.require(Operation::Read)?;
    let scan = state.services.equipment.passport_scan(id).await?;
    let file_name = scan.key.rsplit('/').next().unwrap_or(&scan.key).to_string();
    Ok((
        [
            (header::CONTENT_TYPE, scan.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", file_name),
            ),
        ],
        scan.data,
    ))
}

/// Remove the passport scan
#[utoipa::path(
    delete,
    path = "/equipment/{id}/passport-scan",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 204, description = "Scan removed"),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn delete_passport_scan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    principal.require(Operation::Update)?;
    state.services.equipment.clear_passport_scan(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
