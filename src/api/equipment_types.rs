//! Equipment type and characteristic endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    access::Operation,
    error::AppResult,
    models::{
        equipment_type::{CharacteristicInput, EquipmentTypeInput},
        Characteristic, EquipmentType,
    },
};

use super::AuthenticatedUser;

/// List equipment types with their characteristics
#[utoipa::path(
    get,
    path = "/equipment-types",
    tag = "equipment-types",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Equipment type list", body = Vec<EquipmentType>)
    )
)]
pub async fn list_equipment_types(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> AppResult<Json<Vec<EquipmentType>>> {
    principal.require(Operation::Read)?;
    let types = state.services.equipment_types.list().await?;
    Ok(Json(types))
}

/// Get equipment type by ID
#[utoipa::path(
    get,
    path = "/equipment-types/{id}",
    tag = "equipment-types",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment type ID")),
    responses(
        (status = 200, description = "Equipment type details", body = EquipmentType),
        (status = 404, description = "Equipment type not found")
    )
)]
pub async fn get_equipment_type(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<EquipmentType>> {
    principal.require(Operation::Read)?;
    let equipment_type = state.services.equipment_types.get_by_id(id).await?;
    Ok(Json(equipment_type))
}

/// Create equipment type
#[utoipa::path(
    post,
    path = "/equipment-types",
    tag = "equipment-types",
    security(("bearer_auth" = [])),
    request_body = EquipmentTypeInput,
    responses(
        (status = 201, description = "Equipment type created", body = EquipmentType),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_equipment_type(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(data): Json<EquipmentTypeInput>,
) -> AppResult<(StatusCode, Json<EquipmentType>)> {
    principal.require(Operation::Create)?;
    data.validate()?;
    let equipment_type = state.services.equipment_types.create(&data).await?;
    Ok((StatusCode::CREATED, Json(equipment_type)))
}

/// Update equipment type
#[utoipa::path(
    put,
    path = "/equipment-types/{id}",
    tag = "equipment-types",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment type ID")),
    request_body = EquipmentTypeInput,
    responses(
        (status = 200, description = "Equipment type updated", body = EquipmentType)
    )
)]
pub async fn update_equipment_type(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<EquipmentTypeInput>,
) -> AppResult<Json<EquipmentType>> {
    principal.require(Operation::Update)?;
    data.validate()?;
    let equipment_type = state.services.equipment_types.update(id, &data).await?;
    Ok(Json(equipment_type))
}

/// Delete equipment type with its characteristics
#[utoipa::path(
    delete,
    path = "/equipment-types/{id}",
    tag = "equipment-types",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment type ID")),
    responses(
        (status = 204, description = "Equipment type deleted"),
        (status = 409, description = "Equipment still uses this type", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_equipment_type(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    principal.require(Operation::Delete)?;
    state.services.equipment_types.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Add a characteristic definition to an equipment type
#[utoipa::path(
    post,
    path = "/equipment-types/{id}/characteristics",
    tag = "equipment-types",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment type ID")),
    request_body = CharacteristicInput,
    responses(
        (status = 201, description = "Characteristic created", body = Characteristic),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 404, description = "Equipment type not found")
    )
)]
pub async fn create_characteristic(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(equipment_type): Path<i32>,
    Json(data): Json<CharacteristicInput>,
) -> AppResult<(StatusCode, Json<Characteristic>)> {
    principal.require(Operation::Create)?;
    data.validate()?;
    let characteristic = state
        .services
        .equipment_types
        .add_characteristic(equipment_type, &data)
        .await?;
    Ok((StatusCode::CREATED, Json(characteristic)))
}

/// Get characteristic definition
#[utoipa::path(
    get,
    path = "/characteristics/{id}",
    tag = "equipment-types",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Characteristic ID")),
    responses(
        (status = 200, description = "Characteristic", body = Characteristic),
        (status = 404, description = "Characteristic not found")
    )
)]
pub async fn get_characteristic(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Characteristic>> {
    principal.require(Operation::Read)?;
    let characteristic = state.services.equipment_types.get_characteristic(id).await?;
    Ok(Json(characteristic))
}

/// Rename or retype a characteristic
#[utoipa::path(
    put,
    path = "/characteristics/{id}",
    tag = "equipment-types",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Characteristic ID")),
    request_body = CharacteristicInput,
    responses(
        (status = 200, description = "Characteristic updated", body = Characteristic)
    )
)]
pub async fn update_characteristic(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<CharacteristicInput>,
) -> AppResult<Json<Characteristic>> {
    principal.require(Operation::Update)?;
    data.validate()?;
    let characteristic = state
        .services
        .equipment_types
        .update_characteristic(id, &data)
        .await?;
    Ok(Json(characteristic))
}

/// Delete a characteristic and its recorded values
#[utoipa::path(
    delete,
    path = "/characteristics/{id}",
    tag = "equipment-types",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Characteristic ID")),
    responses(
        (status = 204, description = "Characteristic deleted")
    )
)]
pub async fn delete_characteristic(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    principal.require(Operation::Delete)?;
    state.services.equipment_types.delete_characteristic(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
