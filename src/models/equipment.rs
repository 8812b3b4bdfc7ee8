//! Equipment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Equipment record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Equipment {
    pub id: i32,
    pub name: String,
    /// Globally unique inventory number
    pub inventory_number: String,
    /// Equipment type ID
    pub equipment_type: i32,
    /// Workshop ID
    pub workshop: i32,
    /// Site ID of the workshop (read-only)
    pub site: i32,
    /// Parent equipment ID
    pub parent: Option<i32>,
    /// Blob key of the passport scan
    pub passport_scan: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored value of one characteristic for one equipment instance
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct CharacteristicValue {
    pub id: i32,
    #[serde(skip_serializing)]
    pub equipment: i32,
    /// Characteristic ID
    pub characteristic: i32,
    pub characteristic_name: String,
    pub value: String,
}

/// Equipment with its characteristic values and direct children
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EquipmentDetail {
    #[serde(flatten)]
    pub equipment: Equipment,
    pub characteristic_values: Vec<CharacteristicValue>,
    /// IDs of direct child equipment
    pub children: Vec<i32>,
}

/// Submitted (characteristic, value) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CharacteristicValueInput {
    pub characteristic: i32,
    pub value: String,
}

/// Create / full update equipment request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct EquipmentInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 100, message = "Inventory number must be 1-100 characters"))]
    pub inventory_number: String,
    pub equipment_type: i32,
    pub workshop: i32,
    #[serde(default)]
    pub parent: Option<i32>,
    /// Authoritative value set; omitted on update leaves stored values untouched
    #[serde(default)]
    pub characteristic_values: Option<Vec<CharacteristicValueInput>>,
}

/// Equipment list query parameters
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct EquipmentQuery {
    /// Exact workshop ID
    pub workshop: Option<i32>,
    /// Exact site ID (via workshop)
    pub site: Option<i32>,
    /// Exact equipment type ID
    pub equipment_type: Option<i32>,
    /// Case-insensitive substring of the name
    pub name: Option<String>,
    /// Case-insensitive substring of the inventory number
    pub inventory_number: Option<String>,
    /// Free text matched against name or inventory number
    pub search: Option<String>,
    /// Comma-separated keys (name, created_at, inventory_number), "-" for descending
    pub ordering: Option<String>,
    /// Page number (default: 1)
    pub page: Option<i64>,
    /// Items per page
    pub per_page: Option<i64>,
}

/// One page of equipment
#[derive(Debug, Serialize, ToSchema)]
pub struct EquipmentPage {
    pub items: Vec<EquipmentDetail>,
    /// Total number of matching equipment
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}
