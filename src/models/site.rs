//! Site and workshop models (location hierarchy)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Top-level physical location
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Site {
    pub id: i32,
    /// Unique site name
    pub name: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

/// Create / update site request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SiteInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    #[serde(default)]
    pub address: String,
}

/// Sub-location within a site
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Workshop {
    pub id: i32,
    pub name: String,
    /// Owning site ID
    pub site: i32,
    pub site_name: String,
    pub created_at: DateTime<Utc>,
}

/// Create / update workshop request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct WorkshopInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    pub site: i32,
}

/// Workshop list filters
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WorkshopQuery {
    /// Only workshops of this site
    pub site: Option<i32>,
}
