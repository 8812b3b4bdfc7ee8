//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, equipment, equipment_types, health, sites, users, workshops};

/// Registers the JWT bearer scheme referenced by the secured paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Equipment Catalog API",
        version = "0.3.0",
        description = "Plant equipment inventory with typed characteristics",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&BearerAuth),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::me,
        // Users
        users::list_users,
        users::create_user,
        // Sites
        sites::list_sites,
        sites::get_site,
        sites::create_site,
        sites::update_site,
        sites::delete_site,
        // Workshops
        workshops::list_workshops,
        workshops::get_workshop,
        workshops::create_workshop,
        workshops::update_workshop,
        workshops::delete_workshop,
        // Equipment types
        equipment_types::list_equipment_types,
        equipment_types::get_equipment_type,
        equipment_types::create_equipment_type,
        equipment_types::update_equipment_type,
        equipment_types::delete_equipment_type,
        equipment_types::create_characteristic,
        equipment_types::get_characteristic,
        equipment_types::update_characteristic,
        equipment_types::delete_characteristic,
        // Equipment
        equipment::list_equipment,
        equipment::get_equipment,
        equipment::create_equipment,
        equipment::update_equipment,
        equipment::delete_equipment,
        equipment::upload_passport_scan,
        equipment::download_passport_scan,
        equipment::delete_passport_scan,
    ),
    components(
        schemas(
            // Auth
            auth::LoginRequest,
            auth::LoginResponse,
            crate::access::Principal,
            crate::access::Role,
            // Users
            crate::models::user::User,
            crate::models::user::CreateUser,
            // Locations
            crate::models::site::Site,
            crate::models::site::SiteInput,
            crate::models::site::Workshop,
            crate::models::site::WorkshopInput,
            // Equipment types
            crate::models::equipment_type::EquipmentType,
            crate::models::equipment_type::EquipmentTypeInput,
            crate::models::equipment_type::Characteristic,
            crate::models::equipment_type::CharacteristicInput,
            crate::models::equipment_type::ValueType,
            // Equipment
            crate::models::equipment::Equipment,
            crate::models::equipment::EquipmentDetail,
            crate::models::equipment::EquipmentInput,
            crate::models::equipment::EquipmentPage,
            crate::models::equipment::CharacteristicValue,
            crate::models::equipment::CharacteristicValueInput,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
            crate::error::ErrorCode,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "users", description = "User management"),
        (name = "sites", description = "Site management"),
        (name = "workshops", description = "Workshops within sites"),
        (name = "equipment-types", description = "Equipment types and their characteristics"),
        (name = "equipment", description = "Equipment inventory and passport scans")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_catalog_paths_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        for path in [
            "/equipment",
            "/equipment/{id}/passport-scan",
            "/equipment-types/{id}/characteristics",
            "/workshops",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
