//! API handlers for the equipment catalog REST endpoints

pub mod auth;
pub mod equipment;
pub mod equipment_types;
pub mod health;
pub mod openapi;
pub mod sites;
pub mod users;
pub mod workshops;

use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{access::Principal, error::AppError, models::user::UserClaims, AppState};

/// Multipart framing allowance on top of the scan size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Extractor for the authenticated principal from a bearer JWT.
///
/// Rejects with 401 before any handler (and thus any role check) runs.
pub struct AuthenticatedUser(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::Authentication("Authentication credentials were not provided".to_string())
            })?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims.into_principal()))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let scan_limit = DefaultBodyLimit::max(state.config.uploads.max_scan_bytes + MULTIPART_OVERHEAD);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        // Sites
        .route("/sites", get(sites::list_sites).post(sites::create_site))
        .route(
            "/sites/:id",
            get(sites::get_site).put(sites::update_site).delete(sites::delete_site),
        )
        // Workshops
        .route(
            "/workshops",
            get(workshops::list_workshops).post(workshops::create_workshop),
        )
        .route(
            "/workshops/:id",
            get(workshops::get_workshop)
                .put(workshops::update_workshop)
                .delete(workshops::delete_workshop),
        )
        // Equipment types and characteristics
        .route(
            "/equipment-types",
            get(equipment_types::list_equipment_types).post(equipment_types::create_equipment_type),
        )
        .route(
            "/equipment-types/:id",
            get(equipment_types::get_equipment_type)
                .put(equipment_types::update_equipment_type)
                .delete(equipment_types::delete_equipment_type),
        )
        .route(
            "/equipment-types/:id/characteristics",
            post(equipment_types::create_characteristic),
        )
        .route(
            "/characteristics/:id",
            get(equipment_types::get_characteristic)
                .put(equipment_types::update_characteristic)
                .delete(equipment_types::delete_characteristic),
        )
        // Equipment
        .route(
            "/equipment",
            get(equipment::list_equipment).post(equipment::create_equipment),
        )
        .route(
            "/equipment/:id",
            get(equipment::get_equipment)
                .put(equipment::update_equipment)
                .delete(equipment::delete_equipment),
        )
        .route(
            "/equipment/:id/passport-scan",
            get(equipment::download_passport_scan)
                .put(equipment::upload_passport_scan)
                .delete(equipment::delete_passport_scan)
                .layer(scan_limit),
        )
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}
