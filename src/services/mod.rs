//! Business logic services

pub mod auth;
pub mod equipment;
pub mod equipment_types;
pub mod sites;
pub mod workshops;

use std::sync::Arc;

use crate::{blobs::BlobStore, config::AppConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub sites: sites::SitesService,
    pub workshops: workshops::WorkshopsService,
    pub equipment_types: equipment_types::EquipmentTypesService,
    pub equipment: equipment::EquipmentService,
    repository: Repository,
}

impl Services {
    /// Create all services over one repository and blob store
    pub fn new(repository: Repository, blobs: Arc<dyn BlobStore>, config: &AppConfig) -> Self {
        Self {
            auth: auth::AuthService::new(repository.clone(), config.auth.clone()),
            sites: sites::SitesService::new(repository.clone()),
            workshops: workshops::WorkshopsService::new(repository.clone()),
            equipment_types: equipment_types::EquipmentTypesService::new(repository.clone()),
            equipment: equipment::EquipmentService::new(
                repository.clone(),
                blobs,
                config.catalog.clone(),
                config.uploads.max_scan_bytes,
            ),
            repository,
        }
    }

    /// Storage connectivity, for readiness probes
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}
