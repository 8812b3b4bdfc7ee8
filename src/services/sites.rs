//! Sites service

use crate::{
    error::AppResult,
    models::{site::SiteInput, Site},
    repository::Repository,
};

#[derive(Clone)]
pub struct SitesService {
    repository: Repository,
}

impl SitesService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self) -> AppResult<Vec<Site>> {
        self.repository.sites_list().await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Site> {
        self.repository.sites_get(id).await
    }

    pub async fn create(&self, data: &SiteInput) -> AppResult<Site> {
        let site = self.repository.sites_create(data).await?;
        tracing::info!(site_id = site.id, name = %site.name, "Site created");
        Ok(site)
    }

    pub async fn update(&self, id: i32, data: &SiteInput) -> AppResult<Site> {
        self.repository.sites_update(id, data).await
    }

    /// Delete a site together with its (empty) workshops
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.sites_delete(id).await?;
        tracing::info!(site_id = id, "Site deleted");
        Ok(())
    }
}
