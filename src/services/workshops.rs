//! Workshops service

use crate::{
    error::AppResult,
    models::{site::WorkshopInput, Workshop},
    repository::Repository,
};

#[derive(Clone)]
pub struct WorkshopsService {
    repository: Repository,
}

impl WorkshopsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, site: Option<i32>) -> AppResult<Vec<Workshop>> {
        self.repository.workshops_list(site).await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Workshop> {
        self.repository.workshops_get(id).await
    }

    pub async fn create(&self, data: &WorkshopInput) -> AppResult<Workshop> {
        let workshop = self.repository.workshops_create(data).await?;
        tracing::info!(workshop_id = workshop.id, site_id = workshop.site, "Workshop created");
        Ok(workshop)
    }

    pub async fn update(&self, id: i32, data: &WorkshopInput) -> AppResult<Workshop> {
        self.repository.workshops_update(id, data).await
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.workshops_delete(id).await?;
        tracing::info!(workshop_id = id, "Workshop deleted");
        Ok(())
    }
}
