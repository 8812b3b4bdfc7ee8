//! Repository layer.
//!
//! [`CatalogRepository`] is the storage seam. Implementations must enforce
//! the unique constraints themselves and run every equipment write (scalar
//! fields plus characteristic values) as one atomic unit.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    catalog::{ListSpec, SchemaPolicy},
    error::AppResult,
    models::{
        equipment::EquipmentInput,
        equipment_type::{CharacteristicInput, EquipmentTypeInput},
        site::{SiteInput, WorkshopInput},
        user::NewUser,
        Characteristic, EquipmentDetail, EquipmentType, Site, User, Workshop,
    },
};

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

/// Shared handle used by services
pub type Repository = Arc<dyn CatalogRepository>;

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Cheap connectivity check for readiness probes
    async fn ping(&self) -> AppResult<()>;

    // Users
    async fn users_get_by_login(&self, login: &str) -> AppResult<Option<User>>;
    async fn users_list(&self) -> AppResult<Vec<User>>;
    async fn users_create(&self, user: &NewUser) -> AppResult<User>;

    // Sites
    async fn sites_list(&self) -> AppResult<Vec<Site>>;
    async fn sites_get(&self, id: i32) -> AppResult<Site>;
    async fn sites_create(&self, data: &SiteInput) -> AppResult<Site>;
    async fn sites_update(&self, id: i32, data: &SiteInput) -> AppResult<Site>;
    /// Deletes the site and its workshops; refused while any workshop holds equipment
    async fn sites_delete(&self, id: i32) -> AppResult<()>;

    // Workshops
    async fn workshops_list(&self, site: Option<i32>) -> AppResult<Vec<Workshop>>;
    async fn workshops_get(&self, id: i32) -> AppResult<Workshop>;
    async fn workshops_create(&self, data: &WorkshopInput) -> AppResult<Workshop>;
    async fn workshops_update(&self, id: i32, data: &WorkshopInput) -> AppResult<Workshop>;
    /// Refused while equipment references the workshop
    async fn workshops_delete(&self, id: i32) -> AppResult<()>;

    // Equipment types and characteristics
    async fn equipment_types_list(&self) -> AppResult<Vec<EquipmentType>>;
    async fn equipment_types_get(&self, id: i32) -> AppResult<EquipmentType>;
    async fn equipment_types_create(&self, data: &EquipmentTypeInput) -> AppResult<EquipmentType>;
    async fn equipment_types_update(&self, id: i32, data: &EquipmentTypeInput) -> AppResult<EquipmentType>;
    /// Refused while equipment references the type; removes its characteristics and their values
    async fn equipment_types_delete(&self, id: i32) -> AppResult<()>;
    async fn characteristics_get(&self, id: i32) -> AppResult<Characteristic>;
    async fn characteristics_create(
        &self,
        equipment_type: i32,
        data: &CharacteristicInput,
    ) -> AppResult<Characteristic>;
    async fn characteristics_update(&self, id: i32, data: &CharacteristicInput) -> AppResult<Characteristic>;
    /// Removes the characteristic and every value recorded for it
    async fn characteristics_delete(&self, id: i32) -> AppResult<()>;

    // Equipment
    async fn equipment_search(&self, spec: &ListSpec) -> AppResult<(Vec<EquipmentDetail>, i64)>;
    async fn equipment_get(&self, id: i32) -> AppResult<EquipmentDetail>;
    async fn equipment_create(&self, data: &EquipmentInput, policy: SchemaPolicy) -> AppResult<EquipmentDetail>;
    async fn equipment_update(
        &self,
        id: i32,
        data: &EquipmentInput,
        policy: SchemaPolicy,
    ) -> AppResult<EquipmentDetail>;
    /// Deletes the equipment and all descendants; returns the passport-scan keys they held
    async fn equipment_delete(&self, id: i32) -> AppResult<Vec<String>>;
    /// Replace the passport-scan key; returns the previous key
    async fn equipment_set_passport_scan(&self, id: i32, key: Option<&str>) -> AppResult<Option<String>>;
}
