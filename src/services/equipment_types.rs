//! Equipment types and characteristic definitions

use crate::{
    error::AppResult,
    models::{
        equipment_type::{CharacteristicInput, EquipmentTypeInput},
        Characteristic, EquipmentType,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct EquipmentTypesService {
    repository: Repository,
}

impl EquipmentTypesService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self) -> AppResult<Vec<EquipmentType>> {
        self.repository.equipment_types_list().await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<EquipmentType> {
        self.repository.equipment_types_get(id).await
    }

    pub async fn create(&self, data: &EquipmentTypeInput) -> AppResult<EquipmentType> {
        let equipment_type = self.repository.equipment_types_create(data).await?;
        tracing::info!(equipment_type_id = equipment_type.id, name = %equipment_type.name, "Equipment type created");
        Ok(equipment_type)
    }

    pub async fn update(&self, id: i32, data: &EquipmentTypeInput) -> AppResult<EquipmentType> {
        self.repository.equipment_types_update(id, data).await
    }

    /// Delete an unused type with its characteristic schema
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.equipment_types_delete(id).await?;
        tracing::info!(equipment_type_id = id, "Equipment type deleted");
        Ok(())
    }

    pub async fn get_characteristic(&self, id: i32) -> AppResult<Characteristic> {
        self.repository.characteristics_get(id).await
    }

    pub async fn add_characteristic(
        &self,
        equipment_type: i32,
        data: &CharacteristicInput,
    ) -> AppResult<Characteristic> {
        let characteristic = self.repository.characteristics_create(equipment_type, data).await?;
        tracing::info!(
            characteristic_id = characteristic.id,
            equipment_type_id = equipment_type,
            value_type = %characteristic.value_type,
            "Characteristic added"
        );
        Ok(characteristic)
    }

    pub async fn update_characteristic(&self, id: i32, data: &CharacteristicInput) -> AppResult<Characteristic> {
        self.repository.characteristics_update(id, data).await
    }

    /// Remove a characteristic and every value recorded for it
    pub async fn delete_characteristic(&self, id: i32) -> AppResult<()> {
        self.repository.characteristics_delete(id).await?;
        tracing::info!(characteristic_id = id, "Characteristic deleted");
        Ok(())
    }
}
