//! In-memory repository.
//!
//! A single async mutex guards the whole state, so every trait call is one
//! atomic unit: validation runs before the first mutation and a failed call
//! leaves nothing behind. Used for tests, demos and `storage.backend = "memory"`.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::CatalogRepository;
use crate::{
    catalog::{query, sync, ListSpec, SchemaPolicy, SyncPlan},
    error::{AppError, AppResult, FieldErrors},
    models::{
        equipment::EquipmentInput,
        equipment_type::{CharacteristicInput, EquipmentTypeInput},
        site::{SiteInput, WorkshopInput},
        user::NewUser,
        Characteristic, CharacteristicValue, CharacteristicValueInput, Equipment, EquipmentDetail,
        EquipmentType, Site, User, Workshop,
    },
};

#[derive(Debug, Clone)]
struct WorkshopRecord {
    id: i32,
    name: String,
    site: i32,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct EquipmentTypeRecord {
    id: i32,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct EquipmentRecord {
    id: i32,
    name: String,
    inventory_number: String,
    equipment_type: i32,
    workshop: i32,
    parent: Option<i32>,
    passport_scan: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ValueRecord {
    id: i32,
    equipment: i32,
    characteristic: i32,
    value: String,
}

#[derive(Debug, Default)]
struct State {
    last_id: i32,
    users: BTreeMap<i32, User>,
    sites: BTreeMap<i32, Site>,
    workshops: BTreeMap<i32, WorkshopRecord>,
    equipment_types: BTreeMap<i32, EquipmentTypeRecord>,
    characteristics: BTreeMap<i32, Characteristic>,
    equipment: BTreeMap<i32, EquipmentRecord>,
    values: BTreeMap<i32, ValueRecord>,
}

fn not_found(entity: &str, id: i32) -> AppError {
    AppError::NotFound(format!("{} {} not found", entity, id))
}

fn duplicate(field: &str, what: &str) -> AppError {
    AppError::invalid(field, format!("{} with this {} already exists", what, field))
}

impl State {
    /// IDs are unique across tables, which keeps them unambiguous in tests
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn site(&self, id: i32) -> AppResult<&Site> {
        self.sites.get(&id).ok_or_else(|| not_found("Site", id))
    }

    fn workshop_view(&self, record: &WorkshopRecord) -> Workshop {
        Workshop {
            id: record.id,
            name: record.name.clone(),
            site: record.site,
            site_name: self
                .sites
                .get(&record.site)
                .map(|s| s.name.clone())
                .unwrap_or_default(),
            created_at: record.created_at,
        }
    }

    fn equipment_type_view(&self, record: &EquipmentTypeRecord) -> EquipmentType {
        let mut characteristics: Vec<Characteristic> = self
            .characteristics
            .values()
            .filter(|c| c.equipment_type == record.id)
            .cloned()
            .collect();
        characteristics.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        EquipmentType {
            id: record.id,
            name: record.name.clone(),
            description: record.description.clone(),
            created_at: record.created_at,
            characteristics,
        }
    }

    fn equipment_view(&self, record: &EquipmentRecord) -> Equipment {
        Equipment {
            id: record.id,
            name: record.name.clone(),
            inventory_number: record.inventory_number.clone(),
            equipment_type: record.equipment_type,
            workshop: record.workshop,
            site: self.workshops.get(&record.workshop).map(|w| w.site).unwrap_or_default(),
            parent: record.parent,
            passport_scan: record.passport_scan.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    fn values_of(&self, equipment: i32) -> Vec<CharacteristicValue> {
        let mut values: Vec<CharacteristicValue> = self
            .values
            .values()
            .filter(|v| v.equipment == equipment)
            .map(|v| CharacteristicValue {
                id: v.id,
                equipment: v.equipment,
                characteristic: v.characteristic,
                characteristic_name: self
                    .characteristics
                    .get(&v.characteristic)
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                value: v.value.clone(),
            })
            .collect();
        values.sort_by(|a, b| {
            a.characteristic_name
                .cmp(&b.characteristic_name)
                .then(a.id.cmp(&b.id))
        });
        values
    }

    fn children_of(&self, equipment: i32) -> Vec<i32> {
        self.equipment
            .values()
            .filter(|e| e.parent == Some(equipment))
            .map(|e| e.id)
            .collect()
    }

    fn equipment_detail(&self, id: i32) -> AppResult<EquipmentDetail> {
        let record = self.equipment.get(&id).ok_or_else(|| not_found("Equipment", id))?;
        Ok(EquipmentDetail {
            equipment: self.equipment_view(record),
            characteristic_values: self.values_of(id),
            children: self.children_of(id),
        })
    }

    /// True when `candidate` is `id` or one of its ancestors would be `id`
    fn creates_cycle(&self, id: i32, candidate: i32) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(candidate);
        while let Some(node) = current {
            if node == id || !seen.insert(node) {
                return true;
            }
            current = self.equipment.get(&node).and_then(|e| e.parent);
        }
        false
    }

    /// Reference and uniqueness checks for an equipment write
    fn check_equipment(&self, data: &EquipmentInput, id: Option<i32>) -> AppResult<()> {
        let mut fields = FieldErrors::new();
        let mut fail = |field: &str, message: String| {
            fields.entry(field.to_string()).or_default().push(message);
        };

        if self
            .equipment
            .values()
            .any(|e| e.inventory_number == data.inventory_number && Some(e.id) != id)
        {
            fail("inventory_number", "Equipment with this inventory_number already exists".to_string());
        }
        if !self.equipment_types.contains_key(&data.equipment_type) {
            fail("equipment_type", format!("Equipment type {} does not exist", data.equipment_type));
        }
        if !self.workshops.contains_key(&data.workshop) {
            fail("workshop", format!("Workshop {} does not exist", data.workshop));
        }
        if let Some(parent) = data.parent {
            if !self.equipment.contains_key(&parent) {
                fail("parent", format!("Equipment {} does not exist", parent));
            } else if id.is_some_and(|id| self.creates_cycle(id, parent)) {
                fail("parent", "Equipment cannot be its own ancestor".to_string());
            }
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(fields))
        }
    }

    fn known_characteristics(&self, submitted: &[CharacteristicValueInput]) -> Vec<Characteristic> {
        sync::referenced_ids(submitted)
            .into_iter()
            .filter_map(|id| self.characteristics.get(&id).cloned())
            .collect()
    }

    fn apply_plan(&mut self, equipment: i32, plan: SyncPlan) {
        for id in plan.removed {
            self.values.remove(&id);
        }
        for (id, value) in plan.updated {
            if let Some(record) = self.values.get_mut(&id) {
                record.value = value;
            }
        }
        for entry in plan.inserted {
            let id = self.next_id();
            self.values.insert(
                id,
                ValueRecord {
                    id,
                    equipment,
                    characteristic: entry.characteristic,
                    value: entry.value,
                },
            );
        }
    }
}

/// Repository backed by process memory
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogRepository for MemoryRepository {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    // =========================================================================
    // USERS
    // =========================================================================

    async fn users_get_by_login(&self, login: &str) -> AppResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.login == login).cloned())
    }

    async fn users_list(&self) -> AppResult<Vec<User>> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.login.cmp(&b.login));
        Ok(users)
    }

    async fn users_create(&self, user: &NewUser) -> AppResult<User> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.login == user.login) {
            return Err(duplicate("login", "User"));
        }
        let id = state.next_id();
        let created = User {
            id,
            login: user.login.clone(),
            password: user.password_hash.clone(),
            roles: user.roles.clone(),
            created_at: Utc::now(),
        };
        state.users.insert(id, created.clone());
        Ok(created)
    }

    // =========================================================================
    // SITES
    // =========================================================================

    async fn sites_list(&self) -> AppResult<Vec<Site>> {
        let state = self.state.lock().await;
        let mut sites: Vec<Site> = state.sites.values().cloned().collect();
        sites.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sites)
    }

    async fn sites_get(&self, id: i32) -> AppResult<Site> {
        let state = self.state.lock().await;
        state.site(id).cloned()
    }

    async fn sites_create(&self, data: &SiteInput) -> AppResult<Site> {
        let mut state = self.state.lock().await;
        if state.sites.values().any(|s| s.name == data.name) {
            return Err(duplicate("name", "Site"));
        }
        let id = state.next_id();
        let site = Site {
            id,
            name: data.name.clone(),
            address: data.address.clone(),
            created_at: Utc::now(),
        };
        state.sites.insert(id, site.clone());
        Ok(site)
    }

    async fn sites_update(&self, id: i32, data: &SiteInput) -> AppResult<Site> {
        let mut state = self.state.lock().await;
        state.site(id)?;
        if state.sites.values().any(|s| s.name == data.name && s.id != id) {
            return Err(duplicate("name", "Site"));
        }
        let site = state.sites.get_mut(&id).ok_or_else(|| not_found("Site", id))?;
        site.name = data.name.clone();
        site.address = data.address.clone();
        Ok(site.clone())
    }

    async fn sites_delete(&self, id: i32) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.site(id)?;
        let workshops: BTreeSet<i32> = state
            .workshops
            .values()
            .filter(|w| w.site == id)
            .map(|w| w.id)
            .collect();
        if state.equipment.values().any(|e| workshops.contains(&e.workshop)) {
            return Err(AppError::ReferentialIntegrity(format!(
                "Site {} has workshops that still hold equipment",
                id
            )));
        }
        state.workshops.retain(|_, w| w.site != id);
        state.sites.remove(&id);
        Ok(())
    }

    // =========================================================================
    // WORKSHOPS
    // =========================================================================

    async fn workshops_list(&self, site: Option<i32>) -> AppResult<Vec<Workshop>> {
        let state = self.state.lock().await;
        let mut workshops: Vec<Workshop> = state
            .workshops
            .values()
            .filter(|w| site.map_or(true, |s| w.site == s))
            .map(|w| state.workshop_view(w))
            .collect();
        workshops.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(workshops)
    }

    async fn workshops_get(&self, id: i32) -> AppResult<Workshop> {
        let state = self.state.lock().await;
        let record = state.workshops.get(&id).ok_or_else(|| not_found("Workshop", id))?;
        Ok(state.workshop_view(record))
    }

    async fn workshops_create(&self, data: &WorkshopInput) -> AppResult<Workshop> {
        let mut state = self.state.lock().await;
        if !state.sites.contains_key(&data.site) {
            return Err(AppError::invalid("site", format!("Site {} does not exist", data.site)));
        }
        if state
            .workshops
            .values()
            .any(|w| w.name == data.name && w.site == data.site)
        {
            return Err(duplicate("name", "Workshop"));
        }
        let id = state.next_id();
        let record = WorkshopRecord {
            id,
            name: data.name.clone(),
            site: data.site,
            created_at: Utc::now(),
        };
        let view = state.workshop_view(&record);
        state.workshops.insert(id, record);
        Ok(view)
    }

    async fn workshops_update(&self, id: i32, data: &WorkshopInput) -> AppResult<Workshop> {
        let mut state = self.state.lock().await;
        if !state.workshops.contains_key(&id) {
            return Err(not_found("Workshop", id));
        }
        if !state.sites.contains_key(&data.site) {
            return Err(AppError::invalid("site", format!("Site {} does not exist", data.site)));
        }
        if state
            .workshops
            .values()
            .any(|w| w.name == data.name && w.site == data.site && w.id != id)
        {
            return Err(duplicate("name", "Workshop"));
        }
        let record = state.workshops.get_mut(&id).ok_or_else(|| not_found("Workshop", id))?;
        record.name = data.name.clone();
        record.site = data.site;
        let record = record.clone();
        Ok(state.workshop_view(&record))
    }

    async fn workshops_delete(&self, id: i32) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if !state.workshops.contains_key(&id) {
            return Err(not_found("Workshop", id));
        }
        if state.equipment.values().any(|e| e.workshop == id) {
            return Err(AppError::ReferentialIntegrity(format!(
                "Workshop {} is still referenced by equipment",
                id
            )));
        }
        state.workshops.remove(&id);
        Ok(())
    }

    // =========================================================================
    // EQUIPMENT TYPES & CHARACTERISTICS
    // =========================================================================

    async fn equipment_types_list(&self) -> AppResult<Vec<EquipmentType>> {
        let state = self.state.lock().await;
        let mut types: Vec<EquipmentType> = state
            .equipment_types
            .values()
            .map(|t| state.equipment_type_view(t))
            .collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    async fn equipment_types_get(&self, id: i32) -> AppResult<EquipmentType> {
        let state = self.state.lock().await;
        let record = state
            .equipment_types
            .get(&id)
            .ok_or_else(|| not_found("Equipment type", id))?;
        Ok(state.equipment_type_view(record))
    }

    async fn equipment_types_create(&self, data: &EquipmentTypeInput) -> AppResult<EquipmentType> {
        let mut state = self.state.lock().await;
        if state.equipment_types.values().any(|t| t.name == data.name) {
            return Err(duplicate("name", "Equipment type"));
        }
        let id = state.next_id();
        let record = EquipmentTypeRecord {
            id,
            name: data.name.clone(),
            description: data.description.clone(),
            created_at: Utc::now(),
        };
        let view = state.equipment_type_view(&record);
        state.equipment_types.insert(id, record);
        Ok(view)
    }

    async fn equipment_types_update(&self, id: i32, data: &EquipmentTypeInput) -> AppResult<EquipmentType> {
        let mut state = self.state.lock().await;
        if state
            .equipment_types
            .values()
            .any(|t| t.name == data.name && t.id != id)
        {
            return Err(duplicate("name", "Equipment type"));
        }
        let record = state
            .equipment_types
            .get_mut(&id)
            .ok_or_else(|| not_found("Equipment type", id))?;
        record.name = data.name.clone();
        record.description = data.description.clone();
        let record = record.clone();
        Ok(state.equipment_type_view(&record))
    }

    async fn equipment_types_delete(&self, id: i32) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if !state.equipment_types.contains_key(&id) {
            return Err(not_found("Equipment type", id));
        }
        if state.equipment.values().any(|e| e.equipment_type == id) {
            return Err(AppError::ReferentialIntegrity(format!(
                "Equipment type {} is still referenced by equipment",
                id
            )));
        }
        let characteristics: BTreeSet<i32> = state
            .characteristics
            .values()
            .filter(|c| c.equipment_type == id)
            .map(|c| c.id)
            .collect();
        state.values.retain(|_, v| !characteristics.contains(&v.characteristic));
        state.characteristics.retain(|_, c| c.equipment_type != id);
        state.equipment_types.remove(&id);
        Ok(())
    }

    async fn characteristics_get(&self, id: i32) -> AppResult<Characteristic> {
        let state = self.state.lock().await;
        state
            .characteristics
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Characteristic", id))
    }

    async fn characteristics_create(
        &self,
        equipment_type: i32,
        data: &CharacteristicInput,
    ) -> AppResult<Characteristic> {
        let mut state = self.state.lock().await;
        if !state.equipment_types.contains_key(&equipment_type) {
            return Err(not_found("Equipment type", equipment_type));
        }
        if state
            .characteristics
            .values()
            .any(|c| c.name == data.name && c.equipment_type == equipment_type)
        {
            return Err(duplicate("name", "Characteristic"));
        }
        let id = state.next_id();
        let characteristic = Characteristic {
            id,
            name: data.name.clone(),
            equipment_type,
            value_type: data.value_type,
        };
        state.characteristics.insert(id, characteristic.clone());
        Ok(characteristic)
    }

    async fn characteristics_update(&self, id: i32, data: &CharacteristicInput) -> AppResult<Characteristic> {
        let mut state = self.state.lock().await;
        let equipment_type = state
            .characteristics
            .get(&id)
            .map(|c| c.equipment_type)
            .ok_or_else(|| not_found("Characteristic", id))?;
        if state
            .characteristics
            .values()
            .any(|c| c.name == data.name && c.equipment_type == equipment_type && c.id != id)
        {
            return Err(duplicate("name", "Characteristic"));
        }
        let characteristic = state
            .characteristics
            .get_mut(&id)
            .ok_or_else(|| not_found("Characteristic", id))?;
        characteristic.name = data.name.clone();
        characteristic.value_type = data.value_type;
        Ok(characteristic.clone())
    }

    async fn characteristics_delete(&self, id: i32) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.characteristics.remove(&id).is_none() {
            return Err(not_found("Characteristic", id));
        }
        state.values.retain(|_, v| v.characteristic != id);
        Ok(())
    }

    // =========================================================================
    // EQUIPMENT
    // =========================================================================

    async fn equipment_search(&self, spec: &ListSpec) -> AppResult<(Vec<EquipmentDetail>, i64)> {
        let state = self.state.lock().await;
        let rows: Vec<Equipment> = state
            .equipment
            .values()
            .map(|e| state.equipment_view(e))
            .collect();
        let (page, total) = query::run(rows, spec)?;
        let items = page
            .into_iter()
            .map(|equipment| EquipmentDetail {
                characteristic_values: state.values_of(equipment.id),
                children: state.children_of(equipment.id),
                equipment,
            })
            .collect();
        Ok((items, total))
    }

    async fn equipment_get(&self, id: i32) -> AppResult<EquipmentDetail> {
        let state = self.state.lock().await;
        state.equipment_detail(id)
    }

    async fn equipment_create(&self, data: &EquipmentInput, policy: SchemaPolicy) -> AppResult<EquipmentDetail> {
        let mut state = self.state.lock().await;
        state.check_equipment(data, None)?;

        let submitted = data.characteristic_values.clone().unwrap_or_default();
        let known = state.known_characteristics(&submitted);
        let plan = sync::reconcile(data.equipment_type, &[], &submitted, &known, policy)?;

        let id = state.next_id();
        let now = Utc::now();
        state.equipment.insert(
            id,
            EquipmentRecord {
                id,
                name: data.name.clone(),
                inventory_number: data.inventory_number.clone(),
                equipment_type: data.equipment_type,
                workshop: data.workshop,
                parent: data.parent,
                passport_scan: None,
                created_at: now,
                updated_at: now,
            },
        );
        state.apply_plan(id, plan);
        state.equipment_detail(id)
    }

    async fn equipment_update(
        &self,
        id: i32,
        data: &EquipmentInput,
        policy: SchemaPolicy,
    ) -> AppResult<EquipmentDetail> {
        let mut state = self.state.lock().await;
        if !state.equipment.contains_key(&id) {
            return Err(not_found("Equipment", id));
        }
        state.check_equipment(data, Some(id))?;

        let existing = state.values_of(id);
        let submitted = data.characteristic_values.clone().unwrap_or_else(|| {
            existing
                .iter()
                .map(|v| CharacteristicValueInput {
                    characteristic: v.characteristic,
                    value: v.value.clone(),
                })
                .collect()
        });
        let known = state.known_characteristics(&submitted);
        let plan = sync::reconcile(data.equipment_type, &existing, &submitted, &known, policy)?;

        let record = state.equipment.get_mut(&id).ok_or_else(|| not_found("Equipment", id))?;
        record.name = data.name.clone();
        record.inventory_number = data.inventory_number.clone();
        record.equipment_type = data.equipment_type;
        record.workshop = data.workshop;
        record.parent = data.parent;
        record.updated_at = Utc::now();
        state.apply_plan(id, plan);
        state.equipment_detail(id)
    }

    async fn equipment_delete(&self, id: i32) -> AppResult<Vec<String>> {
        let mut state = self.state.lock().await;
        if !state.equipment.contains_key(&id) {
            return Err(not_found("Equipment", id));
        }

        let mut doomed = vec![id];
        let mut seen: HashSet<i32> = HashSet::from([id]);
        let mut cursor = 0;
        while cursor < doomed.len() {
            let parent = doomed[cursor];
            for child in state.children_of(parent) {
                if seen.insert(child) {
                    doomed.push(child);
                }
            }
            cursor += 1;
        }

        let mut scans = Vec::new();
        for equipment in doomed.iter().rev() {
            state.values.retain(|_, v| v.equipment != *equipment);
            if let Some(record) = state.equipment.remove(equipment) {
                scans.extend(record.passport_scan);
            }
        }
        Ok(scans)
    }

    async fn equipment_set_passport_scan(&self, id: i32, key: Option<&str>) -> AppResult<Option<String>> {
        let mut state = self.state.lock().await;
        let record = state.equipment.get_mut(&id).ok_or_else(|| not_found("Equipment", id))?;
        let previous = std::mem::replace(&mut record.passport_scan, key.map(str::to_string));
        record.updated_at = Utc::now();
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValueType;

    struct Fixture {
        repo: MemoryRepository,
        site: i32,
        workshop: i32,
        equipment_type: i32,
        speed: i32,
        voltage: i32,
    }

    async fn fixture() -> Fixture {
        let repo = MemoryRepository::new();
        let site = repo
            .sites_create(&SiteInput {
                name: "Site1".into(),
                address: String::new(),
            })
            .await
            .unwrap()
            .id;
        let workshop = repo
            .workshops_create(&WorkshopInput {
                name: "Workshop1".into(),
                site,
            })
            .await
            .unwrap()
            .id;
        let equipment_type = repo
            .equipment_types_create(&EquipmentTypeInput {
                name: "Motor".into(),
                description: String::new(),
            })
            .await
            .unwrap()
            .id;
        let speed = repo
            .characteristics_create(
                equipment_type,
                &CharacteristicInput {
                    name: "Speed".into(),
                    value_type: ValueType::Number,
                },
            )
            .await
            .unwrap()
            .id;
        let voltage = repo
            .characteristics_create(
                equipment_type,
                &CharacteristicInput {
                    name: "Voltage".into(),
                    value_type: ValueType::Number,
                },
            )
            .await
            .unwrap()
            .id;
        Fixture {
            repo,
            site,
            workshop,
            equipment_type,
            speed,
            voltage,
        }
    }

    impl Fixture {
        fn input(&self, name: &str, inventory_number: &str) -> EquipmentInput {
            EquipmentInput {
                name: name.into(),
                inventory_number: inventory_number.into(),
                equipment_type: self.equipment_type,
                workshop: self.workshop,
                parent: None,
                characteristic_values: None,
            }
        }
    }

    fn values(pairs: &[(i32, &str)]) -> Option<Vec<CharacteristicValueInput>> {
        Some(
            pairs
                .iter()
                .map(|(characteristic, value)| CharacteristicValueInput {
                    characteristic: *characteristic,
                    value: value.to_string(),
                })
                .collect(),
        )
    }

    fn stored(detail: &EquipmentDetail) -> Vec<(i32, String)> {
        detail
            .characteristic_values
            .iter()
            .map(|v| (v.characteristic, v.value.clone()))
            .collect()
    }

    #[tokio::test]
    async fn duplicate_inventory_number_is_rejected() {
        let f = fixture().await;
        let policy = SchemaPolicy::default();
        f.repo.equipment_create(&f.input("Pump1", "INV001"), policy).await.unwrap();

        let err = f
            .repo
            .equipment_create(&f.input("Pump2", "INV001"), policy)
            .await
            .unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("inventory_number"));
    }

    #[tokio::test]
    async fn replace_all_then_omitted_values_are_kept() {
        let f = fixture().await;
        let policy = SchemaPolicy::default();
        let mut input = f.input("Motor1", "INV500");
        input.characteristic_values = values(&[(f.speed, "1"), (f.voltage, "2")]);
        let created = f.repo.equipment_create(&input, policy).await.unwrap();
        assert_eq!(created.characteristic_values.len(), 2);

        input.characteristic_values = values(&[(f.speed, "3")]);
        let updated = f.repo.equipment_update(created.equipment.id, &input, policy).await.unwrap();
        assert_eq!(stored(&updated), vec![(f.speed, "3".to_string())]);

        input.characteristic_values = None;
        input.name = "Motor1 renamed".into();
        let renamed = f.repo.equipment_update(created.equipment.id, &input, policy).await.unwrap();
        assert_eq!(stored(&renamed), vec![(f.speed, "3".to_string())]);
    }

    #[tokio::test]
    async fn resubmitting_values_is_idempotent() {
        let f = fixture().await;
        let policy = SchemaPolicy::default();
        let created = f.repo.equipment_create(&f.input("Motor1", "INV500"), policy).await.unwrap();
        let id = created.equipment.id;

        let mut input = f.input("Motor1", "INV500");
        input.characteristic_values = values(&[(f.speed, "1500"), (f.voltage, "220")]);
        let once = f.repo.equipment_update(id, &input, policy).await.unwrap();
        let twice = f.repo.equipment_update(id, &input, policy).await.unwrap();

        assert_eq!(stored(&once), stored(&twice));
        let record_ids = |d: &EquipmentDetail| d.characteristic_values.iter().map(|v| v.id).collect::<Vec<_>>();
        assert_eq!(record_ids(&once), record_ids(&twice));
        assert_eq!(stored(&f.repo.equipment_get(id).await.unwrap()), stored(&once));
    }

    #[tokio::test]
    async fn failed_sync_leaves_no_partial_write() {
        let f = fixture().await;
        let policy = SchemaPolicy::default();
        let mut input = f.input("Motor1", "INV500");
        input.characteristic_values = values(&[(f.speed, "1")]);
        let created = f.repo.equipment_create(&input, policy).await.unwrap();

        input.name = "Changed".into();
        input.characteristic_values = values(&[(f.voltage, "2"), (9999, "x")]);
        assert!(f.repo.equipment_update(created.equipment.id, &input, policy).await.is_err());

        let current = f.repo.equipment_get(created.equipment.id).await.unwrap();
        assert_eq!(current.equipment.name, "Motor1");
        assert_eq!(stored(&current), vec![(f.speed, "1".to_string())]);
    }

    #[tokio::test]
    async fn delete_cascades_through_descendants() {
        let f = fixture().await;
        let policy = SchemaPolicy::default();
        let root = f.repo.equipment_create(&f.input("Line", "L1"), policy).await.unwrap();
        let mut child = f.input("Motor", "M1");
        child.parent = Some(root.equipment.id);
        child.characteristic_values = values(&[(f.speed, "10")]);
        let child = f.repo.equipment_create(&child, policy).await.unwrap();
        let mut grandchild = f.input("Bearing", "B1");
        grandchild.parent = Some(child.equipment.id);
        let grandchild = f.repo.equipment_create(&grandchild, policy).await.unwrap();
        f.repo
            .equipment_set_passport_scan(grandchild.equipment.id, Some("passports/x.pdf"))
            .await
            .unwrap();

        let root_detail = f.repo.equipment_get(root.equipment.id).await.unwrap();
        assert_eq!(root_detail.children, vec![child.equipment.id]);

        let scans = f.repo.equipment_delete(root.equipment.id).await.unwrap();
        assert_eq!(scans, vec!["passports/x.pdf".to_string()]);
        for id in [root.equipment.id, child.equipment.id, grandchild.equipment.id] {
            assert!(matches!(f.repo.equipment_get(id).await, Err(AppError::NotFound(_))));
        }
        assert!(f.repo.state.lock().await.values.is_empty());
    }

    #[tokio::test]
    async fn parent_cycles_are_rejected() {
        let f = fixture().await;
        let policy = SchemaPolicy::default();
        let a = f.repo.equipment_create(&f.input("A", "A"), policy).await.unwrap();
        let mut b = f.input("B", "B");
        b.parent = Some(a.equipment.id);
        let b = f.repo.equipment_create(&b, policy).await.unwrap();

        let mut a_update = f.input("A", "A");
        a_update.parent = Some(b.equipment.id);
        let err = f.repo.equipment_update(a.equipment.id, &a_update, policy).await.unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("parent"));

        a_update.parent = Some(a.equipment.id);
        assert!(f.repo.equipment_update(a.equipment.id, &a_update, policy).await.is_err());
    }

    #[tokio::test]
    async fn protected_references_block_deletes() {
        let f = fixture().await;
        f.repo
            .equipment_create(&f.input("Pump", "P1"), SchemaPolicy::default())
            .await
            .unwrap();

        assert!(matches!(
            f.repo.workshops_delete(f.workshop).await,
            Err(AppError::ReferentialIntegrity(_))
        ));
        assert!(matches!(
            f.repo.equipment_types_delete(f.equipment_type).await,
            Err(AppError::ReferentialIntegrity(_))
        ));
        assert!(matches!(
            f.repo.sites_delete(f.site).await,
            Err(AppError::ReferentialIntegrity(_))
        ));
    }

    #[tokio::test]
    async fn site_delete_cascades_to_empty_workshops() {
        let f = fixture().await;
        f.repo.sites_delete(f.site).await.unwrap();
        assert!(matches!(
            f.repo.workshops_get(f.workshop).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn characteristic_delete_removes_values() {
        let f = fixture().await;
        let mut input = f.input("Motor1", "INV500");
        input.characteristic_values = values(&[(f.speed, "1"), (f.voltage, "2")]);
        let created = f.repo.equipment_create(&input, SchemaPolicy::default()).await.unwrap();

        f.repo.characteristics_delete(f.voltage).await.unwrap();
        let current = f.repo.equipment_get(created.equipment.id).await.unwrap();
        assert_eq!(stored(&current), vec![(f.speed, "1".to_string())]);

        let motor = f.repo.equipment_types_get(f.equipment_type).await.unwrap();
        assert_eq!(motor.characteristics.len(), 1);
    }

    #[tokio::test]
    async fn workshop_name_unique_per_site() {
        let f = fixture().await;
        let err = f
            .repo
            .workshops_create(&WorkshopInput {
                name: "Workshop1".into(),
                site: f.site,
            })
            .await
            .unwrap_err();
        assert!(err.field_errors().is_some());

        let other_site = f
            .repo
            .sites_create(&SiteInput {
                name: "Site2".into(),
                address: String::new(),
            })
            .await
            .unwrap();
        assert!(f
            .repo
            .workshops_create(&WorkshopInput {
                name: "Workshop1".into(),
                site: other_site.id,
            })
            .await
            .is_ok());
    }
}
