//! PostgreSQL repository

mod equipment;

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::CatalogRepository;
use crate::{
    catalog::{ListSpec, SchemaPolicy},
    error::{classify_db_error, AppError, AppResult},
    models::{
        equipment::EquipmentInput,
        equipment_type::{CharacteristicInput, EquipmentTypeInput},
        site::{SiteInput, WorkshopInput},
        user::{NewUser, UserRow},
        Characteristic, EquipmentDetail, EquipmentType, Site, User, Workshop,
    },
};

const WORKSHOP_SELECT: &str = r#"
    SELECT w.id, w.name, w.site_id AS site, s.name AS site_name, w.created_at
    FROM workshops w
    JOIN sites s ON s.id = w.site_id
"#;

const CHARACTERISTIC_SELECT: &str = r#"
    SELECT id, name, equipment_type_id AS equipment_type, value_type
    FROM characteristics
"#;

/// Repository backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgRepository {
    pool: Pool<Postgres>,
}

impl PgRepository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn site_exists(&self, id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sites WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn characteristics_of(&self, equipment_type: Option<i32>) -> AppResult<Vec<Characteristic>> {
        let rows = sqlx::query_as::<_, Characteristic>(&format!(
            "{} WHERE ($1::int IS NULL OR equipment_type_id = $1) ORDER BY name, id",
            CHARACTERISTIC_SELECT
        ))
        .bind(equipment_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl CatalogRepository for PgRepository {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // USERS
    // =========================================================================

    async fn users_get_by_login(&self, login: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, login, password, roles, created_at FROM users WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn users_list(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, login, password, roles, created_at FROM users ORDER BY login",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn users_create(&self, user: &NewUser) -> AppResult<User> {
        let roles: Vec<String> = user.roles.iter().map(|r| r.as_str().to_string()).collect();
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (login, password, roles)
            VALUES ($1, $2, $3)
            RETURNING id, login, password, roles, created_at
            "#,
        )
        .bind(&user.login)
        .bind(&user.password_hash)
        .bind(&roles)
        .fetch_one(&self.pool)
        .await
        .map_err(classify_db_error)?;
        Ok(row.into())
    }

    // =========================================================================
    // SITES
    // =========================================================================

    async fn sites_list(&self) -> AppResult<Vec<Site>> {
        let rows = sqlx::query_as::<_, Site>(
            "SELECT id, name, address, created_at FROM sites ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn sites_get(&self, id: i32) -> AppResult<Site> {
        sqlx::query_as::<_, Site>("SELECT id, name, address, created_at FROM sites WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Site {} not found", id)))
    }

    async fn sites_create(&self, data: &SiteInput) -> AppResult<Site> {
        let row = sqlx::query_as::<_, Site>(
            r#"
            INSERT INTO sites (name, address)
            VALUES ($1, $2)
            RETURNING id, name, address, created_at
            "#,
        )
        .bind(&data.name)
        .bind(&data.address)
        .fetch_one(&self.pool)
        .await
        .map_err(classify_db_error)?;
        Ok(row)
    }

    async fn sites_update(&self, id: i32, data: &SiteInput) -> AppResult<Site> {
        sqlx::query_as::<_, Site>(
            r#"
            UPDATE sites SET name = $1, address = $2
            WHERE id = $3
            RETURNING id, name, address, created_at
            "#,
        )
        .bind(&data.name)
        .bind(&data.address)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_db_error)?
        .ok_or_else(|| AppError::NotFound(format!("Site {} not found", id)))
    }

    async fn sites_delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let found: Option<i32> = sqlx::query_scalar("SELECT id FROM sites WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if found.is_none() {
            return Err(AppError::NotFound(format!("Site {} not found", id)));
        }

        let in_use: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM equipment e
                JOIN workshops w ON w.id = e.workshop_id
                WHERE w.site_id = $1
            )
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if in_use {
            return Err(AppError::ReferentialIntegrity(format!(
                "Site {} has workshops that still hold equipment",
                id
            )));
        }

        sqlx::query("DELETE FROM workshops WHERE site_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(classify_db_error)?;
        sqlx::query("DELETE FROM sites WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(classify_db_error)?;

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // WORKSHOPS
    // =========================================================================

    async fn workshops_list(&self, site: Option<i32>) -> AppResult<Vec<Workshop>> {
        let rows = sqlx::query_as::<_, Workshop>(&format!(
            "{} WHERE ($1::int IS NULL OR w.site_id = $1) ORDER BY w.name, w.id",
            WORKSHOP_SELECT
        ))
        .bind(site)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn workshops_get(&self, id: i32) -> AppResult<Workshop> {
        sqlx::query_as::<_, Workshop>(&format!("{} WHERE w.id = $1", WORKSHOP_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Workshop {} not found", id)))
    }

    async fn workshops_create(&self, data: &WorkshopInput) -> AppResult<Workshop> {
        if !self.site_exists(data.site).await? {
            return Err(AppError::invalid("site", format!("Site {} does not exist", data.site)));
        }
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO workshops (name, site_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(&data.name)
        .bind(data.site)
        .fetch_one(&self.pool)
        .await
        .map_err(classify_db_error)?;
        self.workshops_get(id).await
    }

    async fn workshops_update(&self, id: i32, data: &WorkshopInput) -> AppResult<Workshop> {
        if !self.site_exists(data.site).await? {
            return Err(AppError::invalid("site", format!("Site {} does not exist", data.site)));
        }
        let result = sqlx::query("UPDATE workshops SET name = $1, site_id = $2 WHERE id = $3")
            .bind(&data.name)
            .bind(data.site)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify_db_error)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Workshop {} not found", id)));
        }
        self.workshops_get(id).await
    }

    async fn workshops_delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let in_use: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM equipment WHERE workshop_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if in_use {
            return Err(AppError::ReferentialIntegrity(format!(
                "Workshop {} is still referenced by equipment",
                id
            )));
        }

        let result = sqlx::query("DELETE FROM workshops WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(classify_db_error)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Workshop {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // EQUIPMENT TYPES & CHARACTERISTICS
    // =========================================================================

    async fn equipment_types_list(&self) -> AppResult<Vec<EquipmentType>> {
        let mut types = sqlx::query_as::<_, EquipmentType>(
            "SELECT id, name, description, created_at FROM equipment_types ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_type: HashMap<i32, Vec<Characteristic>> = HashMap::new();
        for characteristic in self.characteristics_of(None).await? {
            by_type
                .entry(characteristic.equipment_type)
                .or_default()
                .push(characteristic);
        }
        for equipment_type in &mut types {
            equipment_type.characteristics = by_type.remove(&equipment_type.id).unwrap_or_default();
        }
        Ok(types)
    }

    async fn equipment_types_get(&self, id: i32) -> AppResult<EquipmentType> {
        let mut equipment_type = sqlx::query_as::<_, EquipmentType>(
            "SELECT id, name, description, created_at FROM equipment_types WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Equipment type {} not found", id)))?;
        equipment_type.characteristics = self.characteristics_of(Some(id)).await?;
        Ok(equipment_type)
    }

    async fn equipment_types_create(&self, data: &EquipmentTypeInput) -> AppResult<EquipmentType> {
        let row = sqlx::query_as::<_, EquipmentType>(
            r#"
            INSERT INTO equipment_types (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(&data.name)
        .bind(&data.description)
        .fetch_one(&self.pool)
        .await
        .map_err(classify_db_error)?;
        Ok(row)
    }

    async fn equipment_types_update(&self, id: i32, data: &EquipmentTypeInput) -> AppResult<EquipmentType> {
        let result = sqlx::query("UPDATE equipment_types SET name = $1, description = $2 WHERE id = $3")
            .bind(&data.name)
            .bind(&data.description)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify_db_error)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Equipment type {} not found", id)));
        }
        self.equipment_types_get(id).await
    }

    async fn equipment_types_delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let found: Option<i32> =
            sqlx::query_scalar("SELECT id FROM equipment_types WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if found.is_none() {
            return Err(AppError::NotFound(format!("Equipment type {} not found", id)));
        }

        let in_use: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM equipment WHERE equipment_type_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if in_use {
            return Err(AppError::ReferentialIntegrity(format!(
                "Equipment type {} is still referenced by equipment",
                id
            )));
        }

        sqlx::query(
            r#"
            DELETE FROM characteristic_values
            WHERE characteristic_id IN (SELECT id FROM characteristics WHERE equipment_type_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM characteristics WHERE equipment_type_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM equipment_types WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(classify_db_error)?;

        tx.commit().await?;
        Ok(())
    }

    async fn characteristics_get(&self, id: i32) -> AppResult<Characteristic> {
        sqlx::query_as::<_, Characteristic>(&format!("{} WHERE id = $1", CHARACTERISTIC_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Characteristic {} not found", id)))
    }

    async fn characteristics_create(
        &self,
        equipment_type: i32,
        data: &CharacteristicInput,
    ) -> AppResult<Characteristic> {
        let type_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM equipment_types WHERE id = $1)")
                .bind(equipment_type)
                .fetch_one(&self.pool)
                .await?;
        if !type_exists {
            return Err(AppError::NotFound(format!(
                "Equipment type {} not found",
                equipment_type
            )));
        }

        let row = sqlx::query_as::<_, Characteristic>(
            r#"
            INSERT INTO characteristics (name, equipment_type_id, value_type)
            VALUES ($1, $2, $3)
            RETURNING id, name, equipment_type_id AS equipment_type, value_type
            "#,
        )
        .bind(&data.name)
        .bind(equipment_type)
        .bind(data.value_type)
        .fetch_one(&self.pool)
        .await
        .map_err(classify_db_error)?;
        Ok(row)
    }

    async fn characteristics_update(&self, id: i32, data: &CharacteristicInput) -> AppResult<Characteristic> {
        sqlx::query_as::<_, Characteristic>(
            r#"
            UPDATE characteristics SET name = $1, value_type = $2
            WHERE id = $3
            RETURNING id, name, equipment_type_id AS equipment_type, value_type
            "#,
        )
        .bind(&data.name)
        .bind(data.value_type)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_db_error)?
        .ok_or_else(|| AppError::NotFound(format!("Characteristic {} not found", id)))
    }

    async fn characteristics_delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM characteristic_values WHERE characteristic_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM characteristics WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(classify_db_error)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Characteristic {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // EQUIPMENT
    // =========================================================================

    async fn equipment_search(&self, spec: &ListSpec) -> AppResult<(Vec<EquipmentDetail>, i64)> {
        self.search_equipment(spec).await
    }

    async fn equipment_get(&self, id: i32) -> AppResult<EquipmentDetail> {
        let mut conn = self.pool.acquire().await?;
        equipment::load_detail(&mut *conn, id).await
    }

    async fn equipment_create(&self, data: &EquipmentInput, policy: SchemaPolicy) -> AppResult<EquipmentDetail> {
        self.write_equipment(None, data, policy).await
    }

    async fn equipment_update(
        &self,
        id: i32,
        data: &EquipmentInput,
        policy: SchemaPolicy,
    ) -> AppResult<EquipmentDetail> {
        self.write_equipment(Some(id), data, policy).await
    }

    async fn equipment_delete(&self, id: i32) -> AppResult<Vec<String>> {
        self.delete_equipment_tree(id).await
    }

    async fn equipment_set_passport_scan(&self, id: i32, key: Option<&str>) -> AppResult<Option<String>> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<Option<String>> =
            sqlx::query_scalar("SELECT passport_scan FROM equipment WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let previous = previous.ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;

        sqlx::query("UPDATE equipment SET passport_scan = $1, updated_at = NOW() WHERE id = $2")
            .bind(key)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(previous)
    }
}
