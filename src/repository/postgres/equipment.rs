//! Equipment queries and writes on PgRepository

use std::collections::{HashMap, HashSet};

use sqlx::PgConnection;

use super::PgRepository;
use crate::{
    catalog::{sync, ListSpec, SchemaPolicy, SyncPlan},
    error::{classify_db_error, classify_reference_error, AppError, AppResult, FieldErrors},
    models::{
        equipment::EquipmentInput, Characteristic, CharacteristicValue, CharacteristicValueInput,
        Equipment, EquipmentDetail,
    },
};

const EQUIPMENT_SELECT: &str = r#"
    SELECT e.id, e.name, e.inventory_number,
           e.equipment_type_id AS equipment_type,
           e.workshop_id AS workshop,
           w.site_id AS site,
           e.parent_id AS parent,
           e.passport_scan, e.created_at, e.updated_at
    FROM equipment e
    JOIN workshops w ON w.id = e.workshop_id
"#;

/// `%term%` for ILIKE, with LIKE metacharacters escaped
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

async fn fetch_values(conn: &mut PgConnection, ids: &[i32]) -> AppResult<Vec<CharacteristicValue>> {
    let rows = sqlx::query_as::<_, CharacteristicValue>(
        r#"
        SELECT v.id, v.equipment_id AS equipment, v.characteristic_id AS characteristic,
               c.name AS characteristic_name, v.value
        FROM characteristic_values v
        JOIN characteristics c ON c.id = v.characteristic_id
        WHERE v.equipment_id = ANY($1)
        ORDER BY c.name, v.id
        "#,
    )
    .bind(ids)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Attach characteristic values and direct children, preserving row order
async fn attach_details(conn: &mut PgConnection, rows: Vec<Equipment>) -> AppResult<Vec<EquipmentDetail>> {
    let ids: Vec<i32> = rows.iter().map(|e| e.id).collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut values: HashMap<i32, Vec<CharacteristicValue>> = HashMap::new();
    for value in fetch_values(&mut *conn, &ids).await? {
        values.entry(value.equipment).or_default().push(value);
    }

    let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
    let pairs: Vec<(i32, i32)> = sqlx::query_as(
        "SELECT id, parent_id FROM equipment WHERE parent_id = ANY($1) ORDER BY id",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;
    for (child, parent) in pairs {
        children.entry(parent).or_default().push(child);
    }

    Ok(rows
        .into_iter()
        .map(|equipment| EquipmentDetail {
            characteristic_values: values.remove(&equipment.id).unwrap_or_default(),
            children: children.remove(&equipment.id).unwrap_or_default(),
            equipment,
        })
        .collect())
}

pub(super) async fn load_detail(conn: &mut PgConnection, id: i32) -> AppResult<EquipmentDetail> {
    let row = sqlx::query_as::<_, Equipment>(&format!("{} WHERE e.id = $1", EQUIPMENT_SELECT))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;
    attach_details(conn, vec![row])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal(format!("Equipment {} vanished while loading", id)))
}

async fn exists(conn: &mut PgConnection, table: &str, id: i32) -> AppResult<bool> {
    let found: bool = sqlx::query_scalar(&format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", table))
        .bind(id)
        .fetch_one(conn)
        .await?;
    Ok(found)
}

/// True when `parent` is `id` or has `id` among its ancestors
async fn creates_cycle(conn: &mut PgConnection, id: i32, parent: i32) -> AppResult<bool> {
    let cycle: bool = sqlx::query_scalar(
        r#"
        WITH RECURSIVE ancestors(id) AS (
            SELECT $1::int
            UNION
            SELECT e.parent_id FROM equipment e
            JOIN ancestors a ON e.id = a.id
            WHERE e.parent_id IS NOT NULL
        )
        SELECT EXISTS(SELECT 1 FROM ancestors WHERE id = $2)
        "#,
    )
    .bind(parent)
    .bind(id)
    .fetch_one(conn)
    .await?;
    Ok(cycle)
}

/// Reference and uniqueness checks, collected per field
async fn check_references(conn: &mut PgConnection, data: &EquipmentInput, id: Option<i32>) -> AppResult<()> {
    let mut fields = FieldErrors::new();

    let duplicate: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM equipment WHERE inventory_number = $1 AND ($2::int IS NULL OR id <> $2))",
    )
    .bind(&data.inventory_number)
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;
    if duplicate {
        fields
            .entry("inventory_number".to_string())
            .or_default()
            .push("Equipment with this inventory_number already exists".to_string());
    }
    if !exists(&mut *conn, "equipment_types", data.equipment_type).await? {
        fields
            .entry("equipment_type".to_string())
            .or_default()
            .push(format!("Equipment type {} does not exist", data.equipment_type));
    }
    if !exists(&mut *conn, "workshops", data.workshop).await? {
        fields
            .entry("workshop".to_string())
            .or_default()
            .push(format!("Workshop {} does not exist", data.workshop));
    }
    if let Some(parent) = data.parent {
        if !exists(&mut *conn, "equipment", parent).await? {
            fields
                .entry("parent".to_string())
                .or_default()
                .push(format!("Equipment {} does not exist", parent));
        } else if let Some(id) = id {
            if creates_cycle(&mut *conn, id, parent).await? {
                fields
                    .entry("parent".to_string())
                    .or_default()
                    .push("Equipment cannot be its own ancestor".to_string());
            }
        }
    }

    if fields.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(fields))
    }
}

async fn apply_plan(conn: &mut PgConnection, equipment: i32, plan: SyncPlan) -> AppResult<()> {
    if !plan.removed.is_empty() {
        sqlx::query("DELETE FROM characteristic_values WHERE id = ANY($1)")
            .bind(&plan.removed)
            .execute(&mut *conn)
            .await?;
    }
    for (id, value) in &plan.updated {
        sqlx::query("UPDATE characteristic_values SET value = $1 WHERE id = $2")
            .bind(value)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    for entry in &plan.inserted {
        sqlx::query(
            "INSERT INTO characteristic_values (equipment_id, characteristic_id, value) VALUES ($1, $2, $3)",
        )
        .bind(equipment)
        .bind(entry.characteristic)
        .bind(&entry.value)
        .execute(&mut *conn)
        .await
        .map_err(|e| classify_reference_error(e, "characteristic_values"))?;
    }
    Ok(())
}

impl PgRepository {
    pub(super) async fn search_equipment(&self, spec: &ListSpec) -> AppResult<(Vec<EquipmentDetail>, i64)> {
        let filter = &spec.filter;
        let mut conditions: Vec<String> = Vec::new();
        let mut idx = 1;

        macro_rules! add_condition {
            ($field:expr, $sql:literal) => {
                if $field.is_some() {
                    conditions.push(format!($sql, n = idx));
                    idx += 1;
                }
            };
        }

        add_condition!(filter.workshop, "e.workshop_id = ${n}");
        add_condition!(filter.site, "w.site_id = ${n}");
        add_condition!(filter.equipment_type, "e.equipment_type_id = ${n}");
        add_condition!(filter.name, "e.name ILIKE ${n}");
        add_condition!(filter.inventory_number, "e.inventory_number ILIKE ${n}");
        add_condition!(filter.search, "(e.name ILIKE ${n} OR e.inventory_number ILIKE ${n})");

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let name = filter.name.as_deref().map(like_pattern);
        let inventory_number = filter.inventory_number.as_deref().map(like_pattern);
        let search = filter.search.as_deref().map(like_pattern);

        macro_rules! bind_filters {
            ($builder:expr) => {{
                let mut builder = $builder;
                if let Some(v) = filter.workshop {
                    builder = builder.bind(v);
                }
                if let Some(v) = filter.site {
                    builder = builder.bind(v);
                }
                if let Some(v) = filter.equipment_type {
                    builder = builder.bind(v);
                }
                if let Some(ref v) = name {
                    builder = builder.bind(v);
                }
                if let Some(ref v) = inventory_number {
                    builder = builder.bind(v);
                }
                if let Some(ref v) = search {
                    builder = builder.bind(v);
                }
                builder
            }};
        }

        let mut conn = self.pool.acquire().await?;

        let count_query = format!(
            "SELECT COUNT(*) FROM equipment e JOIN workshops w ON w.id = e.workshop_id {}",
            where_clause
        );
        let total: i64 = bind_filters!(sqlx::query_scalar::<_, i64>(&count_query))
            .fetch_one(&mut *conn)
            .await?;

        let offset = spec.pagination.check(total)?;

        let select_query = format!(
            "{} {} ORDER BY {} LIMIT ${} OFFSET ${}",
            EQUIPMENT_SELECT,
            where_clause,
            spec.ordering.to_sql(),
            idx,
            idx + 1
        );
        let rows = bind_filters!(sqlx::query_as::<_, Equipment>(&select_query))
            .bind(spec.pagination.per_page)
            .bind(offset)
            .fetch_all(&mut *conn)
            .await?;

        let items = attach_details(&mut conn, rows).await?;
        Ok((items, total))
    }

    /// Create (`id = None`) or fully update equipment with its value set, atomically
    pub(super) async fn write_equipment(
        &self,
        id: Option<i32>,
        data: &EquipmentInput,
        policy: SchemaPolicy,
    ) -> AppResult<EquipmentDetail> {
        let mut tx = self.pool.begin().await?;

        if let Some(id) = id {
            let locked: Option<i32> = sqlx::query_scalar("SELECT id FROM equipment WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            if locked.is_none() {
                return Err(AppError::NotFound(format!("Equipment {} not found", id)));
            }
        }

        check_references(&mut tx, data, id).await?;

        let existing = match id {
            Some(id) => fetch_values(&mut tx, &[id]).await?,
            None => Vec::new(),
        };
        let submitted = data.characteristic_values.clone().unwrap_or_else(|| {
            existing
                .iter()
                .map(|v| CharacteristicValueInput {
                    characteristic: v.characteristic,
                    value: v.value.clone(),
                })
                .collect()
        });
        let known = sqlx::query_as::<_, Characteristic>(
            "SELECT id, name, equipment_type_id AS equipment_type, value_type FROM characteristics WHERE id = ANY($1)",
        )
        .bind(sync::referenced_ids(&submitted))
        .fetch_all(&mut *tx)
        .await?;
        let plan = sync::reconcile(data.equipment_type, &existing, &submitted, &known, policy)?;

        let equipment_id: i32 = match id {
            None => sqlx::query_scalar(
                r#"
                INSERT INTO equipment (name, inventory_number, equipment_type_id, workshop_id, parent_id)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(&data.name)
            .bind(&data.inventory_number)
            .bind(data.equipment_type)
            .bind(data.workshop)
            .bind(data.parent)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify_db_error)?,
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE equipment
                    SET name = $1, inventory_number = $2, equipment_type_id = $3,
                        workshop_id = $4, parent_id = $5, updated_at = NOW()
                    WHERE id = $6
                    "#,
                )
                .bind(&data.name)
                .bind(&data.inventory_number)
                .bind(data.equipment_type)
                .bind(data.workshop)
                .bind(data.parent)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(classify_db_error)?;
                id
            }
        };

        apply_plan(&mut tx, equipment_id, plan).await?;
        let detail = load_detail(&mut tx, equipment_id).await?;

        tx.commit().await?;
        Ok(detail)
    }

    /// Delete equipment and every descendant; returns their passport-scan keys
    pub(super) async fn delete_equipment_tree(&self, id: i32) -> AppResult<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<i32> = sqlx::query_scalar("SELECT id FROM equipment WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(AppError::NotFound(format!("Equipment {} not found", id)));
        }

        let mut doomed = vec![id];
        let mut seen: HashSet<i32> = HashSet::from([id]);
        let mut frontier = vec![id];
        while !frontier.is_empty() {
            let children: Vec<i32> =
                sqlx::query_scalar("SELECT id FROM equipment WHERE parent_id = ANY($1) ORDER BY id")
                    .bind(&frontier)
                    .fetch_all(&mut *tx)
                    .await?;
            frontier = children.into_iter().filter(|c| seen.insert(*c)).collect();
            doomed.extend(&frontier);
        }

        let scans: Vec<String> = sqlx::query_scalar(
            "SELECT passport_scan FROM equipment WHERE id = ANY($1) AND passport_scan IS NOT NULL",
        )
        .bind(&doomed)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM characteristic_values WHERE equipment_id = ANY($1)")
            .bind(&doomed)
            .execute(&mut *tx)
            .await?;
        // One statement, so the parent_id self-reference is checked after all rows are gone
        sqlx::query("DELETE FROM equipment WHERE id = ANY($1)")
            .bind(&doomed)
            .execute(&mut *tx)
            .await
            .map_err(classify_db_error)?;

        tx.commit().await?;

        tracing::debug!("Deleted equipment {} with {} descendants", id, doomed.len() - 1);
        Ok(scans)
    }
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("valve"), "%valve%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
