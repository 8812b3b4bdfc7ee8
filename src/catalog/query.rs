//! Equipment listing pipeline: scope → substring → search → order → paginate.
//!
//! Each stage is an independent transformation and is the identity when its
//! parameter is absent. The in-memory repository runs these functions
//! directly; the Postgres repository translates the same [`ListSpec`] to SQL.
//!
//! Case folding differs slightly between the two: Rust's `to_lowercase` here,
//! `ILIKE` under the database collation there. They agree on ASCII but may not
//! on characters such as `ß` or the Turkish dotted `İ`.

use std::cmp::Ordering as CmpOrdering;

use crate::{
    config::CatalogConfig,
    error::{AppError, AppResult},
    models::{equipment::EquipmentQuery, Equipment},
};

/// Orderable equipment fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    CreatedAt,
    InventoryNumber,
}

impl SortKey {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(SortKey::Name),
            "created_at" => Some(SortKey::CreatedAt),
            "inventory_number" => Some(SortKey::InventoryNumber),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortKey::Name => "e.name COLLATE \"C\"",
            SortKey::CreatedAt => "e.created_at",
            SortKey::InventoryNumber => "e.inventory_number COLLATE \"C\"",
        }
    }

    fn compare(&self, a: &Equipment, b: &Equipment) -> CmpOrdering {
        match self {
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::InventoryNumber => a.inventory_number.cmp(&b.inventory_number),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortField {
    pub key: SortKey,
    pub descending: bool,
}

/// Requested ordering; `id` ascending is always appended as tie-breaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering(pub Vec<SortField>);

impl Default for Ordering {
    fn default() -> Self {
        Ordering(vec![SortField {
            key: SortKey::Name,
            descending: false,
        }])
    }
}

impl Ordering {
    /// Parse `name`, `-created_at`, `name,-inventory_number`, ...
    ///
    /// Unknown keys are ignored; nothing usable falls back to the default.
    pub fn parse(raw: Option<&str>) -> Self {
        let fields: Vec<SortField> = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter_map(|term| {
                let (descending, name) = match term.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, term),
                };
                SortKey::parse(name).map(|key| SortField { key, descending })
            })
            .collect();

        if fields.is_empty() {
            Ordering::default()
        } else {
            Ordering(fields)
        }
    }

    pub fn compare(&self, a: &Equipment, b: &Equipment) -> CmpOrdering {
        self.0
            .iter()
            .map(|field| {
                let ord = field.key.compare(a, b);
                if field.descending {
                    ord.reverse()
                } else {
                    ord
                }
            })
            .find(|ord| *ord != CmpOrdering::Equal)
            .unwrap_or_else(|| a.id.cmp(&b.id))
    }

    /// SQL ORDER BY body
    pub fn to_sql(&self) -> String {
        let mut terms: Vec<String> = self
            .0
            .iter()
            .map(|f| format!("{} {}", f.key.column(), if f.descending { "DESC" } else { "ASC" }))
            .collect();
        terms.push("e.id ASC".to_string());
        terms.join(", ")
    }
}

/// Active filters, already normalized (blank parameters dropped, terms lowercased)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquipmentFilter {
    pub workshop: Option<i32>,
    pub site: Option<i32>,
    pub equipment_type: Option<i32>,
    pub name: Option<String>,
    pub inventory_number: Option<String>,
    pub search: Option<String>,
}

fn normalize(term: &Option<String>) -> Option<String> {
    term.as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn resolve(page: Option<i64>, per_page: Option<i64>, config: &CatalogConfig) -> AppResult<Self> {
        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(AppError::invalid("page", "Page must be at least 1"));
        }
        let per_page = per_page.unwrap_or(config.page_size);
        if per_page < 1 {
            return Err(AppError::invalid("per_page", "Page size must be at least 1"));
        }
        Ok(Self {
            page,
            per_page: per_page.min(config.max_page_size),
        })
    }

    /// Rows skipped before this page; `None` when it does not fit in an `i64`
    pub fn offset(&self) -> Option<i64> {
        self.page.checked_sub(1)?.checked_mul(self.per_page)
    }

    /// Reject pages past the end and return the offset of this one.
    ///
    /// Page 1 of an empty result is valid.
    pub fn check(&self, total: i64) -> AppResult<i64> {
        match self.offset() {
            Some(offset) if self.page == 1 || offset < total => Ok(offset),
            _ => Err(AppError::NotFound(format!("Invalid page {}", self.page))),
        }
    }
}

/// Fully parsed listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSpec {
    pub filter: EquipmentFilter,
    pub ordering: Ordering,
    pub pagination: Pagination,
}

impl ListSpec {
    pub fn from_query(query: &EquipmentQuery, config: &CatalogConfig) -> AppResult<Self> {
        Ok(Self {
            filter: EquipmentFilter {
                workshop: query.workshop,
                site: query.site,
                equipment_type: query.equipment_type,
                name: normalize(&query.name),
                inventory_number: normalize(&query.inventory_number),
                search: normalize(&query.search),
            },
            ordering: Ordering::parse(query.ordering.as_deref()),
            pagination: Pagination::resolve(query.page, query.per_page, config)?,
        })
    }
}

/// Stage 1: exact-match scope filters
pub fn scope(rows: Vec<Equipment>, filter: &EquipmentFilter) -> Vec<Equipment> {
    rows.into_iter()
        .filter(|e| filter.workshop.map_or(true, |id| e.workshop == id))
        .filter(|e| filter.site.map_or(true, |id| e.site == id))
        .filter(|e| filter.equipment_type.map_or(true, |id| e.equipment_type == id))
        .collect()
}

/// Stage 2: case-insensitive substring filters
pub fn substring(rows: Vec<Equipment>, filter: &EquipmentFilter) -> Vec<Equipment> {
    rows.into_iter()
        .filter(|e| filter.name.as_deref().map_or(true, |t| contains(&e.name, t)))
        .filter(|e| {
            filter
                .inventory_number
                .as_deref()
                .map_or(true, |t| contains(&e.inventory_number, t))
        })
        .collect()
}

/// Stage 3: free-text search across name OR inventory number
pub fn search(rows: Vec<Equipment>, filter: &EquipmentFilter) -> Vec<Equipment> {
    match filter.search.as_deref() {
        None => rows,
        Some(term) => rows
            .into_iter()
            .filter(|e| contains(&e.name, term) || contains(&e.inventory_number, term))
            .collect(),
    }
}

/// Stage 4: ordering with id tie-breaker
pub fn order(mut rows: Vec<Equipment>, ordering: &Ordering) -> Vec<Equipment> {
    rows.sort_by(|a, b| ordering.compare(a, b));
    rows
}

/// Stage 5: slice one page; returns the page and the pre-slice total
pub fn paginate(rows: Vec<Equipment>, pagination: &Pagination) -> AppResult<(Vec<Equipment>, i64)> {
    let total = rows.len() as i64;
    let offset = pagination.check(total)?;
    // offset < total here, and per_page is positive
    let skip = usize::try_from(offset).unwrap_or(usize::MAX);
    let take = usize::try_from(pagination.per_page).unwrap_or(usize::MAX);
    let page = rows.into_iter().skip(skip).take(take).collect();
    Ok((page, total))
}

/// Run every stage in order
pub fn run(rows: Vec<Equipment>, spec: &ListSpec) -> AppResult<(Vec<Equipment>, i64)> {
    let rows = scope(rows, &spec.filter);
    let rows = substring(rows, &spec.filter);
    let rows = search(rows, &spec.filter);
    let rows = order(rows, &spec.ordering);
    paginate(rows, &spec.pagination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn equipment(id: i32, name: &str, inventory_number: &str, workshop: i32, site: i32) -> Equipment {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(id as i64);
        Equipment {
            id,
            name: name.to_string(),
            inventory_number: inventory_number.to_string(),
            equipment_type: if id % 2 == 0 { 1 } else { 2 },
            workshop,
            site,
            parent: None,
            passport_scan: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn valves() -> Vec<Equipment> {
        (0..5)
            .map(|i| equipment(i + 1, &format!("Valve{}", i), &format!("INV{}", 100 + i), 1, 1))
            .collect()
    }

    fn spec(query: EquipmentQuery) -> ListSpec {
        ListSpec::from_query(&query, &CatalogConfig::default()).unwrap()
    }

    fn names(rows: &[Equipment]) -> Vec<&str> {
        rows.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn descending_name_first_page() {
        let (page, total) = run(
            valves(),
            &spec(EquipmentQuery {
                ordering: Some("-name".into()),
                ..Default::default()
            }),
        )
        .unwrap();
        assert_eq!(total, 5);
        assert_eq!(names(&page), vec!["Valve4", "Valve3"]);
    }

    #[test]
    fn search_matches_single_valve() {
        let (page, total) = run(
            valves(),
            &spec(EquipmentQuery {
                search: Some("valve3".into()),
                ..Default::default()
            }),
        )
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(names(&page), vec!["Valve3"]);
    }

    #[test]
    fn search_ors_name_and_inventory_number() {
        let (page, _) = run(
            valves(),
            &spec(EquipmentQuery {
                search: Some("inv104".into()),
                ..Default::default()
            }),
        )
        .unwrap();
        assert_eq!(names(&page), vec!["Valve4"]);
    }

    #[test]
    fn filters_and_search_combine_with_and() {
        let mut rows = valves();
        rows.push(equipment(10, "Pump", "INV900", 2, 2));
        rows.push(equipment(11, "Valve9", "INV901", 2, 2));

        let (page, total) = run(
            rows,
            &spec(EquipmentQuery {
                site: Some(2),
                search: Some("valve".into()),
                ..Default::default()
            }),
        )
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(names(&page), vec!["Valve9"]);
    }

    #[test]
    fn substring_filters_are_case_insensitive() {
        let rows = substring(
            valves(),
            &EquipmentFilter {
                name: Some("valve".into()),
                inventory_number: Some("inv10".into()),
                ..Default::default()
            },
        );
        assert_eq!(rows.len(), 5);
    }

    #[test]
    fn blank_parameters_are_identity() {
        let query = EquipmentQuery {
            name: Some("   ".into()),
            search: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(spec(query).filter, EquipmentFilter::default());
    }

    #[test]
    fn ties_break_on_id() {
        let rows = vec![
            equipment(3, "Same", "A3", 1, 1),
            equipment(1, "Same", "A1", 1, 1),
            equipment(2, "Same", "A2", 1, 1),
        ];
        let ordered = order(rows, &Ordering::default());
        assert_eq!(ordered.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn ordering_parse_ignores_unknown_keys() {
        assert_eq!(Ordering::parse(Some("bogus")), Ordering::default());
        assert_eq!(
            Ordering::parse(Some("bogus,-created_at")),
            Ordering(vec![SortField {
                key: SortKey::CreatedAt,
                descending: true
            }])
        );
        assert_eq!(
            Ordering::parse(Some("-name")).to_sql(),
            "e.name COLLATE \"C\" DESC, e.id ASC"
        );
    }

    #[test]
    fn pagination_bounds() {
        let config = CatalogConfig::default();
        assert!(Pagination::resolve(Some(0), None, &config).is_err());
        assert!(Pagination::resolve(None, Some(0), &config).is_err());
        assert_eq!(Pagination::resolve(None, Some(1000), &config).unwrap().per_page, 100);

        let third = Pagination::resolve(Some(3), None, &config).unwrap();
        assert!(paginate(valves(), &third).is_ok());
        let fourth = Pagination::resolve(Some(4), None, &config).unwrap();
        assert!(matches!(paginate(valves(), &fourth), Err(AppError::NotFound(_))));

        let first = Pagination::resolve(None, None, &config).unwrap();
        assert_eq!(paginate(Vec::new(), &first).unwrap().1, 0);

        let huge = Pagination::resolve(Some(i64::MAX), None, &config).unwrap();
        assert_eq!(huge.offset(), None);
        assert!(matches!(huge.check(5), Err(AppError::NotFound(_))));
        assert!(matches!(paginate(valves(), &huge), Err(AppError::NotFound(_))));
    }
}
