//! Characteristic-value reconciliation.
//!
//! A submitted value set is authoritative and total: after applying the plan
//! the stored set for the equipment equals the submission. Planning is pure;
//! repositories apply the plan inside the same transaction that loaded the
//! existing values.

use std::collections::{HashMap, HashSet};

use crate::{
    error::{AppError, AppResult},
    models::{Characteristic, CharacteristicValue, CharacteristicValueInput},
};

const FIELD: &str = "characteristic_values";

/// Schema checks applied on top of referential validity
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaPolicy {
    /// Characteristic must belong to the equipment's type
    pub enforce_type_schema: bool,
    /// Value must parse as the characteristic's value type
    pub validate_value_types: bool,
}

/// Changes needed to turn the stored value set into the submitted one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Value record IDs to delete
    pub removed: Vec<i32>,
    /// Value record ID → new value
    pub updated: Vec<(i32, String)>,
    /// Values for characteristics with no stored record
    pub inserted: Vec<CharacteristicValueInput>,
}

impl SyncPlan {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.updated.is_empty() && self.inserted.is_empty()
    }
}

/// Validate a submission without looking at stored values.
///
/// `known` must contain every characteristic the storage layer could resolve
/// from the submitted IDs; anything missing is reported as nonexistent.
pub fn validate(
    equipment_type: i32,
    submitted: &[CharacteristicValueInput],
    known: &[Characteristic],
    policy: SchemaPolicy,
) -> AppResult<()> {
    let by_id: HashMap<i32, &Characteristic> = known.iter().map(|c| (c.id, c)).collect();
    let mut seen = HashSet::new();
    let mut messages = Vec::new();

    for entry in submitted {
        if !seen.insert(entry.characteristic) {
            messages.push(format!(
                "Characteristic {} submitted more than once",
                entry.characteristic
            ));
            continue;
        }
        let Some(characteristic) = by_id.get(&entry.characteristic) else {
            messages.push(format!(
                "Invalid characteristic {} - object does not exist",
                entry.characteristic
            ));
            continue;
        };
        if policy.enforce_type_schema && characteristic.equipment_type != equipment_type {
            messages.push(format!(
                "Characteristic {} ({}) does not belong to equipment type {}",
                characteristic.id, characteristic.name, equipment_type
            ));
            continue;
        }
        if policy.validate_value_types {
            if let Err(msg) = characteristic.value_type.check(&entry.value) {
                messages.push(format!("{}: {}", characteristic.name, msg));
            }
        }
    }

    if messages.is_empty() {
        Ok(())
    } else {
        let mut fields = crate::error::FieldErrors::new();
        fields.insert(FIELD.to_string(), messages);
        Err(AppError::Validation(fields))
    }
}

/// Diff an already-validated submission against the stored values
pub fn plan(existing: &[CharacteristicValue], submitted: &[CharacteristicValueInput]) -> SyncPlan {
    let submitted_by_characteristic: HashMap<i32, &str> = submitted
        .iter()
        .map(|e| (e.characteristic, e.value.as_str()))
        .collect();
    let existing_by_characteristic: HashMap<i32, &CharacteristicValue> =
        existing.iter().map(|v| (v.characteristic, v)).collect();

    let mut result = SyncPlan::default();

    for stored in existing {
        match submitted_by_characteristic.get(&stored.characteristic) {
            None => result.removed.push(stored.id),
            Some(value) if *value != stored.value => {
                result.updated.push((stored.id, value.to_string()))
            }
            Some(_) => {}
        }
    }

    for entry in submitted {
        if !existing_by_characteristic.contains_key(&entry.characteristic) {
            result.inserted.push(entry.clone());
        }
    }

    result
}

/// Validate then plan in one step
pub fn reconcile(
    equipment_type: i32,
    existing: &[CharacteristicValue],
    submitted: &[CharacteristicValueInput],
    known: &[Characteristic],
    policy: SchemaPolicy,
) -> AppResult<SyncPlan> {
    validate(equipment_type, submitted, known, policy)?;
    Ok(plan(existing, submitted))
}

/// Distinct characteristic IDs referenced by a submission
pub fn referenced_ids(submitted: &[CharacteristicValueInput]) -> Vec<i32> {
    let mut ids: Vec<i32> = submitted.iter().map(|e| e.characteristic).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValueType;

    fn characteristic(id: i32, equipment_type: i32, value_type: ValueType) -> Characteristic {
        Characteristic {
            id,
            name: format!("C{}", id),
            equipment_type,
            value_type,
        }
    }

    fn stored(id: i32, characteristic: i32, value: &str) -> CharacteristicValue {
        CharacteristicValue {
            id,
            equipment: 1,
            characteristic,
            characteristic_name: format!("C{}", characteristic),
            value: value.to_string(),
        }
    }

    fn input(characteristic: i32, value: &str) -> CharacteristicValueInput {
        CharacteristicValueInput {
            characteristic,
            value: value.to_string(),
        }
    }

    /// Apply a plan to an in-memory value list, as a repository would
    fn apply(existing: &[CharacteristicValue], plan: &SyncPlan) -> Vec<(i32, String)> {
        let mut state: Vec<(i32, String)> = existing
            .iter()
            .filter(|v| !plan.removed.contains(&v.id))
            .map(|v| {
                let value = plan
                    .updated
                    .iter()
                    .find(|(id, _)| *id == v.id)
                    .map(|(_, value)| value.clone())
                    .unwrap_or_else(|| v.value.clone());
                (v.characteristic, value)
            })
            .collect();
        state.extend(plan.inserted.iter().map(|e| (e.characteristic, e.value.clone())));
        state.sort();
        state
    }

    fn known() -> Vec<Characteristic> {
        vec![
            characteristic(1, 10, ValueType::Number),
            characteristic(2, 10, ValueType::Number),
            characteristic(3, 20, ValueType::String),
        ]
    }

    #[test]
    fn create_inserts_every_pair() {
        let submitted = [input(1, "1500"), input(2, "220")];
        let plan = reconcile(10, &[], &submitted, &known(), SchemaPolicy::default()).unwrap();
        assert_eq!(plan.inserted, submitted.to_vec());
        assert!(plan.removed.is_empty());
        assert!(plan.updated.is_empty());
    }

    #[test]
    fn replace_all_drops_missing_characteristics() {
        let existing = [stored(100, 1, "1"), stored(101, 2, "2")];
        let plan = reconcile(10, &existing, &[input(1, "3")], &known(), SchemaPolicy::default()).unwrap();

        assert_eq!(plan.removed, vec![101]);
        assert_eq!(plan.updated, vec![(100, "3".to_string())]);
        assert_eq!(apply(&existing, &plan), vec![(1, "3".to_string())]);
    }

    #[test]
    fn empty_submission_clears_everything() {
        let existing = [stored(100, 1, "1"), stored(101, 2, "2")];
        let plan = plan(&existing, &[]);
        assert_eq!(plan.removed, vec![100, 101]);
        assert!(apply(&existing, &plan).is_empty());
    }

    #[test]
    fn resubmitting_same_set_is_a_noop() {
        let submitted = [input(1, "1500"), input(2, "220")];
        let first = plan(&[], &submitted);
        assert!(!first.is_noop());

        let existing = [stored(100, 1, "1500"), stored(101, 2, "220")];
        assert!(plan(&existing, &submitted).is_noop());
    }

    #[test]
    fn duplicate_characteristic_is_rejected() {
        let err = reconcile(
            10,
            &[],
            &[input(1, "a"), input(1, "b")],
            &known(),
            SchemaPolicy::default(),
        )
        .unwrap_err();
        let fields = err.field_errors().unwrap();
        assert!(fields[FIELD][0].contains("more than once"));
    }

    #[test]
    fn unknown_characteristic_fails_whole_submission() {
        let err = reconcile(
            10,
            &[stored(100, 1, "1")],
            &[input(1, "2"), input(99, "x")],
            &known(),
            SchemaPolicy::default(),
        )
        .unwrap_err();
        assert!(err.field_errors().unwrap()[FIELD][0].contains("does not exist"));
    }

    #[test]
    fn foreign_type_characteristic_respects_policy() {
        let submitted = [input(3, "steel")];
        let lenient = SchemaPolicy::default();
        assert!(reconcile(10, &[], &submitted, &known(), lenient).is_ok());

        let strict = SchemaPolicy {
            enforce_type_schema: true,
            ..Default::default()
        };
        assert!(reconcile(10, &[], &submitted, &known(), strict).is_err());
    }

    #[test]
    fn value_types_checked_only_when_enabled() {
        let submitted = [input(1, "fast")];
        assert!(reconcile(10, &[], &submitted, &known(), SchemaPolicy::default()).is_ok());

        let typed = SchemaPolicy {
            validate_value_types: true,
            ..Default::default()
        };
        let err = reconcile(10, &[], &submitted, &known(), typed).unwrap_err();
        assert!(err.field_errors().unwrap()[FIELD][0].contains("not a valid number"));
    }

    #[test]
    fn referenced_ids_are_sorted_and_distinct() {
        assert_eq!(referenced_ids(&[input(3, ""), input(1, ""), input(3, "")]), vec![1, 3]);
    }
}
