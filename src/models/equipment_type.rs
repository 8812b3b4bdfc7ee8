//! Equipment types and their characteristic schema

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::Validate;

/// Declared type of a characteristic's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Date,
    Boolean,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Date => "date",
            ValueType::Boolean => "boolean",
        }
    }

    /// Check that a stored text value parses as this type
    pub fn check(&self, value: &str) -> Result<(), String> {
        let value = value.trim();
        let ok = match self {
            ValueType::String => true,
            ValueType::Number => value.parse::<f64>().map(f64::is_finite).unwrap_or(false),
            ValueType::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
            ValueType::Boolean => matches!(value.to_lowercase().as_str(), "true" | "false"),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("\"{}\" is not a valid {} value", value, self.as_str()))
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(ValueType::String),
            "number" => Ok(ValueType::Number),
            "date" => Ok(ValueType::Date),
            "boolean" => Ok(ValueType::Boolean),
            _ => Err(format!("Invalid value type: {}", s)),
        }
    }
}

// Stored as TEXT with a CHECK constraint
impl sqlx::Type<Postgres> for ValueType {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for ValueType {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for ValueType {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Named, typed attribute definition scoped to an equipment type
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Characteristic {
    pub id: i32,
    pub name: String,
    /// Owning equipment type ID
    pub equipment_type: i32,
    pub value_type: ValueType,
}

/// Create / update characteristic request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CharacteristicInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    pub value_type: ValueType,
}

/// Equipment category with its characteristic schema
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct EquipmentType {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Characteristic definitions ordered by name
    #[sqlx(skip)]
    pub characteristics: Vec<Characteristic>,
}

/// Create / update equipment type request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct EquipmentTypeInput {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_type_checks() {
        assert!(ValueType::Number.check("1500").is_ok());
        assert!(ValueType::Number.check("-2.5").is_ok());
        assert!(ValueType::Number.check("fast").is_err());
        assert!(ValueType::Number.check("NaN").is_err());
        assert!(ValueType::Date.check("2024-02-29").is_ok());
        assert!(ValueType::Date.check("29.02.2024").is_err());
        assert!(ValueType::Boolean.check("True").is_ok());
        assert!(ValueType::Boolean.check("yes").is_err());
        assert!(ValueType::String.check("anything").is_ok());
    }

    #[test]
    fn value_type_round_trips_through_its_label() {
        for vt in [ValueType::String, ValueType::Number, ValueType::Date, ValueType::Boolean] {
            assert_eq!(vt.as_str().parse::<ValueType>().unwrap(), vt);
        }
    }
}
