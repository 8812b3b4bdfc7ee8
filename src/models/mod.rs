//! Data models for the equipment catalog

pub mod equipment;
pub mod equipment_type;
pub mod site;
pub mod user;

// Re-export commonly used types
pub use equipment::{CharacteristicValue, CharacteristicValueInput, Equipment, EquipmentDetail};
pub use equipment_type::{Characteristic, EquipmentType, ValueType};
pub use site::{Site, Workshop};
pub use user::{User, UserClaims};
