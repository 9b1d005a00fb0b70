//! Sync conflict models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entity kinds that can diverge across devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Product,
    Warehouse,
    Operation,
}

impl EntityType {
    /// Stable storage name for this entity type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Product => "PRODUCT",
            Self::Warehouse => "WAREHOUSE",
            Self::Operation => "OPERATION",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRODUCT" => Ok(Self::Product),
            "WAREHOUSE" => Ok(Self::Warehouse),
            "OPERATION" => Ok(Self::Operation),
            other => Err(format!("unknown entity type: {other}")),
        }
    }
}

/// A detected divergence between a local and remote version of the same entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Derived identifier: entity type + entity id + detection timestamp
    pub id: String,
    /// Kind of the diverging entity
    pub entity_type: EntityType,
    /// Id of the diverging entity
    pub entity_id: String,
    /// Entity snapshot as known locally
    pub local_version: serde_json::Value,
    /// Entity snapshot as received from the remote device
    pub remote_version: serde_json::Value,
    /// Names of non-excluded fields whose values differ, sorted
    pub conflict_fields: Vec<String>,
    /// Device that produced the remote version
    pub origin_device_id: String,
    /// Detection timestamp (Unix ms)
    pub detected_at: i64,
}

impl SyncConflict {
    /// Derive the conflict identifier from its parts
    #[must_use]
    pub fn derive_id(entity_type: EntityType, entity_id: &str, detected_at: i64) -> String {
        format!("{entity_type}:{entity_id}:{detected_at}")
    }
}

/// A conflict resolution recorded in the durable log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedConflict {
    /// Log row identifier
    pub id: i64,
    /// Kind of the entity that conflicted
    pub entity_type: EntityType,
    /// Id of the entity that conflicted
    pub entity_id: String,
    /// Fields that differed at detection time
    pub conflict_fields: Vec<String>,
    /// Device that produced the remote version
    pub origin_device_id: String,
    /// Strategy name the conflict was resolved with
    pub strategy: String,
    /// Detection timestamp (Unix ms)
    pub detected_at: i64,
    /// Resolution timestamp (Unix ms)
    pub resolved_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_roundtrip() {
        for entity_type in [
            EntityType::Product,
            EntityType::Warehouse,
            EntityType::Operation,
        ] {
            let parsed: EntityType = entity_type.as_str().parse().unwrap();
            assert_eq!(parsed, entity_type);
        }
        assert!("SUPPLIER".parse::<EntityType>().is_err());
    }

    #[test]
    fn derived_id_combines_parts() {
        let id = SyncConflict::derive_id(EntityType::Product, "P1", 1700000000000);
        assert_eq!(id, "PRODUCT:P1:1700000000000");
    }
}
