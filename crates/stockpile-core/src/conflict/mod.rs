//! Conflict detection and resolution for multi-device reconciliation.
//!
//! A conflict exists only when local and remote update timestamps differ AND
//! at least one non-excluded field differs. Bookkeeping fields (ids,
//! creation/update timestamps, version counters) are never compared.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Mutex;

use serde_json::Value;

use crate::error::Error;
use crate::models::{EntityType, SyncConflict};
use crate::util::unix_millis_now;
use crate::Result;

/// How a detected conflict is settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictStrategy {
    /// The version with the later timestamp wins outright
    LastWriteWins,
    /// Per-field merge driven by the configured rules
    MergeFields,
    /// Both versions survive as separate, device-qualified entities
    KeepBoth,
    /// Park the conflict until an explicit external decision
    UserChoice,
}

impl ConflictStrategy {
    /// Stable name used in the conflict log
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LastWriteWins => "last_write_wins",
            Self::MergeFields => "merge_fields",
            Self::KeepBoth => "keep_both",
            Self::UserChoice => "user_choice",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-field rule applied under `MergeFields`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    Local,
    Remote,
    Combine,
}

/// Resolver configuration
#[derive(Debug, Clone)]
pub struct ConflictConfig {
    /// Strategy applied when no per-entity-type override matches
    pub default_strategy: ConflictStrategy,
    /// Per-entity-type strategy overrides
    pub strategy_overrides: HashMap<EntityType, ConflictStrategy>,
    /// Field rules for `MergeFields`; fields without a rule default to remote
    pub merge_rules: HashMap<String, MergeRule>,
    /// Fields never compared during detection
    pub excluded_fields: BTreeSet<String>,
    /// Separator used by the string-concatenation combine fallback
    pub combine_delimiter: String,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            default_strategy: ConflictStrategy::LastWriteWins,
            strategy_overrides: HashMap::new(),
            merge_rules: HashMap::new(),
            excluded_fields: ["id", "createdAt", "updatedAt", "version"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            combine_delimiter: " | ".to_string(),
        }
    }
}

impl ConflictConfig {
    /// Strategy in effect for the given entity type
    #[must_use]
    pub fn strategy_for(&self, entity_type: EntityType) -> ConflictStrategy {
        self.strategy_overrides
            .get(&entity_type)
            .copied()
            .unwrap_or(self.default_strategy)
    }
}

/// Outcome of resolving a conflict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A single authoritative version; becomes the new local state
    Resolved(Value),
    /// Both versions survive; the remote copy is device-qualified
    KeptBoth {
        local: Value,
        remote: Value,
    },
    /// Parked pending an explicit user decision
    Deferred,
}

/// Explicit decision for a deferred conflict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserChoice {
    Local,
    Remote,
    Merge,
    Custom(Value),
}

/// Detects divergence between entity versions and applies the configured
/// resolution strategy. Deferred conflicts stay parked here until decided.
pub struct ConflictResolver {
    config: ConflictConfig,
    pending: Mutex<HashMap<String, SyncConflict>>,
}

impl ConflictResolver {
    /// Create a resolver with the given configuration
    #[must_use]
    pub fn new(config: ConflictConfig) -> Self {
        Self {
            config,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// The resolver's configuration
    #[must_use]
    pub const fn config(&self) -> &ConflictConfig {
        &self.config
    }

    /// Compare a local and remote snapshot of the same entity.
    ///
    /// Returns `None` when either side is absent (accept whichever exists),
    /// when update timestamps match (same logical version), or when only
    /// excluded bookkeeping fields differ.
    pub fn detect(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        local: Option<&Value>,
        remote: Option<&Value>,
        origin_device_id: &str,
    ) -> Option<SyncConflict> {
        let (local, remote) = match (local, remote) {
            (Some(local), Some(remote)) => (local, remote),
            _ => return None,
        };

        if entity_timestamp(local) == entity_timestamp(remote) {
            return None;
        }

        let (Some(local_fields), Some(remote_fields)) = (local.as_object(), remote.as_object())
        else {
            tracing::debug!(entity_id, "Skipping non-object entity snapshots");
            return None;
        };

        let conflict_fields: BTreeSet<String> = local_fields
            .iter()
            .filter(|(name, _)| !self.config.excluded_fields.contains(*name))
            .filter_map(|(name, local_value)| {
                remote_fields
                    .get(name)
                    .filter(|remote_value| *remote_value != local_value)
                    .map(|_| name.clone())
            })
            .collect();

        if conflict_fields.is_empty() {
            // Only bookkeeping fields changed
            return None;
        }

        let detected_at = unix_millis_now();
        let conflict = SyncConflict {
            id: SyncConflict::derive_id(entity_type, entity_id, detected_at),
            entity_type,
            entity_id: entity_id.to_string(),
            local_version: local.clone(),
            remote_version: remote.clone(),
            conflict_fields: conflict_fields.into_iter().collect(),
            origin_device_id: origin_device_id.to_string(),
            detected_at,
        };

        tracing::info!(
            entity_type = %conflict.entity_type,
            entity_id = %conflict.entity_id,
            fields = ?conflict.conflict_fields,
            origin_device = %conflict.origin_device_id,
            "Sync conflict detected"
        );

        Some(conflict)
    }

    /// Apply the configured strategy for the conflict's entity type.
    pub fn resolve(&self, conflict: &SyncConflict) -> Resolution {
        match self.config.strategy_for(conflict.entity_type) {
            ConflictStrategy::LastWriteWins => Resolution::Resolved(self.last_write_wins(conflict)),
            ConflictStrategy::MergeFields => Resolution::Resolved(self.merge_fields(conflict)),
            ConflictStrategy::KeepBoth => self.keep_both(conflict),
            ConflictStrategy::UserChoice => {
                if let Ok(mut pending) = self.pending.lock() {
                    pending.insert(conflict.id.clone(), conflict.clone());
                }
                tracing::info!(conflict_id = %conflict.id, "Conflict awaiting user decision");
                Resolution::Deferred
            }
        }
    }

    /// Conflicts parked under `UserChoice`, oldest first.
    pub fn pending_conflicts(&self) -> Vec<SyncConflict> {
        let mut conflicts: Vec<SyncConflict> = self
            .pending
            .lock()
            .map(|pending| pending.values().cloned().collect())
            .unwrap_or_default();
        conflicts.sort_by(|a, b| a.detected_at.cmp(&b.detected_at).then(a.id.cmp(&b.id)));
        conflicts
    }

    /// Settle a deferred conflict with an explicit decision.
    pub fn resolve_user_choice(&self, conflict_id: &str, choice: UserChoice) -> Result<Resolution> {
        let conflict = self
            .pending
            .lock()
            .ok()
            .and_then(|mut pending| pending.remove(conflict_id))
            .ok_or_else(|| Error::ConflictNotFound(conflict_id.to_string()))?;

        let resolution = match choice {
            UserChoice::Local => Resolution::Resolved(conflict.local_version.clone()),
            UserChoice::Remote => Resolution::Resolved(conflict.remote_version.clone()),
            UserChoice::Merge => Resolution::Resolved(self.merge_fields(&conflict)),
            UserChoice::Custom(value) => Resolution::Resolved(value),
        };

        Ok(resolution)
    }

    /// The strictly later timestamp wins; ties prefer the local version.
    fn last_write_wins(&self, conflict: &SyncConflict) -> Value {
        let local_ts = entity_timestamp(&conflict.local_version).unwrap_or(0);
        let remote_ts = entity_timestamp(&conflict.remote_version).unwrap_or(0);

        if remote_ts > local_ts {
            conflict.remote_version.clone()
        } else {
            conflict.local_version.clone()
        }
    }

    fn merge_fields(&self, conflict: &SyncConflict) -> Value {
        let (Some(local), Some(remote)) = (
            conflict.local_version.as_object(),
            conflict.remote_version.as_object(),
        ) else {
            return conflict.remote_version.clone();
        };

        let keys: BTreeSet<&String> = local.keys().chain(remote.keys()).collect();
        let mut merged = serde_json::Map::new();

        for key in keys {
            let value = match (local.get(key), remote.get(key)) {
                (Some(local_value), Some(remote_value)) => {
                    self.merge_field(key, local_value, remote_value)
                }
                (Some(only), None) | (None, Some(only)) => only.clone(),
                (None, None) => continue,
            };
            merged.insert(key.clone(), value);
        }

        Value::Object(merged)
    }

    fn merge_field(&self, field: &str, local: &Value, remote: &Value) -> Value {
        let rule = self
            .config
            .merge_rules
            .get(field)
            .copied()
            .unwrap_or(MergeRule::Remote);

        match rule {
            MergeRule::Local => local.clone(),
            MergeRule::Remote => remote.clone(),
            MergeRule::Combine => combine_values(local, remote, &self.config.combine_delimiter),
        }
    }

    fn keep_both(&self, conflict: &SyncConflict) -> Resolution {
        let mut remote = conflict.remote_version.clone();
        if let Some(fields) = remote.as_object_mut() {
            if let Some(id) = fields.get("id").map(display_value) {
                fields.insert(
                    "id".to_string(),
                    Value::String(format!("{id}-{}", conflict.origin_device_id)),
                );
            }
            if let Some(name) = fields
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
            {
                fields.insert(
                    "name".to_string(),
                    Value::String(format!("{name} ({})", conflict.origin_device_id)),
                );
            }
        }

        Resolution::KeptBoth {
            local: conflict.local_version.clone(),
            remote,
        }
    }
}

/// Update timestamp of an entity snapshot: `updatedAt`, falling back to
/// `createdAt`. Accepts Unix milliseconds or an RFC 3339 string.
fn entity_timestamp(value: &Value) -> Option<i64> {
    ["updatedAt", "createdAt"]
        .iter()
        .find_map(|field| value.get(field))
        .and_then(timestamp_millis)
}

fn timestamp_millis(value: &Value) -> Option<i64> {
    if let Some(millis) = value.as_i64() {
        return Some(millis);
    }
    value
        .as_str()
        .and_then(|text| chrono::DateTime::parse_from_rfc3339(text).ok())
        .map(|parsed| parsed.timestamp_millis())
}

/// Non-destructive combination of two field values: set union for arrays,
/// max for numbers, delimited concatenation otherwise.
fn combine_values(local: &Value, remote: &Value, delimiter: &str) -> Value {
    match (local, remote) {
        (Value::Array(local_items), Value::Array(remote_items)) => {
            let mut combined = local_items.clone();
            for item in remote_items {
                if !combined.contains(item) {
                    combined.push(item.clone());
                }
            }
            Value::Array(combined)
        }
        (Value::Number(local_num), Value::Number(remote_num)) => {
            let local_f = local_num.as_f64().unwrap_or(f64::MIN);
            let remote_f = remote_num.as_f64().unwrap_or(f64::MIN);
            if remote_f > local_f {
                remote.clone()
            } else {
                local.clone()
            }
        }
        _ => Value::String(format!(
            "{}{delimiter}{}",
            display_value(local),
            display_value(remote)
        )),
    }
}

fn display_value(value: &Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), str::to_string)
}
