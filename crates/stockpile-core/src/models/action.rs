//! Queued action model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a queued action, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(Uuid);

impl ActionId {
    /// Create a new unique action ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ActionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The closed set of mutations an inventory client can queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    AddProduct,
    UpdateProduct,
    DeleteProduct,
    AddWarehouse,
    UpdateWarehouse,
    DeleteWarehouse,
    AddOperation,
}

impl ActionType {
    /// Stable wire/storage name for this action type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddProduct => "ADD_PRODUCT",
            Self::UpdateProduct => "UPDATE_PRODUCT",
            Self::DeleteProduct => "DELETE_PRODUCT",
            Self::AddWarehouse => "ADD_WAREHOUSE",
            Self::UpdateWarehouse => "UPDATE_WAREHOUSE",
            Self::DeleteWarehouse => "DELETE_WAREHOUSE",
            Self::AddOperation => "ADD_OPERATION",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADD_PRODUCT" => Ok(Self::AddProduct),
            "UPDATE_PRODUCT" => Ok(Self::UpdateProduct),
            "DELETE_PRODUCT" => Ok(Self::DeleteProduct),
            "ADD_WAREHOUSE" => Ok(Self::AddWarehouse),
            "UPDATE_WAREHOUSE" => Ok(Self::UpdateWarehouse),
            "DELETE_WAREHOUSE" => Ok(Self::DeleteWarehouse),
            "ADD_OPERATION" => Ok(Self::AddOperation),
            other => Err(format!("unknown action type: {other}")),
        }
    }
}

/// Delivery status of a queued action.
///
/// Terminal success is represented by removal from the store, not a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Syncing,
    Failed,
}

impl ActionStatus {
    /// Stable storage name for this status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "syncing" => Ok(Self::Syncing),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown action status: {other}")),
        }
    }
}

/// A queued mutation awaiting delivery to the remote endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedAction {
    /// Unique identifier, assigned at enqueue time
    pub id: ActionId,
    /// Mutation kind
    pub action_type: ActionType,
    /// Mutation data, shape depends on `action_type`
    pub payload: serde_json::Value,
    /// Enqueue timestamp (Unix ms), drives processing order
    pub enqueued_at: i64,
    /// Delivery status
    pub status: ActionStatus,
    /// Failed delivery attempts so far
    pub retry_count: u32,
    /// Last delivery error, if any
    pub last_error: Option<String>,
    /// Last status change timestamp (Unix ms), used by the stale-syncing sweep
    pub updated_at: i64,
}

impl QueuedAction {
    /// Create a new pending action with the given type and payload
    #[must_use]
    pub fn new(action_type: ActionType, payload: serde_json::Value) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: ActionId::new(),
            action_type,
            payload,
            enqueued_at: now,
            status: ActionStatus::Pending,
            retry_count: 0,
            last_error: None,
            updated_at: now,
        }
    }
}
