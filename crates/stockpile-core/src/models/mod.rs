//! Data models for Stockpile

mod action;
mod conflict;
mod connectivity;

pub use action::{ActionId, ActionStatus, ActionType, QueuedAction};
pub use conflict::{EntityType, RecordedConflict, SyncConflict};
pub use connectivity::{ConnectivityState, NetworkQuality, QualityReport};
