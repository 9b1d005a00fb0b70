use std::path::Path;

use serde::Serialize;
use stockpile_core::db::{ConflictRepository, LibSqlConflictRepository};
use stockpile_core::models::RecordedConflict;

use crate::commands::common::{format_relative_time, open_queue};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ConflictListItem {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub conflict_fields: Vec<String>,
    pub origin_device_id: String,
    pub strategy: String,
    pub detected_at: i64,
    pub resolved_at: i64,
    pub resolved_relative: String,
}

pub async fn run_conflicts(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let queue = open_queue(db_path).await?;
    let db = queue.database();
    let db = db.lock().await;
    let repo = LibSqlConflictRepository::new(db.connection());
    let conflicts = repo.list(limit).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(conflict_to_item)
            .collect::<Vec<ConflictListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No conflicts recorded.");
        return Ok(());
    }

    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

fn conflict_to_item(conflict: &RecordedConflict) -> ConflictListItem {
    let now_ms = chrono::Utc::now().timestamp_millis();

    ConflictListItem {
        id: conflict.id,
        entity_type: conflict.entity_type.to_string(),
        entity_id: conflict.entity_id.clone(),
        conflict_fields: conflict.conflict_fields.clone(),
        origin_device_id: conflict.origin_device_id.clone(),
        strategy: conflict.strategy.clone(),
        detected_at: conflict.detected_at,
        resolved_at: conflict.resolved_at,
        resolved_relative: format_relative_time(conflict.resolved_at, now_ms),
    }
}

fn format_conflict_lines(conflicts: &[RecordedConflict]) -> Vec<String> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{:<10} {:<12}  {:<16}  {:<10}  fields: {}",
                conflict.entity_type.to_string(),
                conflict.entity_id,
                conflict.strategy,
                format_relative_time(conflict.resolved_at, now_ms),
                conflict.conflict_fields.join(", ")
            )
        })
        .collect()
}
