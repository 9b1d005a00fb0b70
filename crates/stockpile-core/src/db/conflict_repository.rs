//! Conflict log repository implementation

use crate::error::{Error, Result};
use crate::models::{RecordedConflict, SyncConflict};
use libsql::{params, Connection};

/// Trait for conflict log storage operations (async)
#[allow(async_fn_in_trait)]
pub trait ConflictRepository {
    /// Record a resolved conflict with the strategy that settled it
    async fn record(&self, conflict: &SyncConflict, strategy: &str, resolved_at: i64)
        -> Result<()>;

    /// List recorded conflicts, newest resolution first
    async fn list(&self, limit: usize) -> Result<Vec<RecordedConflict>>;
}

/// libSQL implementation of `ConflictRepository`
pub struct LibSqlConflictRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlConflictRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_recorded(row: &libsql::Row) -> Result<RecordedConflict> {
        let entity_type: String = row.get(1)?;
        let conflict_fields: String = row.get(3)?;

        Ok(RecordedConflict {
            id: row.get(0)?,
            entity_type: entity_type.parse().map_err(Error::InvalidInput)?,
            entity_id: row.get(2)?,
            conflict_fields: serde_json::from_str(&conflict_fields)?,
            origin_device_id: row.get(4)?,
            strategy: row.get(5)?,
            detected_at: row.get(6)?,
            resolved_at: row.get(7)?,
        })
    }
}

impl ConflictRepository for LibSqlConflictRepository<'_> {
    async fn record(
        &self,
        conflict: &SyncConflict,
        strategy: &str,
        resolved_at: i64,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO conflict_log
                 (entity_type, entity_id, local_version, remote_version, conflict_fields,
                  origin_device_id, strategy, detected_at, resolved_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    conflict.entity_type.as_str(),
                    conflict.entity_id.clone(),
                    serde_json::to_string(&conflict.local_version)?,
                    serde_json::to_string(&conflict.remote_version)?,
                    serde_json::to_string(&conflict.conflict_fields)?,
                    conflict.origin_device_id.clone(),
                    strategy,
                    conflict.detected_at,
                    resolved_at
                ],
            )
            .await?;

        Ok(())
    }

    async fn list(&self, limit: usize) -> Result<Vec<RecordedConflict>> {
        #[allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT
        let mut rows = self
            .conn
            .query(
                "SELECT id, entity_type, entity_id, conflict_fields, origin_device_id,
                        strategy, detected_at, resolved_at
                 FROM conflict_log
                 ORDER BY resolved_at DESC, id DESC
                 LIMIT ?",
                params![limit as i64],
            )
            .await?;

        let mut conflicts = Vec::new();
        while let Some(row) = rows.next().await? {
            conflicts.push(Self::parse_recorded(&row)?);
        }

        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::EntityType;
    use serde_json::json;

    fn sample_conflict(entity_id: &str, detected_at: i64) -> SyncConflict {
        SyncConflict {
            id: SyncConflict::derive_id(EntityType::Product, entity_id, detected_at),
            entity_type: EntityType::Product,
            entity_id: entity_id.to_string(),
            local_version: json!({"id": entity_id, "name": "Widget"}),
            remote_version: json!({"id": entity_id, "name": "Gadget"}),
            conflict_fields: vec!["name".to_string()],
            origin_device_id: "device-2".to_string(),
            detected_at,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_record_and_list() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlConflictRepository::new(db.connection());

        repo.record(&sample_conflict("P1", 1000), "last_write_wins", 1500)
            .await
            .unwrap();
        repo.record(&sample_conflict("P2", 2000), "merge_fields", 2500)
            .await
            .unwrap();

        let conflicts = repo.list(10).await.unwrap();
        assert_eq!(conflicts.len(), 2);
        // Newest resolution first
        assert_eq!(conflicts[0].entity_id, "P2");
        assert_eq!(conflicts[0].strategy, "merge_fields");
        assert_eq!(conflicts[1].entity_id, "P1");
        assert_eq!(conflicts[1].conflict_fields, vec!["name"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_respects_limit() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlConflictRepository::new(db.connection());

        for i in 0..5 {
            repo.record(&sample_conflict(&format!("P{i}"), i), "last_write_wins", i)
                .await
                .unwrap();
        }

        let conflicts = repo.list(3).await.unwrap();
        assert_eq!(conflicts.len(), 3);
    }
}
