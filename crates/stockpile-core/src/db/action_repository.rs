//! Queued action repository implementation

use crate::error::{Error, Result};
use crate::models::{ActionId, ActionStatus, QueuedAction};
use libsql::{params, Connection};

/// Trait for durable action storage operations (async)
#[allow(async_fn_in_trait)]
pub trait ActionRepository {
    /// Persist a new action record
    async fn append(&self, action: &QueuedAction) -> Result<()>;

    /// Get an action by ID
    async fn get(&self, id: &ActionId) -> Result<Option<QueuedAction>>;

    /// List all actions ordered by enqueue time ascending
    async fn list_all(&self) -> Result<Vec<QueuedAction>>;

    /// List actions with the given status, oldest first
    async fn list_by_status(&self, status: ActionStatus) -> Result<Vec<QueuedAction>>;

    /// Count actions with the given status
    async fn count_by_status(&self, status: ActionStatus) -> Result<u64>;

    /// Delete an action by ID; absent ids are a no-op
    async fn remove(&self, id: &ActionId) -> Result<()>;

    /// Apply a status transition only when the persisted status matches
    /// `expected`. Returns whether the transition was applied.
    async fn transition(
        &self,
        id: &ActionId,
        expected: ActionStatus,
        next: ActionStatus,
    ) -> Result<bool>;

    /// Increment the retry counter and store the delivery error.
    /// Returns the new retry count.
    async fn record_failure(&self, id: &ActionId, error: &str) -> Result<u32>;

    /// Reset all failed actions to pending with a zeroed retry counter.
    /// Returns how many actions were reset.
    async fn reset_failed(&self) -> Result<u64>;

    /// Return syncing actions whose last status change is older than the
    /// threshold back to pending. Returns how many actions were reset.
    async fn sweep_stale_syncing(&self, threshold_ms: i64) -> Result<u64>;
}

/// libSQL implementation of `ActionRepository`
pub struct LibSqlActionRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlActionRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an action from a database row
    fn parse_action(row: &libsql::Row) -> Result<QueuedAction> {
        let id: String = row.get(0)?;
        let action_type: String = row.get(1)?;
        let payload: String = row.get(2)?;
        let status: String = row.get(4)?;
        let retry_count: i64 = row.get(5)?;

        Ok(QueuedAction {
            id: id
                .parse()
                .map_err(|_| Error::InvalidInput(format!("invalid action id: {id}")))?,
            action_type: action_type.parse().map_err(Error::InvalidInput)?,
            payload: serde_json::from_str(&payload)?,
            enqueued_at: row.get(3)?,
            status: status.parse().map_err(Error::InvalidInput)?,
            retry_count: u32::try_from(retry_count.max(0)).unwrap_or(u32::MAX),
            last_error: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    async fn exists(&self, id: &ActionId) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM queued_actions WHERE id = ?)",
                params![id.as_str()],
            )
            .await?;

        Ok(rows
            .next()
            .await?
            .is_some_and(|row| row.get::<i32>(0).unwrap_or(0) != 0))
    }
}

impl ActionRepository for LibSqlActionRepository<'_> {
    async fn append(&self, action: &QueuedAction) -> Result<()> {
        // last_error stays NULL until a delivery attempt fails
        self.conn
            .execute(
                "INSERT INTO queued_actions
                 (id, action_type, payload, enqueued_at, status, retry_count, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    action.id.as_str(),
                    action.action_type.as_str(),
                    serde_json::to_string(&action.payload)?,
                    action.enqueued_at,
                    action.status.as_str(),
                    i64::from(action.retry_count),
                    action.updated_at
                ],
            )
            .await?;

        Ok(())
    }

    async fn get(&self, id: &ActionId) -> Result<Option<QueuedAction>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, action_type, payload, enqueued_at, status, retry_count, last_error, updated_at
                 FROM queued_actions WHERE id = ?",
                params![id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_action(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<QueuedAction>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, action_type, payload, enqueued_at, status, retry_count, last_error, updated_at
                 FROM queued_actions
                 ORDER BY enqueued_at ASC, id ASC",
                (),
            )
            .await?;

        let mut actions = Vec::new();
        while let Some(row) = rows.next().await? {
            actions.push(Self::parse_action(&row)?);
        }

        Ok(actions)
    }

    async fn list_by_status(&self, status: ActionStatus) -> Result<Vec<QueuedAction>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, action_type, payload, enqueued_at, status, retry_count, last_error, updated_at
                 FROM queued_actions
                 WHERE status = ?
                 ORDER BY enqueued_at ASC, id ASC",
                params![status.as_str()],
            )
            .await?;

        let mut actions = Vec::new();
        while let Some(row) = rows.next().await? {
            actions.push(Self::parse_action(&row)?);
        }

        Ok(actions)
    }

    async fn count_by_status(&self, status: ActionStatus) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM queued_actions WHERE status = ?",
                params![status.as_str()],
            )
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn remove(&self, id: &ActionId) -> Result<()> {
        // Idempotent: duplicate success callbacks may delete the same id twice
        self.conn
            .execute(
                "DELETE FROM queued_actions WHERE id = ?",
                params![id.as_str()],
            )
            .await?;

        Ok(())
    }

    async fn transition(
        &self,
        id: &ActionId,
        expected: ActionStatus,
        next: ActionStatus,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp_millis();

        let rows = self
            .conn
            .execute(
                "UPDATE queued_actions SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
                params![next.as_str(), now, id.as_str(), expected.as_str()],
            )
            .await?;

        if rows > 0 {
            return Ok(true);
        }

        if self.exists(id).await? {
            // Current status no longer matches the expected pre-state;
            // another code path already transitioned this action.
            Ok(false)
        } else {
            Err(Error::ActionNotFound(id.to_string()))
        }
    }

    async fn record_failure(&self, id: &ActionId, error: &str) -> Result<u32> {
        let rows = self
            .conn
            .execute(
                "UPDATE queued_actions SET retry_count = retry_count + 1, last_error = ? WHERE id = ?",
                params![error, id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::ActionNotFound(id.to_string()));
        }

        let action = self
            .get(id)
            .await?
            .ok_or_else(|| Error::ActionNotFound(id.to_string()))?;
        Ok(action.retry_count)
    }

    async fn reset_failed(&self) -> Result<u64> {
        let now = chrono::Utc::now().timestamp_millis();

        let rows = self
            .conn
            .execute(
                "UPDATE queued_actions
                 SET status = 'pending', retry_count = 0, last_error = NULL, updated_at = ?
                 WHERE status = 'failed'",
                params![now],
            )
            .await?;

        Ok(rows)
    }

    async fn sweep_stale_syncing(&self, threshold_ms: i64) -> Result<u64> {
        let now = chrono::Utc::now().timestamp_millis();
        let cutoff = now - threshold_ms;

        let rows = self
            .conn
            .execute(
                "UPDATE queued_actions SET status = 'pending', updated_at = ?
                 WHERE status = 'syncing' AND updated_at <= ?",
                params![now, cutoff],
            )
            .await?;

        if rows > 0 {
            tracing::warn!(count = rows, "Reset stale syncing actions to pending");
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::ActionType;
    use serde_json::json;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn sample_action(enqueued_at: i64) -> QueuedAction {
        let mut action = QueuedAction::new(ActionType::AddProduct, json!({"id": "P1"}));
        action.enqueued_at = enqueued_at;
        action.updated_at = enqueued_at;
        action
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_append_and_get() {
        let db = setup().await;
        let repo = LibSqlActionRepository::new(db.connection());

        let action = QueuedAction::new(ActionType::AddProduct, json!({"id": "P1", "name": "Widget"}));
        repo.append(&action).await.unwrap();

        let fetched = repo.get(&action.id).await.unwrap().unwrap();
        assert_eq!(fetched, action);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_all_orders_by_enqueue_time() {
        let db = setup().await;
        let repo = LibSqlActionRepository::new(db.connection());

        let newer = sample_action(2000);
        let older = sample_action(1000);
        repo.append(&newer).await.unwrap();
        repo.append(&older).await.unwrap();

        let actions = repo.list_all().await.unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].id, older.id);
        assert_eq!(actions[1].id, newer.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_is_idempotent() {
        let db = setup().await;
        let repo = LibSqlActionRepository::new(db.connection());

        let action = sample_action(1000);
        repo.append(&action).await.unwrap();

        repo.remove(&action.id).await.unwrap();
        assert!(repo.get(&action.id).await.unwrap().is_none());

        // Second removal must not error and must not change anything
        repo.remove(&action.id).await.unwrap();
        assert!(repo.list_all().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_transition_applies_only_on_expected_status() {
        let db = setup().await;
        let repo = LibSqlActionRepository::new(db.connection());

        let action = sample_action(1000);
        repo.append(&action).await.unwrap();

        let applied = repo
            .transition(&action.id, ActionStatus::Pending, ActionStatus::Syncing)
            .await
            .unwrap();
        assert!(applied);

        // A second transition from pending is a no-op, not an error
        let applied = repo
            .transition(&action.id, ActionStatus::Pending, ActionStatus::Syncing)
            .await
            .unwrap();
        assert!(!applied);

        let fetched = repo.get(&action.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ActionStatus::Syncing);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_transition_missing_action_errors() {
        let db = setup().await;
        let repo = LibSqlActionRepository::new(db.connection());

        let error = repo
            .transition(&ActionId::new(), ActionStatus::Pending, ActionStatus::Syncing)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::ActionNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_record_failure_increments_retry_count() {
        let db = setup().await;
        let repo = LibSqlActionRepository::new(db.connection());

        let action = sample_action(1000);
        repo.append(&action).await.unwrap();

        assert_eq!(repo.record_failure(&action.id, "HTTP 500").await.unwrap(), 1);
        assert_eq!(repo.record_failure(&action.id, "timeout").await.unwrap(), 2);

        let fetched = repo.get(&action.id).await.unwrap().unwrap();
        assert_eq!(fetched.retry_count, 2);
        assert_eq!(fetched.last_error.as_deref(), Some("timeout"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reset_failed_requeues_with_zero_retries() {
        let db = setup().await;
        let repo = LibSqlActionRepository::new(db.connection());

        let action = sample_action(1000);
        repo.append(&action).await.unwrap();
        repo.record_failure(&action.id, "HTTP 500").await.unwrap();
        repo.transition(&action.id, ActionStatus::Pending, ActionStatus::Failed)
            .await
            .unwrap();

        let reset = repo.reset_failed().await.unwrap();
        assert_eq!(reset, 1);

        let fetched = repo.get(&action.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ActionStatus::Pending);
        assert_eq!(fetched.retry_count, 0);
        assert!(fetched.last_error.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sweep_resets_only_stale_syncing_actions() {
        let db = setup().await;
        let repo = LibSqlActionRepository::new(db.connection());

        let stale = sample_action(1000);
        repo.append(&stale).await.unwrap();
        // Simulate a crash mid-sync: status stuck at syncing long ago
        db.connection()
            .execute(
                "UPDATE queued_actions SET status = 'syncing', updated_at = 1000 WHERE id = ?",
                params![stale.id.as_str()],
            )
            .await
            .unwrap();

        let fresh = QueuedAction::new(ActionType::AddWarehouse, json!({"id": "W1"}));
        repo.append(&fresh).await.unwrap();
        repo.transition(&fresh.id, ActionStatus::Pending, ActionStatus::Syncing)
            .await
            .unwrap();

        let swept = repo.sweep_stale_syncing(60_000).await.unwrap();
        assert_eq!(swept, 1);

        let stale = repo.get(&stale.id).await.unwrap().unwrap();
        assert_eq!(stale.status, ActionStatus::Pending);

        let fresh = repo.get(&fresh.id).await.unwrap().unwrap();
        assert_eq!(fresh.status, ActionStatus::Syncing);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_count_by_status() {
        let db = setup().await;
        let repo = LibSqlActionRepository::new(db.connection());

        repo.append(&sample_action(1000)).await.unwrap();
        repo.append(&sample_action(2000)).await.unwrap();

        assert_eq!(repo.count_by_status(ActionStatus::Pending).await.unwrap(), 2);
        assert_eq!(repo.count_by_status(ActionStatus::Failed).await.unwrap(), 0);
    }
}
