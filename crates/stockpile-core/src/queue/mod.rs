//! Action queue manager.
//!
//! The authoritative view of what is pending, backed by the durable store.
//! Every mutating method completes its persistence step before returning, so
//! the in-memory view and the store never diverge for committed operations.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{ActionRepository, Database, LibSqlActionRepository};
use crate::models::{ActionId, ActionStatus, ActionType, QueuedAction};
use crate::Result;

/// Thread-safe, write-through manager for the durable action queue.
#[derive(Clone)]
pub struct ActionQueue {
    db: Arc<Mutex<Database>>,
}

impl ActionQueue {
    /// Open a queue backed by a database file at the given path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open a queue backed by an in-memory database (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Wrap an already opened database.
    #[must_use]
    pub fn with_database(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Shared handle to the underlying database.
    #[must_use]
    pub fn database(&self) -> Arc<Mutex<Database>> {
        Arc::clone(&self.db)
    }

    /// Queue a mutation for delivery. The action is durable once this
    /// returns; a storage failure propagates so the caller can tell the user
    /// the mutation was NOT queued.
    pub async fn enqueue(
        &self,
        action_type: ActionType,
        payload: serde_json::Value,
    ) -> Result<ActionId> {
        let action = QueuedAction::new(action_type, payload);

        let db = self.db.lock().await;
        let repo = LibSqlActionRepository::new(db.connection());
        repo.append(&action).await?;

        tracing::debug!(
            action_id = %action.id,
            action_type = %action.action_type,
            "Queued action"
        );

        Ok(action.id)
    }

    /// Fetch a single action by id.
    pub async fn get(&self, id: &ActionId) -> Result<Option<QueuedAction>> {
        let db = self.db.lock().await;
        let repo = LibSqlActionRepository::new(db.connection());
        repo.get(id).await
    }

    /// All queued actions in enqueue order, regardless of status.
    pub async fn all(&self) -> Result<Vec<QueuedAction>> {
        let db = self.db.lock().await;
        let repo = LibSqlActionRepository::new(db.connection());
        repo.list_all().await
    }

    /// Pending actions in enqueue order; this is the sync processing order.
    pub async fn pending(&self) -> Result<Vec<QueuedAction>> {
        let db = self.db.lock().await;
        let repo = LibSqlActionRepository::new(db.connection());
        repo.list_by_status(ActionStatus::Pending).await
    }

    /// Number of pending actions, for UI badges.
    pub async fn count(&self) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlActionRepository::new(db.connection());
        repo.count_by_status(ActionStatus::Pending).await
    }

    /// Number of failed actions awaiting manual intervention.
    pub async fn failed_count(&self) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlActionRepository::new(db.connection());
        repo.count_by_status(ActionStatus::Failed).await
    }

    /// Claim a pending action for delivery. Returns false when another drain
    /// already claimed it; the `syncing` status is the mutual-exclusion
    /// marker between overlapping drains.
    pub async fn mark_syncing(&self, id: &ActionId) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlActionRepository::new(db.connection());
        repo.transition(id, ActionStatus::Pending, ActionStatus::Syncing)
            .await
    }

    /// Park a syncing action as failed; it stays queued but is no longer
    /// auto-retried.
    pub async fn mark_failed(&self, id: &ActionId) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlActionRepository::new(db.connection());
        repo.transition(id, ActionStatus::Syncing, ActionStatus::Failed)
            .await
    }

    /// Return a syncing action to pending (retry scheduling, cancellation).
    pub async fn return_to_pending(&self, id: &ActionId) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlActionRepository::new(db.connection());
        repo.transition(id, ActionStatus::Syncing, ActionStatus::Pending)
            .await
    }

    /// Remove a delivered action. Idempotent: network replies may be
    /// processed more than once.
    pub async fn remove(&self, id: &ActionId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlActionRepository::new(db.connection());
        repo.remove(id).await
    }

    /// Record a failed delivery attempt; returns the new retry count.
    pub async fn record_failure(&self, id: &ActionId, error: &str) -> Result<u32> {
        let db = self.db.lock().await;
        let repo = LibSqlActionRepository::new(db.connection());
        repo.record_failure(id, error).await
    }

    /// Reset failed actions to pending with zeroed retry counters.
    /// Returns how many were reset.
    pub async fn retry_failed(&self) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlActionRepository::new(db.connection());
        let reset = repo.reset_failed().await?;
        if reset > 0 {
            tracing::info!(count = reset, "Requeued failed actions");
        }
        Ok(reset)
    }

    /// Recover actions stuck in `syncing` (e.g. a crash mid-sync).
    pub async fn sweep_stale_syncing(&self, threshold_ms: i64) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlActionRepository::new(db.connection());
        repo.sweep_stale_syncing(threshold_ms).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_and_pending_roundtrip() {
        let queue = ActionQueue::open_in_memory().await.unwrap();

        let id = queue
            .enqueue(ActionType::AddProduct, json!({"id": "P1", "name": "Widget"}))
            .await
            .unwrap();

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].status, ActionStatus::Pending);
        assert_eq!(queue.count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_preserves_fifo_order() {
        let queue = ActionQueue::open_in_memory().await.unwrap();

        let first = queue
            .enqueue(ActionType::AddProduct, json!({"id": "P1"}))
            .await
            .unwrap();
        let second = queue
            .enqueue(ActionType::AddWarehouse, json!({"id": "W1"}))
            .await
            .unwrap();

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending[0].id, first);
        assert_eq!(pending[1].id, second);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn status_lifecycle_never_skips_syncing() {
        let queue = ActionQueue::open_in_memory().await.unwrap();
        let id = queue
            .enqueue(ActionType::UpdateProduct, json!({"id": "P1"}))
            .await
            .unwrap();

        // failed requires the syncing pre-state
        assert!(!queue.mark_failed(&id).await.unwrap());

        assert!(queue.mark_syncing(&id).await.unwrap());
        assert!(queue.mark_failed(&id).await.unwrap());

        assert_eq!(queue.count().await.unwrap(), 0);
        assert_eq!(queue.failed_count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mark_syncing_claims_exclusively() {
        let queue = ActionQueue::open_in_memory().await.unwrap();
        let id = queue
            .enqueue(ActionType::DeleteProduct, json!({"id": "P1"}))
            .await
            .unwrap();

        assert!(queue.mark_syncing(&id).await.unwrap());
        // A concurrent drain loses the claim instead of double-processing
        assert!(!queue.mark_syncing(&id).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retry_failed_resets_to_pending() {
        let queue = ActionQueue::open_in_memory().await.unwrap();
        let id = queue
            .enqueue(ActionType::AddOperation, json!({"kind": "transfer"}))
            .await
            .unwrap();

        queue.mark_syncing(&id).await.unwrap();
        queue.record_failure(&id, "HTTP 500").await.unwrap();
        queue.mark_failed(&id).await.unwrap();

        assert_eq!(queue.retry_failed().await.unwrap(), 1);

        let action = queue.get(&id).await.unwrap().unwrap();
        assert_eq!(action.status, ActionStatus::Pending);
        assert_eq!(action.retry_count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn durability_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("queue.db");

        let first;
        let second;
        {
            let queue = ActionQueue::open_path(&db_path).await.unwrap();
            first = queue
                .enqueue(ActionType::AddProduct, json!({"id": "P1"}))
                .await
                .unwrap();
            second = queue
                .enqueue(ActionType::AddProduct, json!({"id": "P2"}))
                .await
                .unwrap();
            let removed = queue
                .enqueue(ActionType::AddProduct, json!({"id": "P3"}))
                .await
                .unwrap();
            queue.remove(&removed).await.unwrap();
        }

        // Fresh in-memory state over the same durable store
        let queue = ActionQueue::open_path(&db_path).await.unwrap();
        let actions = queue.all().await.unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].id, first);
        assert_eq!(actions[1].id, second);
    }
}
