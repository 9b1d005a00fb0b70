//! Sync engine: drains the action queue against the remote endpoint.
//!
//! Actions are processed strictly sequentially in enqueue order within a
//! drain pass. Each action's outcome is independent: one failure never
//! blocks the rest of the pass. Overlapping drains (manual trigger,
//! transition event, background attempt) are safe because claiming an
//! action flips it to `syncing`, and a claim only applies to `pending`
//! actions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::config::{RetryPolicy, SyncSettings};
use crate::error::Error;
use crate::models::{ActionId, ActionStatus, QueuedAction};
use crate::net::ConnectivityMonitor;
use crate::queue::ActionQueue;
use crate::Result;

mod background;
mod client;

pub use background::{BackgroundScheduler, OnlineSyncScheduler};
pub use client::{ActionTransport, HttpSyncClient};

/// Tally of one drain pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Actions this pass tried to deliver
    pub attempted: usize,
    /// Confirmed by the endpoint and removed from the queue
    pub delivered: usize,
    /// Returned to pending with a scheduled backoff retry
    pub retried: usize,
    /// Parked as failed; manual intervention required
    pub failed: usize,
    /// Aborted by a cancellation while in flight
    pub cancelled: usize,
    /// Claimed by a concurrent drain, or aborted by a storage error
    pub skipped: usize,
}

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptOutcome {
    Delivered,
    Retried,
    Failed,
    Cancelled,
    Skipped,
}

struct EngineInner<T> {
    queue: ActionQueue,
    transport: T,
    monitor: Arc<ConnectivityMonitor>,
    retry: RetryPolicy,
    stale_threshold_ms: i64,
    in_flight: Mutex<HashMap<ActionId, oneshot::Sender<()>>>,
}

/// Drains pending actions against the remote endpoint with retry/backoff.
///
/// Cheap to clone; clones share the same in-flight registry.
pub struct SyncEngine<T: ActionTransport> {
    inner: Arc<EngineInner<T>>,
}

impl<T: ActionTransport> Clone for SyncEngine<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: ActionTransport + Send + Sync + 'static> SyncEngine<T> {
    /// Build an engine over the given queue, transport, and monitor.
    pub fn new(
        queue: ActionQueue,
        transport: T,
        monitor: Arc<ConnectivityMonitor>,
        settings: &SyncSettings,
    ) -> Self {
        let stale_threshold_ms =
            i64::try_from(settings.stale_syncing_threshold.as_millis()).unwrap_or(i64::MAX);

        Self {
            inner: Arc::new(EngineInner {
                queue,
                transport,
                monitor,
                retry: settings.retry,
                stale_threshold_ms,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The queue this engine drains.
    #[must_use]
    pub fn queue(&self) -> &ActionQueue {
        &self.inner.queue
    }

    /// Attempt to deliver every currently pending action, oldest first.
    ///
    /// Offline is not an error: the pass is a no-op and every action stays
    /// pending until a transition event triggers the next drain.
    pub async fn drain(&self) -> Result<DrainReport> {
        if !self.inner.monitor.is_online() {
            tracing::debug!("Drain skipped: offline");
            return Ok(DrainReport::default());
        }

        // Crash recovery: a previous process may have died mid-sync
        self.inner
            .queue
            .sweep_stale_syncing(self.inner.stale_threshold_ms)
            .await?;

        let snapshot = self.inner.queue.pending().await?;
        let mut report = DrainReport::default();

        for action in snapshot {
            report.attempted += 1;
            match self.attempt(&action).await {
                Ok(AttemptOutcome::Delivered) => report.delivered += 1,
                Ok(AttemptOutcome::Retried) => report.retried += 1,
                Ok(AttemptOutcome::Failed) => report.failed += 1,
                Ok(AttemptOutcome::Cancelled) => report.cancelled += 1,
                Ok(AttemptOutcome::Skipped) => report.skipped += 1,
                Err(error) => {
                    // Storage trouble on this action must not block the rest
                    tracing::error!(
                        action_id = %action.id,
                        action_type = %action.action_type,
                        %error,
                        "Drain attempt aborted"
                    );
                    report.skipped += 1;
                }
            }
        }

        if report.attempted > 0 {
            tracing::info!(
                attempted = report.attempted,
                delivered = report.delivered,
                retried = report.retried,
                failed = report.failed,
                "Drain pass finished"
            );
        }

        Ok(report)
    }

    /// Attempt a single pending action (used by scheduled backoff retries).
    /// Returns whether the action was delivered.
    pub async fn drain_action(&self, id: &ActionId) -> Result<bool> {
        if !self.inner.monitor.is_online() {
            return Ok(false);
        }

        let Some(action) = self.inner.queue.get(id).await? else {
            return Ok(false);
        };
        if action.status != ActionStatus::Pending {
            return Ok(false);
        }

        let outcome = self.attempt(&action).await?;
        Ok(outcome == AttemptOutcome::Delivered)
    }

    /// Abort the in-flight delivery of an action. The action returns to
    /// `pending` and is retried on the next drain. Returns whether an
    /// in-flight attempt was found.
    pub fn cancel(&self, id: &ActionId) -> bool {
        let sender = self
            .inner
            .in_flight
            .lock()
            .ok()
            .and_then(|mut in_flight| in_flight.remove(id));

        sender.is_some_and(|tx| tx.send(()).is_ok())
    }

    /// Abort every in-flight delivery (app teardown). Returns how many
    /// attempts were aborted.
    pub fn cancel_all(&self) -> usize {
        let senders: Vec<_> = match self.inner.in_flight.lock() {
            Ok(mut in_flight) => in_flight.drain().collect(),
            Err(_) => return 0,
        };

        senders
            .into_iter()
            .filter_map(|(_, tx)| tx.send(()).ok())
            .count()
    }

    async fn attempt(&self, action: &QueuedAction) -> Result<AttemptOutcome> {
        // `syncing` is the mutual-exclusion marker between drains
        if !self.inner.queue.mark_syncing(&action.id).await? {
            return Ok(AttemptOutcome::Skipped);
        }

        let (cancel_tx, cancel_rx) = oneshot::channel();
        if let Ok(mut in_flight) = self.inner.in_flight.lock() {
            in_flight.insert(action.id, cancel_tx);
        }

        let result = tokio::select! {
            result = self.inner.transport.push(action) => Some(result),
            _ = cancel_rx => None,
        };

        if let Ok(mut in_flight) = self.inner.in_flight.lock() {
            in_flight.remove(&action.id);
        }

        match result {
            None => {
                self.inner.queue.return_to_pending(&action.id).await?;
                tracing::debug!(action_id = %action.id, "Sync attempt cancelled");
                Ok(AttemptOutcome::Cancelled)
            }
            Some(Ok(())) => {
                self.inner.queue.remove(&action.id).await?;
                tracing::debug!(
                    action_id = %action.id,
                    action_type = %action.action_type,
                    "Action delivered"
                );
                Ok(AttemptOutcome::Delivered)
            }
            Some(Err(error)) => self.handle_failure(action, &error).await,
        }
    }

    async fn handle_failure(
        &self,
        action: &QueuedAction,
        error: &Error,
    ) -> Result<AttemptOutcome> {
        let retry_count = self
            .inner
            .queue
            .record_failure(&action.id, &error.to_string())
            .await?;

        if error.is_retryable() && retry_count < self.inner.retry.max_retries {
            self.inner.queue.return_to_pending(&action.id).await?;
            let delay = self.inner.retry.delay_for_attempt(retry_count);
            tracing::warn!(
                action_id = %action.id,
                action_type = %action.action_type,
                retry_count,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                %error,
                "Delivery failed, retry scheduled"
            );
            self.schedule_retry(action.id, delay);
            Ok(AttemptOutcome::Retried)
        } else {
            self.inner.queue.mark_failed(&action.id).await?;
            tracing::warn!(
                action_id = %action.id,
                action_type = %action.action_type,
                retry_count,
                %error,
                "Delivery failed permanently; manual retry required"
            );
            Ok(AttemptOutcome::Failed)
        }
    }

    fn schedule_retry(&self, id: ActionId, delay: Duration) {
        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(error) = engine.drain_action(&id).await {
                tracing::warn!(action_id = %id, %error, "Scheduled retry failed to run");
            }
        });
    }
}
