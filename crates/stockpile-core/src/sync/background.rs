//! Background sync trigger.
//!
//! Registration is advisory: the platform may never fire the task (no
//! background facility, permission denied), so the foreground
//! online-transition handler must independently guarantee a drain attempt.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::net::ConnectivityMonitor;
use crate::util::normalize_text_option;
use crate::Result;

use super::{ActionTransport, SyncEngine};

/// Asks the host runtime to run a drain when conditions allow.
pub trait BackgroundScheduler {
    /// Register a background sync task under the given tag. Registering an
    /// already-known tag is a no-op. Fire-and-forget: no payload travels
    /// through this channel; the task reads the durable store when it runs.
    fn register(&self, tag: &str) -> Result<()>;

    /// Tags registered so far, sorted.
    fn registered_tags(&self) -> Vec<String>;
}

/// Tokio-backed scheduler: each registered tag drains the engine on every
/// offline-to-online transition of the connectivity monitor.
pub struct OnlineSyncScheduler<T: ActionTransport> {
    engine: SyncEngine<T>,
    monitor: Arc<ConnectivityMonitor>,
    tags: Mutex<HashSet<String>>,
}

impl<T: ActionTransport + Send + Sync + 'static> OnlineSyncScheduler<T> {
    /// Create a scheduler draining the given engine.
    pub fn new(engine: SyncEngine<T>, monitor: Arc<ConnectivityMonitor>) -> Self {
        Self {
            engine,
            monitor,
            tags: Mutex::new(HashSet::new()),
        }
    }
}

impl<T: ActionTransport + Send + Sync + 'static> BackgroundScheduler for OnlineSyncScheduler<T> {
    fn register(&self, tag: &str) -> Result<()> {
        let tag = normalize_text_option(Some(tag.to_string()))
            .ok_or_else(|| Error::InvalidInput("background sync tag must not be empty".to_string()))?;

        {
            let Ok(mut tags) = self.tags.lock() else {
                return Err(Error::InvalidInput("scheduler tag registry poisoned".to_string()));
            };
            if !tags.insert(tag.clone()) {
                return Ok(());
            }
        }

        // Subscribe before spawning so no transition between registration
        // and task startup is missed.
        let mut transitions = self.monitor.subscribe();
        let engine = self.engine.clone();
        tokio::spawn(async move {
            loop {
                if transitions.changed().await.is_err() {
                    break; // monitor dropped, nothing left to watch
                }
                let online = *transitions.borrow_and_update();
                if online {
                    tracing::debug!(tag = %tag, "Background sync task fired");
                    if let Err(error) = engine.drain().await {
                        tracing::warn!(tag = %tag, %error, "Background sync drain failed");
                    }
                }
            }
        });

        Ok(())
    }

    fn registered_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .tags
            .lock()
            .map(|tags| tags.iter().cloned().collect())
            .unwrap_or_default();
        tags.sort();
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncSettings;
    use crate::models::{ActionType, QueuedAction};
    use crate::queue::ActionQueue;
    use serde_json::json;
    use std::future::Future;
    use std::time::Duration;

    struct OkTransport;

    impl ActionTransport for OkTransport {
        fn push(&self, _action: &QueuedAction) -> impl Future<Output = crate::Result<()>> + Send {
            async { Ok(()) }
        }
    }

    async fn scheduler_with_queue(
        initially_online: bool,
    ) -> (OnlineSyncScheduler<OkTransport>, ActionQueue, Arc<ConnectivityMonitor>) {
        let queue = ActionQueue::open_in_memory().await.unwrap();
        let monitor = Arc::new(
            ConnectivityMonitor::new(None, Duration::from_millis(500), initially_online).unwrap(),
        );
        let engine = SyncEngine::new(
            queue.clone(),
            OkTransport,
            Arc::clone(&monitor),
            &SyncSettings::default(),
        );
        let scheduler = OnlineSyncScheduler::new(engine, Arc::clone(&monitor));
        (scheduler, queue, monitor)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn register_is_idempotent() {
        let (scheduler, _queue, _monitor) = scheduler_with_queue(false).await;

        scheduler.register("background-sync").unwrap();
        scheduler.register("background-sync").unwrap();

        assert_eq!(scheduler.registered_tags(), vec!["background-sync"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn register_rejects_empty_tags() {
        let (scheduler, _queue, _monitor) = scheduler_with_queue(false).await;
        assert!(scheduler.register("   ").is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn online_transition_fires_a_drain() {
        let (scheduler, queue, monitor) = scheduler_with_queue(false).await;
        queue
            .enqueue(ActionType::AddProduct, json!({"id": "P1"}))
            .await
            .unwrap();

        scheduler.register("background-sync").unwrap();
        monitor.set_online(true);

        // Give the background task time to observe the transition
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(queue.count().await.unwrap(), 0);
        assert!(queue.all().await.unwrap().is_empty());
    }
}
