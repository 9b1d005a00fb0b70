//! Connectivity monitoring.
//!
//! Single source of truth for "can we talk to the network right now",
//! decoupled from any one sync attempt. The monitor owns its subscription
//! list: transition events are published on a watch channel instead of
//! ambient global listeners.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::models::{ConnectivityState, NetworkQuality, QualityReport};
use crate::util::unix_millis_now;

/// Tracks online/offline transitions and probes link quality.
pub struct ConnectivityMonitor {
    client: reqwest::Client,
    probe_url: Option<String>,
    state: RwLock<ConnectivityState>,
    online_tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Create a monitor. `initially_online` is the runtime's connectivity
    /// signal at startup; `probe_url` is the resource quality probes HEAD.
    pub fn new(
        probe_url: Option<String>,
        probe_timeout: Duration,
        initially_online: bool,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(probe_timeout)
            .build()
            .map_err(|error| Error::Configuration(error.to_string()))?;
        let (online_tx, _) = watch::channel(initially_online);

        Ok(Self {
            client,
            probe_url,
            state: RwLock::new(ConnectivityState::initial(initially_online)),
            online_tx,
        })
    }

    /// Instantaneous connectivity signal; does not probe.
    pub fn is_online(&self) -> bool {
        self.state.read().map_or(false, |state| state.is_online)
    }

    /// Current connectivity snapshot.
    pub fn state(&self) -> ConnectivityState {
        self.state
            .read()
            .map_or_else(|_| ConnectivityState::initial(false), |state| *state)
    }

    /// Feed an explicit online/offline transition from the runtime.
    /// Subscribers are notified only when the signal actually flips.
    pub fn set_online(&self, online: bool) {
        {
            let Ok(mut state) = self.state.write() else {
                return;
            };
            let flipped = state.is_online != online;
            state.is_online = online;
            state.last_checked = unix_millis_now();
            if !online {
                state.quality = NetworkQuality::Offline;
            }
            if flipped {
                tracing::info!(online, "Connectivity transition");
            }
        }

        self.online_tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    /// Subscribe to online/offline transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online_tx.subscribe()
    }

    /// Probe the configured resource and classify round-trip latency.
    ///
    /// A failed probe classifies as offline regardless of the runtime
    /// signal; the probe is ground truth.
    pub async fn check_quality(&self) -> Result<QualityReport> {
        let probe_url = self
            .probe_url
            .as_deref()
            .ok_or_else(|| Error::Configuration("no probe URL configured".to_string()))?;

        let started = Instant::now();
        let reachable = self.client.head(probe_url).send().await.is_ok();
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let report = if reachable {
            QualityReport {
                online: true,
                latency_ms: Some(latency_ms),
                quality: NetworkQuality::from_latency_ms(latency_ms),
            }
        } else {
            QualityReport {
                online: false,
                latency_ms: None,
                quality: NetworkQuality::Offline,
            }
        };

        if let Ok(mut state) = self.state.write() {
            state.quality = report.quality;
            state.last_checked = unix_millis_now();
        }
        // Propagate the probe verdict as a transition when it disagrees
        self.set_online(report.online);

        tracing::debug!(
            online = report.online,
            latency_ms = report.latency_ms,
            quality = %report.quality,
            "Connectivity probe"
        );

        Ok(report)
    }

    /// Run quality probes on a fixed interval so quality data does not go
    /// stale during long online periods. Runs until the monitor is dropped
    /// by all other holders.
    pub fn spawn_probe_loop(
        monitor: Arc<Self>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so callers decide
            // when the initial probe happens.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(error) = monitor.check_quality().await {
                    tracing::warn!(%error, "Connectivity probe failed to run");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(probe_url: Option<&str>, initially_online: bool) -> ConnectivityMonitor {
        ConnectivityMonitor::new(
            probe_url.map(str::to_string),
            Duration::from_millis(500),
            initially_online,
        )
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transition_notifies_subscribers_once_per_flip() {
        let monitor = monitor(None, true);
        let mut rx = monitor.subscribe();

        monitor.set_online(false);
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());

        // Same value again: no new notification
        monitor.set_online(false);
        assert!(!rx.has_changed().unwrap());

        monitor.set_online(true);
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_transition_degrades_quality() {
        let monitor = monitor(None, true);
        monitor.set_online(false);

        let state = monitor.state();
        assert!(!state.is_online);
        assert_eq!(state.quality, NetworkQuality::Offline);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn probe_without_url_is_a_configuration_error() {
        let monitor = monitor(None, true);
        let error = monitor.check_quality().await.unwrap_err();
        assert!(matches!(error, Error::Configuration(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn probe_loop_refreshes_state_on_interval() {
        let monitor = Arc::new(monitor(Some("http://127.0.0.1:9/health"), true));
        let handle =
            ConnectivityMonitor::spawn_probe_loop(Arc::clone(&monitor), Duration::from_millis(50));

        // A few ticks are enough for the unreachable probe to flip the signal
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!monitor.is_online());
        assert_eq!(monitor.state().quality, NetworkQuality::Offline);

        handle.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_probe_classifies_offline_despite_signal() {
        // Nothing listens on this port; the probe must override the signal
        let monitor = monitor(Some("http://127.0.0.1:9/health"), true);

        let report = monitor.check_quality().await.unwrap();
        assert!(!report.online);
        assert_eq!(report.quality, NetworkQuality::Offline);
        assert!(report.latency_ms.is_none());
        assert!(!monitor.is_online());
    }
}
