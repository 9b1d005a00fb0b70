//! Connectivity state model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Link quality class derived from a round-trip latency probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkQuality {
    Excellent,
    Good,
    Poor,
    Offline,
}

impl NetworkQuality {
    /// Classify a round-trip latency into a quality tier.
    ///
    /// Tiers: excellent under 100ms, good under 500ms, poor under 2000ms,
    /// anything slower counts as offline.
    #[must_use]
    pub const fn from_latency_ms(latency_ms: u64) -> Self {
        if latency_ms < 100 {
            Self::Excellent
        } else if latency_ms < 500 {
            Self::Good
        } else if latency_ms < 2000 {
            Self::Poor
        } else {
            Self::Offline
        }
    }
}

impl fmt::Display for NetworkQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Poor => "poor",
            Self::Offline => "offline",
        };
        f.write_str(name)
    }
}

/// Process-wide connectivity snapshot.
///
/// Never persisted; recomputed fresh at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityState {
    /// Runtime connectivity signal
    pub is_online: bool,
    /// Last probed link quality
    pub quality: NetworkQuality,
    /// When the state was last refreshed (Unix ms)
    pub last_checked: i64,
}

impl ConnectivityState {
    /// Initial state from the runtime's connectivity signal
    #[must_use]
    pub fn initial(is_online: bool) -> Self {
        Self {
            is_online,
            quality: if is_online {
                NetworkQuality::Good
            } else {
                NetworkQuality::Offline
            },
            last_checked: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Outcome of a single quality probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityReport {
    /// Whether the probe reached the endpoint
    pub online: bool,
    /// Round-trip latency; `None` when unreachable
    pub latency_ms: Option<u64>,
    /// Classified quality tier
    pub quality: NetworkQuality,
}
