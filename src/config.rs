use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Configuration for a store's background expiry sweep
///
/// # Example
///
/// ```rust
/// use sovran_keystore::SweepConfig;
/// use std::time::Duration;
///
/// let config = SweepConfig::default()
///     .with_interval(Duration::from_millis(250));
/// assert_eq!(config.interval, Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    /// Interval between sweep ticks (default: 1 second)
    pub interval: Duration,
    /// What the sweep does when it falls behind on ticks (default: skip them)
    pub missed_tick_behavior: MissedTickBehavior,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            missed_tick_behavior: MissedTickBehavior::Skip,
        }
    }
}

impl SweepConfig {
    /// Creates a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Shortcut for a default configuration ticking every `interval`
    pub fn every(interval: Duration) -> Self {
        Self::default().with_interval(interval)
    }

    /// Sets the sweep interval
    ///
    /// Each tick takes the store's write lock once and evicts every entry whose
    /// deadline has passed. A zero interval is rejected when the sweep starts.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets how missed ticks are handled when a tick runs late
    pub fn with_missed_tick_behavior(mut self, behavior: MissedTickBehavior) -> Self {
        self.missed_tick_behavior = behavior;
        self
    }
}
