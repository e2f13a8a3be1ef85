use thiserror::Error;

/// Errors that can occur when starting an expiry sweep.
///
/// Lookups never fail: a missing key and a value of the wrong type are both
/// reported as `None` or `false`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A sweep is already running for this store
    #[error("an expiry sweep is already running for this store")]
    SweepAlreadyRunning,
    /// The sweep interval was zero
    #[error("sweep interval must be greater than zero")]
    ZeroInterval,
    /// No Tokio runtime was available to run the sweep on
    #[error("expiry sweep requires a Tokio runtime")]
    NoRuntime,
    /// The Tokio runtime was built without its time driver (`enable_time`)
    #[error("expiry sweep requires a Tokio runtime with the time driver enabled")]
    TimerDisabled,
}
