use crate::config::SweepConfig;
use crate::error::StoreError;
use crate::locked::LockedMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Interval;
use tracing::{debug, trace, Instrument};

/// Runs one sweep tick: evicts every entry whose deadline is strictly before
/// now, calling `on_expired` for each before it is removed.
///
/// The write lock is held for the whole tick, including the callbacks.
pub(crate) fn evict_due<K, V, F>(items: &LockedMap<K, V>, mut on_expired: F) -> usize
where
    K: Clone + Eq + Hash + Debug,
    F: FnMut(&K, &V),
{
    let now = Instant::now();
    let evicted = items.write(|tables| {
        tables.evict_expired(now, |key, value| {
            trace!(key = ?key, "evicting expired entry");
            on_expired(key, value);
        })
    });
    if evicted > 0 {
        debug!(evicted, "swept expired entries");
    }
    evicted
}

/// Builds the sweep ticker inside `runtime`.
///
/// Tokio panics when a timer is created on a runtime built without
/// `enable_time`; that panic is turned into `StoreError::TimerDisabled` so the
/// sweep never starts in a state where its task would die on first poll.
fn interval_on(runtime: &Handle, config: &SweepConfig) -> Result<Interval, StoreError> {
    let _entered = runtime.enter();
    let mut ticker = panic::catch_unwind(|| tokio::time::interval(config.interval))
        .map_err(|_| StoreError::TimerDisabled)?;
    ticker.set_missed_tick_behavior(config.missed_tick_behavior);
    Ok(ticker)
}

/// Clears the store's running flag when the sweep task ends, however it ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Starts the sweep task for `items` on the current Tokio runtime.
///
/// `running` is the store's flag that keeps a second sweep from starting while
/// this one is alive.
pub(crate) fn spawn<K, V, F>(
    items: LockedMap<K, V>,
    running: &Arc<AtomicBool>,
    config: SweepConfig,
    mut on_expired: Option<F>,
) -> Result<SweepHandle, StoreError>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
    F: FnMut(&K, &V) + Send + 'static,
{
    if config.interval.is_zero() {
        return Err(StoreError::ZeroInterval);
    }
    let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
    let mut ticker = interval_on(&runtime, &config)?;
    if running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Err(StoreError::SweepAlreadyRunning);
    }
    let guard = RunningGuard(Arc::clone(running));

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let sweep = async move {
        let _guard = guard;
        // the first tick completes immediately
        ticker.tick().await;
        debug!(interval = ?config.interval, "expiry sweep started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match on_expired.as_mut() {
                        Some(callback) => evict_due(&items, |key, value| callback(key, value)),
                        None => evict_due(&items, |_, _| {}),
                    };
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("expiry sweep stopped");
    };
    // the sweep logs under the span of whoever started it
    let task = runtime.spawn(sweep.instrument(tracing::Span::current()));

    Ok(SweepHandle {
        shutdown: shutdown_tx,
        task: Some(task),
    })
}

/// Handle to a running expiry sweep.
///
/// The sweep runs until [`stop`](Self::stop) or [`cancel`](Self::cancel) is
/// called, or the handle is dropped. Once it has ended, a new sweep can be
/// started on the same store.
#[derive(Debug)]
pub struct SweepHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SweepHandle {
    /// Signals the sweep to stop without waiting for it.
    pub fn cancel(&self) {
        self.shutdown.send_replace(true);
    }

    /// Signals the sweep to stop and waits until it has finished its current tick.
    pub async fn stop(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            // a panicking eviction callback already ended the task
            let _ = task.await;
        }
    }

    /// True once the sweep task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
