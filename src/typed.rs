use crate::config::SweepConfig;
use crate::entry::Entry;
use crate::error::StoreError;
use crate::locked::LockedMap;
use crate::sweep::{self, SweepHandle};
use std::fmt::Debug;
use std::hash::Hash;
use std::ops::ControlFlow;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A thread-safe store whose values all have one type, with optional expiry
///
/// `TypeStoreV` is the fixed-type counterpart of [`TypeStore`](crate::TypeStore):
/// no runtime type checks are needed since `V` is fixed. Entries inserted with
/// [`set_with_ttl`](Self::set_with_ttl) carry a deadline and are evicted by the
/// sweep started with [`expire_sweep`](Self::expire_sweep) once it has passed.
/// Nothing expires on its own: reads do not look at deadlines, and without a
/// running sweep (or a call to [`purge_expired`](Self::purge_expired)) expired
/// entries stay in the store.
///
/// # Examples
///
/// ```
/// use sovran_keystore::TypeStoreV;
///
/// let store = TypeStoreV::<String, i32>::new();
/// store.set("one".to_string(), 1);
///
/// assert_eq!(store.get(&"one".to_string()), Some(1));
/// assert!(store.delete(&"one".to_string()));
/// assert!(!store.delete(&"one".to_string()));
/// ```
#[derive(Debug)]
pub struct TypeStoreV<K, V> {
    items: LockedMap<K, V>,
    sweeping: Arc<AtomicBool>,
}

impl<K, V> TypeStoreV<K, V>
where
    K: Clone + Eq + Hash + Debug,
    V: Send + Sync,
{
    /// Creates a new, empty store. Nothing is allocated until the first insert.
    pub fn new() -> Self {
        Self {
            items: LockedMap::new(),
            sweeping: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stores a value, replacing any previous value under `key`.
    ///
    /// A deadline set earlier through [`set_with_ttl`](Self::set_with_ttl) is
    /// dropped: the entry no longer expires.
    pub fn set(&self, key: K, value: V) {
        self.items.write(|items| items.insert(key, value));
    }

    /// Stores a value that the expiry sweep evicts once `ttl` has elapsed.
    ///
    /// A `ttl` too large to represent as an [`Instant`] stores the value without
    /// a deadline.
    ///
    /// ```
    /// use sovran_keystore::TypeStoreV;
    /// use std::time::Duration;
    ///
    /// let store = TypeStoreV::<u32, bool>::new();
    /// store.set_with_ttl(2, true, Duration::from_secs(30));
    /// assert!(store.ttl(&2).unwrap() <= Duration::from_secs(30));
    /// ```
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        match Instant::now().checked_add(ttl) {
            Some(deadline) => {
                self.items
                    .write(|items| items.insert_with_deadline(key, value, deadline));
            }
            None => self.set(key, value),
        }
    }

    /// Retrieves a clone of the value under `key`.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.items.read(|items| items.get(key).cloned())
    }

    /// Runs `f` with read access to the value under `key`.
    ///
    /// The store is read-locked while `f` runs, so `f` must not write to it.
    pub fn with<F, R>(&self, key: &K, f: F) -> Option<R>
    where
        F: FnOnce(&V) -> R,
    {
        self.items.read(|items| items.get(key).map(f))
    }

    /// Runs `f` with write access to the value under `key`, keeping any deadline.
    ///
    /// ```
    /// use sovran_keystore::TypeStoreV;
    ///
    /// let store = TypeStoreV::<&str, Vec<i32>>::new();
    /// store.set("numbers", vec![1, 2, 3]);
    ///
    /// let new_len = store.with_mut(&"numbers", |v| {
    ///     v.push(4);
    ///     v.len()
    /// });
    /// assert_eq!(new_len, Some(4));
    /// ```
    pub fn with_mut<F, R>(&self, key: &K, f: F) -> Option<R>
    where
        F: FnOnce(&mut V) -> R,
    {
        self.items.write(|items| items.get_mut(key).map(f))
    }

    /// True if `key` is present, whether or not it has a deadline.
    pub fn has(&self, key: &K) -> bool {
        self.items.read(|items| items.contains_key(key))
    }

    /// Removes the entry and its deadline. Returns `true` if the key was present.
    pub fn delete(&self, key: &K) -> bool {
        self.items.write(|items| items.remove(key).is_some())
    }

    /// Removes every entry and every deadline.
    pub fn clear(&self) {
        self.items.write(|items| items.clear());
    }

    /// Number of entries, including expired ones the sweep has not evicted yet.
    pub fn len(&self) -> usize {
        self.items.read(|items| items.len())
    }

    /// True if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of all entries, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        self.items
            .read(|items| items.iter().map(|(key, _)| key.clone()).collect())
    }

    /// Clones of all values, in no particular order.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.items
            .read(|items| items.iter().map(|(_, value)| value.clone()).collect())
    }

    /// Clones of all key-value pairs, in no particular order.
    pub fn entries(&self) -> Vec<Entry<K, V>>
    where
        V: Clone,
    {
        self.items.read(|items| {
            items
                .iter()
                .map(|(key, value)| Entry::new(key.clone(), value.clone()))
                .collect()
        })
    }

    /// Calls `visitor` for every entry until it returns [`ControlFlow::Break`].
    ///
    /// Entries are visited in no particular order while the store is
    /// read-locked, so `visitor` must not write to this store. Values are
    /// borrowed and do not need to be `Clone`.
    ///
    /// ```
    /// use sovran_keystore::TypeStoreV;
    /// use std::ops::ControlFlow;
    ///
    /// let store = TypeStoreV::<u32, u32>::new();
    /// for i in 0..10 {
    ///     store.set(i, i);
    /// }
    ///
    /// let mut visited = 0;
    /// store.for_each(|_, _| {
    ///     visited += 1;
    ///     if visited == 3 {
    ///         ControlFlow::Break(())
    ///     } else {
    ///         ControlFlow::Continue(())
    ///     }
    /// });
    /// assert_eq!(visited, 3);
    /// ```
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&K, &V) -> ControlFlow<()>,
    {
        self.items.read(|items| {
            for (key, value) in items.iter() {
                if visitor(key, value).is_break() {
                    break;
                }
            }
        });
    }

    /// Instant at which the entry under `key` becomes eligible for eviction.
    pub fn expires_at(&self, key: &K) -> Option<Instant> {
        self.items.read(|items| items.deadline(key))
    }

    /// Time left before the entry under `key` becomes eligible for eviction,
    /// zero if it already is. `None` for missing keys and entries without a
    /// deadline.
    pub fn ttl(&self, key: &K) -> Option<Duration> {
        self.expires_at(key)
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Drops the deadline of the entry under `key`, keeping its value.
    /// Returns `true` if the entry had a deadline.
    pub fn persist(&self, key: &K) -> bool {
        self.items.write(|items| items.clear_deadline(key))
    }

    /// Evicts every entry whose deadline has passed. Returns how many were evicted.
    pub fn purge_expired(&self) -> usize {
        sweep::evict_due(&self.items, |_, _| {})
    }

    /// Like [`purge_expired`](Self::purge_expired), calling `on_expired` with
    /// each entry before it is removed.
    ///
    /// The write lock is held while `on_expired` runs: it must not use this
    /// store and should return quickly.
    pub fn purge_expired_with<F>(&self, on_expired: F) -> usize
    where
        F: FnMut(&K, &V),
    {
        sweep::evict_due(&self.items, on_expired)
    }

    /// True while an expiry sweep is running for this store.
    pub fn is_sweeping(&self) -> bool {
        self.sweeping.load(std::sync::atomic::Ordering::Acquire)
    }
}

impl<K, V> TypeStoreV<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Starts the background expiry sweep on the current Tokio runtime.
    ///
    /// Every `config.interval` the sweep write-locks the store once and evicts
    /// the entries whose deadline is strictly in the past. It runs until the
    /// returned handle is stopped or dropped.
    ///
    /// # Errors
    ///
    /// - `StoreError::ZeroInterval` if `config.interval` is zero
    /// - `StoreError::NoRuntime` if called outside a Tokio runtime
    /// - `StoreError::TimerDisabled` if the runtime was built without `enable_time`
    /// - `StoreError::SweepAlreadyRunning` if this store already has a sweep running
    pub fn expire_sweep(&self, config: SweepConfig) -> Result<SweepHandle, StoreError> {
        sweep::spawn(
            self.items.clone(),
            &self.sweeping,
            config,
            None::<fn(&K, &V)>,
        )
    }

    /// Starts the background expiry sweep, calling `on_expired` with each
    /// expired entry before it is removed.
    ///
    /// The write lock is held while `on_expired` runs: it must not use this
    /// store (that would deadlock) and should return quickly, since every other
    /// operation on the store waits for the tick to finish.
    ///
    /// # Errors
    ///
    /// Same as [`expire_sweep`](Self::expire_sweep).
    ///
    /// # Examples
    ///
    /// ```
    /// use sovran_keystore::{SweepConfig, TypeStoreV};
    /// use std::time::Duration;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), sovran_keystore::StoreError> {
    /// let store = TypeStoreV::<u32, bool>::new();
    /// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    ///
    /// let sweep = store.expire_sweep_with(
    ///     SweepConfig::every(Duration::from_millis(1)),
    ///     move |key, value| {
    ///         let _ = tx.send((*key, *value));
    ///     },
    /// )?;
    ///
    /// store.set(1, true);
    /// store.set_with_ttl(2, true, Duration::from_millis(2));
    ///
    /// assert_eq!(rx.recv().await, Some((2, true)));
    /// assert_eq!(store.len(), 1);
    /// sweep.stop().await;
    /// # Ok(())
    /// # }
    /// ```
    pub fn expire_sweep_with<F>(
        &self,
        config: SweepConfig,
        on_expired: F,
    ) -> Result<SweepHandle, StoreError>
    where
        F: FnMut(&K, &V) + Send + 'static,
    {
        sweep::spawn(self.items.clone(), &self.sweeping, config, Some(on_expired))
    }
}

impl<K, V> Clone for TypeStoreV<K, V> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            sweeping: Arc::clone(&self.sweeping),
        }
    }
}

impl<K, V> Default for TypeStoreV<K, V>
where
    K: Clone + Eq + Hash + Debug,
    V: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_clears_deadline() {
        let store = TypeStoreV::<&str, i32>::new();
        store.set_with_ttl("a", 1, Duration::from_secs(60));
        assert!(store.expires_at(&"a").is_some());

        store.set("a", 2);
        assert_eq!(store.expires_at(&"a"), None);
        assert_eq!(store.get(&"a"), Some(2));
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let store = TypeStoreV::<&str, i32>::new();
        store.set_with_ttl("a", 1, Duration::MAX);
        assert_eq!(store.get(&"a"), Some(1));
        assert_eq!(store.expires_at(&"a"), None);
    }

    #[test]
    fn test_purge_without_sweep() {
        let store = TypeStoreV::<&str, i32>::new();
        store.set_with_ttl("gone", 1, Duration::ZERO);
        store.set_with_ttl("later", 2, Duration::from_secs(60));
        store.set("kept", 3);
        std::thread::sleep(Duration::from_millis(2));

        // expired but still readable until purged
        assert_eq!(store.get(&"gone"), Some(1));
        assert_eq!(store.ttl(&"gone"), Some(Duration::ZERO));

        let mut evicted = Vec::new();
        assert_eq!(store.purge_expired_with(|k, v| evicted.push((*k, *v))), 1);
        assert_eq!(evicted, vec![("gone", 1)]);

        assert!(!store.has(&"gone"));
        assert!(store.has(&"later"));
        assert!(store.has(&"kept"));
        assert_eq!(store.purge_expired(), 0);
    }

    #[test]
    fn test_persist() {
        let store = TypeStoreV::<&str, i32>::new();
        store.set_with_ttl("a", 1, Duration::ZERO);
        assert!(store.persist(&"a"));
        assert!(!store.persist(&"a"));
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(store.purge_expired(), 0);
        assert_eq!(store.get(&"a"), Some(1));
    }

    #[test]
    fn test_delete_drops_deadline() {
        let store = TypeStoreV::<&str, i32>::new();
        store.set_with_ttl("a", 1, Duration::from_secs(60));
        assert!(store.delete(&"a"));
        assert_eq!(store.expires_at(&"a"), None);

        store.set("a", 5);
        assert_eq!(store.expires_at(&"a"), None);
    }

    #[test]
    fn test_sweep_needs_runtime() {
        let store = TypeStoreV::<&str, i32>::new();
        let result = store.expire_sweep(SweepConfig::every(Duration::from_millis(1)));
        assert!(matches!(result, Err(StoreError::NoRuntime)));
        assert!(!store.is_sweeping());
    }

    #[test]
    fn test_sweep_needs_time_driver() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let store = TypeStoreV::<&str, i32>::new();

        let result =
            runtime.block_on(async { store.expire_sweep(SweepConfig::every(Duration::from_millis(1))) });
        assert_eq!(result.err(), Some(StoreError::TimerDisabled));
        assert!(!store.is_sweeping());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let store = TypeStoreV::<&str, i32>::new();
        let result = store.expire_sweep(SweepConfig::every(Duration::ZERO));
        assert_eq!(result.err(), Some(StoreError::ZeroInterval));
    }
}
