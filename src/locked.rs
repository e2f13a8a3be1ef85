use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

/// The backing map plus the optional expiry map, guarded together.
///
/// Both maps start out unallocated and are created on the first write that
/// needs them. Every key in `expiry` is also a key in `backing`.
pub(crate) struct Tables<K, V> {
    backing: Option<HashMap<K, V>>,
    expiry: Option<HashMap<K, Instant>>,
}

impl<K, V> Tables<K, V>
where
    K: Eq + Hash,
{
    const fn new() -> Self {
        Self {
            backing: None,
            expiry: None,
        }
    }

    pub(crate) fn get(&self, key: &K) -> Option<&V> {
        self.backing.as_ref()?.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.backing.as_mut()?.get_mut(key)
    }

    pub(crate) fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.backing.as_ref().map_or(0, HashMap::len)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.backing.iter().flat_map(|map| map.iter())
    }

    /// Inserts a value without a deadline, dropping any deadline the key had.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(expiry) = self.expiry.as_mut() {
            expiry.remove(&key);
        }
        self.backing
            .get_or_insert_with(HashMap::new)
            .insert(key, value)
    }

    /// Inserts a value that becomes eligible for eviction once `deadline` has passed.
    pub(crate) fn insert_with_deadline(&mut self, key: K, value: V, deadline: Instant) -> Option<V>
    where
        K: Clone,
    {
        self.expiry
            .get_or_insert_with(HashMap::new)
            .insert(key.clone(), deadline);
        self.backing
            .get_or_insert_with(HashMap::new)
            .insert(key, value)
    }

    pub(crate) fn remove(&mut self, key: &K) -> Option<V> {
        let removed = self.backing.as_mut()?.remove(key);
        if removed.is_some() {
            self.clear_deadline(key);
        }
        removed
    }

    /// Removes the entry only if `predicate` accepts its current value.
    pub(crate) fn remove_if<F>(&mut self, key: &K, predicate: F) -> bool
    where
        F: FnOnce(&V) -> bool,
    {
        match self.get(key) {
            Some(value) if predicate(value) => self.remove(key).is_some(),
            _ => false,
        }
    }

    pub(crate) fn clear(&mut self) {
        if let Some(backing) = self.backing.as_mut() {
            backing.clear();
        }
        if let Some(expiry) = self.expiry.as_mut() {
            expiry.clear();
        }
    }

    pub(crate) fn deadline(&self, key: &K) -> Option<Instant> {
        self.expiry.as_ref()?.get(key).copied()
    }

    pub(crate) fn clear_deadline(&mut self, key: &K) -> bool {
        self.expiry
            .as_mut()
            .is_some_and(|expiry| expiry.remove(key).is_some())
    }

    /// Evicts every entry whose deadline is strictly before `now`.
    ///
    /// `on_evict` sees each entry before it is removed from both maps.
    pub(crate) fn evict_expired<F>(&mut self, now: Instant, mut on_evict: F) -> usize
    where
        K: Clone,
        F: FnMut(&K, &V),
    {
        let (Some(expiry), Some(backing)) = (self.expiry.as_mut(), self.backing.as_mut()) else {
            return 0;
        };

        let due: Vec<K> = expiry
            .iter()
            .filter(|(_, deadline)| **deadline < now)
            .map(|(key, _)| key.clone())
            .collect();

        let mut evicted = 0;
        for key in due {
            expiry.remove(&key);
            if let Some(value) = backing.get(&key) {
                on_evict(&key, value);
            }
            if backing.remove(&key).is_some() {
                evicted += 1;
            }
        }
        evicted
    }

    #[cfg(test)]
    pub(crate) fn is_allocated(&self) -> bool {
        self.backing.is_some()
    }
}

/// The shared core of both stores: one reader-writer lock around [`Tables`].
pub(crate) struct LockedMap<K, V> {
    tables: Arc<RwLock<Tables<K, V>>>,
}

impl<K, V> LockedMap<K, V>
where
    K: Eq + Hash,
{
    pub(crate) fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::new())),
        }
    }

    /// Runs `f` under the shared lock.
    pub(crate) fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Tables<K, V>) -> R,
    {
        let tables = self.tables.read();
        f(&tables)
    }

    /// Runs `f` under the exclusive lock.
    pub(crate) fn write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Tables<K, V>) -> R,
    {
        let mut tables = self.tables.write();
        f(&mut tables)
    }
}

impl<K, V> Clone for LockedMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            tables: Arc::clone(&self.tables),
        }
    }
}

impl<K, V> fmt::Debug for LockedMap<K, V>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.read();
        let keys: Vec<&K> = tables
            .backing
            .iter()
            .flat_map(|map| map.keys())
            .collect();
        f.debug_struct("LockedMap").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_backing_is_allocated_on_first_write() {
        let map = LockedMap::<u32, &str>::new();
        assert!(!map.read(|t| t.is_allocated()));

        // removal on an empty map must not allocate
        assert!(map.write(|t| t.remove(&1)).is_none());
        assert!(!map.read(|t| t.is_allocated()));

        map.write(|t| t.insert(1, "one"));
        assert!(map.read(|t| t.is_allocated()));
        assert_eq!(map.read(|t| t.get(&1).copied()), Some("one"));
    }

    #[test]
    fn test_racing_first_writers_share_one_map() {
        let map = LockedMap::<u32, u32>::new();
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let map = map.clone();
                thread::spawn(move || {
                    map.write(|t| t.insert(i, i * 10));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(map.read(|t| t.len()), 16);
        for i in 0..16 {
            assert_eq!(map.read(|t| t.get(&i).copied()), Some(i * 10));
        }
    }

    #[test]
    fn test_plain_insert_drops_deadline() {
        let map = LockedMap::<&str, i32>::new();
        let deadline = Instant::now() + Duration::from_secs(60);
        map.write(|t| t.insert_with_deadline("a", 1, deadline));
        assert_eq!(map.read(|t| t.deadline(&"a")), Some(deadline));

        map.write(|t| t.insert("a", 2));
        assert_eq!(map.read(|t| t.deadline(&"a")), None);
        assert_eq!(map.read(|t| t.get(&"a").copied()), Some(2));
    }

    #[test]
    fn test_remove_drops_deadline() {
        let map = LockedMap::<&str, i32>::new();
        map.write(|t| t.insert_with_deadline("a", 1, Instant::now()));
        assert_eq!(map.write(|t| t.remove(&"a")), Some(1));
        assert_eq!(map.read(|t| t.deadline(&"a")), None);
    }

    #[test]
    fn test_evict_expired_only_takes_due_entries() {
        let map = LockedMap::<&str, i32>::new();
        let now = Instant::now();
        map.write(|t| {
            t.insert_with_deadline("old", 1, now - Duration::from_millis(5));
            t.insert_with_deadline("fresh", 2, now + Duration::from_secs(60));
            t.insert("forever", 3);
        });

        let mut seen = Vec::new();
        let evicted = map.write(|t| t.evict_expired(now, |k, v| seen.push((*k, *v))));

        assert_eq!(evicted, 1);
        assert_eq!(seen, vec![("old", 1)]);
        assert!(!map.read(|t| t.contains_key(&"old")));
        assert!(map.read(|t| t.contains_key(&"fresh")));
        assert!(map.read(|t| t.contains_key(&"forever")));
        assert_eq!(map.read(|t| t.deadline(&"old")), None);
    }

    #[test]
    fn test_deadline_equal_to_now_is_not_due() {
        let map = LockedMap::<&str, i32>::new();
        let now = Instant::now();
        map.write(|t| t.insert_with_deadline("edge", 1, now));
        assert_eq!(map.write(|t| t.evict_expired(now, |_, _| {})), 0);
        assert!(map.read(|t| t.contains_key(&"edge")));
    }
}
