use crate::any_value::{AnyValue, RawValue};
use crate::entry::Entry;
use crate::locked::LockedMap;
use std::any::{Any, TypeId};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// A thread-safe heterogeneous store with type-checked access.
///
/// `TypeStore` keeps values of any `Send + Sync + 'static` type under keys of
/// one type `K`. Every typed accessor names the type it expects; an entry only
/// matches when its stored type is *exactly* that type. A value stored as `i32`
/// is invisible to `get::<i64>`, `has::<u32>` or `delete::<String>`.
///
/// A type mismatch is not an error. It is reported the same way as a missing
/// key (`None` or `false`), so typed access acts as a filter over the store.
/// The `*_raw` accessors skip the type check.
///
/// Clones of a `TypeStore` share the same underlying map.
///
/// # Examples
///
/// ```
/// use sovran_keystore::TypeStore;
///
/// let store = TypeStore::<u32>::new();
/// store.set(1, "hmm".to_string());
///
/// assert!(store.has_raw(&1));
/// assert!(store.has::<String>(&1));
/// assert!(!store.has::<i32>(&1));
///
/// assert_eq!(store.get::<String>(&1), Some("hmm".to_string()));
/// assert_eq!(store.get::<f64>(&1), None);
///
/// store.set(1, 5.2f64);
/// assert_eq!(store.get::<f64>(&1), Some(5.2));
/// assert_eq!(store.type_name(&1), Some("f64"));
/// ```
#[derive(Clone, Debug)]
pub struct TypeStore<K> {
    items: LockedMap<K, AnyValue>,
}

impl<K> TypeStore<K>
where
    K: Clone + Eq + Hash + Debug,
{
    /// Creates a new, empty store. Nothing is allocated until the first `set`.
    pub fn new() -> Self {
        Self {
            items: LockedMap::new(),
        }
    }

    /// Stores a value, replacing whatever was stored under `key` before,
    /// whatever its type.
    pub fn set<V>(&self, key: K, value: V)
    where
        V: Any + Send + Sync,
    {
        let value = AnyValue::new(value);
        self.items.write(|items| items.insert(key, value));
    }

    /// Stores the value produced by `f`. `f` runs before the lock is taken.
    pub fn set_with<V, F>(&self, key: K, f: F)
    where
        V: Any + Send + Sync,
        F: FnOnce() -> V,
    {
        self.set(key, f());
    }

    /// Returns a clone of the value under `key` if it is stored as exactly `V`.
    pub fn get<V>(&self, key: &K) -> Option<V>
    where
        V: Any + Clone,
    {
        self.items
            .read(|items| items.get(key)?.downcast_ref::<V>().cloned())
    }

    /// Returns the value under `key` without checking its type.
    pub fn get_raw(&self, key: &K) -> Option<RawValue> {
        self.items
            .read(|items| items.get(key).map(|value| Arc::clone(value.raw())))
    }

    /// Runs `f` against the value under `key` if it is stored as exactly `V`.
    ///
    /// Works for values that are not `Clone`. The store is read-locked while
    /// `f` runs, so `f` must not write to this store.
    ///
    /// ```
    /// use sovran_keystore::TypeStore;
    ///
    /// let store = TypeStore::<&str>::new();
    /// store.set("numbers", vec![1, 2, 3]);
    ///
    /// assert_eq!(store.with(&"numbers", |v: &Vec<i32>| v.len()), Some(3));
    /// assert_eq!(store.with(&"numbers", |v: &Vec<u8>| v.len()), None);
    /// ```
    pub fn with<V, F, R>(&self, key: &K, f: F) -> Option<R>
    where
        V: Any,
        F: FnOnce(&V) -> R,
    {
        self.items
            .read(|items| items.get(key)?.downcast_ref::<V>().map(f))
    }

    /// Runs `f` against a mutable reference to the value under `key` if it is
    /// stored as exactly `V`.
    ///
    /// Returns `None` as well when a [`RawValue`] handle to this value from
    /// [`get_raw`](Self::get_raw) or [`values`](Self::values) is still alive,
    /// since the value cannot be changed under that handle.
    ///
    /// ```
    /// use sovran_keystore::TypeStore;
    ///
    /// let store = TypeStore::<&str>::new();
    /// store.set("visits", 0u64);
    /// store.with_mut(&"visits", |n: &mut u64| *n += 1);
    /// assert_eq!(store.get::<u64>(&"visits"), Some(1));
    /// ```
    pub fn with_mut<V, F, R>(&self, key: &K, f: F) -> Option<R>
    where
        V: Any,
        F: FnOnce(&mut V) -> R,
    {
        self.items
            .write(|items| items.get_mut(key)?.downcast_mut::<V>().map(f))
    }

    /// True if `key` holds a value of exactly type `V`.
    pub fn has<V: Any>(&self, key: &K) -> bool {
        self.items
            .read(|items| items.get(key).is_some_and(AnyValue::is_type::<V>))
    }

    /// True if `key` holds a value of any type.
    pub fn has_raw(&self, key: &K) -> bool {
        self.items.read(|items| items.contains_key(key))
    }

    /// Removes the entry under `key` only if it holds a value of exactly type `V`.
    ///
    /// Returns whether an entry was removed. On a type mismatch the entry is
    /// left untouched.
    pub fn delete<V: Any>(&self, key: &K) -> bool {
        self.items
            .write(|items| items.remove_if(key, AnyValue::is_type::<V>))
    }

    /// Removes the entry under `key` whatever its type. Returns whether an
    /// entry was removed.
    pub fn delete_raw(&self, key: &K) -> bool {
        self.items.write(|items| items.remove(key).is_some())
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.items.write(|items| items.clear());
    }

    /// Number of entries holding a value of exactly type `V`.
    pub fn len_of<V: Any>(&self) -> usize {
        self.items.read(|items| {
            items
                .iter()
                .filter(|(_, value)| value.is_type::<V>())
                .count()
        })
    }

    /// Total number of entries, of any type.
    pub fn len(&self) -> usize {
        self.items.read(|items| items.len())
    }

    /// True if the store holds no entries of any type.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of all entries, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        self.items
            .read(|items| items.iter().map(|(key, _)| key.clone()).collect())
    }

    /// Keys of entries holding a value of exactly type `V`, in no particular order.
    pub fn keys_of<V: Any>(&self) -> Vec<K> {
        self.items.read(|items| {
            items
                .iter()
                .filter(|(_, value)| value.is_type::<V>())
                .map(|(key, _)| key.clone())
                .collect()
        })
    }

    /// All values without type checking, in no particular order.
    pub fn values(&self) -> Vec<RawValue> {
        self.items.read(|items| {
            items
                .iter()
                .map(|(_, value)| Arc::clone(value.raw()))
                .collect()
        })
    }

    /// Clones of the values of exactly type `V`, in no particular order.
    pub fn values_of<V>(&self) -> Vec<V>
    where
        V: Any + Clone,
    {
        self.items.read(|items| {
            items
                .iter()
                .filter_map(|(_, value)| value.downcast_ref::<V>().cloned())
                .collect()
        })
    }

    /// All key-value pairs without type checking, in no particular order.
    pub fn entries(&self) -> Vec<Entry<K, RawValue>> {
        self.items.read(|items| {
            items
                .iter()
                .map(|(key, value)| Entry::new(key.clone(), Arc::clone(value.raw())))
                .collect()
        })
    }

    /// Key-value pairs whose value is of exactly type `V`, in no particular order.
    pub fn entries_of<V>(&self) -> Vec<Entry<K, V>>
    where
        V: Any + Clone,
    {
        self.items.read(|items| {
            items
                .iter()
                .filter_map(|(key, value)| {
                    let value = value.downcast_ref::<V>()?.clone();
                    Some(Entry::new(key.clone(), value))
                })
                .collect()
        })
    }

    /// Calls `visitor` for every entry, in no particular order.
    ///
    /// The entries are snapshotted under the read lock and visited after it is
    /// released, so `visitor` may read from or write to the store. Changes made
    /// while visiting are not reflected in the entries still to be visited.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&K, &RawValue),
    {
        for entry in self.entries() {
            visitor(&entry.key, &entry.value);
        }
    }

    /// Calls `visitor` for every entry holding a value of exactly type `V`.
    ///
    /// Snapshots like [`for_each`](Self::for_each); `V` does not need to be
    /// `Clone` since the visitor borrows the stored value.
    pub fn for_each_of<V, F>(&self, mut visitor: F)
    where
        V: Any,
        F: FnMut(&K, &V),
    {
        let snapshot: Vec<(K, RawValue)> = self.items.read(|items| {
            items
                .iter()
                .filter(|(_, value)| value.is_type::<V>())
                .map(|(key, value)| (key.clone(), Arc::clone(value.raw())))
                .collect()
        });

        for (key, value) in snapshot {
            if let Some(value) = value.downcast_ref::<V>() {
                visitor(&key, value);
            }
        }
    }

    /// Name of the concrete type stored under `key`, as given by
    /// [`std::any::type_name`].
    pub fn type_name(&self, key: &K) -> Option<&'static str> {
        self.items.read(|items| items.get(key).map(AnyValue::type_name))
    }

    /// [`TypeId`] of the concrete type stored under `key`.
    pub fn type_id(&self, key: &K) -> Option<TypeId> {
        self.items.read(|items| items.get(key).map(AnyValue::type_id))
    }
}

impl<K> Default for TypeStore<K>
where
    K: Clone + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_missing_key() {
        let store = TypeStore::<u32>::new();
        assert_eq!(store.get::<i32>(&1), None);
        assert_eq!(store.get::<f64>(&1), None);
        assert!(store.get_raw(&1).is_none());
        assert!(!store.has::<i32>(&1));
        assert!(!store.has_raw(&1));
        assert!(!store.delete::<i32>(&1));
        assert!(!store.delete_raw(&1));
        assert_eq!(store.type_name(&1), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_exact_type_only() {
        let store = TypeStore::<&str>::new();
        store.set("n", 7i32);

        assert_eq!(store.get::<i32>(&"n"), Some(7));
        assert_eq!(store.get::<i64>(&"n"), None);
        assert_eq!(store.get::<u32>(&"n"), None);
        assert_eq!(store.get::<f32>(&"n"), None);
        assert!(!store.has::<i64>(&"n"));

        assert!(!store.delete::<i64>(&"n"));
        assert_eq!(store.get::<i32>(&"n"), Some(7));
    }

    #[test]
    fn test_boxed_trait_object_is_its_own_type() {
        let store = TypeStore::<&str>::new();
        let formatter: Box<dyn Fn(i32) -> String + Send + Sync> = Box::new(|n| n.to_string());
        store.set("fmt", formatter);

        assert!(store.has::<Box<dyn Fn(i32) -> String + Send + Sync>>(&"fmt"));
        let out = store.with(&"fmt", |f: &Box<dyn Fn(i32) -> String + Send + Sync>| f(12));
        assert_eq!(out, Some("12".to_string()));
    }

    #[test]
    fn test_raw_value_downcasts() {
        let store = TypeStore::<&str>::new();
        store.set("p", Point { x: 1, y: 2 });

        let raw = store.get_raw(&"p").unwrap();
        assert_eq!(raw.downcast_ref::<Point>(), Some(&Point { x: 1, y: 2 }));
        assert!(raw.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_with_mut_respects_type_and_outstanding_handles() {
        let store = TypeStore::<&str>::new();
        store.set("p", Point { x: 1, y: 2 });

        assert_eq!(store.with_mut(&"p", |p: &mut String| p.clear()), None);

        let held = store.get_raw(&"p");
        assert_eq!(store.with_mut(&"p", |p: &mut Point| p.x = 10), None);
        drop(held);

        assert_eq!(store.with_mut(&"p", |p: &mut Point| p.x = 10), Some(()));
        assert_eq!(store.get::<Point>(&"p"), Some(Point { x: 10, y: 2 }));
    }

    #[test]
    fn test_for_each_of_borrows_non_clone_values() {
        struct Counter(u32);

        let store = TypeStore::<u8>::new();
        store.set(1, Counter(1));
        store.set(2, Counter(2));
        store.set(3, "not a counter");

        let mut total = 0;
        store.for_each_of(|_, c: &Counter| total += c.0);
        assert_eq!(total, 3);
    }

    #[test]
    fn test_for_each_may_write_back() {
        let store = TypeStore::<u8>::new();
        store.set(1, 1i32);
        store.set(2, 2i32);

        store.for_each_of(|key, n: &i32| store.set(*key, *n * 100));

        let mut values = store.values_of::<i32>();
        values.sort();
        assert_eq!(values, vec![100, 200]);
    }

    #[test]
    fn test_type_id_and_clear() {
        let store = TypeStore::<u8>::new();
        store.set(1, 1u8);
        assert_eq!(store.type_id(&1), Some(TypeId::of::<u8>()));
        assert_eq!(store.type_name(&1), Some("u8"));

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.type_id(&1), None);
    }
}
