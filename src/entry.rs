/// A key-value pair copied out of a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<K, V> {
    pub key: K,
    pub value: V,
}

impl<K, V> Entry<K, V> {
    /// Creates an entry from a key and its value
    pub fn new(key: K, value: V) -> Self {
        Self { key, value }
    }

    /// Splits the entry into its key and value
    pub fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }
}

impl<K, V> From<(K, V)> for Entry<K, V> {
    fn from((key, value): (K, V)) -> Self {
        Self::new(key, value)
    }
}
