//! The storage private to a map owner.

use std::collections::HashMap;
use std::hash::Hash;

/// The map an owner holds. Only the owner ever has a reference to it, so none of these methods
/// need to synchronize.
#[derive(Debug)]
pub(crate) struct MapStorage<K, V> {
    /// The entries.
    map: HashMap<K, V>,
}

impl<K, V> MapStorage<K, V>
where
    K: Eq + Hash,
{
    /// Create empty storage.
    pub(crate) fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Insert or overwrite `key`, returning whether it was present beforehand.
    pub(crate) fn add(&mut self, key: K, value: V) -> bool {
        self.map.insert(key, value).is_some()
    }

    /// Remove `key`, returning whether it was present.
    pub(crate) fn delete(&mut self, key: &K) -> bool {
        self.map.remove(key).is_some()
    }

    /// The number of distinct keys stored.
    pub(crate) fn size(&self) -> usize {
        self.map.len()
    }
}

impl<K, V> MapStorage<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// A copy of the value stored for `key`, if any.
    pub(crate) fn get(&self, key: &K) -> Option<V> {
        self.map.get(key).cloned()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_add_reports_prior_existence() {
        let mut storage = MapStorage::new();
        assert!(!storage.add("key", 1));
        assert!(storage.add("key", 2));
        assert_eq!(storage.get(&"key"), Some(2));
        assert_eq!(storage.size(), 1);
    }

    #[test]
    fn test_get_absent() {
        let storage = MapStorage::<&str, u32>::new();
        assert_eq!(storage.get(&"missing"), None);
    }

    #[test]
    fn test_present_zero_is_not_absent() {
        let mut storage = MapStorage::new();
        let _existed = storage.add(0_u8, 0_u8);
        assert_eq!(storage.get(&0), Some(0));
        assert_eq!(storage.get(&1), None);
    }

    #[test]
    fn test_delete_once_per_insertion() {
        let mut storage = MapStorage::new();
        let _existed = storage.add(7, "seven");
        assert!(storage.delete(&7));
        assert!(!storage.delete(&7));
        assert_eq!(storage.size(), 0);

        assert!(!storage.add(7, "seven again"));
        assert!(storage.delete(&7));
    }

    #[test]
    fn test_size_counts_distinct_keys() {
        let mut storage = MapStorage::new();
        for key in 0..10 {
            let _existed = storage.add(key, key * 2);
        }
        for key in 0..10 {
            let _existed = storage.add(key, key * 3);
        }
        assert_eq!(storage.size(), 10);
        for key in (0..10).step_by(2) {
            let _found = storage.delete(&key);
        }
        assert_eq!(storage.size(), 5);
    }
}
