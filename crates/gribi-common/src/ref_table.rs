//! Ordered table of entries that other entries point at.
//!
//! A next-hop-group holds its next-hops and an IPv4 entry holds its group.
//! The table keeps a count of these holders per key: a key must exist before
//! it can be held, and a held key cannot be removed.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefTableError {
    #[error("key not found")]
    KeyNotFound,

    #[error("reference count underflow")]
    RefCountUnderflow,

    #[error("entry still referenced ({0} references)")]
    StillReferenced(u32),
}

/// Implemented by values that carry a holder count. The table owns the
/// arithmetic; the value only stores the number.
pub trait Referenced {
    fn holders(&self) -> u32;

    fn holders_mut(&mut self) -> &mut u32;
}

#[derive(Debug, Clone)]
pub struct RefTable<K, V> {
    entries: BTreeMap<K, V>,
}

impl<K: Ord, V> Default for RefTable<K, V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: Ord, V> RefTable<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    /// Adds an entry or swaps in a new value, returning the old one. The
    /// caller carries the holder count over on a swap.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }
}

impl<K: Ord, V: Referenced> RefTable<K, V> {
    pub fn ref_count(&self, key: &K) -> Option<u32> {
        self.entries.get(key).map(Referenced::holders)
    }

    /// Records one more holder of `key`.
    pub fn increment_ref(&mut self, key: &K) -> Result<u32, RefTableError> {
        let slot = self
            .entries
            .get_mut(key)
            .ok_or(RefTableError::KeyNotFound)?
            .holders_mut();
        *slot += 1;
        Ok(*slot)
    }

    /// Records one less holder of `key`.
    pub fn decrement_ref(&mut self, key: &K) -> Result<u32, RefTableError> {
        let slot = self
            .entries
            .get_mut(key)
            .ok_or(RefTableError::KeyNotFound)?
            .holders_mut();
        *slot = slot.checked_sub(1).ok_or(RefTableError::RefCountUnderflow)?;
        Ok(*slot)
    }

    /// Removes `key` if nothing holds it.
    pub fn remove_unreferenced(&mut self, key: &K) -> Result<V, RefTableError> {
        match self.ref_count(key) {
            None => Err(RefTableError::KeyNotFound),
            Some(0) => self.entries.remove(key).ok_or(RefTableError::KeyNotFound),
            Some(n) => Err(RefTableError::StillReferenced(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default)]
    struct Slot(u32);

    impl Referenced for Slot {
        fn holders(&self) -> u32 {
            self.0
        }

        fn holders_mut(&mut self) -> &mut u32 {
            &mut self.0
        }
    }

    #[test]
    fn test_lookup_does_not_create() {
        let mut table: RefTable<u64, Slot> = RefTable::new();
        assert!(table.get(&10).is_none());
        assert!(table.get_mut(&10).is_none());
        assert_eq!(table.ref_count(&10), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_hold_requires_existing_key() {
        let mut table: RefTable<u64, Slot> = RefTable::new();
        assert_eq!(table.increment_ref(&10), Err(RefTableError::KeyNotFound));

        table.insert(10, Slot::default());
        assert_eq!(table.increment_ref(&10), Ok(1));
        assert_eq!(table.increment_ref(&10), Ok(2));
        assert_eq!(table.ref_count(&10), Some(2));
    }

    #[test]
    fn test_release_below_zero() {
        let mut table: RefTable<u64, Slot> = RefTable::new();
        table.insert(10, Slot::default());
        assert_eq!(table.decrement_ref(&10), Err(RefTableError::RefCountUnderflow));
        assert_eq!(table.ref_count(&10), Some(0));
        assert_eq!(table.decrement_ref(&11), Err(RefTableError::KeyNotFound));
    }

    #[test]
    fn test_held_entry_cannot_be_removed() {
        let mut table: RefTable<u64, Slot> = RefTable::new();
        table.insert(10, Slot::default());
        table.increment_ref(&10).unwrap();

        assert_eq!(
            table.remove_unreferenced(&10).unwrap_err(),
            RefTableError::StillReferenced(1)
        );

        table.decrement_ref(&10).unwrap();
        assert!(table.remove_unreferenced(&10).is_ok());
        assert_eq!(
            table.remove_unreferenced(&10).unwrap_err(),
            RefTableError::KeyNotFound
        );
    }

    #[test]
    fn test_iteration_is_key_ordered() {
        let mut table: RefTable<u64, Slot> = RefTable::new();
        for k in [30, 10, 20] {
            table.insert(k, Slot::default());
        }
        let keys: Vec<u64> = table.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![10, 20, 30]);
    }
}
