//! Key-value storage seam
//!
//! The registry persists four namespaces (records, part usage, code index and
//! the counter) in an external store that only has to offer point reads and
//! atomic batch commits:
//!
//! - [`KvRead`]: point reads by `(namespace, key)`
//! - [`KvStore`]: [`KvRead`] plus atomic [`WriteBatch`] commits
//! - [`Staged`]: read-through write overlay used for one operation
//! - [`MemoryStore`]: in-process backend
//!
//! Every mutating registry operation writes only into a [`Staged`] overlay and
//! hands the resulting batch to [`KvStore::commit`] once all checks passed.

mod keyspace;

pub use keyspace::{Keyspace, StorageKey};

use crate::error::StoreError;
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Point reads from a namespaced key-value store
pub trait KvRead {
    /// Read the raw value at `namespace/key`
    fn read(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Key-value store with atomic batch commits
pub trait KvStore: KvRead {
    /// Apply every write in `batch`, or none of them
    fn commit(&mut self, batch: WriteBatch) -> Result<(), StoreError>;
}

/// Ordered set of pending writes
///
/// A later write to the same key replaces the earlier one in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    writes: IndexMap<(String, String), Vec<u8>>,
}

impl WriteBatch {
    /// Create empty batch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a write
    pub fn put(&mut self, namespace: &str, key: &str, value: Vec<u8>) {
        self.writes
            .insert((namespace.to_owned(), key.to_owned()), value);
    }

    /// Pending value for `namespace/key`
    #[must_use]
    pub fn get(&self, namespace: &str, key: &str) -> Option<&[u8]> {
        self.writes
            .get(&(namespace.to_owned(), key.to_owned()))
            .map(Vec::as_slice)
    }

    /// Number of distinct keys written
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// True if nothing was written
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Writes in first-write order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &[u8])> {
        self.writes
            .iter()
            .map(|((ns, key), value)| (ns.as_str(), key.as_str(), value.as_slice()))
    }
}

impl IntoIterator for WriteBatch {
    type Item = ((String, String), Vec<u8>);
    type IntoIter = indexmap::map::IntoIter<(String, String), Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}

/// Write overlay on top of a base store
///
/// Reads see staged writes first, then the base. Nothing reaches the base
/// until the owner commits [`Staged::into_batch`].
#[derive(Debug)]
pub struct Staged<'a, S: KvRead + ?Sized> {
    base: &'a S,
    batch: WriteBatch,
}

impl<'a, S: KvRead + ?Sized> Staged<'a, S> {
    /// Start an empty overlay over `base`
    #[inline]
    pub fn new(base: &'a S) -> Self {
        Self {
            base,
            batch: WriteBatch::new(),
        }
    }

    /// Stage a raw write
    #[inline]
    pub fn write(&mut self, namespace: &str, key: &str, value: Vec<u8>) {
        self.batch.put(namespace, key, value);
    }

    /// Pending writes
    #[inline]
    #[must_use]
    pub fn batch(&self) -> &WriteBatch {
        &self.batch
    }

    /// Release the base and return the pending writes
    #[inline]
    #[must_use]
    pub fn into_batch(self) -> WriteBatch {
        self.batch
    }
}

impl<S: KvRead + ?Sized> KvRead for Staged<'_, S> {
    fn read(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.batch.get(namespace, key) {
            Some(value) => Ok(Some(value.to_vec())),
            None => self.base.read(namespace, key),
        }
    }
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    namespaces: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys in a namespace
    #[must_use]
    pub fn namespace_len(&self, namespace: &str) -> usize {
        self.namespaces.get(namespace).map_or(0, BTreeMap::len)
    }

    /// Keys of a namespace in lexical order
    #[must_use]
    pub fn keys(&self, namespace: &str) -> Vec<String> {
        self.namespaces
            .get(namespace)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl KvRead for MemoryStore {
    fn read(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .namespaces
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }
}

impl KvStore for MemoryStore {
    fn commit(&mut self, batch: WriteBatch) -> Result<(), StoreError> {
        for ((namespace, key), value) in batch {
            self.namespaces
                .entry(namespace)
                .or_default()
                .insert(key, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_overwrites_in_place() {
        let mut batch = WriteBatch::new();
        batch.put("a", "1", b"x".to_vec());
        batch.put("b", "1", b"y".to_vec());
        batch.put("a", "1", b"z".to_vec());

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.get("a", "1"), Some(&b"z"[..]));
        let order: Vec<_> = batch.iter().map(|(ns, _, _)| ns.to_owned()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn staged_reads_through_to_base() {
        let mut base = MemoryStore::new();
        let mut seed = WriteBatch::new();
        seed.put("items", "0", b"base".to_vec());
        base.commit(seed).unwrap();

        let mut staged = Staged::new(&base);
        assert_eq!(staged.read("items", "0").unwrap(), Some(b"base".to_vec()));

        staged.write("items", "0", b"staged".to_vec());
        staged.write("items", "1", b"new".to_vec());
        assert_eq!(staged.read("items", "0").unwrap(), Some(b"staged".to_vec()));
        assert_eq!(staged.read("items", "1").unwrap(), Some(b"new".to_vec()));

        // Base untouched until commit
        assert_eq!(base.read("items", "1").unwrap(), None);
    }

    #[test]
    fn dropped_overlay_leaves_no_trace() {
        let base = MemoryStore::new();
        {
            let mut staged = Staged::new(&base);
            staged.write("code2item", "A1", b"0".to_vec());
        }
        assert_eq!(base.namespace_len("code2item"), 0);
    }

    #[test]
    fn memory_store_commit_applies_batch() {
        let mut store = MemoryStore::new();
        let mut staged = Staged::new(&store);
        staged.write("data", "autoIndex", b"1".to_vec());
        staged.write("items", "0", b"{}".to_vec());
        let batch = staged.into_batch();

        store.commit(batch).unwrap();
        assert_eq!(store.read("data", "autoIndex").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.keys("items"), vec!["0".to_string()]);
    }
}
