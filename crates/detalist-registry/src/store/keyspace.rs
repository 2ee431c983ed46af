//! Typed handles over a single namespace

use super::{KvRead, Staged};
use crate::error::StoreError;
use crate::types::ItemId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;

/// Keys that map onto a store key string
pub trait StorageKey {
    /// Key as written to the store
    fn storage_key(&self) -> String;
}

impl StorageKey for ItemId {
    fn storage_key(&self) -> String {
        self.0.to_string()
    }
}

impl StorageKey for str {
    fn storage_key(&self) -> String {
        self.to_owned()
    }
}

impl StorageKey for String {
    fn storage_key(&self) -> String {
        self.clone()
    }
}

/// Named namespace holding `V` values under `K` keys, JSON encoded
pub struct Keyspace<K: ?Sized, V> {
    name: String,
    _marker: PhantomData<fn(&K) -> V>,
}

impl<K: ?Sized, V> Keyspace<K, V> {
    /// Handle for namespace `name`
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _marker: PhantomData,
        }
    }

    /// Namespace name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<K, V> Keyspace<K, V>
where
    K: StorageKey + ?Sized,
    V: Serialize + DeserializeOwned,
{
    /// Decode the value at `key`, `None` if absent
    pub fn get<R: KvRead + ?Sized>(&self, kv: &R, key: &K) -> Result<Option<V>, StoreError> {
        let key = key.storage_key();
        let Some(bytes) = kv.read(&self.name, &key)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                namespace: self.name.clone(),
                key,
                source,
            })
    }

    /// True if `key` holds a value
    pub fn contains<R: KvRead + ?Sized>(&self, kv: &R, key: &K) -> Result<bool, StoreError> {
        Ok(kv.read(&self.name, &key.storage_key())?.is_some())
    }

    /// Stage `value` at `key`
    pub fn set<S: KvRead + ?Sized>(
        &self,
        staged: &mut Staged<'_, S>,
        key: &K,
        value: &V,
    ) -> Result<(), StoreError> {
        let key = key.storage_key();
        let bytes = serde_json::to_vec(value).map_err(|source| StoreError::Encode {
            namespace: self.name.clone(),
            key: key.clone(),
            source,
        })?;
        staged.write(&self.name, &key, bytes);
        Ok(())
    }
}

impl<K: ?Sized, V> Clone for Keyspace<K, V> {
    fn clone(&self) -> Self {
        Self::new(self.name.clone())
    }
}

impl<K: ?Sized, V> fmt::Debug for Keyspace<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Keyspace").field(&self.name).finish()
    }
}
