//! Record storage and the id counter

use crate::config::KeyspaceNames;
use crate::error::{Lookup, RegistryError, StoreError};
use crate::store::{KvRead, Keyspace, Staged};
use crate::types::{Item, ItemId};

/// Records by id plus the auto-increment counter
///
/// The counter lives in the `data` namespace under the configured counter key.
/// An absent counter reads as zero.
#[derive(Debug, Clone)]
pub struct RecordStore {
    items: Keyspace<ItemId, Item>,
    data: Keyspace<str, u64>,
    counter_key: String,
}

impl RecordStore {
    /// Handles for the configured namespaces
    #[must_use]
    pub fn new(names: &KeyspaceNames) -> Self {
        Self {
            items: Keyspace::new(names.items.as_str()),
            data: Keyspace::new(names.data.as_str()),
            counter_key: names.counter_key.clone(),
        }
    }

    /// Id the next record will receive
    pub fn next_id<R: KvRead + ?Sized>(&self, kv: &R) -> Result<ItemId, StoreError> {
        Ok(ItemId(self.data.get(kv, &self.counter_key)?.unwrap_or(0)))
    }

    /// True once the counter has been written
    pub fn is_initialized<R: KvRead + ?Sized>(&self, kv: &R) -> Result<bool, StoreError> {
        self.data.contains(kv, &self.counter_key)
    }

    /// Stage the counter at zero
    pub fn initialize<S: KvRead + ?Sized>(&self, staged: &mut Staged<'_, S>) -> Result<(), StoreError> {
        self.data.set(staged, &self.counter_key, &0)
    }

    /// Stage `item` at `id`, replacing any previous record
    pub fn put<S: KvRead + ?Sized>(
        &self,
        staged: &mut Staged<'_, S>,
        id: ItemId,
        item: &Item,
    ) -> Result<(), StoreError> {
        self.items.set(staged, &id, item)
    }

    /// Record at `id`
    pub fn get<R: KvRead + ?Sized>(&self, kv: &R, id: ItemId) -> Result<Item, RegistryError> {
        self.find(kv, id)?
            .ok_or(RegistryError::NotFound(Lookup::Id(id)))
    }

    /// Record at `id`, `None` if never assigned
    pub fn find<R: KvRead + ?Sized>(&self, kv: &R, id: ItemId) -> Result<Option<Item>, StoreError> {
        self.items.get(kv, &id)
    }

    /// Stage the counter one past its current value and return the new value
    pub fn advance<S: KvRead + ?Sized>(&self, staged: &mut Staged<'_, S>) -> Result<ItemId, RegistryError> {
        let next = self
            .next_id(&*staged)?
            .next()
            .ok_or(RegistryError::IdSpaceExhausted)?;
        self.data.set(staged, &self.counter_key, &next.get())?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KvStore, MemoryStore};
    use serde_json::json;

    fn item(id: u64) -> Item {
        Item {
            id: ItemId(id),
            code: format!("C{id}"),
            item_type: "bolt".into(),
            added_by: "alice".into(),
            bench: "b1".into(),
            params: json!({}),
            parts: vec![],
            broken: false,
            additional_info: json!({}),
        }
    }

    #[test]
    fn counter_defaults_to_zero() {
        let store = MemoryStore::new();
        let records = RecordStore::new(&KeyspaceNames::default());
        assert_eq!(records.next_id(&store).unwrap(), ItemId(0));
        assert!(!records.is_initialized(&store).unwrap());
    }

    #[test]
    fn advance_is_staged_until_commit() {
        let mut store = MemoryStore::new();
        let records = RecordStore::new(&KeyspaceNames::default());

        let mut staged = Staged::new(&store);
        assert_eq!(records.advance(&mut staged).unwrap(), ItemId(1));
        assert_eq!(records.next_id(&staged).unwrap(), ItemId(1));
        assert_eq!(records.next_id(&store).unwrap(), ItemId(0));

        let batch = staged.into_batch();
        store.commit(batch).unwrap();
        assert_eq!(records.next_id(&store).unwrap(), ItemId(1));
    }

    #[test]
    fn advance_refuses_to_wrap() {
        let mut store = MemoryStore::new();
        let names = KeyspaceNames::default();
        let records = RecordStore::new(&names);
        let counter: Keyspace<str, u64> = Keyspace::new(names.data.as_str());

        let mut staged = Staged::new(&store);
        counter.set(&mut staged, &names.counter_key, &u64::MAX).unwrap();
        let batch = staged.into_batch();
        store.commit(batch).unwrap();

        let mut staged = Staged::new(&store);
        let err = records.advance(&mut staged).unwrap_err();
        assert!(matches!(err, RegistryError::IdSpaceExhausted));
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = MemoryStore::new();
        let records = RecordStore::new(&KeyspaceNames::default());
        let err = records.get(&store, ItemId(4)).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(Lookup::Id(ItemId(4)))));
    }

    #[test]
    fn put_then_get() {
        let mut store = MemoryStore::new();
        let records = RecordStore::new(&KeyspaceNames::default());

        let mut staged = Staged::new(&store);
        records.put(&mut staged, ItemId(0), &item(0)).unwrap();
        let batch = staged.into_batch();
        store.commit(batch).unwrap();

        assert_eq!(records.get(&store, ItemId(0)).unwrap(), item(0));
    }
}
