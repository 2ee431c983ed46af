//! Registry orchestration
//!
//! [`Registry`] owns the store, the three component handles and the event
//! sink. Every operation runs under one lock around the store: mutations are
//! staged in a [`Staged`] overlay, committed as a single batch, and only then
//! are their events delivered. A failed call therefore leaves the records,
//! both indices and the counter exactly as they were and emits nothing.

use crate::code_index::CodeIndex;
use crate::config::RegistryConfig;
use crate::draft::ItemDraft;
use crate::error::{RegistryError, Result};
use crate::events::{EventSink, NullSink, RegistryEvent};
use crate::part_usage::PartUsageTracker;
use crate::records::RecordStore;
use crate::resolver::AssemblyResolver;
use crate::state_machine::validate_transition;
use crate::store::{KvStore, Staged};
use crate::types::{FullItem, Item, ItemId, ItemState, RegistryInfo};
use parking_lot::Mutex;

/// Append-only item registry
pub struct Registry<S, E = NullSink> {
    config: RegistryConfig,
    records: RecordStore,
    codes: CodeIndex,
    usage: PartUsageTracker,
    store: Mutex<S>,
    sink: E,
}

impl<S: KvStore> Registry<S> {
    /// Open with default configuration and no event listener
    pub fn new(store: S) -> Result<Self> {
        Self::open(store, NullSink, RegistryConfig::default())
    }
}

impl<S: KvStore, E: EventSink> Registry<S, E> {
    /// Open a registry over `store`
    ///
    /// A store without a counter is treated as a fresh deployment and gets
    /// its counter initialised to zero. Existing state is left untouched.
    pub fn open(store: S, sink: E, config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        let names = &config.keyspaces;
        let registry = Self {
            records: RecordStore::new(names),
            codes: CodeIndex::new(&names.code_index),
            usage: PartUsageTracker::new(&names.used_items),
            store: Mutex::new(store),
            sink,
            config,
        };
        registry.deploy()?;
        Ok(registry)
    }

    fn deploy(&self) -> Result<()> {
        let mut store = self.store.lock();
        if self.records.is_initialized(&*store)? {
            let next = self.records.next_id(&*store)?;
            tracing::info!(items = next.get(), "opened existing registry");
            return Ok(());
        }

        let mut staged = Staged::new(&*store);
        self.records.initialize(&mut staged)?;
        let batch = staged.into_batch();
        store.commit(batch)?;
        tracing::info!("initialised new registry");
        Ok(())
    }

    /// Run `op` against a write overlay, commit, then emit its events
    fn transact<T>(
        &self,
        op: impl FnOnce(&mut Staged<'_, S>, &mut Vec<RegistryEvent>) -> Result<T>,
    ) -> Result<T> {
        let mut store = self.store.lock();
        let mut events = Vec::new();

        let mut staged = Staged::new(&*store);
        let value = op(&mut staged, &mut events)?;
        let batch = staged.into_batch();
        store.commit(batch)?;

        // Still under the lock so listeners observe commit order
        for event in events {
            self.sink.emit(event);
        }
        Ok(value)
    }

    /// Register a new item and return its id
    ///
    /// Fails without side effects if the draft is invalid, a part is not an
    /// earlier item, a part is already consumed, or the code is taken.
    pub fn create(&self, draft: ItemDraft) -> Result<ItemId> {
        let draft = match draft.validate() {
            Ok(draft) => draft,
            Err(e) => {
                tracing::warn!(kind = ?e.kind(), "rejected item draft: {}", e);
                return Err(e);
            }
        };
        let code = draft.code.clone();
        let parts = draft.parts.clone();

        let outcome = self.transact(|staged, events| {
            let id = self.records.next_id(&*staged)?;

            for &part in &draft.parts {
                if part >= id {
                    return Err(RegistryError::ForwardOrSelfReference { part, item: id });
                }
                self.usage.mark_used(staged, part, id)?;
            }

            self.codes.reserve(staged, &draft.code, id)?;

            let item = Item {
                id,
                code: draft.code,
                item_type: draft.item_type,
                added_by: draft.added_by,
                bench: draft.bench,
                params: draft.params,
                parts: draft.parts,
                broken: false,
                additional_info: draft.additional_info,
            };
            self.records.put(staged, id, &item)?;

            events.push(RegistryEvent::ItemAdded {
                id,
                params: item.params.to_string(),
                additional_info: item.additional_info.to_string(),
                code: item.code,
                bench: item.bench,
            });

            self.records.advance(staged)?;
            Ok(id)
        });

        match &outcome {
            Ok(id) => tracing::info!(id = %id, code = %code, parts = ?parts, "item added"),
            Err(e) => tracing::warn!(code = %code, kind = ?e.kind(), "item rejected: {}", e),
        }
        outcome
    }

    /// Item `id` with its parts fully resolved
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn get_item(&self, id: ItemId) -> Result<FullItem> {
        let store = self.store.lock();
        self.resolver().resolve(&*store, id)
    }

    /// [`Self::get_item`] serialized as JSON
    pub fn get_item_json(&self, id: ItemId) -> Result<String> {
        Ok(self.get_item(id)?.to_json()?)
    }

    /// Item owning `code` with its parts fully resolved
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn get_item_by_code(&self, code: &str) -> Result<FullItem> {
        let store = self.store.lock();
        let id = self.codes.lookup(&*store, code)?;
        self.resolver().resolve(&*store, id)
    }

    /// [`Self::get_item_by_code`] serialized as JSON
    pub fn get_item_by_code_json(&self, code: &str) -> Result<String> {
        Ok(self.get_item_by_code(code)?.to_json()?)
    }

    /// Every item not consumed as a part, resolved, in id order
    pub fn get_all_items(&self) -> Result<Vec<FullItem>> {
        let store = self.store.lock();
        let count = self.records.next_id(&*store)?;
        let free = self.resolver().list_free(&*store, count)?;
        tracing::debug!(items = count.get(), free = free.len(), "listed free items");
        Ok(free)
    }

    /// [`Self::get_all_items`] serialized as JSON
    pub fn get_all_items_json(&self) -> Result<String> {
        Ok(FullItem::list_to_json(&self.get_all_items()?)?)
    }

    /// Move item `id` to the broken state
    pub fn mark_broken(&self, id: ItemId) -> Result<()> {
        let outcome = self.transact(|staged, events| self.break_item(staged, events, id));
        self.log_broken(&outcome, &id.to_string());
        outcome.map(|_| ())
    }

    /// Move the item owning `code` to the broken state
    pub fn mark_broken_by_code(&self, code: &str) -> Result<()> {
        let outcome = self.transact(|staged, events| {
            let id = self.codes.lookup(&*staged, code)?;
            self.break_item(staged, events, id)
        });
        self.log_broken(&outcome, code);
        outcome.map(|_| ())
    }

    fn break_item(
        &self,
        staged: &mut Staged<'_, S>,
        events: &mut Vec<RegistryEvent>,
        id: ItemId,
    ) -> Result<ItemId> {
        let mut item = self.records.get(&*staged, id)?;
        validate_transition(id, item.state(), ItemState::Broken)?;

        item.broken = true;
        events.push(RegistryEvent::Broke {
            id,
            code: item.code.clone(),
            bench: item.bench.clone(),
        });
        self.records.put(staged, id, &item)?;
        Ok(id)
    }

    fn log_broken(&self, outcome: &Result<ItemId>, target: &str) {
        match outcome {
            Ok(id) => tracing::info!(id = %id, "item marked broken"),
            Err(e) => tracing::warn!(target_item = %target, kind = ?e.kind(), "mark broken rejected: {}", e),
        }
    }

    /// Owner, kind and item count
    pub fn info(&self) -> Result<RegistryInfo> {
        let store = self.store.lock();
        Ok(RegistryInfo {
            owner: self.config.owner.clone(),
            kind: self.config.kind.clone(),
            items: self.records.next_id(&*store)?.get(),
        })
    }

    /// Id the next created item will receive
    pub fn next_id(&self) -> Result<ItemId> {
        let store = self.store.lock();
        Ok(self.records.next_id(&*store)?)
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Event sink
    #[inline]
    #[must_use]
    pub fn sink(&self) -> &E {
        &self.sink
    }

    /// Run `f` with read access to the committed store
    pub fn with_store<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        let store = self.store.lock();
        f(&store)
    }

    /// Give up the registry and return its store
    #[must_use]
    pub fn into_store(self) -> S {
        self.store.into_inner()
    }

    pub(crate) fn records(&self) -> &RecordStore {
        &self.records
    }

    pub(crate) fn codes(&self) -> &CodeIndex {
        &self.codes
    }

    pub(crate) fn usage(&self) -> &PartUsageTracker {
        &self.usage
    }

    fn resolver(&self) -> AssemblyResolver<'_> {
        AssemblyResolver::new(&self.records, &self.usage)
    }
}

impl<S, E> std::fmt::Debug for Registry<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
