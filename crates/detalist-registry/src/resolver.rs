//! Assembly resolution
//!
//! Expands part ids into nested [`FullItem`] trees. Parts always precede
//! their consumer, so the walk terminates; it uses an explicit stack so deep
//! assemblies cannot exhaust the call stack.

use crate::error::RegistryError;
use crate::part_usage::PartUsageTracker;
use crate::records::RecordStore;
use crate::store::KvRead;
use crate::types::{FullItem, Item, ItemId};

/// Item whose parts are being resolved
#[derive(Debug)]
struct Pending {
    item: Item,
    resolved: Vec<FullItem>,
}

impl Pending {
    fn new(item: Item) -> Self {
        let resolved = Vec::with_capacity(item.parts.len());
        Self { item, resolved }
    }

    fn next_part(&self) -> Option<ItemId> {
        self.item.parts.get(self.resolved.len()).copied()
    }

    fn finish(self) -> FullItem {
        FullItem::assemble(self.item, self.resolved)
    }
}

/// Read-only view expanding records into full trees
#[derive(Debug, Clone, Copy)]
pub struct AssemblyResolver<'a> {
    records: &'a RecordStore,
    usage: &'a PartUsageTracker,
}

impl<'a> AssemblyResolver<'a> {
    /// Resolver over the given components
    #[must_use]
    pub fn new(records: &'a RecordStore, usage: &'a PartUsageTracker) -> Self {
        Self { records, usage }
    }

    /// Item `id` with all parts expanded, depth first in `parts` order
    pub fn resolve<R: KvRead + ?Sized>(&self, kv: &R, id: ItemId) -> Result<FullItem, RegistryError> {
        let mut current = Pending::new(self.records.get(kv, id)?);
        let mut ancestors: Vec<Pending> = Vec::new();

        loop {
            if let Some(part) = current.next_part() {
                let child = Pending::new(self.records.get(kv, part)?);
                ancestors.push(std::mem::replace(&mut current, child));
                continue;
            }

            let done = current.finish();
            match ancestors.pop() {
                Some(mut parent) => {
                    parent.resolved.push(done);
                    current = parent;
                }
                None => return Ok(done),
            }
        }
    }

    /// Resolved trees of every unconsumed item below `count`, in id order
    pub fn list_free<R: KvRead + ?Sized>(&self, kv: &R, count: ItemId) -> Result<Vec<FullItem>, RegistryError> {
        let mut free = Vec::new();
        for raw in 0..count.get() {
            let id = ItemId(raw);
            if self.usage.is_used(kv, id)? {
                continue;
            }
            free.push(self.resolve(kv, id)?);
        }
        Ok(free)
    }
}
