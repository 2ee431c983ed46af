//! Single-consumption tracking for parts

use crate::error::{RegistryError, StoreError};
use crate::store::{KvRead, Keyspace, Staged};
use crate::types::ItemId;

/// Maps each consumed part to the item that consumed it
#[derive(Debug, Clone)]
pub struct PartUsageTracker {
    consumers: Keyspace<ItemId, ItemId>,
}

impl PartUsageTracker {
    /// Handle for namespace `name`
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            consumers: Keyspace::new(name),
        }
    }

    /// True if `part` was consumed by some item
    pub fn is_used<R: KvRead + ?Sized>(&self, kv: &R, part: ItemId) -> Result<bool, StoreError> {
        self.consumers.contains(kv, &part)
    }

    /// Item that consumed `part`
    pub fn consumer_of<R: KvRead + ?Sized>(&self, kv: &R, part: ItemId) -> Result<Option<ItemId>, StoreError> {
        self.consumers.get(kv, &part)
    }

    /// Record that `consumer` uses `part`
    pub fn mark_used<S: KvRead + ?Sized>(
        &self,
        staged: &mut Staged<'_, S>,
        part: ItemId,
        consumer: ItemId,
    ) -> Result<(), RegistryError> {
        if let Some(existing) = self.consumer_of(&*staged, part)? {
            return Err(RegistryError::PartAlreadyUsed {
                part,
                consumer: existing,
            });
        }
        self.consumers.set(staged, &part, &consumer)?;
        Ok(())
    }
}
