//! Code → id index

use crate::error::{Lookup, RegistryError, StoreError};
use crate::store::{KvRead, Keyspace, Staged};
use crate::types::ItemId;

/// Maps each caller-chosen code to the item that owns it
///
/// A code is bound once and never rebound.
#[derive(Debug, Clone)]
pub struct CodeIndex {
    owners: Keyspace<str, ItemId>,
}

impl CodeIndex {
    /// Handle for namespace `name`
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            owners: Keyspace::new(name),
        }
    }

    /// Owner of `code`
    pub fn lookup<R: KvRead + ?Sized>(&self, kv: &R, code: &str) -> Result<ItemId, RegistryError> {
        self.find(kv, code)?
            .ok_or_else(|| RegistryError::NotFound(Lookup::Code(code.to_owned())))
    }

    /// Owner of `code`, `None` if unbound
    pub fn find<R: KvRead + ?Sized>(&self, kv: &R, code: &str) -> Result<Option<ItemId>, StoreError> {
        self.owners.get(kv, code)
    }

    /// Bind `code` to `id`
    ///
    /// Rebinding a code to its current owner is a no-op.
    pub fn reserve<S: KvRead + ?Sized>(
        &self,
        staged: &mut Staged<'_, S>,
        code: &str,
        id: ItemId,
    ) -> Result<(), RegistryError> {
        match self.find(&*staged, code)? {
            Some(owner) if owner != id => Err(RegistryError::DuplicateCode {
                code: code.to_owned(),
                owner,
            }),
            Some(_) => Ok(()),
            None => Ok(self.owners.set(staged, code, &id)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn reserve_then_lookup() {
        let store = MemoryStore::new();
        let index = CodeIndex::new("code2item");
        let mut staged = Staged::new(&store);

        index.reserve(&mut staged, "A1", ItemId(0)).unwrap();
        assert_eq!(index.lookup(&staged, "A1").unwrap(), ItemId(0));
    }

    #[test]
    fn reserve_taken_code_fails() {
        let store = MemoryStore::new();
        let index = CodeIndex::new("code2item");
        let mut staged = Staged::new(&store);

        index.reserve(&mut staged, "A1", ItemId(0)).unwrap();
        let err = index.reserve(&mut staged, "A1", ItemId(1)).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::DuplicateCode { owner: ItemId(0), .. }
        ));

        // Same owner is accepted
        index.reserve(&mut staged, "A1", ItemId(0)).unwrap();
    }

    #[test]
    fn lookup_unknown_code() {
        let store = MemoryStore::new();
        let index = CodeIndex::new("code2item");
        let err = index.lookup(&store, "nope").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(Lookup::Code(ref c)) if c == "nope"));
    }
}
