//! Testing utilities for the Detalist workspace
//!
//! Shared fixtures, registry builders and assertions.

#![allow(missing_docs)]

use detalist_registry::{
    audit, ErrorKind, FullItem, ItemDraft, ItemId, MemorySink, MemoryStore, Registry,
    RegistryConfig, RegistryError,
};
use serde_json::{json, Value};

pub type TestRegistry = Registry<MemoryStore, MemorySink>;

/// Fresh in-memory registry that records its events
pub fn memory_registry() -> TestRegistry {
    memory_registry_with(RegistryConfig::default())
}

pub fn memory_registry_with(config: RegistryConfig) -> TestRegistry {
    Registry::open(MemoryStore::new(), MemorySink::new(), config).unwrap()
}

/// Draft for a part with no sub-parts
pub fn leaf_draft(code: &str) -> ItemDraft {
    ItemDraft::new(code, "bolt", "alice", "bench1", json!({}))
}

pub fn assembly_draft(code: &str, parts: &[u64]) -> ItemDraft {
    ItemDraft::new(code, "frame", "bob", "bench2", json!({}))
        .with_parts(parts.iter().copied().map(ItemId))
}

/// Create leaves `codes` in order and return their ids
pub fn create_leaves(registry: &TestRegistry, codes: &[&str]) -> Vec<ItemId> {
    codes
        .iter()
        .map(|code| registry.create(leaf_draft(code)).unwrap())
        .collect()
}

/// Ids of a resolved tree in pre-order
pub fn tree_ids(item: &FullItem) -> Vec<u64> {
    let mut out = Vec::new();
    let mut stack = vec![item];
    while let Some(node) = stack.pop() {
        out.push(node.id.get());
        stack.extend(node.parts.iter().rev());
    }
    out
}

pub fn free_ids(registry: &TestRegistry) -> Vec<u64> {
    registry
        .get_all_items()
        .unwrap()
        .iter()
        .map(|item| item.id.get())
        .collect()
}

/// Resolved item as JSON, for structural comparison
pub fn item_json(registry: &TestRegistry, id: u64) -> Value {
    serde_json::from_str(&registry.get_item_json(ItemId(id)).unwrap()).unwrap()
}

pub fn assert_kind<T: std::fmt::Debug>(result: Result<T, RegistryError>, kind: ErrorKind) {
    match result {
        Ok(value) => panic!("expected {kind:?}, got Ok({value:?})"),
        Err(err) => assert_eq!(err.kind(), kind, "unexpected error: {err}"),
    }
}

/// Panic with the audit text if any invariant is broken
pub fn assert_audit_clean(registry: &TestRegistry) {
    let report = audit(registry).unwrap();
    assert!(report.passed(), "{}", report.generate_text());
}
