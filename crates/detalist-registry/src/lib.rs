//! Detalist item registry
//!
//! Append-only registry of manufactured items. Each item gets a contiguous
//! numeric id and carries a caller-chosen unique code. Items can be assembled
//! from earlier items, and every item is consumed as a part at most once.
//!
//! # Overview
//!
//! - **RecordStore**: id-keyed records and the id counter
//! - **CodeIndex**: code to id mapping
//! - **PartUsageTracker**: part to consumer mapping
//! - **AssemblyResolver**: expands part ids into nested items
//! - **Registry**: atomic create, query and mark-broken operations
//!
//! # Example
//!
//! ```rust
//! use detalist_registry::prelude::*;
//! use serde_json::json;
//!
//! let registry = Registry::new(MemoryStore::new()).unwrap();
//! let bolt = registry
//!     .create(ItemDraft::new("A1", "bolt", "alice", "bench1", json!({})))
//!     .unwrap();
//! let frame = registry
//!     .create(ItemDraft::new("B1", "frame", "bob", "bench2", json!({})).with_parts([bolt]))
//!     .unwrap();
//!
//! let item = registry.get_item_by_code("B1").unwrap();
//! assert_eq!(item.id, frame);
//! assert_eq!(item.parts[0].code, "A1");
//! ```

pub mod audit;
pub mod code_index;
pub mod config;
pub mod draft;
pub mod error;
pub mod events;
pub mod part_usage;
pub mod records;
pub mod registry;
pub mod resolver;
pub mod state_machine;
pub mod store;
pub mod types;

// Test harness
pub mod test_harness;

// Re-exports
pub use audit::{audit, AuditReport};
pub use config::{KeyspaceNames, RegistryConfig};
pub use draft::{ItemDraft, ValidDraft};
pub use error::{ConfigError, ErrorKind, Lookup, RegistryError, Result, StoreError};
pub use events::{EventSink, MemorySink, NullSink, RegistryEvent};
pub use registry::Registry;
pub use store::{KvRead, KvStore, MemoryStore, Staged, WriteBatch};
pub use types::{FullItem, Item, ItemId, ItemState, RegistryInfo};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        EventSink, FullItem, ItemDraft, ItemId, MemorySink, MemoryStore, NullSink, Registry,
        RegistryConfig, RegistryError, RegistryEvent,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
