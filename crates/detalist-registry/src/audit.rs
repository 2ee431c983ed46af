//! Invariant audit over committed registry state
//!
//! Walks every assigned id and cross-checks the records against both
//! indices. A healthy registry produces a report without violations.

use crate::error::Result;
use crate::events::EventSink;
use crate::registry::Registry;
use crate::store::KvStore;
use crate::types::ItemId;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Broken invariant found by [`audit`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// An id below the counter has no record
    MissingRecord {
        /// Id with no record
        id: ItemId,
    },
    /// Record stored under one id claims another
    IdMismatch {
        /// Id the record is stored under
        slot: ItemId,
        /// Id written inside the record
        stored: ItemId,
    },
    /// Record's code is not in the code index
    CodeNotIndexed {
        /// Item carrying the code
        id: ItemId,
        /// Unindexed code
        code: String,
    },
    /// Record's code is indexed to a different item
    CodeOwnedByOther {
        /// Item carrying the code
        id: ItemId,
        /// Shared code
        code: String,
        /// Item the index maps the code to
        owner: ItemId,
    },
    /// Part id not strictly below its consumer
    ForwardPart {
        /// Consuming item
        item: ItemId,
        /// Offending part
        part: ItemId,
    },
    /// Part listed by two records
    PartConsumedTwice {
        /// Part listed twice
        part: ItemId,
        /// Earlier consumer
        first: ItemId,
        /// Later consumer
        second: ItemId,
    },
    /// Part-usage binding disagrees with the records
    UsageMismatch {
        /// Part whose binding is wrong
        part: ItemId,
        /// Consumer held by the usage tracker
        recorded: Option<ItemId>,
        /// Consumer according to the records
        expected: Option<ItemId>,
    },
}

/// Result of an audit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// Ids assigned so far
    pub items: u64,
    /// Items not consumed as parts
    pub free: u64,
    /// Items consumed as parts
    pub consumed: u64,
    /// Items in the broken state
    pub broken: u64,
    /// Everything found, in discovery order
    pub violations: Vec<Violation>,
}

impl AuditReport {
    /// True if no invariant is broken
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Human readable summary
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();
        let _ = writeln!(report, "Items: {}", self.items);
        let _ = writeln!(report, "Free: {}", self.free);
        let _ = writeln!(report, "Consumed: {}", self.consumed);
        let _ = writeln!(report, "Broken: {}", self.broken);
        let _ = writeln!(report, "Violations: {}", self.violations.len());
        for violation in &self.violations {
            let _ = writeln!(report, "  - {violation:?}");
        }
        report
    }
}

/// Check id ordering, code ownership and part usage across all records
pub fn audit<S: KvStore, E: EventSink>(registry: &Registry<S, E>) -> Result<AuditReport> {
    registry.with_store(|store| -> Result<AuditReport> {
        let records = registry.records();
        let codes = registry.codes();
        let usage = registry.usage();

        let count = records.next_id(store)?;
        let mut report = AuditReport {
            items: count.get(),
            ..AuditReport::default()
        };
        let mut consumer_of: HashMap<ItemId, ItemId> = HashMap::new();

        for raw in 0..count.get() {
            let slot = ItemId(raw);
            let Some(item) = records.find(store, slot)? else {
                report.violations.push(Violation::MissingRecord { id: slot });
                continue;
            };
            if item.id != slot {
                report.violations.push(Violation::IdMismatch {
                    slot,
                    stored: item.id,
                });
            }
            if item.broken {
                report.broken += 1;
            }

            match codes.find(store, &item.code)? {
                Some(owner) if owner == slot => {}
                Some(owner) => report.violations.push(Violation::CodeOwnedByOther {
                    id: slot,
                    code: item.code.clone(),
                    owner,
                }),
                None => report.violations.push(Violation::CodeNotIndexed {
                    id: slot,
                    code: item.code.clone(),
                }),
            }

            for &part in &item.parts {
                if part >= slot {
                    report.violations.push(Violation::ForwardPart { item: slot, part });
                }
                if let Some(first) = consumer_of.insert(part, slot) {
                    report.violations.push(Violation::PartConsumedTwice {
                        part,
                        first,
                        second: slot,
                    });
                }
            }
        }

        for raw in 0..count.get() {
            let part = ItemId(raw);
            let recorded = usage.consumer_of(store, part)?;
            let expected = consumer_of.get(&part).copied();
            if recorded != expected {
                report.violations.push(Violation::UsageMismatch {
                    part,
                    recorded,
                    expected,
                });
            }
            if recorded.is_some() {
                report.consumed += 1;
            } else {
                report.free += 1;
            }
        }

        Ok(report)
    })
}
