//! Seeded workload simulator
//!
//! Drives a random mix of operations against a [`MemoryStore`] registry and
//! checks every outcome against a shadow model:
//! - leaf creates and assemblies over free items must succeed
//! - duplicate codes, forward parts and reused parts must be rejected with
//!   the matching error kind
//! - mark-broken succeeds once per item and is rejected afterwards
//!
//! Events travel over a tokio channel to a listener task and are counted
//! against the committed mutations. The run ends with an [`audit`].

use crate::audit::{audit, AuditReport};
use crate::config::RegistryConfig;
use crate::draft::ItemDraft;
use crate::error::{ErrorKind, RegistryError};
use crate::events::RegistryEvent;
use crate::registry::Registry;
use crate::store::MemoryStore;
use crate::types::ItemId;
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::fmt::Write as _;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Simulator configuration
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of operations to run
    pub operations: u64,
    /// Probability that an operation is a deliberate failure
    pub failure_ratio: f64,
    /// Probability that a create is an assembly
    pub assembly_ratio: f64,
    /// Probability that an operation is a mark-broken
    pub break_ratio: f64,
    /// Largest number of parts in one assembly
    pub max_parts: usize,
    /// Stop after the first violation instead of finishing the run
    pub stop_on_first_violation: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            operations: 1000,
            failure_ratio: 0.2,
            assembly_ratio: 0.4,
            break_ratio: 0.1,
            max_parts: 3,
            stop_on_first_violation: false,
        }
    }
}

/// One generated registry call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SimulatedOperation {
    /// Creates an item without parts
    CreateLeaf {
        /// Fresh code
        code: String,
    },
    /// Creates an item over free parts
    CreateAssembly {
        /// Fresh code
        code: String,
        /// Free items to consume
        parts: Vec<ItemId>,
    },
    /// Reuses a taken code
    DuplicateCode {
        /// Code already in use
        code: String,
    },
    /// Names a part at or beyond the next id
    ForwardPart {
        /// Fresh code
        code: String,
        /// Id not yet assigned
        part: ItemId,
    },
    /// Names a part another item already consumed
    ReusePart {
        /// Fresh code
        code: String,
        /// Consumed part
        part: ItemId,
    },
    /// Omits the required `params`
    MissingParams {
        /// Fresh code
        code: String,
    },
    /// Breaks an item by id
    MarkBroken {
        /// Target item
        id: ItemId,
    },
    /// Breaks an item by code
    MarkBrokenByCode {
        /// Target code
        code: String,
    },
    /// Breaks an id that was never assigned
    MarkBrokenUnknown {
        /// Unassigned id
        id: ItemId,
    },
}

/// A violation detected during simulation
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    /// Outcome differs from the shadow model
    UnexpectedOutcome {
        /// Operation that misbehaved
        operation: SimulatedOperation,
        /// Error kind the model predicted, `None` for success
        expected: Option<ErrorKind>,
        /// Error kind returned, `None` for success
        actual: Option<ErrorKind>,
    },
    /// Created item did not receive the next contiguous id
    IdGap {
        /// Id the model predicted
        expected: ItemId,
        /// Id assigned
        actual: ItemId,
    },
    /// Free listing differs from the model
    FreeSetMismatch {
        /// Free ids according to the model
        expected: Vec<ItemId>,
        /// Free ids listed by the registry
        actual: Vec<ItemId>,
    },
    /// Listener saw a different number of events than mutations committed
    EventCountMismatch {
        /// Committed mutations
        expected: u64,
        /// Events received by the listener
        delivered: u64,
    },
    /// The committed state failed the audit
    Audit(crate::audit::Violation),
}

/// Statistics for simulation
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulatorStats {
    /// Operations attempted
    pub operations: u64,
    /// Successful creates, assemblies included
    pub items_created: u64,
    /// Successful creates with parts
    pub assemblies_created: u64,
    /// Successful mark-broken calls
    pub items_broken: u64,
    /// Calls that returned an error
    pub rejected: u64,
    /// Events received by the listener
    pub events_delivered: u64,
}

/// Final report from simulator
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorReport {
    /// Configuration the run used
    pub config: SimulatorConfig,
    /// Counters collected during the run
    pub stats: SimulatorStats,
    /// Final audit of the registry
    pub audit: AuditReport,
    /// Everything that went wrong
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    /// True if no violation was found
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate text report
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Detalist Simulator Report ===\n\n");
        let _ = writeln!(report, "Seed: {}", self.config.seed);
        let _ = writeln!(report, "Operations: {}", self.stats.operations);
        let _ = writeln!(report, "Items Created: {}", self.stats.items_created);
        let _ = writeln!(report, "Assemblies Created: {}", self.stats.assemblies_created);
        let _ = writeln!(report, "Items Broken: {}", self.stats.items_broken);
        let _ = writeln!(report, "Rejected: {}", self.stats.rejected);
        let _ = writeln!(report, "Events Delivered: {}", self.stats.events_delivered);
        let _ = writeln!(report, "Free Items: {}", self.audit.free);
        let _ = writeln!(report, "Violations: {}", self.violations.len());

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                let _ = writeln!(report, "{}. {:?}", i + 1, v);
            }
        }

        let _ = writeln!(
            report,
            "\n=== Result: {} ===",
            if self.passed() { "PASS" } else { "FAIL" }
        );
        report
    }
}

/// Shadow of the committed registry state
#[derive(Debug, Default)]
struct Model {
    next: u64,
    free: Vec<ItemId>,
    consumed: Vec<ItemId>,
    broken: HashSet<ItemId>,
    codes: Vec<String>,
    mutations: u64,
    seq: u64,
}

impl Model {
    fn fresh_code(&mut self) -> String {
        self.seq += 1;
        format!("D-{:06}", self.seq)
    }

    fn expected(&self, op: &SimulatedOperation) -> Option<ErrorKind> {
        match op {
            SimulatedOperation::CreateLeaf { .. } | SimulatedOperation::CreateAssembly { .. } => None,
            SimulatedOperation::DuplicateCode { .. } => Some(ErrorKind::DuplicateCode),
            SimulatedOperation::ForwardPart { .. } => Some(ErrorKind::ForwardOrSelfReference),
            SimulatedOperation::ReusePart { .. } => Some(ErrorKind::PartAlreadyUsed),
            SimulatedOperation::MissingParams { .. } => Some(ErrorKind::Validation),
            SimulatedOperation::MarkBroken { id } => {
                self.broken.contains(id).then_some(ErrorKind::AlreadyBroken)
            }
            SimulatedOperation::MarkBrokenByCode { code } => {
                let id = self.codes.iter().position(|c| c == code).map(|i| ItemId(i as u64));
                match id {
                    Some(id) if self.broken.contains(&id) => Some(ErrorKind::AlreadyBroken),
                    Some(_) => None,
                    None => Some(ErrorKind::NotFound),
                }
            }
            SimulatedOperation::MarkBrokenUnknown { .. } => Some(ErrorKind::NotFound),
        }
    }

    fn apply(&mut self, op: &SimulatedOperation) {
        match op {
            SimulatedOperation::CreateLeaf { code } => self.push(code.clone()),
            SimulatedOperation::CreateAssembly { code, parts } => {
                self.free.retain(|id| !parts.contains(id));
                self.consumed.extend_from_slice(parts);
                self.push(code.clone());
            }
            SimulatedOperation::MarkBroken { id } => {
                self.broken.insert(*id);
                self.mutations += 1;
            }
            SimulatedOperation::MarkBrokenByCode { code } => {
                if let Some(i) = self.codes.iter().position(|c| c == code) {
                    self.broken.insert(ItemId(i as u64));
                    self.mutations += 1;
                }
            }
            _ => {}
        }
    }

    fn push(&mut self, code: String) {
        self.free.push(ItemId(self.next));
        self.codes.push(code);
        self.next += 1;
        self.mutations += 1;
    }
}

fn generate_operation(rng: &mut StdRng, model: &mut Model, config: &SimulatorConfig) -> SimulatedOperation {
    if rng.gen_bool(config.failure_ratio) {
        return generate_failure(rng, model);
    }
    if model.next > 0 && rng.gen_bool(config.break_ratio) {
        let id = ItemId(rng.gen_range(0..model.next));
        if rng.gen_bool(0.5) {
            return SimulatedOperation::MarkBroken { id };
        }
        let code = model.codes[id.get() as usize].clone();
        return SimulatedOperation::MarkBrokenByCode { code };
    }

    let code = model.fresh_code();
    if !model.free.is_empty() && rng.gen_bool(config.assembly_ratio) {
        let count = rng.gen_range(1..=config.max_parts.max(1).min(model.free.len()));
        let mut parts: Vec<ItemId> = model.free.choose_multiple(rng, count).copied().collect();
        parts.shuffle(rng);
        return SimulatedOperation::CreateAssembly { code, parts };
    }
    SimulatedOperation::CreateLeaf { code }
}

fn generate_failure(rng: &mut StdRng, model: &mut Model) -> SimulatedOperation {
    match rng.gen_range(0..5) {
        0 if !model.codes.is_empty() => {
            let code = model.codes[rng.gen_range(0..model.codes.len())].clone();
            SimulatedOperation::DuplicateCode { code }
        }
        1 if !model.consumed.is_empty() => {
            let part = model.consumed[rng.gen_range(0..model.consumed.len())];
            let code = model.fresh_code();
            SimulatedOperation::ReusePart { code, part }
        }
        2 => {
            let id = ItemId(model.next + rng.gen_range(0..10));
            SimulatedOperation::MarkBrokenUnknown { id }
        }
        3 => {
            let code = model.fresh_code();
            SimulatedOperation::MissingParams { code }
        }
        _ => {
            let part = ItemId(model.next + rng.gen_range(0..3));
            let code = model.fresh_code();
            SimulatedOperation::ForwardPart { code, part }
        }
    }
}

fn draft(code: &str) -> ItemDraft {
    ItemDraft::new(code, "part", "simulator", "sim-bench", json!({ "code": code }))
}

type SimRegistry = Registry<MemoryStore, UnboundedSender<RegistryEvent>>;

fn execute(registry: &SimRegistry, op: &SimulatedOperation) -> Result<Option<ItemId>, RegistryError> {
    match op {
        SimulatedOperation::CreateLeaf { code } | SimulatedOperation::DuplicateCode { code } => {
            registry.create(draft(code)).map(Some)
        }
        SimulatedOperation::CreateAssembly { code, parts } => registry
            .create(draft(code).with_parts(parts.iter().copied()))
            .map(Some),
        SimulatedOperation::ForwardPart { code, part } | SimulatedOperation::ReusePart { code, part } => {
            registry.create(draft(code).with_parts([*part])).map(Some)
        }
        SimulatedOperation::MissingParams { code } => {
            let mut draft = draft(code);
            draft.params = None;
            registry.create(draft).map(Some)
        }
        SimulatedOperation::MarkBroken { id } | SimulatedOperation::MarkBrokenUnknown { id } => {
            registry.mark_broken(*id).map(|_| None)
        }
        SimulatedOperation::MarkBrokenByCode { code } => registry.mark_broken_by_code(code).map(|_| None),
    }
}

async fn count_events(mut rx: UnboundedReceiver<RegistryEvent>) -> u64 {
    let mut delivered = 0;
    while rx.recv().await.is_some() {
        delivered += 1;
    }
    delivered
}

/// Run the simulator
pub async fn run_simulator(config: SimulatorConfig) -> anyhow::Result<SimulatorReport> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let (tx, rx) = unbounded_channel();
    let listener = tokio::spawn(count_events(rx));
    let registry = Registry::open(MemoryStore::new(), tx, RegistryConfig::default())?;

    let mut model = Model::default();
    let mut stats = SimulatorStats::default();
    let mut violations = Vec::new();

    for _ in 0..config.operations {
        let operation = generate_operation(&mut rng, &mut model, &config);
        let expected = model.expected(&operation);
        stats.operations += 1;

        let outcome = execute(&registry, &operation);
        let actual = outcome.as_ref().err().map(RegistryError::kind);
        if actual != expected {
            tracing::error!(?operation, ?expected, ?actual, "unexpected outcome");
            violations.push(Violation::UnexpectedOutcome {
                operation,
                expected,
                actual,
            });
            if config.stop_on_first_violation {
                break;
            }
            continue;
        }

        let Ok(created) = outcome else {
            stats.rejected += 1;
            continue;
        };
        match created {
            Some(id) => {
                if id != ItemId(model.next) {
                    violations.push(Violation::IdGap {
                        expected: ItemId(model.next),
                        actual: id,
                    });
                }
                stats.items_created += 1;
                if matches!(operation, SimulatedOperation::CreateAssembly { .. }) {
                    stats.assemblies_created += 1;
                }
            }
            None => stats.items_broken += 1,
        }
        model.apply(&operation);
    }

    let actual_free: Vec<ItemId> = registry.get_all_items()?.iter().map(|item| item.id).collect();
    let mut expected_free = model.free.clone();
    expected_free.sort();
    if actual_free != expected_free {
        violations.push(Violation::FreeSetMismatch {
            expected: expected_free,
            actual: actual_free,
        });
    }

    let audit = audit(&registry)?;
    violations.extend(audit.violations.iter().cloned().map(Violation::Audit));

    // Closing the sender ends the listener
    drop(registry);
    stats.events_delivered = listener.await?;
    if stats.events_delivered != model.mutations {
        violations.push(Violation::EventCountMismatch {
            expected: model.mutations,
            delivered: stats.events_delivered,
        });
    }

    tracing::info!(
        seed = config.seed,
        operations = stats.operations,
        violations = violations.len(),
        "simulation finished"
    );

    Ok(SimulatorReport {
        config,
        stats,
        audit,
        violations,
    })
}
