//! Randomised workload harness

/// Seeded random workloads checked against a shadow model
pub mod simulator;

pub use simulator::{
    run_simulator, SimulatedOperation, SimulatorConfig, SimulatorReport, SimulatorStats, Violation,
};
