//! Backward reachability search for quantized, network-controlled encounters.
//!
//! Starting from a scenario's collision set, the search walks the closed loop
//! backward in time one second per step. Each symbolic state pairs a polytope
//! of concrete states with its quantized heading and speed levels and the
//! advisory history leading forward to the collision. A state whose two
//! earliest advisories are both clear while the aircraft are still far apart
//! is a counterexample: the controller said "clear" on a path into collision.
//!
//! The pieces:
//!
//! - [`SymbolicState`]: region, levels, history and the one-shot time step.
//! - [`PredecessorClassifier`]: which previous advisories explain a state,
//!   splitting by relative-position cell where the controller disagrees.
//! - [`BackreachSearch`]: the per-scenario depth-first driver.
//! - [`ScenarioGrid`] and [`parallel`]: scenario enumeration and the worker pool.
//! - [`replay`]: forward validation of a witness.

pub mod classifier;
pub mod config;
pub mod grid;
pub mod parallel;
pub mod replay;
pub mod search;
pub mod state;
pub mod types;

pub use classifier::{ClassifierStats, PredecessorClassifier};
pub use config::BackreachConfig;
pub use grid::{ScenarioGrid, ScenarioSpace};
pub use parallel::{run_all, run_index, run_parallel, ParallelConfig, ParallelReport, TaskAllocator};
pub use replay::{replay_witness, ReplayOutcome, ReplayReport, ReplayStep};
pub use search::{BackreachSearch, SearchConfig};
pub use state::{StateIdAllocator, SymbolicState};
pub use types::{BackreachResult, CounterexampleSummary, ResultSummary};

pub use backreach_core::{BackreachError, Command, Result, ScenarioParams};

#[cfg(test)]
mod tests;
