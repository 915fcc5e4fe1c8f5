//! Search results.

use crate::state::SymbolicState;
use backreach_core::{Command, Result, ScenarioParams};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of one scenario task. Immutable once produced.
#[derive(Debug)]
pub struct BackreachResult {
    /// The first state found that satisfies the counterexample condition.
    pub counterexample: Option<SymbolicState>,
    pub runtime: Duration,
    /// States popped from the frontier.
    pub num_popped: usize,
    /// Distinct command histories that ended in a dead end.
    pub unique_paths: usize,
    pub index: usize,
    pub params: ScenarioParams,
}

impl BackreachResult {
    pub fn has_counterexample(&self) -> bool {
        self.counterexample.is_some()
    }

    /// One-line summary.
    pub fn summary(&self) -> String {
        format!(
            "Index {} {}: num_popped: {}, unique_paths: {}, has_counterexample: {}, runtime: {:.2}s",
            self.index,
            self.params,
            self.num_popped,
            self.unique_paths,
            self.has_counterexample(),
            self.runtime.as_secs_f64()
        )
    }

    /// Serializable view without polytope data.
    pub fn to_summary(&self) -> Result<ResultSummary> {
        let counterexample = match &self.counterexample {
            Some(state) => Some(CounterexampleSummary {
                commands: state.commands().to_vec(),
                qtheta1: state.qtheta1(),
                witness: state.witness_range_point()?.to_vec(),
                separation: state.witness_separation()?,
            }),
            None => None,
        };
        Ok(ResultSummary {
            index: self.index,
            params: self.params,
            runtime_secs: self.runtime.as_secs_f64(),
            num_popped: self.num_popped,
            unique_paths: self.unique_paths,
            counterexample,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub index: usize,
    pub params: ScenarioParams,
    pub runtime_secs: f64,
    pub num_popped: usize,
    pub unique_paths: usize,
    pub counterexample: Option<CounterexampleSummary>,
}

/// Counterexample witness in range coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterexampleSummary {
    /// Advisory history, initial advisory first.
    pub commands: Vec<Command>,
    /// Heading level at the witness.
    pub qtheta1: i64,
    pub witness: Vec<f64>,
    pub separation: f64,
}
