//! Depth-first backward search for one scenario.

use crate::classifier::PredecessorClassifier;
use crate::state::{StateIdAllocator, SymbolicState};
use crate::types::BackreachResult;
use backreach_core::{Command, DecisionProvider, Quanta, Result, ScenarioParams};
use backreach_dynamics::Dynamics;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, instrument, trace};

/// How often (in popped states) to log search progress.
const PROGRESS_INTERVAL: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Witness separation (ft) above which a clear-clear history is a counterexample.
    #[serde(default = "default_counterexample_separation")]
    pub counterexample_separation: f64,
}

fn default_counterexample_separation() -> f64 {
    10_000.0
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            counterexample_separation: default_counterexample_separation(),
        }
    }
}

/// Backward reachability search over one scenario at a time.
///
/// Holds only shared, read-only collaborators; every call to [`run`] owns its
/// frontier, id allocator and classifier.
///
/// [`run`]: BackreachSearch::run
pub struct BackreachSearch<'a> {
    dynamics: &'a dyn Dynamics,
    decision: &'a dyn DecisionProvider,
    quanta: &'a Quanta,
    config: &'a SearchConfig,
}

impl<'a> BackreachSearch<'a> {
    pub fn new(
        dynamics: &'a dyn Dynamics,
        decision: &'a dyn DecisionProvider,
        quanta: &'a Quanta,
        config: &'a SearchConfig,
    ) -> Self {
        Self {
            dynamics,
            decision,
            quanta,
            config,
        }
    }

    pub fn quanta(&self) -> &Quanta {
        self.quanta
    }

    pub fn dynamics(&self) -> &dyn Dynamics {
        self.dynamics
    }

    pub fn decision(&self) -> &dyn DecisionProvider {
        self.decision
    }

    /// Search backward from the scenario's initial set until a counterexample
    /// is found or the frontier is exhausted.
    ///
    /// The frontier is LIFO. Each popped state is classified; its predecessors
    /// are checked for the counterexample condition in order and pushed, and
    /// the first hit ends the task. A popped state without predecessors
    /// records its command history as a dead end.
    #[instrument(skip(self, params), fields(params = %params))]
    pub fn run(&self, index: usize, params: ScenarioParams) -> Result<BackreachResult> {
        let start = Instant::now();
        params.validate()?;

        let mut ids = StateIdAllocator::new();
        let init_polytope = self.dynamics.init_polytope(&params)?;
        let init = SymbolicState::new(
            params.initial_command,
            params.qtheta1,
            params.qv_own,
            params.qv_int,
            init_polytope,
            &mut ids,
        )?;

        let mut classifier = PredecessorClassifier::new(self.decision, self.dynamics, self.quanta);
        let mut frontier = vec![init];
        let mut num_popped = 0usize;
        let mut dead_ends: HashSet<Vec<Command>> = HashSet::new();
        let mut counterexample = None;

        'search: while let Some(mut state) = frontier.pop() {
            num_popped += 1;
            trace!("Popped {} (frontier {})", state, frontier.len());
            if num_popped % PROGRESS_INTERVAL == 0 {
                debug!(
                    "Popped {} states, frontier {}, dead ends {}",
                    num_popped,
                    frontier.len(),
                    dead_ends.len()
                );
            }

            let predecessors = classifier.predecessors(&mut state, &mut ids)?;
            if predecessors.is_empty() {
                dead_ends.insert(state.commands().to_vec());
                continue;
            }

            for pred in predecessors {
                if self.is_counterexample(&pred)? {
                    debug!("Counterexample {} after {} pops", pred, num_popped);
                    counterexample = Some(pred);
                    break 'search;
                }
                frontier.push(pred);
            }
        }

        classifier.log_stats();
        let result = BackreachResult {
            counterexample,
            runtime: start.elapsed(),
            num_popped,
            unique_paths: dead_ends.len(),
            index,
            params,
        };
        info!("{}", result.summary());
        Ok(result)
    }

    /// The last two advisories are clear and the witness separation exceeds
    /// the configured distance.
    pub fn is_counterexample(&self, state: &SymbolicState) -> Result<bool> {
        if !matches!(state.commands(), [.., Command::Clear, Command::Clear]) {
            return Ok(false);
        }
        Ok(state.witness_separation()? > self.config.counterexample_separation)
    }
}
