//! Predecessor classification.
//!
//! Given a state whose last advisory is known, decide which previous
//! advisories could have produced it, splitting the predecessor region by
//! relative-position cell when only part of it issues the known advisory.

use crate::state::{StateIdAllocator, SymbolicState};
use backreach_core::{Command, DecisionProvider, QCell, QState, Quanta, Result};
use backreach_dynamics::Dynamics;
use backreach_geometry::Geometry;
use tracing::{debug, trace};

/// Counters over all classifier calls of one task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifierStats {
    /// States classified.
    pub calls: usize,
    /// Decision queries issued.
    pub cells_queried: usize,
    /// Cell restrictions checked for feasibility.
    pub restrictions_tested: usize,
    /// Predecessors emitted without a cell restriction.
    pub unrestricted: usize,
    /// Predecessors emitted with a cell restriction.
    pub split: usize,
}

pub struct PredecessorClassifier<'a> {
    decision: &'a dyn DecisionProvider,
    dynamics: &'a dyn Dynamics,
    quanta: &'a Quanta,
    stats: ClassifierStats,
}

impl<'a> PredecessorClassifier<'a> {
    pub fn new(decision: &'a dyn DecisionProvider, dynamics: &'a dyn Dynamics, quanta: &'a Quanta) -> Self {
        Self {
            decision,
            dynamics,
            quanta,
            stats: ClassifierStats::default(),
        }
    }

    pub fn stats(&self) -> &ClassifierStats {
        &self.stats
    }

    pub fn log_stats(&self) {
        let s = &self.stats;
        debug!(
            "Classifier: {} calls, {} cells queried, {} restrictions tested, {} unrestricted, {} split",
            s.calls, s.cells_queried, s.restrictions_tested, s.unrestricted, s.split
        );
    }

    /// Predecessors of `state`, ordered by previous advisory then cell.
    ///
    /// Steps `state` backward in place first, so a state can be classified
    /// only once. For each candidate previous advisory the cells touched by the
    /// stepped region (minus collision cells) are split into those where the
    /// controller issues the known advisory and those where it does not:
    ///
    /// - no match: the candidate is impossible;
    /// - all match, or every mismatching cell misses the region: one
    ///   unrestricted predecessor;
    /// - otherwise: one predecessor per matching cell that meets the region.
    pub fn predecessors(
        &mut self,
        state: &mut SymbolicState,
        ids: &mut StateIdAllocator,
    ) -> Result<Vec<SymbolicState>> {
        self.stats.calls += 1;
        state.backward_step(self.dynamics, self.quanta)?;
        let (dx_range, dy_range) = state.relative_position_range(self.quanta)?;
        let current = state.current_command();

        let mut out = Vec::new();
        for prev in Command::ALL {
            let mut matching = Vec::new();
            let mut mismatching = Vec::new();

            for dx in dx_range.clone() {
                for dy in dy_range.clone() {
                    if self.quanta.is_init_cell(dx, dy) {
                        continue;
                    }
                    let cell = QCell::new(dx, dy);
                    let qstate = QState::new(cell, state.qtheta1(), state.qv_own(), state.qv_int());
                    self.stats.cells_queried += 1;
                    if self.decision.advisory(prev, qstate) == current {
                        matching.push(cell);
                    } else {
                        mismatching.push(cell);
                    }
                }
            }

            if matching.is_empty() {
                continue;
            }

            if mismatching.is_empty() || self.all_infeasible(state, &mismatching)? {
                let mut pred = state.copy(ids, None);
                pred.push_command(prev);
                trace!("{} -> unrestricted {}", state.id(), pred);
                out.push(pred);
                self.stats.unrestricted += 1;
                continue;
            }

            for cell in matching {
                self.stats.restrictions_tested += 1;
                let restricted = state.polytope().restrict_to_cell(cell, self.quanta)?;
                if let Some(witness) = restricted.witness()? {
                    let mut pred = state.copy(ids, Some((restricted, witness)));
                    pred.push_command(prev);
                    trace!("{} -> {} in cell {}", state.id(), pred, cell);
                    out.push(pred);
                    self.stats.split += 1;
                }
            }
        }
        Ok(out)
    }

    /// Whether no cell in `cells` meets the state's region. Stops at the first that does.
    fn all_infeasible(&mut self, state: &SymbolicState, cells: &[QCell]) -> Result<bool> {
        for &cell in cells {
            self.stats.restrictions_tested += 1;
            let restricted = state.polytope().restrict_to_cell(cell, self.quanta)?;
            if restricted.witness()?.is_some() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
