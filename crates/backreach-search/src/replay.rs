//! Forward replay of a state's witness, for debugging.
//!
//! Starting from the Chebyshev center of a state's region, re-run the
//! closed loop forward: at each step the network selected by the previous
//! advisory is queried at the point's quantized cell and must reproduce the
//! next entry of the command history.

use crate::state::{StateIdAllocator, SymbolicState};
use backreach_core::{layout, BackreachError, Command, DecisionProvider, QCell, QState, Quanta, Result};
use backreach_dynamics::Dynamics;
use backreach_geometry::Geometry;
use std::fmt;
use tracing::{debug, warn};

/// Chebyshev radius below which the replay is skipped.
pub const MIN_REPLAY_RADIUS: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayStep {
    /// 1-based step number.
    pub step: usize,
    /// Previous advisory, selecting the network.
    pub network: Command,
    pub output: Command,
    pub qstate: QState,
    /// Range point before the step.
    pub point: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplayOutcome {
    /// Every step reproduced the history.
    Matched,
    Mismatch {
        step: usize,
        got: Command,
        expected: Command,
    },
    /// The witness ball is too small to replay reliably.
    Degenerate,
}

#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub radius: f64,
    /// Chebyshev center in domain coordinates.
    pub domain_point: Vec<f64>,
    /// The same point in range coordinates.
    pub start: Vec<f64>,
    pub steps: Vec<ReplayStep>,
    /// Range point after the last replayed step.
    pub end: Vec<f64>,
    /// Heading level after the last replayed step.
    pub end_qtheta1: i64,
    pub outcome: ReplayOutcome,
}

impl ReplayReport {
    pub fn matched(&self) -> bool {
        self.outcome == ReplayOutcome::Matched
    }
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "chebyshev point radius: {}", self.radius)?;
        writeln!(f, "end = {:?}", self.domain_point)?;
        writeln!(f, "start = {:?}", self.start)?;
        for s in &self.steps {
            writeln!(f, "({}). network {} -> {}", s.step, s.network, s.output)?;
            writeln!(f, "state: {:?}", s.point)?;
            writeln!(f, "qstate: {}", s.qstate)?;
        }
        match &self.outcome {
            ReplayOutcome::Matched => write!(f, "witness commands all matched expectation"),
            ReplayOutcome::Mismatch {
                step,
                got,
                expected,
            } => write!(
                f,
                "Mismatch at step {}. got cmd {}, expected cmd {}",
                step, got, expected
            ),
            ReplayOutcome::Degenerate => write!(f, "radius was tiny, replay skipped"),
        }
    }
}

/// Replay `state`'s witness forward through its command history.
///
/// `state` itself is not modified; a shadow copy is stepped alongside the
/// point so the report carries the final region's heading level.
pub fn replay_witness(
    state: &SymbolicState,
    decision: &dyn DecisionProvider,
    dynamics: &dyn Dynamics,
    quanta: &Quanta,
) -> Result<ReplayReport> {
    let (center, radius) = state
        .polytope()
        .chebyshev_center()?
        .ok_or(BackreachError::InfeasibleState)?;
    let start = state.polytope().domain_to_range(center.view())?;

    let mut report = ReplayReport {
        radius,
        domain_point: center.to_vec(),
        start: start.to_vec(),
        steps: Vec::new(),
        end: start.to_vec(),
        end_qtheta1: state.qtheta1(),
        outcome: ReplayOutcome::Matched,
    };

    if radius < MIN_REPLAY_RADIUS {
        warn!(
            "Chebyshev radius {:.3e} of {} is tiny, skipping replay",
            radius, state
        );
        report.outcome = ReplayOutcome::Degenerate;
        return Ok(report);
    }

    let commands = state.commands();
    let mut ids = StateIdAllocator::new();
    let mut shadow = state.copy(&mut ids, None);
    let mut pt = start;
    let mut qtheta1 = state.qtheta1();

    for i in 0..commands.len() - 1 {
        let network = commands[commands.len() - 1 - i];
        let expected = commands[commands.len() - 2 - i];

        let (dx, dy) = layout::relative_position(&pt.to_vec());
        let cell = QCell::containing(dx, dy, quanta);
        let qstate = QState::new(cell, qtheta1, state.qv_own(), state.qv_int());
        let output = decision.advisory(network, qstate);

        report.steps.push(ReplayStep {
            step: i + 1,
            network,
            output,
            qstate,
            point: pt.to_vec(),
        });

        if output != expected {
            debug!("Replay mismatch at step {}: got {}, expected {}", i + 1, output, expected);
            report.outcome = ReplayOutcome::Mismatch {
                step: i + 1,
                got: output,
                expected,
            };
            break;
        }

        let mut next = shadow.copy(&mut ids, None);
        next.forward_step(output, dynamics, quanta)?;
        shadow = next;

        pt = dynamics.time_elapse_mat(output, 1.0).dot(&pt);
        qtheta1 += quanta.cmd_delta(output);
    }

    report.end = pt.to_vec();
    report.end_qtheta1 = shadow.qtheta1();
    Ok(report)
}
