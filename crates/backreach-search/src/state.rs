//! Symbolic search states.

use backreach_core::{layout, BackreachError, Command, Quanta, Result};
use backreach_dynamics::Dynamics;
use backreach_geometry::{Geometry, Polytope};
use ndarray::Array1;
use std::fmt;
use std::ops::RangeInclusive;

/// Task-local source of state ids.
#[derive(Debug, Default)]
pub struct StateIdAllocator {
    next: u64,
}

impl StateIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}

/// A polytope of concrete states together with its quantized levels and the
/// advisories that lead from it to the scenario's initial set.
///
/// `commands[0]` is the scenario's initial advisory; each backward step
/// appends the advisory issued one second earlier, so the last entry is the
/// earliest in time.
#[derive(Debug)]
pub struct SymbolicState {
    polytope: Polytope,
    qtheta1: i64,
    qv_own: i64,
    qv_int: i64,
    commands: Vec<Command>,
    witness: Array1<f64>,
    id: u64,
    stepped: bool,
}

impl SymbolicState {
    /// Wrap a feasible polytope.
    ///
    /// Fails with [`BackreachError::InfeasibleState`] if the polytope is empty.
    pub fn new(
        command: Command,
        qtheta1: i64,
        qv_own: i64,
        qv_int: i64,
        polytope: Polytope,
        ids: &mut StateIdAllocator,
    ) -> Result<Self> {
        let witness = polytope.witness()?.ok_or(BackreachError::InfeasibleState)?;
        Ok(Self {
            polytope,
            qtheta1,
            qv_own,
            qv_int,
            commands: vec![command],
            witness,
            id: ids.next_id(),
            stepped: false,
        })
    }

    /// Independent copy with a fresh id.
    ///
    /// With `replacement`, the given polytope and its witness are swapped in;
    /// otherwise the polytope is cloned. The copy may be stepped again.
    pub fn copy(&self, ids: &mut StateIdAllocator, replacement: Option<(Polytope, Array1<f64>)>) -> Self {
        let (polytope, witness) =
            replacement.unwrap_or_else(|| (self.polytope.clone(), self.witness.clone()));
        Self {
            polytope,
            qtheta1: self.qtheta1,
            qv_own: self.qv_own,
            qv_int: self.qv_int,
            commands: self.commands.clone(),
            witness,
            id: ids.next_id(),
            stepped: false,
        }
    }

    pub fn polytope(&self) -> &Polytope {
        &self.polytope
    }

    pub fn qtheta1(&self) -> i64 {
        self.qtheta1
    }

    pub fn qv_own(&self) -> i64 {
        self.qv_own
    }

    pub fn qv_int(&self) -> i64 {
        self.qv_int
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// The advisory issued at this state: the last history entry.
    pub fn current_command(&self) -> Command {
        self.commands[self.commands.len() - 1]
    }

    pub fn witness(&self) -> &Array1<f64> {
        &self.witness
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_stepped(&self) -> bool {
        self.stepped
    }

    pub(crate) fn push_command(&mut self, cmd: Command) {
        self.commands.push(cmd);
    }

    /// Rewind one second under the current command.
    pub fn backward_step(&mut self, dynamics: &dyn Dynamics, quanta: &Quanta) -> Result<()> {
        let cmd = self.current_command();
        self.apply_step(cmd, -1.0, dynamics)?;
        self.qtheta1 -= quanta.cmd_delta(cmd);
        Ok(())
    }

    /// Advance one second under `cmd`. Only replay uses this.
    pub fn forward_step(&mut self, cmd: Command, dynamics: &dyn Dynamics, quanta: &Quanta) -> Result<()> {
        self.apply_step(cmd, 1.0, dynamics)?;
        self.qtheta1 += quanta.cmd_delta(cmd);
        Ok(())
    }

    fn apply_step(&mut self, cmd: Command, dt: f64, dynamics: &dyn Dynamics) -> Result<()> {
        if self.stepped {
            return Err(BackreachError::AlreadyStepped { id: self.id });
        }
        let mat = dynamics.time_elapse_mat(cmd, dt);
        self.polytope.transform_range(&mat)?;
        self.stepped = true;
        Ok(())
    }

    /// Inclusive `(dx, dy)` cell ranges covering the polytope.
    pub fn relative_position_range(
        &self,
        quanta: &Quanta,
    ) -> Result<(RangeInclusive<i64>, RangeInclusive<i64>)> {
        let dx = Array1::from(layout::dx_direction().to_vec());
        let dy = Array1::from(layout::dy_direction().to_vec());
        let dx_range = self.polytope.range_bound(dx.view())?.quantize(quanta.pos);
        let dy_range = self.polytope.range_bound(dy.view())?.quantize(quanta.pos);
        Ok((dx_range, dy_range))
    }

    /// The witness in range coordinates.
    pub fn witness_range_point(&self) -> Result<Array1<f64>> {
        self.polytope.domain_to_range(self.witness.view())
    }

    /// Own-to-intruder distance at the witness.
    pub fn witness_separation(&self) -> Result<f64> {
        let pt = self.witness_range_point()?;
        let (dx, dy) = layout::relative_position(&pt.to_vec());
        Ok(dx.hypot(dy))
    }

    /// Initialization lines for replaying this state elsewhere.
    pub fn replay_header(&self) -> String {
        let codes: Vec<String> = self.commands.iter().map(|c| c.index().to_string()).collect();
        format!(
            "commands = [{}]\nqtheta1 = {}\nqv_own = {}\nqv_int = {}",
            codes.join(", "),
            self.qtheta1,
            self.qv_own,
            self.qv_int
        )
    }
}

impl fmt::Display for SymbolicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.commands.iter().map(|c| c.name()).collect();
        write!(f, "State(id={} commands=[{}])", self.id, names.join(", "))
    }
}
