//! Encounter dynamics for backward reachability.
//!
//! The search treats dynamics as two operations: encode a scenario into an
//! initial region, and give the linear map that advances (or rewinds) the
//! state by `dt` seconds under a fixed advisory.

pub mod dubins;

pub use dubins::DubinsDynamics;

use backreach_core::{Command, Result, ScenarioParams};
use backreach_geometry::Polytope;
use ndarray::Array2;

/// Dynamics provider.
pub trait Dynamics: Send + Sync {
    /// Initial region for a scenario, over range layout [`backreach_core::layout`].
    fn init_polytope(&self, params: &ScenarioParams) -> Result<Polytope>;

    /// Linear map advancing the range state by `dt` under `cmd`.
    ///
    /// `time_elapse_mat(cmd, -dt)` is the inverse of `time_elapse_mat(cmd, dt)`.
    fn time_elapse_mat(&self, cmd: Command, dt: f64) -> Array2<f64>;
}
