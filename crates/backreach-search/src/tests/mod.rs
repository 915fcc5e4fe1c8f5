//! Search engine tests with synthetic controllers and the real Dubins dynamics.

mod classifier;
mod proptest_soundness;
mod regression;

use backreach_core::{Command, QState, Quanta, ScenarioParams};
use backreach_dynamics::DubinsDynamics;

/// Scenario (4, (-3, -2), (-4, -3), 152, 2, 7).
pub(crate) fn canonical_params() -> ScenarioParams {
    ScenarioParams {
        initial_command: Command::StrongRight,
        x_own: (-3, -2),
        y_own: (-4, -3),
        qtheta1: 152,
        qv_own: 2,
        qv_int: 7,
    }
}

pub(crate) fn canonical_clear() -> ScenarioParams {
    ScenarioParams {
        initial_command: Command::Clear,
        ..canonical_params()
    }
}

pub(crate) fn dubins() -> (Quanta, DubinsDynamics) {
    let quanta = Quanta::default();
    let dynamics = DubinsDynamics::new(quanta.clone());
    (quanta, dynamics)
}

/// The clear network keeps saying clear; every other network says weak left.
pub(crate) fn clear_chain(prev: Command, _q: QState) -> Command {
    if prev == Command::Clear {
        Command::Clear
    } else {
        Command::WeakLeft
    }
}
