//! Every predecessor the classifier emits must really issue the known
//! advisory somewhere in its region.

use super::dubins;
use crate::classifier::PredecessorClassifier;
use crate::grid::ScenarioGrid;
use crate::state::{StateIdAllocator, SymbolicState};
use backreach_core::{layout, Command, DecisionProvider, QCell, QState, ScenarioParams};
use backreach_dynamics::Dynamics;
use backreach_geometry::Geometry;
use proptest::prelude::*;

/// Issues `target` on one side of a cell threshold, except after strong left.
#[derive(Debug, Clone, Copy)]
struct ThresholdController {
    target: Command,
    threshold: i64,
    along_dy: bool,
}

impl DecisionProvider for ThresholdController {
    fn advisory(&self, prev: Command, state: QState) -> Command {
        let coord = if self.along_dy { state.dy } else { state.dx };
        if prev != Command::StrongLeft && coord <= self.threshold {
            self.target
        } else {
            Command::from_index((self.target.index() + 1) % 5).unwrap_or(Command::Clear)
        }
    }
}

fn command() -> impl Strategy<Value = Command> {
    (0usize..5).prop_map(|i| Command::ALL[i])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_predecessors_issue_the_known_advisory(
        cell_pick in 0usize..1000,
        qtheta1 in 0i64..240,
        qv_own in 1i64..=6,
        qv_int in 0i64..=8,
        initial_command in command(),
        threshold in -12i64..12,
        along_dy in any::<bool>(),
    ) {
        let (quanta, dynamics) = dubins();
        let cells = ScenarioGrid::init_cells(&quanta);
        let cell = cells[cell_pick % cells.len()];
        let params = ScenarioParams {
            initial_command,
            x_own: (-cell.dx - 1, -cell.dx),
            y_own: (-cell.dy - 1, -cell.dy),
            qtheta1,
            qv_own,
            qv_int,
        };
        let controller = ThresholdController { target: initial_command, threshold, along_dy };

        let mut ids = StateIdAllocator::new();
        let mut state = SymbolicState::new(
            initial_command,
            qtheta1,
            qv_own,
            qv_int,
            dynamics.init_polytope(&params).unwrap(),
            &mut ids,
        )
        .unwrap();
        let parent_constraints = state.polytope().num_constraints();

        let mut classifier = PredecessorClassifier::new(&controller, &dynamics, &quanta);
        let preds = classifier.predecessors(&mut state, &mut ids).unwrap();
        let stats = classifier.stats();
        prop_assert_eq!(stats.unrestricted + stats.split, preds.len());

        for pred in &preds {
            let prev = pred.commands()[1];
            prop_assert_ne!(prev, Command::StrongLeft);
            prop_assert_eq!(pred.commands()[0], initial_command);
            prop_assert_eq!(pred.qtheta1(), qtheta1 - quanta.cmd_delta(initial_command));

            let (center, radius) = pred.polytope().chebyshev_center().unwrap().unwrap();
            if radius <= 1e-6 {
                continue;
            }
            let pt = pred.polytope().domain_to_range(center.view()).unwrap();
            let (dx, dy) = layout::relative_position(pt.as_slice().unwrap());
            let at = QCell::containing(dx, dy, &quanta);
            let restricted = pred.polytope().num_constraints() == parent_constraints + 4;
            if restricted {
                prop_assert!(!quanta.is_init_cell(at.dx, at.dy));
            }
            if !quanta.is_init_cell(at.dx, at.dy) {
                let q = QState::new(at, pred.qtheta1(), qv_own, qv_int);
                prop_assert_eq!(controller.advisory(prev, q), initial_command);
            }
        }
    }
}
