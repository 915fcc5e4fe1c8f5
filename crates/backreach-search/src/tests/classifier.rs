use super::{canonical_clear, canonical_params, dubins};
use crate::classifier::PredecessorClassifier;
use crate::state::{StateIdAllocator, SymbolicState};
use backreach_core::{Command, QCell, QState};
use backreach_dynamics::Dynamics;

fn init_state(
    dynamics: &dyn Dynamics,
    params: backreach_core::ScenarioParams,
    ids: &mut StateIdAllocator,
) -> SymbolicState {
    let p = dynamics.init_polytope(&params).unwrap();
    SymbolicState::new(
        params.initial_command,
        params.qtheta1,
        params.qv_own,
        params.qv_int,
        p,
        ids,
    )
    .unwrap()
}

#[test]
fn test_no_match_gives_no_predecessors() {
    let (quanta, dynamics) = dubins();
    let decide = |_prev: Command, _q: QState| Command::WeakLeft;
    let mut ids = StateIdAllocator::new();
    let mut state = init_state(&dynamics, canonical_params(), &mut ids);

    let mut classifier = PredecessorClassifier::new(&decide, &dynamics, &quanta);
    let preds = classifier.predecessors(&mut state, &mut ids).unwrap();
    assert!(preds.is_empty());
    assert!(state.is_stepped());
    assert!(classifier.stats().cells_queried > 0);
    assert_eq!(classifier.stats().restrictions_tested, 0);
}

#[test]
fn test_all_match_gives_one_unrestricted_per_command() {
    let (quanta, dynamics) = dubins();
    let decide = |_prev: Command, _q: QState| Command::StrongRight;
    let mut ids = StateIdAllocator::new();
    let mut state = init_state(&dynamics, canonical_params(), &mut ids);

    let mut classifier = PredecessorClassifier::new(&decide, &dynamics, &quanta);
    let preds = classifier.predecessors(&mut state, &mut ids).unwrap();
    assert_eq!(preds.len(), 5);
    for (pred, prev) in preds.iter().zip(Command::ALL) {
        assert_eq!(pred.commands(), &[Command::StrongRight, prev]);
        // Strong right turns by -2 levels; stepping back adds them
        assert_eq!(pred.qtheta1(), 154);
        assert_eq!(pred.polytope(), state.polytope());
        assert!(!pred.is_stepped());
    }
    assert_eq!(classifier.stats().unrestricted, 5);
    assert_eq!(classifier.stats().split, 0);

    // The classified state cannot be classified again
    assert!(classifier.predecessors(&mut state, &mut ids).is_err());
}

#[test]
fn test_classification_depends_on_previous_command() {
    let (quanta, dynamics) = dubins();
    let decide = |prev: Command, _q: QState| {
        if prev == Command::WeakRight {
            Command::StrongRight
        } else {
            Command::Clear
        }
    };
    let mut ids = StateIdAllocator::new();
    let mut state = init_state(&dynamics, canonical_params(), &mut ids);

    let mut classifier = PredecessorClassifier::new(&decide, &dynamics, &quanta);
    let preds = classifier.predecessors(&mut state, &mut ids).unwrap();
    assert_eq!(preds.len(), 1);
    assert_eq!(preds[0].commands(), &[Command::StrongRight, Command::WeakRight]);
}

#[test]
fn test_partial_match_splits_by_cell() {
    let (quanta, dynamics) = dubins();
    let mut ids = StateIdAllocator::new();

    // Find the stepped region's lowest dx cell
    let mut probe = init_state(&dynamics, canonical_clear(), &mut ids);
    probe.backward_step(&dynamics, &quanta).unwrap();
    let (dx_range, _) = probe.relative_position_range(&quanta).unwrap();
    let lo = *dx_range.start();
    assert!(dx_range.end() - dx_range.start() >= 2);

    let decide = move |_prev: Command, q: QState| {
        if q.dx == lo {
            Command::Clear
        } else {
            Command::StrongLeft
        }
    };
    let mut state = init_state(&dynamics, canonical_clear(), &mut ids);
    let parent_constraints = state.polytope().num_constraints();

    let mut classifier = PredecessorClassifier::new(&decide, &dynamics, &quanta);
    let preds = classifier.predecessors(&mut state, &mut ids).unwrap();

    assert!(!preds.is_empty());
    assert_eq!(preds.len() % 5, 0, "same split for every previous command");
    assert_eq!(classifier.stats().split, preds.len());
    for pred in &preds {
        assert_eq!(pred.polytope().num_constraints(), parent_constraints + 4);
        let pt = pred.witness_range_point().unwrap();
        let (dx, dy) = backreach_core::layout::relative_position(&pt.to_vec());
        assert!(dx >= lo as f64 * 100.0 - 1e-6 && dx <= (lo + 1) as f64 * 100.0 + 1e-6);
        let cell = QCell::containing(dx, dy, &quanta);
        assert!(!quanta.is_init_cell(cell.dx, cell.dy));
    }

    // Ids are unique within the task
    let mut seen: Vec<u64> = preds.iter().map(|p| p.id()).collect();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), preds.len());
}

#[test]
fn test_infeasible_mismatch_cells_do_not_split() {
    let (quanta, dynamics) = dubins();
    let mut ids = StateIdAllocator::new();

    let mut probe = init_state(&dynamics, canonical_clear(), &mut ids);
    probe.backward_step(&dynamics, &quanta).unwrap();
    let (dx_range, _) = probe.relative_position_range(&quanta).unwrap();
    let hi = *dx_range.end();

    // The ceil'd upper cell lies beyond the region's maximum dx, so its
    // non-collision cells mismatch without meeting the region.
    let decide = move |_prev: Command, q: QState| {
        if q.dx == hi {
            Command::StrongLeft
        } else {
            Command::Clear
        }
    };
    let mut state = init_state(&dynamics, canonical_clear(), &mut ids);
    let mut classifier = PredecessorClassifier::new(&decide, &dynamics, &quanta);
    let preds = classifier.predecessors(&mut state, &mut ids).unwrap();
    assert_eq!(preds.len(), 5);
    assert_eq!(classifier.stats().split, 0);
    assert_eq!(classifier.stats().unrestricted, 5);
    assert!(classifier.stats().restrictions_tested >= 5);
}
