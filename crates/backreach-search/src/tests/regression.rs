//! End-to-end runs through a network bank loaded from disk.

use super::{canonical_clear, canonical_params};
use crate::config::BackreachConfig;
use crate::parallel::run_all;
use crate::replay::replay_witness;
use crate::search::BackreachSearch;
use backreach_core::{Command, QState};
use backreach_dynamics::DubinsDynamics;
use backreach_nnet::{network_file_name, NetworkBank};
use std::path::Path;

/// Linear 5-in / 5-out network whose scores are minimized at `best`.
fn constant_net(best: usize) -> String {
    let mut text = String::from("// constant\n1,5,5,5,\n5,5,\n0,\n");
    text.push_str("-1e9,-1e9,-1e9,-1e9,-1e9,\n1e9,1e9,1e9,1e9,1e9,\n");
    text.push_str("0,0,0,0,0,0,\n1,1,1,1,1,1,\n");
    for _ in 0..5 {
        text.push_str("0,0,0,0,0,\n");
    }
    for i in 0..5 {
        let v = if i == best { -1.0 } else { i as f64 };
        text.push_str(&format!("{v},\n"));
    }
    text
}

/// Every network repeats the advisory that selected it.
fn write_sticky_bank(dir: &Path) {
    for prev in Command::ALL {
        std::fs::write(dir.join(network_file_name(prev)), constant_net(prev.index())).unwrap();
    }
}

#[test]
fn test_sticky_bank_reaches_clear_counterexample() {
    let dir = tempfile::tempdir().unwrap();
    write_sticky_bank(dir.path());
    let config = BackreachConfig::default();
    let bank = NetworkBank::load_dir(dir.path(), config.quanta.clone()).unwrap();
    let dynamics = DubinsDynamics::new(config.quanta.clone());
    let search = BackreachSearch::new(&dynamics, &bank, &config.quanta, &config.search);

    let result = search.run(0, canonical_clear()).unwrap();
    let cx = result.counterexample.as_ref().expect("counterexample");
    assert!(cx.commands().iter().all(|&c| c == Command::Clear));

    let report = replay_witness(cx, &bank, &dynamics, &config.quanta).unwrap();
    assert!(report.matched(), "{report}");
    let (_hits, misses) = bank.cache_stats();
    assert!(misses > 0);
    assert!(bank.cache_len() > 0);
}

#[test]
fn test_config_file_drives_parallel_run() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("backreach.json");
    std::fs::write(
        &config_path,
        r#"{
            "search": {"counterexample_separation": 2000.0},
            "parallel": {"max_threads": 2, "report_progress": false},
            "grid": {
                "heading_levels": 1,
                "own_speed_levels": [2, 2],
                "int_speed_levels": [7, 7],
                "commands": [0, 4]
            }
        }"#,
    )
    .unwrap();

    let config = BackreachConfig::from_json_file(&config_path).unwrap();
    assert_eq!(config.grid.commands, vec![Command::Clear, Command::StrongRight]);
    assert_eq!(config.search.counterexample_separation, 2000.0);
    let decide = |_prev: Command, _q: QState| Command::WeakLeft;
    let dynamics = DubinsDynamics::new(config.quanta.clone());
    let search = BackreachSearch::new(&dynamics, &decide, &config.quanta, &config.search);
    let space = config.grid.space(&config.quanta).unwrap();
    let len = space.len();

    let report = run_all(&search, space, 0, None, &config.parallel).unwrap();
    assert_eq!(report.tasks_completed, len);
    assert_eq!(report.total_popped, len);
    assert!(report.counterexamples.is_empty());
}

/// The published fixture: scenario (4, (-3, -2), (-4, -3), 152, 2, 7) with
/// the ACAS Xu networks. Needs `BACKREACH_NNET_DIR` and several minutes.
#[test]
#[ignore]
fn test_canonical_scenario_with_acasxu_networks() {
    let config = BackreachConfig::default();
    let dir = NetworkBank::resolve_dir(None).unwrap();
    let bank = NetworkBank::load_dir(&dir, config.quanta.clone()).unwrap();
    let dynamics = DubinsDynamics::new(config.quanta.clone());
    let search = BackreachSearch::new(&dynamics, &bank, &config.quanta, &config.search);

    let result = search.run(0, canonical_params()).unwrap();
    assert_eq!(result.num_popped, 1_043_422);
    assert_eq!(result.unique_paths, 5551);
    assert!(!result.has_counterexample());
}
