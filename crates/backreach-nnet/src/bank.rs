//! The five-network ACAS Xu bank as a [`DecisionProvider`].

use crate::io::find_maybe_gzip;
use crate::nnet::NnetNetwork;
use crate::NnetError;
use backreach_core::{Command, DecisionProvider, QState, Quanta};
use dashmap::DashMap;
use ndarray::Array1;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Environment variable naming the network directory.
pub const NNET_DIR_ENV: &str = "BACKREACH_NNET_DIR";

/// File name of the network selected by previous advisory `prev`.
pub fn network_file_name(prev: Command) -> String {
    format!("ACASXU_run2a_{}_1_batch_2000.nnet", prev.index() + 1)
}

/// Default cap on cached decisions; at roughly 64 bytes per entry this is about 64 MiB.
pub const DEFAULT_CACHE_LIMIT: usize = 1 << 20;

const NUM_INPUTS: usize = 5;
const NUM_OUTPUTS: usize = 5;

/// Networks indexed by previous advisory, plus a lookup cache.
///
/// Cached values are a pure function of the key, so concurrent workers may
/// race on an insert without changing any answer. The cache is cleared once it
/// holds `cache_limit` entries, so memory stays bounded over a long grid run
/// (concurrent inserts can overshoot the limit by at most one per worker).
#[derive(Debug)]
pub struct NetworkBank {
    networks: Vec<NnetNetwork>,
    quanta: Quanta,
    cache: DashMap<(Command, QState), Command>,
    cache_limit: usize,
    entries: AtomicUsize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl NetworkBank {
    /// Build a bank from five networks ordered by previous-advisory code.
    pub fn new(networks: Vec<NnetNetwork>, quanta: Quanta) -> Result<Self, NnetError> {
        if networks.len() != Command::ALL.len() {
            return Err(NnetError::Format(format!(
                "expected {} networks, got {}",
                Command::ALL.len(),
                networks.len()
            )));
        }
        for net in &networks {
            if net.input_size() != NUM_INPUTS || net.output_size() != NUM_OUTPUTS {
                return Err(NnetError::Format(format!(
                    "network must map {} inputs to {} advisory scores, got {} -> {}",
                    NUM_INPUTS,
                    NUM_OUTPUTS,
                    net.input_size(),
                    net.output_size()
                )));
            }
        }
        Ok(Self {
            networks,
            quanta,
            cache: DashMap::new(),
            cache_limit: DEFAULT_CACHE_LIMIT,
            entries: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        })
    }

    /// Cap the decision cache at `limit` entries (at least one).
    pub fn with_cache_limit(mut self, limit: usize) -> Self {
        self.cache_limit = limit.max(1);
        self
    }

    /// Load all five networks from `dir`.
    pub fn load_dir(dir: &Path, quanta: Quanta) -> Result<Self, NnetError> {
        let networks = Command::ALL
            .iter()
            .map(|&prev| NnetNetwork::load(&find_maybe_gzip(dir, &network_file_name(prev))?))
            .collect::<Result<Vec<_>, _>>()?;
        info!("Loaded network bank from {}", dir.display());
        Self::new(networks, quanta)
    }

    /// Network directory from an explicit path or [`NNET_DIR_ENV`].
    pub fn resolve_dir(explicit: Option<&Path>) -> Result<PathBuf, NnetError> {
        if let Some(dir) = explicit {
            return Ok(dir.to_path_buf());
        }
        std::env::var_os(NNET_DIR_ENV)
            .map(PathBuf::from)
            .ok_or(NnetError::NoDirectory)
    }

    /// Network inputs `[rho, theta, psi, v_own, v_int]` at the center of a quantized state.
    ///
    /// Angles are wrapped to `[-pi, pi)`; the intruder heading is 0.
    pub fn network_inputs(&self, state: QState) -> [f64; NUM_INPUTS] {
        let q = &self.quanta;
        let dx = (state.dx as f64 + 0.5) * q.pos;
        let dy = (state.dy as f64 + 0.5) * q.pos;
        let theta1 = (state.qtheta1 as f64 + 0.5) * q.heading_rad();

        let rho = dx.hypot(dy);
        let theta = wrap_angle(dy.atan2(dx) - theta1);
        let psi = wrap_angle(0.0 - theta1);
        let v_own = (state.qv_own as f64 + 0.5) * q.vel;
        let v_int = (state.qv_int as f64 + 0.5) * q.vel;
        [rho, theta, psi, v_own, v_int]
    }

    fn evaluate(&self, prev: Command, state: QState) -> Command {
        let input = Array1::from(self.network_inputs(state).to_vec());
        let scores = self.networks[prev.index()].forward(input.view());
        let best = scores
            .iter()
            .enumerate()
            .fold((0, f64::INFINITY), |(bi, bv), (i, &v)| if v < bv { (i, v) } else { (bi, bv) })
            .0;
        Command::ALL[best]
    }

    /// `(hits, misses)` of the lookup cache.
    pub fn cache_stats(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn log_cache_stats(&self) {
        let (hits, misses) = self.cache_stats();
        debug!(
            "Decision cache: {} entries, {} hits, {} misses",
            self.cache.len(),
            hits,
            misses
        );
    }
}

impl DecisionProvider for NetworkBank {
    fn advisory(&self, prev: Command, state: QState) -> Command {
        if let Some(cmd) = self.cache.get(&(prev, state)) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return *cmd;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let cmd = self.evaluate(prev, state);
        if self.entries.load(Ordering::Relaxed) >= self.cache_limit {
            self.cache.clear();
            self.entries.store(0, Ordering::Relaxed);
            debug!("Decision cache reached {} entries, cleared", self.cache_limit);
        }
        if self.cache.insert((prev, state), cmd).is_none() {
            self.entries.fetch_add(1, Ordering::Relaxed);
        }
        cmd
    }
}

fn wrap_angle(theta: f64) -> f64 {
    (theta + PI).rem_euclid(2.0 * PI) - PI
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nnet::tests::constant_net_text;
    use backreach_core::QCell;
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;

    fn write_bank(dir: &Path, gzip_last: bool) {
        for prev in Command::ALL {
            // Network for `prev` always answers `prev`
            let text = constant_net_text(prev.index());
            let name = network_file_name(prev);
            if gzip_last && prev == Command::StrongRight {
                let mut enc = GzEncoder::new(Vec::new(), Compression::default());
                enc.write_all(text.as_bytes()).unwrap();
                std::fs::write(dir.join(format!("{name}.gz")), enc.finish().unwrap()).unwrap();
            } else {
                std::fs::write(dir.join(name), text).unwrap();
            }
        }
    }

    #[test]
    fn test_file_names() {
        assert_eq!(
            network_file_name(Command::Clear),
            "ACASXU_run2a_1_1_batch_2000.nnet"
        );
        assert_eq!(
            network_file_name(Command::StrongRight),
            "ACASXU_run2a_5_1_batch_2000.nnet"
        );
    }

    #[test]
    fn test_load_dir_and_select_by_prev() {
        let dir = tempfile::tempdir().unwrap();
        write_bank(dir.path(), true);
        let bank = NetworkBank::load_dir(dir.path(), Quanta::default()).unwrap();

        let state = QState::new(QCell::new(12, -4), 30, 2, 7);
        for prev in Command::ALL {
            assert_eq!(bank.advisory(prev, state), prev);
        }
    }

    #[test]
    fn test_cache_counters() {
        let dir = tempfile::tempdir().unwrap();
        write_bank(dir.path(), false);
        let bank = NetworkBank::load_dir(dir.path(), Quanta::default()).unwrap();

        let state = QState::new(QCell::new(3, 3), 0, 1, 1);
        bank.advisory(Command::Clear, state);
        bank.advisory(Command::Clear, state);
        bank.advisory(Command::WeakLeft, state);
        assert_eq!(bank.cache_stats(), (1, 2));
        assert_eq!(bank.cache_len(), 2);
    }

    #[test]
    fn test_cache_stays_within_limit() {
        let dir = tempfile::tempdir().unwrap();
        write_bank(dir.path(), false);
        let bank = NetworkBank::load_dir(dir.path(), Quanta::default())
            .unwrap()
            .with_cache_limit(2);

        for dx in 0..10 {
            let state = QState::new(QCell::new(dx, 0), 0, 1, 1);
            assert_eq!(bank.advisory(Command::WeakRight, state), Command::WeakRight);
            assert!(bank.cache_len() <= 2, "{} entries", bank.cache_len());
        }
        assert_eq!(bank.cache_stats(), (0, 10));

        // The last insert is still cached
        bank.advisory(Command::WeakRight, QState::new(QCell::new(9, 0), 0, 1, 1));
        assert_eq!(bank.cache_stats(), (1, 10));
    }

    #[test]
    fn test_missing_network_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_bank(dir.path(), false);
        std::fs::remove_file(dir.path().join(network_file_name(Command::WeakRight))).unwrap();
        let err = NetworkBank::load_dir(dir.path(), Quanta::default()).unwrap_err();
        assert!(matches!(err, NnetError::NotFound(_)));

        let core: backreach_core::BackreachError = err.into();
        assert!(core.to_string().contains("Model loading failed"));
    }

    #[test]
    fn test_wrong_bank_size() {
        let net = NnetNetwork::parse(&constant_net_text(0)).unwrap();
        assert!(NetworkBank::new(vec![net], Quanta::default()).is_err());
    }

    #[test]
    fn test_network_inputs() {
        let net = NnetNetwork::parse(&constant_net_text(0)).unwrap();
        let bank = NetworkBank::new(vec![net; 5], Quanta::default()).unwrap();

        // Cell (2, 3) center is (250, 350); heading level 0 center is 0.75 degrees
        let inputs = bank.network_inputs(QState::new(QCell::new(2, 3), 0, 2, 7));
        assert!((inputs[0] - 250.0_f64.hypot(350.0)).abs() < 1e-9);
        let expected_theta = 350.0_f64.atan2(250.0) - 0.75_f64.to_radians();
        assert!((inputs[1] - expected_theta).abs() < 1e-12);
        assert!((inputs[2] + 0.75_f64.to_radians()).abs() < 1e-12);
        assert_eq!(inputs[3], 250.0);
        assert_eq!(inputs[4], 750.0);

        // Heading level 152 (228 degrees) wraps psi into [-pi, pi)
        let inputs = bank.network_inputs(QState::new(QCell::new(2, 3), 152, 2, 7));
        assert!(inputs[2] >= -PI && inputs[2] < PI);
        assert!((inputs[2] - (360.0 - 228.75_f64).to_radians()).abs() < 1e-9);
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_angle(-3.0 * PI / 2.0) - PI / 2.0).abs() < 1e-12);
        assert_eq!(wrap_angle(0.0), 0.0);
    }
}
