//! Core types and traits for quantized backward reachability.
//!
//! This crate provides the vocabulary shared by the geometry, dynamics,
//! decision and search crates: advisory commands, quantization settings,
//! quantized states and cells, scenario parameters, and the error type that
//! aborts a search task.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Indices into the concrete (range) state vector.
///
/// The intruder flies along the +x axis at `y = 0`, so its y position and
/// y velocity are not state variables.
pub mod layout {
    pub const X_OWN: usize = 0;
    pub const Y_OWN: usize = 1;
    pub const VX_OWN: usize = 2;
    pub const VY_OWN: usize = 3;
    pub const X_INT: usize = 4;
    pub const VX_INT: usize = 5;

    /// Number of range variables.
    pub const NUM_VARS: usize = 6;

    /// Relative position `(dx, dy)` of the intruder with respect to the ownship.
    #[inline]
    pub fn relative_position(pt: &[f64]) -> (f64, f64) {
        (pt[X_INT] - pt[X_OWN], 0.0 - pt[Y_OWN])
    }

    /// Coefficients `c` such that `c · pt = dx`.
    pub fn dx_direction() -> [f64; NUM_VARS] {
        let mut vec = [0.0; NUM_VARS];
        vec[X_INT] = 1.0;
        vec[X_OWN] = -1.0;
        vec
    }

    /// Coefficients `c` such that `c · pt = dy`.
    pub fn dy_direction() -> [f64; NUM_VARS] {
        let mut vec = [0.0; NUM_VARS];
        vec[Y_OWN] = -1.0;
        vec
    }
}

/// A bound on a scalar value: [lower, upper].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub lower: f64,
    pub upper: f64,
}

impl Bound {
    /// Create a new bound.
    #[inline]
    pub fn new(lower: f64, upper: f64) -> Self {
        debug_assert!(lower <= upper, "Invalid bound: {lower} > {upper}");
        Self { lower, upper }
    }

    /// Create a concrete (point) bound.
    #[inline]
    pub fn concrete(value: f64) -> Self {
        Self {
            lower: value,
            upper: value,
        }
    }

    /// Width of the bound interval.
    #[inline]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Inclusive quantized cell range: floor of the lower end, ceil of the upper end.
    #[inline]
    pub fn quantize(&self, quantum: f64) -> RangeInclusive<i64> {
        let lo = (self.lower / quantum).floor() as i64;
        let hi = (self.upper / quantum).ceil() as i64;
        lo..=hi
    }
}

/// Advisory issued by the controller.
///
/// The numeric codes match the network output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Command {
    /// Clear of conflict.
    Clear = 0,
    WeakLeft = 1,
    WeakRight = 2,
    StrongLeft = 3,
    StrongRight = 4,
}

impl Command {
    /// All commands in ascending code order.
    pub const ALL: [Command; 5] = [
        Command::Clear,
        Command::WeakLeft,
        Command::WeakRight,
        Command::StrongLeft,
        Command::StrongRight,
    ];

    /// Numeric code in `0..5`.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look up a command from a numeric code.
    pub fn from_index(code: usize) -> Result<Self> {
        Command::ALL
            .get(code)
            .copied()
            .ok_or(BackreachError::InvalidCommand(code))
    }

    /// Short advisory name.
    pub fn name(self) -> &'static str {
        match self {
            Command::Clear => "COC",
            Command::WeakLeft => "WL",
            Command::WeakRight => "WR",
            Command::StrongLeft => "SL",
            Command::StrongRight => "SR",
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = BackreachError;

    fn try_from(code: u8) -> Result<Self> {
        Command::from_index(code as usize)
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd as u8
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Quantization settings.
///
/// Positions are in feet, velocities in feet per second, and one search step
/// is one second of closed-loop time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quanta {
    /// Position quantum (ft).
    #[serde(default = "default_pos")]
    pub pos: f64,
    /// Heading quantum (degrees).
    #[serde(default = "default_heading_deg")]
    pub heading_deg: f64,
    /// Speed quantum (ft/s).
    #[serde(default = "default_vel")]
    pub vel: f64,
    /// Heading-level change per step for each command, indexed by command code.
    #[serde(default = "default_cmd_deltas")]
    pub cmd_deltas: [i64; 5],
    /// Separation below which a relative-position cell is a collision (initial) cell.
    #[serde(default = "default_collision_radius")]
    pub collision_radius: f64,
}

fn default_pos() -> f64 {
    100.0
}

fn default_heading_deg() -> f64 {
    1.5
}

fn default_vel() -> f64 {
    100.0
}

fn default_cmd_deltas() -> [i64; 5] {
    // 0, 1.5, -1.5, 3, -3 deg/s at 1.5 degrees per level
    [0, 1, -1, 2, -2]
}

fn default_collision_radius() -> f64 {
    500.0
}

impl Default for Quanta {
    fn default() -> Self {
        Self {
            pos: default_pos(),
            heading_deg: default_heading_deg(),
            vel: default_vel(),
            cmd_deltas: default_cmd_deltas(),
            collision_radius: default_collision_radius(),
        }
    }
}

impl Quanta {
    /// Heading-level delta applied by one step under `cmd`.
    #[inline]
    pub fn cmd_delta(&self, cmd: Command) -> i64 {
        self.cmd_deltas[cmd.index()]
    }

    /// Turn rate of `cmd` in radians per second.
    #[inline]
    pub fn turn_rate(&self, cmd: Command) -> f64 {
        (self.cmd_delta(cmd) as f64 * self.heading_deg).to_radians()
    }

    /// Heading quantum in radians.
    #[inline]
    pub fn heading_rad(&self) -> f64 {
        self.heading_deg.to_radians()
    }

    /// Real-valued extent of position cell `q`.
    #[inline]
    pub fn pos_cell(&self, q: i64) -> Bound {
        Bound::new(q as f64 * self.pos, (q + 1) as f64 * self.pos)
    }

    /// Real-valued extent of speed level `q`.
    #[inline]
    pub fn vel_cell(&self, q: i64) -> Bound {
        Bound::new(q as f64 * self.vel, (q + 1) as f64 * self.vel)
    }

    /// Real-valued extent of heading level `q`, in radians.
    #[inline]
    pub fn heading_cell(&self, q: i64) -> Bound {
        let h = self.heading_rad();
        Bound::new(q as f64 * h, (q + 1) as f64 * h)
    }

    /// Whether relative-position cell `(dx, dy)` touches the collision disk.
    ///
    /// Such cells are covered by their own scenario tasks and are never
    /// predecessors.
    pub fn is_init_cell(&self, dx: i64, dy: i64) -> bool {
        let nearest = |cell: Bound| 0.0_f64.clamp(cell.lower, cell.upper);
        let x = nearest(self.pos_cell(dx));
        let y = nearest(self.pos_cell(dy));
        x * x + y * y < self.collision_radius * self.collision_radius
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        if !(self.pos > 0.0 && self.heading_deg > 0.0 && self.vel > 0.0) {
            return Err(BackreachError::InvalidConfig(format!(
                "quanta must be positive (pos={}, heading_deg={}, vel={})",
                self.pos, self.heading_deg, self.vel
            )));
        }
        if !(self.collision_radius >= 0.0) {
            return Err(BackreachError::InvalidConfig(format!(
                "collision radius must be non-negative, got {}",
                self.collision_radius
            )));
        }
        Ok(())
    }
}

/// A quantized relative-position cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QCell {
    pub dx: i64,
    pub dy: i64,
}

impl QCell {
    #[inline]
    pub fn new(dx: i64, dy: i64) -> Self {
        Self { dx, dy }
    }

    /// Cell containing a concrete relative position.
    #[inline]
    pub fn containing(dx: f64, dy: f64, quanta: &Quanta) -> Self {
        Self {
            dx: (dx / quanta.pos).floor() as i64,
            dy: (dy / quanta.pos).floor() as i64,
        }
    }
}

impl fmt::Display for QCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.dx, self.dy)
    }
}

/// The quantized inputs of one decision query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QState {
    pub dx: i64,
    pub dy: i64,
    pub qtheta1: i64,
    pub qv_own: i64,
    pub qv_int: i64,
}

impl QState {
    #[inline]
    pub fn new(cell: QCell, qtheta1: i64, qv_own: i64, qv_int: i64) -> Self {
        Self {
            dx: cell.dx,
            dy: cell.dy,
            qtheta1,
            qv_own,
            qv_int,
        }
    }

    #[inline]
    pub fn cell(&self) -> QCell {
        QCell::new(self.dx, self.dy)
    }
}

impl fmt::Display for QState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}, {})",
            self.dx, self.dy, self.qtheta1, self.qv_own, self.qv_int
        )
    }
}

/// Parameters of one scenario task.
///
/// Own-position intervals are in position quanta, with the intruder at the
/// origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScenarioParams {
    pub initial_command: Command,
    pub x_own: (i64, i64),
    pub y_own: (i64, i64),
    pub qtheta1: i64,
    pub qv_own: i64,
    pub qv_int: i64,
}

impl ScenarioParams {
    /// Check interval ordering and speed levels.
    pub fn validate(&self) -> Result<()> {
        if self.x_own.0 > self.x_own.1 || self.y_own.0 > self.y_own.1 {
            return Err(BackreachError::InvalidScenario(format!(
                "empty own-position interval in {self}"
            )));
        }
        if self.qv_own < 0 || self.qv_int < 0 {
            return Err(BackreachError::InvalidScenario(format!(
                "negative speed level in {self}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ScenarioParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {:?}, {:?}, {}, {}, {})",
            self.initial_command.index(),
            self.x_own,
            self.y_own,
            self.qtheta1,
            self.qv_own,
            self.qv_int
        )
    }
}

/// The controller under analysis: maps the previous advisory and a quantized
/// state to the advisory issued there.
///
/// Implementations must be pure: the same inputs always give the same output.
pub trait DecisionProvider: Sync + Send {
    fn advisory(&self, prev: Command, state: QState) -> Command;
}

impl<F> DecisionProvider for F
where
    F: Fn(Command, QState) -> Command + Sync + Send,
{
    #[inline]
    fn advisory(&self, prev: Command, state: QState) -> Command {
        self(prev, state)
    }
}

/// Error types for backward reachability.
///
/// Everything except `ModelLoad`, `InvalidConfig` and `InvalidScenario`
/// indicates a logic defect and aborts the task.
#[derive(Debug)]
pub enum BackreachError {
    /// A symbolic state was built from an empty polytope.
    InfeasibleState,

    InvalidCommand(usize),

    /// A state was stepped twice.
    AlreadyStepped {
        id: u64,
    },

    /// A directional optimization had no finite optimum.
    Unbounded,

    NumericalInstability(String),

    DimensionMismatch {
        expected: usize,
        got: usize,
    },

    InvalidScenario(String),

    InvalidConfig(String),

    ModelLoad(String),
}

impl fmt::Display for BackreachError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackreachError::InfeasibleState => {
                write!(f, "symbolic state constructed from an infeasible polytope")
            }
            BackreachError::InvalidCommand(code) => {
                write!(f, "command code {} out of range [0, 4]", code)
            }
            BackreachError::AlreadyStepped { id } => {
                write!(f, "state {} was already stepped", id)
            }
            BackreachError::Unbounded => write!(f, "linear program is unbounded"),
            BackreachError::NumericalInstability(s) => write!(f, "Numerical instability: {}", s),
            BackreachError::DimensionMismatch { expected, got } => {
                write!(f, "dimension mismatch: expected {}, got {}", expected, got)
            }
            BackreachError::InvalidScenario(s) => write!(f, "Invalid scenario: {}", s),
            BackreachError::InvalidConfig(s) => write!(f, "Invalid configuration: {}", s),
            BackreachError::ModelLoad(s) => write!(f, "Model loading failed: {}", s),
        }
    }
}

impl std::error::Error for BackreachError {}

pub type Result<T> = std::result::Result<T, BackreachError>;
