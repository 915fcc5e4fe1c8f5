//! Enumeration of initial scenarios.
//!
//! A scenario fixes the initial advisory, the heading and speed levels, and
//! an own-position cell whose relative position to the intruder (at the
//! origin) is a collision cell. The full space is large, so scenarios are
//! decoded from their index on demand instead of being materialized.

use backreach_core::{BackreachError, Command, QCell, Quanta, Result, ScenarioParams};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioGrid {
    /// Heading levels `0..heading_levels`.
    #[serde(default = "default_heading_levels")]
    pub heading_levels: i64,
    /// Inclusive own speed levels.
    #[serde(default = "default_own_speed_levels")]
    pub own_speed_levels: (i64, i64),
    /// Inclusive intruder speed levels.
    #[serde(default = "default_int_speed_levels")]
    pub int_speed_levels: (i64, i64),
    /// Initial advisories.
    #[serde(default = "default_commands")]
    pub commands: Vec<Command>,
}

fn default_heading_levels() -> i64 {
    240
}

fn default_own_speed_levels() -> (i64, i64) {
    // 100 to 1200 ft/s
    (1, 11)
}

fn default_int_speed_levels() -> (i64, i64) {
    (0, 11)
}

fn default_commands() -> Vec<Command> {
    Command::ALL.to_vec()
}

impl Default for ScenarioGrid {
    fn default() -> Self {
        Self {
            heading_levels: default_heading_levels(),
            own_speed_levels: default_own_speed_levels(),
            int_speed_levels: default_int_speed_levels(),
            commands: default_commands(),
        }
    }
}

impl ScenarioGrid {
    pub fn validate(&self) -> Result<()> {
        if self.heading_levels <= 0 {
            return Err(BackreachError::InvalidConfig(format!(
                "heading_levels must be positive, got {}",
                self.heading_levels
            )));
        }
        for (name, (lo, hi)) in [
            ("own_speed_levels", self.own_speed_levels),
            ("int_speed_levels", self.int_speed_levels),
        ] {
            if lo < 0 || lo > hi {
                return Err(BackreachError::InvalidConfig(format!(
                    "{name} must be a non-empty non-negative range, got ({lo}, {hi})"
                )));
            }
        }
        if self.commands.is_empty() {
            return Err(BackreachError::InvalidConfig(
                "at least one initial command is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Collision cells, `dx` outer and `dy` inner.
    pub fn init_cells(quanta: &Quanta) -> Vec<QCell> {
        let reach = (quanta.collision_radius / quanta.pos).ceil() as i64 + 1;
        let mut cells = Vec::new();
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                if quanta.is_init_cell(dx, dy) {
                    cells.push(QCell::new(dx, dy));
                }
            }
        }
        cells
    }

    /// Index the scenario space.
    pub fn space(&self, quanta: &Quanta) -> Result<ScenarioSpace> {
        self.validate()?;
        quanta.validate()?;
        let cells = Self::init_cells(quanta);
        if cells.is_empty() {
            return Err(BackreachError::InvalidConfig(
                "collision radius covers no cells".to_string(),
            ));
        }
        Ok(ScenarioSpace {
            grid: self.clone(),
            cells,
        })
    }
}

/// Indexed view of a [`ScenarioGrid`].
///
/// Index order, slowest to fastest: initial command, own speed, intruder
/// speed, heading level, collision cell.
#[derive(Debug, Clone)]
pub struct ScenarioSpace {
    grid: ScenarioGrid,
    cells: Vec<QCell>,
}

impl ScenarioSpace {
    fn radices(&self) -> [usize; 5] {
        let g = &self.grid;
        [
            g.commands.len(),
            (g.own_speed_levels.1 - g.own_speed_levels.0 + 1) as usize,
            (g.int_speed_levels.1 - g.int_speed_levels.0 + 1) as usize,
            g.heading_levels as usize,
            self.cells.len(),
        ]
    }

    pub fn len(&self) -> usize {
        self.radices().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cells(&self) -> &[QCell] {
        &self.cells
    }

    /// Scenario at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<ScenarioParams> {
        if index >= self.len() {
            return None;
        }
        let radices = self.radices();
        let mut digits = [0usize; 5];
        let mut rest = index;
        for (digit, radix) in digits.iter_mut().zip(radices.iter()).rev() {
            *digit = rest % radix;
            rest /= radix;
        }
        let [cmd, v_own, v_int, theta, cell] = digits;
        let g = &self.grid;
        let cell = self.cells[cell];
        // Own position is the negated relative position: dx in [q, q+1] ⇔ x_own in [-q-1, -q]
        Some(ScenarioParams {
            initial_command: g.commands[cmd],
            x_own: (-cell.dx - 1, -cell.dx),
            y_own: (-cell.dy - 1, -cell.dy),
            qtheta1: theta as i64,
            qv_own: g.own_speed_levels.0 + v_own as i64,
            qv_int: g.int_speed_levels.0 + v_int as i64,
        })
    }

    /// Index of `params`, if it lies in the space.
    pub fn index_of(&self, params: &ScenarioParams) -> Option<usize> {
        let g = &self.grid;
        let cmd = g.commands.iter().position(|&c| c == params.initial_command)?;
        let cell = QCell::new(-params.x_own.1, -params.y_own.1);
        if params.x_own.0 != params.x_own.1 - 1 || params.y_own.0 != params.y_own.1 - 1 {
            return None;
        }
        let cell = self.cells.iter().position(|&c| c == cell)?;
        let in_range = |v: i64, (lo, hi): (i64, i64)| (lo..=hi).contains(&v).then(|| (v - lo) as usize);
        let v_own = in_range(params.qv_own, g.own_speed_levels)?;
        let v_int = in_range(params.qv_int, g.int_speed_levels)?;
        let theta = in_range(params.qtheta1, (0, g.heading_levels - 1))?;

        let radices = self.radices();
        let digits = [cmd, v_own, v_int, theta, cell];
        Some(
            digits
                .iter()
                .zip(radices.iter())
                .fold(0usize, |acc, (d, r)| acc * r + d),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, ScenarioParams)> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i).map(|p| (i, p)))
    }
}
