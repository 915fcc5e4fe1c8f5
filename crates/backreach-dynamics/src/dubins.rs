//! Constant-turn-rate (Dubins) ownship with a straight-flying intruder.
//!
//! Under advisory `cmd` the ownship velocity rotates at `w = turn_rate(cmd)`
//! and the intruder keeps its velocity along +x. Both are linear ODEs, so one
//! step of `dt` seconds is an exact 6x6 matrix.

use crate::Dynamics;
use backreach_core::layout::{NUM_VARS, VX_INT, VX_OWN, VY_OWN, X_INT, X_OWN, Y_OWN};
use backreach_core::{Command, Quanta, Result, ScenarioParams};
use backreach_geometry::Polytope;
use ndarray::{Array1, Array2};
use tracing::trace;

/// Domain variables of the initial region: the intruder starts at `x_int = 0`.
const DOMAIN_DIM: usize = 5;
const D_X_OWN: usize = 0;
const D_Y_OWN: usize = 1;
const D_VX_OWN: usize = 2;
const D_VY_OWN: usize = 3;
const D_VX_INT: usize = 4;

/// Dubins dynamics with the one-second maps precomputed.
#[derive(Debug, Clone)]
pub struct DubinsDynamics {
    quanta: Quanta,
    forward: Vec<Array2<f64>>,
    backward: Vec<Array2<f64>>,
}

impl DubinsDynamics {
    pub fn new(quanta: Quanta) -> Self {
        let forward = Command::ALL
            .iter()
            .map(|&cmd| elapse_matrix(quanta.turn_rate(cmd), 1.0))
            .collect();
        let backward = Command::ALL
            .iter()
            .map(|&cmd| elapse_matrix(quanta.turn_rate(cmd), -1.0))
            .collect();
        Self {
            quanta,
            forward,
            backward,
        }
    }

    pub fn quanta(&self) -> &Quanta {
        &self.quanta
    }
}

/// Exact flow of `p' = v, v' = w J v` (ownship) and `x_int' = vx_int` for `dt` seconds.
fn elapse_matrix(w: f64, dt: f64) -> Array2<f64> {
    let mut mat = Array2::<f64>::eye(NUM_VARS);

    if w == 0.0 {
        mat[[X_OWN, VX_OWN]] = dt;
        mat[[Y_OWN, VY_OWN]] = dt;
    } else {
        let (s, c) = (w * dt).sin_cos();
        mat[[X_OWN, VX_OWN]] = s / w;
        mat[[X_OWN, VY_OWN]] = -(1.0 - c) / w;
        mat[[Y_OWN, VX_OWN]] = (1.0 - c) / w;
        mat[[Y_OWN, VY_OWN]] = s / w;

        mat[[VX_OWN, VX_OWN]] = c;
        mat[[VX_OWN, VY_OWN]] = -s;
        mat[[VY_OWN, VX_OWN]] = s;
        mat[[VY_OWN, VY_OWN]] = c;
    }

    mat[[X_INT, VX_INT]] = dt;
    mat
}

impl Dynamics for DubinsDynamics {
    /// Over-approximate the scenario's initial set.
    ///
    /// Own position is a box in position quanta; own velocity is the annular
    /// sector between headings `[qtheta1, qtheta1 + 1]` and speeds
    /// `[qv_own, qv_own + 1]`, relaxed to four half-planes (two heading rays,
    /// the outer tangent and the inner chord); intruder speed is an interval.
    fn init_polytope(&self, params: &ScenarioParams) -> Result<Polytope> {
        params.validate()?;
        let q = &self.quanta;

        let mut rows: Vec<([f64; DOMAIN_DIM], f64)> = Vec::with_capacity(10);
        let mut push_interval = |var: usize, lo: f64, hi: f64| {
            let mut upper = [0.0; DOMAIN_DIM];
            upper[var] = 1.0;
            rows.push((upper, hi));
            let mut lower = [0.0; DOMAIN_DIM];
            lower[var] = -1.0;
            rows.push((lower, -lo));
        };

        push_interval(
            D_X_OWN,
            params.x_own.0 as f64 * q.pos,
            params.x_own.1 as f64 * q.pos,
        );
        push_interval(
            D_Y_OWN,
            params.y_own.0 as f64 * q.pos,
            params.y_own.1 as f64 * q.pos,
        );
        let v_int = q.vel_cell(params.qv_int);
        push_interval(D_VX_INT, v_int.lower, v_int.upper);

        let heading = q.heading_cell(params.qtheta1);
        let speed = q.vel_cell(params.qv_own);
        let (s0, c0) = heading.lower.sin_cos();
        let (s1, c1) = heading.upper.sin_cos();
        let (sm, cm) = (0.5 * (heading.lower + heading.upper)).sin_cos();
        let half = 0.5 * heading.width();

        let mut vel_row = |ax: f64, ay: f64, rhs: f64| {
            let mut row = [0.0; DOMAIN_DIM];
            row[D_VX_OWN] = ax;
            row[D_VY_OWN] = ay;
            rows.push((row, rhs));
        };
        // Left of the lower heading ray
        vel_row(s0, -c0, 0.0);
        // Right of the upper heading ray
        vel_row(-s1, c1, 0.0);
        // Outer tangent at the mid heading
        vel_row(cm, sm, speed.upper);
        // Inner chord
        vel_row(-cm, -sm, -speed.lower * half.cos());

        let mut constraints = Array2::<f64>::zeros((rows.len(), DOMAIN_DIM));
        let mut rhs = Array1::<f64>::zeros(rows.len());
        for (i, (row, b)) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                constraints[[i, j]] = v;
            }
            rhs[i] = *b;
        }

        let mut a_mat = Array2::<f64>::zeros((NUM_VARS, DOMAIN_DIM));
        a_mat[[X_OWN, D_X_OWN]] = 1.0;
        a_mat[[Y_OWN, D_Y_OWN]] = 1.0;
        a_mat[[VX_OWN, D_VX_OWN]] = 1.0;
        a_mat[[VY_OWN, D_VY_OWN]] = 1.0;
        a_mat[[VX_INT, D_VX_INT]] = 1.0;

        trace!("initial polytope for {} has {} constraints", params, rows.len());
        Polytope::new(constraints, rhs, a_mat, Array1::zeros(NUM_VARS))
    }

    fn time_elapse_mat(&self, cmd: Command, dt: f64) -> Array2<f64> {
        if dt == 1.0 {
            self.forward[cmd.index()].clone()
        } else if dt == -1.0 {
            self.backward[cmd.index()].clone()
        } else {
            elapse_matrix(self.quanta.turn_rate(cmd), dt)
        }
    }
}
