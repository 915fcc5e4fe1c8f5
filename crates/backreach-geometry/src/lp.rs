//! Dense two-phase simplex for small linear programs.
//!
//! Solves
//!
//! ```text
//! minimize    c · x
//! subject to  A x <= b,   x free
//! ```
//!
//! Free variables are split as `x = x⁺ - x⁻`, every row gets a slack, and rows
//! with a negative right-hand side get an artificial variable for phase 1.
//! Pivoting uses Bland's rule, so the method terminates on degenerate
//! problems. The programs built by the search are tiny (a handful of
//! variables, a few dozen rows), so a dense tableau is the right shape.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use tracing::trace;

/// Pivot and reduced-cost tolerance.
const EPS: f64 = 1e-9;

/// Relative tolerance on the phase-1 objective.
const FEAS_TOL: f64 = 1e-7;

/// Iteration cap per phase.
const MAX_PIVOTS: usize = 50_000;

/// Outcome of a linear program.
#[derive(Debug, Clone, PartialEq)]
pub enum LpOutcome {
    /// Optimal point and objective value.
    Optimal { x: Array1<f64>, value: f64 },
    Infeasible,
    Unbounded,
    /// Pivot limit reached; the tableau is cycling or badly conditioned.
    IterationLimit,
}

enum Phase {
    Optimal,
    Unbounded,
    IterationLimit,
}

struct Tableau {
    /// Constraint rows followed by the reduced-cost row; last column is the rhs.
    t: Array2<f64>,
    basis: Vec<usize>,
    m: usize,
    rhs_col: usize,
}

impl Tableau {
    fn pivot(&mut self, row: usize, col: usize) {
        let p = self.t[[row, col]];
        self.t.row_mut(row).mapv_inplace(|v| v / p);
        let pivot_row = self.t.row(row).to_owned();
        for r in 0..=self.m {
            if r == row {
                continue;
            }
            let factor = self.t[[r, col]];
            if factor != 0.0 {
                self.t
                    .row_mut(r)
                    .scaled_add(-factor, &pivot_row);
                // Keep the pivot column exactly canonical
                self.t[[r, col]] = 0.0;
            }
        }
        self.basis[row] = col;
    }

    /// Load a cost vector into the reduced-cost row for the current basis.
    fn price(&mut self, cost: &[f64]) {
        let m = self.m;
        let mut obj = Array1::<f64>::zeros(self.rhs_col + 1);
        for (j, &c) in cost.iter().enumerate() {
            obj[j] = c;
        }
        for i in 0..m {
            let cb = cost[self.basis[i]];
            if cb != 0.0 {
                obj.scaled_add(-cb, &self.t.row(i));
            }
        }
        self.t.row_mut(m).assign(&obj);
    }

    /// Run primal simplex with Bland's rule over the allowed entering columns.
    fn optimize(&mut self, allowed: usize) -> Phase {
        let m = self.m;
        for _ in 0..MAX_PIVOTS {
            let entering = (0..allowed).find(|&j| self.t[[m, j]] < -EPS);
            let Some(col) = entering else {
                return Phase::Optimal;
            };

            let mut leave: Option<(usize, f64)> = None;
            for i in 0..m {
                let a = self.t[[i, col]];
                if a > EPS {
                    let ratio = self.t[[i, self.rhs_col]] / a;
                    leave = match leave {
                        None => Some((i, ratio)),
                        Some((best, best_ratio)) => {
                            if ratio < best_ratio - EPS
                                || (ratio <= best_ratio + EPS && self.basis[i] < self.basis[best])
                            {
                                Some((i, ratio))
                            } else {
                                Some((best, best_ratio))
                            }
                        }
                    };
                }
            }

            match leave {
                Some((row, _)) => self.pivot(row, col),
                None => return Phase::Unbounded,
            }
        }
        Phase::IterationLimit
    }
}

/// Minimize `c · x` subject to `a x <= b` with free `x`.
pub fn minimize(c: ArrayView1<f64>, a: ArrayView2<f64>, b: ArrayView1<f64>) -> LpOutcome {
    let n = a.ncols();
    debug_assert_eq!(c.len(), n);
    debug_assert_eq!(b.len(), a.nrows());

    // Normalize rows by their largest coefficient; drop all-zero rows.
    let mut rows: Vec<(Array1<f64>, f64)> = Vec::with_capacity(a.nrows());
    let scale_b = b.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    for (row, &rhs) in a.outer_iter().zip(b.iter()) {
        let norm = row.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if norm <= EPS {
            if rhs < -FEAS_TOL * (1.0 + scale_b) {
                return LpOutcome::Infeasible;
            }
            continue;
        }
        rows.push((row.mapv(|v| v / norm), rhs / norm));
    }

    let m = rows.len();
    let num_art = rows.iter().filter(|(_, rhs)| *rhs < 0.0).count();
    let slack0 = 2 * n;
    let art0 = slack0 + m;
    let rhs_col = art0 + num_art;

    let mut t = Array2::<f64>::zeros((m + 1, rhs_col + 1));
    let mut basis = vec![0; m];
    let mut next_art = art0;
    for (i, (row, rhs)) in rows.iter().enumerate() {
        let sign = if *rhs < 0.0 { -1.0 } else { 1.0 };
        for j in 0..n {
            t[[i, j]] = sign * row[j];
            t[[i, n + j]] = -sign * row[j];
        }
        t[[i, slack0 + i]] = sign;
        t[[i, rhs_col]] = sign * rhs;
        if sign < 0.0 {
            t[[i, next_art]] = 1.0;
            basis[i] = next_art;
            next_art += 1;
        } else {
            basis[i] = slack0 + i;
        }
    }

    let mut tab = Tableau {
        t,
        basis,
        m,
        rhs_col,
    };

    // Phase 1: drive the artificials to zero.
    if num_art > 0 {
        let mut cost = vec![0.0; rhs_col];
        for c in cost.iter_mut().skip(art0) {
            *c = 1.0;
        }
        tab.price(&cost);
        match tab.optimize(rhs_col) {
            Phase::Optimal => {}
            // The phase-1 objective is bounded below by zero; anything else is numerical.
            Phase::Unbounded | Phase::IterationLimit => return LpOutcome::IterationLimit,
        }
        let infeasibility = -tab.t[[m, rhs_col]];
        let scale = rows.iter().fold(1.0_f64, |acc, (_, r)| acc.max(r.abs()));
        if infeasibility > FEAS_TOL * scale {
            trace!("LP infeasible: phase-1 residual {:.3e}", infeasibility);
            return LpOutcome::Infeasible;
        }

        // Pivot remaining artificials out of the basis where possible.
        for i in 0..m {
            if tab.basis[i] >= art0 {
                if let Some(col) = (0..art0).find(|&j| tab.t[[i, j]].abs() > EPS) {
                    tab.pivot(i, col);
                }
            }
        }
    }

    // Phase 2: the real objective, artificials may not re-enter.
    let mut cost = vec![0.0; rhs_col];
    for j in 0..n {
        cost[j] = c[j];
        cost[n + j] = -c[j];
    }
    tab.price(&cost);
    match tab.optimize(art0) {
        Phase::Optimal => {}
        Phase::Unbounded => return LpOutcome::Unbounded,
        Phase::IterationLimit => return LpOutcome::IterationLimit,
    }

    let mut x = Array1::<f64>::zeros(n);
    for i in 0..m {
        let var = tab.basis[i];
        let val = tab.t[[i, rhs_col]];
        if var < n {
            x[var] += val;
        } else if var < 2 * n {
            x[var - n] -= val;
        }
    }
    let value = c.dot(&x);
    LpOutcome::Optimal { x, value }
}

/// Find any point of `a x <= b`.
pub fn feasible_point(a: ArrayView2<f64>, b: ArrayView1<f64>) -> LpOutcome {
    let c = Array1::<f64>::zeros(a.ncols());
    minimize(c.view(), a, b)
}

/// Chebyshev center of `a x <= b`: the center and radius of the largest
/// inscribed ball.
///
/// Returns `Infeasible` for empty regions; a flat but non-empty region gives
/// radius zero.
pub fn chebyshev_center(a: ArrayView2<f64>, b: ArrayView1<f64>) -> Result<(Array1<f64>, f64), LpOutcome> {
    let n = a.ncols();
    let m = a.nrows();

    // Variables (x, r): a_i x + |a_i| r <= b_i and -r <= 0.
    let mut ext = Array2::<f64>::zeros((m + 1, n + 1));
    let mut rhs = Array1::<f64>::zeros(m + 1);
    for i in 0..m {
        let row = a.row(i);
        let norm = row.dot(&row).sqrt();
        ext.row_mut(i).slice_mut(ndarray::s![..n]).assign(&row);
        ext[[i, n]] = norm;
        rhs[i] = b[i];
    }
    ext[[m, n]] = -1.0;

    let mut c = Array1::<f64>::zeros(n + 1);
    c[n] = -1.0;

    match minimize(c.view(), ext.view(), rhs.view()) {
        LpOutcome::Optimal { x, .. } => {
            let radius = x[n].max(0.0);
            Ok((x.slice(ndarray::s![..n]).to_owned(), radius))
        }
        other => Err(other),
    }
}
