//! H-polytope over domain variables with an affine map into range coordinates.

use crate::lp::{self, LpOutcome};
use crate::Geometry;
use backreach_core::{BackreachError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// `{ x : constraints · x <= rhs }` together with the map `x ↦ a_mat · x + b_vec`.
///
/// Constraints are stated over the domain. Range constraints are pulled back
/// through the map when added, so the domain never changes dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Polytope {
    constraints: Array2<f64>,
    rhs: Array1<f64>,
    a_mat: Array2<f64>,
    b_vec: Array1<f64>,
}

impl Polytope {
    /// Create a polytope from domain constraints and an affine range map.
    pub fn new(
        constraints: Array2<f64>,
        rhs: Array1<f64>,
        a_mat: Array2<f64>,
        b_vec: Array1<f64>,
    ) -> Result<Self> {
        let dim = constraints.ncols();
        if rhs.len() != constraints.nrows() {
            return Err(BackreachError::DimensionMismatch {
                expected: constraints.nrows(),
                got: rhs.len(),
            });
        }
        if a_mat.ncols() != dim {
            return Err(BackreachError::DimensionMismatch {
                expected: dim,
                got: a_mat.ncols(),
            });
        }
        if b_vec.len() != a_mat.nrows() {
            return Err(BackreachError::DimensionMismatch {
                expected: a_mat.nrows(),
                got: b_vec.len(),
            });
        }
        Ok(Self {
            constraints,
            rhs,
            a_mat,
            b_vec,
        })
    }

    /// Axis-aligned box with the identity range map.
    pub fn from_box(bounds: &[(f64, f64)]) -> Result<Self> {
        let dim = bounds.len();
        let mut constraints = Array2::<f64>::zeros((2 * dim, dim));
        let mut rhs = Array1::<f64>::zeros(2 * dim);
        for (i, &(lo, hi)) in bounds.iter().enumerate() {
            constraints[[2 * i, i]] = 1.0;
            rhs[2 * i] = hi;
            constraints[[2 * i + 1, i]] = -1.0;
            rhs[2 * i + 1] = -lo;
        }
        Self::new(
            constraints,
            rhs,
            Array2::eye(dim),
            Array1::zeros(dim),
        )
    }

    pub fn constraints(&self) -> &Array2<f64> {
        &self.constraints
    }

    pub fn rhs(&self) -> &Array1<f64> {
        &self.rhs
    }

    pub fn a_mat(&self) -> &Array2<f64> {
        &self.a_mat
    }

    pub fn b_vec(&self) -> &Array1<f64> {
        &self.b_vec
    }

    pub fn domain_dim(&self) -> usize {
        self.constraints.ncols()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.nrows()
    }

    /// Add a domain constraint `row · x <= rhs`.
    pub fn add_domain_constraint(&mut self, row: ArrayView1<f64>, rhs: f64) -> Result<()> {
        if row.len() != self.domain_dim() {
            return Err(BackreachError::DimensionMismatch {
                expected: self.domain_dim(),
                got: row.len(),
            });
        }
        self.constraints
            .push_row(row)
            .map_err(|e| BackreachError::NumericalInstability(e.to_string()))?;
        self.rhs
            .append(Axis(0), Array1::from_elem(1, rhs).view())
            .map_err(|e| BackreachError::NumericalInstability(e.to_string()))?;
        Ok(())
    }

    /// Whether a domain point satisfies every constraint within `tol`.
    pub fn contains_domain(&self, x: ArrayView1<f64>, tol: f64) -> bool {
        self.constraints
            .dot(&x)
            .iter()
            .zip(self.rhs.iter())
            .all(|(lhs, rhs)| *lhs <= rhs + tol)
    }

    fn solve(&self, domain_cost: ArrayView1<f64>) -> Result<Array1<f64>> {
        match lp::minimize(domain_cost, self.constraints.view(), self.rhs.view()) {
            LpOutcome::Optimal { x, .. } => Ok(x),
            LpOutcome::Infeasible => Err(BackreachError::InfeasibleState),
            LpOutcome::Unbounded => Err(BackreachError::Unbounded),
            LpOutcome::IterationLimit => Err(BackreachError::NumericalInstability(
                "simplex pivot limit reached".to_string(),
            )),
        }
    }

    fn check_range_dim(&self, len: usize) -> Result<()> {
        if len != self.range_dim() {
            return Err(BackreachError::DimensionMismatch {
                expected: self.range_dim(),
                got: len,
            });
        }
        Ok(())
    }
}

impl Geometry for Polytope {
    fn range_dim(&self) -> usize {
        self.a_mat.nrows()
    }

    fn witness(&self) -> Result<Option<Array1<f64>>> {
        Ok(self.chebyshev_center()?.map(|(center, _)| center))
    }

    fn chebyshev_center(&self) -> Result<Option<(Array1<f64>, f64)>> {
        match lp::chebyshev_center(self.constraints.view(), self.rhs.view()) {
            Ok(found) => Ok(Some(found)),
            Err(LpOutcome::Infeasible) => Ok(None),
            // An unbounded radius still means the region is non-empty.
            Err(LpOutcome::Unbounded) => match lp::feasible_point(self.constraints.view(), self.rhs.view()) {
                LpOutcome::Optimal { x, .. } => Ok(Some((x, f64::INFINITY))),
                LpOutcome::Infeasible => Ok(None),
                _ => Err(BackreachError::NumericalInstability(
                    "no feasible point for unbounded region".to_string(),
                )),
            },
            Err(_) => Err(BackreachError::NumericalInstability(
                "Chebyshev center LP did not converge".to_string(),
            )),
        }
    }

    fn minimize(&self, direction: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_range_dim(direction.len())?;
        let domain_cost = direction.dot(&self.a_mat);
        let x = self.solve(domain_cost.view())?;
        self.domain_to_range(x.view())
    }

    fn domain_to_range(&self, x: ArrayView1<f64>) -> Result<Array1<f64>> {
        if x.len() != self.domain_dim() {
            return Err(BackreachError::DimensionMismatch {
                expected: self.domain_dim(),
                got: x.len(),
            });
        }
        Ok(self.a_mat.dot(&x) + &self.b_vec)
    }

    fn add_range_constraint(&mut self, row: ArrayView1<f64>, rhs: f64) -> Result<()> {
        self.check_range_dim(row.len())?;
        // row · (A x + b) <= rhs  ⇔  (row · A) x <= rhs - row · b
        let pulled = row.dot(&self.a_mat);
        let shifted = rhs - row.dot(&self.b_vec);
        self.add_domain_constraint(pulled.view(), shifted)
    }

    fn transform_range(&mut self, mat: &Array2<f64>) -> Result<()> {
        if mat.ncols() != self.range_dim() {
            return Err(BackreachError::DimensionMismatch {
                expected: self.range_dim(),
                got: mat.ncols(),
            });
        }
        self.a_mat = mat.dot(&self.a_mat);
        self.b_vec = mat.dot(&self.b_vec);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_new_dimension_checks() {
        let c = arr2(&[[1.0, 0.0]]);
        assert!(Polytope::new(c.clone(), arr1(&[1.0, 2.0]), Array2::eye(2), Array1::zeros(2)).is_err());
        assert!(Polytope::new(c.clone(), arr1(&[1.0]), Array2::eye(3), Array1::zeros(3)).is_err());
        assert!(Polytope::new(c.clone(), arr1(&[1.0]), Array2::eye(2), Array1::zeros(3)).is_err());
        assert!(Polytope::new(c, arr1(&[1.0]), Array2::eye(2), Array1::zeros(2)).is_ok());
    }

    #[test]
    fn test_box_witness_and_extremes() {
        let p = Polytope::from_box(&[(-1.0, 3.0), (2.0, 4.0)]).unwrap();
        let w = p.witness().unwrap().unwrap();
        assert!(p.contains_domain(w.view(), 1e-9));

        let lo = p.minimize(arr1(&[1.0, 0.0]).view()).unwrap();
        assert!((lo[0] + 1.0).abs() < 1e-9);
        let hi = p.maximize(arr1(&[0.0, 1.0]).view()).unwrap();
        assert!((hi[1] - 4.0).abs() < 1e-9);

        let b = p.range_bound(arr1(&[1.0, 1.0]).view()).unwrap();
        assert!((b.lower - 1.0).abs() < 1e-9);
        assert!((b.upper - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_transform_then_range_constraint() {
        // Domain [0,1]^2, range map shifts by (10, 0) and swaps axes
        let mut p = Polytope::from_box(&[(0.0, 1.0), (0.0, 1.0)]).unwrap();
        p.transform_range(&arr2(&[[0.0, 1.0], [1.0, 0.0]])).unwrap();
        p.b_vec = arr1(&[10.0, 0.0]);

        let b = p.range_bound(arr1(&[1.0, 0.0]).view()).unwrap();
        assert!((b.lower - 10.0).abs() < 1e-9 && (b.upper - 11.0).abs() < 1e-9);

        // range[0] <= 10.25 means domain y <= 0.25
        p.add_range_constraint(arr1(&[1.0, 0.0]).view(), 10.25).unwrap();
        let b = p.range_bound(arr1(&[1.0, 0.0]).view()).unwrap();
        assert!((b.upper - 10.25).abs() < 1e-9);
        assert_eq!(p.num_constraints(), 5);
        assert_eq!(p.domain_dim(), 2);
    }

    #[test]
    fn test_infeasible_after_constraint() {
        let mut p = Polytope::from_box(&[(0.0, 1.0)]).unwrap();
        p.add_range_constraint(arr1(&[1.0]).view(), -0.5).unwrap();
        assert!(p.witness().unwrap().is_none());
        assert!(matches!(
            p.minimize(arr1(&[1.0]).view()),
            Err(BackreachError::InfeasibleState)
        ));
    }

    #[test]
    fn test_dimension_mismatch_errors() {
        let mut p = Polytope::from_box(&[(0.0, 1.0), (0.0, 1.0)]).unwrap();
        assert!(p.minimize(arr1(&[1.0]).view()).is_err());
        assert!(p.add_range_constraint(arr1(&[1.0, 0.0, 0.0]).view(), 1.0).is_err());
        assert!(p.transform_range(&Array2::eye(3)).is_err());
        assert!(p.domain_to_range(arr1(&[0.5]).view()).is_err());
    }

    #[test]
    fn test_unbounded_direction() {
        // x >= 0 only
        let p = Polytope::new(arr2(&[[-1.0]]), arr1(&[0.0]), Array2::eye(1), Array1::zeros(1)).unwrap();
        assert!(matches!(
            p.maximize(arr1(&[1.0]).view()),
            Err(BackreachError::Unbounded)
        ));
        assert!(p.witness().unwrap().is_some());
    }
}
