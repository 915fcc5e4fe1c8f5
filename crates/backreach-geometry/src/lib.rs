//! Geometry for backward reachability.
//!
//! A region is a convex polytope over domain variables, observed through an
//! affine map into range (state) coordinates. The search only needs a handful
//! of queries from it:
//!
//! - a witness point (Chebyshev center) and emptiness,
//! - directional extremes in range coordinates,
//! - adding half-spaces stated in range coordinates,
//! - composing the range map with a linear transform.

pub mod lp;
pub mod polytope;

pub use lp::LpOutcome;
pub use polytope::Polytope;

use backreach_core::{layout, BackreachError, Bound, QCell, Quanta, Result};
use ndarray::{Array1, Array2, ArrayView1};

/// Region queries used by the search engine.
pub trait Geometry: Clone {
    /// Number of range coordinates.
    fn range_dim(&self) -> usize;

    /// Some domain point inside the region, or `None` if the region is empty.
    fn witness(&self) -> Result<Option<Array1<f64>>>;

    /// Center and radius of the largest ball inside the region (domain coordinates).
    fn chebyshev_center(&self) -> Result<Option<(Array1<f64>, f64)>>;

    /// Range point minimizing `direction · y` over the region.
    fn minimize(&self, direction: ArrayView1<f64>) -> Result<Array1<f64>>;

    /// Range point maximizing `direction · y` over the region.
    fn maximize(&self, direction: ArrayView1<f64>) -> Result<Array1<f64>> {
        let neg = direction.mapv(|v| -v);
        self.minimize(neg.view())
    }

    /// Map a domain point into range coordinates.
    fn domain_to_range(&self, x: ArrayView1<f64>) -> Result<Array1<f64>>;

    /// Intersect with the half-space `row · y <= rhs` in range coordinates.
    fn add_range_constraint(&mut self, row: ArrayView1<f64>, rhs: f64) -> Result<()>;

    /// Replace the range map `y` by `mat · y`.
    fn transform_range(&mut self, mat: &Array2<f64>) -> Result<()>;

    /// Interval of `direction · y` over the region.
    fn range_bound(&self, direction: ArrayView1<f64>) -> Result<Bound> {
        let lo = direction.dot(&self.minimize(direction)?);
        let hi = direction.dot(&self.maximize(direction)?);
        if lo > hi {
            // Round-off on a flat region
            return Ok(Bound::concrete(0.5 * (lo + hi)));
        }
        Ok(Bound::new(lo, hi))
    }

    /// Copy of the region restricted to one relative-position cell.
    ///
    /// The result may be empty; check it with [`Geometry::witness`].
    fn restrict_to_cell(&self, cell: QCell, quanta: &Quanta) -> Result<Self> {
        if self.range_dim() != layout::NUM_VARS {
            return Err(BackreachError::DimensionMismatch {
                expected: layout::NUM_VARS,
                got: self.range_dim(),
            });
        }
        let dx = Array1::from(layout::dx_direction().to_vec());
        let dy = Array1::from(layout::dy_direction().to_vec());
        let x_cell = quanta.pos_cell(cell.dx);
        let y_cell = quanta.pos_cell(cell.dy);

        let mut restricted = self.clone();
        restricted.add_range_constraint(dx.view(), x_cell.upper)?;
        restricted.add_range_constraint((-&dx).view(), -x_cell.lower)?;
        restricted.add_range_constraint(dy.view(), y_cell.upper)?;
        restricted.add_range_constraint((-&dy).view(), -y_cell.lower)?;
        Ok(restricted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn state_box(x_own: (f64, f64), y_own: (f64, f64), x_int: (f64, f64)) -> Polytope {
        Polytope::from_box(&[x_own, y_own, (0.0, 1.0), (0.0, 1.0), x_int, (0.0, 1.0)]).unwrap()
    }

    #[test]
    fn test_restrict_to_cell_bounds() {
        let quanta = Quanta::default();
        let p = state_box((-350.0, -150.0), (-420.0, -250.0), (-10.0, 10.0));
        let dx = Array1::from(layout::dx_direction().to_vec());

        let cell = QCell::new(2, 3);
        let r = p.restrict_to_cell(cell, &quanta).unwrap();
        let b = r.range_bound(dx.view()).unwrap();
        assert!(b.lower >= 200.0 - 1e-6 && b.upper <= 300.0 + 1e-6);

        // Outside the region
        let r = p.restrict_to_cell(QCell::new(20, 3), &quanta).unwrap();
        assert!(r.witness().unwrap().is_none());
    }

    #[test]
    fn test_restrict_requires_state_layout() {
        let p = Polytope::from_box(&[(0.0, 1.0)]).unwrap();
        assert!(p.restrict_to_cell(QCell::new(0, 0), &Quanta::default()).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_cell_witness_inside_cell(
            x_lo in -800.0f64..0.0, x_w in 50.0f64..600.0,
            y_lo in -800.0f64..0.0, y_w in 50.0f64..600.0,
            cdx in -8i64..10, cdy in -8i64..10,
        ) {
            let quanta = Quanta::default();
            let p = state_box((x_lo, x_lo + x_w), (y_lo, y_lo + y_w), (0.0, 0.0));
            let r = p.restrict_to_cell(QCell::new(cdx, cdy), &quanta).unwrap();
            if let Some(w) = r.witness().unwrap() {
                let pt = r.domain_to_range(w.view()).unwrap();
                let (dx, dy) = layout::relative_position(pt.as_slice().unwrap());
                let tol = 1e-6;
                prop_assert!(dx >= cdx as f64 * 100.0 - tol && dx <= (cdx + 1) as f64 * 100.0 + tol);
                prop_assert!(dy >= cdy as f64 * 100.0 - tol && dy <= (cdy + 1) as f64 * 100.0 + tol);
                prop_assert!(p.contains_domain(w.view(), 1e-6));
            }
        }

        #[test]
        fn prop_range_bound_brackets_witness(
            lo in -100.0f64..100.0, w in 0.0f64..50.0,
            c0 in -2.0f64..2.0, c1 in -2.0f64..2.0,
        ) {
            let p = Polytope::from_box(&[(lo, lo + w), (-lo, -lo + w)]).unwrap();
            let dir = Array1::from(vec![c0, c1]);
            let b = p.range_bound(dir.view()).unwrap();
            let wit = p.witness().unwrap().unwrap();
            let v = dir.dot(&p.domain_to_range(wit.view()).unwrap());
            prop_assert!(v >= b.lower - 1e-6 && v <= b.upper + 1e-6);
        }
    }
}
