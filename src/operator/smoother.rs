//! Relaxation on one MG level
//!
//! Two smoothers share the cached diagonal:
//! - `smooth_exact`: red-black Gauss-Seidel, colored by the parity of the
//!   index sum, residual recomputed before each color
//! - `smooth`: weighted Jacobi with weight 2/3

use log::info;
use rayon::prelude::*;

use super::elastic::Elastic;
use crate::error::{ElasticError, Result};
use crate::grid::NodeField;

/// Damping of the Jacobi smoother.
pub const JACOBI_WEIGHT: f64 = 2.0 / 3.0;

impl Elastic {
    fn check_rhs(&self, x: &NodeField<f64>, b: &NodeField<f64>) -> Result<()> {
        if !x.same_shape(b) {
            return Err(ElasticError::IncompatibleLayouts(
                "smoother solution and right-hand side".into(),
            ));
        }
        Ok(())
    }

    /// One red-black Gauss-Seidel sweep on `x` for `A x = b`.
    pub fn smooth_exact(
        &self,
        amrlev: usize,
        mglev: usize,
        x: &mut NodeField<f64>,
        b: &NodeField<f64>,
    ) -> Result<()> {
        self.check_rhs(x, b)?;
        let diag = self.cached_diagonal(amrlev, mglev, "smooth_exact")?;
        let geom = self.geom(amrlev, mglev);
        let dim = geom.dim;
        let mut ax = NodeField::new(x.layout(), x.ncomp(), 0, 0.0);
        for color in 0..2 {
            x.fill_boundary(geom);
            self.fapply(amrlev, mglev, &mut ax, x)?;
            x.fabs_mut()
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, xfab)| {
                    let (afab, bfab, dfab) = (ax.fab(i), b.fab(i), diag.fab(i));
                    for m in xfab.valid_box().iter() {
                        if (m[0] + m[1] + m[2]).rem_euclid(2) != color {
                            continue;
                        }
                        for p in 0..dim {
                            let d = dfab[(m, p)];
                            let off = afab[(m, p)] - d * xfab[(m, p)];
                            xfab[(m, p)] = (bfab[(m, p)] - off) / d;
                        }
                    }
                });
        }
        x.fill_boundary(geom);
        Ok(())
    }

    /// One weighted Jacobi sweep, `x += w (b - A x) / diag`.
    pub fn smooth(
        &self,
        amrlev: usize,
        mglev: usize,
        x: &mut NodeField<f64>,
        b: &NodeField<f64>,
    ) -> Result<()> {
        self.check_rhs(x, b)?;
        let diag = self.cached_diagonal(amrlev, mglev, "smooth")?;
        let geom = self.geom(amrlev, mglev);
        let dim = geom.dim;
        let mut ax = NodeField::new(x.layout(), x.ncomp(), 0, 0.0);
        x.fill_boundary(geom);
        self.fapply(amrlev, mglev, &mut ax, x)?;
        x.fabs_mut()
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, xfab)| {
                let (afab, bfab, dfab) = (ax.fab(i), b.fab(i), diag.fab(i));
                for m in xfab.valid_box().iter() {
                    for p in 0..dim {
                        xfab[(m, p)] += JACOBI_WEIGHT * (bfab[(m, p)] - afab[(m, p)]) / dfab[(m, p)];
                    }
                }
            });
        x.fill_boundary(geom);
        Ok(())
    }

    /// Run both smoothers from the same `x` and return the max-norm of the
    /// difference of their results.
    pub fn smooth_test(
        &self,
        amrlev: usize,
        mglev: usize,
        x: &NodeField<f64>,
        b: &NodeField<f64>,
    ) -> Result<f64> {
        let mut exact = x.clone();
        let mut jacobi = x.clone();
        self.smooth_exact(amrlev, mglev, &mut exact, b)?;
        self.smooth(amrlev, mglev, &mut jacobi, b)?;
        exact.saxpy(-1.0, &jacobi)?;
        let diff = exact.norm0();
        info!(
            "smoother comparison on level ({}, {}): |exact - jacobi|_inf = {:.3e}",
            amrlev, mglev, diff
        );
        Ok(diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bc::BcMatrix;
    use crate::grid::{Geometry, GridHierarchy, HierarchyInfo};
    use crate::mechanics::MaterialModel;
    use approx::assert_relative_eq;

    fn dirichlet_op(model: MaterialModel) -> Elastic {
        let g = Geometry::new(2, [8, 8, 0], [0.0; 3], [1.0; 3], [false; 3]).unwrap();
        let info = HierarchyInfo {
            max_coarsening_level: 30,
            n_ranks: 1,
        };
        let h = GridHierarchy::single_level(g, 4, &info).unwrap();
        let mut op = Elastic::define(h, BcMatrix::all_displacement(2)).unwrap();
        op.set_uniform_model(model.stiffness()).unwrap();
        op.prepare().unwrap();
        op
    }

    fn laplacian_op() -> Elastic {
        dirichlet_op(MaterialModel::Laplacian { alpha: 1.0 })
    }

    fn rhs(op: &Elastic) -> NodeField<f64> {
        let g = op.geom(0, 0).clone();
        let mut b = op.make_field(0, 0);
        for fab in b.fabs_mut() {
            for m in fab.valid_box().iter() {
                if !g.on_boundary(m) {
                    fab[(m, 0)] = 1.0;
                    fab[(m, 1)] = 1.0;
                }
            }
        }
        b
    }

    fn residual_norm(op: &Elastic, x: &NodeField<f64>, b: &NodeField<f64>) -> f64 {
        let mut r = op.make_field(0, 0);
        op.residual(0, 0, &mut r, x, b).unwrap();
        r.norm2(op.masks().owner(0, 0)).unwrap()
    }

    #[test]
    fn test_smoothers_need_diagonal() {
        let g = Geometry::new(2, [4, 4, 0], [0.0; 3], [1.0; 3], [false; 3]).unwrap();
        let h = GridHierarchy::single_level(g, 4, &HierarchyInfo::default()).unwrap();
        let mut op = Elastic::define(h, BcMatrix::all_displacement(2)).unwrap();
        op.set_uniform_model(MaterialModel::Laplacian { alpha: 1.0 }.stiffness())
            .unwrap();
        let mut x = op.make_field(0, 0);
        let b = op.make_field(0, 0);
        assert!(matches!(
            op.smooth(0, 0, &mut x, &b),
            Err(ElasticError::DiagonalNotComputed(_))
        ));
    }

    #[test]
    fn test_smoothers_reduce_residual() {
        let op = laplacian_op();
        let b = rhs(&op);
        let x0 = op.make_field(0, 0);
        let r0 = residual_norm(&op, &x0, &b);

        let mut gs = x0.clone();
        let mut jac = x0.clone();
        for _ in 0..20 {
            op.smooth_exact(0, 0, &mut gs, &b).unwrap();
            op.smooth(0, 0, &mut jac, &b).unwrap();
        }
        assert!(residual_norm(&op, &gs, &b) < 0.5 * r0);
        assert!(residual_norm(&op, &jac, &b) < r0);
        // Dirichlet rows stay at their value
        assert_relative_eq!(*gs.get([0, 3, 0], 0).unwrap(), 0.0);
        assert_relative_eq!(*jac.get([8, 8, 0], 1).unwrap(), 0.0);
    }

    #[test]
    fn test_gauss_seidel_sweeps_never_increase_residual() {
        for model in [
            MaterialModel::Laplacian { alpha: 1.0 },
            MaterialModel::Isotropic { lambda: 1.0, mu: 1.0 },
        ] {
            let op = dirichlet_op(model);
            let b = rhs(&op);
            let mut x = op.make_field(0, 0);
            let mut last = residual_norm(&op, &x, &b);
            for sweep in 0..30 {
                op.smooth_exact(0, 0, &mut x, &b).unwrap();
                let r = residual_norm(&op, &x, &b);
                assert!(
                    r <= last * (1.0 + 1e-10),
                    "sweep {}: |r| went from {:e} to {:e}",
                    sweep,
                    last,
                    r
                );
                last = r;
            }
        }
    }

    #[test]
    fn test_smooth_test_reports_difference() {
        let op = laplacian_op();
        let b = rhs(&op);
        let x = op.make_field(0, 0);
        let diff = op.smooth_test(0, 0, &x, &b).unwrap();
        assert!(diff > 0.0);
        assert!(diff.is_finite());
    }
}
