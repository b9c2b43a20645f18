//! Coefficient averaging across MG levels
//!
//! Coarse values are a tensor-product full weighting of the fine values,
//! `(1/4, 1/2, 1/4)` per direction. A coarse node on a non-periodic face is
//! pinned in that direction and only reads the coincident fine node, so
//! boundary values never mix with the interior. The same weighting restricts
//! residuals in `transfer`.

use std::ops::{Add, Mul};

use log::debug;
use rayon::prelude::*;

use super::elastic::{Elastic, MODEL_NGHOST};
use crate::error::{ElasticError, NodeIndex, Result};
use crate::grid::{Geometry, NodeField};
use crate::mechanics::Stiffness;

const FULL: [(isize, f64); 3] = [(-1, 0.25), (0, 0.5), (1, 0.25)];
const PINNED: [(isize, f64); 1] = [(0, 1.0)];

/// Full-weighted value at coarse node `mc`; `sample` reads fine nodes.
pub(crate) fn full_weight<T, S>(cgeom: &Geometry, mc: NodeIndex, sample: S, zero: T) -> T
where
    T: Copy + Add<Output = T> + Mul<f64, Output = T>,
    S: Fn(NodeIndex) -> T,
{
    let taps = |d: usize| -> &'static [(isize, f64)] {
        if d >= cgeom.dim || cgeom.on_low_face(mc, d) || cgeom.on_high_face(mc, d) {
            &PINNED
        } else {
            &FULL
        }
    };
    let mut acc = zero;
    for &(o0, w0) in taps(0) {
        for &(o1, w1) in taps(1) {
            for &(o2, w2) in taps(2) {
                let mf = [2 * mc[0] + o0, 2 * mc[1] + o1, 2 * mc[2] + o2];
                acc = acc + sample(mf) * (w0 * w1 * w2);
            }
        }
    }
    acc
}

fn weight_boxes<T>(
    src: &NodeField<T>,
    crse: &mut NodeField<T>,
    cgeom: &Geometry,
    nghost: usize,
    zero: T,
) where
    T: Copy + Add<Output = T> + Mul<f64, Output = T> + Send + Sync,
{
    let dim = cgeom.dim;
    let ncomp = crse.ncomp().min(src.ncomp());
    crse.fabs_mut()
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, cfab)| {
            let sfab = src.fab(i);
            let region = cfab
                .valid_box()
                .grow(nghost as isize, dim)
                .intersect(&cfab.fab_box())
                .and_then(|r| r.intersect(&cgeom.domain));
            let Some(region) = region else { return };
            for mc in region.iter() {
                for c in 0..ncomp {
                    cfab[(mc, c)] = full_weight(cgeom, mc, |mf| sfab[(mf, c)], zero);
                }
            }
        });
}

/// Average a fine node field down onto `crse`.
///
/// Valid nodes and `nghost` ghost layers inside the domain are written. The
/// fine data is read directly when `crse` lines up with the coarsened fine
/// layout and `fine` carries enough filled ghosts; otherwise it is staged on
/// the refined coarse layout through `parallel_copy`.
pub(crate) fn average_down_nodes<T>(
    fine: &NodeField<T>,
    fgeom: &Geometry,
    crse: &mut NodeField<T>,
    cgeom: &Geometry,
    nghost: usize,
    zero: T,
) where
    T: Copy + Add<Output = T> + Mul<f64, Output = T> + Send + Sync,
{
    let need = 2 * nghost + 1;
    let direct = fine.layout().is_coarsenable()
        && crse.layout().is_iteration_compatible(&fine.layout().coarsen())
        && fine.ngrow() >= need;
    if direct {
        weight_boxes(fine, crse, cgeom, nghost, zero);
    } else {
        let mut staged = NodeField::new(&crse.layout().refine(), fine.ncomp(), need, zero);
        staged.parallel_copy(fine, fgeom, need);
        weight_boxes(&staged, crse, cgeom, nghost, zero);
    }
}

/// Refresh stiffness ghosts: periodic and interior ghosts from valid data,
/// ghosts outside the domain from the closest boundary node.
pub fn fill_boundary_coeff(model: &mut NodeField<Stiffness>, geom: &Geometry) {
    model.fill_boundary(geom);
    model.fill_domain_exterior(geom);
}

impl Elastic {
    /// Average the finest stiffness of every AMR level down its MG levels.
    ///
    /// # Errors
    /// `Unimplemented` if some AMR level has no model, since coefficients
    /// are not restricted across AMR levels.
    pub fn average_down_coeffs(&mut self) -> Result<()> {
        for amrlev in 0..self.num_amr_levels() {
            if self.models.get(amrlev, 0).is_none() {
                return Err(ElasticError::Unimplemented {
                    feature: "coefficient restriction across AMR levels",
                });
            }
        }
        for amrlev in 0..self.num_amr_levels() {
            for mglev in 1..self.num_mg_levels(amrlev) {
                let fgeom = self.hierarchy.geom(amrlev, mglev - 1);
                let cgeom = self.hierarchy.geom(amrlev, mglev);
                let mut crse = NodeField::new(
                    self.hierarchy.layout(amrlev, mglev),
                    1,
                    MODEL_NGHOST,
                    Stiffness::zero(),
                );
                let (fine_slot, crse_slot) = self.models.pair_mut(amrlev, mglev - 1);
                let fine = fine_slot.as_ref().ok_or(ElasticError::MissingModel {
                    amrlev,
                    mglev: mglev - 1,
                })?;
                average_down_nodes(fine, fgeom, &mut crse, cgeom, MODEL_NGHOST, Stiffness::zero());
                fill_boundary_coeff(&mut crse, cgeom);
                for fab in crse.fabs() {
                    for m in fab.valid_box().iter() {
                        if !fab[(m, 0)].is_finite() {
                            return Err(ElasticError::NumericalCorruption {
                                quantity: "coarse stiffness",
                                node: m,
                                component: 0,
                            });
                        }
                    }
                }
                *crse_slot = Some(crse);
                *self.diag.get_mut(amrlev, mglev) = None;
            }
            debug!(
                "averaged coefficients down {} MG levels on AMR level {}",
                self.num_mg_levels(amrlev),
                amrlev
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bc::BcMatrix;
    use crate::grid::{BoxLayout, GridHierarchy, HierarchyInfo};
    use crate::mechanics::MaterialModel;
    use approx::assert_relative_eq;

    fn geom(n: usize, periodic: bool) -> Geometry {
        Geometry::new(2, [n, n, 0], [0.0; 3], [1.0; 3], [periodic, false, false]).unwrap()
    }

    #[test]
    fn test_full_weight_interior_and_pinned() {
        let cg = geom(4, false);
        // f(m) = m0 + 10 m1 is linear, so weighting reproduces it
        let f = |m: NodeIndex| (m[0] + 10 * m[1]) as f64;
        assert_relative_eq!(full_weight(&cg, [1, 2, 0], f, 0.0), 2.0 + 40.0);
        // pinned in x on xlo, full in y
        assert_relative_eq!(full_weight(&cg, [0, 1, 0], f, 0.0), 20.0);
        // corner copies the coincident fine node
        let spike = |m: NodeIndex| if m == [8, 8, 0] { 1.0 } else { 0.0 };
        assert_relative_eq!(full_weight(&cg, [4, 4, 0], spike, 0.0), 1.0);
        assert_relative_eq!(full_weight(&cg, [2, 2, 0], |_| 1.0, 0.0), 1.0);
    }

    #[test]
    fn test_periodic_seam_is_not_pinned() {
        let cg = geom(4, true);
        let spike = |m: NodeIndex| if m == [-1, 4, 0] { 4.0 } else { 0.0 };
        assert_relative_eq!(full_weight(&cg, [0, 2, 0], spike, 0.0), 0.5);
    }

    #[test]
    fn test_average_down_staged_matches_direct() {
        let fg = geom(8, false);
        let cg = fg.coarsen();
        let fine_layout = BoxLayout::chop(&fg, 4, 1).unwrap();
        let mut fine = NodeField::new(&fine_layout, 1, 3, 0.0);
        for fab in fine.fabs_mut() {
            for m in fab.valid_box().iter() {
                fab[(m, 0)] = (m[0] * m[0] + 3 * m[1]) as f64;
            }
        }
        fine.fill_boundary(&fg);

        let mut direct = NodeField::new(&fine_layout.coarsen(), 1, 1, 0.0);
        average_down_nodes(&fine, &fg, &mut direct, &cg, 1, 0.0);
        let mut staged = NodeField::new(&BoxLayout::single(&cg), 1, 1, 0.0);
        average_down_nodes(&fine, &fg, &mut staged, &cg, 1, 0.0);

        for m in cg.domain.iter() {
            assert_relative_eq!(
                *direct.get(m, 0).unwrap(),
                *staged.get(m, 0).unwrap(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_average_down_coeffs_uniform_model() {
        let info = HierarchyInfo {
            max_coarsening_level: 30,
            n_ranks: 1,
        };
        let h = GridHierarchy::single_level(geom(16, false), 8, &info).unwrap();
        let mut op = Elastic::define(h, BcMatrix::all_displacement(2)).unwrap();
        assert!(matches!(
            op.average_down_coeffs(),
            Err(ElasticError::Unimplemented { .. })
        ));
        let c = MaterialModel::Isotropic { lambda: 2.0, mu: 0.5 }.stiffness();
        op.set_uniform_model(c).unwrap();
        op.average_down_coeffs().unwrap();
        let bottom = op.num_mg_levels(0) - 1;
        let crse = op.model(0, bottom).unwrap();
        for fab in crse.fabs() {
            for m in fab.fab_box().iter() {
                assert_relative_eq!((fab[(m, 0)] - c).norm(), 0.0, epsilon = 1e-12);
            }
        }
    }
}
