//! Grid transfer between MG levels: full-weighting restriction and
//! node-based (bi/tri)linear interpolation.

use rayon::prelude::*;

use super::coefficients::average_down_nodes;
use super::elastic::{BcMode, Elastic};
use crate::error::{ElasticError, NodeIndex, Result};
use crate::grid::{Fab, NodeField};

/// Coarse taps of fine index `i` along one direction.
#[inline]
fn taps(i: isize) -> [(isize, f64); 2] {
    if i.rem_euclid(2) == 0 {
        [(i.div_euclid(2), 1.0), (0, 0.0)]
    } else {
        [((i - 1).div_euclid(2), 0.5), ((i + 1).div_euclid(2), 0.5)]
    }
}

fn interpolate_at(crse: &Fab<f64>, m: NodeIndex, c: usize, dim: usize) -> f64 {
    let t: [[(isize, f64); 2]; 3] = [
        taps(m[0]),
        taps(m[1]),
        if dim == 3 { taps(m[2]) } else { [(0, 1.0), (0, 0.0)] },
    ];
    let mut v = 0.0;
    for &(i, wi) in &t[0] {
        if wi == 0.0 {
            continue;
        }
        for &(j, wj) in &t[1] {
            if wj == 0.0 {
                continue;
            }
            for &(k, wk) in &t[2] {
                if wk == 0.0 {
                    continue;
                }
                v += wi * wj * wk * crse[([i, j, k], c)];
            }
        }
    }
    v
}

impl Elastic {
    /// Restrict a fine residual onto MG level `cmglev`.
    ///
    /// Prescribed-displacement rows of `fine` are zeroed first (homogeneous
    /// BC), then `crse` receives the full-weighted values and has its ghosts
    /// refreshed. `crse` may use any layout over the coarse domain.
    pub fn restriction(
        &self,
        amrlev: usize,
        cmglev: usize,
        crse: &mut NodeField<f64>,
        fine: &mut NodeField<f64>,
    ) -> Result<()> {
        if cmglev == 0 || cmglev >= self.num_mg_levels(amrlev) {
            return Err(ElasticError::Config(format!(
                "no MG level {} to restrict to on AMR level {}",
                cmglev, amrlev
            )));
        }
        if crse.ncomp() != fine.ncomp() {
            return Err(ElasticError::IncompatibleLayouts(format!(
                "restriction from {} to {} components",
                fine.ncomp(),
                crse.ncomp()
            )));
        }
        let fgeom = self.geom(amrlev, cmglev - 1);
        let cgeom = self.geom(amrlev, cmglev);
        self.apply_bc(amrlev, cmglev - 1, fine, BcMode::Homogeneous)?;
        average_down_nodes(fine, fgeom, crse, cgeom, 0, 0.0);
        crse.fill_boundary(cgeom);
        Ok(())
    }

    /// Add the interpolated coarse correction from MG level `fmglev + 1` to `fine`.
    ///
    /// Even fine indices take the coincident coarse node, odd ones average
    /// their two coarse neighbours. `crse` may use any layout over the coarse
    /// domain.
    pub fn interpolation(
        &self,
        amrlev: usize,
        fmglev: usize,
        fine: &mut NodeField<f64>,
        crse: &NodeField<f64>,
    ) -> Result<()> {
        if fmglev + 1 >= self.num_mg_levels(amrlev) {
            return Err(ElasticError::Config(format!(
                "no MG level below {} on AMR level {}",
                fmglev, amrlev
            )));
        }
        if crse.ncomp() != fine.ncomp() {
            return Err(ElasticError::IncompatibleLayouts(format!(
                "interpolation from {} to {} components",
                crse.ncomp(),
                fine.ncomp()
            )));
        }
        let cgeom = self.geom(amrlev, fmglev + 1);
        let dim = cgeom.dim;
        let target = fine.layout().coarsen();

        let staged;
        let src = if fine.layout().is_coarsenable() && crse.layout().is_iteration_compatible(&target) {
            crse
        } else {
            let mut tmp = NodeField::new(&target, crse.ncomp(), 1, 0.0);
            tmp.parallel_copy(crse, cgeom, 1);
            staged = tmp;
            &staged
        };

        let ncomp = fine.ncomp();
        fine.fabs_mut()
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(i, ffab)| -> Result<()> {
                let cfab = src.fab(i);
                for m in ffab.valid_box().iter() {
                    for c in 0..ncomp {
                        let v = interpolate_at(cfab, m, c, dim);
                        ElasticError::check_finite(v, "interpolation", m, c)?;
                        ffab[(m, c)] += v;
                    }
                }
                Ok(())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taps() {
        assert_eq!(taps(4), [(2, 1.0), (0, 0.0)]);
        assert_eq!(taps(5), [(2, 0.5), (3, 0.5)]);
        assert_eq!(taps(-1), [(-1, 0.5), (0, 0.5)]);
    }
}
