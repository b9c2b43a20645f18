//! Sparse assembly of the operator by colored probing
//!
//! Every operator row reads at most three consecutive nodes per direction
//! (central `m-1..=m+1`, one-sided `m..=m+2` or `m-2..=m`). Probing with unit
//! vectors spaced three nodes apart therefore hits each row with at most one
//! probe per color, so a handful of `fapply` calls recover the whole matrix.
//! Periodic directions whose length is not a multiple of three use a single
//! probe per period.

use std::collections::HashMap;

use log::debug;
use sprs::{CsMat, TriMat};

use super::elastic::Elastic;
use crate::error::{ElasticError, NodeIndex, Result};
use crate::grid::{Geometry, NodeField};
use crate::linalg::LinearOperator;
use crate::numeric::StencilType;

/// Probe spacing per direction.
fn probe_spacing(geom: &Geometry) -> [isize; 3] {
    let mut s = [1; 3];
    for d in 0..geom.dim {
        let n = geom.n_cells(d) as isize;
        s[d] = if geom.periodic[d] && n % 3 != 0 { n } else { 3 };
    }
    s
}

fn colors(spacing: [isize; 3]) -> impl Iterator<Item = [isize; 3]> {
    (0..spacing[2]).flat_map(move |k| {
        (0..spacing[1]).flat_map(move |j| (0..spacing[0]).map(move |i| [i, j, k]))
    })
}

fn color_of(geom: &Geometry, m: NodeIndex, spacing: [isize; 3]) -> Option<[isize; 3]> {
    let w = geom.wrap(m)?;
    let mut c = [0; 3];
    for d in 0..geom.dim {
        c[d] = (w[d] - geom.domain.lo[d]).rem_euclid(spacing[d]);
    }
    Some(c)
}

/// Canonical node of the given color inside the footprint of row `m`.
fn probe_source(geom: &Geometry, m: NodeIndex, color: [isize; 3], spacing: [isize; 3]) -> Option<NodeIndex> {
    let sten = StencilType::at(geom, m);
    let mut j = m;
    for d in 0..geom.dim {
        let range = match sten[d] {
            StencilType::Central => m[d] - 1..=m[d] + 1,
            StencilType::OneSidedLow => m[d]..=m[d] + 2,
            StencilType::OneSidedHigh => m[d] - 2..=m[d],
        };
        let lo = geom.domain.lo[d];
        j[d] = range
            .into_iter()
            .find(|k| (k - lo).rem_euclid(spacing[d]) == color[d])?;
    }
    geom.wrap(j)
}

/// Operator of one level as a sparse matrix over owned node components.
#[derive(Debug, Clone)]
pub struct AssembledOperator {
    pub matrix: CsMat<f64>,
    dofs: Vec<(NodeIndex, usize)>,
    index: HashMap<(NodeIndex, usize), usize>,
    geom: Geometry,
}

impl AssembledOperator {
    /// Number of unknowns.
    pub fn len(&self) -> usize {
        self.dofs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dofs.is_empty()
    }

    /// Node and component of every unknown.
    pub fn dofs(&self) -> &[(NodeIndex, usize)] {
        &self.dofs
    }

    /// Unknown index of component `p` at `m` (any periodic image).
    pub fn dof(&self, m: NodeIndex, p: usize) -> Option<usize> {
        let w = self.geom.wrap(m)?;
        self.index.get(&(w, p)).copied()
    }

    /// Owned values of a field as a vector.
    pub fn gather(&self, field: &NodeField<f64>) -> Result<Vec<f64>> {
        self.dofs
            .iter()
            .map(|&(m, p)| {
                field.get(m, p).copied().ok_or_else(|| {
                    ElasticError::IncompatibleLayouts(format!("node {:?} not covered by field", m))
                })
            })
            .collect()
    }

    /// Write a vector into every valid node of a field, periodic images included.
    pub fn scatter(&self, x: &[f64], field: &mut NodeField<f64>) -> Result<()> {
        let ncomp = self.dofs.iter().map(|&(_, p)| p + 1).max().unwrap_or(0);
        for fab in field.fabs_mut() {
            for m in fab.valid_box().iter() {
                for p in 0..ncomp {
                    let i = self.dof(m, p).ok_or_else(|| {
                        ElasticError::IncompatibleLayouts(format!("node {:?} has no unknown", m))
                    })?;
                    fab[(m, p)] = x[i];
                }
            }
        }
        Ok(())
    }
}

impl LinearOperator for AssembledOperator {
    fn apply(&self, x: &[f64]) -> Vec<f64> {
        self.matrix.apply(x)
    }

    fn rows(&self) -> usize {
        self.len()
    }

    fn cols(&self) -> usize {
        self.len()
    }
}

impl Elastic {
    fn probe_field(&self, amrlev: usize, mglev: usize, color: [isize; 3], spacing: [isize; 3], p: usize) -> NodeField<f64> {
        let geom = self.geom(amrlev, mglev);
        let mut probe = self.make_field(amrlev, mglev);
        for fab in probe.fabs_mut() {
            for m in fab.valid_box().iter() {
                if color_of(geom, m, spacing) == Some(color) {
                    fab[(m, p)] = 1.0;
                }
            }
        }
        probe.fill_boundary(geom);
        probe
    }

    /// Operator diagonal recovered by probing with `fapply`.
    ///
    /// Matches `compute_diagonal`; useful to check a cached diagonal.
    pub fn diagonal_by_probing(&self, amrlev: usize, mglev: usize) -> Result<NodeField<f64>> {
        let geom = self.geom(amrlev, mglev);
        let layout = self.hierarchy.layout(amrlev, mglev);
        let dim = self.dim();
        let spacing = probe_spacing(geom);
        let mut diag = NodeField::new(layout, dim, 0, 0.0);
        let mut out = NodeField::new(layout, dim, 0, 0.0);
        for color in colors(spacing) {
            for p in 0..dim {
                let probe = self.probe_field(amrlev, mglev, color, spacing, p);
                self.fapply(amrlev, mglev, &mut out, &probe)?;
                for (dfab, ofab) in diag.fabs_mut().iter_mut().zip(out.fabs()) {
                    for m in dfab.valid_box().iter() {
                        if color_of(geom, m, spacing) == Some(color) {
                            dfab[(m, p)] = ofab[(m, p)];
                        }
                    }
                }
            }
        }
        Ok(diag)
    }

    /// Assemble the operator of one level into a CSR matrix.
    ///
    /// Unknowns are the owned nodes times `dim` components; periodic images
    /// share the unknown of their canonical node.
    pub fn assemble(&self, amrlev: usize, mglev: usize) -> Result<AssembledOperator> {
        let geom = self.geom(amrlev, mglev);
        let dim = self.dim();
        let owner = self.masks.owner(amrlev, mglev);

        let mut dofs = Vec::new();
        let mut index = HashMap::new();
        for fab in owner.fabs() {
            for m in fab.valid_box().iter() {
                if fab[(m, 0)] == 0 {
                    continue;
                }
                for p in 0..dim {
                    index.insert((m, p), dofs.len());
                    dofs.push((m, p));
                }
            }
        }

        let n = dofs.len();
        let spacing = probe_spacing(geom);
        let mut tri = TriMat::new((n, n));
        let mut out = NodeField::new(self.hierarchy.layout(amrlev, mglev), dim, 0, 0.0);
        for color in colors(spacing) {
            for q in 0..dim {
                let probe = self.probe_field(amrlev, mglev, color, spacing, q);
                self.fapply(amrlev, mglev, &mut out, &probe)?;
                for (row, &(m, p)) in dofs.iter().enumerate() {
                    let v = out.get(m, p).copied().unwrap_or(0.0);
                    if v == 0.0 {
                        continue;
                    }
                    let col = probe_source(geom, m, color, spacing)
                        .and_then(|j| index.get(&(j, q)).copied());
                    if let Some(col) = col {
                        tri.add_triplet(row, col, v);
                    }
                }
            }
        }
        let matrix: CsMat<f64> = tri.to_csr();
        debug!(
            "assembled level ({}, {}): {} unknowns, {} nonzeros",
            amrlev,
            mglev,
            n,
            matrix.nnz()
        );
        Ok(AssembledOperator {
            matrix,
            dofs,
            index,
            geom: geom.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_spacing() {
        let g = Geometry::new(2, [8, 6, 0], [0.0; 3], [1.0; 3], [true, true, false]).unwrap();
        assert_eq!(probe_spacing(&g), [8, 3, 1]);
        assert_eq!(colors(probe_spacing(&g)).count(), 24);
        let g = Geometry::new(3, [4, 4, 4], [0.0; 3], [1.0; 3], [false; 3]).unwrap();
        assert_eq!(probe_spacing(&g), [3, 3, 3]);
    }

    #[test]
    fn test_probe_source_in_footprint() {
        let g = Geometry::new(2, [6, 6, 0], [0.0; 3], [1.0; 3], [false, true, false]).unwrap();
        let s = probe_spacing(&g);
        // low face reaches inward
        assert_eq!(probe_source(&g, [0, 2, 0], [2, 1, 0], s), Some([2, 1, 0]));
        // periodic seam wraps
        assert_eq!(probe_source(&g, [3, 0, 0], [0, 2, 0], s), Some([3, 5, 0]));
        assert_eq!(probe_source(&g, [6, 3, 0], [1, 0, 0], s), Some([4, 3, 0]));
    }
}
