/// Node-centered fields over a box layout
///
/// A `NodeField<T>` owns one `Fab<T>` per box. Each fab stores `ncomp`
/// interleaved components on the valid box grown by `ngrow` ghost layers.
/// Ghost values are only refreshed at explicit exchange points
/// (`fill_boundary`, `fill_domain_exterior`, `parallel_copy`). Every exchange
/// gathers from an immutable snapshot before writing.

use std::ops::{Index, IndexMut};

use rayon::prelude::*;

use super::geometry::Geometry;
use super::layout::BoxLayout;
use super::node_box::NodeBox;
use crate::error::{ElasticError, NodeIndex, Result};

/// Data for a single box: valid region plus ghosts.
#[derive(Debug, Clone)]
pub struct Fab<T> {
    valid: NodeBox,
    bx: NodeBox,
    ncomp: usize,
    data: Vec<T>,
}

impl<T: Clone> Fab<T> {
    pub fn new(valid: NodeBox, ngrow: usize, dim: usize, ncomp: usize, init: T) -> Self {
        let bx = valid.grow(ngrow as isize, dim);
        let data = vec![init; bx.num_points() * ncomp];
        Self {
            valid,
            bx,
            ncomp,
            data,
        }
    }

    pub fn valid_box(&self) -> NodeBox {
        self.valid
    }

    /// Valid box plus ghosts.
    pub fn fab_box(&self) -> NodeBox {
        self.bx
    }

    pub fn ncomp(&self) -> usize {
        self.ncomp
    }

    #[inline]
    pub fn offset_of(&self, m: NodeIndex, c: usize) -> usize {
        debug_assert!(self.bx.contains(m), "node {:?} outside fab {}", m, self.bx);
        self.bx.offset(m) * self.ncomp + c
    }

    pub fn fill(&mut self, v: T) {
        self.data.iter_mut().for_each(|x| *x = v.clone());
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl<T: Clone> Index<(NodeIndex, usize)> for Fab<T> {
    type Output = T;

    #[inline]
    fn index(&self, (m, c): (NodeIndex, usize)) -> &T {
        &self.data[self.offset_of(m, c)]
    }
}

impl<T: Clone> IndexMut<(NodeIndex, usize)> for Fab<T> {
    #[inline]
    fn index_mut(&mut self, (m, c): (NodeIndex, usize)) -> &mut T {
        let i = self.offset_of(m, c);
        &mut self.data[i]
    }
}

/// Multi-box node field.
#[derive(Debug, Clone)]
pub struct NodeField<T> {
    layout: BoxLayout,
    ncomp: usize,
    ngrow: usize,
    fabs: Vec<Fab<T>>,
}

impl<T: Clone + Send + Sync> NodeField<T> {
    pub fn new(layout: &BoxLayout, ncomp: usize, ngrow: usize, init: T) -> Self {
        let fabs = layout
            .boxes()
            .iter()
            .map(|b| Fab::new(*b, ngrow, layout.dim(), ncomp, init.clone()))
            .collect();
        Self {
            layout: layout.clone(),
            ncomp,
            ngrow,
            fabs,
        }
    }

    pub fn layout(&self) -> &BoxLayout {
        &self.layout
    }

    pub fn ncomp(&self) -> usize {
        self.ncomp
    }

    pub fn ngrow(&self) -> usize {
        self.ngrow
    }

    pub fn fabs(&self) -> &[Fab<T>] {
        &self.fabs
    }

    pub fn fabs_mut(&mut self) -> &mut [Fab<T>] {
        &mut self.fabs
    }

    pub fn fab(&self, i: usize) -> &Fab<T> {
        &self.fabs[i]
    }

    pub fn fab_mut(&mut self, i: usize) -> &mut Fab<T> {
        &mut self.fabs[i]
    }

    pub fn set_val(&mut self, v: T) {
        self.fabs.par_iter_mut().for_each(|f| f.fill(v.clone()));
    }

    /// Value at a level node, read from the lowest box whose valid region holds it.
    pub fn get(&self, m: NodeIndex, c: usize) -> Option<&T> {
        self.layout.find(m).map(|i| &self.fabs[i][(m, c)])
    }

    /// Write `v` at `m` in every fab whose storage covers it, ghosts included.
    pub fn set(&mut self, m: NodeIndex, c: usize, v: T) {
        for fab in self.fabs.iter_mut() {
            if fab.bx.contains(m) {
                fab[(m, c)] = v.clone();
            }
        }
    }

    /// Same layout and component count; ghost widths may differ.
    pub fn same_shape<U>(&self, other: &NodeField<U>) -> bool {
        self.layout.is_iteration_compatible(&other.layout) && self.ncomp == other.ncomp
    }

    /// Copy all overlapping storage (valid and ghost) from a field on the same layout.
    pub fn copy_from(&mut self, src: &NodeField<T>) -> Result<()> {
        if !self.layout.is_iteration_compatible(&src.layout) {
            return Err(ElasticError::IncompatibleLayouts("copy_from".into()));
        }
        let ncomp = self.ncomp.min(src.ncomp);
        self.fabs
            .par_iter_mut()
            .zip(src.fabs.par_iter())
            .for_each(|(dst, s)| {
                if let Some(region) = dst.bx.intersect(&s.bx) {
                    for m in region.iter() {
                        for c in 0..ncomp {
                            dst[(m, c)] = s[(m, c)].clone();
                        }
                    }
                }
            });
        Ok(())
    }

    /// Periodic-aware ghost exchange from the valid regions of all boxes.
    ///
    /// Ghost nodes outside the domain in a non-periodic direction are left as they are.
    pub fn fill_boundary(&mut self, geom: &Geometry) {
        self.exchange(|m| geom.wrap(m));
    }

    /// Fill ghosts outside the domain from the closest domain node.
    pub fn fill_domain_exterior(&mut self, geom: &Geometry) {
        self.exchange(|m| match geom.wrap(m) {
            Some(_) => None,
            None => Some(geom.clamp(m)),
        });
    }

    fn exchange<F>(&mut self, source_of: F)
    where
        F: Fn(NodeIndex) -> Option<NodeIndex> + Sync,
    {
        let ncomp = self.ncomp;
        let updates: Vec<Vec<(usize, T)>> = self
            .fabs
            .par_iter()
            .map(|fab| {
                let mut up = Vec::new();
                for m in fab.bx.iter() {
                    if fab.valid.contains(m) {
                        continue;
                    }
                    let Some(w) = source_of(m) else { continue };
                    let Some(src) = self.layout.find(w) else { continue };
                    let sfab = &self.fabs[src];
                    for c in 0..ncomp {
                        up.push((fab.offset_of(m, c), sfab[(w, c)].clone()));
                    }
                }
                up
            })
            .collect();
        self.fabs
            .par_iter_mut()
            .zip(updates)
            .for_each(|(fab, up)| {
                for (i, v) in up {
                    fab.data[i] = v;
                }
            });
    }

    /// Copy from a field on a different layout over the same index space.
    ///
    /// Every destination node within `nghost` of its valid box is read from
    /// the source box holding its periodic image.
    pub fn parallel_copy(&mut self, src: &NodeField<T>, geom: &Geometry, nghost: usize) {
        let ncomp = self.ncomp.min(src.ncomp);
        let dim = geom.dim;
        let ng = nghost.min(self.ngrow) as isize;
        self.fabs.par_iter_mut().for_each(|fab| {
            let region = fab.valid.grow(ng, dim);
            for m in region.iter() {
                let Some(w) = geom.wrap(m) else { continue };
                let Some(s) = src.layout.find(w) else { continue };
                for c in 0..ncomp {
                    fab[(m, c)] = src.fabs[s][(w, c)].clone();
                }
            }
        });
    }
}

impl NodeField<f64> {
    /// `self += a * x` on valid nodes.
    pub fn saxpy(&mut self, a: f64, x: &NodeField<f64>) -> Result<()> {
        self.zip_valid(x, |s, xv| *s += a * xv)
    }

    /// `self *= x` on valid nodes.
    pub fn mult(&mut self, x: &NodeField<f64>) -> Result<()> {
        self.zip_valid(x, |s, xv| *s *= xv)
    }

    /// `self /= x` on valid nodes.
    pub fn divide(&mut self, x: &NodeField<f64>) -> Result<()> {
        self.zip_valid(x, |s, xv| *s /= xv)
    }

    pub fn scale(&mut self, a: f64) {
        self.fabs
            .par_iter_mut()
            .for_each(|f| f.data.iter_mut().for_each(|v| *v *= a));
    }

    fn zip_valid<F>(&mut self, x: &NodeField<f64>, op: F) -> Result<()>
    where
        F: Fn(&mut f64, f64) + Sync,
    {
        if !self.same_shape(x) {
            return Err(ElasticError::IncompatibleLayouts("elementwise operation".into()));
        }
        let ncomp = self.ncomp;
        self.fabs
            .par_iter_mut()
            .zip(x.fabs.par_iter())
            .for_each(|(dst, src)| {
                for m in dst.valid.iter() {
                    for c in 0..ncomp {
                        let xv = src[(m, c)];
                        op(&mut dst[(m, c)], xv);
                    }
                }
            });
        Ok(())
    }

    /// Masked dot product; only nodes with `mask != 0` contribute.
    pub fn dot(&self, other: &NodeField<f64>, mask: &NodeField<u8>) -> Result<f64> {
        if !self.same_shape(other) || !self.layout.is_iteration_compatible(mask.layout()) {
            return Err(ElasticError::IncompatibleLayouts("dot".into()));
        }
        let ncomp = self.ncomp;
        Ok(self
            .fabs
            .par_iter()
            .zip(other.fabs.par_iter())
            .zip(mask.fabs.par_iter())
            .map(|((a, b), mk)| {
                let mut s = 0.0;
                for m in a.valid.iter() {
                    if mk[(m, 0)] == 0 {
                        continue;
                    }
                    for c in 0..ncomp {
                        s += a[(m, c)] * b[(m, c)];
                    }
                }
                s
            })
            .sum())
    }

    /// Masked 2-norm.
    pub fn norm2(&self, mask: &NodeField<u8>) -> Result<f64> {
        Ok(self.dot(self, mask)?.sqrt())
    }

    /// Max-norm over valid nodes.
    pub fn norm0(&self) -> f64 {
        let ncomp = self.ncomp;
        self.fabs
            .par_iter()
            .map(|f| {
                let mut mx: f64 = 0.0;
                for m in f.valid.iter() {
                    for c in 0..ncomp {
                        mx = mx.max(f[(m, c)].abs());
                    }
                }
                mx
            })
            .reduce(|| 0.0, f64::max)
    }

    /// First valid node holding a NaN or Inf, if any.
    pub fn find_non_finite(&self) -> Option<(NodeIndex, usize)> {
        for f in &self.fabs {
            for m in f.valid.iter() {
                for c in 0..self.ncomp {
                    if !f[(m, c)].is_finite() {
                        return Some((m, c));
                    }
                }
            }
        }
        None
    }
}
