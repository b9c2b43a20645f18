//! Node masks shared by the operator and the multigrid driver
//!
//! Masks are built once per hierarchy and boundary-condition matrix:
//! - Dirichlet mask: per node and component, 1 where the displacement is prescribed
//! - Owner mask: 1 on the single authoritative copy of every node
//! - Coarse-fine mask: for every AMR level below the finest, whether a node
//!   is covered by the next finer level
//! - Bottom dot mask: owner mask of the coarsest MG level as weights

use log::debug;

use crate::bc::BcMatrix;
use crate::error::Result;
use crate::grid::{BoxLayout, Geometry, GridHierarchy, LevelArena, NodeBox, NodeField};

/// Coverage of a coarse node by the next finer AMR level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCoverage {
    /// No adjacent cell is covered
    Coarse,
    /// Every adjacent cell is covered
    Fine,
    /// Some but not all adjacent cells are covered
    Interface,
}

#[derive(Debug, Clone)]
pub struct Masks {
    built: bool,
    dirichlet: LevelArena<NodeField<u8>>,
    owner: LevelArena<NodeField<u8>>,
    coarse_fine: Vec<Option<NodeField<NodeCoverage>>>,
    has_fine_boundary: Vec<Vec<bool>>,
    bottom_dot: Option<NodeField<f64>>,
}

impl Default for Masks {
    fn default() -> Self {
        Self::new()
    }
}

impl Masks {
    pub fn new() -> Self {
        Self {
            built: false,
            dirichlet: LevelArena::from_nested(Vec::new()),
            owner: LevelArena::from_nested(Vec::new()),
            coarse_fine: Vec::new(),
            has_fine_boundary: Vec::new(),
            bottom_dot: None,
        }
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Mark the masks stale; the next `build` recomputes them.
    pub fn invalidate(&mut self) {
        self.built = false;
    }

    /// Build every mask. Does nothing if already built.
    pub fn build(&mut self, hierarchy: &GridHierarchy, bc: &BcMatrix) -> Result<()> {
        if self.built {
            return Ok(());
        }
        let n_amr = hierarchy.num_amr_levels();

        let mut dirichlet = Vec::with_capacity(n_amr);
        let mut owner = Vec::with_capacity(n_amr);
        for amrlev in 0..n_amr {
            let mut dl = Vec::new();
            let mut ol = Vec::new();
            for mglev in 0..hierarchy.num_mg_levels(amrlev) {
                let geom = hierarchy.geom(amrlev, mglev);
                let layout = hierarchy.layout(amrlev, mglev);
                dl.push(dirichlet_mask(geom, layout, bc)?);
                ol.push(owner_mask(geom, layout));
            }
            dirichlet.push(dl);
            owner.push(ol);
        }
        self.dirichlet = LevelArena::from_nested(dirichlet);
        self.owner = LevelArena::from_nested(owner);

        self.coarse_fine.clear();
        self.has_fine_boundary.clear();
        for amrlev in 0..n_amr {
            if amrlev + 1 < n_amr {
                let fine_coarsened = hierarchy.layout(amrlev + 1, 0).coarsen();
                let geom = hierarchy.geom(amrlev, 0);
                let layout = hierarchy.layout(amrlev, 0);
                self.coarse_fine
                    .push(Some(coarse_fine_mask(geom, layout, &fine_coarsened)));
                self.has_fine_boundary
                    .push(fine_boundary_flags(geom, layout, &fine_coarsened));
            } else {
                self.coarse_fine.push(None);
                let nboxes = hierarchy.layout(amrlev, 0).len();
                self.has_fine_boundary.push(vec![false; nboxes]);
            }
        }

        let bottom = hierarchy.num_mg_levels(0) - 1;
        let own = self.owner.get(0, bottom);
        let mut dot = NodeField::new(own.layout(), 1, 0, 0.0);
        for (dst, src) in dot.fabs_mut().iter_mut().zip(own.fabs()) {
            for m in src.valid_box().iter() {
                dst[(m, 0)] = f64::from(src[(m, 0)]);
            }
        }
        self.bottom_dot = Some(dot);

        debug!("built masks for {} AMR levels", n_amr);
        self.built = true;
        Ok(())
    }

    pub fn dirichlet(&self, amrlev: usize, mglev: usize) -> &NodeField<u8> {
        self.dirichlet.get(amrlev, mglev)
    }

    pub fn owner(&self, amrlev: usize, mglev: usize) -> &NodeField<u8> {
        self.owner.get(amrlev, mglev)
    }

    /// Coverage mask of `amrlev`; `None` on the finest AMR level.
    pub fn coarse_fine(&self, amrlev: usize) -> Option<&NodeField<NodeCoverage>> {
        self.coarse_fine.get(amrlev).and_then(|m| m.as_ref())
    }

    /// True if box `bx` of `amrlev` (MG level 0) touches the next finer level.
    pub fn has_fine_boundary(&self, amrlev: usize, bx: usize) -> bool {
        self.has_fine_boundary
            .get(amrlev)
            .and_then(|v| v.get(bx).copied())
            .unwrap_or(false)
    }

    /// Owner weights of the coarsest MG level of AMR level 0.
    pub fn bottom_dot(&self) -> Option<&NodeField<f64>> {
        self.bottom_dot.as_ref()
    }

    /// Residual weights for `amrlev`: 0 on nodes covered by a finer level,
    /// and on non-owned nodes.
    pub fn residual_mask(&self, amrlev: usize) -> NodeField<u8> {
        let mut mask = self.owner(amrlev, 0).clone();
        if let Some(cf) = self.coarse_fine(amrlev) {
            for (dst, src) in mask.fabs_mut().iter_mut().zip(cf.fabs()) {
                for m in src.valid_box().iter() {
                    if src[(m, 0)] == NodeCoverage::Fine {
                        dst[(m, 0)] = 0;
                    }
                }
            }
        }
        mask
    }
}

fn dirichlet_mask(geom: &Geometry, layout: &BoxLayout, bc: &BcMatrix) -> Result<NodeField<u8>> {
    let dim = geom.dim;
    let mut mask = NodeField::new(layout, dim, 0, 0u8);
    for fab in mask.fabs_mut() {
        for m in fab.valid_box().iter() {
            if !geom.on_boundary(m) {
                continue;
            }
            for p in 0..dim {
                fab[(m, p)] = u8::from(bc.is_dirichlet(geom, m, p)?);
            }
        }
    }
    Ok(mask)
}

fn owner_mask(geom: &Geometry, layout: &BoxLayout) -> NodeField<u8> {
    let mut mask = NodeField::new(layout, 1, 0, 0u8);
    for (i, fab) in mask.fabs_mut().iter_mut().enumerate() {
        for m in fab.valid_box().iter() {
            let canonical = geom.wrap(m) == Some(m);
            let first = layout.find(m) == Some(i);
            fab[(m, 0)] = u8::from(canonical && first);
        }
    }
    mask
}

/// Cells (by lower-corner index) adjacent to node `m` that lie in the domain.
fn adjacent_cells(geom: &Geometry, m: [isize; 3]) -> Vec<[isize; 3]> {
    let dim = geom.dim;
    let mut cells = Vec::with_capacity(1 << dim);
    for corner in 0..(1usize << dim) {
        let mut c = m;
        let mut inside = true;
        for d in 0..dim {
            if corner & (1 << d) != 0 {
                c[d] -= 1;
            }
            if geom.periodic[d] {
                let lo = geom.domain.lo[d];
                c[d] = lo + (c[d] - lo).rem_euclid(geom.n_cells(d) as isize);
            } else if c[d] < geom.domain.lo[d] || c[d] >= geom.domain.hi[d] {
                inside = false;
            }
        }
        if inside {
            cells.push(c);
        }
    }
    cells
}

fn cell_covered(cell: [isize; 3], dim: usize, fine: &BoxLayout) -> bool {
    fine.boxes()
        .iter()
        .any(|b| (0..dim).all(|d| b.lo[d] <= cell[d] && cell[d] + 1 <= b.hi[d]))
}

fn coarse_fine_mask(
    geom: &Geometry,
    layout: &BoxLayout,
    fine_coarsened: &BoxLayout,
) -> NodeField<NodeCoverage> {
    let dim = geom.dim;
    let mut mask = NodeField::new(layout, 1, 0, NodeCoverage::Coarse);
    for fab in mask.fabs_mut() {
        for m in fab.valid_box().iter() {
            let cells = adjacent_cells(geom, m);
            let covered = cells
                .iter()
                .filter(|c| cell_covered(**c, dim, fine_coarsened))
                .count();
            fab[(m, 0)] = if covered == 0 {
                NodeCoverage::Coarse
            } else if covered == cells.len() {
                NodeCoverage::Fine
            } else {
                NodeCoverage::Interface
            };
        }
    }
    mask
}

fn fine_boundary_flags(geom: &Geometry, layout: &BoxLayout, fine_coarsened: &BoxLayout) -> Vec<bool> {
    layout
        .boxes()
        .iter()
        .map(|b: &NodeBox| {
            let grown = b.grow(1, geom.dim);
            fine_coarsened.boxes().iter().any(|f| f.intersect(&grown).is_some())
        })
        .collect()
}
