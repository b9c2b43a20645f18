/// Box layouts and distribution maps
///
/// A layout is an ordered list of node boxes covering a level. Neighbouring
/// boxes share their face nodes. Each box carries the rank that owns it.

use std::collections::HashMap;

use super::geometry::Geometry;
use super::node_box::NodeBox;
use crate::error::{ElasticError, NodeIndex, Result};

#[derive(Debug, Clone)]
pub struct BoxLayout {
    dim: usize,
    boxes: Vec<NodeBox>,
    owners: Vec<usize>,
    bins: BinIndex,
}

impl PartialEq for BoxLayout {
    fn eq(&self, other: &Self) -> bool {
        self.dim == other.dim && self.boxes == other.boxes && self.owners == other.owners
    }
}

/// Buckets of box indices on a regular grid of bins at least as wide as the
/// largest box, so a box touches at most two bins per direction.
#[derive(Debug, Clone, Default)]
struct BinIndex {
    origin: NodeIndex,
    width: [isize; 3],
    bins: HashMap<NodeIndex, Vec<usize>>,
}

impl BinIndex {
    fn build(boxes: &[NodeBox]) -> Self {
        let mut origin = [isize::MAX; 3];
        let mut width = [1isize; 3];
        for b in boxes {
            for d in 0..3 {
                origin[d] = origin[d].min(b.lo[d]);
                width[d] = width[d].max(b.hi[d] - b.lo[d]);
            }
        }
        if boxes.is_empty() {
            origin = [0; 3];
        }
        let mut index = Self {
            origin,
            width,
            bins: HashMap::new(),
        };
        // ascending box order keeps each bucket sorted
        for (i, b) in boxes.iter().enumerate() {
            let (lo, hi) = (index.bin_of(b.lo), index.bin_of(b.hi));
            for k in lo[2]..=hi[2] {
                for j in lo[1]..=hi[1] {
                    for l in lo[0]..=hi[0] {
                        index.bins.entry([l, j, k]).or_default().push(i);
                    }
                }
            }
        }
        index
    }

    fn bin_of(&self, m: NodeIndex) -> NodeIndex {
        let mut bin = [0; 3];
        for d in 0..3 {
            bin[d] = (m[d] - self.origin[d]).div_euclid(self.width[d]);
        }
        bin
    }

    fn candidates(&self, m: NodeIndex) -> &[usize] {
        self.bins.get(&self.bin_of(m)).map_or(&[], |v| v.as_slice())
    }
}

impl BoxLayout {
    fn from_parts(dim: usize, boxes: Vec<NodeBox>, owners: Vec<usize>) -> Self {
        let bins = BinIndex::build(&boxes);
        Self {
            dim,
            boxes,
            owners,
            bins,
        }
    }

    pub fn new(dim: usize, boxes: Vec<NodeBox>, owners: Vec<usize>) -> Result<Self> {
        if boxes.len() != owners.len() {
            return Err(ElasticError::IncompatibleLayouts(format!(
                "{} boxes but {} owners",
                boxes.len(),
                owners.len()
            )));
        }
        if boxes.iter().any(|b| b.is_empty()) {
            return Err(ElasticError::Config("empty box in layout".into()));
        }
        Ok(Self::from_parts(dim, boxes, owners))
    }

    /// One box covering the whole domain, owned by rank 0.
    pub fn single(geom: &Geometry) -> Self {
        Self::from_parts(geom.dim, vec![geom.domain], vec![0])
    }

    /// Chop the domain into boxes of at most `max_grid_size` cells per side.
    ///
    /// Boxes are dealt to `n_ranks` ranks round-robin.
    pub fn chop(geom: &Geometry, max_grid_size: usize, n_ranks: usize) -> Result<Self> {
        if max_grid_size == 0 {
            return Err(ElasticError::Config("max_grid_size must be positive".into()));
        }
        let mut cuts: [Vec<(isize, isize)>; 3] = Default::default();
        for d in 0..3 {
            if d >= geom.dim {
                cuts[d].push((0, 0));
                continue;
            }
            let lo = geom.domain.lo[d];
            let n = geom.n_cells(d) as isize;
            let m = max_grid_size as isize;
            let mut start = 0;
            while start < n {
                let end = (start + m).min(n);
                cuts[d].push((lo + start, lo + end));
                start = end;
            }
        }
        let mut boxes = Vec::new();
        for &(zlo, zhi) in &cuts[2] {
            for &(ylo, yhi) in &cuts[1] {
                for &(xlo, xhi) in &cuts[0] {
                    boxes.push(NodeBox::new([xlo, ylo, zlo], [xhi, yhi, zhi]));
                }
            }
        }
        let n_ranks = n_ranks.max(1);
        let owners = (0..boxes.len()).map(|i| i % n_ranks).collect();
        Ok(Self::from_parts(geom.dim, boxes, owners))
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn boxes(&self) -> &[NodeBox] {
        &self.boxes
    }

    pub fn get(&self, i: usize) -> NodeBox {
        self.boxes[i]
    }

    pub fn owner(&self, i: usize) -> usize {
        self.owners[i]
    }

    pub fn owners(&self) -> &[usize] {
        &self.owners
    }

    /// Replace the distribution map, keeping the boxes.
    pub fn with_owners(&self, owners: Vec<usize>) -> Result<Self> {
        Self::new(self.dim, self.boxes.clone(), owners)
    }

    pub fn is_coarsenable(&self) -> bool {
        self.boxes.iter().all(|b| b.is_coarsenable(self.dim))
    }

    pub fn coarsen(&self) -> BoxLayout {
        let boxes = self.boxes.iter().map(|b| b.coarsen(self.dim)).collect();
        Self::from_parts(self.dim, boxes, self.owners.clone())
    }

    pub fn refine(&self) -> BoxLayout {
        let boxes = self.boxes.iter().map(|b| b.refine(self.dim)).collect();
        Self::from_parts(self.dim, boxes, self.owners.clone())
    }

    /// Same boxes and same owners, so box `i` of one matches box `i` of the other.
    pub fn is_iteration_compatible(&self, other: &BoxLayout) -> bool {
        self.boxes == other.boxes && self.owners == other.owners
    }

    /// Lowest-index box whose valid region contains `m`.
    pub fn find(&self, m: NodeIndex) -> Option<usize> {
        self.bins
            .candidates(m)
            .iter()
            .copied()
            .find(|&i| self.boxes[i].contains(m))
    }

    /// Indices of boxes intersecting `bx`.
    pub fn intersections(&self, bx: &NodeBox) -> Vec<(usize, NodeBox)> {
        self.boxes
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.intersect(bx).map(|isect| (i, isect)))
            .collect()
    }
}
