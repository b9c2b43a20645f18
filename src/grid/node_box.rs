/// Inclusive index boxes over node-centered grids
///
/// A `NodeBox` covers the nodes `lo..=hi` in every direction. Two-dimensional
/// boxes keep the third direction collapsed to `[0, 0]` so that all index
/// arithmetic works on `[isize; 3]`.

use std::fmt;

use crate::error::NodeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeBox {
    pub lo: NodeIndex,
    pub hi: NodeIndex,
}

impl NodeBox {
    pub fn new(lo: NodeIndex, hi: NodeIndex) -> Self {
        Self { lo, hi }
    }

    /// Node box surrounding the cells `cell_lo..=cell_hi`.
    ///
    /// Only the first `dim` directions are extended by one node.
    pub fn from_cells(cell_lo: NodeIndex, cell_hi: NodeIndex, dim: usize) -> Self {
        let mut hi = cell_hi;
        for d in 0..dim {
            hi[d] += 1;
        }
        for d in dim..3 {
            hi[d] = cell_lo[d];
        }
        Self { lo: cell_lo, hi }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|d| self.hi[d] < self.lo[d])
    }

    /// Number of nodes along direction `d`.
    pub fn len(&self, d: usize) -> usize {
        (self.hi[d] - self.lo[d] + 1).max(0) as usize
    }

    pub fn num_points(&self) -> usize {
        self.len(0) * self.len(1) * self.len(2)
    }

    pub fn contains(&self, m: NodeIndex) -> bool {
        (0..3).all(|d| m[d] >= self.lo[d] && m[d] <= self.hi[d])
    }

    pub fn contains_box(&self, other: &NodeBox) -> bool {
        self.contains(other.lo) && self.contains(other.hi)
    }

    pub fn intersect(&self, other: &NodeBox) -> Option<NodeBox> {
        let mut lo = [0; 3];
        let mut hi = [0; 3];
        for d in 0..3 {
            lo[d] = self.lo[d].max(other.lo[d]);
            hi[d] = self.hi[d].min(other.hi[d]);
            if hi[d] < lo[d] {
                return None;
            }
        }
        Some(NodeBox { lo, hi })
    }

    /// Grow by `n` nodes in the first `dim` directions.
    pub fn grow(&self, n: isize, dim: usize) -> NodeBox {
        let mut b = *self;
        for d in 0..dim {
            b.lo[d] -= n;
            b.hi[d] += n;
        }
        b
    }

    pub fn shift(&self, offset: NodeIndex) -> NodeBox {
        let mut b = *self;
        for d in 0..3 {
            b.lo[d] += offset[d];
            b.hi[d] += offset[d];
        }
        b
    }

    /// Nodes `2i` of the fine box map to node `i` of the coarse box.
    pub fn coarsen(&self, dim: usize) -> NodeBox {
        let mut b = *self;
        for d in 0..dim {
            b.lo[d] = self.lo[d].div_euclid(2);
            b.hi[d] = self.hi[d].div_euclid(2);
        }
        b
    }

    pub fn refine(&self, dim: usize) -> NodeBox {
        let mut b = *self;
        for d in 0..dim {
            b.lo[d] = 2 * self.lo[d];
            b.hi[d] = 2 * self.hi[d];
        }
        b
    }

    /// Both corners even and at least one coarse cell in every direction.
    pub fn is_coarsenable(&self, dim: usize) -> bool {
        (0..dim).all(|d| {
            self.lo[d].rem_euclid(2) == 0
                && self.hi[d].rem_euclid(2) == 0
                && self.hi[d] - self.lo[d] >= 2
        })
    }

    /// Linear offset of `m` inside the box, x fastest.
    #[inline]
    pub fn offset(&self, m: NodeIndex) -> usize {
        let nx = self.len(0);
        let ny = self.len(1);
        let i = (m[0] - self.lo[0]) as usize;
        let j = (m[1] - self.lo[1]) as usize;
        let k = (m[2] - self.lo[2]) as usize;
        i + nx * (j + ny * k)
    }

    /// All nodes of the box, x fastest.
    pub fn iter(&self) -> NodeBoxIter {
        NodeBoxIter {
            bx: *self,
            cur: self.lo,
            done: self.is_empty(),
        }
    }
}

impl fmt::Display for NodeBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(({},{},{}) ({},{},{}))",
            self.lo[0], self.lo[1], self.lo[2], self.hi[0], self.hi[1], self.hi[2]
        )
    }
}

pub struct NodeBoxIter {
    bx: NodeBox,
    cur: NodeIndex,
    done: bool,
}

impl Iterator for NodeBoxIter {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        if self.done {
            return None;
        }
        let out = self.cur;
        self.cur[0] += 1;
        if self.cur[0] > self.bx.hi[0] {
            self.cur[0] = self.bx.lo[0];
            self.cur[1] += 1;
            if self.cur[1] > self.bx.hi[1] {
                self.cur[1] = self.bx.lo[1];
                self.cur[2] += 1;
                if self.cur[2] > self.bx.hi[2] {
                    self.done = true;
                }
            }
        }
        Some(out)
    }
}
