/// Level geometry: node domain, spacing and periodicity
///
/// The node domain of a level with `n` cells in direction `d` spans nodes
/// `lo[d]..=lo[d] + n`. In a periodic direction the last node is an image of
/// the first one.

use super::node_box::NodeBox;
use crate::error::{ElasticError, NodeIndex, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    /// Spatial dimension, 2 or 3
    pub dim: usize,
    /// Node-centered index domain
    pub domain: NodeBox,
    /// Grid spacing per direction
    pub dx: [f64; 3],
    /// Physical position of `domain.lo`
    pub prob_lo: [f64; 3],
    /// Periodicity flags
    pub periodic: [bool; 3],
}

impl Geometry {
    /// Build a level-0 geometry from cell counts and physical extents.
    ///
    /// # Arguments
    /// * `dim` - 2 or 3
    /// * `n_cells` - Number of cells per direction (third ignored in 2D)
    /// * `prob_lo`, `prob_hi` - Physical bounding box
    /// * `periodic` - Periodicity flags
    pub fn new(
        dim: usize,
        n_cells: [usize; 3],
        prob_lo: [f64; 3],
        prob_hi: [f64; 3],
        periodic: [bool; 3],
    ) -> Result<Self> {
        if dim != 2 && dim != 3 {
            return Err(ElasticError::Config(format!("dimension must be 2 or 3, got {}", dim)));
        }
        let mut hi = [0isize; 3];
        let mut dx = [1.0; 3];
        let mut periodic_eff = [false; 3];
        for d in 0..dim {
            if n_cells[d] == 0 {
                return Err(ElasticError::Config(format!("zero cells in direction {}", d)));
            }
            // one-sided stencils reach two nodes inward
            if n_cells[d] < 2 && !periodic[d] {
                return Err(ElasticError::Config(format!(
                    "direction {} needs at least 2 cells when not periodic, got {}",
                    d, n_cells[d]
                )));
            }
            if prob_hi[d] <= prob_lo[d] {
                return Err(ElasticError::Config(format!(
                    "empty physical extent in direction {}",
                    d
                )));
            }
            hi[d] = n_cells[d] as isize;
            dx[d] = (prob_hi[d] - prob_lo[d]) / n_cells[d] as f64;
            periodic_eff[d] = periodic[d];
        }
        Ok(Self {
            dim,
            domain: NodeBox::new([0, 0, 0], hi),
            dx,
            prob_lo,
            periodic: periodic_eff,
        })
    }

    /// Number of cells along direction `d`.
    pub fn n_cells(&self, d: usize) -> usize {
        self.domain.len(d) - 1
    }

    /// The coarsened domain must keep at least two cells per direction, since
    /// one-sided boundary stencils reach two nodes inward.
    pub fn is_coarsenable(&self) -> bool {
        (0..self.dim).all(|d| self.n_cells(d) >= 4 && self.n_cells(d) % 2 == 0)
    }

    pub fn coarsen(&self) -> Geometry {
        let mut g = self.clone();
        g.domain = self.domain.coarsen(self.dim);
        for d in 0..self.dim {
            g.dx[d] *= 2.0;
        }
        g
    }

    pub fn refine(&self) -> Geometry {
        let mut g = self.clone();
        g.domain = self.domain.refine(self.dim);
        for d in 0..self.dim {
            g.dx[d] *= 0.5;
        }
        g
    }

    pub fn node_position(&self, m: NodeIndex) -> [f64; 3] {
        let mut x = [0.0; 3];
        for d in 0..self.dim {
            x[d] = self.prob_lo[d] + (m[d] - self.domain.lo[d]) as f64 * self.dx[d];
        }
        x
    }

    /// True if `m` lies on the non-periodic low face in direction `d`.
    #[inline]
    pub fn on_low_face(&self, m: NodeIndex, d: usize) -> bool {
        !self.periodic[d] && m[d] == self.domain.lo[d]
    }

    #[inline]
    pub fn on_high_face(&self, m: NodeIndex, d: usize) -> bool {
        !self.periodic[d] && m[d] == self.domain.hi[d]
    }

    pub fn on_boundary(&self, m: NodeIndex) -> bool {
        (0..self.dim).any(|d| self.on_low_face(m, d) || self.on_high_face(m, d))
    }

    /// Map a node to its canonical periodic image.
    ///
    /// Returns `None` if the node lies outside the domain in a non-periodic
    /// direction. Periodic directions map into `lo..lo + n_cells`.
    pub fn wrap(&self, m: NodeIndex) -> Option<NodeIndex> {
        let mut w = m;
        for d in 0..self.dim {
            let lo = self.domain.lo[d];
            if self.periodic[d] {
                let n = self.n_cells(d) as isize;
                w[d] = lo + (m[d] - lo).rem_euclid(n);
            } else if m[d] < lo || m[d] > self.domain.hi[d] {
                return None;
            }
        }
        Some(w)
    }

    /// Closest node inside the domain, wrapping periodic directions.
    pub fn clamp(&self, m: NodeIndex) -> NodeIndex {
        let mut c = m;
        for d in 0..self.dim {
            if self.periodic[d] {
                let lo = self.domain.lo[d];
                let n = self.n_cells(d) as isize;
                c[d] = lo + (m[d] - lo).rem_euclid(n);
            } else {
                c[d] = m[d].clamp(self.domain.lo[d], self.domain.hi[d]);
            }
        }
        c
    }
}
