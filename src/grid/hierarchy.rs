/// AMR / multigrid level hierarchy
///
/// Level data is stored in a flat `LevelArena` indexed by `(amrlev, mglev)`.
/// AMR level 0 is coarsened by factors of two for as long as its boxes allow;
/// finer AMR levels carry a single MG level.

use log::{info, warn};

use super::geometry::Geometry;
use super::layout::BoxLayout;
use crate::error::{ElasticError, Result};

/// Flat storage for per-(amrlev, mglev) data.
#[derive(Debug, Clone)]
pub struct LevelArena<T> {
    offsets: Vec<usize>,
    data: Vec<T>,
}

impl<T> LevelArena<T> {
    /// Build from per-AMR-level vectors of MG-level entries.
    pub fn from_nested(nested: Vec<Vec<T>>) -> Self {
        let mut offsets = Vec::with_capacity(nested.len() + 1);
        let mut data = Vec::new();
        offsets.push(0);
        for level in nested {
            data.extend(level);
            offsets.push(data.len());
        }
        Self { offsets, data }
    }

    /// Same shape as `other`, filled with `f(amrlev, mglev)`.
    pub fn from_shape<U, F>(other: &LevelArena<U>, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let nested = (0..other.num_amr_levels())
            .map(|a| (0..other.num_mg_levels(a)).map(|m| f(a, m)).collect())
            .collect();
        Self::from_nested(nested)
    }

    pub fn num_amr_levels(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn num_mg_levels(&self, amrlev: usize) -> usize {
        self.offsets[amrlev + 1] - self.offsets[amrlev]
    }

    #[inline]
    fn slot(&self, amrlev: usize, mglev: usize) -> usize {
        assert!(
            mglev < self.num_mg_levels(amrlev),
            "MG level {} out of range on AMR level {}",
            mglev,
            amrlev
        );
        self.offsets[amrlev] + mglev
    }

    pub fn get(&self, amrlev: usize, mglev: usize) -> &T {
        &self.data[self.slot(amrlev, mglev)]
    }

    pub fn get_mut(&mut self, amrlev: usize, mglev: usize) -> &mut T {
        let s = self.slot(amrlev, mglev);
        &mut self.data[s]
    }

    /// Mutable access to a fine and the next coarser MG level at once.
    pub fn pair_mut(&mut self, amrlev: usize, fine_mglev: usize) -> (&mut T, &mut T) {
        let f = self.slot(amrlev, fine_mglev);
        let c = self.slot(amrlev, fine_mglev + 1);
        let (lo, hi) = self.data.split_at_mut(c);
        (&mut lo[f], &mut hi[0])
    }

    /// Entries of one AMR level, finest MG level first.
    pub fn level(&self, amrlev: usize) -> &[T] {
        &self.data[self.offsets[amrlev]..self.offsets[amrlev + 1]]
    }

    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), &T)> {
        (0..self.num_amr_levels()).flat_map(move |a| {
            self.level(a)
                .iter()
                .enumerate()
                .map(move |(m, v)| ((a, m), v))
        })
    }
}

/// Options controlling hierarchy construction.
#[derive(Debug, Clone)]
pub struct HierarchyInfo {
    /// Maximum number of coarsenings of AMR level 0
    pub max_coarsening_level: usize,
    /// Number of ranks the boxes are distributed over
    pub n_ranks: usize,
}

impl Default for HierarchyInfo {
    fn default() -> Self {
        Self {
            max_coarsening_level: 30,
            n_ranks: rayon::current_num_threads(),
        }
    }
}

/// Geometries and layouts for every (AMR level, MG level).
#[derive(Debug, Clone)]
pub struct GridHierarchy {
    geoms: LevelArena<Geometry>,
    layouts: LevelArena<BoxLayout>,
}

impl GridHierarchy {
    /// Build the hierarchy from one geometry and layout per AMR level.
    ///
    /// # Errors
    /// `Coarsenability` if AMR level n > 0 is not coarsenable by 2, or if its
    /// geometry is not the refinement of level n-1.
    pub fn new(geoms: &[Geometry], layouts: &[BoxLayout], info: &HierarchyInfo) -> Result<Self> {
        if geoms.is_empty() || geoms.len() != layouts.len() {
            return Err(ElasticError::Config(format!(
                "{} geometries for {} layouts",
                geoms.len(),
                layouts.len()
            )));
        }

        if info.n_ranks > layouts[0].len() {
            warn!(
                "More ranks than boxes on AMR level 0 (ranks = {}, boxes = {}); \
                 decrease max_grid_size for proper scaling",
                info.n_ranks,
                layouts[0].len()
            );
        }

        for amrlev in 1..geoms.len() {
            if let Some(bad) = layouts[amrlev]
                .boxes()
                .iter()
                .find(|b| !b.is_coarsenable(geoms[amrlev].dim))
            {
                return Err(ElasticError::Coarsenability {
                    amrlev,
                    bx: bad.to_string(),
                });
            }
            if geoms[amrlev].domain != geoms[amrlev - 1].refine().domain {
                return Err(ElasticError::Coarsenability {
                    amrlev,
                    bx: geoms[amrlev].domain.to_string(),
                });
            }
        }

        let mut geom_levels = Vec::with_capacity(geoms.len());
        let mut layout_levels = Vec::with_capacity(geoms.len());

        let mut g0 = vec![geoms[0].clone()];
        let mut l0 = vec![layouts[0].clone()];
        while g0.len() <= info.max_coarsening_level {
            let (g, l) = (&g0[g0.len() - 1], &l0[l0.len() - 1]);
            if !g.is_coarsenable() || !l.is_coarsenable() {
                break;
            }
            let (gc, lc) = (g.coarsen(), l.coarsen());
            g0.push(gc);
            l0.push(lc);
        }
        info!("AMR level 0: {} MG levels", g0.len());
        geom_levels.push(g0);
        layout_levels.push(l0);

        for amrlev in 1..geoms.len() {
            geom_levels.push(vec![geoms[amrlev].clone()]);
            layout_levels.push(vec![layouts[amrlev].clone()]);
        }

        Ok(Self {
            geoms: LevelArena::from_nested(geom_levels),
            layouts: LevelArena::from_nested(layout_levels),
        })
    }

    /// Single AMR level chopped into boxes of `max_grid_size` cells.
    pub fn single_level(geom: Geometry, max_grid_size: usize, info: &HierarchyInfo) -> Result<Self> {
        let layout = BoxLayout::chop(&geom, max_grid_size, info.n_ranks)?;
        Self::new(&[geom], &[layout], info)
    }

    pub fn num_amr_levels(&self) -> usize {
        self.geoms.num_amr_levels()
    }

    pub fn num_mg_levels(&self, amrlev: usize) -> usize {
        self.geoms.num_mg_levels(amrlev)
    }

    pub fn geom(&self, amrlev: usize, mglev: usize) -> &Geometry {
        self.geoms.get(amrlev, mglev)
    }

    pub fn layout(&self, amrlev: usize, mglev: usize) -> &BoxLayout {
        self.layouts.get(amrlev, mglev)
    }

    pub fn dim(&self) -> usize {
        self.geoms.get(0, 0).dim
    }

    pub fn geoms(&self) -> &LevelArena<Geometry> {
        &self.geoms
    }

    /// Replace the layout of one level, e.g. with a different distribution map.
    ///
    /// The boxes must cover the same coarsened index space.
    pub fn set_layout(&mut self, amrlev: usize, mglev: usize, layout: BoxLayout) {
        *self.layouts.get_mut(amrlev, mglev) = layout;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::NodeBox;

    fn info() -> HierarchyInfo {
        HierarchyInfo {
            max_coarsening_level: 30,
            n_ranks: 1,
        }
    }

    #[test]
    fn test_level_zero_coarsens_to_domain_limit() {
        let g = Geometry::new(2, [16, 8, 0], [0.0; 3], [2.0, 1.0, 0.0], [false; 3]).unwrap();
        let h = GridHierarchy::single_level(g, 8, &info()).unwrap();
        // 16x8 -> 8x4 -> 4x2; a further halving would leave one cell in y
        assert_eq!(h.num_mg_levels(0), 3);
        assert_eq!(h.geom(0, 2).domain.hi, [4, 2, 0]);
        assert_eq!(h.layout(0, 2).len(), 2);
    }

    #[test]
    fn test_max_coarsening_level() {
        let g = Geometry::new(2, [16, 16, 0], [0.0; 3], [1.0; 3], [false; 3]).unwrap();
        let mut inf = info();
        inf.max_coarsening_level = 1;
        let h = GridHierarchy::single_level(g, 16, &inf).unwrap();
        assert_eq!(h.num_mg_levels(0), 2);
    }

    #[test]
    fn test_fine_amr_level_must_be_coarsenable() {
        let g0 = Geometry::new(2, [8, 8, 0], [0.0; 3], [1.0; 3], [false; 3]).unwrap();
        let g1 = g0.refine();
        let l0 = BoxLayout::single(&g0);
        let bad = BoxLayout::new(2, vec![NodeBox::new([3, 4, 0], [9, 8, 0])], vec![0]).unwrap();
        let err = GridHierarchy::new(&[g0.clone(), g1.clone()], &[l0.clone(), bad], &info());
        assert!(matches!(err, Err(ElasticError::Coarsenability { amrlev: 1, .. })));

        let good = BoxLayout::new(2, vec![NodeBox::new([4, 4, 0], [10, 8, 0])], vec![0]).unwrap();
        let h = GridHierarchy::new(&[g0, g1], &[l0, good], &info()).unwrap();
        assert_eq!(h.num_amr_levels(), 2);
        assert_eq!(h.num_mg_levels(1), 1);
    }

    #[test]
    fn test_arena_pair_mut() {
        let mut a = LevelArena::from_nested(vec![vec![1, 2, 3], vec![10]]);
        {
            let (f, c) = a.pair_mut(0, 1);
            *c += *f;
        }
        assert_eq!(*a.get(0, 2), 5);
        assert_eq!(a.iter().count(), 4);
        assert_eq!(*a.get(1, 0), 10);
    }
}
