//! Elastic operator: matrix-free application, diagonal and post-processing
//!
//! The operator acts on node fields with `dim` displacement components and
//! two ghost layers. Interior rows discretize
//! ```text
//! f_i = -(C_ijkl u_k,lj + C_ijkl,j u_k,l)
//! ```
//! and boundary rows are resolved per component from the BC matrix:
//! `u_p` for a prescribed displacement, `∓σ(p,q)` for traction and
//! `∓∇u(p,q)` for Neumann, negative on low faces.

use log::{debug, info};
use nalgebra::Matrix3;
use rayon::prelude::*;

use super::masks::Masks;
use crate::bc::{BcMatrix, BcType, BoundaryRow};
use crate::error::{ElasticError, NodeIndex, Result};
use crate::grid::{Geometry, GridHierarchy, LevelArena, NodeField};
use crate::mechanics::strain::{kinematic_measure, n_components, pack};
use crate::mechanics::{energy_density, Stiffness};
use crate::numeric::stencil::d1;
use crate::numeric::{derivative, gradient, hessian, Offset, StencilType};

/// Ghost layers of the stiffness field.
pub const MODEL_NGHOST: usize = 2;

/// Ghost layers of displacement and residual fields.
pub const FIELD_NGHOST: usize = 2;

const CENTER: Offset = [0, 0, 0];

/// How `apply_bc` treats prescribed displacements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcMode {
    /// Prescribed components set to zero (correction equations)
    Homogeneous,
    /// Prescribed components set to their BC value
    Inhomogeneous,
}

#[inline]
pub(crate) fn shift(m: NodeIndex, o: Offset) -> NodeIndex {
    [m[0] + o[0], m[1] + o[1], m[2] + o[2]]
}

/// Operator rows at node `m` for every component.
///
/// `u(p, offset)` samples displacement component `p` and `c(offset)` the
/// stiffness around `m`.
pub(crate) fn node_apply<U, C>(
    geom: &Geometry,
    bc: &BcMatrix,
    m: NodeIndex,
    u: U,
    c: C,
) -> Result<[f64; 3]>
where
    U: Fn(usize, Offset) -> f64,
    C: Fn(Offset) -> Stiffness,
{
    let dim = geom.dim;
    let dx = &geom.dx;
    let sten = StencilType::at(geom, m);
    let gradu = gradient(&u, dim, dx, &sten);
    let mut f = [0.0; 3];

    if geom.on_boundary(m) {
        let sigma = c(CENTER).apply(&gradu);
        for p in 0..dim {
            f[p] = match bc.row(geom, m, p)? {
                BoundaryRow::Displacement { .. } => u(p, CENTER),
                BoundaryRow::Flux { terms, .. } => terms
                    .iter()
                    .flatten()
                    .map(|t| {
                        let q = t.face.dir;
                        match t.kind {
                            BcType::Traction => t.face.sign() * sigma[(p, q)],
                            BcType::Neumann => t.face.sign() * gradu[(p, q)],
                            BcType::Displacement => 0.0,
                        }
                    })
                    .sum(),
                BoundaryRow::Interior => 0.0,
            };
        }
        return Ok(f);
    }

    let hess = hessian(&u, dim, dx, &sten);
    let c0 = c(CENTER);
    for j in 0..dim {
        let g_j = Matrix3::from_fn(|k, l| hess[k][(l, j)]);
        let dc_j: Stiffness = derivative(&c, d1(j), dx, &sten);
        let a = c0.apply(&g_j);
        let b = dc_j.apply(&gradu);
        for i in 0..dim {
            f[i] -= a[(i, j)] + b[(i, j)];
        }
    }
    Ok(f)
}

/// Matrix-free nodal elasticity operator over a grid hierarchy.
#[derive(Debug, Clone)]
pub struct Elastic {
    pub(super) hierarchy: GridHierarchy,
    pub(super) bc: BcMatrix,
    pub(super) models: LevelArena<Option<NodeField<Stiffness>>>,
    pub(super) diag: LevelArena<Option<NodeField<f64>>>,
    pub(super) masks: Masks,
}

impl Elastic {
    /// Define the operator on a hierarchy.
    ///
    /// # Errors
    /// `InvalidBc` if the BC matrix leaves a non-periodic face unassigned.
    pub fn define(hierarchy: GridHierarchy, bc: BcMatrix) -> Result<Self> {
        let mut op = Self {
            models: LevelArena::from_shape(hierarchy.geoms(), |_, _| None),
            diag: LevelArena::from_shape(hierarchy.geoms(), |_, _| None),
            hierarchy,
            bc,
            masks: Masks::new(),
        };
        op.check_bc()?;
        op.masks.build(&op.hierarchy, &op.bc)?;
        info!(
            "Elastic operator: {}D, {} AMR levels, {} MG levels on level 0",
            op.dim(),
            op.num_amr_levels(),
            op.num_mg_levels(0)
        );
        Ok(op)
    }

    /// Replace the hierarchy. Models, diagonals and masks are discarded.
    pub fn redefine(&mut self, hierarchy: GridHierarchy) -> Result<()> {
        self.models = LevelArena::from_shape(hierarchy.geoms(), |_, _| None);
        self.diag = LevelArena::from_shape(hierarchy.geoms(), |_, _| None);
        self.hierarchy = hierarchy;
        self.check_bc()?;
        self.masks.invalidate();
        self.masks.build(&self.hierarchy, &self.bc)
    }

    fn check_bc(&self) -> Result<()> {
        for amrlev in 0..self.num_amr_levels() {
            self.bc.validate(self.hierarchy.geom(amrlev, 0))?;
        }
        Ok(())
    }

    pub fn hierarchy(&self) -> &GridHierarchy {
        &self.hierarchy
    }

    pub fn bc(&self) -> &BcMatrix {
        &self.bc
    }

    pub fn masks(&self) -> &Masks {
        &self.masks
    }

    pub fn dim(&self) -> usize {
        self.hierarchy.dim()
    }

    pub fn num_amr_levels(&self) -> usize {
        self.hierarchy.num_amr_levels()
    }

    pub fn num_mg_levels(&self, amrlev: usize) -> usize {
        self.hierarchy.num_mg_levels(amrlev)
    }

    pub fn geom(&self, amrlev: usize, mglev: usize) -> &Geometry {
        self.hierarchy.geom(amrlev, mglev)
    }

    /// Zero displacement field with operator ghost width on a level.
    pub fn make_field(&self, amrlev: usize, mglev: usize) -> NodeField<f64> {
        NodeField::new(
            self.hierarchy.layout(amrlev, mglev),
            self.dim(),
            FIELD_NGHOST,
            0.0,
        )
    }

    /// Set the stiffness field of an AMR level (finest MG level).
    ///
    /// The field may live on any layout covering the level; it is copied
    /// onto the level layout and its ghosts are refreshed. Coarser MG levels
    /// and cached diagonals of the level are cleared.
    pub fn set_model(&mut self, amrlev: usize, model: &NodeField<Stiffness>) -> Result<()> {
        for fab in model.fabs() {
            for m in fab.valid_box().iter() {
                if !fab[(m, 0)].is_finite() {
                    return Err(ElasticError::NumericalCorruption {
                        quantity: "stiffness",
                        node: m,
                        component: 0,
                    });
                }
            }
        }
        let geom = self.hierarchy.geom(amrlev, 0);
        let mut field = NodeField::new(
            self.hierarchy.layout(amrlev, 0),
            1,
            MODEL_NGHOST,
            Stiffness::zero(),
        );
        field.parallel_copy(model, geom, MODEL_NGHOST);
        super::coefficients::fill_boundary_coeff(&mut field, geom);
        *self.models.get_mut(amrlev, 0) = Some(field);
        for mglev in 0..self.num_mg_levels(amrlev) {
            if mglev > 0 {
                *self.models.get_mut(amrlev, mglev) = None;
            }
            *self.diag.get_mut(amrlev, mglev) = None;
        }
        debug!("model set on AMR level {}", amrlev);
        Ok(())
    }

    /// Same stiffness everywhere, on every AMR level.
    pub fn set_uniform_model(&mut self, c: Stiffness) -> Result<()> {
        for amrlev in 0..self.num_amr_levels() {
            let field = NodeField::new(self.hierarchy.layout(amrlev, 0), 1, MODEL_NGHOST, c);
            self.set_model(amrlev, &field)?;
        }
        Ok(())
    }

    /// Stiffness field of a level.
    pub fn model(&self, amrlev: usize, mglev: usize) -> Result<&NodeField<Stiffness>> {
        self.models
            .get(amrlev, mglev)
            .as_ref()
            .ok_or(ElasticError::MissingModel { amrlev, mglev })
    }

    /// Masks, coarse coefficients and every diagonal, ready for relaxation.
    pub fn prepare(&mut self) -> Result<()> {
        self.masks.build(&self.hierarchy, &self.bc)?;
        self.average_down_coeffs()?;
        for amrlev in 0..self.num_amr_levels() {
            for mglev in 0..self.num_mg_levels(amrlev) {
                self.compute_diagonal(amrlev, mglev)?;
            }
        }
        Ok(())
    }

    /// Set prescribed displacement components and refresh ghosts.
    pub fn apply_bc(
        &self,
        amrlev: usize,
        mglev: usize,
        u: &mut NodeField<f64>,
        mode: BcMode,
    ) -> Result<()> {
        let geom = self.hierarchy.geom(amrlev, mglev);
        let dim = geom.dim;
        let bc = &self.bc;
        u.fabs_mut().par_iter_mut().try_for_each(|fab| -> Result<()> {
            for m in fab.valid_box().iter() {
                if !geom.on_boundary(m) {
                    continue;
                }
                for p in 0..dim {
                    if let BoundaryRow::Displacement { value } = bc.row(geom, m, p)? {
                        fab[(m, p)] = match mode {
                            BcMode::Homogeneous => 0.0,
                            BcMode::Inhomogeneous => value,
                        };
                    }
                }
            }
            Ok(())
        })?;
        u.fill_boundary(geom);
        Ok(())
    }

    fn check_field(&self, amrlev: usize, mglev: usize, f: &NodeField<f64>, what: &str) -> Result<()> {
        if !f.layout().is_iteration_compatible(self.hierarchy.layout(amrlev, mglev)) {
            return Err(ElasticError::IncompatibleLayouts(format!(
                "{} is not on the layout of level ({}, {})",
                what, amrlev, mglev
            )));
        }
        if f.ncomp() < self.dim() {
            return Err(ElasticError::IncompatibleLayouts(format!(
                "{} has {} components, need {}",
                what,
                f.ncomp(),
                self.dim()
            )));
        }
        Ok(())
    }

    /// `out = A u` on every valid node of `out` and one ghost layer inside
    /// the domain, where `out` stores it.
    ///
    /// `u` needs `FIELD_NGHOST` ghost layers, already filled.
    pub fn fapply(
        &self,
        amrlev: usize,
        mglev: usize,
        out: &mut NodeField<f64>,
        u: &NodeField<f64>,
    ) -> Result<()> {
        self.check_field(amrlev, mglev, out, "output")?;
        self.check_field(amrlev, mglev, u, "input")?;
        if u.ngrow() < FIELD_NGHOST {
            return Err(ElasticError::IncompatibleLayouts(format!(
                "input has {} ghost layers, need {}",
                u.ngrow(),
                FIELD_NGHOST
            )));
        }
        let model = self.model(amrlev, mglev)?;
        let geom = self.hierarchy.geom(amrlev, mglev);
        let bc = &self.bc;
        let dim = geom.dim;

        out.fabs_mut()
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(i, ofab)| -> Result<()> {
                let ufab = u.fab(i);
                let cfab = model.fab(i);
                let region = ofab
                    .valid_box()
                    .grow(1, dim)
                    .intersect(&ofab.fab_box())
                    .and_then(|r| r.intersect(&geom.domain));
                let Some(region) = region else {
                    return Ok(());
                };
                for m in region.iter() {
                    let f = node_apply(
                        geom,
                        bc,
                        m,
                        |p, o| ufab[(shift(m, o), p)],
                        |o| cfab[(shift(m, o), 0)],
                    )?;
                    for p in 0..dim {
                        ofab[(m, p)] = f[p];
                    }
                }
                Ok(())
            })
    }

    /// `r = b - A u`; `u` ghosts must be filled.
    pub fn residual(
        &self,
        amrlev: usize,
        mglev: usize,
        r: &mut NodeField<f64>,
        u: &NodeField<f64>,
        b: &NodeField<f64>,
    ) -> Result<()> {
        self.fapply(amrlev, mglev, r, u)?;
        r.scale(-1.0);
        r.saxpy(1.0, b)
    }

    fn build_diagonal(&self, amrlev: usize, mglev: usize) -> Result<NodeField<f64>> {
        let model = self.model(amrlev, mglev)?;
        let geom = self.hierarchy.geom(amrlev, mglev);
        let bc = &self.bc;
        let dim = geom.dim;
        let mut diag = NodeField::new(self.hierarchy.layout(amrlev, mglev), dim, 0, 0.0);
        diag.fabs_mut()
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(i, dfab)| -> Result<()> {
                let cfab = model.fab(i);
                for m in dfab.valid_box().iter() {
                    for p in 0..dim {
                        let impulse = |q: usize, o: Offset| {
                            if q == p && o == CENTER {
                                1.0
                            } else {
                                0.0
                            }
                        };
                        let f = node_apply(geom, bc, m, impulse, |o| cfab[(shift(m, o), 0)])?;
                        ElasticError::check_finite(f[p], "diagonal", m, p)?;
                        dfab[(m, p)] = f[p];
                    }
                }
                Ok(())
            })?;
        Ok(diag)
    }

    /// Compute and cache the operator diagonal of a level.
    pub fn compute_diagonal(&mut self, amrlev: usize, mglev: usize) -> Result<()> {
        let d = self.build_diagonal(amrlev, mglev)?;
        *self.diag.get_mut(amrlev, mglev) = Some(d);
        Ok(())
    }

    /// Cached diagonal of a level.
    pub fn diagonal(&self, amrlev: usize, mglev: usize) -> Result<&NodeField<f64>> {
        self.cached_diagonal(amrlev, mglev, "diagonal")
    }

    pub(super) fn cached_diagonal(
        &self,
        amrlev: usize,
        mglev: usize,
        caller: &'static str,
    ) -> Result<&NodeField<f64>> {
        self.diag
            .get(amrlev, mglev)
            .as_ref()
            .ok_or(ElasticError::DiagonalNotComputed(caller))
    }

    /// `x = x / diag`
    pub fn normalize(&self, amrlev: usize, mglev: usize, x: &mut NodeField<f64>) -> Result<()> {
        let diag = self.cached_diagonal(amrlev, mglev, "normalize")?;
        x.divide(diag)
    }

    /// `x - A(x / diag)`
    pub fn error0x(&self, amrlev: usize, mglev: usize, x: &NodeField<f64>) -> Result<NodeField<f64>> {
        let diag = self.cached_diagonal(amrlev, mglev, "error0x")?;
        let geom = self.hierarchy.geom(amrlev, mglev);
        let mut y = self.make_field(amrlev, mglev);
        y.copy_from(x)?;
        y.divide(diag)?;
        y.fill_boundary(geom);
        let mut ay = self.make_field(amrlev, mglev);
        self.fapply(amrlev, mglev, &mut ay, &y)?;
        let mut out = NodeField::new(x.layout(), x.ncomp(), 0, 0.0);
        out.copy_from(x)?;
        out.saxpy(-1.0, &ay)?;
        Ok(out)
    }

    /// Evaluate a per-node quantity from ∇u and the local stiffness on the
    /// finest MG level of `amrlev`.
    fn pointwise<F>(&self, amrlev: usize, u: &NodeField<f64>, ncomp: usize, f: F) -> Result<NodeField<f64>>
    where
        F: Fn(&Matrix3<f64>, &Stiffness) -> Vec<f64> + Sync,
    {
        let model = self.model(amrlev, 0)?;
        let geom = self.hierarchy.geom(amrlev, 0);
        let layout = self.hierarchy.layout(amrlev, 0);
        let dim = geom.dim;
        let mut uu = NodeField::new(layout, dim, FIELD_NGHOST, 0.0);
        uu.parallel_copy(u, geom, FIELD_NGHOST);
        let mut out = NodeField::new(layout, ncomp, 0, 0.0);
        out.fabs_mut()
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, ofab)| {
                let ufab = uu.fab(i);
                let cfab = model.fab(i);
                for m in ofab.valid_box().iter() {
                    let sten = StencilType::at(geom, m);
                    let gradu = gradient(|p, o| ufab[(shift(m, o), p)], dim, &geom.dx, &sten);
                    for (c, v) in f(&gradu, &cfab[(m, 0)]).into_iter().enumerate() {
                        ofab[(m, c)] = v;
                    }
                }
            });
        Ok(out)
    }

    /// Strain (sym ∇u), or F = I + ∇u for models written in F.
    pub fn strain(&self, amrlev: usize, u: &NodeField<f64>, voigt: bool) -> Result<NodeField<f64>> {
        let dim = self.dim();
        self.pointwise(amrlev, u, n_components(dim, voigt), |gradu, c| {
            pack(&kinematic_measure(gradu, c.kinematic_variable()), dim, voigt)
        })
    }

    /// Stress σ = C(∇u).
    pub fn stress(&self, amrlev: usize, u: &NodeField<f64>, voigt: bool) -> Result<NodeField<f64>> {
        let dim = self.dim();
        self.pointwise(amrlev, u, n_components(dim, voigt), |gradu, c| {
            pack(&c.stress(gradu), dim, voigt)
        })
    }

    /// Energy density tr(∇uᵀ σ).
    pub fn energy(&self, amrlev: usize, u: &NodeField<f64>) -> Result<NodeField<f64>> {
        self.pointwise(amrlev, u, 1, |gradu, c| vec![energy_density(gradu, &c.stress(gradu))])
    }
}
