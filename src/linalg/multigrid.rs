//! Geometric multigrid solver for the nodal elastic operator
//!
//! V-cycles in correction form on AMR level 0:
//! ```text
//! r = b - A u
//! repeat:
//!     e = Vcycle(0, r);  u += e;  r = b - A u
//! until |r| <= max(tol_rel |r0|, tol_abs)
//! ```
//! Coarse operators are rediscretized from averaged-down coefficients. The
//! coarsest level is assembled by probing and solved with a dense LU.

use std::time::Instant;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::direct::DirectSolver;
use super::solver::SolverStats;
use crate::error::{ElasticError, Result};
use crate::grid::NodeField;
use crate::operator::{AssembledOperator, BcMode, Elastic};

/// Relaxation used inside the V-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmootherKind {
    /// Weighted Jacobi
    #[default]
    Approximate,
    /// Red-black Gauss-Seidel
    Exact,
}

impl SmootherKind {
    pub fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_lowercase().as_str() {
            "approximate" | "jacobi" => Ok(SmootherKind::Approximate),
            "exact" | "gauss_seidel" | "gs" => Ok(SmootherKind::Exact),
            _ => Err(format!("Unknown smoother: '{}'", s)),
        }
    }

    pub fn valid_types() -> &'static [&'static str] {
        &["approximate", "exact"]
    }
}

/// Multigrid solver parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultigridConfig {
    /// Stop when |r| <= tol_rel * |r0|
    pub tol_rel: f64,
    /// Stop when |r| <= tol_abs
    pub tol_abs: f64,
    /// Maximum number of V-cycles
    pub max_iter: usize,
    /// Smoothing sweeps before the coarse-grid correction
    pub pre_smooth: usize,
    /// Smoothing sweeps after the coarse-grid correction
    pub post_smooth: usize,
    pub smoother: SmootherKind,
    /// Maximum number of coarsenings of AMR level 0
    pub max_coarsening_level: usize,
    /// Largest bottom system handed to the dense LU
    pub bottom_max_unknowns: usize,
}

impl Default for MultigridConfig {
    fn default() -> Self {
        Self {
            tol_rel: 1e-10,
            tol_abs: 0.0,
            max_iter: 100,
            pre_smooth: 2,
            post_smooth: 2,
            smoother: SmootherKind::Approximate,
            max_coarsening_level: 30,
            bottom_max_unknowns: 20_000,
        }
    }
}

struct Bottom {
    solver: DirectSolver,
    operator: AssembledOperator,
}

/// V-cycle driver over an `Elastic` operator.
pub struct MultigridSolver {
    config: MultigridConfig,
    bottom: Option<Bottom>,
}

impl MultigridSolver {
    pub fn new(config: MultigridConfig) -> Self {
        Self {
            config,
            bottom: None,
        }
    }

    pub fn config(&self) -> &MultigridConfig {
        &self.config
    }

    /// Solve `A u = b` on AMR level 0, starting from `u`.
    ///
    /// Prescribed displacements are imposed on `u` first. `u` and `b` live on
    /// the level-0 layout; `u` needs the operator's ghost width.
    ///
    /// # Errors
    /// `Unimplemented` for more than one AMR level, `BottomSolve` for a
    /// singular or oversized coarsest level, and any operator error.
    pub fn solve(
        &mut self,
        op: &mut Elastic,
        u: &mut NodeField<f64>,
        b: &NodeField<f64>,
    ) -> Result<SolverStats> {
        let start = Instant::now();
        if op.num_amr_levels() > 1 {
            return Err(ElasticError::Unimplemented {
                feature: "composite solve over several AMR levels",
            });
        }
        op.prepare()?;
        let op: &Elastic = op;
        self.setup_bottom(op)?;

        let geom = op.geom(0, 0);
        let mask = op.masks().owner(0, 0);
        op.apply_bc(0, 0, u, BcMode::Inhomogeneous)?;
        let mut r = op.make_field(0, 0);
        op.residual(0, 0, &mut r, u, b)?;
        let r0 = r.norm2(mask)?;
        info!(
            "MG: {} levels, initial residual {:.3e}",
            op.num_mg_levels(0),
            r0
        );

        let mut stats = SolverStats::new();
        stats.residual_norm = r0;
        stats.relative_residual = if r0 > 0.0 { 1.0 } else { 0.0 };
        stats.converged = r0 <= self.config.tol_abs || r0 == 0.0;

        let mut e = op.make_field(0, 0);
        while !stats.converged && stats.iterations < self.config.max_iter {
            self.vcycle(op, 0, &mut e, &r)?;
            u.saxpy(1.0, &e)?;
            u.fill_boundary(geom);
            op.residual(0, 0, &mut r, u, b)?;
            let rn = r.norm2(mask)?;
            if !rn.is_finite() {
                let (node, component) = r.find_non_finite().unwrap_or(([0; 3], 0));
                return Err(ElasticError::NumericalCorruption {
                    quantity: "residual",
                    node,
                    component,
                });
            }
            stats.iterations += 1;
            stats.residual_norm = rn;
            stats.relative_residual = rn / r0;
            stats.converged = rn <= self.config.tol_rel * r0 || rn <= self.config.tol_abs;
            debug!(
                "MG iter {}: |r| = {:.3e}, |r|/|r0| = {:.3e}",
                stats.iterations, rn, stats.relative_residual
            );
        }
        stats.solve_time = start.elapsed().as_secs_f64();

        if stats.converged {
            info!(
                "MG converged in {} iterations, |r|/|r0| = {:.3e} ({:.3}s)",
                stats.iterations, stats.relative_residual, stats.solve_time
            );
        } else {
            warn!(
                "MG did not converge in {} iterations, |r|/|r0| = {:.3e}",
                stats.iterations, stats.relative_residual
            );
        }
        Ok(stats)
    }

    fn setup_bottom(&mut self, op: &Elastic) -> Result<()> {
        let bottom = op.num_mg_levels(0) - 1;
        let operator = op.assemble(0, bottom)?;
        if operator.len() > self.config.bottom_max_unknowns {
            return Err(ElasticError::BottomSolve(format!(
                "coarsest level has {} unknowns (limit {}); use a coarsenable domain",
                operator.len(),
                self.config.bottom_max_unknowns
            )));
        }
        let mut solver = DirectSolver::new();
        solver.factor(&operator.matrix)?;
        debug!("{} on {} bottom unknowns", solver.name(), operator.len());
        self.bottom = Some(Bottom { solver, operator });
        Ok(())
    }

    fn relax(&self, op: &Elastic, mglev: usize, e: &mut NodeField<f64>, r: &NodeField<f64>) -> Result<()> {
        match self.config.smoother {
            SmootherKind::Approximate => op.smooth(0, mglev, e, r),
            SmootherKind::Exact => op.smooth_exact(0, mglev, e, r),
        }
    }

    /// Approximate `A e = r` on `mglev`, overwriting `e`.
    fn vcycle(&self, op: &Elastic, mglev: usize, e: &mut NodeField<f64>, r: &NodeField<f64>) -> Result<()> {
        if mglev + 1 == op.num_mg_levels(0) {
            return self.bottom_solve(op, e, r);
        }
        e.set_val(0.0);
        for _ in 0..self.config.pre_smooth {
            self.relax(op, mglev, e, r)?;
        }

        let mut res = op.make_field(0, mglev);
        op.residual(0, mglev, &mut res, e, r)?;
        let mut rc = op.make_field(0, mglev + 1);
        op.restriction(0, mglev + 1, &mut rc, &mut res)?;
        let mut ec = op.make_field(0, mglev + 1);
        self.vcycle(op, mglev + 1, &mut ec, &rc)?;
        op.interpolation(0, mglev, e, &ec)?;
        e.fill_boundary(op.geom(0, mglev));

        for _ in 0..self.config.post_smooth {
            self.relax(op, mglev, e, r)?;
        }
        Ok(())
    }

    fn bottom_solve(&self, op: &Elastic, e: &mut NodeField<f64>, r: &NodeField<f64>) -> Result<()> {
        let bottom = self
            .bottom
            .as_ref()
            .ok_or_else(|| ElasticError::BottomSolve("bottom level not set up".into()))?;
        let rhs = bottom.operator.gather(r)?;
        let (x, _) = bottom.solver.solve_factored(&rhs)?;
        bottom.operator.scatter(&x, e)?;
        e.fill_boundary(op.geom(0, op.num_mg_levels(0) - 1));
        Ok(())
    }
}
