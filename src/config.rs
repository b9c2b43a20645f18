//! Configuration for single-level elasticity problems
//!
//! Reads TOML configuration files and provides structured data for setting up
//! the domain, boundary conditions, material model, loading and multigrid
//! solver parameters. Every section has defaults, so an empty file describes
//! a 2D clamped bar with roller sides under a unit body force.
//!
//! ```toml
//! body_force = [1.0, 0.0, 0.0]
//!
//! [domain]
//! dim = 2
//! n_cells = [32, 8, 0]
//! prob_hi = [4.0, 1.0, 0.0]
//!
//! [boundary_conditions]
//! preset = "clamped_bar"
//!
//! [[boundary_conditions.faces]]
//! face = "yhi"
//! component = 1
//! type = "traction"
//! value = -0.1
//!
//! [material.model]
//! type = "isotropic"
//! lambda = 1.0
//! mu = 1.0
//! ```

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::bc::{BcMatrix, BcType, Face};
use crate::error::{ElasticError, Result};
use crate::grid::{Geometry, GridHierarchy, HierarchyInfo};
use crate::linalg::MultigridConfig;
use crate::mechanics::{KinematicVariable, MaterialModel, Stiffness};

/// Main problem configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ElasticConfig {
    /// Constant body force, one entry per direction
    #[serde(default = "default_body_force")]
    pub body_force: [f64; 3],
    #[serde(default)]
    pub domain: DomainConfig,
    #[serde(default)]
    pub boundary_conditions: BcConfig,
    #[serde(default)]
    pub material: MaterialConfig,
    #[serde(default)]
    pub solver: MultigridConfig,
}

fn default_body_force() -> [f64; 3] {
    [1.0, 0.0, 0.0]
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            body_force: default_body_force(),
            domain: DomainConfig::default(),
            boundary_conditions: BcConfig::default(),
            material: MaterialConfig::default(),
            solver: MultigridConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Spatial dimension (2 or 3)
    pub dim: usize,
    /// Number of cells per direction
    pub n_cells: [usize; 3],
    /// Physical lower corner
    pub prob_lo: [f64; 3],
    /// Physical upper corner
    pub prob_hi: [f64; 3],
    /// Periodicity per direction
    pub periodic: [bool; 3],
    /// Maximum box size in cells
    pub max_grid_size: usize,
    /// Number of ranks boxes are distributed over (default: rayon threads)
    pub n_ranks: Option<usize>,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            dim: 2,
            n_cells: [32, 8, 0],
            prob_lo: [0.0; 3],
            prob_hi: [4.0, 1.0, 0.0],
            periodic: [false; 3],
            max_grid_size: 16,
            n_ranks: None,
        }
    }
}

/// Boundary conditions: an optional preset, then per-face overrides.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BcConfig {
    /// Preset name, see `BcMatrix::valid_presets`
    pub preset: Option<String>,
    /// Displacement used by the tension-test presets
    pub disp: f64,
    /// Overrides applied in order after the preset
    pub faces: Vec<FaceBcConfig>,
}

impl Default for BcConfig {
    fn default() -> Self {
        Self {
            preset: Some("clamped_bar_rollers".to_string()),
            disp: 0.0,
            faces: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FaceBcConfig {
    /// Face label, e.g. "xlo"
    pub face: String,
    /// Component; all components when omitted
    pub component: Option<usize>,
    /// "displacement", "traction" or "neumann"
    #[serde(rename = "type")]
    pub bc_type: String,
    #[serde(default)]
    pub value: f64,
}

impl BcConfig {
    /// Build the BC matrix for a `dim`-dimensional domain.
    pub fn build(&self, dim: usize) -> Result<BcMatrix> {
        let mut bc = match &self.preset {
            Some(name) => BcMatrix::from_preset(name, dim, self.disp).map_err(|e| {
                ElasticError::Config(format!("{} (valid: {:?})", e, BcMatrix::valid_presets()))
            })?,
            None => BcMatrix::new(dim),
        };
        for entry in &self.faces {
            let face = Face::from_label(&entry.face).map_err(ElasticError::Config)?;
            if face.dir >= dim {
                return Err(ElasticError::Config(format!(
                    "face {} does not exist in {}D",
                    entry.face, dim
                )));
            }
            let ty = BcType::from_str(&entry.bc_type).map_err(|e| {
                ElasticError::Config(format!("{} (valid: {:?})", e, BcType::valid_types()))
            })?;
            match entry.component {
                Some(c) if c < dim => {
                    bc.set(face, c, ty, entry.value);
                }
                Some(c) => {
                    return Err(ElasticError::Config(format!(
                        "component {} out of range in {}D",
                        c, dim
                    )))
                }
                None => {
                    bc.set_face(face, ty, [entry.value; 3]);
                }
            }
        }
        Ok(bc)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MaterialConfig {
    pub model: MaterialModel,
    /// Overrides the model's kinematic variable ("gradu" or "F")
    pub kinematic_variable: Option<String>,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            model: MaterialModel::Isotropic {
                lambda: 1.0,
                mu: 1.0,
            },
            kinematic_variable: None,
        }
    }
}

impl MaterialConfig {
    /// Validated stiffness tensor of the configured model.
    pub fn stiffness(&self) -> Result<Stiffness> {
        self.model.validate()?;
        let c = self.model.stiffness();
        match &self.kinematic_variable {
            Some(s) => {
                let kinvar = KinematicVariable::from_str(s).map_err(ElasticError::Config)?;
                Ok(c.with_kinematic_variable(kinvar))
            }
            None => Ok(c),
        }
    }
}

impl ElasticConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: ElasticConfig = toml::from_str(s)?;
        Ok(config)
    }

    pub fn geometry(&self) -> Result<Geometry> {
        let d = &self.domain;
        Geometry::new(d.dim, d.n_cells, d.prob_lo, d.prob_hi, d.periodic)
    }

    pub fn hierarchy_info(&self) -> HierarchyInfo {
        let mut info = HierarchyInfo {
            max_coarsening_level: self.solver.max_coarsening_level,
            ..HierarchyInfo::default()
        };
        if let Some(n) = self.domain.n_ranks {
            info.n_ranks = n;
        }
        info
    }

    /// Single-AMR-level hierarchy for the configured domain.
    pub fn hierarchy(&self) -> Result<GridHierarchy> {
        GridHierarchy::single_level(
            self.geometry()?,
            self.domain.max_grid_size,
            &self.hierarchy_info(),
        )
    }

    /// BC matrix, checked against the geometry.
    pub fn bc(&self) -> Result<BcMatrix> {
        let bc = self.boundary_conditions.build(self.domain.dim)?;
        bc.validate(&self.geometry()?)?;
        Ok(bc)
    }

    /// Log a configuration summary
    pub fn log_summary(&self) {
        let d = &self.domain;
        let n = d.dim.min(3);
        info!(
            "Domain: {}D, cells {:?}, extent {:?} .. {:?}, periodic {:?}, max_grid_size {}",
            d.dim,
            &d.n_cells[..n],
            &d.prob_lo[..n],
            &d.prob_hi[..n],
            &d.periodic[..n],
            d.max_grid_size
        );
        info!(
            "BC preset: {}, {} face overrides",
            self.boundary_conditions.preset.as_deref().unwrap_or("none"),
            self.boundary_conditions.faces.len()
        );
        info!("Material: {}", self.material.model.name());
        info!(
            "Solver: tol_rel = {:.1e}, tol_abs = {:.1e}, max_iter = {}, smoother = {:?}",
            self.solver.tol_rel, self.solver.tol_abs, self.solver.max_iter, self.solver.smoother
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bc::{BoundaryRow, FaceTerm};

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = ElasticConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.domain.dim, 2);
        assert_eq!(cfg.body_force, [1.0, 0.0, 0.0]);
        let g = cfg.geometry().unwrap();
        assert_eq!(g.domain.hi, [32, 8, 0]);
        assert!(cfg.bc().is_ok());
        assert!(cfg.material.stiffness().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            body_force = [0.0, -1.0, 0.0]

            [domain]
            dim = 2
            n_cells = [8, 8, 0]
            prob_hi = [1.0, 1.0, 0.0]
            max_grid_size = 4

            [boundary_conditions]
            preset = "all_displacement"

            [[boundary_conditions.faces]]
            face = "yhi"
            type = "traction"
            value = 0.5

            [material]
            kinematic_variable = "F"

            [material.model]
            type = "laplacian"
            alpha = 2.0

            [solver]
            max_iter = 7
            smoother = "exact"
        "#;
        let cfg = ElasticConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.solver.max_iter, 7);
        let c = cfg.material.stiffness().unwrap();
        assert_eq!(c.kinematic_variable(), KinematicVariable::F);
        let bc = cfg.bc().unwrap();
        let g = cfg.geometry().unwrap();
        assert_eq!(
            bc.row(&g, [4, 8, 0], 1).unwrap(),
            BoundaryRow::Flux {
                terms: [
                    None,
                    Some(FaceTerm {
                        face: Face::hi(1),
                        kind: BcType::Traction
                    }),
                    None
                ],
                value: 0.5
            }
        );
        let h = cfg.hierarchy().unwrap();
        assert_eq!(h.layout(0, 0).len(), 4);
    }

    #[test]
    fn test_bad_values_are_config_errors() {
        let cfg = ElasticConfig::from_toml_str("[boundary_conditions]\npreset = \"twist\"").unwrap();
        assert!(matches!(cfg.bc(), Err(ElasticError::Config(_))));

        let toml = "[[boundary_conditions.faces]]\nface = \"zlo\"\ntype = \"traction\"";
        let cfg = ElasticConfig::from_toml_str(toml).unwrap();
        assert!(cfg.bc().is_err());

        let err = ElasticConfig::from_toml_str("[domain]\ndim = \"two\"").unwrap_err();
        assert!(err.is_configuration_error());
    }
}
