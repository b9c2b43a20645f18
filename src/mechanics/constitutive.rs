/// Constitutive models for the nodal elasticity operator
///
/// Every material model reduces to a fourth-order stiffness tensor `C_ijkl`
/// that maps the displacement gradient to stress: σ_ij = C_ijkl u_k,l.
/// The tensor is what the operator stores per node. It forms a vector space,
/// so it can be differentiated, averaged onto coarse grids and mixed across
/// phases.

use std::ops::{Add, Mul, Sub};

use nalgebra::{Matrix3, Rotation3, SMatrix, SVector};
use serde::{Deserialize, Serialize};

use crate::error::{ElasticError, Result};
use crate::grid::NodeField;

/// Which kinematic quantity a model is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KinematicVariable {
    /// Displacement gradient ∇u (small strain)
    #[default]
    Gradu,
    /// Deformation gradient F = I + ∇u
    F,
}

impl KinematicVariable {
    pub fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s {
            "gradu" => Ok(KinematicVariable::Gradu),
            "f" | "F" => Ok(KinematicVariable::F),
            _ => Err(format!("Unknown kinematic variable: '{}'", s)),
        }
    }
}

/// Fourth-order stiffness tensor.
///
/// Stored as a 9×9 matrix acting on row-major flattened 3×3 tensors:
/// `c[(3i + j, 3k + l)] = C_ijkl`. No minor symmetry is assumed, so
/// non-symmetric models such as the Laplacian fit in the same type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stiffness {
    c: SMatrix<f64, 9, 9>,
    kinvar: KinematicVariable,
}

impl Default for Stiffness {
    fn default() -> Self {
        Self::zero()
    }
}

impl Stiffness {
    pub fn zero() -> Self {
        Self {
            c: SMatrix::zeros(),
            kinvar: KinematicVariable::Gradu,
        }
    }

    /// Build from a component function `C(i, j, k, l)`.
    pub fn from_fn<F: Fn(usize, usize, usize, usize) -> f64>(f: F) -> Self {
        Self {
            c: SMatrix::from_fn(|r, s| f(r / 3, r % 3, s / 3, s % 3)),
            kinvar: KinematicVariable::Gradu,
        }
    }

    pub fn with_kinematic_variable(mut self, kinvar: KinematicVariable) -> Self {
        self.kinvar = kinvar;
        self
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize, l: usize) -> f64 {
        self.c[(3 * i + j, 3 * k + l)]
    }

    /// Contract with a second-order tensor: out_ij = C_ijkl m_kl.
    #[inline]
    pub fn apply(&self, m: &Matrix3<f64>) -> Matrix3<f64> {
        let v = SVector::<f64, 9>::from_fn(|r, _| m[(r / 3, r % 3)]);
        let s = self.c * v;
        Matrix3::from_fn(|i, j| s[3 * i + j])
    }

    /// Stress from the displacement gradient.
    pub fn stress(&self, gradu: &Matrix3<f64>) -> Matrix3<f64> {
        self.apply(gradu)
    }

    /// Stress from the model's own kinematic variable (∇u or F).
    pub fn stress_from_kinematic(&self, kin: &Matrix3<f64>) -> Matrix3<f64> {
        match self.kinvar {
            KinematicVariable::Gradu => self.apply(kin),
            KinematicVariable::F => self.apply(&(kin - Matrix3::identity())),
        }
    }

    /// Tangent stiffness. Constant for the linear models in this crate.
    pub fn stiffness(&self, _gradu: &Matrix3<f64>) -> Stiffness {
        *self
    }

    pub fn kinematic_variable(&self) -> KinematicVariable {
        self.kinvar
    }

    /// C'_ijkl = R_ip R_jq R_kr R_ls C_pqrs
    pub fn rotate(&self, rot: &Rotation3<f64>) -> Stiffness {
        let r = rot.matrix();
        let mut out = Stiffness::zero().with_kinematic_variable(self.kinvar);
        for i in 0..3 {
            for j in 0..3 {
                for k in 0..3 {
                    for l in 0..3 {
                        let mut sum = 0.0;
                        for p in 0..3 {
                            for q in 0..3 {
                                let rr = r[(i, p)] * r[(j, q)];
                                if rr == 0.0 {
                                    continue;
                                }
                                for s in 0..3 {
                                    for t in 0..3 {
                                        sum += rr * r[(k, s)] * r[(l, t)] * self.get(p, q, s, t);
                                    }
                                }
                            }
                        }
                        out.c[(3 * i + j, 3 * k + l)] = sum;
                    }
                }
            }
        }
        out
    }

    pub fn is_finite(&self) -> bool {
        self.c.iter().all(|v| v.is_finite())
    }

    /// Frobenius norm of the 9×9 representation.
    pub fn norm(&self) -> f64 {
        self.c.norm()
    }
}

impl Add for Stiffness {
    type Output = Stiffness;
    fn add(self, rhs: Stiffness) -> Stiffness {
        Stiffness {
            c: self.c + rhs.c,
            kinvar: self.kinvar,
        }
    }
}

impl Sub for Stiffness {
    type Output = Stiffness;
    fn sub(self, rhs: Stiffness) -> Stiffness {
        Stiffness {
            c: self.c - rhs.c,
            kinvar: self.kinvar,
        }
    }
}

impl Mul<f64> for Stiffness {
    type Output = Stiffness;
    fn mul(self, a: f64) -> Stiffness {
        Stiffness {
            c: self.c * a,
            kinvar: self.kinvar,
        }
    }
}

#[inline]
fn delta(a: usize, b: usize) -> f64 {
    if a == b {
        1.0
    } else {
        0.0
    }
}

/// Lamé parameters (λ, μ) from Young's modulus and Poisson's ratio.
#[allow(non_snake_case)]
pub fn lame_parameters(E: f64, nu: f64) -> (f64, f64) {
    let lambda = (E * nu) / ((1.0 + nu) * (1.0 - 2.0 * nu));
    let mu = E / (2.0 * (1.0 + nu));
    (lambda, mu)
}

fn isotropic_tensor(lambda: f64, mu: f64) -> Stiffness {
    Stiffness::from_fn(|i, j, k, l| {
        lambda * delta(i, j) * delta(k, l) + mu * (delta(i, k) * delta(j, l) + delta(i, l) * delta(j, k))
    })
}

/// Material models available to the operator.
///
/// Closed set; the operator only ever sees the resulting `Stiffness`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MaterialModel {
    /// Isotropic linear elasticity in Lamé form
    Isotropic { lambda: f64, mu: f64 },
    /// Cubic crystal, rotated by roll/pitch/yaw angles (radians)
    Cubic {
        c11: f64,
        c12: f64,
        c44: f64,
        #[serde(default)]
        angles: [f64; 3],
    },
    /// Isotropic material with scalar damage d in [0, 1)
    Degradable { lambda: f64, mu: f64, damage: f64 },
    /// Maxwell viscoelastic solid, effective stiffness over one step of size dt
    Viscoelastic {
        youngs_modulus: f64,
        poisson_ratio: f64,
        viscosity: f64,
        dt: f64,
    },
    /// Component-wise Laplacian, σ = α ∇u
    Laplacian { alpha: f64 },
}

impl MaterialModel {
    /// Isotropic model from Young's modulus E and Poisson's ratio ν.
    ///
    /// λ = E ν / ((1+ν)(1-2ν)),  μ = E / (2(1+ν))
    pub fn isotropic_from_young(youngs_modulus: f64, poisson_ratio: f64) -> Self {
        let (lambda, mu) = lame_parameters(youngs_modulus, poisson_ratio);
        MaterialModel::Isotropic { lambda, mu }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MaterialModel::Isotropic { .. } => "isotropic",
            MaterialModel::Cubic { .. } => "cubic",
            MaterialModel::Degradable { .. } => "degradable",
            MaterialModel::Viscoelastic { .. } => "viscoelastic",
            MaterialModel::Laplacian { .. } => "laplacian",
        }
    }

    /// Get list of all valid model tags (for config validation)
    pub fn valid_types() -> &'static [&'static str] {
        &["isotropic", "cubic", "degradable", "viscoelastic", "laplacian"]
    }

    /// Reject parameters that make the operator indefinite or singular.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(ElasticError::Config(msg));
        match *self {
            MaterialModel::Isotropic { lambda, mu } | MaterialModel::Degradable { lambda, mu, .. } => {
                if mu <= 0.0 || lambda + 2.0 * mu <= 0.0 {
                    return bad(format!("{}: need mu > 0 and lambda + 2 mu > 0", self.name()));
                }
                if let MaterialModel::Degradable { damage, .. } = *self {
                    if !(0.0..1.0).contains(&damage) {
                        return bad(format!("degradable: damage {} outside [0, 1)", damage));
                    }
                }
                Ok(())
            }
            MaterialModel::Cubic { c11, c12, c44, .. } => {
                if c44 <= 0.0 || c11 <= c12.abs() {
                    return bad("cubic: need c44 > 0 and c11 > |c12|".into());
                }
                Ok(())
            }
            MaterialModel::Viscoelastic {
                youngs_modulus,
                poisson_ratio,
                viscosity,
                dt,
            } => {
                if youngs_modulus <= 0.0 || viscosity <= 0.0 || dt < 0.0 {
                    return bad("viscoelastic: need E > 0, viscosity > 0, dt >= 0".into());
                }
                if !(poisson_ratio > -1.0 && poisson_ratio < 0.5) {
                    return bad(format!("viscoelastic: Poisson's ratio {} outside (-1, 0.5)", poisson_ratio));
                }
                Ok(())
            }
            MaterialModel::Laplacian { alpha } => {
                if alpha <= 0.0 {
                    return bad("laplacian: alpha must be positive".into());
                }
                Ok(())
            }
        }
    }

    /// Stiffness tensor of the model.
    pub fn stiffness(&self) -> Stiffness {
        match *self {
            MaterialModel::Isotropic { lambda, mu } => isotropic_tensor(lambda, mu),
            MaterialModel::Cubic { c11, c12, c44, angles } => {
                let crystal = Stiffness::from_fn(|i, j, k, l| {
                    if i == j && k == l {
                        if i == k {
                            c11
                        } else {
                            c12
                        }
                    } else if i != j && ((i == k && j == l) || (i == l && j == k)) {
                        c44
                    } else {
                        0.0
                    }
                });
                let rot = Rotation3::from_euler_angles(angles[0], angles[1], angles[2]);
                crystal.rotate(&rot)
            }
            MaterialModel::Degradable { lambda, mu, damage } => {
                isotropic_tensor(lambda, mu) * (1.0 - damage)
            }
            MaterialModel::Viscoelastic {
                youngs_modulus,
                poisson_ratio,
                viscosity,
                dt,
            } => {
                // relaxation factor 1 / (1 + dt / tau), tau = viscosity / G
                let g = youngs_modulus / (2.0 * (1.0 + poisson_ratio));
                let tau = viscosity / g;
                let factor = 1.0 / (1.0 + dt / tau);
                let (lambda, mu) = lame_parameters(youngs_modulus, poisson_ratio);
                isotropic_tensor(lambda, mu) * factor
            }
            MaterialModel::Laplacian { alpha } => {
                Stiffness::from_fn(|i, j, k, l| alpha * delta(i, k) * delta(j, l))
            }
        }
    }

    pub fn stress(&self, gradu: &Matrix3<f64>) -> Matrix3<f64> {
        self.stiffness().stress(gradu)
    }

    pub fn kinematic_variable(&self) -> KinematicVariable {
        KinematicVariable::Gradu
    }
}

/// Mix phase models node by node: C = Σ_n η_n C_n.
///
/// # Arguments
/// * `models` - One stiffness per phase
/// * `eta` - Phase fractions, one component per phase
/// * `ngrow` - Ghost width of the returned field (at least 2 for the operator)
///
/// Ghost nodes are mixed too, so `eta` should have its ghosts filled.
pub fn mix_phases(models: &[Stiffness], eta: &NodeField<f64>, ngrow: usize) -> Result<NodeField<Stiffness>> {
    if models.len() != eta.ncomp() {
        return Err(ElasticError::Config(format!(
            "{} phase models but eta has {} components",
            models.len(),
            eta.ncomp()
        )));
    }
    let mut out = NodeField::new(eta.layout(), 1, ngrow, Stiffness::zero());
    let kinvar = models.first().map(|m| m.kinematic_variable()).unwrap_or_default();
    for (dst, src) in out.fabs_mut().iter_mut().zip(eta.fabs()) {
        let region = match dst.fab_box().intersect(&src.fab_box()) {
            Some(r) => r,
            None => continue,
        };
        for m in region.iter() {
            let mut c = Stiffness::zero().with_kinematic_variable(kinvar);
            for (n, model) in models.iter().enumerate() {
                c = c + *model * src[(m, n)];
            }
            dst[(m, 0)] = c;
        }
    }
    Ok(out)
}
