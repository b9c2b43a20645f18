/// Kinematic quantities and their packed output layouts
///
/// Post-processed tensors are written to node fields either in Voigt order
/// or as full row-major D×D blocks:
/// ```text
/// 2D Voigt: [xx, yy, xy]
/// 3D Voigt: [xx, yy, zz, yz, zx, xy]
/// ```

use nalgebra::Matrix3;

use super::constitutive::KinematicVariable;

/// Small strain ε = (∇u + ∇uᵀ) / 2
pub fn small_strain(gradu: &Matrix3<f64>) -> Matrix3<f64> {
    0.5 * (gradu + gradu.transpose())
}

/// Deformation gradient F = I + ∇u
pub fn deformation_gradient(gradu: &Matrix3<f64>) -> Matrix3<f64> {
    Matrix3::identity() + gradu
}

/// Kinematic measure reported as "strain" for a model of the given kind.
pub fn kinematic_measure(gradu: &Matrix3<f64>, kinvar: KinematicVariable) -> Matrix3<f64> {
    match kinvar {
        KinematicVariable::Gradu => small_strain(gradu),
        KinematicVariable::F => deformation_gradient(gradu),
    }
}

/// Strain energy density integrand, tr(∇uᵀ σ).
pub fn energy_density(gradu: &Matrix3<f64>, sigma: &Matrix3<f64>) -> f64 {
    (gradu.transpose() * sigma).trace()
}

/// Number of components of a packed tensor.
pub fn n_components(dim: usize, voigt: bool) -> usize {
    if voigt {
        dim * (dim + 1) / 2
    } else {
        dim * dim
    }
}

/// Pack the leading D×D block of `m`.
pub fn pack(m: &Matrix3<f64>, dim: usize, voigt: bool) -> Vec<f64> {
    if !voigt {
        let mut out = Vec::with_capacity(dim * dim);
        for i in 0..dim {
            for j in 0..dim {
                out.push(m[(i, j)]);
            }
        }
        return out;
    }
    match dim {
        1 => vec![m[(0, 0)]],
        2 => vec![m[(0, 0)], m[(1, 1)], m[(0, 1)]],
        _ => vec![m[(0, 0)], m[(1, 1)], m[(2, 2)], m[(1, 2)], m[(2, 0)], m[(0, 1)]],
    }
}
