//! Solver statistics and the matrix-vector seam shared by the solvers

use sprs::CsMat;

/// Outcome of a solve
#[derive(Debug, Clone, Default)]
pub struct SolverStats {
    /// V-cycles performed; 0 for the direct solver
    pub iterations: usize,
    /// ||b - Ax||
    pub residual_norm: f64,
    /// ||r|| / ||r0|| for V-cycles, ||r|| / ||b|| for the direct solver
    pub relative_residual: f64,
    pub converged: bool,
    /// Wall time in seconds
    pub solve_time: f64,
}

impl SolverStats {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Square operator acting on gathered degree-of-freedom vectors.
pub trait LinearOperator {
    fn apply(&self, x: &[f64]) -> Vec<f64>;
    fn rows(&self) -> usize;
    fn cols(&self) -> usize;
}

impl LinearOperator for CsMat<f64> {
    fn apply(&self, x: &[f64]) -> Vec<f64> {
        let mut y = vec![0.0; CsMat::rows(self)];
        for (r, row) in self.outer_iterator().enumerate() {
            y[r] = row.iter().map(|(c, &v)| v * x[c]).sum();
        }
        y
    }

    fn rows(&self) -> usize {
        CsMat::rows(self)
    }

    fn cols(&self) -> usize {
        CsMat::cols(self)
    }
}

/// Absolute and relative residual of an assembled system.
///
/// The relative value is taken against ||b||, or equals the absolute value
/// when `b` vanishes.
pub fn residual_norms<O: LinearOperator>(op: &O, x: &[f64], b: &[f64]) -> (f64, f64) {
    let ax = op.apply(x);
    let r = b
        .iter()
        .zip(&ax)
        .map(|(bi, ai)| (bi - ai) * (bi - ai))
        .sum::<f64>()
        .sqrt();
    let bn = b.iter().map(|v| v * v).sum::<f64>().sqrt();
    if bn < 1e-14 {
        (r, r)
    } else {
        (r, r / bn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sprs::TriMat;

    fn tridiagonal(n: usize) -> CsMat<f64> {
        let mut t = TriMat::new((n, n));
        for i in 0..n {
            t.add_triplet(i, i, 2.0);
            if i > 0 {
                t.add_triplet(i, i - 1, -1.0);
            }
            if i + 1 < n {
                t.add_triplet(i, i + 1, -1.0);
            }
        }
        t.to_csr()
    }

    #[test]
    fn test_csr_apply() {
        let a = tridiagonal(4);
        let y = a.apply(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(y, vec![0.0, 0.0, 0.0, 5.0]);
        assert_eq!(LinearOperator::rows(&a), 4);
    }

    #[test]
    fn test_residual_norms() {
        let a = tridiagonal(3);
        // A [1 1 1] = [1 0 1]
        let (abs, rel) = residual_norms(&a, &[1.0, 1.0, 1.0], &[1.0, 0.0, 1.0]);
        assert_relative_eq!(abs, 0.0);
        assert_relative_eq!(rel, 0.0);

        let (abs, rel) = residual_norms(&a, &[0.0; 3], &[3.0, 0.0, 4.0]);
        assert_relative_eq!(abs, 5.0, epsilon = 1e-14);
        assert_relative_eq!(rel, 1.0, epsilon = 1e-14);

        let (abs, rel) = residual_norms(&a, &[1.0, 0.0, 0.0], &[0.0; 3]);
        assert_relative_eq!(abs, 5.0f64.sqrt(), epsilon = 1e-14);
        assert_relative_eq!(rel, abs);
    }
}
