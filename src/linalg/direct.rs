use sprs::CsMat;
use std::time::Instant;

use super::solver::{residual_norms, SolverStats};
use crate::error::{ElasticError, Result};

/// Dense LU solver for the coarsest multigrid level
///
/// Converts the sparse matrix to a dense nalgebra matrix and keeps the LU
/// factors, so repeated bottom solves only pay for the triangular solves.
/// Meant for small systems (a few thousand unknowns).
pub struct DirectSolver {
    /// Solver name
    name: String,
    lu: Option<nalgebra::LU<f64, nalgebra::Dyn, nalgebra::Dyn>>,
    matrix: Option<CsMat<f64>>,
}

impl DirectSolver {
    pub fn new() -> Self {
        Self {
            name: "Direct (dense LU)".to_string(),
            lu: None,
            matrix: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Factorize `A`.
    ///
    /// # Errors
    /// `BottomSolve` if the matrix is not square or is singular.
    #[allow(non_snake_case)]
    pub fn factor(&mut self, A: &CsMat<f64>) -> Result<()> {
        let n = A.rows();
        if A.cols() != n {
            return Err(ElasticError::BottomSolve(format!(
                "matrix is {}x{}, expected square",
                n,
                A.cols()
            )));
        }

        // Convert sparse matrix to dense nalgebra matrix
        let mut a_dense = nalgebra::DMatrix::zeros(n, n);
        for (row_idx, row) in A.outer_iterator().enumerate() {
            for (col_idx, &val) in row.iter() {
                a_dense[(row_idx, col_idx)] += val;
            }
        }

        let lu = a_dense.lu();
        if !lu.is_invertible() {
            return Err(ElasticError::BottomSolve(format!(
                "singular {}x{} operator (are rigid modes constrained?)",
                n, n
            )));
        }
        self.lu = Some(lu);
        self.matrix = Some(A.clone());
        Ok(())
    }

    /// Solve with the stored factors.
    ///
    /// # Errors
    /// `BottomSolve` if `factor` was not called or the solve breaks down.
    pub fn solve_factored(&self, b: &[f64]) -> Result<(Vec<f64>, SolverStats)> {
        let start = Instant::now();
        let (lu, a) = match (&self.lu, &self.matrix) {
            (Some(lu), Some(a)) => (lu, a),
            _ => return Err(ElasticError::BottomSolve("no factorization".into())),
        };
        if b.len() != a.rows() {
            return Err(ElasticError::BottomSolve(format!(
                "right-hand side has {} entries, matrix has {} rows",
                b.len(),
                a.rows()
            )));
        }

        let b_vec = nalgebra::DVector::from_column_slice(b);
        let x_vec = lu
            .solve(&b_vec)
            .ok_or_else(|| ElasticError::BottomSolve("LU solve failed".into()))?;
        let x: Vec<f64> = x_vec.iter().copied().collect();
        if let Some(i) = x.iter().position(|v| !v.is_finite()) {
            return Err(ElasticError::BottomSolve(format!("non-finite solution entry {}", i)));
        }

        let (residual_norm, relative_residual) = residual_norms(a, &x, b);
        let stats = SolverStats {
            iterations: 0,
            residual_norm,
            relative_residual,
            converged: relative_residual < 1e-8,
            solve_time: start.elapsed().as_secs_f64(),
        };
        Ok((x, stats))
    }

    /// Factorize and solve `A x = b`.
    #[allow(non_snake_case)]
    pub fn solve(&mut self, A: &CsMat<f64>, b: &[f64]) -> Result<(Vec<f64>, SolverStats)> {
        self.factor(A)?;
        self.solve_factored(b)
    }
}

impl Default for DirectSolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sprs::TriMat;

    #[test]
    fn test_direct_solver_simple() {
        // Solve [2 1; 1 2] x = [3; 3]
        // Solution: x = [1; 1]
        let mut triplets = TriMat::new((2, 2));
        triplets.add_triplet(0, 0, 2.0);
        triplets.add_triplet(0, 1, 1.0);
        triplets.add_triplet(1, 0, 1.0);
        triplets.add_triplet(1, 1, 2.0);
        let a = triplets.to_csr();

        let mut solver = DirectSolver::new();
        let (x, stats) = solver.solve(&a, &[3.0, 3.0]).unwrap();

        assert_relative_eq!(x[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-10);
        assert!(stats.converged);
        assert!(stats.relative_residual < 1e-8);
    }

    #[test]
    fn test_factor_reused_for_several_rhs() {
        let n = 10;
        let mut triplets = TriMat::new((n, n));
        for i in 0..n {
            triplets.add_triplet(i, i, (i + 1) as f64);
        }
        let a = triplets.to_csr();

        let mut solver = DirectSolver::new();
        solver.factor(&a).unwrap();
        for scale in [1.0, -2.0] {
            let b: Vec<f64> = (1..=n).map(|i| scale * (i * i) as f64).collect();
            let (x, stats) = solver.solve_factored(&b).unwrap();
            for i in 0..n {
                assert_relative_eq!(x[i], scale * (i + 1) as f64, epsilon = 1e-10);
            }
            assert!(stats.converged);
        }
    }

    #[test]
    fn test_singular_matrix_is_an_error() {
        let mut triplets = TriMat::new((2, 2));
        triplets.add_triplet(0, 0, 1.0);
        triplets.add_triplet(0, 1, 1.0);
        triplets.add_triplet(1, 0, 1.0);
        triplets.add_triplet(1, 1, 1.0);
        let a = triplets.to_csr();
        let mut solver = DirectSolver::new();
        assert!(matches!(solver.factor(&a), Err(ElasticError::BottomSolve(_))));
        assert!(DirectSolver::new().solve_factored(&[1.0]).is_err());
    }
}
