/// Matrix-free nodal elasticity operator
///
/// This module provides:
/// - Operator application, diagonal and boundary handling (`elastic`)
/// - Node masks for Dirichlet rows, ownership and coarse-fine coverage
/// - Coefficient averaging down MG levels
/// - Restriction and interpolation
/// - Gauss-Seidel and Jacobi smoothers
/// - Sparse assembly by colored probing

pub mod elastic;
pub mod masks;
pub mod coefficients;
pub mod transfer;
pub mod smoother;
pub mod assembly;

pub use elastic::{BcMode, Elastic, FIELD_NGHOST, MODEL_NGHOST};
pub use masks::{Masks, NodeCoverage};
pub use coefficients::fill_boundary_coeff;
pub use smoother::JACOBI_WEIGHT;
pub use assembly::AssembledOperator;
