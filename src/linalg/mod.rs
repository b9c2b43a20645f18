pub mod solver;
pub mod direct;
pub mod multigrid;

pub use solver::{residual_norms, LinearOperator, SolverStats};
pub use direct::DirectSolver;
pub use multigrid::{MultigridConfig, MultigridSolver, SmootherKind};
