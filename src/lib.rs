pub mod error;
pub mod grid;
pub mod numeric;
pub mod mechanics;
pub mod bc;     // Boundary conditions
pub mod config;
pub mod operator;
pub mod linalg;

pub use error::{ElasticError, NodeIndex, Result};
pub use grid::{BoxLayout, Fab, Geometry, GridHierarchy, HierarchyInfo, LevelArena, NodeBox, NodeField};
pub use numeric::StencilType;
pub use mechanics::{mix_phases, KinematicVariable, MaterialModel, Stiffness};
pub use bc::{init_rhs, BcMatrix, BcType, BoundaryRow, Face, Side};
pub use config::ElasticConfig;
pub use operator::{AssembledOperator, BcMode, Elastic, Masks, NodeCoverage};
pub use linalg::{DirectSolver, MultigridConfig, MultigridSolver, SmootherKind, SolverStats};
