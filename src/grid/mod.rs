/// Block-structured node-centered grids
///
/// This module provides:
/// - Index boxes and level geometry
/// - Box layouts with their distribution maps
/// - Multi-box node fields with ghost exchange
/// - The (AMR level, MG level) hierarchy

pub mod node_box;
pub mod geometry;
pub mod layout;
pub mod field;
pub mod hierarchy;

pub use node_box::NodeBox;
pub use geometry::Geometry;
pub use layout::BoxLayout;
pub use field::{Fab, NodeField};
pub use hierarchy::{GridHierarchy, HierarchyInfo, LevelArena};
