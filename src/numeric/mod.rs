pub mod stencil;

pub use stencil::{derivative, gradient, hessian, Offset, StencilType};
