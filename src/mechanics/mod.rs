/// Solid mechanics building blocks for the nodal operator
///
/// This module provides:
/// - Material models reduced to fourth-order stiffness tensors
/// - Phase-field mixing of material models
/// - Kinematic measures and packed output layouts

pub mod constitutive;
pub mod strain;

pub use constitutive::{lame_parameters, mix_phases, KinematicVariable, MaterialModel, Stiffness};
pub use strain::{deformation_gradient, energy_density, small_strain};
