//! Error types for the nodal elasticity operator.
//!
//! Every failure in this crate is fail-fast: a corrupted value or an invalid
//! boundary tag is reported with its location and never clamped or defaulted.

use thiserror::Error;

/// Node index in global (level) index space.
pub type NodeIndex = [isize; 3];

/// Errors raised by the grid substrate, the operator and the solver.
#[derive(Debug, Error)]
pub enum ElasticError {
    /// A node sits on a face whose boundary tag is missing or not recognised.
    #[error("invalid boundary condition at node {node:?}, face {face}, component {component}")]
    InvalidBc {
        /// Node index on the level
        node: NodeIndex,
        /// Face label, e.g. "xlo"
        face: String,
        /// Displacement component
        component: usize,
    },

    /// NaN or Inf detected while building a derived field.
    #[error("{quantity} is not finite at node {node:?}, component {component}")]
    NumericalCorruption {
        /// Name of the quantity being computed
        quantity: &'static str,
        /// Node index on the level
        node: NodeIndex,
        /// Field component
        component: usize,
    },

    /// A code path that is intentionally not supported.
    #[error("not implemented: {feature}")]
    Unimplemented {
        /// Short description of the missing feature
        feature: &'static str,
    },

    /// An AMR level cannot be coarsened by the refinement ratio.
    #[error("AMR level {amrlev} is not coarsenable with ratio 2 (box {bx})")]
    Coarsenability {
        /// Offending AMR level
        amrlev: usize,
        /// Offending box, formatted
        bx: String,
    },

    /// Two fields were combined over layouts that do not line up.
    #[error("incompatible layouts: {0}")]
    IncompatibleLayouts(String),

    /// The operator was used on a level whose model field was never set.
    #[error("material model not set on AMR level {amrlev}, MG level {mglev}")]
    MissingModel {
        /// AMR level
        amrlev: usize,
        /// MG level
        mglev: usize,
    },

    /// `normalize`/`error0x` require a cached diagonal.
    #[error("diagonal must be computed before {0}")]
    DiagonalNotComputed(&'static str),

    /// Bottom solve failed (singular coarse operator).
    #[error("bottom solve failed: {0}")]
    BottomSolve(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure reading a configuration file.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for ElasticError {
    fn from(e: toml::de::Error) -> Self {
        ElasticError::Config(e.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ElasticError>;

impl ElasticError {
    /// True for errors caused by user input rather than numerical state.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ElasticError::InvalidBc { .. }
                | ElasticError::Coarsenability { .. }
                | ElasticError::Config(_)
                | ElasticError::Io(_)
        )
    }

    /// Returns a NaN/Inf error if `value` is not finite.
    pub fn check_finite(
        value: f64,
        quantity: &'static str,
        node: NodeIndex,
        component: usize,
    ) -> Result<()> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(ElasticError::NumericalCorruption {
                quantity,
                node,
                component,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_finite() {
        assert!(ElasticError::check_finite(1.0, "diagonal", [0, 0, 0], 0).is_ok());
        let err = ElasticError::check_finite(f64::NAN, "diagonal", [1, 2, 0], 1).unwrap_err();
        match err {
            ElasticError::NumericalCorruption { node, component, .. } => {
                assert_eq!(node, [1, 2, 0]);
                assert_eq!(component, 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(ElasticError::check_finite(f64::INFINITY, "x", [0, 0, 0], 0).is_err());
    }

    #[test]
    fn test_error_category() {
        let e = ElasticError::Unimplemented { feature: "x" };
        assert!(!e.is_configuration_error());
        let e = ElasticError::Config("bad".into());
        assert!(e.is_configuration_error());
        assert!(e.to_string().contains("bad"));
    }
}
