//! Error types for the airflow pipeline.

use crate::grid::GridDims;

/// Result alias used throughout the crate.
pub type FlowResult<T> = Result<T, FlowError>;

/// Everything that can go wrong between an occupancy grid and a set of streamlines.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// Two grids that must share dimensions do not.
    #[error("grid shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Dimensions the solver was configured for
        expected: GridDims,
        /// Dimensions of the grid that was supplied
        actual: GridDims,
    },

    /// No occupancy data to simulate.
    #[error("nothing to simulate: {0}")]
    MissingInput(String),

    /// Relaxation produced non-finite or runaway values.
    #[error("potential diverged at iteration {iteration} (max |phi| = {max_abs})")]
    NumericalDivergence {
        /// 1-based iteration where the check failed
        iteration: usize,
        /// Largest absolute potential seen (may be NaN or infinite)
        max_abs: f32,
    },

    /// A parameter is outside its valid domain.
    #[error("invalid parameter '{name}': {value} ({reason})")]
    InvalidParameter {
        /// Parameter name, dotted for nested config keys
        name: &'static str,
        /// Offending value, formatted
        value: String,
        /// Why the value was rejected
        reason: &'static str,
    },

    /// Reading or writing a configuration file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file could not be parsed or written as JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    pub(crate) fn invalid(
        name: &'static str,
        value: impl std::fmt::Display,
        reason: &'static str,
    ) -> Self {
        FlowError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// True for errors the caller must fix in its inputs or configuration.
    ///
    /// These are never worth retrying with the same inputs. Numerical
    /// divergence is reported separately since it depends on the chosen
    /// scheme and relaxation factor rather than on malformed input.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            FlowError::ShapeMismatch { .. }
                | FlowError::MissingInput(_)
                | FlowError::InvalidParameter { .. }
                | FlowError::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_display() {
        let err = FlowError::ShapeMismatch {
            expected: GridDims::new(64, 64, 64),
            actual: GridDims::new(32, 64, 64),
        };
        let msg = err.to_string();
        assert!(msg.contains("64x64x64"), "got: {}", msg);
        assert!(msg.contains("32x64x64"), "got: {}", msg);
        assert!(err.is_config_error());
    }

    #[test]
    fn test_divergence_is_not_config_error() {
        let err = FlowError::NumericalDivergence {
            iteration: 12,
            max_abs: f32::INFINITY,
        };
        assert!(!err.is_config_error());
        assert!(err.to_string().contains("iteration 12"));
    }

    #[test]
    fn test_invalid_parameter_display() {
        let err = FlowError::invalid("solver.omega", 2.5, "must be in (0, 2)");
        assert!(err.to_string().contains("solver.omega"));
        assert!(err.to_string().contains("2.5"));
    }
}
