//! Error types for qflow circuits

use thiserror::Error;

/// Errors that can occur while building or inspecting quantum scripts
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuantumError {
    /// A parameter index does not address the flattened parameter list
    #[error("Invalid parameter index {index}: script has only {num_params} parameters")]
    InvalidParameterIndex { index: usize, num_params: usize },

    /// Operation created with the wrong number of parameters
    #[error("Operation '{op}' expects {expected} parameters, but {actual} were provided")]
    InvalidParameterCount {
        op: String,
        expected: usize,
        actual: usize,
    },

    /// Duplicate wire in an operation
    #[error("Duplicate wire {0} in operation")]
    DuplicateWire(String),

    /// Array shapes cannot be combined
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Operation is not supported for these operands
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Per-tape results cannot be reassembled
    #[error("Result reconstruction failed: {0}")]
    Reconstruction(String),

    /// A transform applied inside a quantum function failed
    #[error("Transform failed while recording: {0}")]
    Transform(String),

    /// Generic script validation error
    #[error("Script validation failed: {0}")]
    ValidationError(String),
}

impl QuantumError {
    /// Create an invalid parameter index error
    pub fn invalid_parameter_index(index: usize, num_params: usize) -> Self {
        Self::InvalidParameterIndex { index, num_params }
    }

    /// Create an invalid parameter count error
    pub fn invalid_parameter_count(op: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::InvalidParameterCount {
            op: op.into(),
            expected,
            actual,
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// Create a result reconstruction error
    pub fn reconstruction(msg: impl Into<String>) -> Self {
        Self::Reconstruction(msg.into())
    }

    /// Create a not-implemented error
    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::NotImplemented(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_index_error() {
        let err = QuantumError::invalid_parameter_index(5, 3);
        let msg = format!("{}", err);
        assert!(msg.contains("5"));
        assert!(msg.contains("3"));
    }

    #[test]
    fn test_invalid_parameter_count_error() {
        let err = QuantumError::invalid_parameter_count("Rot", 3, 1);
        let msg = format!("{}", err);
        assert!(msg.contains("Rot"));
        assert!(msg.contains("3"));
        assert!(msg.contains("1"));
    }

    #[test]
    fn test_not_implemented_error() {
        let err = QuantumError::not_implemented("arithmetic depth 2");
        assert!(format!("{}", err).starts_with("Not implemented"));
    }
}
