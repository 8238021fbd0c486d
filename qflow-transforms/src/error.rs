//! Error types for transforms and transform programs

use qflow_core::QuantumError;
use thiserror::Error;

/// Errors raised while building or applying transforms
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    /// Error from the underlying script types
    #[error(transparent)]
    Quantum(#[from] QuantumError),

    /// A transform could not be constructed or broke its output contract
    #[error("Operation transform error: {0}")]
    OperationTransform(String),

    /// Caller supplied arguments the transform cannot work with
    #[error("Invalid usage: {0}")]
    Usage(String),

    /// A bound argument is missing or has the wrong type
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    /// Per-tape results do not match the tapes a stage produced
    #[error("Postprocessing failed in '{stage}': {reason}")]
    Postprocessing { stage: String, reason: String },
}

impl TransformError {
    /// Create a usage error
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Create an operation transform error
    pub fn operation_transform(msg: impl Into<String>) -> Self {
        Self::OperationTransform(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a postprocessing error
    pub fn postprocessing(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Postprocessing {
            stage: stage.into(),
            reason: reason.into(),
        }
    }
}

impl From<TransformError> for QuantumError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::Quantum(e) => e,
            other => QuantumError::Transform(other.to_string()),
        }
    }
}

/// Type alias for transform results
pub type Result<T> = std::result::Result<T, TransformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantum_error_roundtrip() {
        let inner = QuantumError::shape_mismatch("bad");
        let err: TransformError = inner.clone().into();
        assert_eq!(QuantumError::from(err), inner);
    }

    #[test]
    fn test_usage_converts_to_transform_variant() {
        let err = TransformError::usage("no trainable parameters");
        assert!(matches!(QuantumError::from(err), QuantumError::Transform(_)));
    }
}
