//! Error types for device operations

use qflow_core::QuantumError;
use qflow_transforms::TransformError;
use thiserror::Error;

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Errors that can occur while preparing or executing circuits on a device
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The device does not provide this part of the execution contract
    #[error("Not implemented by device: {0}")]
    NotImplemented(String),

    /// Circuit uses something the device cannot execute
    #[error("Circuit unsupported by device: {0}")]
    Unsupported(String),

    /// Invalid execution configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Device failed while running a batch
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Error raised by a preprocessing transform
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Error raised while inspecting a circuit
    #[error(transparent)]
    Quantum(#[from] QuantumError),
}

impl DeviceError {
    /// Create a not-implemented error for a contract method
    pub fn not_implemented(method: impl Into<String>) -> Self {
        Self::NotImplemented(method.into())
    }

    /// Create an unsupported-circuit error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create an execution failure
    pub fn execution_failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }
}

impl From<serde_json::Error> for DeviceError {
    fn from(err: serde_json::Error) -> Self {
        DeviceError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_implemented_names_method() {
        let err = DeviceError::not_implemented("compute_vjp");
        assert!(err.to_string().contains("compute_vjp"));
    }

    #[test]
    fn test_transform_error_is_transparent() {
        let err: DeviceError = TransformError::usage("no trainable parameters").into();
        assert_eq!(
            err.to_string(),
            TransformError::usage("no trainable parameters").to_string()
        );
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: DeviceError = parse.unwrap_err().into();
        assert!(matches!(err, DeviceError::SerializationError(_)));
    }
}
