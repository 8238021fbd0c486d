//! Error types for circuit evaluation

use qflow_core::QuantumError;
use qflow_device::DeviceError;
use qflow_transforms::TransformError;
use thiserror::Error;

/// Result type for evaluation
pub type Result<T> = std::result::Result<T, ExecutionError>;

/// Errors that can occur while evaluating circuits through the pipeline
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The device cannot provide a requested capability
    #[error("Device '{device}' does not support {capability}")]
    Unsupported { device: String, capability: String },

    /// A stage produced the wrong number of results
    #[error("Expected {expected} results, got {actual}")]
    BatchLength { expected: usize, actual: usize },

    /// A result does not match the structure its circuit declared
    #[error("Result shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Invalid execution configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Quantum(#[from] QuantumError),
}

impl ExecutionError {
    /// Create an unsupported-capability error
    pub fn unsupported(device: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::Unsupported {
            device: device.into(),
            capability: capability.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }
}
