//! Core types for the qflow circuit pipeline
//!
//! This crate provides the value types every pipeline stage works on:
//! - [`Tensor`]: interface-tagged numeric arrays
//! - [`Operation`] and [`MeasurementProcess`]: immutable circuit elements
//! - [`QuantumScript`]: the tape that transforms rewrite and devices execute
//! - [`Recorder`]: explicit recording context for quantum functions
//! - [`ResultValue`]: raw and reconstructed execution results
//! - [`equal`]: tolerance-aware structural equality
//!
//! # Example
//! ```
//! use qflow_core::{ops, MeasurementProcess, QuantumScript};
//!
//! let script = QuantumScript::new(
//!     vec![ops::ry(0.3, 0usize).unwrap()],
//!     vec![MeasurementProcess::expval(ops::pauli_z(0usize).unwrap())],
//! );
//! assert_eq!(script.get_parameters(true).len(), 1);
//! ```

pub mod equal;
pub mod error;
pub mod measurement;
pub mod operation;
pub mod ops;
pub mod recorder;
pub mod result;
pub mod shots;
pub mod tape;
pub mod tensor;
pub mod wires;

// Re-exports for convenience
pub use equal::{equal, equal_with, Comparable, EqualOptions};
pub use error::QuantumError;
pub use measurement::{MeasurementKind, MeasurementProcess, ReturnType};
pub use num_complex::Complex64;
pub use operation::{HyperParam, Operation};
pub use recorder::{QuantumFunction, QueueItem, Recorder};
pub use result::{Counts, ResultBatch, ResultValue, ReturnMode};
pub use shots::Shots;
pub use tape::{OutputStructure, QuantumScript, UnwrapGuard};
pub use tensor::{Interface, Tensor, TensorData};
pub use wires::{Wire, Wires};

/// Type alias for results in qflow
pub type Result<T> = std::result::Result<T, QuantumError>;
