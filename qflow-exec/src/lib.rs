//! Circuit evaluation for qflow
//!
//! This crate drives recorded scripts through the full pipeline:
//!
//! 1. the user [`TransformProgram`](qflow_transforms::TransformProgram)
//! 2. device preprocessing
//! 3. conversion to plain numeric parameters
//! 4. device execution, optionally with derivatives or products
//! 5. result reconstruction in reverse stage order
//!
//! [`QNode`] wraps the pipeline behind a quantum function bound to a device.
//!
//! # Example
//!
//! ```
//! use qflow_core::{ops, MeasurementProcess, QuantumScript, ResultBatch, ResultValue, Tensor};
//! use qflow_device::{Device, DeviceCapabilities, ExecutionConfig};
//! use qflow_exec::execute;
//! use qflow_transforms::TransformProgram;
//!
//! struct Constant(DeviceCapabilities);
//!
//! impl Device for Constant {
//!     fn name(&self) -> &str {
//!         "constant"
//!     }
//!
//!     fn capabilities(&self) -> &DeviceCapabilities {
//!         &self.0
//!     }
//!
//!     fn execute(&self, circuits: &[QuantumScript], _: &ExecutionConfig) -> qflow_device::Result<ResultBatch> {
//!         Ok(circuits.iter().map(|_| ResultValue::from(1.0)).collect())
//!     }
//! }
//!
//! let tape = QuantumScript::new(
//!     vec![ops::rx(0.3, 0usize).unwrap()],
//!     vec![MeasurementProcess::expval(ops::pauli_z(0usize).unwrap())],
//! );
//! let device = Constant(DeviceCapabilities::permissive());
//! let output = execute(vec![tape], &device, ExecutionConfig::default(), &TransformProgram::new()).unwrap();
//! assert_eq!(output.results, vec![ResultValue::from(Tensor::scalar(1.0))]);
//! ```

pub mod error;
pub mod execution;
pub mod qnode;
pub mod result;
pub mod statistics;

pub use error::{ExecutionError, Result};
pub use execution::{execute, execute_with_jvp, execute_with_vjp, ExecutionOutput, ProductOutput};
pub use qnode::QNode;
pub use result::{check_batch_len, shape_result};
pub use statistics::ExecutionStatistics;
