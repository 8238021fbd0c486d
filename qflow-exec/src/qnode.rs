//! Circuit evaluation nodes
//!
//! A [`QNode`] binds a quantum function to a device. Each call records the
//! function into a script, sends it through [`execute`](crate::execute) with
//! the node's transform program, and shapes the result by the structure the
//! function declared.

use crate::error::{ExecutionError, Result};
use crate::execution::{execute, ExecutionOutput};
use crate::result::shape_result;
use qflow_core::{QuantumFunction, QuantumScript, Recorder, ResultBatch, ResultValue, Shots, Tensor};
use qflow_device::{Device, ExecutionConfig};
use qflow_transforms::{batch_params, TransformArgs, TransformProgram, TransformTarget};
use std::fmt;
use std::sync::Arc;

/// A quantum function bound to a device
///
/// Transforms are attached with
/// [`TransformDispatcher::register_on_node`](qflow_transforms::TransformDispatcher::register_on_node)
/// and run in registration order on every call.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use qflow_core::{ops, MeasurementProcess, QuantumScript, Recorder, ResultBatch, ResultValue, Tensor};
/// use qflow_device::{Device, DeviceCapabilities, ExecutionConfig};
/// use qflow_exec::QNode;
///
/// struct Echo(DeviceCapabilities);
///
/// impl Device for Echo {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     fn capabilities(&self) -> &DeviceCapabilities {
///         &self.0
///     }
///
///     fn execute(&self, circuits: &[QuantumScript], _: &ExecutionConfig) -> qflow_device::Result<ResultBatch> {
///         Ok(circuits
///             .iter()
///             .map(|c| c.get_parameters(false).first().cloned().map(ResultValue::from).unwrap_or(0.0.into()))
///             .collect())
///     }
/// }
///
/// let node = QNode::new(
///     |rec: &mut Recorder, args: &[Tensor]| -> qflow_core::Result<()> {
///         rec.apply(ops::rx(args[0].clone(), 0usize)?);
///         rec.measure(MeasurementProcess::expval(ops::pauli_z(0usize)?));
///         Ok(())
///     },
///     Arc::new(Echo(DeviceCapabilities::permissive())),
/// );
/// let result = node.call(&[Tensor::scalar(0.25)]).unwrap();
/// assert_eq!(result, ResultValue::from(0.25));
/// ```
pub struct QNode {
    func: Arc<dyn QuantumFunction>,
    device: Arc<dyn Device>,
    config: ExecutionConfig,
    program: TransformProgram,
    shots: Shots,
}

impl QNode {
    /// Create a node with the default configuration and an empty program
    pub fn new<F>(func: F, device: Arc<dyn Device>) -> Self
    where
        F: QuantumFunction + 'static,
    {
        Self {
            func: Arc::new(func),
            device,
            config: ExecutionConfig::default(),
            program: TransformProgram::new(),
            shots: Shots::None,
        }
    }

    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_shots(mut self, shots: impl Into<Shots>) -> Self {
        self.shots = shots.into();
        self
    }

    /// Queue parameter batching using this node's return convention
    ///
    /// Set the configuration first; the convention is bound when the stage
    /// is queued.
    pub fn with_batch_params(self, all_operations: bool) -> Self {
        let args = TransformArgs::new()
            .with_kwarg("all_operations", all_operations)
            .with_kwarg("return_mode", self.config.return_mode.name());
        batch_params::dispatcher().register_on_node(self, args)
    }

    #[inline]
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    #[inline]
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    #[inline]
    pub fn program(&self) -> &TransformProgram {
        &self.program
    }

    /// Record the quantum function into a script
    pub fn construct(&self, args: &[Tensor]) -> Result<QuantumScript> {
        Ok(Recorder::record(self.func.as_ref(), args, self.shots.clone())?)
    }

    /// Evaluate the node and keep the full pipeline output
    ///
    /// The single result is shaped by the recorded script's output structure
    /// and passed through every stage's node postprocessing.
    pub fn evaluate(&self, args: &[Tensor]) -> Result<(ResultValue, ExecutionOutput)> {
        let tape = self.construct(args)?;
        let structure = tape.output_structure();

        tracing::debug!(
            device = self.device.name(),
            operations = tape.len(),
            measurements = tape.measurements().len(),
            transforms = self.program.len(),
            "evaluating node"
        );

        let mut output = execute(vec![tape], self.device.as_ref(), self.config.clone(), &self.program)?;
        let result = match output.results.first() {
            Some(result) if output.results.len() == 1 => result.clone(),
            _ => {
                return Err(ExecutionError::BatchLength {
                    expected: 1,
                    actual: output.results.len(),
                })
            }
        };
        let shaped = shape_result(result, structure, self.config.return_mode)?;
        let result = self.program.node_postprocessing(shaped)?;
        output.results = vec![result.clone()];
        Ok((result, output))
    }

    /// Evaluate the node
    ///
    /// # Errors
    /// Returns the first error raised while recording, transforming,
    /// executing or reshaping
    pub fn call(&self, args: &[Tensor]) -> Result<ResultValue> {
        self.evaluate(args).map(|(result, _)| result)
    }

    /// Evaluate the node and return device Jacobians alongside the result
    ///
    /// Requires a configuration using device derivatives.
    pub fn call_with_jacobians(&self, args: &[Tensor]) -> Result<(ResultValue, ResultBatch)> {
        if !self.config.uses_device_derivatives() {
            return Err(ExecutionError::InvalidConfig(format!(
                "jacobians requested with gradient method {}",
                self.config.gradient_method
            )));
        }
        let (result, output) = self.evaluate(args)?;
        let jacobians = output
            .jacobians
            .ok_or_else(|| ExecutionError::unsupported(self.device.name(), "device derivatives"))?;
        Ok((result, jacobians))
    }
}

impl TransformTarget for QNode {
    fn transform_program_mut(&mut self) -> &mut TransformProgram {
        &mut self.program
    }
}

impl fmt::Debug for QNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QNode")
            .field("device", &self.device.name())
            .field("config", &self.config)
            .field("program", &self.program)
            .field("shots", &self.shots)
            .finish()
    }
}
