//! Execution dispatch
//!
//! A batch goes through the pipeline in this order:
//!
//! 1. the device fills in the configuration
//! 2. the user transform program rewrites the batch
//! 3. the device preprocesses the batch
//! 4. every parameter is converted to a plain array
//! 5. the device executes, computing derivatives if it was asked to
//! 6. results are rebuilt in reverse: conversion, device, user program
//!
//! Derivatives, JVPs and VJPs are reported per executed script. They are not
//! mapped back through the postprocessing of steps 2 to 4.

use crate::error::{ExecutionError, Result};
use crate::result::check_batch_len;
use crate::statistics::ExecutionStatistics;
use qflow_core::{QuantumScript, ResultBatch, ResultValue};
use qflow_device::{Device, ExecutionConfig};
use qflow_transforms::convert_to_numpy::{self, convert_to_numpy_parameters};
use qflow_transforms::{apply_per_tape, BatchPostprocessing, TransformProgram};
use std::time::{Duration, Instant};

/// Results of one pipeline evaluation
#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    /// One reconstructed result per submitted script
    pub results: ResultBatch,

    /// One Jacobian per executed script, when the device computed them
    pub jacobians: Option<ResultBatch>,

    pub statistics: ExecutionStatistics,
}

/// Output of a forward- or reverse-mode evaluation
#[derive(Debug, Clone)]
pub struct ProductOutput {
    /// One reconstructed result per submitted script
    pub results: ResultBatch,

    /// One product per executed script
    pub products: ResultBatch,

    pub statistics: ExecutionStatistics,
}

/// A batch that went through every rewrite and is ready for the device
struct PreparedBatch {
    config: ExecutionConfig,
    tapes: Vec<QuantumScript>,
    postprocessing: BatchPostprocessing,
    statistics: ExecutionStatistics,
    started: Instant,
}

impl PreparedBatch {
    fn finish(mut self, raw: ResultBatch, execution_time: Duration) -> Result<(ResultBatch, ExecutionStatistics)> {
        check_batch_len(&raw, self.tapes.len())?;
        self.statistics.execution_time = execution_time;

        let post_start = Instant::now();
        let results = self.postprocessing.apply(raw)?;
        check_batch_len(&results, self.statistics.tapes_submitted)?;
        self.statistics.postprocessing_time = post_start.elapsed();
        self.statistics.total_time = self.started.elapsed();

        Ok((results, self.statistics))
    }
}

fn prepare<D>(
    tapes: Vec<QuantumScript>,
    device: &D,
    config: ExecutionConfig,
    program: &TransformProgram,
) -> Result<PreparedBatch>
where
    D: Device + ?Sized,
{
    let started = Instant::now();
    let mut statistics = ExecutionStatistics::new();
    statistics.tapes_submitted = tapes.len();

    let config = device.setup_configuration(config)?;
    config.validate()?;

    let transform_start = Instant::now();
    let (tapes, program_post) = program.apply(tapes)?;
    statistics.transform_time = transform_start.elapsed();

    let preprocess_start = Instant::now();
    let (tapes, device_post) = device.preprocess(tapes, &config)?;
    let (tapes, numpy_stage) = apply_per_tape(convert_to_numpy::NAME, &tapes, |tape| {
        convert_to_numpy_parameters(tape)
    })?;
    statistics.preprocessing_time = preprocess_start.elapsed();

    let mut postprocessing = program_post.then(device_post);
    postprocessing.push_stage(numpy_stage);

    statistics.tapes_executed = tapes.len();
    statistics.stages = postprocessing.num_stages();

    tracing::debug!(
        device = device.name(),
        tapes_in = statistics.tapes_submitted,
        tapes_out = tapes.len(),
        stages = statistics.stages,
        "prepared batch"
    );

    Ok(PreparedBatch {
        config,
        tapes,
        postprocessing,
        statistics,
        started,
    })
}

/// Evaluate a batch of scripts on `device`
///
/// When the configuration asks for [`GradientMethod::Device`](qflow_device::GradientMethod::Device)
/// the device computes Jacobians alongside the results.
///
/// # Arguments
///
/// * `tapes` - Scripts to evaluate
/// * `device` - Device executing the batch
/// * `config` - Configuration, completed by the device before use
/// * `program` - User transform program applied before the device sees the batch
///
/// # Errors
///
/// Returns the first error raised by any stage. Device derivatives requested
/// from a device that does not support them for every script are rejected
/// before execution.
///
/// # Example
///
/// ```
/// use qflow_core::{ops, MeasurementProcess, QuantumScript, ResultBatch, ResultValue};
/// use qflow_device::{Device, DeviceCapabilities, ExecutionConfig};
/// use qflow_exec::execute;
/// use qflow_transforms::TransformProgram;
///
/// struct Zero(DeviceCapabilities);
///
/// impl Device for Zero {
///     fn name(&self) -> &str {
///         "zero"
///     }
///
///     fn capabilities(&self) -> &DeviceCapabilities {
///         &self.0
///     }
///
///     fn execute(&self, circuits: &[QuantumScript], _: &ExecutionConfig) -> qflow_device::Result<ResultBatch> {
///         Ok(circuits.iter().map(|_| ResultValue::from(0.0)).collect())
///     }
/// }
///
/// let tape = QuantumScript::new(
///     vec![ops::hadamard(0usize).unwrap()],
///     vec![MeasurementProcess::expval(ops::pauli_z(0usize).unwrap())],
/// );
/// let device = Zero(DeviceCapabilities::permissive());
/// let output = execute(vec![tape], &device, ExecutionConfig::default(), &TransformProgram::new()).unwrap();
/// assert_eq!(output.results, vec![ResultValue::from(0.0)]);
/// assert!(output.jacobians.is_none());
/// ```
pub fn execute<D>(
    tapes: Vec<QuantumScript>,
    device: &D,
    config: ExecutionConfig,
    program: &TransformProgram,
) -> Result<ExecutionOutput>
where
    D: Device + ?Sized,
{
    let batch = prepare(tapes, device, config, program)?;

    let device_derivatives = batch.config.uses_device_derivatives();
    if device_derivatives
        && !batch
            .tapes
            .iter()
            .all(|tape| device.supports_derivatives(Some(&batch.config), Some(tape)))
    {
        return Err(ExecutionError::unsupported(device.name(), "device derivatives"));
    }

    tracing::debug!(
        device = device.name(),
        gradient_method = %batch.config.gradient_method,
        device_derivatives,
        tapes = batch.tapes.len(),
        "dispatching batch"
    );

    let exec_start = Instant::now();
    let (raw, jacobians) = if device_derivatives {
        let (raw, jacobians) = device.execute_and_compute_derivatives(&batch.tapes, &batch.config)?;
        check_batch_len(&jacobians, batch.tapes.len())?;
        (raw, Some(jacobians))
    } else {
        (device.execute(&batch.tapes, &batch.config)?, None)
    };

    let (results, mut statistics) = batch.finish(raw, exec_start.elapsed())?;
    statistics.computed_derivatives = jacobians.is_some();

    Ok(ExecutionOutput {
        results,
        jacobians,
        statistics,
    })
}

/// Evaluate a batch together with Jacobian-vector products
///
/// `tangents` holds one vector per executed script, i.e. per script after
/// the program and device preprocessing have run.
///
/// # Errors
///
/// Returns [`ExecutionError::Unsupported`] if the device does not provide
/// forward-mode products, and [`ExecutionError::BatchLength`] if the number
/// of tangent vectors does not match the executed batch.
pub fn execute_with_jvp<D>(
    tapes: Vec<QuantumScript>,
    device: &D,
    config: ExecutionConfig,
    program: &TransformProgram,
    tangents: &[Vec<f64>],
) -> Result<ProductOutput>
where
    D: Device + ?Sized,
{
    let batch = prepare(tapes, device, config, program)?;
    if !device.supports_jvp(Some(&batch.config), None) {
        return Err(ExecutionError::unsupported(device.name(), "Jacobian-vector products"));
    }
    if tangents.len() != batch.tapes.len() {
        return Err(ExecutionError::BatchLength {
            expected: batch.tapes.len(),
            actual: tangents.len(),
        });
    }

    tracing::debug!(device = device.name(), tapes = batch.tapes.len(), "dispatching jvp batch");

    let exec_start = Instant::now();
    let (raw, products) = device.execute_and_compute_jvp(&batch.tapes, tangents, &batch.config)?;
    check_batch_len(&products, batch.tapes.len())?;

    let (results, mut statistics) = batch.finish(raw, exec_start.elapsed())?;
    statistics.computed_derivatives = true;
    Ok(ProductOutput {
        results,
        products,
        statistics,
    })
}

/// Evaluate a batch together with vector-Jacobian products
///
/// `cotangents` holds one value per executed script, shaped like that
/// script's raw device result.
///
/// # Errors
///
/// Returns [`ExecutionError::Unsupported`] if the device does not provide
/// reverse-mode products, and [`ExecutionError::BatchLength`] if the number
/// of cotangents does not match the executed batch.
pub fn execute_with_vjp<D>(
    tapes: Vec<QuantumScript>,
    device: &D,
    config: ExecutionConfig,
    program: &TransformProgram,
    cotangents: &[ResultValue],
) -> Result<ProductOutput>
where
    D: Device + ?Sized,
{
    let batch = prepare(tapes, device, config, program)?;
    if !device.supports_vjp(Some(&batch.config), None) {
        return Err(ExecutionError::unsupported(device.name(), "vector-Jacobian products"));
    }
    check_batch_len(cotangents, batch.tapes.len())?;

    tracing::debug!(device = device.name(), tapes = batch.tapes.len(), "dispatching vjp batch");

    let exec_start = Instant::now();
    let (raw, products) = device.execute_and_compute_vjp(&batch.tapes, cotangents, &batch.config)?;
    check_batch_len(&products, batch.tapes.len())?;

    let (results, mut statistics) = batch.finish(raw, exec_start.elapsed())?;
    statistics.computed_derivatives = true;
    Ok(ProductOutput {
        results,
        products,
        statistics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use qflow_core::{ops, Interface, MeasurementProcess, Tensor};
    use qflow_device::{DeviceCapabilities, DeviceError, GradientMethod};
    use qflow_transforms::{batch_params, TransformArgs};

    /// Returns the first parameter of the last operation
    struct LastParameter {
        capabilities: DeviceCapabilities,
    }

    impl LastParameter {
        fn new() -> Self {
            Self {
                capabilities: DeviceCapabilities::permissive(),
            }
        }
    }

    impl Device for LastParameter {
        fn name(&self) -> &str {
            "last_parameter"
        }

        fn capabilities(&self) -> &DeviceCapabilities {
            &self.capabilities
        }

        fn execute(&self, circuits: &[QuantumScript], _: &ExecutionConfig) -> qflow_device::Result<ResultBatch> {
            circuits
                .iter()
                .map(|c| {
                    c.get_parameters(false)
                        .last()
                        .and_then(Tensor::as_scalar)
                        .map(ResultValue::from)
                        .ok_or_else(|| DeviceError::execution_failed("no scalar parameter"))
                })
                .collect()
        }
    }

    fn tape(theta: impl Into<Tensor>) -> QuantumScript {
        QuantumScript::new(
            vec![ops::rx(theta, 0usize).unwrap()],
            vec![MeasurementProcess::expval(ops::pauli_z(0usize).unwrap())],
        )
    }

    #[test]
    fn test_plain_execution() {
        let output = execute(
            vec![tape(0.1), tape(0.2)],
            &LastParameter::new(),
            ExecutionConfig::default(),
            &TransformProgram::new(),
        )
        .unwrap();
        assert_eq!(output.results, vec![ResultValue::from(0.1), ResultValue::from(0.2)]);
        assert!(output.jacobians.is_none());
        assert_eq!(output.statistics.tapes_submitted, 2);
        assert_eq!(output.statistics.tapes_executed, 2);
        assert!(!output.statistics.computed_derivatives);
    }

    #[test]
    fn test_program_stages_are_undone() {
        let mut program = TransformProgram::new();
        program.push(batch_params::dispatcher().to_transform(TransformArgs::new()));

        let output = execute(
            vec![tape(Tensor::from_vec(vec![0.1, 0.2, 0.3]))],
            &LastParameter::new(),
            ExecutionConfig::default(),
            &program,
        )
        .unwrap();
        assert_eq!(output.results.len(), 1);
        assert_eq!(output.statistics.tapes_executed, 3);
        // batch_params and numpy conversion; default preprocessing adds none
        assert_eq!(output.statistics.stages, 2);
        assert_eq!(output.results[0].as_tensor().map(Tensor::shape), Some(&[3usize][..]));
    }

    #[test]
    fn test_interface_survives_pipeline() {
        let theta = Tensor::scalar(0.7).with_interface(Interface::Tensorflow);
        let output = execute(
            vec![tape(theta)],
            &LastParameter::new(),
            ExecutionConfig::default(),
            &TransformProgram::new(),
        )
        .unwrap();
        assert_eq!(
            output.results[0].as_tensor().map(Tensor::interface),
            Some(Interface::Tensorflow)
        );
    }

    #[test]
    fn test_device_derivatives_require_support() {
        let err = execute(
            vec![tape(0.1)],
            &LastParameter::new(),
            ExecutionConfig::device_derivatives(),
            &TransformProgram::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ExecutionError::Unsupported { .. }));
        assert!(err.to_string().contains("device derivatives"));
    }

    #[test]
    fn test_products_require_support() {
        let dev = LastParameter::new();
        let program = TransformProgram::new();
        let err = execute_with_jvp(vec![tape(0.1)], &dev, ExecutionConfig::default(), &program, &[vec![1.0]])
            .unwrap_err();
        assert!(err.to_string().contains("Jacobian-vector"));

        let err = execute_with_vjp(
            vec![tape(0.1)],
            &dev,
            ExecutionConfig::default(),
            &program,
            &[ResultValue::from(1.0)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("vector-Jacobian"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ExecutionConfig::new().with_gradient_method(GradientMethod::Backprop);
        let err = execute(vec![tape(0.1)], &LastParameter::new(), config, &TransformProgram::new())
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Device(DeviceError::InvalidConfiguration(_))));
    }
}
