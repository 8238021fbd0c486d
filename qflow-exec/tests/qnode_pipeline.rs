//! End-to-end tests: quantum function to device and back

use approx::assert_relative_eq;
use ndarray::arr1;
use qflow_core::{
    ops, Counts, Interface, MeasurementProcess, QuantumScript, Recorder, ResultBatch, ResultValue,
    ReturnType, Tensor, Wires,
};
use qflow_device::{Device, DeviceCapabilities, ExecutionConfig};
use qflow_exec::{ExecutionError, QNode};
use qflow_transforms::{
    PostprocessingFn, TransformArgs, TransformDispatcher, TransformError, TransformOutput,
};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Deterministic device whose results are read off the circuit parameters
///
/// `expval` and `var` report the last scalar parameter `p`, `probs` reports
/// `[p, 1 - p]` and `counts` reports the number of operations as a bit string.
/// Scalar parameters are also folded into a base-10 number reported by
/// `state`, which shows the order operations were applied in.
struct IdentityDevice {
    capabilities: DeviceCapabilities,
}

impl IdentityDevice {
    fn shared() -> Arc<dyn Device> {
        Arc::new(Self {
            capabilities: DeviceCapabilities::permissive(),
        })
    }
}

fn measurement_value(circuit: &QuantumScript, m: &MeasurementProcess) -> ResultValue {
    let scalars: Vec<f64> = circuit
        .get_parameters(false)
        .iter()
        .filter_map(Tensor::as_scalar)
        .collect();
    let last = scalars.last().copied().unwrap_or(0.0);
    match m.return_type() {
        ReturnType::Probability => Tensor::from_real(arr1(&[last, 1.0 - last]).into_dyn()).into(),
        ReturnType::Counts => {
            let counts: Counts = [(format!("{:b}", circuit.operations().len()), 1u64)]
                .into_iter()
                .collect();
            counts.into()
        }
        ReturnType::State => scalars.iter().fold(0.0, |acc, p| acc * 10.0 + p).into(),
        _ => last.into(),
    }
}

impl Device for IdentityDevice {
    fn name(&self) -> &str {
        "identity"
    }

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn execute(&self, circuits: &[QuantumScript], _: &ExecutionConfig) -> qflow_device::Result<ResultBatch> {
        Ok(circuits
            .iter()
            .map(|c| {
                let mut values: Vec<ResultValue> = c
                    .measurements()
                    .iter()
                    .map(|m| measurement_value(c, m))
                    .collect();
                if values.len() == 1 {
                    values.remove(0)
                } else {
                    ResultValue::Tuple(values)
                }
            })
            .collect())
    }

    fn compute_derivatives(
        &self,
        circuits: &[QuantumScript],
        _: &ExecutionConfig,
    ) -> qflow_device::Result<ResultBatch> {
        Ok(circuits
            .iter()
            .map(|c| {
                let mut grad = vec![0.0; c.trainable_params().len()];
                if let Some(last) = grad.last_mut() {
                    *last = 1.0;
                }
                Tensor::from_vec(grad).into()
            })
            .collect())
    }

    fn provides_derivatives(&self) -> bool {
        true
    }
}

fn scalars(value: &ResultValue) -> Vec<f64> {
    value
        .as_tensor()
        .and_then(Tensor::as_real)
        .map(|a| a.iter().copied().collect())
        .unwrap_or_default()
}

fn single_rotation(rec: &mut Recorder, args: &[Tensor]) -> qflow_core::Result<()> {
    rec.apply(ops::hadamard(0usize)?);
    rec.apply(ops::rx(args[0].clone(), 0usize)?);
    rec.measure(MeasurementProcess::expval(ops::pauli_z(0usize)?));
    Ok(())
}

#[test]
fn test_batched_node_matches_per_index_results() {
    init_tracing();
    let node = QNode::new(single_rotation, IdentityDevice::shared()).with_batch_params(false);

    let thetas = vec![0.1, 0.2, 0.3, 0.4];
    let batched = node.call(&[Tensor::from_vec(thetas.clone())]).unwrap();
    assert_eq!(batched.as_tensor().map(Tensor::shape), Some(&[4usize][..]));

    let plain = QNode::new(single_rotation, IdentityDevice::shared());
    for (&t, &b) in thetas.iter().zip(&scalars(&batched)) {
        let single = plain.call(&[Tensor::scalar(t)]).unwrap();
        assert_relative_eq!(single.as_tensor().and_then(Tensor::as_scalar).unwrap(), b);
    }
}

#[test]
fn test_batched_tuple_results_stack_leaf_by_leaf() {
    let node = QNode::new(
        |rec: &mut Recorder, args: &[Tensor]| -> qflow_core::Result<()> {
            rec.apply(ops::ry(args[0].clone(), 0usize)?);
            rec.measure(MeasurementProcess::expval(ops::pauli_z(0usize)?));
            rec.measure(MeasurementProcess::probs(Wires::new([0])));
            Ok(())
        },
        IdentityDevice::shared(),
    )
    .with_batch_params(false);

    let result = node.call(&[Tensor::from_vec(vec![0.25, 0.5, 0.75])]).unwrap();
    let items = result.as_tuple().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_tensor().map(Tensor::shape), Some(&[3usize][..]));
    assert_eq!(items[1].as_tensor().map(Tensor::shape), Some(&[3usize, 2][..]));
    assert_eq!(scalars(&items[1]), vec![0.25, 0.75, 0.5, 0.5, 0.75, 0.25]);
}

#[test]
fn test_legacy_mode_stacks_into_one_array() {
    let node = QNode::new(
        |rec: &mut Recorder, args: &[Tensor]| -> qflow_core::Result<()> {
            rec.apply(ops::ry(args[0].clone(), 0usize)?);
            rec.measure(MeasurementProcess::expval(ops::pauli_z(0usize)?));
            rec.measure(MeasurementProcess::var(ops::pauli_x(0usize)?));
            Ok(())
        },
        IdentityDevice::shared(),
    )
    .with_config(ExecutionConfig::legacy())
    .with_batch_params(false);

    let result = node.call(&[Tensor::from_vec(vec![0.25, 0.5])]).unwrap();
    assert_eq!(result.as_tensor().map(Tensor::shape), Some(&[2usize, 2][..]));
}

#[test]
fn test_malformed_batches_abort_evaluation() {
    let node = QNode::new(
        |rec: &mut Recorder, args: &[Tensor]| -> qflow_core::Result<()> {
            rec.apply(ops::rx(args[0].clone(), 0usize)?);
            rec.apply(ops::ry(args[1].clone(), 0usize)?);
            rec.measure(MeasurementProcess::expval(ops::pauli_z(0usize)?));
            Ok(())
        },
        IdentityDevice::shared(),
    )
    .with_batch_params(false);

    let err = node
        .call(&[Tensor::from_vec(vec![0.1, 0.2, 0.3]), Tensor::from_vec(vec![0.1, 0.2])])
        .unwrap_err();
    match err {
        ExecutionError::Transform(TransformError::Usage(msg)) => assert!(msg.contains("index 1")),
        other => panic!("unexpected error: {}", other),
    }

    // a scalar first parameter carries no batch dimension
    let all_ops = QNode::new(
        |rec: &mut Recorder, args: &[Tensor]| -> qflow_core::Result<()> {
            rec.apply(ops::rx(0.5, 0usize)?);
            rec.apply(ops::ry(args[0].clone(), 0usize)?);
            rec.measure(MeasurementProcess::expval(ops::pauli_z(0usize)?));
            Ok(())
        },
        IdentityDevice::shared(),
    )
    .with_batch_params(true);
    assert!(matches!(
        all_ops.call(&[Tensor::from_vec(vec![0.1, 0.2, 0.3])]),
        Err(ExecutionError::Transform(TransformError::Usage(_)))
    ));
}

/// Appends `rz(digit)` and maps the result `r` to `10 r + digit`
fn marker(digit: f64) -> TransformDispatcher {
    TransformDispatcher::new(
        format!("marker_{}", digit),
        move |tape: &QuantumScript, _: &TransformArgs| -> qflow_transforms::Result<TransformOutput> {
            let mut operations: Vec<_> = tape.operations().iter().map(|op| op.as_ref().clone()).collect();
            operations.push(ops::rz(digit, 0usize)?);
            let measurements = tape.measurements().iter().map(|m| m.as_ref().clone()).collect();
            let postprocessing: PostprocessingFn =
                Box::new(move |results: ResultBatch| -> qflow_transforms::Result<ResultValue> {
                let r = results
                    .first()
                    .and_then(ResultValue::as_tensor)
                    .and_then(Tensor::as_scalar)
                    .ok_or_else(|| TransformError::usage("expected one scalar result"))?;
                Ok(ResultValue::from(r * 10.0 + digit))
            });
            Ok((vec![QuantumScript::new(operations, measurements)], postprocessing))
        },
    )
}

#[test]
fn test_program_runs_fifo_and_undoes_in_reverse() {
    init_tracing();
    let mut node = QNode::new(
        |rec: &mut Recorder, _: &[Tensor]| -> qflow_core::Result<()> {
            rec.measure(MeasurementProcess::state());
            Ok(())
        },
        IdentityDevice::shared(),
    );
    for digit in [1.0, 2.0, 3.0] {
        node = marker(digit).register_on_node(node, TransformArgs::new());
    }

    let names: Vec<String> = node.program().transforms().map(|t| t.name().to_string()).collect();
    assert_eq!(names, ["marker_1", "marker_2", "marker_3"]);

    let mut program = node.program().clone();
    let popped: Vec<String> = std::iter::from_fn(|| program.pop())
        .map(|t| t.name().to_string())
        .collect();
    assert_eq!(popped, names);

    // rewrites ran 1, 2, 3 so the device reads 123; reconstruction runs 3, 2, 1
    let result = node.call(&[]).unwrap();
    assert_relative_eq!(result.as_tensor().and_then(Tensor::as_scalar).unwrap(), 123_321.0);
}

#[test]
fn test_result_interface_follows_first_parameter() {
    let node = QNode::new(
        |rec: &mut Recorder, args: &[Tensor]| -> qflow_core::Result<()> {
            rec.apply(ops::rx(args[0].clone(), 0usize)?);
            rec.apply(ops::ry(args[1].clone(), 0usize)?);
            rec.measure(MeasurementProcess::expval(ops::pauli_z(0usize)?));
            rec.measure(MeasurementProcess::probs(Wires::new([0])));
            Ok(())
        },
        IdentityDevice::shared(),
    );

    let x = Tensor::scalar(0.1).with_interface(Interface::Jax);
    let y = Tensor::scalar(0.2).with_interface(Interface::Torch);
    let result = node.call(&[x, y]).unwrap();
    for item in result.as_tuple().unwrap() {
        assert_eq!(item.as_tensor().map(Tensor::interface), Some(Interface::Jax));
    }
}

#[test]
fn test_counts_are_not_rewrapped() {
    let node = QNode::new(
        |rec: &mut Recorder, args: &[Tensor]| -> qflow_core::Result<()> {
            rec.apply(ops::rx(args[0].clone(), 0usize)?);
            rec.measure(MeasurementProcess::counts(Wires::new([0])));
            Ok(())
        },
        IdentityDevice::shared(),
    )
    .with_shots(50u64);

    let result = node
        .call(&[Tensor::scalar(0.3).with_interface(Interface::Torch)])
        .unwrap();
    let expected: Counts = [("1".to_string(), 1u64)].into_iter().collect();
    assert_eq!(result, ResultValue::Counts(expected));
}

#[test]
fn test_counts_without_shots_are_rejected() {
    let node = QNode::new(
        |rec: &mut Recorder, _: &[Tensor]| -> qflow_core::Result<()> {
            rec.measure(MeasurementProcess::counts(Wires::new([0])));
            Ok(())
        },
        IdentityDevice::shared(),
    );
    assert!(matches!(node.call(&[]), Err(ExecutionError::Device(_))));
}

#[test]
fn test_device_jacobians_through_node() {
    let node = QNode::new(single_rotation, IdentityDevice::shared())
        .with_config(ExecutionConfig::device_derivatives());
    let (result, jacobians) = node.call_with_jacobians(&[Tensor::scalar(0.6)]).unwrap();
    assert_relative_eq!(result.as_tensor().and_then(Tensor::as_scalar).unwrap(), 0.6);
    assert_eq!(jacobians.len(), 1);
    assert_eq!(scalars(&jacobians[0]), vec![1.0]);
}
