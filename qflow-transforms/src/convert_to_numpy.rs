//! Normalize a tape to plain numeric parameters
//!
//! Devices only execute plain arrays. This rewrite strips interface tags from
//! operation and observable data and re-tags the results afterwards with the
//! interface detected on the input tape.

use crate::error::Result;
use crate::transform::{PostprocessingFn, TransformArgs, TransformDispatcher, TransformOutput};
use qflow_core::{Interface, MeasurementProcess, Operation, QuantumScript, ResultBatch, ResultValue};
use std::sync::Arc;

/// Registered name of the rewrite
pub const NAME: &str = "convert_to_numpy_parameters";

fn convert_operation(op: &Arc<Operation>) -> Arc<Operation> {
    if op.has_plain_data() {
        Arc::clone(op)
    } else {
        Arc::new(op.unwrapped())
    }
}

fn convert_measurement(m: &Arc<MeasurementProcess>) -> Arc<MeasurementProcess> {
    if m.has_plain_data() {
        Arc::clone(m)
    } else {
        Arc::new(m.unwrapped())
    }
}

/// Re-tag a batch of raw results with `interface`
///
/// Counts are left as they are. A batch with a single entry collapses to
/// that entry; a longer batch becomes a tuple.
pub fn cast_results(results: ResultBatch, interface: Interface) -> ResultValue {
    let mut cast: Vec<ResultValue> = results
        .into_iter()
        .map(|r| r.with_interface(interface))
        .collect();
    if cast.len() == 1 {
        cast.remove(0)
    } else {
        ResultValue::Tuple(cast)
    }
}

/// Rewrite `circuit` so every parameter is a plain array
///
/// Operations and measurements whose data is already plain are reused as the
/// same instances. The trainable set and output structure are kept.
///
/// # Errors
/// Returns error if the trainable set does not fit the rewritten script The
/// postprocessing re-tags results with the interface of the first trainable
/// parameter; parameters from other interfaces do not influence it.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use qflow_core::{ops, Interface, MeasurementProcess, QuantumScript, Tensor};
/// use qflow_transforms::convert_to_numpy::convert_to_numpy_parameters;
///
/// let circuit = QuantumScript::new(
///     vec![
///         ops::hadamard(0usize).unwrap(),
///         ops::rx(Tensor::scalar(0.1234).with_interface(Interface::Torch), 0usize).unwrap(),
///     ],
///     vec![MeasurementProcess::state()],
/// );
/// let (tapes, _) = convert_to_numpy_parameters(&circuit).unwrap();
/// assert!(Arc::ptr_eq(&tapes[0].operations()[0], &circuit.operations()[0]));
/// assert!(!Arc::ptr_eq(&tapes[0].operations()[1], &circuit.operations()[1]));
/// ```
pub fn convert_to_numpy_parameters(circuit: &QuantumScript) -> Result<TransformOutput> {
    let initial_interface = Interface::of(&circuit.get_parameters(true));

    let new_prep = circuit.prep().iter().map(convert_operation).collect();
    let new_ops = circuit.operations().iter().map(convert_operation).collect();
    let new_measurements = circuit.measurements().iter().map(convert_measurement).collect();

    let mut new_circuit =
        QuantumScript::from_parts(new_prep, new_ops, new_measurements, circuit.shots().clone())
            .with_output_structure(circuit.output_structure());
    new_circuit.set_trainable_params(circuit.trainable_params().iter().copied())?;

    tracing::trace!(interface = %initial_interface, "converted parameters to numpy");

    let postprocessing: PostprocessingFn =
        Box::new(move |results: ResultBatch| -> Result<ResultValue> {
            Ok(cast_results(results, initial_interface))
        });
    Ok((vec![new_circuit], postprocessing))
}

pub fn dispatcher() -> TransformDispatcher {
    TransformDispatcher::new(NAME, |tape: &QuantumScript, _: &TransformArgs| {
        convert_to_numpy_parameters(tape)
    })
}
