//! Split a tape with batched parameters into one tape per batch index
//!
//! Selected parameters carry an extra leading batch dimension. The rewrite
//! produces one tape per batch index with that dimension sliced away and
//! stacks the per-tape results back together afterwards.

use crate::error::{Result, TransformError};
use crate::transform::{PostprocessingFn, TransformArgs, TransformDispatcher, TransformOutput};
use qflow_core::{Operation, QuantumScript, ResultBatch, ResultValue, ReturnMode, Tensor};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Registered name of the rewrite
pub const NAME: &str = "batch_params";

/// Split `tape` along the leading dimension of its batched parameters
///
/// With `all_operations` every parameter is batched, otherwise only the
/// trainable ones. Operations without a batched parameter are shared by all
/// output tapes. Every output tape keeps the measurements, shots and
/// trainable set of the input.
///
/// # Errors
/// Returns [`TransformError::Usage`] if no parameter is selected, if the first
/// selected parameter has no dimensions, or if a selected parameter's leading
/// dimension differs from the first one's
///
/// # Example
/// ```
/// use qflow_core::{ops, MeasurementProcess, QuantumScript, ReturnMode, Tensor};
/// use qflow_transforms::batch_params::batch_params;
///
/// let tape = QuantumScript::new(
///     vec![ops::rx(Tensor::from_vec(vec![0.1, 0.2, 0.3]), 0usize).unwrap()],
///     vec![MeasurementProcess::expval(ops::pauli_z(0usize).unwrap())],
/// );
/// let (tapes, _) = batch_params(&tape, false, ReturnMode::StructuredStack).unwrap();
/// assert_eq!(tapes.len(), 3);
/// ```
pub fn batch_params(tape: &QuantumScript, all_operations: bool, mode: ReturnMode) -> Result<TransformOutput> {
    let params = tape.get_parameters(false);
    let indices: BTreeSet<usize> = if all_operations {
        (0..params.len()).collect()
    } else {
        tape.trainable_params().iter().copied().collect()
    };

    let first = match indices.iter().next() {
        Some(&i) => i,
        None => {
            return Err(TransformError::usage(
                "There are no operations to transform. Either add trainable parameters, \
                 or specify `all_operations=True`.",
            ))
        }
    };

    let batch_dim = match params[first].shape().first() {
        Some(&0) => {
            return Err(TransformError::usage(format!(
                "Parameter {} has an empty batch dimension.",
                params[first]
            )))
        }
        Some(&n) => n,
        None => {
            return Err(TransformError::usage(format!(
                "Parameter {} does not contain a batch dimension.",
                params[first]
            )))
        }
    };

    for &i in &indices {
        if params[i].shape().first() != Some(&batch_dim) {
            return Err(TransformError::usage(format!(
                "Parameter {} (index {}) has incorrect batch dimension. Expecting first \
                 dimension of length {}.",
                params[i], i, batch_dim
            )));
        }
    }

    let mut offset = 0;
    let new_prep = split_operations(tape.prep(), &params, &indices, batch_dim, &mut offset)?;
    let new_ops = split_operations(tape.operations(), &params, &indices, batch_dim, &mut offset)?;

    let mut output_tapes = Vec::with_capacity(batch_dim);
    for (prep, ops) in new_prep.into_iter().zip(new_ops) {
        let new_tape = QuantumScript::from_parts(
            prep,
            ops,
            tape.measurements().to_vec(),
            tape.shots().clone(),
        )
        .with_output_structure(tape.output_structure())
        .with_trainable_params(tape.trainable_params().iter().copied())?;
        output_tapes.push(new_tape);
    }

    tracing::debug!(batch_dim, selected = indices.len(), "split batched parameters");

    let processing_fn: PostprocessingFn =
        Box::new(move |results: ResultBatch| -> Result<ResultValue> { Ok(mode.stack(&results)?) });
    Ok((output_tapes, processing_fn))
}

/// Per-batch-index copies of `ops`, sharing the ones with nothing to slice
fn split_operations(
    ops: &[Arc<Operation>],
    params: &[Tensor],
    indices: &BTreeSet<usize>,
    batch_dim: usize,
    offset: &mut usize,
) -> Result<Vec<Vec<Arc<Operation>>>> {
    let mut per_batch: Vec<Vec<Arc<Operation>>> = vec![Vec::with_capacity(ops.len()); batch_dim];

    for op in ops {
        let range = *offset..*offset + op.num_params();
        if indices.range(range.clone()).next().is_some() {
            for (b, batch_ops) in per_batch.iter_mut().enumerate() {
                let new_params = range
                    .clone()
                    .map(|i| {
                        if indices.contains(&i) {
                            params[i].index_axis0(b)
                        } else {
                            Ok(params[i].clone())
                        }
                    })
                    .collect::<qflow_core::Result<Vec<_>>>()?;
                batch_ops.push(Arc::new(op.bind_new_parameters(new_params)?));
            }
        } else {
            for batch_ops in per_batch.iter_mut() {
                batch_ops.push(Arc::clone(op));
            }
        }
        *offset = range.end;
    }

    Ok(per_batch)
}

/// Dispatcher reading `all_operations` (bool) and `return_mode` (string)
pub fn dispatcher() -> TransformDispatcher {
    TransformDispatcher::new(NAME, |tape: &QuantumScript, args: &TransformArgs| {
        let all_operations = args.get_bool("all_operations", false)?;
        let mode = match args.get_str("return_mode")? {
            Some(name) => name.parse::<ReturnMode>()?,
            None => ReturnMode::default(),
        };
        batch_params(tape, all_operations, mode)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use qflow_core::{ops, MeasurementProcess, Wires};

    fn batched_tape() -> QuantumScript {
        QuantumScript::new(
            vec![
                ops::ry(0.2, 0usize).unwrap(),
                ops::rx(Tensor::from_vec(vec![0.1, 0.2, 0.3]), 0usize).unwrap(),
            ],
            vec![MeasurementProcess::expval(ops::pauli_z(0usize).unwrap())],
        )
    }

    #[test]
    fn test_no_selected_parameters() {
        let mut tape = batched_tape();
        tape.set_trainable_params([]).unwrap();
        let result = batch_params(&tape, false, ReturnMode::StructuredStack);
        assert!(matches!(result, Err(TransformError::Usage(_))));
    }

    #[test]
    fn test_first_parameter_without_dimension() {
        let result = batch_params(&batched_tape(), true, ReturnMode::StructuredStack);
        match result {
            Err(TransformError::Usage(msg)) => assert!(msg.contains("batch dimension")),
            other => panic!("unexpected {:?}", other.map(|(t, _)| t.len())),
        }
    }

    #[test]
    fn test_empty_batch_rejected() {
        let tape = QuantumScript::new(
            vec![ops::rx(Tensor::from_vec(vec![]), 0usize).unwrap()],
            vec![MeasurementProcess::expval(ops::pauli_z(0usize).unwrap())],
        );
        match batch_params(&tape, false, ReturnMode::StructuredStack) {
            Err(TransformError::Usage(msg)) => assert!(msg.contains("empty batch dimension")),
            other => panic!("unexpected {:?}", other.map(|(t, _)| t.len())),
        }
    }

    #[test]
    fn test_mismatched_batch_dimension_names_parameter() {
        let tape = QuantumScript::new(
            vec![
                ops::rx(Tensor::from_vec(vec![0.1, 0.2, 0.3]), 0usize).unwrap(),
                ops::ry(Tensor::from_vec(vec![0.1, 0.2]), 0usize).unwrap(),
            ],
            vec![MeasurementProcess::probs(Wires::new([0]))],
        );
        match batch_params(&tape, false, ReturnMode::StructuredStack) {
            Err(TransformError::Usage(msg)) => assert!(msg.contains("index 1")),
            other => panic!("unexpected {:?}", other.map(|(t, _)| t.len())),
        }
    }

    #[test]
    fn test_only_trainable_parameters_sliced() {
        let mut tape = QuantumScript::new(
            vec![ops::rot(
                Tensor::from_vec(vec![0.1, 0.2]),
                Tensor::from_vec(vec![9.0, 9.0, 9.0]),
                Tensor::from_vec(vec![0.3, 0.4]),
                0usize,
            )
            .unwrap()],
            vec![MeasurementProcess::state()],
        );
        tape.set_trainable_params([0, 2]).unwrap();

        let (tapes, _) = batch_params(&tape, false, ReturnMode::StructuredStack).unwrap();
        assert_eq!(tapes.len(), 2);
        let data = tapes[1].operations()[0].data();
        assert_eq!(data[0].as_scalar(), Some(0.2));
        assert_eq!(data[1].shape(), &[3]);
        assert_eq!(data[2].as_scalar(), Some(0.4));
        assert_eq!(tapes[1].trainable_params(), &[0, 2]);
    }

    #[test]
    fn test_processing_modes() {
        let (_, structured) = batch_params(&batched_tape(), false, ReturnMode::StructuredStack).unwrap();
        let (_, legacy) = batch_params(&batched_tape(), false, ReturnMode::LegacySqueeze).unwrap();
        let results: ResultBatch = vec![0.1.into(), 0.2.into(), 0.3.into()];

        let stacked = structured(results.clone()).unwrap();
        assert_eq!(stacked.as_tensor().map(Tensor::shape), Some(&[3][..]));
        let squeezed = legacy(results).unwrap();
        assert_eq!(squeezed.as_tensor().map(Tensor::shape), Some(&[3][..]));
    }

    #[test]
    fn test_dispatcher_reads_arguments() {
        let args = TransformArgs::new()
            .with_kwarg("all_operations", false)
            .with_kwarg("return_mode", "legacy_squeeze");
        let (tapes, post) = dispatcher().apply_to_tape(&batched_tape(), &args).unwrap();
        assert_eq!(tapes.len(), 3);
        let out = post(vec![ResultValue::from(1.0); 3]).unwrap();
        assert!(out.as_tensor().is_some());

        let bad = TransformArgs::new().with_kwarg("return_mode", "sideways");
        assert!(dispatcher().apply_to_tape(&batched_tape(), &bad).is_err());
    }
}
