//! Result-shape helpers
//!
//! Devices return one value per script. Within a script, K > 1 measurements
//! form a tuple of K values.

use crate::error::{ExecutionError, Result};
use qflow_core::{OutputStructure, ResultValue, ReturnMode};

/// Check that a stage returned one result per script
///
/// # Errors
/// Returns [`ExecutionError::BatchLength`] on a mismatch
pub fn check_batch_len(results: &[ResultValue], expected: usize) -> Result<()> {
    if results.len() != expected {
        return Err(ExecutionError::BatchLength {
            expected,
            actual: results.len(),
        });
    }
    Ok(())
}

fn describe(value: &ResultValue) -> String {
    match value {
        ResultValue::Tuple(items) => format!("a tuple of {}", items.len()),
        ResultValue::Tensor(t) => format!("an array of shape {:?}", t.shape()),
        ResultValue::Counts(_) => "counts".to_string(),
        ResultValue::CountsList(list) => format!("{} counts", list.len()),
    }
}

/// Shape one script's result by the structure its function declared
///
/// Under [`ReturnMode::LegacySqueeze`] tuples may have been stacked into a
/// single array already, so mismatches are passed through instead of
/// rejected.
///
/// # Errors
/// Returns error if a tuple structure was declared and the result has a
/// different arity
pub fn shape_result(
    result: ResultValue,
    structure: OutputStructure,
    mode: ReturnMode,
) -> Result<ResultValue> {
    match (structure, result) {
        (OutputStructure::Single, ResultValue::Tuple(mut items)) if items.len() == 1 => {
            Ok(items.remove(0))
        }
        (OutputStructure::Single, result) => Ok(result),
        (OutputStructure::Tuple(n), ResultValue::Tuple(items)) if items.len() == n => {
            Ok(ResultValue::Tuple(items))
        }
        (OutputStructure::Tuple(1), result) if !matches!(result, ResultValue::Tuple(_)) => {
            Ok(ResultValue::Tuple(vec![result]))
        }
        (_, result) if mode == ReturnMode::LegacySqueeze => Ok(result),
        (OutputStructure::Tuple(n), result) => Err(ExecutionError::shape_mismatch(format!(
            "expected a tuple of {} results, got {}",
            n,
            describe(&result)
        ))),
    }
}
