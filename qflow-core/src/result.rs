//! Execution results and result reshaping
//!
//! Devices return one [`ResultValue`] per executed script. Postprocessing
//! stages regroup these values: stacking per-instance results back into a
//! batched value, or re-tagging leaves with the caller's numeric interface.

use crate::{Interface, QuantumError, Result, Tensor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Outcome counts keyed by bitstring
pub type Counts = BTreeMap<String, u64>;

/// One raw result per executed script
pub type ResultBatch = Vec<ResultValue>;

/// A (possibly nested) measurement result
#[derive(Clone, Debug, PartialEq)]
pub enum ResultValue {
    /// Numeric result
    Tensor(Tensor),
    /// Counts of a single measurement
    Counts(Counts),
    /// Counts of a broadcast measurement, one mapping per instance
    CountsList(Vec<Counts>),
    /// Results of several measurements or shot partitions
    Tuple(Vec<ResultValue>),
}

impl ResultValue {
    /// Whether this is a counts-shaped result
    ///
    /// Counts are never converted to arrays or re-tagged with an interface.
    pub fn is_counts(&self) -> bool {
        matches!(self, ResultValue::Counts(_) | ResultValue::CountsList(_))
    }

    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            ResultValue::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[ResultValue]> {
        match self {
            ResultValue::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Tensor payload, failing on any other shape
    pub fn into_tensor(self) -> Result<Tensor> {
        match self {
            ResultValue::Tensor(t) => Ok(t),
            other => Err(QuantumError::shape_mismatch(format!(
                "expected a numeric result, found {}",
                other.shape_name()
            ))),
        }
    }

    fn shape_name(&self) -> &'static str {
        match self {
            ResultValue::Tensor(_) => "tensor",
            ResultValue::Counts(_) => "counts",
            ResultValue::CountsList(_) => "counts list",
            ResultValue::Tuple(_) => "tuple",
        }
    }

    /// Re-tag every numeric leaf with `interface`, recursing through tuples
    pub fn with_interface(self, interface: Interface) -> ResultValue {
        match self {
            ResultValue::Tensor(t) => ResultValue::Tensor(t.with_interface(interface)),
            ResultValue::Tuple(items) => ResultValue::Tuple(
                items.into_iter().map(|r| r.with_interface(interface)).collect(),
            ),
            counts => counts,
        }
    }
}

impl From<Tensor> for ResultValue {
    fn from(t: Tensor) -> Self {
        ResultValue::Tensor(t)
    }
}

impl From<f64> for ResultValue {
    fn from(value: f64) -> Self {
        ResultValue::Tensor(Tensor::scalar(value))
    }
}

impl From<Counts> for ResultValue {
    fn from(counts: Counts) -> Self {
        ResultValue::Counts(counts)
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValue::Tensor(t) => write!(f, "{}", t),
            ResultValue::Counts(c) => write!(f, "{:?}", c),
            ResultValue::CountsList(c) => write!(f, "{:?}", c),
            ResultValue::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Convention used when per-instance results are recombined
///
/// # Example
/// ```
/// use qflow_core::ReturnMode;
///
/// assert_eq!("legacy_squeeze".parse::<ReturnMode>().unwrap(), ReturnMode::LegacySqueeze);
/// assert_eq!(ReturnMode::default(), ReturnMode::StructuredStack);
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnMode {
    /// Stack everything into one array and drop all singleton axes
    LegacySqueeze,
    /// Stack leaf by leaf, keeping tuple structure
    #[default]
    StructuredStack,
}

impl ReturnMode {
    /// Recombine `results` under this convention
    ///
    /// # Errors
    /// Returns error if the results cannot be stacked
    pub fn stack(self, results: &[ResultValue]) -> Result<ResultValue> {
        match self {
            ReturnMode::LegacySqueeze => squeeze_stack(results),
            ReturnMode::StructuredStack => nested_stack(results),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReturnMode::LegacySqueeze => "legacy_squeeze",
            ReturnMode::StructuredStack => "structured_stack",
        }
    }
}

impl FromStr for ReturnMode {
    type Err = QuantumError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "legacy_squeeze" => Ok(ReturnMode::LegacySqueeze),
            "structured_stack" => Ok(ReturnMode::StructuredStack),
            other => Err(QuantumError::ValidationError(format!(
                "unknown return mode '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ReturnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Whether a raw batch is counts-shaped
///
/// True for a single counts value or a batch in which every entry is counts.
pub fn is_count_result(results: &[ResultValue]) -> bool {
    !results.is_empty() && results.iter().all(ResultValue::is_counts)
}

/// Stack parallel nested results leaf by leaf
///
/// Tuples are walked depth-first in parallel and only the leaves are stacked,
/// so `[(a0, b0), (a1, b1)]` becomes `(stack[a0, a1], stack[b0, b1])`. Counts
/// leaves are collected into a [`ResultValue::CountsList`].
///
/// # Errors
/// Returns [`QuantumError::Reconstruction`] if `results` is empty, mixes
/// tuples with other values or has tuples of different lengths.
/// Incompatible array shapes give [`QuantumError::ShapeMismatch`].
pub fn nested_stack(results: &[ResultValue]) -> Result<ResultValue> {
    let first = results
        .first()
        .ok_or_else(|| QuantumError::reconstruction("cannot stack an empty result batch"))?;

    match first {
        ResultValue::Tuple(items) => {
            let width = items.len();
            let mut columns: Vec<Vec<ResultValue>> = vec![Vec::with_capacity(results.len()); width];
            for r in results {
                let row = r.as_tuple().filter(|row| row.len() == width).ok_or_else(|| {
                    QuantumError::reconstruction(format!(
                        "cannot stack a {} with a tuple of length {}",
                        r.shape_name(),
                        width
                    ))
                })?;
                for (column, value) in columns.iter_mut().zip(row) {
                    column.push(value.clone());
                }
            }
            let stacked = columns
                .iter()
                .map(|column| nested_stack(column))
                .collect::<Result<Vec<_>>>()?;
            Ok(ResultValue::Tuple(stacked))
        }
        ResultValue::Counts(_) => {
            let counts = results
                .iter()
                .map(|r| match r {
                    ResultValue::Counts(c) => Ok(c.clone()),
                    other => Err(QuantumError::reconstruction(format!(
                        "cannot stack counts with a {}",
                        other.shape_name()
                    ))),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(ResultValue::CountsList(counts))
        }
        _ => Ok(ResultValue::Tensor(Tensor::stack(&leaf_tensors(results)?)?)),
    }
}

/// Stack results and remove every singleton axis
///
/// Tuples are first stacked into a single array. A batch of size one is
/// squeezed away like any other singleton axis.
///
/// # Errors
/// Returns error if the results cannot be stacked into one array
pub fn squeeze_stack(results: &[ResultValue]) -> Result<ResultValue> {
    if results.first().map_or(false, ResultValue::is_counts) {
        return nested_stack(results);
    }
    let rows = results
        .iter()
        .map(|r| match r {
            ResultValue::Tuple(items) => Tensor::stack(&leaf_tensors(items)?),
            ResultValue::Tensor(t) => Ok(t.clone()),
            other => Err(QuantumError::reconstruction(format!(
                "cannot stack a {} into an array",
                other.shape_name()
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ResultValue::Tensor(Tensor::stack(&rows)?.squeeze()?))
}

fn leaf_tensors(results: &[ResultValue]) -> Result<Vec<Tensor>> {
    results
        .iter()
        .map(|r| match r {
            ResultValue::Tensor(t) => Ok(t.clone()),
            other => Err(QuantumError::reconstruction(format!(
                "cannot stack a {} with a tensor",
                other.shape_name()
            ))),
        })
        .collect()
}
