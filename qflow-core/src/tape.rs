//! Quantum script (tape) representation

use crate::recorder::QueueItem;
use crate::{MeasurementProcess, Operation, QuantumError, Result, Shots, Tensor, Wires};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Shape of the value a quantum function returned
///
/// A function that returns one measurement yields a bare result; one that
/// returns a sequence yields a tuple even when the sequence has one entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OutputStructure {
    Single,
    Tuple(usize),
}

impl OutputStructure {
    /// Structure implied by a measurement count alone
    pub fn for_measurements(count: usize) -> Self {
        if count == 1 {
            OutputStructure::Single
        } else {
            OutputStructure::Tuple(count)
        }
    }
}

/// An ordered record of a circuit
///
/// A script holds a state-preparation prefix, the gate operations and the
/// terminal measurements, plus the shot specification and the set of
/// trainable parameter indices.
///
/// Parameter indices address the flattened list obtained by concatenating
/// the data of `prep` and then `operations`; measurement observables are
/// tracked separately through [`QuantumScript::observable_parameters`].
///
/// Operations and measurements are shared through [`Arc`]. Rewrites build new
/// scripts and reuse the instances they did not touch, so "same instance" can
/// be checked with [`Arc::ptr_eq`].
///
/// # Example
/// ```
/// use qflow_core::{ops, MeasurementProcess, QuantumScript};
///
/// let script = QuantumScript::new(
///     vec![ops::rx(0.5, 0usize).unwrap(), ops::cnot(0usize, 1usize).unwrap()],
///     vec![MeasurementProcess::expval(ops::pauli_z(1usize).unwrap())],
/// );
/// assert_eq!(script.num_params(), 1);
/// assert_eq!(script.trainable_params(), &[0]);
/// ```
#[derive(Clone, Debug)]
pub struct QuantumScript {
    prep: Vec<Arc<Operation>>,
    operations: Vec<Arc<Operation>>,
    measurements: Vec<Arc<MeasurementProcess>>,
    shots: Shots,
    trainable_params: Vec<usize>,
    output_structure: OutputStructure,
}

impl QuantumScript {
    /// Create a script from gate operations and measurements
    ///
    /// Every parameter starts out trainable.
    pub fn new(operations: Vec<Operation>, measurements: Vec<MeasurementProcess>) -> Self {
        Self::from_parts(
            Vec::new(),
            operations.into_iter().map(Arc::new).collect(),
            measurements.into_iter().map(Arc::new).collect(),
            Shots::None,
        )
    }

    /// Create a script from shared components
    pub fn from_parts(
        prep: Vec<Arc<Operation>>,
        operations: Vec<Arc<Operation>>,
        measurements: Vec<Arc<MeasurementProcess>>,
        shots: Shots,
    ) -> Self {
        let num_params: usize = prep
            .iter()
            .chain(operations.iter())
            .map(|op| op.num_params())
            .sum();
        let output_structure = OutputStructure::for_measurements(measurements.len());

        Self {
            prep,
            operations,
            measurements,
            shots,
            trainable_params: (0..num_params).collect(),
            output_structure,
        }
    }

    /// Build a script from a flat recorded queue
    ///
    /// Leading state-preparation operations form the prep prefix; the rest of
    /// the operations and all measurements keep their recorded order.
    pub fn from_queue(items: Vec<QueueItem>, shots: Shots) -> Self {
        let mut prep = Vec::new();
        let mut operations = Vec::new();
        let mut measurements = Vec::new();

        for item in items {
            match item {
                QueueItem::Operation(op) => {
                    if op.is_state_prep() && operations.is_empty() {
                        prep.push(op);
                    } else {
                        operations.push(op);
                    }
                }
                QueueItem::Measurement(m) => measurements.push(m),
            }
        }
        tracing::trace!(
            prep = prep.len(),
            operations = operations.len(),
            measurements = measurements.len(),
            "built script from queue"
        );

        Self::from_parts(prep, operations, measurements, shots)
    }

    /// Replace the state-preparation prefix
    ///
    /// Parameters of the new prefix start out trainable. Operation parameters
    /// keep their trainability, with indices shifted past the new prefix.
    #[must_use]
    pub fn with_prep(self, prep: Vec<Operation>) -> Self {
        let old_offset: usize = self.prep.iter().map(|op| op.num_params()).sum();
        let new_offset: usize = prep.iter().map(Operation::num_params).sum();
        let trainable_params = (0..new_offset)
            .chain(
                self.trainable_params
                    .iter()
                    .filter(|&&i| i >= old_offset)
                    .map(|&i| i - old_offset + new_offset),
            )
            .collect();

        Self {
            prep: prep.into_iter().map(Arc::new).collect(),
            trainable_params,
            ..self
        }
    }

    /// Set the shot specification
    #[must_use]
    pub fn with_shots(mut self, shots: impl Into<Shots>) -> Self {
        self.shots = shots.into();
        self
    }

    /// Override the output structure tag
    #[must_use]
    pub fn with_output_structure(mut self, structure: OutputStructure) -> Self {
        self.output_structure = structure;
        self
    }

    /// Set the trainable parameters, consuming the script
    ///
    /// # Errors
    /// Returns error if an index is out of range
    pub fn with_trainable_params(mut self, indices: impl IntoIterator<Item = usize>) -> Result<Self> {
        self.set_trainable_params(indices)?;
        Ok(self)
    }

    /// Replace the trainable parameter set
    ///
    /// Indices are deduplicated and sorted. Operation count and order are
    /// never affected.
    ///
    /// # Errors
    /// Returns error if an index is out of range
    pub fn set_trainable_params(&mut self, indices: impl IntoIterator<Item = usize>) -> Result<()> {
        let num_params = self.num_params();
        let mut indices: Vec<usize> = indices.into_iter().collect();
        if let Some(&bad) = indices.iter().find(|&&i| i >= num_params) {
            return Err(QuantumError::invalid_parameter_index(bad, num_params));
        }
        indices.sort_unstable();
        indices.dedup();
        self.trainable_params = indices;
        Ok(())
    }

    #[inline]
    pub fn prep(&self) -> &[Arc<Operation>] {
        &self.prep
    }

    #[inline]
    pub fn operations(&self) -> &[Arc<Operation>] {
        &self.operations
    }

    #[inline]
    pub fn measurements(&self) -> &[Arc<MeasurementProcess>] {
        &self.measurements
    }

    #[inline]
    pub fn shots(&self) -> &Shots {
        &self.shots
    }

    #[inline]
    pub fn trainable_params(&self) -> &[usize] {
        &self.trainable_params
    }

    #[inline]
    pub fn output_structure(&self) -> OutputStructure {
        self.output_structure
    }

    /// Prep operations followed by gate operations
    pub fn all_operations(&self) -> impl Iterator<Item = &Arc<Operation>> {
        self.prep.iter().chain(self.operations.iter())
    }

    /// Total number of operation parameters
    pub fn num_params(&self) -> usize {
        self.all_operations().map(|op| op.num_params()).sum()
    }

    /// Number of operations including the prep prefix
    pub fn len(&self) -> usize {
        self.prep.len() + self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattened operation parameters
    ///
    /// With `trainable_only`, only entries listed in the trainable set are
    /// returned, in index order.
    pub fn get_parameters(&self, trainable_only: bool) -> Vec<Tensor> {
        let all = self.all_operations().flat_map(|op| op.data().iter().cloned());
        if trainable_only {
            all.enumerate()
                .filter(|(i, _)| self.trainable_params.binary_search(i).is_ok())
                .map(|(_, t)| t)
                .collect()
        } else {
            all.collect()
        }
    }

    /// Parameters carried by measurement observables
    pub fn observable_parameters(&self) -> Vec<Tensor> {
        self.measurements
            .iter()
            .flat_map(|m| m.data().iter().cloned())
            .collect()
    }

    /// Every wire touched by an operation or measurement
    pub fn wires(&self) -> Wires {
        Wires::union(
            self.all_operations()
                .map(|op| op.wires())
                .chain(self.measurements.iter().map(|m| m.wires())),
        )
    }

    /// Unwrap every parameter to the plain interface in place
    ///
    /// The original operations are restored when the guard is dropped. Shared
    /// operation instances are never modified; the script's own slots are
    /// swapped instead.
    pub fn unwrap_in_place(&mut self) -> UnwrapGuard<'_> {
        let saved = (
            self.prep.clone(),
            self.operations.clone(),
            self.measurements.clone(),
        );
        let unwrap_op = |op: &Arc<Operation>| {
            if op.has_plain_data() {
                Arc::clone(op)
            } else {
                Arc::new(op.unwrapped())
            }
        };
        self.prep = self.prep.iter().map(unwrap_op).collect();
        self.operations = self.operations.iter().map(unwrap_op).collect();
        self.measurements = self
            .measurements
            .iter()
            .map(|m| {
                if m.has_plain_data() {
                    Arc::clone(m)
                } else {
                    Arc::new(m.unwrapped())
                }
            })
            .collect();

        UnwrapGuard {
            script: self,
            saved: Some(saved),
        }
    }

    /// Validate the script
    ///
    /// Checks that the trainable set addresses existing parameters and that
    /// state preparations only appear in the prep prefix.
    pub fn validate(&self) -> Result<()> {
        let num_params = self.num_params();
        if let Some(&bad) = self.trainable_params.iter().find(|&&i| i >= num_params) {
            return Err(QuantumError::invalid_parameter_index(bad, num_params));
        }
        for (i, op) in self.operations.iter().enumerate() {
            if op.is_state_prep() {
                return Err(QuantumError::ValidationError(format!(
                    "Operation {} ({}) is a state preparation outside the prep prefix",
                    i,
                    op.name()
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for QuantumScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "QuantumScript({} operations, {} measurements, {})",
            self.len(),
            self.measurements.len(),
            self.shots
        )?;
        for (i, op) in self.all_operations().enumerate() {
            writeln!(f, "  {}: {}", i, op)?;
        }
        for m in &self.measurements {
            writeln!(f, "  -> {}", m)?;
        }
        Ok(())
    }
}

type SavedParts = (
    Vec<Arc<Operation>>,
    Vec<Arc<Operation>>,
    Vec<Arc<MeasurementProcess>>,
);

/// Scope in which a script's parameters are unwrapped
///
/// Created by [`QuantumScript::unwrap_in_place`]. Dereferences to the
/// unwrapped script and puts the original parameters back on drop.
pub struct UnwrapGuard<'a> {
    script: &'a mut QuantumScript,
    saved: Option<SavedParts>,
}

impl Deref for UnwrapGuard<'_> {
    type Target = QuantumScript;

    fn deref(&self) -> &QuantumScript {
        self.script
    }
}

impl Drop for UnwrapGuard<'_> {
    fn drop(&mut self) {
        if let Some((prep, operations, measurements)) = self.saved.take() {
            self.script.prep = prep;
            self.script.operations = operations;
            self.script.measurements = measurements;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ops, Interface};

    fn sample_script() -> QuantumScript {
        QuantumScript::new(
            vec![
                ops::rx(0.1, 0usize).unwrap(),
                ops::rot(0.2, 0.3, 0.4, 1usize).unwrap(),
                ops::cnot(0usize, 1usize).unwrap(),
            ],
            vec![MeasurementProcess::expval(ops::pauli_z(0usize).unwrap())],
        )
        .with_prep(vec![ops::basis_state(vec![1.0, 0.0], Wires::new([0, 1])).unwrap()])
    }

    #[test]
    fn test_script_creation() {
        let script = sample_script();
        assert_eq!(script.len(), 4);
        assert_eq!(script.prep().len(), 1);
        assert_eq!(script.num_params(), 5);
        assert_eq!(script.trainable_params(), &[0, 1, 2, 3, 4]);
        assert_eq!(script.output_structure(), OutputStructure::Single);
        assert!(script.validate().is_ok());
    }

    #[test]
    fn test_parameters_prep_first() {
        let script = sample_script();
        let params = script.get_parameters(false);
        assert_eq!(params.len(), 5);
        assert_eq!(params[0].shape(), &[2]);
        assert_eq!(params[1].as_scalar(), Some(0.1));
    }

    #[test]
    fn test_trainable_params() {
        let mut script = sample_script();
        script.set_trainable_params([4, 1, 1]).unwrap();
        assert_eq!(script.trainable_params(), &[1, 4]);
        let params = script.get_parameters(true);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].as_scalar(), Some(0.1));
        assert_eq!(params[1].as_scalar(), Some(0.4));
        assert_eq!(script.len(), 4);
    }

    #[test]
    fn test_with_prep_shifts_trainable_params() {
        let mut script = QuantumScript::new(
            vec![ops::rx(0.1, 0usize).unwrap(), ops::ry(0.2, 0usize).unwrap()],
            vec![MeasurementProcess::expval(ops::pauli_z(0usize).unwrap())],
        )
        .with_output_structure(OutputStructure::Tuple(1));
        script.set_trainable_params([1]).unwrap();

        let script = script.with_prep(vec![ops::basis_state(vec![1.0], Wires::new([0])).unwrap()]);
        assert_eq!(script.trainable_params(), &[0, 2]);
        assert_eq!(script.get_parameters(true)[1].as_scalar(), Some(0.2));
        assert_eq!(script.output_structure(), OutputStructure::Tuple(1));

        let script = script.with_prep(vec![]);
        assert_eq!(script.trainable_params(), &[1]);
        assert_eq!(script.get_parameters(true)[0].as_scalar(), Some(0.2));
    }

    #[test]
    fn test_trainable_params_out_of_range() {
        let mut script = sample_script();
        let result = script.set_trainable_params([7]);
        assert!(matches!(
            result,
            Err(QuantumError::InvalidParameterIndex { index: 7, num_params: 5 })
        ));
    }

    #[test]
    fn test_state_prep_outside_prefix_is_invalid() {
        let script = QuantumScript::new(
            vec![
                ops::rx(0.1, 0usize).unwrap(),
                ops::basis_state(vec![1.0], Wires::new([0])).unwrap(),
            ],
            vec![],
        );
        assert!(matches!(script.validate(), Err(QuantumError::ValidationError(_))));
    }

    #[test]
    fn test_from_queue_splits_prep() {
        let prep = Arc::new(ops::basis_state(vec![1.0], Wires::new([0])).unwrap());
        let rx = Arc::new(ops::rx(0.1, 0usize).unwrap());
        let meas = Arc::new(MeasurementProcess::probs(Wires::new([0])));
        let script = QuantumScript::from_queue(
            vec![
                QueueItem::Operation(Arc::clone(&prep)),
                QueueItem::Operation(Arc::clone(&rx)),
                QueueItem::Measurement(Arc::clone(&meas)),
            ],
            Shots::Single(100),
        );
        assert!(Arc::ptr_eq(&script.prep()[0], &prep));
        assert!(Arc::ptr_eq(&script.operations()[0], &rx));
        assert_eq!(script.measurements().len(), 1);
        assert_eq!(script.shots(), &Shots::Single(100));
    }

    #[test]
    fn test_wires_union() {
        let script = sample_script();
        assert_eq!(script.wires(), Wires::new([0, 1]));
    }

    #[test]
    fn test_unwrap_in_place_restores() {
        let mut script = QuantumScript::new(
            vec![ops::rx(Tensor::scalar(0.1).with_interface(Interface::Torch), 0usize).unwrap()],
            vec![],
        );
        let original = Arc::clone(&script.operations()[0]);
        {
            let guard = script.unwrap_in_place();
            assert!(guard.operations()[0].has_plain_data());
            assert!(!Arc::ptr_eq(&guard.operations()[0], &original));
        }
        assert!(Arc::ptr_eq(&script.operations()[0], &original));
        assert!(!original.has_plain_data());
    }

    #[test]
    fn test_display() {
        let display = format!("{}", sample_script());
        assert!(display.contains("4 operations"));
        assert!(display.contains("expval"));
    }
}
