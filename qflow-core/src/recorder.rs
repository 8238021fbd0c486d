//! Recording context for quantum functions
//!
//! A quantum function receives a [`Recorder`] and its arguments, applies
//! operations and declares measurements. Recording replaces ambient queuing:
//! the context is always passed explicitly.

use crate::{MeasurementProcess, Operation, OutputStructure, QuantumScript, Result, Shots, Tensor};
use std::sync::Arc;

/// One recorded item
#[derive(Clone, Debug)]
pub enum QueueItem {
    Operation(Arc<Operation>),
    Measurement(Arc<MeasurementProcess>),
}

/// A user-defined circuit body
///
/// Closures of the form `|rec: &mut Recorder, args: &[Tensor]| -> Result<()>`
/// implement this automatically.
pub trait QuantumFunction: Send + Sync {
    fn record(&self, recorder: &mut Recorder, args: &[Tensor]) -> Result<()>;
}

impl<F> QuantumFunction for F
where
    F: Fn(&mut Recorder, &[Tensor]) -> Result<()> + Send + Sync,
{
    fn record(&self, recorder: &mut Recorder, args: &[Tensor]) -> Result<()> {
        self(recorder, args)
    }
}

/// Collects operations and measurements in call order
///
/// # Example
/// ```
/// use qflow_core::{ops, MeasurementProcess, Recorder, Shots};
///
/// let mut rec = Recorder::new();
/// rec.apply(ops::rx(0.3, 0usize).unwrap());
/// rec.measure(MeasurementProcess::expval(ops::pauli_z(0usize).unwrap()));
/// let script = rec.into_script(Shots::None);
/// assert_eq!(script.operations().len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    queue: Vec<QueueItem>,
    output: Option<OutputStructure>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an operation
    pub fn apply(&mut self, op: Operation) -> &mut Self {
        self.queue.push(QueueItem::Operation(Arc::new(op)));
        self
    }

    /// Record an already shared operation without copying it
    pub fn apply_shared(&mut self, op: Arc<Operation>) -> &mut Self {
        self.queue.push(QueueItem::Operation(op));
        self
    }

    /// Record a single returned measurement
    pub fn measure(&mut self, measurement: MeasurementProcess) -> &mut Self {
        self.queue.push(QueueItem::Measurement(Arc::new(measurement)));
        self
    }

    /// Record a sequence of returned measurements
    ///
    /// The function's output is a tuple even when `measurements` has a single
    /// entry.
    pub fn measure_all(&mut self, measurements: Vec<MeasurementProcess>) -> &mut Self {
        let count = self.measurement_count() + measurements.len();
        for m in measurements {
            self.measure(m);
        }
        self.output = Some(OutputStructure::Tuple(count));
        self
    }

    /// Replay a script's operations and measurements into this context
    pub fn replay(&mut self, script: &QuantumScript) -> &mut Self {
        for op in script.all_operations() {
            self.queue.push(QueueItem::Operation(Arc::clone(op)));
        }
        for m in script.measurements() {
            self.queue.push(QueueItem::Measurement(Arc::clone(m)));
        }
        self
    }

    /// Declare the shape of the function's return value
    pub fn declare_output(&mut self, structure: OutputStructure) -> &mut Self {
        self.output = Some(structure);
        self
    }

    /// Recorded items so far
    pub fn queue(&self) -> &[QueueItem] {
        &self.queue
    }

    pub fn measurement_count(&self) -> usize {
        self.queue
            .iter()
            .filter(|item| matches!(item, QueueItem::Measurement(_)))
            .count()
    }

    /// Finish recording
    pub fn into_script(self, shots: Shots) -> QuantumScript {
        let output = self.output;
        let script = QuantumScript::from_queue(self.queue, shots);
        match output {
            Some(structure) => script.with_output_structure(structure),
            None => script,
        }
    }

    /// Run `func` with `args` in a fresh context and return the recorded script
    ///
    /// # Errors
    /// Propagates any error raised by the function body
    pub fn record<F>(func: &F, args: &[Tensor], shots: Shots) -> Result<QuantumScript>
    where
        F: QuantumFunction + ?Sized,
    {
        let mut recorder = Recorder::new();
        func.record(&mut recorder, args)?;
        Ok(recorder.into_script(shots))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ops, Wires};

    #[test]
    fn test_record_function() {
        let circuit = |rec: &mut Recorder, args: &[Tensor]| -> Result<()> {
            rec.apply(ops::rx(args[0].clone(), 0usize)?);
            rec.apply(ops::cnot(0usize, 1usize)?);
            rec.measure(MeasurementProcess::expval(ops::pauli_z(1usize)?));
            Ok(())
        };
        let script = Recorder::record(&circuit, &[Tensor::scalar(0.4)], Shots::None).unwrap();
        assert_eq!(script.operations().len(), 2);
        assert_eq!(script.num_params(), 1);
        assert_eq!(script.output_structure(), OutputStructure::Single);
    }

    #[test]
    fn test_measure_all_forces_tuple() {
        let mut rec = Recorder::new();
        rec.measure_all(vec![MeasurementProcess::probs(Wires::new([0]))]);
        let script = rec.into_script(Shots::None);
        assert_eq!(script.output_structure(), OutputStructure::Tuple(1));
    }

    #[test]
    fn test_declared_output_overrides_count() {
        let mut rec = Recorder::new();
        rec.measure(MeasurementProcess::state());
        rec.declare_output(OutputStructure::Tuple(1));
        assert_eq!(rec.into_script(Shots::None).output_structure(), OutputStructure::Tuple(1));
    }

    #[test]
    fn test_replay_shares_instances() {
        let script = QuantumScript::new(
            vec![ops::hadamard(0usize).unwrap()],
            vec![MeasurementProcess::state()],
        );
        let mut rec = Recorder::new();
        rec.replay(&script);
        assert_eq!(rec.queue().len(), 2);
        match &rec.queue()[0] {
            QueueItem::Operation(op) => assert!(Arc::ptr_eq(op, &script.operations()[0])),
            other => panic!("unexpected item {:?}", other),
        }
    }

    #[test]
    fn test_function_error_propagates() {
        let circuit = |rec: &mut Recorder, _: &[Tensor]| -> Result<()> {
            rec.apply(ops::cnot(0usize, 0usize)?);
            Ok(())
        };
        assert!(Recorder::record(&circuit, &[], Shots::None).is_err());
    }
}
