//! Transform programs
//!
//! A [`TransformProgram`] is a FIFO queue of deferred [`Transform`] stages.
//! Applying a program threads a tape batch through every stage in
//! registration order and records, per stage, how many tapes each input tape
//! turned into. The returned [`BatchPostprocessing`] undoes the stages in
//! reverse order.

use crate::error::{Result, TransformError};
use crate::transform::{PostprocessingFn, Transform, TransformOutput};
use petgraph::graph::DiGraph;
use qflow_core::{QuantumScript, ResultBatch, ResultValue};
use std::collections::VecDeque;
use std::fmt;

/// Ordered queue of transform stages
///
/// # Example
/// ```
/// use qflow_core::QuantumScript;
/// use qflow_transforms::{single_tape_postprocessing, TransformArgs, TransformDispatcher, TransformProgram};
///
/// let noop = TransformDispatcher::new("noop", |tape: &QuantumScript, _: &TransformArgs| {
///     Ok((vec![tape.clone()], single_tape_postprocessing()))
/// });
///
/// let mut program = TransformProgram::new();
/// program.push(noop.to_transform(TransformArgs::new()));
/// program.push(noop.to_transform(TransformArgs::new()));
/// assert_eq!(program.dag().edge_count(), 1);
/// assert_eq!(program.pop().unwrap().name(), "noop");
/// ```
#[derive(Clone, Debug, Default)]
pub struct TransformProgram {
    transforms: VecDeque<Transform>,
}

impl TransformProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage at the back
    pub fn push(&mut self, transform: Transform) {
        tracing::debug!(transform = transform.name(), position = self.transforms.len(), "push transform");
        self.transforms.push_back(transform);
    }

    /// Remove and return the front stage
    pub fn pop(&mut self) -> Option<Transform> {
        let transform = self.transforms.pop_front();
        if let Some(t) = &transform {
            tracing::debug!(transform = t.name(), remaining = self.transforms.len(), "pop transform");
        }
        transform
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Stages in execution order
    pub fn transforms(&self) -> impl Iterator<Item = &Transform> {
        self.transforms.iter()
    }

    /// Directed view of the stages, each linked to its successor
    ///
    /// Only for inspection; execution always follows queue order.
    pub fn dag(&self) -> DiGraph<String, ()> {
        let mut graph = DiGraph::new();
        let nodes: Vec<_> = self
            .transforms
            .iter()
            .map(|t| graph.add_node(t.name().to_string()))
            .collect();
        for pair in nodes.windows(2) {
            graph.add_edge(pair[0], pair[1], ());
        }
        graph
    }

    /// Thread a batch through every stage in queue order
    ///
    /// # Errors
    /// Returns the first error raised by any stage
    pub fn apply(&self, tapes: Vec<QuantumScript>) -> Result<(Vec<QuantumScript>, BatchPostprocessing)> {
        let mut batch = tapes;
        let mut postprocessing = BatchPostprocessing::identity();

        for transform in &self.transforms {
            let tapes_in = batch.len();
            let (next, stage) = apply_per_tape(transform.name(), &batch, |tape| transform.apply(tape))?;
            tracing::debug!(
                transform = transform.name(),
                tapes_in,
                tapes_out = next.len(),
                "applied program stage"
            );
            postprocessing.push_stage(stage);
            batch = next;
        }

        Ok((batch, postprocessing))
    }

    /// Apply every stage's node postprocessing to a node's final result
    ///
    /// Runs in reverse queue order, mirroring result reconstruction.
    pub fn node_postprocessing(&self, result: ResultValue) -> Result<ResultValue> {
        self.transforms
            .iter()
            .rev()
            .try_fold(result, |acc, t| (t.node_postprocessing())(acc))
    }
}

/// Apply a per-tape rewrite to every tape of a batch
///
/// # Errors
/// Returns the first error raised by `rewrite`
pub fn apply_per_tape<F>(
    name: &str,
    tapes: &[QuantumScript],
    rewrite: F,
) -> Result<(Vec<QuantumScript>, StagePostprocessing)>
where
    F: Fn(&QuantumScript) -> Result<TransformOutput>,
{
    let mut out = Vec::with_capacity(tapes.len());
    let mut stage = StagePostprocessing::new(name);
    for tape in tapes {
        let (new_tapes, f) = rewrite(tape)?;
        stage.push_group(new_tapes.len(), f);
        out.extend(new_tapes);
    }
    Ok((out, stage))
}

/// Postprocessing for one stage over a whole batch
///
/// Each input tape contributes a group: the number of tapes it was rewritten
/// into and the function recombining their results.
pub struct StagePostprocessing {
    name: String,
    groups: Vec<(usize, PostprocessingFn)>,
}

impl StagePostprocessing {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
        }
    }

    pub fn push_group(&mut self, count: usize, f: PostprocessingFn) {
        self.groups.push((count, f));
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of tapes this stage produced
    pub fn num_outputs(&self) -> usize {
        self.groups.iter().map(|(count, _)| count).sum()
    }

    /// Collapse the results of this stage's output tapes
    ///
    /// # Errors
    /// Returns error if `results` does not have one entry per output tape
    pub fn apply(self, results: ResultBatch) -> Result<ResultBatch> {
        let expected = self.num_outputs();
        if results.len() != expected {
            return Err(TransformError::postprocessing(
                &self.name,
                format!("expected {} results, got {}", expected, results.len()),
            ));
        }

        let mut remaining = results.into_iter();
        let mut collapsed = Vec::with_capacity(self.groups.len());
        for (count, f) in self.groups {
            let group: ResultBatch = remaining.by_ref().take(count).collect();
            collapsed.push(f(group)?);
        }
        Ok(collapsed)
    }
}

impl fmt::Debug for StagePostprocessing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagePostprocessing")
            .field("name", &self.name)
            .field("groups", &self.groups.iter().map(|(c, _)| *c).collect::<Vec<_>>())
            .finish()
    }
}

/// Reconstruction for a sequence of stages
///
/// Stages are recorded in application order and undone in reverse.
#[derive(Debug, Default)]
pub struct BatchPostprocessing {
    stages: Vec<StagePostprocessing>,
}

impl BatchPostprocessing {
    /// Reconstruction that leaves results untouched
    pub fn identity() -> Self {
        Self::default()
    }

    /// Record a stage applied after all stages recorded so far
    pub fn push_stage(&mut self, stage: StagePostprocessing) {
        self.stages.push(stage);
    }

    /// Append the stages of a later pipeline segment
    #[must_use]
    pub fn then(mut self, later: BatchPostprocessing) -> Self {
        self.stages.extend(later.stages);
        self
    }

    pub fn num_stages(&self) -> usize {
        self.stages.len()
    }

    /// Names of the recorded stages in application order
    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(StagePostprocessing::name)
    }

    /// Rebuild one result per original tape
    ///
    /// # Errors
    /// Returns the first error raised by any stage
    pub fn apply(self, results: ResultBatch) -> Result<ResultBatch> {
        self.stages
            .into_iter()
            .rev()
            .try_fold(results, |acc, stage| {
                tracing::trace!(stage = stage.name(), results = acc.len(), "postprocessing stage");
                stage.apply(acc)
            })
    }
}
