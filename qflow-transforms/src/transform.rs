//! Transforms and the three ways of applying them
//!
//! A transform is a rewrite `(tape, args) -> (tapes, postprocessing)`. A
//! [`TransformDispatcher`] wraps one and exposes it three ways:
//!
//! - [`TransformDispatcher::apply_to_tape`]: run the rewrite now on a tape
//! - [`TransformDispatcher::register_on_node`]: queue a deferred [`Transform`]
//!   on anything carrying a [`TransformProgram`]
//! - [`TransformDispatcher::wrap_function`]: rewrite the body of a quantum
//!   function each time it is recorded

use crate::error::{Result, TransformError};
use crate::program::TransformProgram;
use qflow_core::{
    QuantumFunction, QuantumScript, Recorder, ResultBatch, ResultValue, Shots, Tensor,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Reconstructs one result from the results of the tapes a rewrite produced
pub type PostprocessingFn = Box<dyn FnOnce(ResultBatch) -> Result<ResultValue> + Send>;

/// Output of a rewrite: the new tapes and how to recombine their results
pub type TransformOutput = (Vec<QuantumScript>, PostprocessingFn);

/// A tape rewrite
pub type TransformFn =
    Arc<dyn Fn(&QuantumScript, &TransformArgs) -> Result<TransformOutput> + Send + Sync>;

/// Optional expansion run on a tape before the rewrite
pub type ExpandFn = Arc<dyn Fn(&QuantumScript) -> Result<QuantumScript> + Send + Sync>;

/// Extra processing applied to a node's final result
pub type NodePostprocessingFn = Arc<dyn Fn(ResultValue) -> Result<ResultValue> + Send + Sync>;

/// Node postprocessing that returns its input unchanged
pub fn default_node_postprocessing() -> NodePostprocessingFn {
    Arc::new(|result: ResultValue| -> Result<ResultValue> { Ok(result) })
}

/// Postprocessing for a rewrite that produced exactly one tape
pub fn single_tape_postprocessing() -> PostprocessingFn {
    Box::new(|results: ResultBatch| {
        let count = results.len();
        let mut results = results.into_iter();
        match (results.next(), results.next()) {
            (Some(result), None) => Ok(result),
            _ => Err(TransformError::postprocessing(
                "single tape",
                format!("expected 1 result, got {}", count),
            )),
        }
    })
}

/// A value bound to a transform
#[derive(Clone, Debug, PartialEq)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tensor(Tensor),
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        ArgValue::Bool(v)
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        ArgValue::Int(v)
    }
}

impl From<usize> for ArgValue {
    fn from(v: usize) -> Self {
        ArgValue::Int(v as i64)
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        ArgValue::Float(v)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::Str(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        ArgValue::Str(v)
    }
}

impl From<Tensor> for ArgValue {
    fn from(v: Tensor) -> Self {
        ArgValue::Tensor(v)
    }
}

/// Positional and keyword arguments bound to a transform
///
/// # Example
/// ```
/// use qflow_transforms::TransformArgs;
///
/// let args = TransformArgs::new().with_kwarg("all_operations", true);
/// assert!(args.get_bool("all_operations", false).unwrap());
/// assert_eq!(args.get_usize("depth", 10).unwrap(), 10);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransformArgs {
    positional: Vec<ArgValue>,
    keyword: BTreeMap<String, ArgValue>,
}

impl TransformArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    #[must_use]
    pub fn with_arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument
    #[must_use]
    pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    #[inline]
    pub fn positional(&self) -> &[ArgValue] {
        &self.positional
    }

    #[inline]
    pub fn keyword(&self) -> &BTreeMap<String, ArgValue> {
        &self.keyword
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.keyword.get(name)
    }

    /// Boolean keyword argument, `default` when absent
    pub fn get_bool(&self, name: &str, default: bool) -> Result<bool> {
        match self.get(name) {
            None => Ok(default),
            Some(ArgValue::Bool(v)) => Ok(*v),
            Some(other) => Err(type_error(name, "a bool", other)),
        }
    }

    /// Non-negative integer keyword argument, `default` when absent
    pub fn get_usize(&self, name: &str, default: usize) -> Result<usize> {
        match self.get(name) {
            None => Ok(default),
            Some(ArgValue::Int(v)) => usize::try_from(*v)
                .map_err(|_| TransformError::invalid_argument(name, "must not be negative")),
            Some(other) => Err(type_error(name, "an integer", other)),
        }
    }

    /// String keyword argument, if present
    pub fn get_str(&self, name: &str) -> Result<Option<&str>> {
        match self.get(name) {
            None => Ok(None),
            Some(ArgValue::Str(v)) => Ok(Some(v)),
            Some(other) => Err(type_error(name, "a string", other)),
        }
    }
}

fn type_error(name: &str, expected: &str, found: &ArgValue) -> TransformError {
    TransformError::invalid_argument(name, format!("expected {}, found {:?}", expected, found))
}

/// Run a rewrite and enforce its output contract
fn run_checked(
    name: &str,
    transform_fn: &TransformFn,
    tape: &QuantumScript,
    args: &TransformArgs,
) -> Result<TransformOutput> {
    let (tapes, postprocessing) = transform_fn(tape, args)?;
    if tapes.is_empty() {
        return Err(TransformError::operation_transform(format!(
            "transform '{}' returned an empty tape batch",
            name
        )));
    }
    tracing::trace!(transform = name, tapes = tapes.len(), "applied transform");
    Ok((tapes, postprocessing))
}

/// A deferred transform stage queued on a [`TransformProgram`]
#[derive(Clone)]
pub struct Transform {
    name: String,
    transform_fn: TransformFn,
    args: TransformArgs,
    expand_fn: Option<ExpandFn>,
    node_postprocessing: NodePostprocessingFn,
}

impl Transform {
    /// Create a stage with no expansion and default node postprocessing
    pub fn new(name: impl Into<String>, transform_fn: TransformFn, args: TransformArgs) -> Self {
        Self {
            name: name.into(),
            transform_fn,
            args,
            expand_fn: None,
            node_postprocessing: default_node_postprocessing(),
        }
    }

    #[must_use]
    pub fn with_expand_fn(mut self, expand_fn: ExpandFn) -> Self {
        self.expand_fn = Some(expand_fn);
        self
    }

    #[must_use]
    pub fn with_node_postprocessing(mut self, f: NodePostprocessingFn) -> Self {
        self.node_postprocessing = f;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn transform_fn(&self) -> &TransformFn {
        &self.transform_fn
    }

    #[inline]
    pub fn args(&self) -> &TransformArgs {
        &self.args
    }

    #[inline]
    pub fn expand_fn(&self) -> Option<&ExpandFn> {
        self.expand_fn.as_ref()
    }

    #[inline]
    pub fn node_postprocessing(&self) -> &NodePostprocessingFn {
        &self.node_postprocessing
    }

    /// Apply this stage to one tape
    ///
    /// The expansion function, if any, runs first.
    ///
    /// # Errors
    /// Returns error if the rewrite fails or produces no tapes
    pub fn apply(&self, tape: &QuantumScript) -> Result<TransformOutput> {
        match &self.expand_fn {
            Some(expand) => {
                let expanded = expand(tape)?;
                run_checked(&self.name, &self.transform_fn, &expanded, &self.args)
            }
            None => run_checked(&self.name, &self.transform_fn, tape, &self.args),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("has_expand_fn", &self.expand_fn.is_some())
            .finish()
    }
}

/// Something that carries a transform program
pub trait TransformTarget {
    fn transform_program_mut(&mut self) -> &mut TransformProgram;
}

impl TransformTarget for TransformProgram {
    fn transform_program_mut(&mut self) -> &mut TransformProgram {
        self
    }
}

/// A named tape rewrite usable on tapes, nodes and quantum functions
///
/// # Example
/// ```
/// use qflow_core::{ops, MeasurementProcess, QuantumScript};
/// use qflow_transforms::{single_tape_postprocessing, TransformArgs, TransformDispatcher};
///
/// let identity = TransformDispatcher::new("identity", |tape: &QuantumScript, _: &TransformArgs| {
///     Ok((vec![tape.clone()], single_tape_postprocessing()))
/// });
///
/// let tape = QuantumScript::new(vec![ops::hadamard(0usize).unwrap()], vec![MeasurementProcess::state()]);
/// let (tapes, _) = identity.apply_to_tape(&tape, &TransformArgs::new()).unwrap();
/// assert_eq!(tapes.len(), 1);
/// ```
#[derive(Clone)]
pub struct TransformDispatcher {
    name: String,
    transform_fn: TransformFn,
}

impl TransformDispatcher {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&QuantumScript, &TransformArgs) -> Result<TransformOutput> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            transform_fn: Arc::new(f),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply the rewrite directly to a tape
    ///
    /// # Errors
    /// Returns error if the rewrite fails or produces no tapes
    pub fn apply_to_tape(&self, tape: &QuantumScript, args: &TransformArgs) -> Result<TransformOutput> {
        run_checked(&self.name, &self.transform_fn, tape, args)
    }

    /// The deferred stage this dispatcher would queue for `args`
    pub fn to_transform(&self, args: TransformArgs) -> Transform {
        Transform::new(self.name.clone(), Arc::clone(&self.transform_fn), args)
    }

    /// Queue the rewrite on a node's program and return the node
    pub fn register_on_node<N: TransformTarget>(&self, mut node: N, args: TransformArgs) -> N {
        tracing::debug!(transform = %self.name, "registering transform on node");
        node.transform_program_mut().push(self.to_transform(args));
        node
    }

    /// Queue the rewrite with an expansion step run before it
    pub fn register_on_node_with_expand<N: TransformTarget>(
        &self,
        mut node: N,
        args: TransformArgs,
        expand_fn: ExpandFn,
    ) -> N {
        tracing::debug!(transform = %self.name, "registering transform with expansion on node");
        node.transform_program_mut()
            .push(self.to_transform(args).with_expand_fn(expand_fn));
        node
    }

    /// Wrap a quantum function so its recorded body is rewritten
    ///
    /// Each time the wrapper is recorded, `func` is captured into a tape, the
    /// rewrite runs once, and the first resulting tape's operations and
    /// measurements are replayed into the active recorder. The function's
    /// declared return shape is kept as long as the rewrite keeps its
    /// measurement count.
    pub fn wrap_function<F>(&self, func: F, args: TransformArgs) -> TransformedFunction
    where
        F: QuantumFunction + 'static,
    {
        TransformedFunction {
            name: self.name.clone(),
            transform_fn: Arc::clone(&self.transform_fn),
            args,
            inner: Arc::new(func),
        }
    }
}

impl fmt::Debug for TransformDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformDispatcher")
            .field("name", &self.name)
            .finish()
    }
}

/// A quantum function whose body is rewritten when recorded
#[derive(Clone)]
pub struct TransformedFunction {
    name: String,
    transform_fn: TransformFn,
    args: TransformArgs,
    inner: Arc<dyn QuantumFunction>,
}

impl QuantumFunction for TransformedFunction {
    fn record(&self, recorder: &mut Recorder, args: &[Tensor]) -> qflow_core::Result<()> {
        let tape = Recorder::record(self.inner.as_ref(), args, Shots::None)?;
        let (tapes, _) = run_checked(&self.name, &self.transform_fn, &tape, &self.args)?;
        if let Some(first) = tapes.first() {
            recorder.replay(first);
            // rewrites that keep the measurements keep the declared return shape
            let structure = if first.measurements().len() == tape.measurements().len() {
                tape.output_structure()
            } else {
                first.output_structure()
            };
            recorder.declare_output(structure);
        }
        Ok(())
    }
}

/// Named dispatchers available for lookup
#[derive(Clone, Debug, Default)]
pub struct TransformRegistry {
    dispatchers: BTreeMap<String, TransformDispatcher>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in transforms
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(crate::batch_params::dispatcher());
        registry.register(crate::convert_to_numpy::dispatcher());
        registry.register(crate::expand::dispatcher());
        registry
    }

    /// Add a dispatcher, replacing any previous one with the same name
    pub fn register(&mut self, dispatcher: TransformDispatcher) {
        self.dispatchers.insert(dispatcher.name().to_string(), dispatcher);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dispatchers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dispatchers.keys().map(String::as_str)
    }

    /// Look up a dispatcher by name
    ///
    /// # Errors
    /// Returns [`TransformError::OperationTransform`] if `name` is not a
    /// registered transform
    pub fn get(&self, name: &str) -> Result<&TransformDispatcher> {
        self.dispatchers.get(name).ok_or_else(|| {
            TransformError::operation_transform(format!(
                "The transform to register, '{}', is not a registered callable",
                name
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qflow_core::{ops, MeasurementProcess, OutputStructure, QuantumError};

    fn simple_tape() -> QuantumScript {
        QuantumScript::new(
            vec![ops::rx(0.1, 0usize).unwrap()],
            vec![MeasurementProcess::expval(ops::pauli_z(0usize).unwrap())],
        )
    }

    fn identity() -> TransformDispatcher {
        TransformDispatcher::new("identity", |tape: &QuantumScript, _: &TransformArgs| {
            Ok((vec![tape.clone()], single_tape_postprocessing()))
        })
    }

    #[test]
    fn test_args_typed_access() {
        let args = TransformArgs::new()
            .with_arg(1.5)
            .with_kwarg("flag", true)
            .with_kwarg("depth", 3usize)
            .with_kwarg("mode", "legacy_squeeze");
        assert_eq!(args.positional().len(), 1);
        assert!(args.get_bool("flag", false).unwrap());
        assert_eq!(args.get_usize("depth", 0).unwrap(), 3);
        assert_eq!(args.get_str("mode").unwrap(), Some("legacy_squeeze"));
        assert!(matches!(
            args.get_bool("depth", false),
            Err(TransformError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_apply_to_tape() {
        let (tapes, post) = identity().apply_to_tape(&simple_tape(), &TransformArgs::new()).unwrap();
        assert_eq!(tapes.len(), 1);
        let result = post(vec![ResultValue::from(0.25)]).unwrap();
        assert_eq!(result, ResultValue::from(0.25));
    }

    #[test]
    fn test_empty_batch_rejected() {
        let empty = TransformDispatcher::new("empty", |_: &QuantumScript, _: &TransformArgs| {
            Ok((Vec::new(), single_tape_postprocessing()))
        });
        let result = empty.apply_to_tape(&simple_tape(), &TransformArgs::new());
        assert!(matches!(result, Err(TransformError::OperationTransform(_))));
    }

    #[test]
    fn test_single_tape_postprocessing_checks_count() {
        let post = single_tape_postprocessing();
        assert!(post(vec![0.1.into(), 0.2.into()]).is_err());
    }

    #[test]
    fn test_register_on_node() {
        let program = identity().register_on_node(TransformProgram::new(), TransformArgs::new());
        let program = identity().register_on_node(program, TransformArgs::new().with_arg(1i64));
        assert_eq!(program.len(), 2);
        assert_eq!(program.transforms().next().map(Transform::name), Some("identity"));
    }

    #[test]
    fn test_register_with_expand_runs_expansion_first() {
        let expand: ExpandFn = Arc::new(|tape: &QuantumScript| Ok(tape.clone().with_shots(10u64)));
        let program = identity().register_on_node_with_expand(
            TransformProgram::new(),
            TransformArgs::new(),
            expand,
        );
        let transform = program.transforms().next().unwrap();
        assert!(transform.expand_fn().is_some());
        let (tapes, _) = transform.apply(&simple_tape()).unwrap();
        assert_eq!(tapes[0].shots(), &Shots::Single(10));
    }

    #[test]
    fn test_wrap_function_replays_first_tape() {
        let drop_ops = TransformDispatcher::new("drop_ops", |tape: &QuantumScript, _: &TransformArgs| {
            let stripped = QuantumScript::from_parts(
                Vec::new(),
                Vec::new(),
                tape.measurements().to_vec(),
                tape.shots().clone(),
            );
            Ok((vec![stripped, tape.clone()], single_tape_postprocessing()))
        });
        let body = |rec: &mut Recorder, args: &[Tensor]| -> qflow_core::Result<()> {
            rec.apply(ops::rx(args[0].clone(), 0usize)?);
            rec.measure(MeasurementProcess::probs(qflow_core::Wires::new([0])));
            Ok(())
        };
        let wrapped = drop_ops.wrap_function(body, TransformArgs::new());
        let tape = Recorder::record(&wrapped, &[Tensor::scalar(0.3)], Shots::None).unwrap();
        assert!(tape.operations().is_empty());
        assert_eq!(tape.measurements().len(), 1);
    }

    #[test]
    fn test_wrap_function_keeps_tuple_return() {
        let identity = TransformDispatcher::new("identity", |tape: &QuantumScript, _: &TransformArgs| {
            let rebuilt = QuantumScript::from_parts(
                tape.prep().to_vec(),
                tape.operations().to_vec(),
                tape.measurements().to_vec(),
                tape.shots().clone(),
            );
            Ok((vec![rebuilt], single_tape_postprocessing()))
        });
        let body = |rec: &mut Recorder, args: &[Tensor]| -> qflow_core::Result<()> {
            rec.apply(ops::ry(args[0].clone(), 0usize)?);
            rec.measure_all(vec![MeasurementProcess::expval(ops::pauli_z(0usize)?)]);
            Ok(())
        };
        let wrapped = identity.wrap_function(body, TransformArgs::new());
        let tape = Recorder::record(&wrapped, &[Tensor::scalar(0.3)], Shots::None).unwrap();
        assert_eq!(tape.output_structure(), OutputStructure::Tuple(1));
    }

    #[test]
    fn test_wrap_function_surfaces_transform_error() {
        let failing = TransformDispatcher::new("failing", |_: &QuantumScript, _: &TransformArgs| {
            Err(TransformError::usage("nothing to do"))
        });
        let body = |_: &mut Recorder, _: &[Tensor]| -> qflow_core::Result<()> { Ok(()) };
        let wrapped = failing.wrap_function(body, TransformArgs::new());
        let result = Recorder::record(&wrapped, &[], Shots::None);
        assert!(matches!(result, Err(QuantumError::Transform(_))));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = TransformRegistry::builtin();
        assert!(registry.contains("batch_params"));
        assert!(registry.contains("convert_to_numpy_parameters"));
        assert!(registry.contains("expand"));
        assert!(matches!(
            registry.get("not_a_transform"),
            Err(TransformError::OperationTransform(_))
        ));
    }
}
