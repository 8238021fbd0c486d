//! Operation expansion through decomposition rules
//!
//! Operations failing a stopping predicate are replaced by their
//! decomposition, repeatedly, up to a maximum depth. Only names and parameter
//! routing are defined here; whether a decomposition is physically exact is
//! up to whoever registers the rule.

use crate::error::Result;
use crate::transform::{
    single_tape_postprocessing, ArgValue, ExpandFn, TransformArgs, TransformDispatcher,
    TransformOutput,
};
use qflow_core::{ops, Operation, QuantumError, QuantumScript};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Registered name of the rewrite
pub const NAME: &str = "expand";

/// Default number of expansion passes
pub const DEFAULT_DEPTH: usize = 10;

/// Rewrites one operation into a sequence of simpler ones
pub type DecompositionFn = Arc<dyn Fn(&Operation) -> qflow_core::Result<Vec<Operation>> + Send + Sync>;

/// Table of decomposition rules keyed by operation name
#[derive(Clone, Default)]
pub struct DecompositionRules {
    rules: HashMap<String, DecompositionFn>,
}

impl DecompositionRules {
    /// Empty rule table
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules for the operations in [`qflow_core::ops`]
    ///
    /// - `Rot(phi, theta, omega)` becomes `RZ(phi) RY(theta) RZ(omega)`
    /// - `BasisState(s)` becomes a `PauliX` on every wire where `s` is one
    pub fn standard() -> Self {
        let mut rules = Self::new();

        rules.add_rule("Rot", |op| {
            let wire = single_wire(op)?;
            let [phi, theta, omega] = op.data() else {
                return Err(QuantumError::invalid_parameter_count(op.name(), 3, op.num_params()));
            };
            Ok(vec![
                ops::rz(phi.clone(), wire.clone())?,
                ops::ry(theta.clone(), wire.clone())?,
                ops::rz(omega.clone(), wire)?,
            ])
        });

        rules.add_rule("BasisState", |op| {
            let state = op
                .data()
                .first()
                .and_then(|t| t.as_real())
                .ok_or_else(|| QuantumError::shape_mismatch("BasisState expects a real state vector"))?;
            if state.len() != op.wires().len() {
                return Err(QuantumError::shape_mismatch(format!(
                    "BasisState of length {} on {} wires",
                    state.len(),
                    op.wires().len()
                )));
            }
            state
                .iter()
                .zip(op.wires().iter())
                .filter(|(bit, _)| **bit == 1.0)
                .map(|(_, wire)| ops::pauli_x(wire.clone()))
                .collect()
        });

        rules
    }

    /// Register a rule, replacing any previous rule for `name`
    pub fn add_rule<F>(&mut self, name: impl Into<String>, rule: F)
    where
        F: Fn(&Operation) -> qflow_core::Result<Vec<Operation>> + Send + Sync + 'static,
    {
        self.rules.insert(name.into(), Arc::new(rule));
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Decomposition of `op`, or `None` if no rule applies
    pub fn decompose(&self, op: &Operation) -> Option<qflow_core::Result<Vec<Operation>>> {
        self.rules.get(op.name()).map(|rule| rule(op))
    }
}

impl fmt::Debug for DecompositionRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.rules.keys().collect();
        names.sort();
        f.debug_struct("DecompositionRules").field("rules", &names).finish()
    }
}

fn single_wire(op: &Operation) -> qflow_core::Result<qflow_core::Wire> {
    match op.wires().iter().next() {
        Some(w) if op.wires().len() == 1 => Ok(w.clone()),
        _ => Err(QuantumError::ValidationError(format!(
            "{} acts on {} wires, expected 1",
            op.name(),
            op.wires().len()
        ))),
    }
}

fn expand_operation<S>(
    op: &Arc<Operation>,
    depth: usize,
    stop_at: &S,
    rules: &DecompositionRules,
    out: &mut Vec<Arc<Operation>>,
) -> Result<()>
where
    S: Fn(&Operation) -> bool + ?Sized,
{
    if depth == 0 || stop_at(op.as_ref()) {
        out.push(Arc::clone(op));
        return Ok(());
    }
    match rules.decompose(op) {
        None => out.push(Arc::clone(op)),
        Some(decomposition) => {
            for child in decomposition? {
                expand_operation(&Arc::new(child), depth - 1, stop_at, rules, out)?;
            }
        }
    }
    Ok(())
}

/// Expand every operation that fails `stop_at`, up to `depth` levels
///
/// Operations are shared with the input wherever nothing was decomposed.
/// The trainable set is kept when the parameter count is unchanged;
/// otherwise every parameter of the expanded tape is trainable.
///
/// # Errors
/// Returns error if a decomposition rule fails
pub fn expand<S>(
    tape: &QuantumScript,
    depth: usize,
    stop_at: &S,
    rules: &DecompositionRules,
) -> Result<QuantumScript>
where
    S: Fn(&Operation) -> bool + ?Sized,
{
    let mut expanded = Vec::with_capacity(tape.len());
    for op in tape.all_operations() {
        expand_operation(op, depth, stop_at, rules, &mut expanded)?;
    }

    let split = expanded
        .iter()
        .position(|op| !op.is_state_prep())
        .unwrap_or(expanded.len());
    let operations = expanded.split_off(split);

    let mut new_tape = QuantumScript::from_parts(
        expanded,
        operations,
        tape.measurements().to_vec(),
        tape.shots().clone(),
    )
    .with_output_structure(tape.output_structure());

    if new_tape.num_params() == tape.num_params() {
        new_tape.set_trainable_params(tape.trainable_params().iter().copied())?;
    }

    tracing::debug!(
        depth,
        before = tape.len(),
        after = new_tape.len(),
        "expanded tape"
    );
    Ok(new_tape)
}

/// Expansion stopping at the named operations, as an [`ExpandFn`]
pub fn expand_fn(rules: DecompositionRules, keep: BTreeSet<String>, depth: usize) -> ExpandFn {
    Arc::new(move |tape: &QuantumScript| {
        expand(tape, depth, &|op: &Operation| keep.contains(op.name()), &rules)
    })
}

/// Dispatcher using the standard rules
///
/// Positional string arguments name operations to keep; `depth` bounds the
/// number of passes.
pub fn dispatcher() -> TransformDispatcher {
    let rules = DecompositionRules::standard();
    TransformDispatcher::new(NAME, move |tape: &QuantumScript, args: &TransformArgs| -> Result<TransformOutput> {
        let depth = args.get_usize("depth", DEFAULT_DEPTH)?;
        let keep: BTreeSet<&str> = args
            .positional()
            .iter()
            .filter_map(|a| match a {
                ArgValue::Str(name) => Some(name.as_str()),
                _ => None,
            })
            .collect();
        let new_tape = expand(tape, depth, &|op: &Operation| keep.contains(op.name()), &rules)?;
        Ok((vec![new_tape], single_tape_postprocessing()))
    })
}
