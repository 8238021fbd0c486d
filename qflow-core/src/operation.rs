//! Operations and observables

use crate::{Interface, QuantumError, Result, Tensor, Wires};
use std::collections::BTreeMap;
use std::fmt;

/// Non-trainable configuration value attached to an operation
#[derive(Clone, Debug, PartialEq)]
pub enum HyperParam {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Wires(Wires),
    List(Vec<HyperParam>),
    /// Operators held as configuration, e.g. the terms of a Hamiltonian
    Ops(Vec<Operation>),
}

/// An operation applied to specific wires
///
/// Operations are value-like: once built they are never mutated. Rewrites
/// that change parameters go through [`Operation::bind_new_parameters`],
/// which returns a new instance with the same wires and hyperparameters.
///
/// Leaf operations have an arithmetic depth of zero. Composite operators
/// (sums, products, ...) are built with [`Operation::composite`] and report
/// one more than their deepest operand.
///
/// # Example
/// ```
/// use qflow_core::{Operation, Tensor, Wires};
///
/// let op = Operation::new("RX", Wires::new([0]), vec![Tensor::scalar(0.5)]).unwrap();
/// assert_eq!(op.num_params(), 1);
/// assert_eq!(op.arithmetic_depth(), 0);
///
/// let moved = op.bind_new_parameters(vec![Tensor::scalar(0.7)]).unwrap();
/// assert_eq!(moved.wires(), op.wires());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    name: String,
    wires: Wires,
    data: Vec<Tensor>,
    hyperparameters: BTreeMap<String, HyperParam>,
    eigvals: Option<Vec<f64>>,
    inverse: Option<bool>,
    operands: Vec<Operation>,
    state_prep: bool,
}

impl Operation {
    /// Create a new leaf operation
    ///
    /// # Errors
    /// Returns error if a wire is repeated
    pub fn new(name: impl Into<String>, wires: Wires, data: Vec<Tensor>) -> Result<Self> {
        if let Some(dup) = wires.first_duplicate() {
            return Err(QuantumError::DuplicateWire(dup.to_string()));
        }

        Ok(Self {
            name: name.into(),
            wires,
            data,
            hyperparameters: BTreeMap::new(),
            eigvals: None,
            inverse: None,
            operands: Vec::new(),
            state_prep: false,
        })
    }

    /// Create an arithmetic composite of other operators
    ///
    /// The composite acts on the union of its operands' wires and its data is
    /// the concatenation of their data.
    pub fn composite(name: impl Into<String>, operands: Vec<Operation>) -> Self {
        let wires = Wires::union(operands.iter().map(|o| &o.wires));
        let data = operands.iter().flat_map(|o| o.data.iter().cloned()).collect();
        Self {
            name: name.into(),
            wires,
            data,
            hyperparameters: BTreeMap::new(),
            eigvals: None,
            inverse: None,
            operands,
            state_prep: false,
        }
    }

    /// Attach a hyperparameter
    #[must_use]
    pub fn with_hyperparameter(mut self, key: impl Into<String>, value: HyperParam) -> Self {
        self.hyperparameters.insert(key.into(), value);
        self
    }

    /// Attach eigenvalues (for observables)
    #[must_use]
    pub fn with_eigvals(mut self, eigvals: Vec<f64>) -> Self {
        self.eigvals = Some(eigvals);
        self
    }

    /// Set the legacy inverse flag
    #[must_use]
    pub fn with_inverse(mut self, inverse: bool) -> Self {
        self.inverse = Some(inverse);
        self
    }

    /// Mark this operation as a state preparation
    #[must_use]
    pub fn as_state_prep(mut self) -> Self {
        self.state_prep = true;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn wires(&self) -> &Wires {
        &self.wires
    }

    /// Parameter data in order
    #[inline]
    pub fn data(&self) -> &[Tensor] {
        &self.data
    }

    #[inline]
    pub fn num_params(&self) -> usize {
        self.data.len()
    }

    pub fn hyperparameters(&self) -> &BTreeMap<String, HyperParam> {
        &self.hyperparameters
    }

    pub fn eigvals(&self) -> Option<&[f64]> {
        self.eigvals.as_deref()
    }

    /// Legacy inverse flag, `false` when never set
    pub fn inverse(&self) -> bool {
        self.inverse.unwrap_or(false)
    }

    /// Operands of a composite operator
    pub fn operands(&self) -> &[Operation] {
        &self.operands
    }

    /// Nesting level from operator arithmetic, zero for leaf operators
    pub fn arithmetic_depth(&self) -> usize {
        self.operands
            .iter()
            .map(|o| o.arithmetic_depth() + 1)
            .max()
            .unwrap_or(0)
    }

    #[inline]
    pub fn is_state_prep(&self) -> bool {
        self.state_prep
    }

    /// Interface of the parameter data
    pub fn interface(&self) -> Interface {
        Interface::of(&self.data)
    }

    /// Whether every parameter is already in the plain interface
    pub fn has_plain_data(&self) -> bool {
        self.data.iter().all(|t| t.interface().is_plain())
    }

    /// Copy of this operation with `params` replacing its data
    ///
    /// For composites the new parameters are distributed over the operands in
    /// order.
    ///
    /// # Errors
    /// Returns error if `params` does not match the parameter count
    pub fn bind_new_parameters(&self, params: Vec<Tensor>) -> Result<Operation> {
        if params.len() != self.data.len() {
            return Err(QuantumError::invalid_parameter_count(
                &self.name,
                self.data.len(),
                params.len(),
            ));
        }

        let mut new_op = self.clone();
        if !self.operands.is_empty() {
            let mut rest = params.as_slice();
            let mut operands = Vec::with_capacity(self.operands.len());
            for operand in &self.operands {
                let (mine, tail) = rest.split_at(operand.num_params());
                operands.push(operand.bind_new_parameters(mine.to_vec())?);
                rest = tail;
            }
            new_op.operands = operands;
        }
        new_op.data = params;
        Ok(new_op)
    }

    /// Copy with every parameter unwrapped to the plain interface
    pub fn unwrapped(&self) -> Operation {
        let mut new_op = self.clone();
        new_op.data = self.data.iter().map(Tensor::unwrap).collect();
        new_op.operands = self.operands.iter().map(Operation::unwrapped).collect();
        new_op
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for p in &self.data {
            write!(f, "{}, ", p)?;
        }
        write!(f, "wires={})", self.wires)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rx(theta: f64, wire: usize) -> Operation {
        Operation::new("RX", Wires::new([wire]), vec![Tensor::scalar(theta)]).unwrap()
    }

    #[test]
    fn test_operation_creation() {
        let op = rx(0.5, 0);
        assert_eq!(op.name(), "RX");
        assert_eq!(op.num_params(), 1);
        assert_eq!(op.wires(), &Wires::new([0]));
        assert!(!op.inverse());
        assert!(!op.is_state_prep());
    }

    #[test]
    fn test_operation_duplicate_wires() {
        let result = Operation::new("CNOT", Wires::new([0, 0]), vec![]);
        assert!(matches!(result, Err(QuantumError::DuplicateWire(_))));
    }

    #[test]
    fn test_bind_new_parameters_keeps_structure() {
        let op = rx(0.5, 1).with_hyperparameter("basis", HyperParam::Str("X".into()));
        let bound = op.bind_new_parameters(vec![Tensor::scalar(1.5)]).unwrap();
        assert_eq!(bound.wires(), op.wires());
        assert_eq!(bound.hyperparameters(), op.hyperparameters());
        assert_eq!(bound.data()[0].as_scalar(), Some(1.5));
        assert_eq!(op.data()[0].as_scalar(), Some(0.5));
    }

    #[test]
    fn test_bind_new_parameters_wrong_count() {
        let op = rx(0.5, 0);
        let result = op.bind_new_parameters(vec![]);
        assert!(matches!(
            result,
            Err(QuantumError::InvalidParameterCount { expected: 1, actual: 0, .. })
        ));
    }

    #[test]
    fn test_composite_depth_and_binding() {
        let sum = Operation::composite("Sum", vec![rx(0.1, 0), rx(0.2, 1)]);
        assert_eq!(sum.arithmetic_depth(), 1);
        assert_eq!(sum.wires(), &Wires::new([0, 1]));
        assert_eq!(sum.num_params(), 2);

        let nested = Operation::composite("Prod", vec![sum.clone(), rx(0.3, 2)]);
        assert_eq!(nested.arithmetic_depth(), 2);

        let rebound = sum
            .bind_new_parameters(vec![Tensor::scalar(1.0), Tensor::scalar(2.0)])
            .unwrap();
        assert_eq!(rebound.operands()[1].data()[0].as_scalar(), Some(2.0));
    }

    #[test]
    fn test_unwrapped_strips_interface() {
        let op = Operation::new(
            "RY",
            Wires::new([0]),
            vec![Tensor::scalar(0.3).with_interface(Interface::Torch)],
        )
        .unwrap();
        assert!(!op.has_plain_data());
        assert_eq!(op.interface(), Interface::Torch);
        let plain = op.unwrapped();
        assert!(plain.has_plain_data());
    }

    #[test]
    fn test_operation_display() {
        let display = format!("{}", rx(0.5, 0));
        assert!(display.contains("RX"));
        assert!(display.contains("wires=[0]"));
    }
}
