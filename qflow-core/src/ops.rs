//! Constructors for commonly used operations and observables
//!
//! These only fix names, wire counts and eigenvalues; matrix definitions live
//! with whichever device executes them.

use crate::{HyperParam, Operation, QuantumError, Result, Tensor, Wire, Wires};

fn single(name: &str, wire: impl Into<Wire>, data: Vec<Tensor>) -> Result<Operation> {
    Operation::new(name, Wires::from_labels([wire.into()]), data)
}

/// X rotation
pub fn rx(theta: impl Into<Tensor>, wire: impl Into<Wire>) -> Result<Operation> {
    single("RX", wire, vec![theta.into()])
}

/// Y rotation
pub fn ry(theta: impl Into<Tensor>, wire: impl Into<Wire>) -> Result<Operation> {
    single("RY", wire, vec![theta.into()])
}

/// Z rotation
pub fn rz(theta: impl Into<Tensor>, wire: impl Into<Wire>) -> Result<Operation> {
    single("RZ", wire, vec![theta.into()])
}

/// General single-wire rotation `RZ(omega) RY(theta) RZ(phi)`
pub fn rot(
    phi: impl Into<Tensor>,
    theta: impl Into<Tensor>,
    omega: impl Into<Tensor>,
    wire: impl Into<Wire>,
) -> Result<Operation> {
    single("Rot", wire, vec![phi.into(), theta.into(), omega.into()])
}

pub fn hadamard(wire: impl Into<Wire>) -> Result<Operation> {
    Ok(single("Hadamard", wire, vec![])?.with_eigvals(vec![1.0, -1.0]))
}

pub fn pauli_x(wire: impl Into<Wire>) -> Result<Operation> {
    Ok(single("PauliX", wire, vec![])?.with_eigvals(vec![1.0, -1.0]))
}

pub fn pauli_y(wire: impl Into<Wire>) -> Result<Operation> {
    Ok(single("PauliY", wire, vec![])?.with_eigvals(vec![1.0, -1.0]))
}

pub fn pauli_z(wire: impl Into<Wire>) -> Result<Operation> {
    Ok(single("PauliZ", wire, vec![])?.with_eigvals(vec![1.0, -1.0]))
}

/// Controlled NOT
pub fn cnot(control: impl Into<Wire>, target: impl Into<Wire>) -> Result<Operation> {
    Operation::new(
        "CNOT",
        Wires::from_labels([control.into(), target.into()]),
        vec![],
    )
}

/// Hermitian observable given by an explicit matrix
pub fn hermitian(matrix: Tensor, wires: Wires) -> Result<Operation> {
    Operation::new("Hermitian", wires, vec![matrix])
}

/// Prepare a computational basis state
pub fn basis_state(state: Vec<f64>, wires: Wires) -> Result<Operation> {
    Ok(Operation::new("BasisState", wires, vec![Tensor::from_vec(state)])?.as_state_prep())
}

/// Prepare an arbitrary state vector
pub fn state_prep(state: Tensor, wires: Wires) -> Result<Operation> {
    Ok(Operation::new("StatePrep", wires, vec![state])?
        .with_hyperparameter("normalize", HyperParam::Bool(false))
        .as_state_prep())
}

/// Weighted sum of observables
///
/// The coefficients are the trainable data; the terms are kept as a
/// hyperparameter so the Hamiltonian is itself a leaf observable.
///
/// # Errors
/// Returns error if the number of coefficients and terms differ
pub fn hamiltonian(coeffs: Vec<f64>, observables: Vec<Operation>) -> Result<Operation> {
    if coeffs.len() != observables.len() {
        return Err(QuantumError::invalid_parameter_count(
            "Hamiltonian",
            observables.len(),
            coeffs.len(),
        ));
    }
    let wires = Wires::union(observables.iter().map(Operation::wires));
    let data = coeffs.into_iter().map(Tensor::scalar).collect();
    Ok(Operation::new("Hamiltonian", wires, data)?
        .with_hyperparameter("ops", HyperParam::Ops(observables)))
}
