//! Structural equality of operations and measurements
//!
//! [`equal`] decides whether two operations or measurements describe the same
//! thing, tolerating small numeric differences in their parameters. Values of
//! different runtime variants are never equal; that check runs before any
//! variant-specific rule.

use crate::measurement::{Measurement, MeasurementKind};
use crate::{MeasurementProcess, Operation, QuantumError, Result};

/// Options controlling [`equal_with`]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EqualOptions {
    /// Require matching numeric interfaces per parameter
    pub check_interface: bool,
    /// Require matching trainability per parameter
    pub check_trainability: bool,
    /// Relative tolerance
    pub rtol: f64,
    /// Absolute tolerance
    pub atol: f64,
}

impl Default for EqualOptions {
    fn default() -> Self {
        Self {
            check_interface: true,
            check_trainability: true,
            rtol: 1e-5,
            atol: 1e-9,
        }
    }
}

impl EqualOptions {
    /// Options that only compare values
    pub fn values_only() -> Self {
        Self {
            check_interface: false,
            check_trainability: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tolerance(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }
}

/// Anything [`equal`] can compare
#[derive(Copy, Clone, Debug)]
pub enum Comparable<'a> {
    Operation(&'a Operation),
    Measurement(&'a MeasurementProcess),
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Variant {
    Operation,
    Measurement(MeasurementKind),
}

impl Comparable<'_> {
    fn variant(&self) -> Variant {
        match self {
            Comparable::Operation(_) => Variant::Operation,
            Comparable::Measurement(m) => Variant::Measurement(m.kind()),
        }
    }
}

impl<'a> From<&'a Operation> for Comparable<'a> {
    fn from(op: &'a Operation) -> Self {
        Comparable::Operation(op)
    }
}

impl<'a> From<&'a MeasurementProcess> for Comparable<'a> {
    fn from(m: &'a MeasurementProcess) -> Self {
        Comparable::Measurement(m)
    }
}

/// Compare with default options
///
/// # Errors
/// Returns [`QuantumError::NotImplemented`] when comparing operators built
/// from operator arithmetic
///
/// # Example
/// ```
/// use qflow_core::{equal, ops, MeasurementProcess};
///
/// let a = ops::rx(0.5, 0usize).unwrap();
/// let b = ops::rx(0.5 + 1e-12, 0usize).unwrap();
/// assert!(equal(&a, &b).unwrap());
///
/// let m = MeasurementProcess::probs(a.wires().clone());
/// assert!(!equal(&a, &m).unwrap());
/// ```
pub fn equal<'a, 'b>(a: impl Into<Comparable<'a>>, b: impl Into<Comparable<'b>>) -> Result<bool> {
    equal_with(a, b, &EqualOptions::default())
}

/// Compare two operations or measurements
///
/// # Errors
/// Returns [`QuantumError::NotImplemented`] when comparing operators built
/// from operator arithmetic
pub fn equal_with<'a, 'b>(
    a: impl Into<Comparable<'a>>,
    b: impl Into<Comparable<'b>>,
    options: &EqualOptions,
) -> Result<bool> {
    let (a, b) = (a.into(), b.into());
    if a.variant() != b.variant() {
        return Ok(false);
    }

    match (a, b) {
        (Comparable::Operation(a), Comparable::Operation(b)) => equal_operations(a, b, options),
        (Comparable::Measurement(a), Comparable::Measurement(b)) => equal_measurements(a, b),
        _ => Ok(false),
    }
}

fn equal_operations(a: &Operation, b: &Operation, options: &EqualOptions) -> Result<bool> {
    let depth = a.arithmetic_depth();
    if depth != b.arithmetic_depth() {
        return Ok(false);
    }
    if depth > 0 {
        return Err(QuantumError::not_implemented(format!(
            "comparison of operators with arithmetic depth {} ({} and {})",
            depth,
            a.name(),
            b.name()
        )));
    }

    if a.name() != b.name() || a.data().len() != b.data().len() {
        return Ok(false);
    }
    let params_close = a
        .data()
        .iter()
        .zip(b.data())
        .all(|(x, y)| x.allclose(y, options.rtol, options.atol));
    if !params_close {
        return Ok(false);
    }

    if a.wires() != b.wires() || a.hyperparameters() != b.hyperparameters() {
        return Ok(false);
    }

    if options.check_trainability
        && a.data()
            .iter()
            .zip(b.data())
            .any(|(x, y)| x.requires_grad() != y.requires_grad())
    {
        return Ok(false);
    }

    if options.check_interface
        && a.data()
            .iter()
            .zip(b.data())
            .any(|(x, y)| x.interface() != y.interface())
    {
        return Ok(false);
    }

    Ok(a.inverse() == b.inverse())
}

fn equal_base(a: &Measurement, b: &Measurement) -> Result<bool> {
    if a.return_type() != b.return_type() {
        return Ok(false);
    }

    let obs_equal = match (a.obs(), b.obs()) {
        (Some(x), Some(y)) => equal_operations(x, y, &EqualOptions::default())?,
        (None, None) => true,
        _ => false,
    };
    if !obs_equal || a.wires() != b.wires() {
        return Ok(false);
    }

    Ok(a.eigvals() == b.eigvals())
}

fn equal_measurements(a: &MeasurementProcess, b: &MeasurementProcess) -> Result<bool> {
    match (a, b) {
        (MeasurementProcess::Plain(x), MeasurementProcess::Plain(y)) => equal_base(x, y),
        (MeasurementProcess::VnEntropy(x), MeasurementProcess::VnEntropy(y)) => {
            Ok(equal_base(x.base(), y.base())? && x.log_base() == y.log_base())
        }
        (MeasurementProcess::MutualInfo(x), MeasurementProcess::MutualInfo(y)) => {
            Ok(equal_base(x.base(), y.base())? && x.log_base() == y.log_base())
        }
        (MeasurementProcess::ShadowExpval(x), MeasurementProcess::ShadowExpval(y)) => Ok(a
            .return_type()
            == b.return_type()
            && a.wires() == b.wires()
            && x.hamiltonian() == y.hamiltonian()
            && x.k() == y.k()),
        _ => Ok(false),
    }
}
