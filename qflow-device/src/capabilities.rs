//! Device capabilities and constraints

use crate::error::{DeviceError, Result};
use qflow_core::{MeasurementProcess, Operation, QuantumScript, ReturnType};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Every measurement return type
pub const ALL_RETURN_TYPES: [ReturnType; 10] = [
    ReturnType::Expectation,
    ReturnType::Variance,
    ReturnType::Probability,
    ReturnType::Sample,
    ReturnType::Counts,
    ReturnType::State,
    ReturnType::ClassicalShadow,
    ReturnType::ShadowExpval,
    ReturnType::VnEntropy,
    ReturnType::MutualInfo,
];

/// Set of operation or observable names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameSet {
    names: HashSet<String>,
}

impl NameSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations native to a state-vector simulator
    pub fn standard_operations() -> Self {
        [
            "Identity", "Hadamard", "PauliX", "PauliY", "PauliZ", "S", "T", "RX", "RY", "RZ",
            "PhaseShift", "CNOT", "CZ", "SWAP", "CRX", "CRY", "CRZ", "Toffoli", "BasisState",
            "StatePrep",
        ]
        .into_iter()
        .collect()
    }

    /// Observables a state-vector simulator can measure
    pub fn standard_observables() -> Self {
        [
            "Identity", "Hadamard", "PauliX", "PauliY", "PauliZ", "Hermitian", "Hamiltonian",
        ]
        .into_iter()
        .collect()
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for NameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// What a device can execute
///
/// `None` for an operation or observable set means any name is accepted.
///
/// # Example
/// ```
/// use qflow_core::{ops, MeasurementProcess, QuantumScript};
/// use qflow_device::DeviceCapabilities;
///
/// let caps = DeviceCapabilities::state_vector(2);
/// let tape = QuantumScript::new(
///     vec![ops::rot(0.1, 0.2, 0.3, 0usize).unwrap()],
///     vec![MeasurementProcess::expval(ops::pauli_z(0usize).unwrap())],
/// );
/// assert!(caps.validate_tape(&tape).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    /// Maximum number of wires (None = unlimited)
    pub max_wires: Option<usize>,

    /// Operations executed natively
    pub operations: Option<NameSet>,

    /// Observables measured natively
    pub observables: Option<NameSet>,

    /// Measurement return types the device produces
    pub return_types: HashSet<ReturnType>,

    /// Whether analytic (shot-free) execution is available
    pub supports_analytic: bool,

    /// Whether finite-shot execution is available
    pub supports_finite_shots: bool,

    /// Device-specific metadata
    pub metadata: HashMap<String, String>,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_wires: None,
            operations: None,
            observables: None,
            return_types: ALL_RETURN_TYPES.into_iter().collect(),
            supports_analytic: true,
            supports_finite_shots: true,
            metadata: HashMap::new(),
        }
    }
}

impl DeviceCapabilities {
    /// Capabilities accepting any circuit
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Capabilities of a state-vector simulator on `num_wires` wires
    pub fn state_vector(num_wires: usize) -> Self {
        Self {
            max_wires: Some(num_wires),
            operations: Some(NameSet::standard_operations()),
            observables: Some(NameSet::standard_observables()),
            ..Default::default()
        }
    }

    pub fn with_max_wires(mut self, max_wires: usize) -> Self {
        self.max_wires = Some(max_wires);
        self
    }

    pub fn with_operations<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.operations = Some(names.into_iter().collect());
        self
    }

    pub fn with_observables<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.observables = Some(names.into_iter().collect());
        self
    }

    pub fn with_return_types(mut self, types: impl IntoIterator<Item = ReturnType>) -> Self {
        self.return_types = types.into_iter().collect();
        self
    }

    /// Set which shot modes are available
    pub fn with_shot_modes(mut self, analytic: bool, finite: bool) -> Self {
        self.supports_analytic = analytic;
        self.supports_finite_shots = finite;
        self
    }

    #[inline]
    pub fn supports_operation(&self, name: &str) -> bool {
        self.operations.as_ref().map_or(true, |set| set.contains(name))
    }

    #[inline]
    pub fn supports_observable(&self, name: &str) -> bool {
        self.observables.as_ref().map_or(true, |set| set.contains(name))
    }

    #[inline]
    pub fn supports_return_type(&self, return_type: ReturnType) -> bool {
        self.return_types.contains(&return_type)
    }

    /// Check a single operation against the supported set
    pub fn check_operation(&self, op: &Operation) -> Result<()> {
        if self.supports_operation(op.name()) {
            Ok(())
        } else {
            Err(DeviceError::unsupported(format!(
                "operation {} is not supported",
                op.name()
            )))
        }
    }

    /// Check a single measurement against the supported sets
    pub fn check_measurement(&self, m: &MeasurementProcess, analytic: bool) -> Result<()> {
        let return_type = m.return_type();
        if !self.supports_return_type(return_type) {
            return Err(DeviceError::unsupported(format!(
                "measurement {} is not supported",
                return_type
            )));
        }
        if analytic && return_type.requires_shots() {
            return Err(DeviceError::unsupported(format!(
                "measurement {} requires finite shots",
                return_type
            )));
        }
        if let Some(obs) = m.obs() {
            if !self.supports_observable(obs.name()) {
                return Err(DeviceError::unsupported(format!(
                    "observable {} is not supported",
                    obs.name()
                )));
            }
        }
        Ok(())
    }

    /// Check that `tape` can run on the device
    ///
    /// # Errors
    /// Returns the first violation found, in this order: script validity,
    /// wire count, shot mode, operations, measurements
    pub fn validate_tape(&self, tape: &QuantumScript) -> Result<()> {
        tape.validate()?;

        if let Some(max) = self.max_wires {
            let used = tape.wires().len();
            if used > max {
                return Err(DeviceError::unsupported(format!(
                    "circuit uses {} wires, device supports max {}",
                    used, max
                )));
            }
        }

        let analytic = tape.shots().is_analytic();
        if analytic && !self.supports_analytic {
            return Err(DeviceError::unsupported("device requires finite shots"));
        }
        if !analytic && !self.supports_finite_shots {
            return Err(DeviceError::unsupported("device does not support finite shots"));
        }

        for op in tape.all_operations() {
            self.check_operation(op)?;
        }
        for m in tape.measurements() {
            self.check_measurement(m, analytic)?;
        }
        Ok(())
    }
}
