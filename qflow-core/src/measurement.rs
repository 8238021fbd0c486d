//! Terminal measurements
//!
//! [`MeasurementProcess`] is a closed union. Most measurements are
//! [`Measurement`]s distinguished only by their [`ReturnType`]; the entropy,
//! mutual-information and shadow-expectation measurements carry extra fields
//! and are separate variants so that comparisons can tell them apart.

use crate::{Operation, Tensor, Wires};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a measurement returns
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnType {
    Expectation,
    Variance,
    Probability,
    Sample,
    Counts,
    State,
    ClassicalShadow,
    ShadowExpval,
    VnEntropy,
    MutualInfo,
}

impl ReturnType {
    /// Whether the measurement can only be estimated from finite shots
    pub fn requires_shots(self) -> bool {
        matches!(
            self,
            ReturnType::Sample | ReturnType::Counts | ReturnType::ClassicalShadow | ReturnType::ShadowExpval
        )
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReturnType::Expectation => "expval",
            ReturnType::Variance => "var",
            ReturnType::Probability => "probs",
            ReturnType::Sample => "sample",
            ReturnType::Counts => "counts",
            ReturnType::State => "state",
            ReturnType::ClassicalShadow => "classical_shadow",
            ReturnType::ShadowExpval => "shadow_expval",
            ReturnType::VnEntropy => "vnentropy",
            ReturnType::MutualInfo => "mutualinfo",
        };
        write!(f, "{}", name)
    }
}

/// A measurement described by its return type and optional observable
#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
    return_type: ReturnType,
    obs: Option<Operation>,
    wires: Wires,
    eigvals: Option<Vec<f64>>,
}

impl Measurement {
    /// Measurement of an observable
    pub fn of_observable(return_type: ReturnType, obs: Operation) -> Self {
        Self {
            return_type,
            wires: obs.wires().clone(),
            obs: Some(obs),
            eigvals: None,
        }
    }

    /// Measurement in the computational basis of `wires`
    pub fn on_wires(return_type: ReturnType, wires: Wires) -> Self {
        Self {
            return_type,
            obs: None,
            wires,
            eigvals: None,
        }
    }

    /// Override the eigenvalues associated with each basis state
    #[must_use]
    pub fn with_eigvals(mut self, eigvals: Vec<f64>) -> Self {
        self.eigvals = Some(eigvals);
        self
    }

    #[inline]
    pub fn return_type(&self) -> ReturnType {
        self.return_type
    }

    #[inline]
    pub fn obs(&self) -> Option<&Operation> {
        self.obs.as_ref()
    }

    #[inline]
    pub fn wires(&self) -> &Wires {
        &self.wires
    }

    /// Per-basis-state eigenvalues, explicit or taken from the observable
    pub fn eigvals(&self) -> Option<&[f64]> {
        self.eigvals
            .as_deref()
            .or_else(|| self.obs.as_ref().and_then(|o| o.eigvals()))
    }

    fn unwrapped(&self) -> Self {
        Self {
            obs: self.obs.as_ref().map(Operation::unwrapped),
            ..self.clone()
        }
    }
}

/// Von Neumann entropy of the reduced state on some wires
#[derive(Clone, Debug, PartialEq)]
pub struct EntropyMeasurement {
    base: Measurement,
    log_base: Option<f64>,
}

impl EntropyMeasurement {
    #[inline]
    pub fn base(&self) -> &Measurement {
        &self.base
    }

    #[inline]
    pub fn log_base(&self) -> Option<f64> {
        self.log_base
    }
}

/// Mutual information between two groups of wires
#[derive(Clone, Debug, PartialEq)]
pub struct MutualInfoMeasurement {
    base: Measurement,
    groups: (Wires, Wires),
    log_base: Option<f64>,
}

impl MutualInfoMeasurement {
    #[inline]
    pub fn base(&self) -> &Measurement {
        &self.base
    }

    #[inline]
    pub fn groups(&self) -> (&Wires, &Wires) {
        (&self.groups.0, &self.groups.1)
    }

    #[inline]
    pub fn log_base(&self) -> Option<f64> {
        self.log_base
    }
}

/// Expectation value of a Hamiltonian estimated from a classical shadow
#[derive(Clone, Debug, PartialEq)]
pub struct ShadowExpvalMeasurement {
    hamiltonian: Operation,
    k: usize,
}

impl ShadowExpvalMeasurement {
    #[inline]
    pub fn hamiltonian(&self) -> &Operation {
        &self.hamiltonian
    }

    /// Number of equal parts the snapshots are split into for median-of-means
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }
}

/// Runtime variant of a measurement
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MeasurementKind {
    Plain,
    VnEntropy,
    MutualInfo,
    ShadowExpval,
}

/// A terminal measurement of a quantum script
#[derive(Clone, Debug, PartialEq)]
pub enum MeasurementProcess {
    Plain(Measurement),
    VnEntropy(EntropyMeasurement),
    MutualInfo(MutualInfoMeasurement),
    ShadowExpval(ShadowExpvalMeasurement),
}

impl MeasurementProcess {
    /// Expectation value of an observable
    pub fn expval(obs: Operation) -> Self {
        Self::Plain(Measurement::of_observable(ReturnType::Expectation, obs))
    }

    /// Variance of an observable
    pub fn var(obs: Operation) -> Self {
        Self::Plain(Measurement::of_observable(ReturnType::Variance, obs))
    }

    /// Computational basis probabilities
    pub fn probs(wires: Wires) -> Self {
        Self::Plain(Measurement::on_wires(ReturnType::Probability, wires))
    }

    /// Probabilities in the eigenbasis of an observable
    pub fn probs_of(obs: Operation) -> Self {
        Self::Plain(Measurement::of_observable(ReturnType::Probability, obs))
    }

    /// Raw samples of an observable
    pub fn sample(obs: Operation) -> Self {
        Self::Plain(Measurement::of_observable(ReturnType::Sample, obs))
    }

    /// Raw computational basis samples
    pub fn sample_wires(wires: Wires) -> Self {
        Self::Plain(Measurement::on_wires(ReturnType::Sample, wires))
    }

    /// Outcome counts in the computational basis
    pub fn counts(wires: Wires) -> Self {
        Self::Plain(Measurement::on_wires(ReturnType::Counts, wires))
    }

    /// Full state vector
    pub fn state() -> Self {
        Self::Plain(Measurement::on_wires(ReturnType::State, Wires::empty()))
    }

    /// Classical shadow snapshots
    pub fn classical_shadow(wires: Wires) -> Self {
        Self::Plain(Measurement::on_wires(ReturnType::ClassicalShadow, wires))
    }

    /// Von Neumann entropy
    pub fn vn_entropy(wires: Wires, log_base: Option<f64>) -> Self {
        Self::VnEntropy(EntropyMeasurement {
            base: Measurement::on_wires(ReturnType::VnEntropy, wires),
            log_base,
        })
    }

    /// Mutual information between two wire groups
    pub fn mutual_info(wires0: Wires, wires1: Wires, log_base: Option<f64>) -> Self {
        let all = Wires::union([&wires0, &wires1]);
        Self::MutualInfo(MutualInfoMeasurement {
            base: Measurement::on_wires(ReturnType::MutualInfo, all),
            groups: (wires0, wires1),
            log_base,
        })
    }

    /// Shadow-estimated expectation value of a Hamiltonian
    pub fn shadow_expval(hamiltonian: Operation, k: usize) -> Self {
        Self::ShadowExpval(ShadowExpvalMeasurement { hamiltonian, k })
    }

    pub fn kind(&self) -> MeasurementKind {
        match self {
            Self::Plain(_) => MeasurementKind::Plain,
            Self::VnEntropy(_) => MeasurementKind::VnEntropy,
            Self::MutualInfo(_) => MeasurementKind::MutualInfo,
            Self::ShadowExpval(_) => MeasurementKind::ShadowExpval,
        }
    }

    pub fn return_type(&self) -> ReturnType {
        match self {
            Self::Plain(m) => m.return_type(),
            Self::VnEntropy(m) => m.base.return_type(),
            Self::MutualInfo(m) => m.base.return_type(),
            Self::ShadowExpval(_) => ReturnType::ShadowExpval,
        }
    }

    pub fn wires(&self) -> &Wires {
        match self {
            Self::Plain(m) => m.wires(),
            Self::VnEntropy(m) => m.base.wires(),
            Self::MutualInfo(m) => m.base.wires(),
            Self::ShadowExpval(m) => m.hamiltonian.wires(),
        }
    }

    /// Observable, if the measurement has one
    pub fn obs(&self) -> Option<&Operation> {
        match self {
            Self::Plain(m) => m.obs(),
            Self::VnEntropy(m) => m.base.obs(),
            Self::MutualInfo(m) => m.base.obs(),
            Self::ShadowExpval(_) => None,
        }
    }

    /// Operator whose data parameterizes this measurement
    pub fn parameterized_operator(&self) -> Option<&Operation> {
        match self {
            Self::ShadowExpval(m) => Some(&m.hamiltonian),
            _ => self.obs(),
        }
    }

    /// Parameter data of the observable (or Hamiltonian)
    pub fn data(&self) -> &[Tensor] {
        self.parameterized_operator().map(Operation::data).unwrap_or(&[])
    }

    /// Whether every observable parameter is already plain
    pub fn has_plain_data(&self) -> bool {
        self.parameterized_operator()
            .map_or(true, Operation::has_plain_data)
    }

    /// Copy with observable data unwrapped to the plain interface
    pub fn unwrapped(&self) -> Self {
        match self {
            Self::Plain(m) => Self::Plain(m.unwrapped()),
            Self::VnEntropy(m) => Self::VnEntropy(EntropyMeasurement {
                base: m.base.unwrapped(),
                log_base: m.log_base,
            }),
            Self::MutualInfo(m) => Self::MutualInfo(MutualInfoMeasurement {
                base: m.base.unwrapped(),
                groups: m.groups.clone(),
                log_base: m.log_base,
            }),
            Self::ShadowExpval(m) => Self::ShadowExpval(ShadowExpvalMeasurement {
                hamiltonian: m.hamiltonian.unwrapped(),
                k: m.k,
            }),
        }
    }
}

impl fmt::Display for MeasurementProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.obs() {
            Some(obs) => write!(f, "{}({})", self.return_type(), obs),
            None => write!(f, "{}(wires={})", self.return_type(), self.wires()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ops, Interface};

    #[test]
    fn test_expval_uses_observable_wires_and_eigvals() {
        let m = MeasurementProcess::expval(ops::pauli_z(1usize).unwrap());
        assert_eq!(m.return_type(), ReturnType::Expectation);
        assert_eq!(m.wires(), &Wires::new([1]));
        match &m {
            MeasurementProcess::Plain(inner) => {
                assert_eq!(inner.eigvals(), Some(&[1.0, -1.0][..]));
            }
            _ => panic!("expected plain measurement"),
        }
    }

    #[test]
    fn test_kinds() {
        assert_eq!(MeasurementProcess::state().kind(), MeasurementKind::Plain);
        assert_eq!(
            MeasurementProcess::vn_entropy(Wires::new([0]), None).kind(),
            MeasurementKind::VnEntropy
        );
        let mi = MeasurementProcess::mutual_info(Wires::new([0]), Wires::new([1]), Some(2.0));
        assert_eq!(mi.kind(), MeasurementKind::MutualInfo);
        assert_eq!(mi.wires(), &Wires::new([0, 1]));
    }

    #[test]
    fn test_shadow_expval_parameters() {
        let h = ops::hermitian(
            Tensor::from_vec(vec![1.0, 0.0]).with_interface(Interface::Jax),
            Wires::new([0]),
        )
        .unwrap();
        let m = MeasurementProcess::shadow_expval(h, 3);
        assert_eq!(m.data().len(), 1);
        assert!(!m.has_plain_data());
        assert!(m.unwrapped().has_plain_data());
        assert!(m.return_type().requires_shots());
    }

    #[test]
    fn test_display() {
        let m = MeasurementProcess::probs(Wires::new([0, 1]));
        assert_eq!(format!("{}", m), "probs(wires=[0, 1])");
    }
}
