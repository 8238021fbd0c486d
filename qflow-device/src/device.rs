//! The device execution contract

use crate::capabilities::DeviceCapabilities;
use crate::config::{ExecutionConfig, GradientMethod};
use crate::error::{DeviceError, Result};
use qflow_core::{QuantumScript, ResultBatch, ResultValue};
use qflow_transforms::BatchPostprocessing;

/// Results of a batch paired with their derivatives
pub type ResultsAndDerivatives = (ResultBatch, ResultBatch);

/// Trait for devices that execute batches of quantum scripts
///
/// Only [`name`](Device::name), [`capabilities`](Device::capabilities) and
/// [`execute`](Device::execute) are required. The derivative methods default
/// to [`DeviceError::NotImplemented`]; a device that overrides one of them
/// also overrides the matching `provides_*` method so that the capability
/// queries report it.
///
/// # Result shapes
///
/// For a batch of N scripts `execute` returns N results. A script with K > 1
/// measurements yields a [`ResultValue::Tuple`] of K entries; a script with a
/// single measurement yields that measurement's value directly.
///
/// # Example
///
/// ```
/// use qflow_core::{QuantumScript, ResultBatch, ResultValue};
/// use qflow_device::{Device, DeviceCapabilities, ExecutionConfig, Result};
///
/// struct Constant(DeviceCapabilities);
///
/// impl Device for Constant {
///     fn name(&self) -> &str {
///         "constant"
///     }
///
///     fn capabilities(&self) -> &DeviceCapabilities {
///         &self.0
///     }
///
///     fn execute(&self, circuits: &[QuantumScript], _: &ExecutionConfig) -> Result<ResultBatch> {
///         Ok(circuits.iter().map(|_| ResultValue::from(1.0)).collect())
///     }
/// }
///
/// let dev = Constant(DeviceCapabilities::permissive());
/// assert!(!dev.supports_derivatives(None, None));
/// ```
pub trait Device: Send + Sync {
    /// Get the device name
    fn name(&self) -> &str;

    /// Get device capabilities
    fn capabilities(&self) -> &DeviceCapabilities;

    /// Turn a batch into one the device can execute natively
    ///
    /// The default validates every script against
    /// [`capabilities`](Device::capabilities) and returns the batch unchanged
    /// with identity postprocessing.
    ///
    /// # Errors
    /// Returns error if a script cannot be brought into a supported form
    fn preprocess(
        &self,
        circuits: Vec<QuantumScript>,
        _config: &ExecutionConfig,
    ) -> Result<(Vec<QuantumScript>, BatchPostprocessing)> {
        let caps = self.capabilities();
        for circuit in &circuits {
            caps.validate_tape(circuit)?;
        }
        tracing::debug!(device = self.name(), tapes = circuits.len(), "validated batch");
        Ok((circuits, BatchPostprocessing::identity()))
    }

    /// Fill in configuration fields the caller left unset
    ///
    /// The default returns the configuration untouched.
    fn setup_configuration(&self, config: ExecutionConfig) -> Result<ExecutionConfig> {
        Ok(config)
    }

    /// Execute a batch of scripts
    ///
    /// # Arguments
    ///
    /// * `circuits` - Scripts with plain numeric parameters
    /// * `config` - Configuration for this execution
    ///
    /// # Returns
    ///
    /// One result per script, in batch order
    fn execute(&self, circuits: &[QuantumScript], config: &ExecutionConfig) -> Result<ResultBatch>;

    /// Jacobian of every script with respect to its trainable parameters
    ///
    /// A batch of length one still returns a batch of length one.
    fn compute_derivatives(
        &self,
        _circuits: &[QuantumScript],
        _config: &ExecutionConfig,
    ) -> Result<ResultBatch> {
        Err(DeviceError::not_implemented("compute_derivatives"))
    }

    /// Execute and differentiate in one call
    fn execute_and_compute_derivatives(
        &self,
        circuits: &[QuantumScript],
        config: &ExecutionConfig,
    ) -> Result<ResultsAndDerivatives> {
        let results = self.execute(circuits, config)?;
        let jacobians = self.compute_derivatives(circuits, config)?;
        Ok((results, jacobians))
    }

    /// Jacobian-vector product for forward mode
    ///
    /// `tangents` holds one vector per script, with one number per trainable
    /// parameter. A zero entry means that parameter's derivative is not needed.
    fn compute_jvp(
        &self,
        _circuits: &[QuantumScript],
        _tangents: &[Vec<f64>],
        _config: &ExecutionConfig,
    ) -> Result<ResultBatch> {
        Err(DeviceError::not_implemented("compute_jvp"))
    }

    fn execute_and_compute_jvp(
        &self,
        circuits: &[QuantumScript],
        tangents: &[Vec<f64>],
        config: &ExecutionConfig,
    ) -> Result<ResultsAndDerivatives> {
        let results = self.execute(circuits, config)?;
        let jvps = self.compute_jvp(circuits, tangents, config)?;
        Ok((results, jvps))
    }

    /// Vector-Jacobian product for reverse mode
    ///
    /// `cotangents` holds one value per script, shaped like that script's
    /// result. Each output has one entry per trainable parameter.
    fn compute_vjp(
        &self,
        _circuits: &[QuantumScript],
        _cotangents: &[ResultValue],
        _config: &ExecutionConfig,
    ) -> Result<ResultBatch> {
        Err(DeviceError::not_implemented("compute_vjp"))
    }

    fn execute_and_compute_vjp(
        &self,
        circuits: &[QuantumScript],
        cotangents: &[ResultValue],
        config: &ExecutionConfig,
    ) -> Result<ResultsAndDerivatives> {
        let results = self.execute(circuits, config)?;
        let vjps = self.compute_vjp(circuits, cotangents, config)?;
        Ok((results, vjps))
    }

    /// Whether [`compute_derivatives`](Device::compute_derivatives) is implemented
    fn provides_derivatives(&self) -> bool {
        false
    }

    /// Whether [`compute_jvp`](Device::compute_jvp) is implemented
    fn provides_jvp(&self) -> bool {
        false
    }

    /// Whether [`compute_vjp`](Device::compute_vjp) is implemented
    fn provides_vjp(&self) -> bool {
        false
    }

    /// Whether device derivatives are available
    ///
    /// Without a configuration this asks whether derivatives exist for any
    /// circuit. With one, the configuration must request
    /// [`GradientMethod::Device`] at first order. The default ignores
    /// `circuit`; devices whose support depends on the circuit override this.
    fn supports_derivatives(
        &self,
        config: Option<&ExecutionConfig>,
        _circuit: Option<&QuantumScript>,
    ) -> bool {
        if !self.provides_derivatives() {
            return false;
        }
        match config {
            None => true,
            Some(config) => {
                config.gradient_method == GradientMethod::Device && config.derivative_order == 1
            }
        }
    }

    /// Whether forward-mode products are available
    fn supports_jvp(&self, _config: Option<&ExecutionConfig>, _circuit: Option<&QuantumScript>) -> bool {
        self.provides_jvp()
    }

    /// Whether reverse-mode products are available
    fn supports_vjp(&self, _config: Option<&ExecutionConfig>, _circuit: Option<&QuantumScript>) -> bool {
        self.provides_vjp()
    }

    /// Get device description
    fn description(&self) -> String {
        match self.capabilities().max_wires {
            Some(n) => format!("{} - {} wires", self.name(), n),
            None => format!("{} - unbounded wires", self.name()),
        }
    }
}
