//! Execution configuration
//!
//! Devices read this record to decide how a batch is executed and
//! differentiated. Callers build it once per evaluation; a device may fill in
//! unset fields through [`Device::setup_configuration`](crate::Device::setup_configuration).

use crate::error::{DeviceError, Result};
use qflow_core::{Interface, ReturnMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How derivatives of an execution are obtained
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientMethod {
    /// No method chosen; the device may pick one during setup
    #[default]
    None,
    /// Derivatives computed by the device itself
    Device,
    /// Backpropagation through the autodiff interface
    Backprop,
    ParameterShift,
    Adjoint,
    FiniteDiff,
}

impl GradientMethod {
    /// Short lowercase name
    pub fn name(self) -> &'static str {
        match self {
            GradientMethod::None => "none",
            GradientMethod::Device => "device",
            GradientMethod::Backprop => "backprop",
            GradientMethod::ParameterShift => "parameter-shift",
            GradientMethod::Adjoint => "adjoint",
            GradientMethod::FiniteDiff => "finite-diff",
        }
    }
}

impl fmt::Display for GradientMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Configuration for one circuit evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Gradient method requested by the caller
    ///
    /// Default: `GradientMethod::None`
    pub gradient_method: GradientMethod,

    /// Order of requested device derivatives
    ///
    /// Default: 1
    pub derivative_order: usize,

    /// Interface results should be reported in
    ///
    /// Default: `Interface::Numpy`
    pub interface: Interface,

    /// Convention used when stacking batched results
    ///
    /// Default: `ReturnMode::StructuredStack`
    pub return_mode: ReturnMode,

    /// Device-specific options passed through untouched
    pub device_options: BTreeMap<String, String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            gradient_method: GradientMethod::None,
            derivative_order: 1,
            interface: Interface::Numpy,
            return_mode: ReturnMode::StructuredStack,
            device_options: BTreeMap::new(),
        }
    }
}

impl ExecutionConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration asking the device for first order derivatives
    pub fn device_derivatives() -> Self {
        Self {
            gradient_method: GradientMethod::Device,
            ..Default::default()
        }
    }

    /// Configuration for backpropagation through `interface`
    pub fn backprop(interface: Interface) -> Self {
        Self {
            gradient_method: GradientMethod::Backprop,
            interface,
            ..Default::default()
        }
    }

    /// Configuration reproducing the squeezing result convention
    pub fn legacy() -> Self {
        Self {
            return_mode: ReturnMode::LegacySqueeze,
            ..Default::default()
        }
    }

    pub fn with_gradient_method(mut self, method: GradientMethod) -> Self {
        self.gradient_method = method;
        self
    }

    pub fn with_derivative_order(mut self, order: usize) -> Self {
        self.derivative_order = order;
        self
    }

    pub fn with_interface(mut self, interface: Interface) -> Self {
        self.interface = interface;
        self
    }

    pub fn with_return_mode(mut self, mode: ReturnMode) -> Self {
        self.return_mode = mode;
        self
    }

    /// Set a device-specific option
    pub fn with_device_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.device_options.insert(key.into(), value.into());
        self
    }

    /// Look up a device-specific option
    pub fn device_option(&self, key: &str) -> Option<&str> {
        self.device_options.get(key).map(String::as_str)
    }

    /// Whether derivatives are delegated to the device
    #[inline]
    pub fn uses_device_derivatives(&self) -> bool {
        self.gradient_method == GradientMethod::Device
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns error if the derivative order is zero, or if backpropagation is
    /// requested through the plain interface
    pub fn validate(&self) -> Result<()> {
        if self.derivative_order == 0 {
            return Err(DeviceError::invalid_configuration(
                "derivative_order must be at least 1",
            ));
        }

        if self.gradient_method == GradientMethod::Backprop && self.interface.is_plain() {
            return Err(DeviceError::invalid_configuration(
                "backprop requires an autodiff interface, got numpy",
            ));
        }

        Ok(())
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from a JSON string, filling missing fields with defaults
    ///
    /// # Errors
    /// Returns error if the input is not valid JSON or fails validation
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
