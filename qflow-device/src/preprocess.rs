//! Default device preprocessing
//!
//! Brings a batch into a form a device with a fixed operation set can run:
//! wires are checked, unsupported operations are expanded through
//! decomposition rules, measurements are checked against the device, and
//! parameters are converted to plain arrays.

use crate::capabilities::DeviceCapabilities;
use crate::config::ExecutionConfig;
use crate::error::{DeviceError, Result};
use qflow_core::{Operation, QuantumScript};
use qflow_transforms::convert_to_numpy::{self, convert_to_numpy_parameters};
use qflow_transforms::expand::{expand, DEFAULT_DEPTH};
use qflow_transforms::{apply_per_tape, single_tape_postprocessing, BatchPostprocessing, DecompositionRules};

/// Stage name under which expansion is recorded
pub const EXPAND_STAGE: &str = "device_expand";

/// Preprocessing shared by devices with a fixed native operation set
///
/// # Example
/// ```
/// use qflow_core::{ops, MeasurementProcess, QuantumScript};
/// use qflow_device::{DefaultPreprocessor, DeviceCapabilities, ExecutionConfig};
///
/// let preprocessor = DefaultPreprocessor::new(DeviceCapabilities::state_vector(1));
/// let tape = QuantumScript::new(
///     vec![ops::rot(0.1, 0.2, 0.3, 0usize).unwrap()],
///     vec![MeasurementProcess::expval(ops::pauli_z(0usize).unwrap())],
/// );
/// let (tapes, _) = preprocessor.preprocess(vec![tape], &ExecutionConfig::default()).unwrap();
/// assert_eq!(tapes[0].len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct DefaultPreprocessor {
    capabilities: DeviceCapabilities,
    rules: DecompositionRules,
    max_expansion: usize,
}

impl DefaultPreprocessor {
    /// Preprocessor using the standard decomposition rules
    pub fn new(capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            rules: DecompositionRules::standard(),
            max_expansion: DEFAULT_DEPTH,
        }
    }

    pub fn with_rules(mut self, rules: DecompositionRules) -> Self {
        self.rules = rules;
        self
    }

    /// Set the maximum number of expansion passes
    pub fn with_max_expansion(mut self, depth: usize) -> Self {
        self.max_expansion = depth;
        self
    }

    #[inline]
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Check that `tape` fits on the device's wires
    pub fn validate_wires(&self, tape: &QuantumScript) -> Result<()> {
        let Some(max) = self.capabilities.max_wires else {
            return Ok(());
        };
        let used = tape.wires().len();
        if used > max {
            return Err(DeviceError::unsupported(format!(
                "circuit uses {} wires, device supports max {}",
                used, max
            )));
        }
        Ok(())
    }

    /// Expand every operation the device does not execute natively
    ///
    /// # Errors
    /// Returns error if a decomposition fails or an operation is still
    /// unsupported once expansion stops
    pub fn expand_unsupported(&self, tape: &QuantumScript) -> Result<QuantumScript> {
        let expanded = self.expand_tape(tape)?;
        for op in expanded.all_operations() {
            if !self.capabilities.supports_operation(op.name()) {
                return Err(DeviceError::unsupported(format!(
                    "operation {} is not supported and has no decomposition",
                    op.name()
                )));
            }
        }
        Ok(expanded)
    }

    fn expand_tape(&self, tape: &QuantumScript) -> qflow_transforms::Result<QuantumScript> {
        let native = |op: &Operation| self.capabilities.supports_operation(op.name());
        if tape.all_operations().all(|op| native(op.as_ref())) {
            return Ok(tape.clone());
        }
        expand(tape, self.max_expansion, &native, &self.rules)
    }

    /// Check shot mode and every measurement against the device
    pub fn validate_measurements(&self, tape: &QuantumScript) -> Result<()> {
        let analytic = tape.shots().is_analytic();
        if analytic && !self.capabilities.supports_analytic {
            return Err(DeviceError::unsupported("device requires finite shots"));
        }
        if !analytic && !self.capabilities.supports_finite_shots {
            return Err(DeviceError::unsupported("device does not support finite shots"));
        }
        for m in tape.measurements() {
            self.capabilities.check_measurement(m, analytic)?;
        }
        Ok(())
    }

    /// Run the full preprocessing on a batch
    ///
    /// Records an expansion stage and a numpy-conversion stage, in that order.
    ///
    /// # Errors
    /// Returns the first violation found on any script
    pub fn preprocess(
        &self,
        circuits: Vec<QuantumScript>,
        _config: &ExecutionConfig,
    ) -> Result<(Vec<QuantumScript>, BatchPostprocessing)> {
        for tape in &circuits {
            tape.validate()?;
            self.validate_wires(tape)?;
        }

        let (expanded, expand_stage) = apply_per_tape(EXPAND_STAGE, &circuits, |tape| {
            Ok((vec![self.expand_tape(tape)?], single_tape_postprocessing()))
        })?;

        for tape in &expanded {
            for op in tape.all_operations() {
                self.capabilities.check_operation(op)?;
            }
            self.validate_measurements(tape)?;
        }

        let (converted, convert_stage) = apply_per_tape(convert_to_numpy::NAME, &expanded, |tape| {
            convert_to_numpy_parameters(tape)
        })?;

        tracing::debug!(
            tapes_in = circuits.len(),
            tapes_out = converted.len(),
            "device preprocessing"
        );

        let mut postprocessing = BatchPostprocessing::identity();
        postprocessing.push_stage(expand_stage);
        postprocessing.push_stage(convert_stage);
        Ok((converted, postprocessing))
    }
}
