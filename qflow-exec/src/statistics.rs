//! Execution statistics tracking

use std::fmt;
use std::time::Duration;

/// Statistics for one pass through the evaluation pipeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionStatistics {
    /// Total time from configuration to reconstructed results
    pub total_time: Duration,

    /// Time spent in the user transform program
    pub transform_time: Duration,

    /// Time spent in device preprocessing and parameter conversion
    pub preprocessing_time: Duration,

    /// Time spent inside the device
    pub execution_time: Duration,

    /// Time spent rebuilding results
    pub postprocessing_time: Duration,

    /// Number of scripts handed to the pipeline
    pub tapes_submitted: usize,

    /// Number of scripts the device executed
    pub tapes_executed: usize,

    /// Number of postprocessing stages undone
    pub stages: usize,

    /// Whether derivatives were computed alongside the results
    pub computed_derivatives: bool,
}

impl ExecutionStatistics {
    /// Create a new statistics object
    pub fn new() -> Self {
        Self::default()
    }

    /// Executed scripts per submitted script
    ///
    /// Values above one mean the pipeline split scripts, e.g. by batching.
    pub fn expansion_ratio(&self) -> f64 {
        if self.tapes_submitted == 0 {
            0.0
        } else {
            self.tapes_executed as f64 / self.tapes_submitted as f64
        }
    }

    /// Share of total time spent outside the device, as a percentage
    pub fn overhead_percent(&self) -> f64 {
        let total_secs = self.total_time.as_secs_f64();
        if total_secs == 0.0 {
            0.0
        } else {
            100.0 * (total_secs - self.execution_time.as_secs_f64()).max(0.0) / total_secs
        }
    }
}

impl fmt::Display for ExecutionStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Execution Statistics:")?;
        writeln!(f, "  Total time: {:?} ({:.1}% overhead)", self.total_time, self.overhead_percent())?;
        writeln!(f, "    Transforms: {:?}", self.transform_time)?;
        writeln!(f, "    Preprocessing: {:?}", self.preprocessing_time)?;
        writeln!(f, "    Device: {:?}", self.execution_time)?;
        writeln!(f, "    Postprocessing: {:?}", self.postprocessing_time)?;

        writeln!(f, "\n  Tapes:")?;
        writeln!(f, "    Submitted: {}", self.tapes_submitted)?;
        writeln!(f, "    Executed: {} ({:.1}x)", self.tapes_executed, self.expansion_ratio())?;
        writeln!(f, "    Stages undone: {}", self.stages)?;
        writeln!(f, "    Derivatives: {}", if self.computed_derivatives { "yes" } else { "no" })?;

        Ok(())
    }
}
