//! Device abstraction for qflow
//!
//! This crate defines the boundary between transform programs and whatever
//! executes circuits:
//! - [`Device`]: the execution and derivative contract
//! - [`DeviceCapabilities`]: what a device accepts, checked before execution
//! - [`ExecutionConfig`]: per-evaluation gradient method, interface and
//!   result convention
//! - [`DefaultPreprocessor`]: expansion and validation for devices with a
//!   fixed native operation set
//!
//! # Architecture
//!
//! Devices receive batches of scripts whose parameters are plain arrays and
//! return one result per script. Anything a device needs to rewrite first is
//! done in [`Device::preprocess`], which returns the rewritten batch together
//! with the postprocessing that undoes it.

pub mod capabilities;
pub mod config;
pub mod device;
pub mod error;
pub mod preprocess;

pub use capabilities::{DeviceCapabilities, NameSet, ALL_RETURN_TYPES};
pub use config::{ExecutionConfig, GradientMethod};
pub use device::{Device, ResultsAndDerivatives};
pub use error::{DeviceError, Result};
pub use preprocess::DefaultPreprocessor;
