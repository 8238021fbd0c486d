//! Tape transforms for qflow
//!
//! This crate provides the rewrite layer between recorded tapes and devices:
//! - [`TransformDispatcher`]: a named rewrite applicable to tapes, nodes or
//!   quantum functions
//! - [`TransformProgram`]: a FIFO queue of deferred stages with reverse-order
//!   result reconstruction
//! - Built-in rewrites: [`batch_params`], [`convert_to_numpy`] and [`expand`]

pub mod batch_params;
pub mod convert_to_numpy;
pub mod error;
pub mod expand;
pub mod program;
pub mod transform;

pub use error::{Result, TransformError};
pub use expand::DecompositionRules;
pub use program::{apply_per_tape, BatchPostprocessing, StagePostprocessing, TransformProgram};
pub use transform::{
    default_node_postprocessing, single_tape_postprocessing, ArgValue, ExpandFn,
    NodePostprocessingFn, PostprocessingFn, Transform, TransformArgs, TransformDispatcher,
    TransformFn, TransformOutput, TransformRegistry, TransformTarget, TransformedFunction,
};
