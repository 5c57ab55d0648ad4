//! Toolchain Driver: detects external LLVM tools,
//! invokes `opt`/`llc`/`clang`/`llvm-cov`/`llvm-profdata`, and composes
//! IR-to-object/executable pipelines.
//!
//! # Modules
//!
//! - [`options`] -- pipeline configuration (`OptLevel`, `TargetArch`, ...)
//! - [`tool_cache`] -- process-wide, lazily-resolved tool paths
//! - [`process`] -- blocking subprocess invocation
//! - [`pipeline`] -- `compile_pipeline`, the single entry point
//! - [`coverage`] -- `.profraw` merge, `llvm-cov` reports, summary parsing
//! - [`stats`] -- atomic invocation counters
//! - [`error`] -- `DriverError`

pub mod coverage;
pub mod error;
pub mod options;
pub mod pipeline;
pub mod process;
pub mod stats;
pub mod tool_cache;

pub use error::DriverError;
pub use options::{OptLevel, OutputFormat, PieMode, PipelineOptions, TargetArch};
pub use pipeline::{compile_pipeline, PipelineResult};
pub use process::ToolResult;
