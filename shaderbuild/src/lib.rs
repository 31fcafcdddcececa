//! Shader build orchestration around an external HLSL compiler
//!
//! This crate discovers shader sources, extracts their `#pragma` entry
//! points, rewrites sources where needed, and runs one compiler process per
//! entry point for the selected backend (DXIL, SPIR-V or Metal). Backends
//! that produce per-entry libraries are packed into one library afterwards.
//!
//! # Example
//!
//! ```no_run
//! use shaderbuild::{CompileTarget, Pipeline, PipelineOptions, SourceSet, TargetConfig};
//!
//! let target = CompileTarget::for_host(&TargetConfig::default());
//! let options = PipelineOptions::new(SourceSet::Directory("Shaders".into()), "Assets/Shaders");
//!
//! let report = Pipeline::new(&target, options).run().unwrap();
//! for failure in report.failures() {
//!     eprintln!("error: {failure}");
//! }
//! println!("compiled {} of {} entry points", report.succeeded(), report.jobs.len());
//! ```

mod backend;
mod compile;
mod config;
mod entry_points;
mod error;
mod flags;
mod include;
pub mod pack;
mod pipeline;
mod process;
pub mod rewrite;
mod target;

pub use backend::{Backend, CompileTarget, Environment, Platform, SDK_ROOT_VAR, SystemEnvironment};
pub use compile::{CommandBuilder, CompileJob, JobOutcome, JobReport, JobRunner};
pub use config::{PackConfig, SpirvConfig, TargetConfig};
pub use entry_points::EntryPointSet;
pub use error::{Error, Result};
pub use flags::StageMask;
pub use include::{FileSystemInclude, IncludeHandler};
pub use pack::PackStep;
pub use pipeline::{
    DEFAULT_EXTENSIONS, DEFAULT_LIBRARY_NAME, DEFAULT_OUTPUT_DIR, EntrySpec, Pipeline,
    PipelineOptions, RunReport, SourceSet,
};
pub use rewrite::{Rewrite, TempSource};
pub use target::{Profile, ShaderModel, Stage};
