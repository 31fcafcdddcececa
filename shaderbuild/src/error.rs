//! Error types for shaderbuild operations

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that abort a build before or after the compile jobs run.
///
/// A compiler rejecting one shader is not an `Error`; it is recorded as a
/// [`JobOutcome`](crate::JobOutcome) in the run report so the remaining jobs
/// still run.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed invocation (wrong argument count, missing input selection)
    #[error("Usage error: {0}")]
    Usage(String),

    /// Discovery produced no shader sources
    #[error("No shaders found in {0}")]
    NoShadersFound(String),

    /// Stage keyword not in {vertex, fragment, compute}
    #[error("Unknown shader stage: {0}")]
    UnknownStage(String),

    /// Forced include requested but absent from every search directory
    #[error("Include file not found: {name} (searched {searched:?})")]
    IncludeNotFound {
        /// The requested include name
        name: String,
        /// Directories searched, in priority order
        searched: Vec<PathBuf>,
    },

    /// Output directory could not be created
    #[error("Failed to create output directory {path}: {source}")]
    OutputDirectory {
        /// The directory that could not be created
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Shader source could not be read
    #[error("Failed to read {path}: {source}")]
    ReadSource {
        /// The shader file
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// The packing tool failed; no final library was produced
    #[error("Packing {output} failed: {message}")]
    Pack {
        /// The library that was being produced
        output: PathBuf,
        /// Tool diagnostics or launch failure reason
        message: String,
    },

    /// Configuration file could not be parsed
    #[error("Invalid configuration in {path}: {source}")]
    Config {
        /// The configuration file
        path: PathBuf,
        /// The TOML parse error
        source: toml::de::Error,
    },

    /// Source text is not valid UTF-8 where text processing is needed
    #[error("UTF-8 encoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Other IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for shaderbuild operations
pub type Result<T> = std::result::Result<T, Error>;
