//! API types
//!
//! Outputs of the pipeline entry points.

use marginalia_core::{Program, Transformation};
use std::path::PathBuf;

/// Result of compiling one module
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub program: Program,
    /// The program came from a valid cache artifact
    pub from_cache: bool,
    /// Where the artifact lives (or would live); `None` with caching off
    pub artifact: Option<PathBuf>,
}

/// Result of expanding a source file
#[derive(Debug, Clone)]
pub struct ExpandOutput {
    pub module: String,
    pub transformation: Transformation,
}

/// Result of running an entry module
#[derive(Debug, Clone)]
pub struct ExecuteOutput {
    pub module: String,
    /// Every module in the loaded table after the run, sorted
    pub modules_loaded: Vec<String>,
    /// Captured `print` output, when capture was requested
    pub stdout: Vec<String>,
}
