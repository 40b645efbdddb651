//! Marginalia Config - Pure configuration data structures
//!
//! This crate contains only data structures, no logic or global state.
//! It serves as the shared configuration vocabulary across all Marginalia crates.

use std::path::PathBuf;

/// Configuration for module resolution and the compiled-artifact cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Roots searched for top-level modules, in order.
    /// Empty means "the current working directory".
    pub search_roots: Vec<PathBuf>,
    /// Whether compiled artifacts are read from and written to the cache
    pub use_cache: bool,
    /// Name of the cache directory created next to each source file
    pub cache_dir_name: String,
    /// Source file extension (without the dot)
    pub source_extension: String,
    /// Entry file that turns a directory into a package
    pub package_entry: String,
}

/// Configuration for execution limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitConfig {
    /// Maximum operand stack size of a single frame
    pub max_stack_size: usize,
    /// Maximum call depth before a `RecursionError` is raised
    pub max_recursion_depth: usize,
}

/// Pipeline phase, used for phase-specific log targets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Scanner,
    Rewriter,
    Parser,
    Compiler,
    Vm,
    Loader,
    Cache,
}

impl Phase {
    /// All phases, in pipeline order
    pub const ALL: [Phase; 7] = [
        Phase::Scanner,
        Phase::Rewriter,
        Phase::Parser,
        Phase::Compiler,
        Phase::Vm,
        Phase::Loader,
        Phase::Cache,
    ];

    /// Get the string name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Scanner => "scanner",
            Phase::Rewriter => "rewriter",
            Phase::Parser => "parser",
            Phase::Compiler => "compiler",
            Phase::Vm => "vm",
            Phase::Loader => "loader",
            Phase::Cache => "cache",
        }
    }

    /// Get the log target name for this phase
    pub fn target(&self) -> String {
        format!("marginalia::{}", self.as_str())
    }
}

impl LoaderConfig {
    /// Roots to search, falling back to the current directory
    pub fn effective_roots(&self) -> Vec<PathBuf> {
        if self.search_roots.is_empty() {
            vec![std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))]
        } else {
            self.search_roots.clone()
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            search_roots: Vec::new(),
            use_cache: true,
            cache_dir_name: "__mgcache__".to_string(),
            source_extension: "mg".to_string(),
            package_entry: "mod.mg".to_string(),
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_stack_size: 1024,
            max_recursion_depth: 200,
        }
    }
}
