//! API error types
//!
//! A single `LoadError` covers every way loading a module can fail, with a
//! structured report for the CLI.

use marginalia_core::{RuntimeError, Thrown, TransformError};
use marginalia_vfs::VfsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    /// No finder produced a spec for the name
    #[error("No module named '{name}'")]
    NotFound { name: String, searched: Vec<PathBuf> },

    /// The augmented program could not be built
    #[error("{0}")]
    Transform(#[from] TransformError),

    /// Executing the module body raised
    #[error("error in module '{module}': {error}")]
    Runtime { module: String, error: RuntimeError },

    /// Reading the source failed
    #[error("cannot read '{path}': {error}")]
    Io { path: PathBuf, error: VfsError },
}

impl LoadError {
    pub fn line(&self) -> Option<usize> {
        match self {
            LoadError::Transform(e) => e.line,
            LoadError::Runtime { error, .. } => error.line,
            _ => None,
        }
    }

    /// Module the error is attributed to, if known
    pub fn module(&self) -> Option<&str> {
        match self {
            LoadError::NotFound { name, .. } => Some(name),
            LoadError::Transform(e) => Some(&e.module),
            LoadError::Runtime { module, .. } => Some(module),
            LoadError::Io { .. } => None,
        }
    }

    pub fn phase(&self) -> &'static str {
        match self {
            LoadError::NotFound { .. } => "import",
            LoadError::Transform(_) => "transform",
            LoadError::Runtime { .. } => "runtime",
            LoadError::Io { .. } => "io",
        }
    }

    /// Structured report; see [`ErrorReport`]
    pub fn to_report(&self) -> ErrorReport {
        let (error_kind, message) = match self {
            LoadError::NotFound { name, .. } => {
                ("ImportError".to_string(), format!("No module named '{}'", name))
            }
            LoadError::Transform(e) => ("TransformError".to_string(), e.message.clone()),
            LoadError::Runtime { error, .. } => (error.kind.clone(), error.message.clone()),
            LoadError::Io { path, error } => {
                ("IoError".to_string(), format!("{}: {}", path.display(), error))
            }
        };
        ErrorReport {
            phase: self.phase(),
            module: self.module().map(str::to_string),
            line: self.line(),
            error_kind,
            message,
        }
    }

    /// The exception raised in a script whose `import` failed
    pub fn into_thrown(self) -> Thrown {
        match self {
            // The line belongs to the imported module; the importer's frame
            // records the line of its import statement instead.
            LoadError::Runtime { error, .. } => Thrown::new(&error.kind, error.message),
            LoadError::NotFound { name, .. } => {
                Thrown::new("ImportError", format!("No module named '{}'", name))
            }
            LoadError::Transform(e) => Thrown::new("TransformError", e.to_string()),
            LoadError::Io { path, error } => {
                Thrown::new("ImportError", format!("cannot read '{}': {}", path.display(), error))
            }
        }
    }
}

/// Structured error report
///
/// The CLI prints it; other front ends can format it as they need.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    /// import, transform, runtime or io
    pub phase: &'static str,
    pub module: Option<String>,
    /// 1-based line in the original source, if known
    pub line: Option<usize>,
    pub error_kind: String,
    pub message: String,
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.module, self.line) {
            (Some(module), Some(line)) => write!(
                f,
                "[{}:{}] {} error: {}: {}",
                module, line, self.phase, self.error_kind, self.message
            ),
            (Some(module), None) => write!(
                f,
                "[{}] {} error: {}: {}",
                module, self.phase, self.error_kind, self.message
            ),
            _ => write!(f, "{} error: {}: {}", self.phase, self.error_kind, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_report() {
        let err = LoadError::Runtime {
            module: "app".to_string(),
            error: RuntimeError {
                kind: "ZeroDivisionError".to_string(),
                message: "division by zero".to_string(),
                line: Some(3),
            },
        };
        assert_eq!(err.line(), Some(3));
        assert_eq!(
            err.to_report().to_string(),
            "[app:3] runtime error: ZeroDivisionError: division by zero"
        );
    }

    #[test]
    fn test_not_found_becomes_import_error() {
        let err = LoadError::NotFound {
            name: "missing".to_string(),
            searched: vec![],
        };
        assert_eq!(err.to_string(), "No module named 'missing'");
        let thrown = err.into_thrown();
        assert_eq!(thrown.kind(), "ImportError");
    }

    #[test]
    fn test_runtime_error_keeps_kind_when_rethrown() {
        let err = LoadError::Runtime {
            module: "dep".to_string(),
            error: RuntimeError {
                kind: "KeyError".to_string(),
                message: "'k'".to_string(),
                line: Some(7),
            },
        };
        let thrown = err.into_thrown();
        assert_eq!(thrown.kind(), "KeyError");
        assert_eq!(thrown.message(), "'k'");
        assert_eq!(thrown.line, None);
    }
}
