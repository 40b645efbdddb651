//! Commentary transform
//!
//! `transform(module, source, severities)` is a pure source-to-source
//! function: marker comments become `emit` calls and functions holding
//! markers gain an instrumentation decorator. The result still has to be
//! compiled; see [`crate::compile_source`].

mod rewriter;
mod scanner;

pub use rewriter::{ContextFrame, FrameKind, Rewriter};
pub use scanner::{placeholder, scan, CommentMarker, Scanned};

use marginalia_log::SeverityTable;
use thiserror::Error;

/// Version of the rewrite rules; part of every cache key
pub const TRANSFORM_VERSION: u16 = 1;

/// Output of one rewrite pass
#[derive(Debug, Clone)]
pub struct Transformation {
    /// Augmented source, line-aligned with the input
    pub source: String,
    pub markers: Vec<CommentMarker>,
    /// Context paths of the functions that received instrumentation
    pub instrumented: Vec<String>,
    /// Name the runtime module is bound to in the augmented source
    pub alias: String,
}

/// The augmented program of a module could not be built
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", display_transform_error(.module, .line, .message))]
pub struct TransformError {
    pub module: String,
    pub line: Option<usize>,
    pub message: String,
}

fn display_transform_error(module: &str, line: &Option<usize>, message: &str) -> String {
    match line {
        Some(line) => format!("cannot transform module '{module}' (line {line}): {message}"),
        None => format!("cannot transform module '{module}': {message}"),
    }
}

/// Rewrite `source` of module `module_name` with a fresh marker token
pub fn transform(
    module_name: &str,
    source: &str,
    severities: &SeverityTable,
) -> Result<Transformation, TransformError> {
    Rewriter::new(module_name, severities).rewrite(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_per_rewrite() {
        let table = SeverityTable::default();
        let a = transform("m", "pass;\n", &table).unwrap();
        let b = transform("m", "pass;\n", &table).unwrap();
        assert_ne!(a.alias, b.alias);
        assert!(a.source.starts_with(&format!("import marginalia as {}; ", a.alias)));
    }

    #[test]
    fn test_error_display() {
        let err = TransformError {
            module: "pkg.mod".to_string(),
            line: Some(4),
            message: "Unexpected token".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "cannot transform module 'pkg.mod' (line 4): Unexpected token"
        );
    }

    #[test]
    fn test_syntax_error_reports_original_line() {
        let table = SeverityTable::default();
        let err = transform("m", "fn f() {\n  //: ok\n  var = 1;\n}\n", &table).unwrap_err();
        assert_eq!(err.line, Some(3));
    }
}
