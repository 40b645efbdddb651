//! Errors from reading module sources and writing cached artifacts

use std::fmt;

pub type VfsResult<T> = Result<T, VfsError>;

#[derive(Debug, Clone, PartialEq)]
pub enum VfsError {
    /// Nothing stored at `path`
    NotFound { path: String },

    /// A write was refused because the file system is read-only
    ReadOnly { path: String },

    /// The operating system denied access
    PermissionDenied { path: String },

    /// A source file whose bytes stop being UTF-8 at `valid_up_to`
    NotUtf8 { path: String, valid_up_to: usize },

    /// An artifact path with no file name component
    NoFileName { path: String },

    /// Any other operating system failure
    Io { path: String, message: String },

    /// A writer panicked while holding the in-memory store
    Poisoned,
}

impl VfsError {
    /// Path the failed operation touched, if any
    pub fn path(&self) -> Option<&str> {
        match self {
            VfsError::NotFound { path }
            | VfsError::ReadOnly { path }
            | VfsError::PermissionDenied { path }
            | VfsError::NotUtf8 { path, .. }
            | VfsError::NoFileName { path }
            | VfsError::Io { path, .. } => Some(path),
            VfsError::Poisoned => None,
        }
    }
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VfsError::NotFound { path } => write!(f, "no such file: {}", path),
            VfsError::ReadOnly { path } => {
                write!(f, "cannot write '{}': file system is read-only", path)
            }
            VfsError::PermissionDenied { path } => write!(f, "permission denied: {}", path),
            VfsError::NotUtf8 { path, valid_up_to } => write!(
                f,
                "'{}' is not UTF-8 text (invalid byte at offset {})",
                path, valid_up_to
            ),
            VfsError::NoFileName { path } => write!(f, "'{}' has no file name", path),
            VfsError::Io { path, message } => write!(f, "{}: {}", path, message),
            VfsError::Poisoned => write!(f, "in-memory file store poisoned"),
        }
    }
}

impl std::error::Error for VfsError {}
