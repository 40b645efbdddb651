//! Native file system implementation

use crate::error::{VfsError, VfsResult};
use crate::VirtualFileSystem;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A native OS file system implementation.
///
/// Wraps `std::fs`. When a base directory is configured, relative paths are
/// resolved against it; absolute paths are used unchanged.
#[derive(Debug, Clone, Default)]
pub struct NativeFileSystem {
    base: Option<PathBuf>,
}

impl NativeFileSystem {
    /// Create a new native file system.
    pub fn new() -> Self {
        Self { base: None }
    }

    /// Create a native file system rooted at `base`.
    pub fn with_base(base: &Path) -> Self {
        Self {
            base: Some(base.to_path_buf()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

fn map_io(path: &Path, e: std::io::Error) -> VfsError {
    match e.kind() {
        ErrorKind::NotFound => VfsError::NotFound {
            path: path.display().to_string(),
        },
        ErrorKind::PermissionDenied => VfsError::PermissionDenied {
            path: path.display().to_string(),
        },
        _ => VfsError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        },
    }
}

impl VirtualFileSystem for NativeFileSystem {
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let full = self.resolve(path);
        std::fs::read(&full).map_err(|e| map_io(&full, e))
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> VfsResult<()> {
        let full = self.resolve(path);
        std::fs::write(&full, content).map_err(|e| map_io(&full, e))
    }

    fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        let from = self.resolve(from);
        std::fs::rename(&from, self.resolve(to)).map_err(|e| map_io(&from, e))
    }

    fn remove_file(&self, path: &Path) -> VfsResult<()> {
        let full = self.resolve(path);
        std::fs::remove_file(&full).map_err(|e| map_io(&full, e))
    }

    fn create_dir_all(&self, path: &Path) -> VfsResult<()> {
        let full = self.resolve(path);
        std::fs::create_dir_all(&full).map_err(|e| map_io(&full, e))
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        self.resolve(path).is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.resolve(path).is_dir()
    }
}
