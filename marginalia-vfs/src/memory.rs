//! In-memory file system implementation

use crate::error::{VfsError, VfsResult};
use crate::VirtualFileSystem;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// An in-memory file system implementation.
///
/// Files live in a `BTreeMap`; directories are either created explicitly or
/// implied by the files beneath them. A read-only switch makes every mutating
/// call fail with `ReadOnly`, which is how tests simulate an
/// unwritable source tree.
///
/// # Example
/// ```
/// use marginalia_vfs::{MemoryFileSystem, VirtualFileSystem};
/// use std::path::Path;
///
/// let fs = MemoryFileSystem::new();
/// fs.write_file(Path::new("/test.mg"), b"pass;").unwrap();
/// let content = fs.read_file(Path::new("/test.mg")).unwrap();
/// assert_eq!(content, b"pass;");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    dirs: Arc<RwLock<BTreeSet<String>>>,
    read_only: Arc<AtomicBool>,
}

fn poisoned<T>(_: T) -> VfsError {
    VfsError::Poisoned
}

impl MemoryFileSystem {
    /// Create a new empty memory file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new memory file system pre-populated with files.
    pub fn with_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: AsRef<str>,
    {
        let fs = Self::new();
        if let Ok(mut map) = fs.files.write() {
            for (path, content) in files {
                map.insert(normalize(Path::new(path.as_ref())), content);
            }
        }
        fs
    }

    /// Toggle read-only mode.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Number of files currently stored.
    pub fn file_count(&self) -> usize {
        self.files.read().map(|f| f.len()).unwrap_or(0)
    }

    /// All stored file paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.files
            .read()
            .map(|f| f.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn check_writable(&self, path: &str) -> VfsResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(VfsError::ReadOnly {
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

/// Normalize a path for internal storage: forward slashes, no trailing slash.
fn normalize(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    if s.len() > 1 {
        s.trim_end_matches('/').to_string()
    } else {
        s
    }
}

impl VirtualFileSystem for MemoryFileSystem {
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let normalized = normalize(path);
        let files = self.files.read().map_err(poisoned)?;
        files
            .get(&normalized)
            .cloned()
            .ok_or(VfsError::NotFound { path: normalized })
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> VfsResult<()> {
        let normalized = normalize(path);
        self.check_writable(&normalized)?;
        let mut files = self.files.write().map_err(poisoned)?;
        files.insert(normalized, content.to_vec());
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        let from = normalize(from);
        self.check_writable(&from)?;
        let mut files = self.files.write().map_err(poisoned)?;
        let content = files
            .remove(&from)
            .ok_or_else(|| VfsError::NotFound { path: from.clone() })?;
        files.insert(normalize(to), content);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> VfsResult<()> {
        let normalized = normalize(path);
        self.check_writable(&normalized)?;
        let mut files = self.files.write().map_err(poisoned)?;
        files
            .remove(&normalized)
            .map(|_| ())
            .ok_or(VfsError::NotFound { path: normalized })
    }

    fn create_dir_all(&self, path: &Path) -> VfsResult<()> {
        let normalized = normalize(path);
        self.check_writable(&normalized)?;
        let mut dirs = self.dirs.write().map_err(poisoned)?;
        dirs.insert(normalized);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        let normalized = normalize(path);
        self.files
            .read()
            .map(|f| f.contains_key(&normalized))
            .unwrap_or(false)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let normalized = normalize(path);
        let explicit = self
            .dirs
            .read()
            .map(|d| {
                let prefix = format!("{}/", normalized);
                d.iter().any(|dir| *dir == normalized || dir.starts_with(&prefix))
            })
            .unwrap_or(false);
        if explicit {
            return true;
        }
        let prefix = if normalized.ends_with('/') {
            normalized
        } else {
            format!("{}/", normalized)
        };
        self.files
            .read()
            .map(|f| f.keys().any(|k| k.starts_with(&prefix)))
            .unwrap_or(false)
    }
}
