//! Compiled-artifact cache
//!
//! Artifacts live in a cache directory beside their source:
//! `<dir>/__mgcache__/<module>.<tag>.mgc`. Every failure here is a cache
//! miss or a skipped write; none of them fails a load.

use marginalia_core::{decode_artifact, encode_artifact, CacheKey, Program};
use marginalia_vfs::{atomic_write, VirtualFileSystem};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const TARGET: &str = "marginalia::cache";

pub struct ArtifactCache {
    fs: Arc<dyn VirtualFileSystem>,
    dir_name: String,
}

impl ArtifactCache {
    pub fn new(fs: Arc<dyn VirtualFileSystem>, dir_name: impl Into<String>) -> Self {
        Self {
            fs,
            dir_name: dir_name.into(),
        }
    }

    /// Artifact path for `module` compiled from `source_path`
    pub fn path_for(&self, source_path: &Path, module: &str) -> PathBuf {
        let dir = source_path.parent().unwrap_or_else(|| Path::new(""));
        dir.join(&self.dir_name).join(CacheKey::file_name(module))
    }

    /// Load a valid artifact, or `None` on any miss
    pub fn read(&self, source_path: &Path, module: &str, key: &CacheKey) -> Option<Program> {
        let path = self.path_for(source_path, module);
        let bytes = match self.fs.read_file(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::trace!(target: TARGET, path = %path.display(), error = %e, "no artifact");
                return None;
            }
        };
        match decode_artifact(&bytes, key) {
            Ok(program) if program.module == module => {
                tracing::debug!(target: TARGET, module = %module, path = %path.display(), "cache hit");
                Some(program)
            }
            Ok(program) => {
                tracing::debug!(
                    target: TARGET,
                    module = %module,
                    stored = %program.module,
                    "artifact belongs to another module"
                );
                None
            }
            Err(e) => {
                tracing::debug!(target: TARGET, module = %module, reason = %e, "cache miss");
                None
            }
        }
    }

    /// Store an artifact. Returns whether it was written.
    pub fn write(&self, source_path: &Path, key: &CacheKey, program: &Program) -> bool {
        let path = self.path_for(source_path, &program.module);
        let bytes = match encode_artifact(key, program) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(target: TARGET, module = %program.module, error = %e, "cannot encode artifact");
                return false;
            }
        };
        match atomic_write(self.fs.as_ref(), &path, &bytes) {
            Ok(()) => {
                tracing::debug!(target: TARGET, path = %path.display(), size = bytes.len(), "artifact written");
                true
            }
            Err(e) => {
                tracing::debug!(target: TARGET, path = %path.display(), error = %e, "artifact write skipped");
                false
            }
        }
    }
}
