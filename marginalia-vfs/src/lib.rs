//! Marginalia Virtual File System
//!
//! A virtual file system abstraction with two backends: the native OS file
//! system and an in-memory file system used by tests and embedders.
//!
//! # Usage
//! ```rust
//! use marginalia_vfs::{MemoryFileSystem, VirtualFileSystem};
//! use std::path::Path;
//!
//! let fs = MemoryFileSystem::new();
//! fs.write_file(Path::new("/app/main.mg"), b"var x = 1;").unwrap();
//! assert!(fs.is_dir(Path::new("/app")));
//! ```

mod error;
mod memory;
mod native;
mod r#trait;

pub use error::{VfsError, VfsResult};
pub use memory::MemoryFileSystem;
pub use native::NativeFileSystem;
pub use r#trait::{atomic_write, VirtualFileSystem};

/// Create a new memory-based file system.
pub fn memory_fs() -> MemoryFileSystem {
    MemoryFileSystem::new()
}

/// Create a new native file system.
pub fn native_fs() -> NativeFileSystem {
    NativeFileSystem::new()
}
