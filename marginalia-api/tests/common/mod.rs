//! Test helpers
//!
//! Projects on a real temporary directory, or on an in-memory file system.

#![allow(dead_code)]

use marginalia_api::RunConfig;
use marginalia_config::LoaderConfig;
use marginalia_log::{Dispatcher, EventState, Recorder};
use marginalia_vfs::{MemoryFileSystem, NativeFileSystem};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const GREET: &str = r#"fn greet(name) {
    //: hello {name}
    return f"hi {name}";
}
var result = greet("Ada");
"#;

/// A source tree in a temporary directory with a private dispatcher
pub struct Project {
    pub dir: TempDir,
    pub dispatcher: Arc<Dispatcher>,
    pub recorder: Recorder,
}

impl Project {
    pub fn new() -> Self {
        let dispatcher = Arc::new(Dispatcher::new());
        let recorder = Recorder::new();
        dispatcher.register(recorder.handler());
        Self {
            dir: TempDir::new().expect("cannot create temp dir"),
            dispatcher,
            recorder,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("cannot create dirs");
        }
        std::fs::write(&path, contents).expect("cannot write source");
        path
    }

    pub fn config(&self) -> RunConfig {
        RunConfig {
            loader: LoaderConfig {
                search_roots: vec![self.root().to_path_buf()],
                ..LoaderConfig::default()
            },
            ..RunConfig::default()
        }
        .with_dispatcher(self.dispatcher.clone())
        .with_fs(Arc::new(NativeFileSystem::new()))
    }

    /// Artifact file names in the cache directory under `relative_dir`
    pub fn artifacts(&self, relative_dir: &str) -> Vec<String> {
        let dir = self.root().join(relative_dir).join("__mgcache__");
        let mut names: Vec<String> = match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|n| n.ends_with(".mgc"))
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    pub fn states(&self) -> Vec<(EventState, String)> {
        self.recorder.states()
    }
}

/// Config over an in-memory tree rooted at `/app`
pub fn memory_project(files: &[(&str, &str)]) -> (MemoryFileSystem, RunConfig, Recorder) {
    let fs = MemoryFileSystem::with_files(
        files
            .iter()
            .map(|(path, source)| (format!("/app/{}", path), source.as_bytes().to_vec())),
    );
    let dispatcher = Arc::new(Dispatcher::new());
    let recorder = Recorder::new();
    dispatcher.register(recorder.handler());
    let config = RunConfig {
        loader: LoaderConfig {
            search_roots: vec![PathBuf::from("/app")],
            ..LoaderConfig::default()
        },
        ..RunConfig::default()
    }
    .with_dispatcher(dispatcher)
    .with_fs(Arc::new(fs.clone()));
    (fs, config, recorder)
}
