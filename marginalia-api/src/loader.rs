//! Compile-and-cache loader
//!
//! Turns a source file into an executed module: read, consult the artifact
//! cache, otherwise transform and compile (and store the artifact), then run
//! the module body in a fresh namespace.

use crate::cache::ArtifactCache;
use crate::error::LoadError;
use crate::types::CompileOutput;
use marginalia_config::LoaderConfig;
use marginalia_core::{compile_source, transform, CacheKey, Program, TransformError, Value, VM};
use marginalia_log::SeverityTable;
use marginalia_vfs::VirtualFileSystem;
use std::path::Path;
use std::sync::Arc;

const TARGET: &str = "marginalia::loader";

pub struct SourceLoader {
    fs: Arc<dyn VirtualFileSystem>,
    cache: Option<ArtifactCache>,
}

impl SourceLoader {
    pub fn new(config: &LoaderConfig, fs: Arc<dyn VirtualFileSystem>) -> Self {
        let cache = config
            .use_cache
            .then(|| ArtifactCache::new(fs.clone(), config.cache_dir_name.clone()));
        Self { fs, cache }
    }

    pub fn read_source(&self, path: &Path) -> Result<String, LoadError> {
        self.fs.read_to_string(path).map_err(|error| LoadError::Io {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Program for `module` at `path`, from the cache when valid
    pub fn compile(
        &self,
        module: &str,
        path: &Path,
        severities: &SeverityTable,
    ) -> Result<CompileOutput, LoadError> {
        let source = self.read_source(path)?;
        let key = CacheKey::new(&source, severities);

        if let Some(cache) = &self.cache {
            if let Some(program) = cache.read(path, module, &key) {
                return Ok(CompileOutput {
                    program,
                    from_cache: true,
                    artifact: Some(cache.path_for(path, module)),
                });
            }
        }

        let program = build_program(module, &source, severities)?;
        let artifact = self.cache.as_ref().map(|cache| {
            cache.write(path, &key, &program);
            cache.path_for(path, module)
        });
        Ok(CompileOutput {
            program,
            from_cache: false,
            artifact,
        })
    }

    /// Compile and execute `module`. A failing body leaves no trace in the
    /// VM's module table.
    pub fn load(&self, vm: &mut VM, module: &str, path: &Path) -> Result<Value, LoadError> {
        let severities = vm.dispatcher().severities();
        let output = self.compile(module, path, &severities)?;
        tracing::debug!(
            target: TARGET,
            module = %module,
            path = %path.display(),
            cached = output.from_cache,
            "loading module"
        );
        vm.execute_module(&output.program)
            .map_err(|thrown| LoadError::Runtime {
                module: module.to_string(),
                error: thrown.into_runtime_error(),
            })
    }
}

/// Transform then compile, reporting every failure as a `TransformError`
pub fn build_program(
    module: &str,
    source: &str,
    severities: &SeverityTable,
) -> Result<Program, TransformError> {
    let transformation = transform(module, source, severities)?;
    tracing::debug!(
        target: TARGET,
        module = %module,
        markers = transformation.markers.len(),
        instrumented = transformation.instrumented.len(),
        "module transformed"
    );
    compile_source(module, &transformation.source).map_err(|e| TransformError {
        module: module.to_string(),
        line: e.line(),
        message: e.message(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use marginalia_log::Dispatcher;
    use marginalia_vfs::MemoryFileSystem;

    fn setup(files: Vec<(&str, &str)>, use_cache: bool) -> (MemoryFileSystem, SourceLoader) {
        let fs = MemoryFileSystem::with_files(
            files.into_iter().map(|(p, s)| (p, s.as_bytes().to_vec())),
        );
        let config = LoaderConfig {
            use_cache,
            ..LoaderConfig::default()
        };
        let loader = SourceLoader::new(&config, Arc::new(fs.clone()));
        (fs, loader)
    }

    #[test]
    fn test_second_compile_hits_cache() {
        let (_, loader) = setup(vec![("/src/app.mg", "var x = 1;\n")], true);
        let table = SeverityTable::default();
        let first = loader.compile("app", Path::new("/src/app.mg"), &table).unwrap();
        let second = loader.compile("app", Path::new("/src/app.mg"), &table).unwrap();
        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(first.program, second.program);
    }

    #[test]
    fn test_cache_disabled() {
        let (fs, loader) = setup(vec![("/src/app.mg", "var x = 1;\n")], false);
        let table = SeverityTable::default();
        let output = loader.compile("app", Path::new("/src/app.mg"), &table).unwrap();
        assert!(output.artifact.is_none());
        let again = loader.compile("app", Path::new("/src/app.mg"), &table).unwrap();
        assert!(!again.from_cache);
        assert_eq!(fs.file_count(), 1);
    }

    #[test]
    fn test_syntax_error_is_transform_error() {
        let (_, loader) = setup(vec![("/src/bad.mg", "var x = 1;\nvar = ;\n")], true);
        let err = loader
            .compile("bad", Path::new("/src/bad.mg"), &SeverityTable::default())
            .unwrap_err();
        match err {
            LoadError::Transform(e) => {
                assert_eq!(e.module, "bad");
                assert_eq!(e.line, Some(2));
            }
            other => panic!("expected a transform error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let (_, loader) = setup(vec![], true);
        let err = loader
            .compile("gone", Path::new("/src/gone.mg"), &SeverityTable::default())
            .unwrap_err();
        assert_eq!(err.phase(), "io");
    }

    #[test]
    fn test_failed_body_is_not_registered() {
        let (_, loader) = setup(vec![("/src/boom.mg", "var x = 1 / 0;\n")], true);
        let mut vm = VM::new(Arc::new(Dispatcher::new()));
        let err = loader.load(&mut vm, "boom", Path::new("/src/boom.mg")).unwrap_err();
        match &err {
            LoadError::Runtime { module, error } => {
                assert_eq!(module, "boom");
                assert_eq!(error.kind, "ZeroDivisionError");
                assert_eq!(error.line, Some(1));
            }
            other => panic!("expected a runtime error, got {other:?}"),
        }
        assert!(!vm.has_module("boom"));
    }
}
