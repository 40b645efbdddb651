//! Marginalia API - module loading and execution orchestration
//!
//! Provides:
//! - the module resolution hook (`Importer` with its finder chain)
//! - the compile-and-cache loader (`SourceLoader`, `ArtifactCache`)
//! - configuration (`RunConfig`) and unified errors (`LoadError`)
//!
//! For CLI convenience, this crate provides a global configuration
//! singleton. For library use, prefer the explicit `run(module, &config)`
//! API or a [`Session`].

pub mod cache;
pub mod config;
pub mod error;
pub mod finder;
pub mod importer;
pub mod loader;
pub mod types;

pub use cache::ArtifactCache;
pub use config::{config as get_config, init as init_config, is_initialized, RunConfig};
pub use error::{ErrorReport, LoadError};
pub use finder::{native_module, ModuleFinder, ModuleOrigin, ModuleSpec, NativeModuleFinder, SourceFinder};
pub use importer::Importer;
pub use loader::{build_program, SourceLoader};
pub use types::{CompileOutput, ExecuteOutput, ExpandOutput};

pub use marginalia_config;
pub use marginalia_core::{Transformation, Value, VM};
pub use marginalia_log::{Dispatcher, Handler, HandlerError, LogEvent};

use marginalia_core::transform;
use std::path::Path;
use std::rc::Rc;

/// A VM wired to an importer
pub struct Session {
    vm: VM,
    importer: Rc<Importer>,
}

impl Session {
    pub fn new(config: &RunConfig) -> Self {
        let mut vm = VM::with_limits(config.dispatcher.clone(), config.limits.clone());
        let importer = Rc::new(Importer::new(&config.loader, config.fs.clone()));
        vm.set_import_host(importer.clone());
        Self { vm, importer }
    }

    pub fn importer(&self) -> &Importer {
        &self.importer
    }

    pub fn vm(&self) -> &VM {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut VM {
        &mut self.vm
    }

    /// Collect `print` output instead of writing it to stdout
    pub fn capture_output(&mut self) {
        self.vm.capture_output();
    }

    /// Import `name` as if a script had executed `import name;`
    pub fn import(&mut self, name: &str) -> Result<Value, LoadError> {
        self.importer.load(&mut self.vm, name)
    }

    /// Top-level binding of a loaded module
    pub fn global(&self, module: &str, name: &str) -> Option<Value> {
        self.vm.get_global(module, name)
    }
}

/// Import and run `module` with explicit configuration
///
/// This is the recommended API for library users.
pub fn run(module: &str, config: &RunConfig) -> Result<ExecuteOutput, LoadError> {
    tracing::info!(target: "marginalia::loader", module = %module, "starting execution");
    let mut session = Session::new(config);
    session.import(module)?;
    tracing::info!(target: "marginalia::loader", module = %module, "execution completed");
    Ok(ExecuteOutput {
        module: module.to_string(),
        modules_loaded: session.vm().module_names(),
        stdout: session.vm_mut().take_output(),
    })
}

/// Augmented source of the file at `path`, without compiling it
pub fn expand(path: &Path, module: &str, config: &RunConfig) -> Result<ExpandOutput, LoadError> {
    let loader = SourceLoader::new(&config.loader, config.fs.clone());
    let source = loader.read_source(path)?;
    let transformation = transform(module, &source, &config.dispatcher.severities())?;
    Ok(ExpandOutput {
        module: module.to_string(),
        transformation,
    })
}

/// Resolve and compile `module` (populating the cache) without executing it
pub fn compile_module(module: &str, config: &RunConfig) -> Result<CompileOutput, LoadError> {
    let importer = Importer::new(&config.loader, config.fs.clone());
    let spec = importer.find(module)?;
    match &spec.origin {
        ModuleOrigin::Source(path) => {
            importer
                .loader()
                .compile(module, path, &config.dispatcher.severities())
        }
        ModuleOrigin::Native(_) => Err(LoadError::NotFound {
            name: module.to_string(),
            searched: Vec::new(),
        }),
    }
}

// ==================== Global config API ====================

/// Run with the global configuration, or the default one if none was set
pub fn run_global(module: &str) -> Result<ExecuteOutput, LoadError> {
    match get_config() {
        Some(config) => run(module, config),
        None => run(module, &RunConfig::default()),
    }
}
