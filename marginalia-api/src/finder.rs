//! Module finders
//!
//! A finder answers "where does module `name` come from?" for a list of
//! search paths. `None` means the finder has no opinion and the next one in
//! the chain is asked.

use marginalia_config::LoaderConfig;
use marginalia_core::runtime::value::{ModuleObj, Scope};
use marginalia_core::Value;
use marginalia_vfs::VirtualFileSystem;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Builds the value of a module provided by Rust code
pub type NativeBuilder = Rc<dyn Fn(&str) -> Value>;

/// Where a module's body comes from
#[derive(Clone)]
pub enum ModuleOrigin {
    /// Source file that goes through the commentary pipeline
    Source(PathBuf),
    Native(NativeBuilder),
}

impl fmt::Debug for ModuleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleOrigin::Source(path) => f.debug_tuple("Source").field(path).finish(),
            ModuleOrigin::Native(_) => f.write_str("Native"),
        }
    }
}

/// Resolution result for one module
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    pub name: String,
    pub origin: ModuleOrigin,
    /// Set for packages: where their submodules are searched
    pub submodule_search_paths: Option<Vec<PathBuf>>,
}

impl ModuleSpec {
    pub fn is_package(&self) -> bool {
        self.submodule_search_paths.is_some()
    }
}

pub trait ModuleFinder {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    fn find_spec(
        &self,
        name: &str,
        search_paths: &[PathBuf],
        fs: &dyn VirtualFileSystem,
    ) -> Option<ModuleSpec>;
}

/// Finds `.mg` sources: a package is a directory holding the package entry
/// file, a plain module is `<name>.mg`. Packages win over plain modules.
#[derive(Debug, Clone)]
pub struct SourceFinder {
    extension: String,
    package_entry: String,
}

impl SourceFinder {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            extension: config.source_extension.clone(),
            package_entry: config.package_entry.clone(),
        }
    }

    fn find_in(&self, base: &str, dir: &Path, fs: &dyn VirtualFileSystem) -> Option<(PathBuf, bool)> {
        let package_dir = dir.join(base);
        let entry = package_dir.join(&self.package_entry);
        if fs.is_file(&entry) {
            return Some((entry, true));
        }
        let file = dir.join(format!("{}.{}", base, self.extension));
        if fs.is_file(&file) {
            return Some((file, false));
        }
        None
    }
}

impl ModuleFinder for SourceFinder {
    fn name(&self) -> &str {
        "source"
    }

    fn find_spec(
        &self,
        name: &str,
        search_paths: &[PathBuf],
        fs: &dyn VirtualFileSystem,
    ) -> Option<ModuleSpec> {
        let base = name.rsplit('.').next().unwrap_or(name);
        search_paths.iter().find_map(|dir| {
            let (path, is_package) = self.find_in(base, dir, fs)?;
            tracing::trace!(
                target: "marginalia::loader",
                module = %name,
                path = %path.display(),
                "source found"
            );
            let submodule_search_paths = if is_package {
                path.parent().map(|p| vec![p.to_path_buf()])
            } else {
                None
            };
            Some(ModuleSpec {
                name: name.to_string(),
                origin: ModuleOrigin::Source(path),
                submodule_search_paths,
            })
        })
    }
}

/// Serves modules registered from Rust, by fully qualified name
#[derive(Default)]
pub struct NativeModuleFinder {
    modules: HashMap<String, NativeBuilder>,
}

impl NativeModuleFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(&str) -> Value + 'static,
    {
        self.modules.insert(name.to_string(), Rc::new(builder));
    }

    /// Register a module made of fixed bindings
    pub fn register_bindings(&mut self, name: &str, bindings: Vec<(String, Value)>) {
        self.register(name, move |module_name| {
            native_module(module_name, bindings.clone())
        });
    }
}

impl ModuleFinder for NativeModuleFinder {
    fn name(&self) -> &str {
        "native"
    }

    fn find_spec(
        &self,
        name: &str,
        _search_paths: &[PathBuf],
        _fs: &dyn VirtualFileSystem,
    ) -> Option<ModuleSpec> {
        self.modules.get(name).map(|builder| ModuleSpec {
            name: name.to_string(),
            origin: ModuleOrigin::Native(builder.clone()),
            submodule_search_paths: None,
        })
    }
}

/// A module value holding `bindings`
pub fn native_module(name: &str, bindings: Vec<(String, Value)>) -> Value {
    let scope = Scope::new(None);
    scope.declare("__name__", Value::str(name));
    for (key, value) in bindings {
        scope.declare(&key, value);
    }
    Value::Module(Rc::new(ModuleObj {
        name: name.to_string(),
        scope,
    }))
}
