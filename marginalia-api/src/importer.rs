//! Module resolution hook
//!
//! The importer owns the finder chain and answers the VM's import requests.
//! The source finder is installed once, at the end of the chain; finders
//! added later are consulted before it.

use crate::error::LoadError;
use crate::finder::{ModuleFinder, ModuleOrigin, ModuleSpec, NativeModuleFinder, SourceFinder};
use crate::loader::SourceLoader;
use marginalia_config::LoaderConfig;
use marginalia_core::runtime::vm::VmResult;
use marginalia_core::{ImportHost, Value, VM};
use marginalia_vfs::VirtualFileSystem;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

const TARGET: &str = "marginalia::loader";

pub struct Importer {
    finders: RefCell<Vec<Rc<dyn ModuleFinder>>>,
    loader: SourceLoader,
    fs: Arc<dyn VirtualFileSystem>,
    roots: Vec<PathBuf>,
    /// Submodule search paths of loaded packages
    package_paths: RefCell<HashMap<String, Vec<PathBuf>>>,
}

impl Importer {
    pub fn new(config: &LoaderConfig, fs: Arc<dyn VirtualFileSystem>) -> Self {
        let source: Rc<dyn ModuleFinder> = Rc::new(SourceFinder::new(config));
        Self {
            finders: RefCell::new(vec![source]),
            loader: SourceLoader::new(config, fs.clone()),
            fs,
            roots: config.effective_roots(),
            package_paths: RefCell::new(HashMap::new()),
        }
    }

    /// Add a finder ahead of the source finder
    pub fn add_finder(&self, finder: Rc<dyn ModuleFinder>) {
        let mut finders = self.finders.borrow_mut();
        let at = finders.len().saturating_sub(1);
        finders.insert(at, finder);
    }

    /// Serve the modules of `finder` before any source file
    pub fn add_native_modules(&self, finder: NativeModuleFinder) {
        self.add_finder(Rc::new(finder));
    }

    /// Names of the finders, in consultation order
    pub fn finder_names(&self) -> Vec<String> {
        self.finders
            .borrow()
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }

    pub fn loader(&self) -> &SourceLoader {
        &self.loader
    }

    /// Search paths for `name`: the roots for top-level modules, the parent
    /// package's directory for submodules
    fn search_paths(&self, vm: &mut VM, name: &str) -> Result<Vec<PathBuf>, LoadError> {
        match name.rsplit_once('.') {
            None => Ok(self.roots.clone()),
            Some((parent, _)) => {
                self.load(vm, parent)?;
                self.package_paths
                    .borrow()
                    .get(parent)
                    .cloned()
                    .ok_or_else(|| LoadError::NotFound {
                        name: name.to_string(),
                        searched: Vec::new(),
                    })
            }
        }
    }

    /// Resolve `name` without executing anything
    pub fn find(&self, name: &str) -> Result<ModuleSpec, LoadError> {
        let mut search_paths = self.roots.clone();
        let mut qualified = String::new();
        let mut spec = None;
        for segment in name.split('.') {
            if spec.is_some() {
                qualified.push('.');
            }
            qualified.push_str(segment);
            let found = self.find_spec(&qualified, &search_paths)?;
            if let Some(paths) = &found.submodule_search_paths {
                search_paths = paths.clone();
            } else {
                search_paths = Vec::new();
            }
            spec = Some(found);
        }
        spec.ok_or_else(|| LoadError::NotFound {
            name: name.to_string(),
            searched: self.roots.clone(),
        })
    }

    fn find_spec(&self, name: &str, search_paths: &[PathBuf]) -> Result<ModuleSpec, LoadError> {
        let finders: Vec<Rc<dyn ModuleFinder>> = self.finders.borrow().clone();
        finders
            .iter()
            .find_map(|finder| finder.find_spec(name, search_paths, self.fs.as_ref()))
            .ok_or_else(|| LoadError::NotFound {
                name: name.to_string(),
                searched: search_paths.to_vec(),
            })
    }

    /// Load `name` (and its parents) into `vm`, or return the loaded module
    pub fn load(&self, vm: &mut VM, name: &str) -> Result<Value, LoadError> {
        if let Some(module) = vm.module(name) {
            return Ok(module);
        }
        let search_paths = self.search_paths(vm, name)?;
        // The parent's body may have imported us already.
        if let Some(module) = vm.module(name) {
            return Ok(module);
        }

        let spec = self.find_spec(name, &search_paths)?;

        if let Some(paths) = &spec.submodule_search_paths {
            self.package_paths
                .borrow_mut()
                .insert(name.to_string(), paths.clone());
        }

        let module = match &spec.origin {
            ModuleOrigin::Source(path) => self.loader.load(vm, name, path),
            ModuleOrigin::Native(build) => {
                let module = build(name);
                vm.insert_module(name, module.clone());
                Ok(module)
            }
        };
        let module = match module {
            Ok(module) => module,
            Err(e) => {
                self.package_paths.borrow_mut().remove(name);
                return Err(e);
            }
        };

        if let Some((parent, child)) = name.rsplit_once('.') {
            if let Some(Value::Module(parent)) = vm.module(parent) {
                parent.scope.declare(child, module.clone());
            }
        }
        tracing::debug!(target: TARGET, module = %name, "module loaded");
        Ok(module)
    }
}

impl ImportHost for Importer {
    fn import(&self, vm: &mut VM, name: &str) -> VmResult<Value> {
        self.load(vm, name).map_err(LoadError::into_thrown)
    }
}
