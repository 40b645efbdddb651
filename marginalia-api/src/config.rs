//! API configuration
//!
//! `RunConfig` bundles the loader and limit configuration with the
//! dispatcher and file system a session runs against. A global singleton
//! is provided for the CLI only.

use marginalia_config::{LimitConfig, LoaderConfig};
use marginalia_log::Dispatcher;
use marginalia_vfs::{NativeFileSystem, VirtualFileSystem};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Execution configuration
#[derive(Clone)]
pub struct RunConfig {
    /// Module resolution and cache settings
    pub loader: LoaderConfig,
    /// Execution limits
    pub limits: LimitConfig,
    /// Registry that receives every log event
    pub dispatcher: Arc<Dispatcher>,
    /// File system sources and artifacts are read from and written to
    pub fs: Arc<dyn VirtualFileSystem>,
    /// Whether to dump bytecode after compilation
    pub dump_bytecode: bool,
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("loader", &self.loader)
            .field("limits", &self.limits)
            .field("handlers", &self.dispatcher.handler_count())
            .field("dump_bytecode", &self.dump_bytecode)
            .finish()
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            loader: LoaderConfig::default(),
            limits: LimitConfig::default(),
            dispatcher: Dispatcher::global(),
            fs: Arc::new(NativeFileSystem::new()),
            dump_bytecode: false,
        }
    }
}

impl RunConfig {
    /// Use a private dispatcher instead of the process-wide one
    pub fn with_dispatcher(mut self, dispatcher: Arc<Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_fs(mut self, fs: Arc<dyn VirtualFileSystem>) -> Self {
        self.fs = fs;
        self
    }
}

// Global config singleton for CLI convenience
static GLOBAL_CONFIG: OnceCell<RunConfig> = OnceCell::new();

/// Initialize global configuration.
///
/// Returns `false` (and keeps the existing value) if already initialized.
pub fn init(config: RunConfig) -> bool {
    GLOBAL_CONFIG.set(config).is_ok()
}

/// Global config, if initialized
pub fn config() -> Option<&'static RunConfig> {
    GLOBAL_CONFIG.get()
}

pub fn is_initialized() -> bool {
    GLOBAL_CONFIG.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_run_config() {
        let cfg = RunConfig::default();
        assert!(!cfg.dump_bytecode);
        assert!(cfg.loader.use_cache);
        assert_eq!(cfg.limits.max_recursion_depth, 200);
        assert!(Arc::ptr_eq(&cfg.dispatcher, &Dispatcher::global()));
    }

    #[test]
    fn test_with_dispatcher() {
        let private = Arc::new(Dispatcher::new());
        let cfg = RunConfig::default().with_dispatcher(private.clone());
        assert!(Arc::ptr_eq(&cfg.dispatcher, &private));
    }

    #[test]
    fn test_run_config_debug() {
        let debug_str = format!("{:?}", RunConfig::default());
        assert!(debug_str.contains("loader"));
        assert!(debug_str.contains("limits"));
        assert!(debug_str.contains("handlers"));
    }

    #[test]
    fn test_global_config_init_once() {
        init(RunConfig::default());
        assert!(is_initialized());
        assert!(config().is_some());
        assert!(!init(RunConfig::default()));
    }
}
