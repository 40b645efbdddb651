//! CLI configuration
//!
//! Log levels per pipeline phase, and the optional `marginalia.json`
//! project file.

use marginalia_config::Phase;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Default project file name, looked up in the working directory
pub const PROJECT_FILE: &str = "marginalia.json";

/// CLI log configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub global: Level,
    /// Level for script events bridged into `tracing`
    pub events: Option<Level>,
    pub loader: Option<Level>,
    pub cache: Option<Level>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global: Level::WARN,
            events: Some(Level::INFO),
            loader: None,
            cache: None,
        }
    }
}

impl LogConfig {
    pub fn with_global(level: Level) -> Self {
        Self {
            global: level,
            ..Self::default()
        }
    }

    /// Get log level for a specific target
    pub fn level_for(&self, target: &str) -> Level {
        match target {
            "marginalia::events" => self.events.unwrap_or(self.global),
            "marginalia::loader" => self.loader.unwrap_or(self.global),
            "marginalia::cache" => self.cache.unwrap_or(self.global),
            _ => self.global,
        }
    }

    /// Every phase target with its level
    pub fn phase_levels(&self) -> Vec<(String, Level)> {
        Phase::ALL
            .iter()
            .map(|phase| {
                let target = phase.target();
                let level = self.level_for(&target);
                (target, level)
            })
            .collect()
    }
}

/// Parse a log level name; `silent` maps to errors only
pub fn parse_log_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "silent" | "error" => Some(Level::ERROR),
        "warn" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

/// `marginalia.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectFile {
    /// Entry module, used when `run` gets no module name
    pub entry: Option<String>,
    /// Search roots, relative to the project file
    pub roots: Vec<PathBuf>,
    /// Whether the artifact cache is used
    pub cache: Option<bool>,
    pub log_level: Option<String>,
}

impl ProjectFile {
    /// Read a project file. A missing default file is an empty project.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(PROJECT_FILE), false),
        };
        if !path.exists() {
            if required {
                return Err(format!("project file '{}' not found", path.display()));
            }
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        let mut project: ProjectFile = serde_json::from_str(&content)
            .map_err(|e| format!("cannot parse '{}': {}", path.display(), e))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        project.roots = project.roots.iter().map(|root| base.join(root)).collect();
        Ok(project)
    }
}
