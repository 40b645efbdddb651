//! Severity symbol table

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A registered marker symbol
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityEntry {
    pub symbol: String,
    pub level: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeverityError {
    #[error("invalid severity symbol {0:?}: must be non-empty and contain no whitespace")]
    InvalidSymbol(String),
    #[error("unknown severity symbol {0:?}")]
    UnknownSymbol(String),
}

/// Mapping from marker symbol to `(level, name)`
///
/// Symbols are unique; redefining a symbol overwrites its entry. The most
/// recent `define` for a level also makes its name the display label for
/// that level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeverityTable {
    entries: BTreeMap<String, SeverityEntry>,
    labels: BTreeMap<i64, String>,
}

impl SeverityTable {
    /// An empty table. No comment is a marker until a symbol is defined.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
            labels: BTreeMap::new(),
        }
    }

    pub fn define(&mut self, symbol: &str, level: i64, name: &str) -> Result<(), SeverityError> {
        if symbol.is_empty() || symbol.chars().any(char::is_whitespace) {
            return Err(SeverityError::InvalidSymbol(symbol.to_string()));
        }
        let previous = self.entries.insert(
            symbol.to_string(),
            SeverityEntry {
                symbol: symbol.to_string(),
                level,
                name: name.to_string(),
            },
        );
        if let Some(previous) = previous.filter(|p| p.level != level) {
            self.relabel(previous.level);
        }
        self.labels.insert(level, name.to_string());
        Ok(())
    }

    /// Point the label for `level` at a remaining entry, or drop it
    fn relabel(&mut self, level: i64) {
        match self.entries.values().find(|e| e.level == level) {
            Some(entry) => {
                let name = entry.name.clone();
                self.labels.insert(level, name);
            }
            None => {
                self.labels.remove(&level);
            }
        }
    }

    pub fn resolve(&self, symbol: &str) -> Result<(i64, &str), SeverityError> {
        self.entries
            .get(symbol)
            .map(|e| (e.level, e.name.as_str()))
            .ok_or_else(|| SeverityError::UnknownSymbol(symbol.to_string()))
    }

    pub fn entry(&self, symbol: &str) -> Option<&SeverityEntry> {
        self.entries.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.entries.contains_key(symbol)
    }

    /// Display label registered for `level`
    pub fn name_for(&self, level: i64) -> Option<&str> {
        self.labels.get(&level).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &SeverityEntry> {
        self.entries.values()
    }

    /// Canonical text of the table, sorted by symbol.
    ///
    /// Two tables with the same canonical text classify every comment line
    /// the same way, so a digest of this string is part of the cache key.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        for entry in self.entries.values() {
            out.push_str(&format!(
                "{}\t{}\t{}\n",
                entry.symbol, entry.level, entry.name
            ));
        }
        out
    }
}

impl Default for SeverityTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for (symbol, level, name) in [
            ("?", 10, "DEBUG"),
            (":", 20, "INFO"),
            ("!", 30, "WARNING"),
            ("!!", 40, "ERROR"),
        ] {
            // default symbols are valid
            let _ = table.define(symbol, level, name);
        }
        table
    }
}
