//! CLI formatted output
//!
//! Error display with source context.

use marginalia_api::{Importer, LoadError, ModuleOrigin, RunConfig};
use marginalia_vfs::VirtualFileSystem;
use std::path::PathBuf;

/// Print an error and, when its line is known, the surrounding source
pub fn print_load_error(e: &LoadError, config: &RunConfig) {
    eprintln!("error: {}", e.to_report());

    let (Some(line), Some(module)) = (e.line(), e.module()) else {
        return;
    };
    let Some(path) = source_path(module, config) else {
        return;
    };
    if let Ok(source) = config.fs.read_to_string(&path) {
        eprintln!(" --> {}:{}", path.display(), line);
        print_source_context(&source, line, None);
    }
}

fn source_path(module: &str, config: &RunConfig) -> Option<PathBuf> {
    let importer = Importer::new(&config.loader, config.fs.clone());
    match importer.find(module).ok()?.origin {
        ModuleOrigin::Source(path) => Some(path),
        ModuleOrigin::Native(_) => None,
    }
}

/// Print the lines around `error_line`, with a caret under `error_col` if
/// given
pub fn print_source_context(source: &str, error_line: usize, error_col: Option<usize>) {
    eprint!("{}", render_source_context(source, error_line, error_col));
}

fn render_source_context(source: &str, error_line: usize, error_col: Option<usize>) -> String {
    const CONTEXT_LINES: usize = 2;

    let lines: Vec<&str> = source.lines().collect();
    if error_line == 0 || error_line > lines.len() {
        return String::new();
    }

    let start_line = error_line.saturating_sub(CONTEXT_LINES).max(1);
    let end_line = (error_line + CONTEXT_LINES).min(lines.len());
    let width = end_line.to_string().len();

    let mut out = String::new();
    for line_idx in start_line..=end_line {
        let marker = if line_idx == error_line { '>' } else { ' ' };
        out.push_str(&format!(
            "{}{:>width$} | {}\n",
            marker,
            line_idx,
            lines[line_idx - 1],
            width = width
        ));
        if line_idx == error_line {
            if let Some(col) = error_col {
                out.push_str(&format!(
                    " {} | {}^\n",
                    " ".repeat(width),
                    " ".repeat(col.saturating_sub(1))
                ));
            }
        }
    }
    out
}
