//! CLI logging initialization
//!
//! Per-phase filtering on top of `tracing-subscriber`. Diagnostics go to
//! stderr so script output on stdout stays clean.

use crate::config::LogConfig;
use std::io;
use tracing_subscriber::{filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Colored, multi-line (development)
    Pretty,
    Compact,
    /// One JSON object per line (tool integration)
    Json,
}

fn targets(log_config: &LogConfig) -> Targets {
    let mut targets = Targets::new()
        .with_default(log_config.global)
        .with_target("marginalia::events", log_config.level_for("marginalia::events"))
        .with_target("marginalia::dispatch", log_config.global);
    for (target, level) in log_config.phase_levels() {
        targets = targets.with_target(target, level);
    }
    targets
}

/// Initialize logging with the given format and levels
pub fn init(log_config: &LogConfig, format: LogFormat) {
    let layer = create_format_layer(format, io::stderr).with_filter(targets(log_config));
    // A second initialization (tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry().with(layer).try_init();
}

/// Create formatter layer based on format
fn create_format_layer<W, F>(format: LogFormat, make_writer: F) -> Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>
where
    W: io::Write + Send + Sync + 'static,
    F: Fn() -> W + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(make_writer)
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_targets_cover_every_phase() {
        let cfg = LogConfig {
            cache: Some(Level::TRACE),
            ..LogConfig::with_global(Level::WARN)
        };
        let targets = targets(&cfg);
        assert!(targets.would_enable("marginalia::cache", &Level::TRACE));
        assert!(!targets.would_enable("marginalia::vm", &Level::INFO));
        assert!(targets.would_enable("marginalia::events", &Level::INFO));
    }
}
