//! Marginalia CLI - command line interface
//!
//! `run` imports a module through the commentary loader, `expand` prints
//! the augmented source of a file, and `compile` fills the artifact cache
//! without executing anything.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;

mod config;
mod logging;
mod platform;

use crate::config::{parse_log_level, LogConfig, ProjectFile};
use crate::logging::LogFormat;
use crate::platform::print_load_error;
use marginalia_api::{compile_module, expand, init_config, run, Dispatcher, RunConfig};
use marginalia_config::LoaderConfig;
use marginalia_log::{PrintHandler, TracingHandler};
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "marginalia",
    about = "Turn commentary comments into structured log events",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Project file (default: ./marginalia.json if present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Diagnostic log format
    #[arg(long, global = true, value_enum, default_value = "compact")]
    log_format: LogFormat,

    /// Diagnostic log level: silent, error, warn, info, debug, trace
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Import and run a module
    Run {
        /// Module name (default: the project entry)
        module: Option<String>,
        #[command(flatten)]
        loader: LoaderArgs,
        /// Where script log events go
        #[arg(long, value_enum, default_value = "print")]
        events: EventSink,
    },
    /// Print the augmented source of a file
    Expand {
        file: PathBuf,
        /// Module name used for context paths (default: the file stem)
        #[arg(long)]
        module: Option<String>,
    },
    /// Compile a module into the artifact cache without running it
    Compile {
        module: String,
        #[command(flatten)]
        loader: LoaderArgs,
        /// Print the disassembled bytecode
        #[arg(long)]
        dump_bytecode: bool,
    },
}

#[derive(Args)]
struct LoaderArgs {
    /// Search root (repeatable; default: project roots, then the current directory)
    #[arg(long = "root", value_name = "DIR")]
    roots: Vec<PathBuf>,
    /// Neither read nor write compiled artifacts
    #[arg(long)]
    no_cache: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EventSink {
    /// One line per event on stdout
    Print,
    /// Forward into the diagnostic log
    Tracing,
    Off,
}

fn main() {
    let cli = Cli::parse();

    let project = match ProjectFile::load(cli.config.as_deref()) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    };

    let level_name = cli.log_level.clone().or_else(|| project.log_level.clone());
    let level = match level_name.as_deref() {
        Some(name) => match parse_log_level(name) {
            Some(level) => level,
            None => {
                eprintln!("error: unknown log level '{}'", name);
                process::exit(2);
            }
        },
        None => Level::WARN,
    };
    logging::init(&LogConfig::with_global(level), cli.log_format);

    let code = match cli.command {
        Command::Run {
            module,
            loader,
            events,
        } => handle_run(module, &loader, events, &project),
        Command::Expand { file, module } => handle_expand(&file, module, &project),
        Command::Compile {
            module,
            loader,
            dump_bytecode,
        } => handle_compile(&module, &loader, dump_bytecode, &project),
    };
    process::exit(code);
}

/// Build run configuration from flags and the project file
fn build_run_config(loader: Option<&LoaderArgs>, project: &ProjectFile) -> RunConfig {
    let roots = match loader {
        Some(args) if !args.roots.is_empty() => args.roots.clone(),
        _ => project.roots.clone(),
    };
    let no_cache = loader.map(|args| args.no_cache).unwrap_or(false);
    RunConfig {
        loader: LoaderConfig {
            search_roots: roots,
            use_cache: !no_cache && project.cache.unwrap_or(true),
            ..LoaderConfig::default()
        },
        ..RunConfig::default()
    }
    .with_dispatcher(Dispatcher::global())
}

fn handle_run(
    module: Option<String>,
    loader: &LoaderArgs,
    events: EventSink,
    project: &ProjectFile,
) -> i32 {
    let Some(module) = module.or_else(|| project.entry.clone()) else {
        eprintln!("error: no module given and no 'entry' in the project file");
        return 2;
    };
    let config = build_run_config(Some(loader), project);
    match events {
        EventSink::Print => {
            config.dispatcher.register(PrintHandler::handler());
        }
        EventSink::Tracing => {
            config.dispatcher.register(TracingHandler::handler());
        }
        EventSink::Off => {}
    }
    init_config(config.clone());

    match run(&module, &config) {
        Ok(output) => {
            tracing::debug!(
                target: "marginalia::loader",
                modules = output.modules_loaded.len(),
                "run finished"
            );
            0
        }
        Err(e) => {
            print_load_error(&e, &config);
            1
        }
    }
}

fn handle_expand(file: &Path, module: Option<String>, project: &ProjectFile) -> i32 {
    let module = module.unwrap_or_else(|| {
        file.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string())
    });
    let config = build_run_config(None, project);
    match expand(file, &module, &config) {
        Ok(output) => {
            print!("{}", output.transformation.source);
            0
        }
        Err(e) => {
            eprintln!("error: {}", e.to_report());
            if let Some(line) = e.line() {
                if let Ok(source) = std::fs::read_to_string(file) {
                    platform::print_source_context(&source, line, None);
                }
            }
            1
        }
    }
}

fn handle_compile(
    module: &str,
    loader: &LoaderArgs,
    dump_bytecode: bool,
    project: &ProjectFile,
) -> i32 {
    let mut config = build_run_config(Some(loader), project);
    config.dump_bytecode = dump_bytecode;
    match compile_module(module, &config) {
        Ok(output) => {
            if config.dump_bytecode {
                print!("{}", output.program.main.chunk.disassemble(module));
            }
            match (&output.artifact, output.from_cache) {
                (Some(path), true) => println!("{}: up to date ({})", module, path.display()),
                (Some(path), false) => println!("{}: compiled ({})", module, path.display()),
                (None, _) => println!("{}: compiled (cache disabled)", module),
            }
            0
        }
        Err(e) => {
            print_load_error(&e, &config);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "marginalia", "run", "app", "--root", "src", "--root", "lib", "--no-cache",
        ])
        .unwrap();
        match cli.command {
            Command::Run { module, loader, events } => {
                assert_eq!(module.as_deref(), Some("app"));
                assert_eq!(loader.roots, vec![PathBuf::from("src"), PathBuf::from("lib")]);
                assert!(loader.no_cache);
                assert_eq!(events, EventSink::Print);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_flags_override_project() {
        let project = ProjectFile {
            entry: Some("app".to_string()),
            roots: vec![PathBuf::from("/proj/src")],
            cache: Some(true),
            log_level: None,
        };
        let args = LoaderArgs {
            roots: vec![],
            no_cache: true,
        };
        let config = build_run_config(Some(&args), &project);
        assert_eq!(config.loader.search_roots, vec![PathBuf::from("/proj/src")]);
        assert!(!config.loader.use_cache);

        let args = LoaderArgs {
            roots: vec![PathBuf::from("other")],
            no_cache: false,
        };
        let config = build_run_config(Some(&args), &project);
        assert_eq!(config.loader.search_roots, vec![PathBuf::from("other")]);
        assert!(config.loader.use_cache);
    }

    #[test]
    fn test_project_can_disable_cache() {
        let project = ProjectFile {
            cache: Some(false),
            ..ProjectFile::default()
        };
        assert!(!build_run_config(None, &project).loader.use_cache);
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from(["marginalia", "expand", "a.mg", "--log-format", "json"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
