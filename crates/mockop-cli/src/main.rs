//! mockop: fixture tooling for the `mock-op` test double.
//!
//! Lists recorded responses, records new ones from a generator config and
//! manages scenario state directories.

// CLI-specific lint allowances (CLI binary, not library)
#![allow(missing_docs)]
#![allow(clippy::print_stdout)] // CLI must print to stdout
#![allow(clippy::print_stderr)] // CLI must print to stderr
#![allow(clippy::exit)] // CLI uses exit codes

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use miette::{IntoDiagnostic, Result};
use mockop::config::{load_dot_env, MockConfig, ResponseSourceConfig, RESP_GEN_DOT_ENV_VAR};
use mockop::generator::{process_backend, GenerationObserver, Generator, GeneratorConfig, SilentObserver};
use mockop::{
    ListedCommand, MockError, MockResult, ProcessEnvironment, ResponseDirectory, StateCursor,
    StateStore,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod progress;

/// Color output mode
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum ColorMode {
    /// Auto-detect based on terminal and `NO_COLOR` env
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Debug, Parser)]
#[command(name = "mockop", version, about = "Record, inspect and script mock-op responses")]
struct Cli {
    /// Control color output
    #[arg(long, value_enum, default_value = "auto", global = true)]
    color: ColorMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the commands recorded in a response directory
    List {
        #[arg(long, help = "Path to response directory JSON file")]
        response_dir: Option<PathBuf>,
        #[arg(long, short = 'v', help = "Include additional command response detail")]
        verbose: bool,
        #[arg(long)]
        json: bool,
    },
    /// Record responses described by a generator config
    Generate {
        #[arg(help = "Config file describing responses to generate (.yaml, .yml or .json)")]
        config: PathBuf,
        #[arg(long, short = 'v', help = "Show per-query progress on stderr")]
        verbose: bool,
        #[arg(long)]
        json: bool,
    },
    /// Manage scenario state directories
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        #[arg(value_enum, help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
enum StateCommands {
    /// Register or overwrite the state at an iteration
    Add {
        #[arg(long)]
        state_dir: PathBuf,
        #[arg(
            long,
            help = "Response directory JSON file served in this state (relative to the state directory)"
        )]
        response_dir: PathBuf,
        #[arg(long)]
        iteration: usize,
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        set_env_vars: Vec<(String, String)>,
        #[arg(long = "pop", value_name = "KEY")]
        pop_env_vars: Vec<String>,
    },
    /// Show the configured states and the cursor
    Show {
        #[arg(long)]
        state_dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Put the cursor back on the first state
    Reset {
        #[arg(long)]
        state_dir: PathBuf,
    },
}

/// Configure color output based on CLI flag and environment
fn configure_colors(mode: ColorMode) {
    let use_color = match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            // Respect NO_COLOR environment variable
            if std::env::var("NO_COLOR").is_ok() {
                false
            } else {
                supports_color::on(supports_color::Stream::Stderr).is_some()
            }
        }
    };

    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .color(use_color)
                .unicode(use_color)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_colors(cli.color);
    init_tracing();
    match cli.command {
        Commands::List {
            response_dir,
            verbose,
            json,
        } => cmd_list(response_dir, verbose, json),
        Commands::Generate {
            config,
            verbose,
            json,
        } => cmd_generate(config, verbose, json),
        Commands::State { command } => cmd_state(command),
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

#[derive(Debug, Serialize)]
struct ListReport<'a> {
    index_path: String,
    response_dir: String,
    commands: &'a [ListedCommand],
}

/// Handle the list command.
fn cmd_list(response_dir: Option<PathBuf>, verbose: bool, json: bool) -> Result<()> {
    let directory = match resolve_list_path(response_dir).and_then(ResponseDirectory::open) {
        Ok(directory) => directory,
        Err(err) if json => return emit_error(json, &err),
        Err(err) => {
            eprintln!("Error loading response directory: {err}");
            std::process::exit(err.exit_code());
        }
    };
    let commands = directory.list();
    if json {
        let report = ListReport {
            index_path: directory.index_path().display().to_string(),
            response_dir: directory.blob_root().display().to_string(),
            commands: &commands,
        };
        let payload = serde_json::to_string(&report).into_diagnostic()?;
        println!("{payload}");
        return Ok(());
    }

    println!("Directory path: {}", directory.index_path().display());
    let mut current_bucket = None;
    for command in &commands {
        if let Some(digest) = command.input_digest.as_ref() {
            if current_bucket != Some(digest) {
                println!("For input hash: {digest}:");
                current_bucket = Some(digest);
            }
        }
        if verbose {
            print_command_verbose(&directory, command);
        } else {
            println!("{}", command.fingerprint);
        }
    }
    Ok(())
}

fn print_command_verbose(directory: &ResponseDirectory, command: &ListedCommand) {
    let describe = |path: Option<PathBuf>| {
        path.map_or_else(|| "(empty)".to_string(), |path| path.display().to_string())
    };
    println!("{}", command.fingerprint);
    println!("\toutput: {}", describe(directory.stdout_path(&command.meta)));
    println!("\terror output: {}", describe(directory.stderr_path(&command.meta)));
    println!("\texit status: {}", command.meta.exit_status);
    if command.meta.changes_state {
        println!("\tchanges state: true");
    }
    println!();
}

/// `--response-dir`, else the directory the test double would use.
fn resolve_list_path(response_dir: Option<PathBuf>) -> MockResult<PathBuf> {
    if let Some(path) = response_dir {
        return Ok(path);
    }
    match MockConfig::from_env(&ProcessEnvironment)?.source {
        ResponseSourceConfig::Directory(path) => Ok(path),
        ResponseSourceConfig::StateDir(state_dir) => {
            let store = StateStore::open(state_dir)?;
            let descriptor = store.current()?;
            Ok(store.response_directory_path(descriptor))
        }
    }
}

/// Handle the generate command.
fn cmd_generate(config_path: PathBuf, verbose: bool, json: bool) -> Result<()> {
    let result = load_dot_env(&ProcessEnvironment, RESP_GEN_DOT_ENV_VAR)
        .and_then(|_| GeneratorConfig::load(&config_path));
    let config = match result {
        Ok(config) => config,
        Err(err) => return emit_error(json, &err),
    };
    let mut observer: Box<dyn GenerationObserver> = if verbose {
        Box::new(progress::VerboseProgress::new(config.queries.len()))
    } else {
        Box::new(SilentObserver)
    };
    let report = Generator::new(&config, process_backend(&config)).run(observer.as_mut());
    drop(observer);
    match report {
        Ok(report) => {
            if json {
                let payload = serde_json::to_string(&report).into_diagnostic()?;
                println!("{payload}");
            } else {
                println!(
                    "recorded {} responses into {}",
                    report.recorded.len(),
                    report.index_path.display()
                );
                if let Some(iteration) = report.state_iteration {
                    println!("registered as state {iteration}");
                }
            }
            Ok(())
        }
        Err(err) => emit_error(json, &err),
    }
}

/// Handle the state subcommands.
fn cmd_state(command: StateCommands) -> Result<()> {
    match command {
        StateCommands::Add {
            state_dir,
            response_dir,
            iteration,
            set_env_vars,
            pop_env_vars,
        } => {
            let set_env_vars: BTreeMap<String, String> = set_env_vars.into_iter().collect();
            let pop_env_vars: BTreeSet<String> = pop_env_vars.into_iter().collect();
            let result = StateStore::open_or_create(&state_dir).and_then(|mut store| {
                store.add_state(response_dir, iteration, set_env_vars, pop_env_vars)?;
                Ok(store.states().len())
            });
            match result {
                Ok(count) => {
                    println!("state {iteration} registered ({count} states)");
                    Ok(())
                }
                Err(err) => emit_error(false, &err),
            }
        }
        StateCommands::Show { state_dir, json } => match StateStore::open(&state_dir) {
            Ok(store) => show_state(&store, json),
            Err(err) => emit_error(json, &err),
        },
        StateCommands::Reset { state_dir } => {
            match StateStore::open(&state_dir).and_then(|mut store| store.reset()) {
                Ok(()) => {
                    println!("state cursor reset to 0");
                    Ok(())
                }
                Err(err) => emit_error(false, &err),
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct StateReport<'a> {
    state_dir: String,
    cursor: StateCursor,
    states: &'a [mockop::StateDescriptor],
}

fn show_state(store: &StateStore, json: bool) -> Result<()> {
    if json {
        let report = StateReport {
            state_dir: store.state_dir().display().to_string(),
            cursor: store.cursor(),
            states: store.states(),
        };
        let payload = serde_json::to_string(&report).into_diagnostic()?;
        println!("{payload}");
        return Ok(());
    }
    println!("State directory: {}", store.state_dir().display());
    match store.cursor() {
        StateCursor::Iteration(index) => println!("Cursor: iteration {index}"),
        StateCursor::Exhausted => println!("Cursor: exhausted"),
    }
    for descriptor in store.states() {
        let marker = if store.cursor() == StateCursor::Iteration(descriptor.iteration) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} [{}] {}",
            descriptor.iteration,
            store.response_directory_path(descriptor).display()
        );
        for (key, value) in &descriptor.set_env_vars {
            println!("\tset {key}={value}");
        }
        for key in &descriptor.pop_env_vars {
            println!("\tpop {key}");
        }
    }
    Ok(())
}

fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}

fn emit_error(json: bool, err: &MockError) -> Result<()> {
    if json {
        let payload = serde_json::to_string(&err.to_error_info()).into_diagnostic()?;
        println!("{payload}");
    } else {
        eprintln!("error: {err}");
    }
    std::process::exit(err.exit_code());
}

fn parse_key_val(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
