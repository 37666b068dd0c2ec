//! mock-op: replays recorded responses in place of the real tool.
//!
//! Every argument is taken verbatim and resolved against the configured
//! response directory or state directory. Output and exit status are the
//! recorded ones; nothing else is written unless `MOCK_OP_LOG` is set.

// CLI-specific lint allowances (CLI binary, not library)
#![allow(missing_docs)]
#![allow(clippy::print_stderr)] // Lookup failures go to stderr
#![allow(clippy::exit)] // CLI uses exit codes

use mockop::config::{load_dot_env, MockConfig, MOCK_OP_DOT_ENV_VAR, MOCK_OP_LOG_VAR};
use mockop::{
    DispatchOutcome, Dispatcher, Environment, InputDigest, MissingAccountPolicy, MockError,
    MockResult, ProcessEnvironment, ResponseSource,
};
use std::io::{self, IsTerminal, Read, Write};
use tracing_subscriber::EnvFilter;

/// Exit status for every engine failure.
const LOOKUP_FAILURE_STATUS: i32 = -1;

fn main() {
    let argv: Vec<String> = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    let mut env = ProcessEnvironment;
    let loaded = load_dot_env(&env, MOCK_OP_DOT_ENV_VAR);
    init_tracing(&env);

    let input = match loaded.and_then(|_| read_input(&env)) {
        Ok(input) => input,
        Err(err) => fail(&err, None),
    };
    match respond(&argv, input.as_deref(), &mut env) {
        Ok(outcome) => {
            let mut stdout = io::stdout().lock();
            let mut stderr = io::stderr().lock();
            // A closed pipe on the reader's side is not our failure.
            let _ = stdout.write_all(&outcome.stdout).and_then(|()| stdout.flush());
            let _ = stderr.write_all(&outcome.stderr).and_then(|()| stderr.flush());
            std::process::exit(outcome.exit_status);
        }
        Err(err) => fail(&err, input.as_deref()),
    }
}

fn fail(err: &MockError, input: Option<&[u8]>) -> ! {
    eprintln!("{}", failure_message(err, input));
    std::process::exit(LOOKUP_FAILURE_STATUS);
}

fn respond(
    argv: &[String],
    input: Option<&[u8]>,
    env: &mut dyn Environment,
) -> MockResult<DispatchOutcome> {
    let config = MockConfig::from_env(env)?;
    let policy = MissingAccountPolicy::from_env(env)?;
    let source = ResponseSource::from_config(&config)?;
    Dispatcher::new(source)
        .with_missing_account_policy(policy)
        .respond(argv, input, env)
}

/// Piped input: `MOCK_OP_READ_INPUT_FILE` if set, else stdin unless it is a terminal.
fn read_input(env: &dyn Environment) -> MockResult<Option<Vec<u8>>> {
    let config_file = MockConfig::from_env(env)
        .ok()
        .and_then(|config| config.read_input_file);
    if let Some(path) = config_file {
        return std::fs::read(&path).map(Some).map_err(|err| {
            MockError::io(mockop::ErrorCode::Io, "failed to read input file", err).with_path(&path)
        });
    }
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut data = Vec::new();
    stdin
        .lock()
        .read_to_end(&mut data)
        .map_err(|err| MockError::io(mockop::ErrorCode::Io, "failed to read stdin", err))?;
    Ok(Some(data))
}

fn failure_message(err: &MockError, input: Option<&[u8]>) -> String {
    match input {
        Some(input) => format!(
            "Error looking up response: [{}], with input hash: {}",
            err.message,
            InputDigest::of(input)
        ),
        None => format!("Error looking up response: [{}]", err.message),
    }
}

/// Stderr is replayed output, so logging stays off unless `MOCK_OP_LOG` is set.
fn init_tracing(env: &dyn Environment) {
    let Some(directives) = env.get(MOCK_OP_LOG_VAR).filter(|value| !value.is_empty()) else {
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directives))
        .with_writer(io::stderr)
        .try_init();
}
