//! Capturing fixtures from the real tool.
//!
//! A [`RecordingBackend`] executes a command and hands back its raw output. The
//! [`Recorder`] checks the exit status against what the caller expected and
//! turns a matching execution into a [`CommandInvocation`]. A mismatch is a
//! hard `E_RECORDING` error; nothing is retried.

use crate::error::{MockError, MockResult};
use crate::fingerprint::fingerprint;
use crate::model::CommandInvocation;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Raw result of running a command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Execution {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_status: i32,
}

/// Something that can run the real tool.
pub trait RecordingBackend {
    /// Run `argv` (program name excluded), piping `input` when supplied.
    fn execute(&mut self, argv: &[String], input: Option<&[u8]>) -> MockResult<Execution>;
}

/// Runs a real program as a child process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessBackend {
    program: PathBuf,
    env: BTreeMap<String, String>,
}

impl ProcessBackend {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            env: BTreeMap::new(),
        }
    }

    /// Extra environment for every execution.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_envs<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(key, value)| (key.into(), value.into())));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl RecordingBackend for ProcessBackend {
    fn execute(&mut self, argv: &[String], input: Option<&[u8]>) -> MockResult<Execution> {
        let program = self.program.display().to_string();
        let spawn_failed = |err: std::io::Error| {
            MockError::recording(
                "failed to run the real program",
                serde_json::json!({ "program": program, "source": err.to_string() }),
            )
        };
        let mut child = Command::new(&self.program)
            .args(argv)
            .envs(&self.env)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_failed)?;

        let writer = match (input, child.stdin.take()) {
            (Some(input), Some(mut stdin)) => {
                let input = input.to_vec();
                Some(std::thread::spawn(move || stdin.write_all(&input)))
            }
            _ => None,
        };
        let output = child.wait_with_output().map_err(spawn_failed)?;
        if let Some(writer) = writer {
            // A child that exits without reading its input closes the pipe early.
            if let Ok(Err(err)) = writer.join() {
                debug!(program = %program, error = %err, "input not fully consumed");
            }
        }
        Ok(Execution {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_status: output.status.code().unwrap_or(-1),
        })
    }
}

/// One fixture to capture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordRequest {
    /// Record label, also the blob subdirectory name.
    pub name: String,
    /// Arguments actually executed.
    pub run_argv: Vec<String>,
    /// Arguments the fixture is stored under, when different from `run_argv`.
    pub record_argv: Option<Vec<String>>,
    pub input: Option<Vec<u8>>,
    pub expected_exit: i32,
    pub changes_state: bool,
}

impl RecordRequest {
    pub fn new<S: Into<String>>(name: impl Into<String>, run_argv: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            run_argv: run_argv.into_iter().map(Into::into).collect(),
            record_argv: None,
            input: None,
            expected_exit: 0,
            changes_state: false,
        }
    }

    /// Store the fixture under different arguments than the ones executed.
    #[must_use]
    pub fn recorded_as<S: Into<String>>(mut self, argv: impl IntoIterator<Item = S>) -> Self {
        self.record_argv = Some(argv.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    #[must_use]
    pub fn expect_exit(mut self, expected_exit: i32) -> Self {
        self.expected_exit = expected_exit;
        self
    }

    #[must_use]
    pub fn changes_state(mut self, changes_state: bool) -> Self {
        self.changes_state = changes_state;
        self
    }

    /// Arguments the fixture will be replayed under.
    pub fn key(&self) -> &[String] {
        self.record_argv.as_deref().unwrap_or(&self.run_argv)
    }
}

/// Runs record requests against a backend.
#[derive(Debug)]
pub struct Recorder<B> {
    backend: B,
}

impl<B: RecordingBackend> Recorder<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Execute the request and build the invocation to store.
    pub fn record(&mut self, request: RecordRequest) -> MockResult<CommandInvocation> {
        let execution = self
            .backend
            .execute(&request.run_argv, request.input.as_deref())?;
        let command = fingerprint(&request.run_argv);
        if execution.exit_status != request.expected_exit {
            let captured = if execution.exit_status == 0 {
                &execution.stdout
            } else {
                &execution.stderr
            };
            let captured = String::from_utf8_lossy(captured).into_owned();
            warn!(
                name = %request.name,
                command = %command,
                expected = request.expected_exit,
                actual = execution.exit_status,
                output = %captured,
                "unexpected exit status while recording"
            );
            return Err(MockError::recording(
                format!(
                    "command [{command}] exited with {} (expected {})",
                    execution.exit_status, request.expected_exit
                ),
                serde_json::json!({
                    "name": request.name,
                    "command": command,
                    "expected_exit": request.expected_exit,
                    "exit_status": execution.exit_status,
                    "output": captured,
                }),
            ));
        }
        info!(
            name = %request.name,
            command = %command,
            exit_status = execution.exit_status,
            "query recorded"
        );
        let RecordRequest {
            name,
            run_argv,
            record_argv,
            input,
            changes_state,
            ..
        } = request;
        let mut invocation = CommandInvocation::new(
            record_argv.unwrap_or(run_argv),
            execution.stdout,
            execution.stderr,
            execution.exit_status,
            name,
        )
        .mutating(changes_state);
        if let Some(input) = input {
            invocation = invocation.with_input(input);
        }
        Ok(invocation)
    }
}
