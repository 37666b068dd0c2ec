//! Replay: turn an incoming argv (and piped input) into recorded output.
//!
//! The dispatcher answers `signin` itself and resolves every other command
//! against its response source. Under a state store it re-applies the current
//! state's environment first, since each test double run is a fresh process,
//! and advances the store after serving a record marked `changes_state`.

mod signin;

pub use signin::{respond_signin, MissingAccountPolicy, SigninArgs, TOKEN_LEN};

use crate::config::{MockConfig, ResponseSourceConfig};
use crate::directory::ResponseDirectory;
use crate::env::Environment;
use crate::error::MockResult;
use crate::model::CommandInvocation;
use crate::state::StateStore;
use tracing::debug;

/// Token that routes a command to the signin simulation.
pub const SIGNIN_COMMAND: &str = "signin";

/// What the test double writes and exits with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_status: i32,
}

impl From<CommandInvocation> for DispatchOutcome {
    fn from(invocation: CommandInvocation) -> Self {
        Self {
            stdout: invocation.stdout().to_vec(),
            stderr: invocation.stderr().to_vec(),
            exit_status: invocation.exit_status(),
        }
    }
}

/// Where responses come from.
#[derive(Debug)]
pub enum ResponseSource {
    /// One fixed response directory; `changes_state` is ignored.
    Directory(ResponseDirectory),
    /// A scripted sequence of response directories.
    State(StateStore),
}

impl ResponseSource {
    pub fn from_config(config: &MockConfig) -> MockResult<Self> {
        Ok(match &config.source {
            ResponseSourceConfig::Directory(path) => Self::Directory(ResponseDirectory::open(path)?),
            ResponseSourceConfig::StateDir(path) => Self::State(StateStore::open(path)?),
        })
    }
}

/// Resolves invocations against a response source.
#[derive(Debug)]
pub struct Dispatcher {
    source: ResponseSource,
    missing_account: MissingAccountPolicy,
}

impl Dispatcher {
    pub fn new(source: ResponseSource) -> Self {
        Self {
            source,
            missing_account: MissingAccountPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_missing_account_policy(mut self, policy: MissingAccountPolicy) -> Self {
        self.missing_account = policy;
        self
    }

    pub fn source(&self) -> &ResponseSource {
        &self.source
    }

    pub fn into_source(self) -> ResponseSource {
        self.source
    }

    /// Produce the recorded response for `argv`.
    pub fn respond<S: AsRef<str>>(
        &mut self,
        argv: &[S],
        input: Option<&[u8]>,
        env: &mut dyn Environment,
    ) -> MockResult<DispatchOutcome> {
        if let ResponseSource::State(store) = &self.source {
            store.apply_current(env)?;
        }
        if argv.iter().any(|arg| arg.as_ref() == SIGNIN_COMMAND) {
            return respond_signin(argv, env, self.missing_account);
        }
        match &mut self.source {
            ResponseSource::Directory(directory) => Ok(directory.lookup(argv, input)?.into()),
            ResponseSource::State(store) => {
                let directory = store.open_current_directory()?;
                let invocation = directory.lookup(argv, input)?;
                if invocation.mutates_state() {
                    let cursor = store.advance(env)?;
                    debug!(name = invocation.label(), cursor = ?cursor, "mutating response served");
                }
                Ok(invocation.into())
            }
        }
    }
}
