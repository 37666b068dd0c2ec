//! Error taxonomy shared by the engine, the dispatcher and the tooling.
//!
//! Every failure carries a stable [`ErrorCode`], a human-readable message and
//! optional structured JSON context. None of these errors are retried inside
//! the crate; they surface to the top-level command entry point.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Result alias used across the crate.
pub type MockResult<T> = Result<T, MockError>;

/// Stable error codes with their process exit status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Malformed or missing index, or an index referencing a missing blob.
    DirectoryLoad,
    /// An entry already exists at the slot and overwriting was not permitted.
    DuplicateResponse,
    /// No recorded response matches the command (and input).
    ResponseLookup,
    /// The scenario ran past its last scripted state.
    StateExhausted,
    /// The real backend returned an unexpected exit status while recording.
    Recording,
    /// Invalid state configuration (out-of-order iteration, malformed file).
    StateConfig,
    /// Invalid configuration (conflicting variables, bad generator config).
    Config,
    /// Signin simulation misconfigured or refused.
    Signin,
    /// Filesystem failure.
    Io,
    /// Invalid command-line usage.
    CliInvalidArg,
}

impl ErrorCode {
    /// All codes, in exit-status order.
    pub const ALL: [Self; 10] = [
        Self::DirectoryLoad,
        Self::DuplicateResponse,
        Self::ResponseLookup,
        Self::StateExhausted,
        Self::Recording,
        Self::StateConfig,
        Self::Config,
        Self::Signin,
        Self::Io,
        Self::CliInvalidArg,
    ];

    /// Wire form of the code, e.g. `E_RESPONSE_LOOKUP`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectoryLoad => "E_DIRECTORY_LOAD",
            Self::DuplicateResponse => "E_DUPLICATE_RESPONSE",
            Self::ResponseLookup => "E_RESPONSE_LOOKUP",
            Self::StateExhausted => "E_STATE_EXHAUSTED",
            Self::Recording => "E_RECORDING",
            Self::StateConfig => "E_STATE_CONFIG",
            Self::Config => "E_CONFIG",
            Self::Signin => "E_SIGNIN",
            Self::Io => "E_IO",
            Self::CliInvalidArg => "E_CLI_INVALID_ARG",
        }
    }

    /// Parse the wire form back into a code.
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == code)
    }

    /// Process exit status for this code.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::DirectoryLoad => 2,
            Self::DuplicateResponse => 3,
            Self::ResponseLookup => 4,
            Self::StateExhausted => 5,
            Self::Recording => 6,
            Self::StateConfig => 7,
            Self::Config => 8,
            Self::Signin => 9,
            Self::Io => 10,
            Self::CliInvalidArg => 11,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable error payload for `--json` output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Wire form of the error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Structured context, if any.
    #[serde(default)]
    pub context: Option<Value>,
}

/// The crate's error type.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct MockError {
    pub code: ErrorCode,
    pub message: String,
    pub context: Option<Value>,
}

impl MockError {
    pub fn new(
        code: ErrorCode,
        message: impl Into<String>,
        context: impl Into<Option<Value>>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            context: context.into(),
        }
    }

    pub fn directory_load(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::DirectoryLoad, message, context)
    }

    pub fn duplicate_response(
        message: impl Into<String>,
        context: impl Into<Option<Value>>,
    ) -> Self {
        Self::new(ErrorCode::DuplicateResponse, message, context)
    }

    pub fn response_lookup(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::ResponseLookup, message, context)
    }

    pub fn state_exhausted(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::StateExhausted, message, context)
    }

    pub fn recording(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::Recording, message, context)
    }

    pub fn state_config(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::StateConfig, message, context)
    }

    pub fn config(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::Config, message, context)
    }

    pub fn signin(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Signin, message, None)
    }

    pub fn cli_invalid_arg(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CliInvalidArg, message, None)
    }

    /// Wrap an underlying failure, keeping its text under `context.source`.
    pub fn io(code: ErrorCode, message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(
            code,
            message,
            Some(serde_json::json!({ "source": err.to_string() })),
        )
    }

    /// Attach a path to the context, keeping any fields already present.
    #[must_use]
    pub fn with_path(mut self, path: &std::path::Path) -> Self {
        let path = Value::String(path.display().to_string());
        match self.context {
            Some(Value::Object(ref mut obj)) => {
                obj.insert("path".to_string(), path);
            }
            _ => self.context = Some(serde_json::json!({ "path": path })),
        }
        self
    }

    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }

    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.code.as_str().to_string(),
            message: self.message.clone(),
            context: self.context.clone(),
        }
    }
}

impl Diagnostic for MockError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code))
    }
}
