//! Environment-driven configuration for the test double and the tooling.

use crate::env::Environment;
use crate::error::{ErrorCode, MockError, MockResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Response directory index path override.
pub const RESPONSE_DIRECTORY_VAR: &str = "MOCK_OP_RESPONSE_DIRECTORY";
/// State directory override; excludes [`RESPONSE_DIRECTORY_VAR`].
pub const STATE_DIR_VAR: &str = "MOCK_OP_STATE_DIR";
/// Signin outcome, `0` or `1`.
pub const SIGNIN_SUCCEED_VAR: &str = "MOCK_OP_SIGNIN_SUCCEED";
/// Account identifier used when `--account` is absent.
pub const SIGNIN_SHORTHAND_VAR: &str = "MOCK_OP_SIGNIN_SHORTHAND";
/// Whether biometric auth is assumed when no account is known, `0` or `1`.
pub const SIGNIN_USES_BIO_VAR: &str = "MOCK_OP_SIGNIN_USES_BIO";
/// Policy for signin without account and without biometrics.
pub const SIGNIN_MISSING_ACCOUNT_VAR: &str = "MOCK_OP_SIGNIN_MISSING_ACCOUNT";
/// Read piped input from this file instead of stdin.
pub const READ_INPUT_FILE_VAR: &str = "MOCK_OP_READ_INPUT_FILE";
/// Dotenv file for the test double.
pub const MOCK_OP_DOT_ENV_VAR: &str = "MOCK_OP_DOT_ENV_FILE";
/// Dotenv file for the response generator.
pub const RESP_GEN_DOT_ENV_VAR: &str = "RESP_GEN_DOT_ENV_FILE";
/// Tracing filter for the test double.
pub const MOCK_OP_LOG_VAR: &str = "MOCK_OP_LOG";

/// Dotenv file used when no override is set.
pub const DEFAULT_DOT_ENV_FILE: &str = ".env";

/// Where the test double finds its responses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseSourceConfig {
    /// A single response directory index.
    Directory(PathBuf),
    /// A state directory selecting among several response directories.
    StateDir(PathBuf),
}

/// Resolved configuration of the test double.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockConfig {
    pub source: ResponseSourceConfig,
    /// File to read piped input from instead of stdin.
    pub read_input_file: Option<PathBuf>,
}

impl MockConfig {
    /// Resolve the configuration from environment variables.
    ///
    /// Setting both the response directory and the state directory is an
    /// `E_CONFIG` error. With neither, the index defaults to
    /// `$HOME/.config/mock-op/response-directory.json`.
    pub fn from_env(env: &dyn Environment) -> MockResult<Self> {
        let response_directory = non_empty(env, RESPONSE_DIRECTORY_VAR);
        let state_dir = non_empty(env, STATE_DIR_VAR);
        let source = match (response_directory, state_dir) {
            (Some(_), Some(_)) => {
                return Err(MockError::config(
                    format!("{RESPONSE_DIRECTORY_VAR} and {STATE_DIR_VAR} are mutually exclusive"),
                    None,
                ))
            }
            (Some(path), None) => ResponseSourceConfig::Directory(PathBuf::from(path)),
            (None, Some(path)) => ResponseSourceConfig::StateDir(PathBuf::from(path)),
            (None, None) => ResponseSourceConfig::Directory(default_response_directory(env)?),
        };
        Ok(Self {
            source,
            read_input_file: non_empty(env, READ_INPUT_FILE_VAR).map(PathBuf::from),
        })
    }
}

/// `$HOME/.config/mock-op/response-directory.json`.
pub fn default_response_directory(env: &dyn Environment) -> MockResult<PathBuf> {
    let home = non_empty(env, "HOME").ok_or_else(|| {
        MockError::config(
            format!("HOME is not set; set {RESPONSE_DIRECTORY_VAR} or {STATE_DIR_VAR}"),
            None,
        )
    })?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("mock-op")
        .join("response-directory.json"))
}

/// Load the dotenv file named by `override_var` (or `.env`) if it exists.
///
/// Variables already present in the process environment are kept. Returns
/// the path that was loaded, if any.
pub fn load_dot_env(env: &dyn Environment, override_var: &str) -> MockResult<Option<PathBuf>> {
    let path = non_empty(env, override_var).map_or_else(|| PathBuf::from(DEFAULT_DOT_ENV_FILE), PathBuf::from);
    if !path.is_file() {
        return Ok(None);
    }
    load_dot_env_file(&path)?;
    Ok(Some(path))
}

fn load_dot_env_file(path: &Path) -> MockResult<()> {
    dotenvy::from_path(path).map_err(|err| {
        MockError::io(ErrorCode::Config, "failed to load dotenv file", err).with_path(path)
    })?;
    debug!(path = %path.display(), "dotenv file loaded");
    Ok(())
}

fn non_empty(env: &dyn Environment, key: &str) -> Option<String> {
    env.get(key).filter(|value| !value.is_empty())
}
