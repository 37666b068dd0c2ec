//! Scripted scenario states.
//!
//! A state store is a directory holding `state-config.json` (the ordered chain
//! of states, each pointing at a response directory) and `state-cursor.json`
//! (which state is current). States form a strict line,
//! `0 -> 1 -> ... -> N-1 -> exhausted`, and only the dispatcher moves along it.
//!
//! The store never owns the response directories it points at; removing a
//! store deletes its own two files and nothing else.

use crate::directory::ResponseDirectory;
use crate::env::Environment;
use crate::error::{ErrorCode, MockError, MockResult};
use crate::model::{StateConfig, StateCursor, StateDescriptor, STATE_CONFIG_VERSION};
use crate::storage::{load_json_file, load_json_file_optional, resolve_relative, write_json_atomic};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the state chain inside a state directory.
pub const STATE_CONFIG_FILE: &str = "state-config.json";
/// File name of the persisted cursor inside a state directory.
pub const STATE_CURSOR_FILE: &str = "state-cursor.json";

/// A loaded state store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateStore {
    state_dir: PathBuf,
    config: StateConfig,
    cursor: StateCursor,
}

impl StateStore {
    /// Load an existing store. A missing cursor file means iteration 0.
    pub fn open(state_dir: impl Into<PathBuf>) -> MockResult<Self> {
        let state_dir = state_dir.into();
        let config_path = state_dir.join(STATE_CONFIG_FILE);
        if !config_path.is_file() {
            return Err(MockError::state_config(
                "state config not found",
                serde_json::json!({ "path": config_path.display().to_string() }),
            ));
        }
        let config: StateConfig = load_json_file(&config_path, "state config", ErrorCode::StateConfig)?;
        validate_config(&config)?;
        let cursor = load_json_file_optional(
            &state_dir.join(STATE_CURSOR_FILE),
            "state cursor",
            ErrorCode::StateConfig,
        )?
        .unwrap_or_default();
        debug!(
            state_dir = %state_dir.display(),
            states = config.states.len(),
            cursor = ?cursor,
            "state store loaded"
        );
        Ok(Self {
            state_dir,
            config,
            cursor,
        })
    }

    /// Load the store in `state_dir`, or start an empty one (no states,
    /// cursor at 0) when none exists. The files are written by the first
    /// [`Self::add_state`].
    pub fn open_or_create(state_dir: impl Into<PathBuf>) -> MockResult<Self> {
        let state_dir = state_dir.into();
        if state_dir.join(STATE_CONFIG_FILE).exists() {
            return Self::open(state_dir);
        }
        Ok(Self {
            state_dir,
            config: StateConfig::default(),
            cursor: StateCursor::default(),
        })
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join(STATE_CONFIG_FILE)
    }

    pub fn cursor_path(&self) -> PathBuf {
        self.state_dir.join(STATE_CURSOR_FILE)
    }

    pub fn states(&self) -> &[StateDescriptor] {
        &self.config.states
    }

    pub fn cursor(&self) -> StateCursor {
        self.cursor
    }

    /// Register the state at `iteration`, or overwrite it if it exists.
    ///
    /// `iteration` may be at most the current number of states: equal appends,
    /// lower overwrites, higher would skip a state and is rejected.
    pub fn add_state(
        &mut self,
        response_directory: impl Into<PathBuf>,
        iteration: usize,
        set_env_vars: BTreeMap<String, String>,
        pop_env_vars: BTreeSet<String>,
    ) -> MockResult<()> {
        let count = self.config.states.len();
        if iteration > count {
            return Err(MockError::state_config(
                "state iteration out of sequence",
                serde_json::json!({ "iteration": iteration, "next_iteration": count }),
            ));
        }
        let descriptor = StateDescriptor {
            iteration,
            response_directory: response_directory.into(),
            set_env_vars,
            pop_env_vars,
        };
        match self.config.states.get_mut(iteration) {
            Some(slot) => *slot = descriptor,
            None => self.config.states.push(descriptor),
        }
        write_json_atomic(&self.config_path(), &self.config, "state config")?;
        if !self.cursor_path().exists() {
            self.persist_cursor()?;
        }
        info!(
            state_dir = %self.state_dir.display(),
            iteration,
            states = self.config.states.len(),
            "state registered"
        );
        Ok(())
    }

    /// The descriptor at the cursor.
    pub fn current(&self) -> MockResult<&StateDescriptor> {
        match self.cursor {
            StateCursor::Exhausted => Err(self.exhausted()),
            StateCursor::Iteration(index) => self.config.states.get(index).ok_or_else(|| {
                MockError::state_config(
                    "state cursor does not point at a configured state",
                    serde_json::json!({
                        "iteration": index,
                        "states": self.config.states.len(),
                        "state_dir": self.state_dir.display().to_string(),
                    }),
                )
            }),
        }
    }

    /// Index path of a descriptor's response directory.
    pub fn response_directory_path(&self, descriptor: &StateDescriptor) -> PathBuf {
        resolve_relative(&self.state_dir, &descriptor.response_directory)
    }

    /// Open the current state's response directory.
    pub fn open_current_directory(&self) -> MockResult<ResponseDirectory> {
        let descriptor = self.current()?;
        ResponseDirectory::open(self.response_directory_path(descriptor))
    }

    /// Apply the current state's environment side effects.
    pub fn apply_current(&self, env: &mut dyn Environment) -> MockResult<()> {
        apply_descriptor(self.current()?, env);
        Ok(())
    }

    /// Move to the next state and apply its environment side effects.
    ///
    /// Advancing from the last state leaves the store exhausted; advancing an
    /// exhausted store is an `E_STATE_EXHAUSTED` error.
    pub fn advance(&mut self, env: &mut dyn Environment) -> MockResult<StateCursor> {
        let StateCursor::Iteration(index) = self.cursor else {
            return Err(self.exhausted());
        };
        let next = index + 1;
        self.cursor = match self.config.states.get(next) {
            Some(descriptor) => {
                apply_descriptor(descriptor, env);
                StateCursor::Iteration(next)
            }
            None => StateCursor::Exhausted,
        };
        self.persist_cursor()?;
        info!(
            state_dir = %self.state_dir.display(),
            from = index,
            to = ?self.cursor,
            "state advanced"
        );
        Ok(self.cursor)
    }

    /// Put the cursor back on the first state.
    pub fn reset(&mut self) -> MockResult<()> {
        self.cursor = StateCursor::default();
        self.persist_cursor()?;
        info!(state_dir = %self.state_dir.display(), "state cursor reset");
        Ok(())
    }

    /// Delete the store's own files. Referenced response directories stay.
    pub fn remove(self) -> MockResult<()> {
        for path in [self.config_path(), self.cursor_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(
                        MockError::io(ErrorCode::Io, "failed to remove state file", err)
                            .with_path(&path),
                    )
                }
            }
        }
        Ok(())
    }

    fn persist_cursor(&self) -> MockResult<()> {
        write_json_atomic(&self.cursor_path(), &self.cursor, "state cursor")
    }

    fn exhausted(&self) -> MockError {
        MockError::state_exhausted(
            "scenario has run past its last state",
            serde_json::json!({
                "states": self.config.states.len(),
                "state_dir": self.state_dir.display().to_string(),
            }),
        )
    }
}

fn apply_descriptor(descriptor: &StateDescriptor, env: &mut dyn Environment) {
    for (key, value) in &descriptor.set_env_vars {
        env.set(key, value);
    }
    for key in &descriptor.pop_env_vars {
        env.unset(key);
    }
}

fn validate_config(config: &StateConfig) -> MockResult<()> {
    if config.state_config_version != STATE_CONFIG_VERSION {
        return Err(MockError::state_config(
            "unsupported state config version",
            serde_json::json!({
                "found": config.state_config_version,
                "supported": STATE_CONFIG_VERSION,
            }),
        ));
    }
    for (position, descriptor) in config.states.iter().enumerate() {
        if descriptor.iteration != position {
            return Err(MockError::state_config(
                "state iterations must run 0, 1, 2, ... without gaps",
                serde_json::json!({ "position": position, "iteration": descriptor.iteration }),
            ));
        }
    }
    Ok(())
}
