use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Current state config format version.
pub const STATE_CONFIG_VERSION: u32 = 1;

/// One scripted backend state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDescriptor {
    /// Position in the scenario chain.
    pub iteration: usize,
    /// Response directory index serving this state. Relative paths resolve
    /// against the state directory.
    pub response_directory: PathBuf,
    /// Variables set when entering this state.
    #[serde(default)]
    pub set_env_vars: BTreeMap<String, String>,
    /// Variables removed when entering this state.
    #[serde(default)]
    pub pop_env_vars: BTreeSet<String>,
}

/// Ordered chain of states, as stored in `state-config.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateConfig {
    pub state_config_version: u32,
    #[serde(default)]
    pub states: Vec<StateDescriptor>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            state_config_version: STATE_CONFIG_VERSION,
            states: Vec::new(),
        }
    }
}

/// Position in the scenario, as stored in `state-cursor.json`.
///
/// Serialized as `{"iteration": 2}` or `"exhausted"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCursor {
    Iteration(usize),
    Exhausted,
}

impl Default for StateCursor {
    fn default() -> Self {
        Self::Iteration(0)
    }
}
