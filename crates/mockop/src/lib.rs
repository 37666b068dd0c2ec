//! mockop: a stateful record-and-replay engine for command-line test doubles.
//!
//! Real command executions are recorded once into a response directory and
//! replayed byte for byte afterwards, keyed by the command's argument vector
//! (and, for commands that read piped input, by a digest of that input). A
//! state store chains several response directories so a create, edit, delete
//! sequence can replay a different answer at each step behind an identical
//! command surface.

#![forbid(unsafe_code)]
// Public entry points carry docs; plain accessors and error constructors do not.
#![allow(missing_docs)]

pub mod config;
pub mod directory;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod fingerprint;
pub mod generator;
pub mod model;
pub mod recording;
pub mod state;
mod storage;

pub use crate::config::{MockConfig, ResponseSourceConfig};
pub use crate::directory::{DirectoryLayout, ListedCommand, ResponseDirectory, Staging};
pub use crate::dispatch::{DispatchOutcome, Dispatcher, MissingAccountPolicy, ResponseSource};
pub use crate::env::{Environment, MemoryEnvironment, ProcessEnvironment};
pub use crate::error::{ErrorCode, ErrorInfo, MockError, MockResult};
pub use crate::fingerprint::{digest_input, fingerprint, parse_fingerprint, InputDigest};
pub use crate::model::*;
pub use crate::recording::{Execution, ProcessBackend, RecordRequest, Recorder, RecordingBackend};
pub use crate::state::{StateStore, STATE_CONFIG_FILE, STATE_CURSOR_FILE};
