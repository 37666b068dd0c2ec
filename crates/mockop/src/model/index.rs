use crate::model::OrderedMap;
use serde::{Deserialize, Serialize};

/// File name of the stdout blob inside a record's subdirectory.
pub const STDOUT_BLOB: &str = "output";
/// File name of the stderr blob inside a record's subdirectory.
pub const STDERR_BLOB: &str = "error_output";

/// On-disk shape of a response directory index.
///
/// ```json
/// {
///   "response_dir": "responses",
///   "input_dir": "inputs",
///   "commands": { "item get foo": { "name": "get-foo", ... } },
///   "commands_with_input": { "<sha256>": { "item delete -": { ... } } }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseIndex {
    /// Blob root, relative to the index file unless absolute.
    pub response_dir: String,
    /// Optional root for stored input payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_dir: Option<String>,
    /// Input-independent responses keyed by fingerprint, in recording order.
    #[serde(default)]
    pub commands: OrderedMap<ResponseMeta>,
    /// Input-dependent responses: input digest, then fingerprint.
    #[serde(default)]
    pub commands_with_input: OrderedMap<OrderedMap<ResponseMeta>>,
}

/// Metadata for one recorded response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Record label; also names the blob subdirectory.
    pub name: String,
    /// Stdout blob file name, absent when stdout was empty.
    #[serde(default)]
    pub stdout: Option<String>,
    /// Stderr blob file name, absent when stderr was empty.
    #[serde(default)]
    pub stderr: Option<String>,
    pub exit_status: i32,
    #[serde(default, alias = "changes-state")]
    pub changes_state: bool,
}
