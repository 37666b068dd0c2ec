use crate::fingerprint::{fingerprint, InputDigest};

/// One recorded command and the behavior it produced.
///
/// Built by the recorder after a real execution and immutable afterwards. The
/// `key` is the command's argv with the program token removed; it must match
/// what the test double later receives byte for byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandInvocation {
    key: Vec<String>,
    input: Option<Vec<u8>>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_status: i32,
    label: String,
    mutates_state: bool,
}

impl CommandInvocation {
    pub fn new(
        key: Vec<String>,
        stdout: impl Into<Vec<u8>>,
        stderr: impl Into<Vec<u8>>,
        exit_status: i32,
        label: impl Into<String>,
    ) -> Self {
        Self {
            key,
            input: None,
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_status,
            label: label.into(),
            mutates_state: false,
        }
    }

    /// Record the piped input this response depends on.
    #[must_use]
    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Mark whether replaying this response advances the scenario state.
    #[must_use]
    pub fn mutating(mut self, mutates_state: bool) -> Self {
        self.mutates_state = mutates_state;
        self
    }

    pub fn key(&self) -> &[String] {
        &self.key
    }

    pub fn input(&self) -> Option<&[u8]> {
        self.input.as_deref()
    }

    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    pub fn exit_status(&self) -> i32 {
        self.exit_status
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn mutates_state(&self) -> bool {
        self.mutates_state
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.key)
    }

    pub fn input_digest(&self) -> Option<InputDigest> {
        self.input.as_deref().map(InputDigest::of)
    }
}
