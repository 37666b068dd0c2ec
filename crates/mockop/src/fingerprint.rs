//! Invocation fingerprints and input digests.
//!
//! A fingerprint is the shell-quoted join of an argument vector (program name
//! excluded). Splitting it with shell rules reproduces the original vector
//! exactly, so the index stays human-readable without losing information.
//! Element order is part of the identity.
//!
//! Commands that read piped input are additionally keyed by an [`InputDigest`],
//! the lowercase hex SHA-256 of the input bytes.

use crate::error::{MockError, MockResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Canonical lookup key for an argument vector.
pub fn fingerprint<S: AsRef<str>>(argv: &[S]) -> String {
    shell_words::join(argv.iter().map(AsRef::as_ref))
}

/// Recover the argument vector a fingerprint was built from.
pub fn parse_fingerprint(fingerprint: &str) -> MockResult<Vec<String>> {
    shell_words::split(fingerprint).map_err(|err| {
        MockError::directory_load(
            "malformed command fingerprint",
            serde_json::json!({ "fingerprint": fingerprint, "source": err.to_string() }),
        )
    })
}

/// Content digest of piped input.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputDigest(String);

impl InputDigest {
    /// Digest `input`. Empty input has a fixed digest of its own; it is not the
    /// same as supplying no input at all.
    pub fn of(input: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(input)))
    }

    /// Wrap an already computed digest string (e.g. read from an index).
    pub fn from_hex(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InputDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Digest of optional input; `None` stays `None`.
pub fn digest_input(input: Option<&[u8]>) -> Option<InputDigest> {
    input.map(InputDigest::of)
}
