//! Persistent index of recorded responses and the blob store behind it.
//!
//! A response directory is a JSON index file plus a blob root holding one
//! subdirectory per record (named after the record) with its stdout and stderr
//! bytes. Responses are keyed by invocation fingerprint; responses that depend
//! on piped input are additionally bucketed by input digest.
//!
//! # Key Types
//!
//! - [`ResponseDirectory`] - Load, query, extend and save a directory
//! - [`DirectoryLayout`] - Where blobs go when a directory is first created
//! - [`ListedCommand`] - One row of [`ResponseDirectory::list`]
//! - [`Staging`] - All-or-nothing batch of records
//!
//! # Failure Model
//!
//! Corruption is caught at load time: a malformed index, a malformed
//! fingerprint, an unsafe record name or an index entry whose blob file is
//! missing all fail [`ResponseDirectory::open`] with `E_DIRECTORY_LOAD`, before
//! any lookup runs. A command with no recorded response fails lookup with
//! `E_RESPONSE_LOOKUP`; nothing is ever defaulted.

mod staging;

pub use staging::Staging;

use crate::error::{ErrorCode, MockError, MockResult};
use crate::fingerprint::{fingerprint, parse_fingerprint, InputDigest};
use crate::model::{
    CommandInvocation, OrderedMap, ResponseIndex, ResponseMeta, STDERR_BLOB, STDOUT_BLOB,
};
use crate::storage::{load_json_file, parent_dir, resolve_relative, write_atomic, write_json_atomic};
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Blob locations used when a directory is created from scratch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryLayout {
    /// Blob root, stored in the index as given.
    pub response_dir: PathBuf,
    /// Optional root for stored input payloads.
    pub input_dir: Option<PathBuf>,
}

impl DirectoryLayout {
    pub fn new(response_dir: impl Into<PathBuf>) -> Self {
        Self {
            response_dir: response_dir.into(),
            input_dir: None,
        }
    }

    #[must_use]
    pub fn with_input_dir(mut self, input_dir: impl Into<PathBuf>) -> Self {
        self.input_dir = Some(input_dir.into());
        self
    }
}

/// One entry of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListedCommand {
    pub fingerprint: String,
    /// Digest bucket, for input-dependent responses.
    pub input_digest: Option<InputDigest>,
    pub meta: ResponseMeta,
}

impl ListedCommand {
    /// The recorded argv, recovered from the fingerprint.
    pub fn argv(&self) -> MockResult<Vec<String>> {
        parse_fingerprint(&self.fingerprint)
    }
}

/// Blobs of a record that has been added but not yet saved.
#[derive(Clone, Debug)]
struct PendingBlobs {
    name: String,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    input: Option<(InputDigest, Vec<u8>)>,
}

/// Lookup slot of a record: plain fingerprint, or fingerprint within a digest bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot<'a> {
    Plain(&'a str),
    WithInput(&'a InputDigest, &'a str),
}

/// A loaded response directory.
#[derive(Debug)]
pub struct ResponseDirectory {
    index_path: PathBuf,
    blob_root: PathBuf,
    input_blob_root: Option<PathBuf>,
    index: ResponseIndex,
    pending: Vec<PendingBlobs>,
}

impl ResponseDirectory {
    /// Load an existing directory, validating every entry against the blob store.
    pub fn open(index_path: impl Into<PathBuf>) -> MockResult<Self> {
        let index_path = index_path.into();
        if !index_path.is_file() {
            return Err(MockError::directory_load(
                "response directory index not found",
                serde_json::json!({ "path": index_path.display().to_string() }),
            ));
        }
        let index: ResponseIndex =
            load_json_file(&index_path, "response directory index", ErrorCode::DirectoryLoad)?;
        let directory = Self::from_index(index_path, index);
        directory.validate()?;
        debug!(
            path = %directory.index_path.display(),
            commands = directory.index.commands.len(),
            input_buckets = directory.index.commands_with_input.len(),
            "response directory loaded"
        );
        Ok(directory)
    }

    /// Load the directory at `index_path`, or start an empty one with `layout`
    /// when no index exists yet. Nothing is written until [`Self::save`].
    pub fn open_or_create(
        index_path: impl Into<PathBuf>,
        layout: &DirectoryLayout,
    ) -> MockResult<Self> {
        let index_path = index_path.into();
        if index_path.exists() {
            return Self::open(index_path);
        }
        Ok(Self::create(index_path, layout))
    }

    /// Start an empty directory. An index already at `index_path` is replaced
    /// on the next [`Self::save`].
    pub fn create(index_path: impl Into<PathBuf>, layout: &DirectoryLayout) -> Self {
        let index_path = index_path.into();
        let index = ResponseIndex {
            response_dir: layout.response_dir.display().to_string(),
            input_dir: layout
                .input_dir
                .as_ref()
                .map(|dir| dir.display().to_string()),
            commands: OrderedMap::new(),
            commands_with_input: OrderedMap::new(),
        };
        debug!(path = %index_path.display(), "creating empty response directory");
        Self::from_index(index_path, index)
    }

    fn from_index(index_path: PathBuf, index: ResponseIndex) -> Self {
        let base = parent_dir(&index_path);
        let blob_root = resolve_relative(&base, Path::new(&index.response_dir));
        let input_blob_root = index
            .input_dir
            .as_ref()
            .map(|dir| resolve_relative(&base, Path::new(dir)));
        Self {
            index_path,
            blob_root,
            input_blob_root,
            index,
            pending: Vec::new(),
        }
    }

    fn validate(&self) -> MockResult<()> {
        for (key, meta) in self.index.commands.iter() {
            self.validate_entry(key, None, meta)?;
        }
        for (digest, bucket) in self.index.commands_with_input.iter() {
            for (key, meta) in bucket.iter() {
                self.validate_entry(key, Some(digest), meta)?;
            }
        }
        Ok(())
    }

    fn validate_entry(&self, key: &str, digest: Option<&str>, meta: &ResponseMeta) -> MockResult<()> {
        parse_fingerprint(key)?;
        if !is_safe_name(&meta.name) {
            return Err(MockError::directory_load(
                "index entry has an invalid record name",
                serde_json::json!({ "command": key, "name": meta.name }),
            ));
        }
        for file in [&meta.stdout, &meta.stderr].into_iter().flatten() {
            let path = self.blob_root.join(&meta.name).join(file);
            if !path.is_file() {
                return Err(MockError::directory_load(
                    "index references a missing response file",
                    serde_json::json!({
                        "command": key,
                        "input_digest": digest,
                        "name": meta.name,
                        "path": path.display().to_string(),
                    }),
                ));
            }
        }
        Ok(())
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn blob_root(&self) -> &Path {
        &self.blob_root
    }

    pub fn input_blob_root(&self) -> Option<&Path> {
        self.input_blob_root.as_deref()
    }

    pub fn index(&self) -> &ResponseIndex {
        &self.index
    }

    /// Total number of recorded responses, input-keyed ones included.
    pub fn len(&self) -> usize {
        self.index.commands.len()
            + self
                .index
                .commands_with_input
                .values()
                .map(OrderedMap::len)
                .sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when records were added without being saved yet.
    pub fn has_unsaved_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Path of a record's stdout blob, if it has one.
    pub fn stdout_path(&self, meta: &ResponseMeta) -> Option<PathBuf> {
        meta.stdout
            .as_ref()
            .map(|file| self.blob_root.join(&meta.name).join(file))
    }

    /// Path of a record's stderr blob, if it has one.
    pub fn stderr_path(&self, meta: &ResponseMeta) -> Option<PathBuf> {
        meta.stderr
            .as_ref()
            .map(|file| self.blob_root.join(&meta.name).join(file))
    }

    /// Add a recorded invocation.
    ///
    /// Fails with `E_DUPLICATE_RESPONSE` when the slot (fingerprint, plus input
    /// digest for input-dependent records) is taken and `overwrite` is false,
    /// or when another slot already uses the record's name. With `persist`
    /// the blobs and the index are written immediately; otherwise the record
    /// stays in memory until [`Self::save`].
    pub fn add_command_invocation(
        &mut self,
        invocation: CommandInvocation,
        overwrite: bool,
        persist: bool,
    ) -> MockResult<()> {
        self.check_add(&invocation, overwrite)?;
        let key = invocation.fingerprint();
        let digest = invocation.input_digest();
        let meta = ResponseMeta {
            name: invocation.label().to_string(),
            stdout: (!invocation.stdout().is_empty()).then(|| STDOUT_BLOB.to_string()),
            stderr: (!invocation.stderr().is_empty()).then(|| STDERR_BLOB.to_string()),
            exit_status: invocation.exit_status(),
            changes_state: invocation.mutates_state(),
        };
        let previous = match digest.as_ref() {
            Some(digest) => self
                .index
                .commands_with_input
                .entry_or_default(digest.as_str())
                .insert(key.clone(), meta),
            None => self.index.commands.insert(key.clone(), meta),
        };
        if let Some(previous) = previous {
            self.pending.retain(|blobs| blobs.name != previous.name);
        }
        self.pending.retain(|blobs| blobs.name != invocation.label());
        self.pending.push(PendingBlobs {
            name: invocation.label().to_string(),
            stdout: invocation.stdout().to_vec(),
            stderr: invocation.stderr().to_vec(),
            input: digest.zip(invocation.input().map(<[u8]>::to_vec)),
        });
        debug!(command = %key, name = invocation.label(), persist, "response added");
        if persist {
            self.save()?;
        }
        Ok(())
    }

    /// Same as [`Self::add_command_invocation`].
    pub fn add(
        &mut self,
        invocation: CommandInvocation,
        overwrite: bool,
        persist: bool,
    ) -> MockResult<()> {
        self.add_command_invocation(invocation, overwrite, persist)
    }

    /// Validate an add without performing it.
    fn check_add(&self, invocation: &CommandInvocation, overwrite: bool) -> MockResult<()> {
        let name = invocation.label();
        if !is_safe_name(name) {
            return Err(MockError::config(
                "record name must be a single non-empty path component",
                serde_json::json!({ "name": name }),
            ));
        }
        let key = invocation.fingerprint();
        let digest = invocation.input_digest();
        let slot = match digest.as_ref() {
            Some(digest) => Slot::WithInput(digest, &key),
            None => Slot::Plain(&key),
        };
        if let Some(existing) = self.meta_at(slot) {
            if !overwrite {
                return Err(MockError::duplicate_response(
                    "a response is already recorded for this command",
                    serde_json::json!({
                        "command": key,
                        "input_digest": digest,
                        "existing_name": existing.name,
                    }),
                ));
            }
        }
        if let Some(other) = self.slot_named(name) {
            let this = (digest.as_ref().map(ToString::to_string), key.clone());
            if other != this {
                return Err(MockError::duplicate_response(
                    "record name is already used by another command",
                    serde_json::json!({ "name": name, "command": key }),
                ));
            }
        }
        Ok(())
    }

    fn meta_at(&self, slot: Slot<'_>) -> Option<&ResponseMeta> {
        match slot {
            Slot::Plain(key) => self.index.commands.get(key),
            Slot::WithInput(digest, key) => self
                .index
                .commands_with_input
                .get(digest.as_str())
                .and_then(|bucket| bucket.get(key)),
        }
    }

    /// Find the slot currently holding a record called `name`.
    fn slot_named(&self, name: &str) -> Option<(Option<String>, String)> {
        let plain = self
            .index
            .commands
            .iter()
            .find(|(_, meta)| meta.name == name)
            .map(|(key, _)| (None, key.to_string()));
        plain.or_else(|| {
            self.index
                .commands_with_input
                .iter()
                .find_map(|(digest, bucket)| {
                    bucket
                        .iter()
                        .find(|(_, meta)| meta.name == name)
                        .map(|(key, _)| (Some(digest.to_string()), key.to_string()))
                })
        })
    }

    /// Resolve a command to its recorded response.
    ///
    /// With `input`, the digest bucket is probed first; on a miss the
    /// input-independent commands are tried. No match anywhere is an
    /// `E_RESPONSE_LOOKUP` error naming the command and the digest.
    pub fn lookup<S: AsRef<str>>(
        &self,
        argv: &[S],
        input: Option<&[u8]>,
    ) -> MockResult<CommandInvocation> {
        let key = fingerprint(argv);
        let digest = input.map(InputDigest::of);
        let bucket_hit = digest.as_ref().and_then(|digest| {
            self.meta_at(Slot::WithInput(digest, &key))
                .map(|meta| (meta, true))
        });
        let Some((meta, input_matched)) =
            bucket_hit.or_else(|| self.meta_at(Slot::Plain(&key)).map(|meta| (meta, false)))
        else {
            let mut context = serde_json::json!({ "command": key });
            if let (Some(digest), Some(obj)) = (digest.as_ref(), context.as_object_mut()) {
                obj.insert("input_digest".to_string(), serde_json::json!(digest));
            }
            let message = match digest.as_ref() {
                Some(digest) => {
                    format!("no response recorded for command [{key}] with input hash {digest}")
                }
                None => format!("no response recorded for command [{key}]"),
            };
            return Err(MockError::response_lookup(message, context));
        };
        let (stdout, stderr) = self.read_blobs(meta)?;
        let argv: Vec<String> = argv.iter().map(|arg| arg.as_ref().to_string()).collect();
        let mut invocation = CommandInvocation::new(argv, stdout, stderr, meta.exit_status, &meta.name)
            .mutating(meta.changes_state);
        if let (true, Some(input)) = (input_matched, input) {
            invocation = invocation.with_input(input);
        }
        debug!(command = %key, name = %meta.name, input_matched, "response resolved");
        Ok(invocation)
    }

    fn read_blobs(&self, meta: &ResponseMeta) -> MockResult<(Vec<u8>, Vec<u8>)> {
        if let Some(pending) = self.pending.iter().find(|blobs| blobs.name == meta.name) {
            return Ok((pending.stdout.clone(), pending.stderr.clone()));
        }
        let stdout = self.read_blob(self.stdout_path(meta))?;
        let stderr = self.read_blob(self.stderr_path(meta))?;
        Ok((stdout, stderr))
    }

    #[allow(clippy::unused_self)]
    fn read_blob(&self, path: Option<PathBuf>) -> MockResult<Vec<u8>> {
        let Some(path) = path else {
            return Ok(Vec::new());
        };
        fs::read(&path).map_err(|err| {
            MockError::io(ErrorCode::Io, "failed to read response file", err).with_path(&path)
        })
    }

    /// Every recorded response: input-independent commands in recording
    /// order, then each input bucket in recording order.
    pub fn list(&self) -> Vec<ListedCommand> {
        let plain = self.index.commands.iter().map(|(key, meta)| ListedCommand {
            fingerprint: key.to_string(),
            input_digest: None,
            meta: meta.clone(),
        });
        let keyed = self
            .index
            .commands_with_input
            .iter()
            .flat_map(|(digest, bucket)| {
                bucket.iter().map(move |(key, meta)| ListedCommand {
                    fingerprint: key.to_string(),
                    input_digest: Some(InputDigest::from_hex(digest)),
                    meta: meta.clone(),
                })
            });
        plain.chain(keyed).collect()
    }

    /// Write pending blobs, then replace the index atomically.
    pub fn save(&mut self) -> MockResult<()> {
        for blobs in &self.pending {
            let dir = self.blob_root.join(&blobs.name);
            fs::create_dir_all(&dir).map_err(|err| {
                MockError::io(ErrorCode::Io, "failed to create response directory", err)
                    .with_path(&dir)
            })?;
            if !blobs.stdout.is_empty() {
                write_atomic(&dir.join(STDOUT_BLOB), &blobs.stdout)?;
            }
            if !blobs.stderr.is_empty() {
                write_atomic(&dir.join(STDERR_BLOB), &blobs.stderr)?;
            }
            if let (Some(root), Some((digest, input))) =
                (self.input_blob_root.as_ref(), blobs.input.as_ref())
            {
                write_atomic(&root.join(digest.as_str()), input)?;
            }
            debug!(name = %blobs.name, dir = %dir.display(), "response blobs written");
        }
        write_json_atomic(&self.index_path, &self.index, "response directory index")?;
        debug!(
            path = %self.index_path.display(),
            written = self.pending.len(),
            "response directory saved"
        );
        self.pending.clear();
        Ok(())
    }

    /// Begin an all-or-nothing batch of records.
    pub fn stage(&mut self) -> Staging<'_> {
        Staging::new(self)
    }
}

/// A record name must be usable as exactly one directory component.
fn is_safe_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}
