//! Common test helper functions.
//!
//! These utilities reduce boilerplate in integration tests by providing
//! standard implementations for temp directories, recorded invocations,
//! response directories and scripted backend programs.

// Helpers panic on setup failure so tests fail at the broken step.
#![allow(clippy::expect_used)]
#![allow(clippy::missing_panics_doc)]

use mockop::{CommandInvocation, DirectoryLayout, ResponseDirectory, StateStore};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Create a unique temporary directory for a test.
///
/// The directory name includes a timestamp and the process id to avoid
/// collisions between parallel test runs. The directory is created
/// immediately.
///
/// # Example
///
/// ```ignore
/// let dir = temp_dir("lookup");
/// // dir is something like /tmp/mockop-lookup-1703520000000-4242
/// ```
#[must_use]
pub fn temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    dir.push(format!("mockop-{prefix}-{stamp}-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("failed to create temp directory");
    dir
}

/// An input-independent invocation with the given stdout and exit status.
#[must_use]
pub fn invocation(argv: &[&str], stdout: &[u8], exit_status: i32, name: &str) -> CommandInvocation {
    let key = argv.iter().map(ToString::to_string).collect();
    CommandInvocation::new(key, stdout.to_vec(), Vec::new(), exit_status, name)
}

/// Builds and saves a response directory in one go.
///
/// # Example
///
/// ```ignore
/// let index = DirectoryBuilder::new(&dir)
///     .with(invocation(&["item", "get", "foo"], b"OK", 0, "get-foo"))
///     .build();
/// ```
#[derive(Debug)]
pub struct DirectoryBuilder {
    index_path: PathBuf,
    layout: DirectoryLayout,
    records: Vec<CommandInvocation>,
}

impl DirectoryBuilder {
    /// Directory with `index.json` and a `responses` blob root under `root`.
    pub fn new(root: &Path) -> Self {
        Self {
            index_path: root.join("index.json"),
            layout: DirectoryLayout::new("responses"),
            records: Vec::new(),
        }
    }

    #[must_use]
    pub fn index_name(mut self, name: &str) -> Self {
        let parent = self
            .index_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        self.index_path = parent.join(name);
        self
    }

    #[must_use]
    pub fn blob_dir(mut self, dir: &str) -> Self {
        self.layout = DirectoryLayout {
            response_dir: PathBuf::from(dir),
            input_dir: self.layout.input_dir,
        };
        self
    }

    #[must_use]
    pub fn input_dir(mut self, dir: &str) -> Self {
        self.layout = self.layout.with_input_dir(dir);
        self
    }

    #[must_use]
    pub fn with(mut self, invocation: CommandInvocation) -> Self {
        self.records.push(invocation);
        self
    }

    /// Save the directory and return its index path.
    pub fn build(self) -> PathBuf {
        let mut directory = ResponseDirectory::open_or_create(&self.index_path, &self.layout)
            .expect("failed to create response directory");
        for record in self.records {
            directory
                .add_command_invocation(record, false, false)
                .expect("failed to add record");
        }
        directory.save().expect("failed to save response directory");
        self.index_path
    }
}

/// Register `directories` as states 0, 1, ... of the store in `state_dir`.
pub fn write_states(state_dir: &Path, directories: &[(&Path, &[(&str, &str)], &[&str])]) {
    let mut store = StateStore::open_or_create(state_dir).expect("failed to open state store");
    for (iteration, (index_path, sets, pops)) in directories.iter().enumerate() {
        let sets: BTreeMap<String, String> = sets
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        let pops: BTreeSet<String> = pops.iter().map(|key| (*key).to_string()).collect();
        store
            .add_state(index_path.to_path_buf(), iteration, sets, pops)
            .expect("failed to add state");
    }
}

/// Write an executable `/bin/sh` script standing in for the real tool.
///
/// # Example
///
/// ```ignore
/// let op = write_script(&dir, "op", r#"echo "$@""#);
/// ```
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("failed to write script");
    make_executable(&path);
    path
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)
        .expect("failed to stat script")
        .permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions).expect("failed to make script executable");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

/// Write a JSON value to a file.
pub fn write_json(path: &Path, value: &serde_json::Value) {
    let data = serde_json::to_vec_pretty(value).expect("failed to serialize JSON");
    fs::write(path, data).expect("failed to write JSON file");
}
