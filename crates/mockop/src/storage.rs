//! File I/O helpers shared by the response directory and the state store.
//!
//! All index and state writes go through [`write_atomic`]: the bytes land in a
//! temporary file next to the target and are renamed over it, so a killed
//! process leaves either the old file or the new one, never a torn one.

use crate::error::{ErrorCode, MockError, MockResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Load and parse a JSON file, reporting failures under `code`.
pub(crate) fn load_json_file<T: DeserializeOwned>(
    path: &Path,
    file_type: &str,
    code: ErrorCode,
) -> MockResult<T> {
    let data = fs::read_to_string(path).map_err(|err| {
        MockError::io(code, format!("failed to read {file_type}"), err).with_path(path)
    })?;
    serde_json::from_str(&data).map_err(|err| {
        MockError::io(code, format!("failed to parse {file_type}"), err).with_path(path)
    })
}

/// Load and parse a JSON file if it exists, returning `None` if missing.
pub(crate) fn load_json_file_optional<T: DeserializeOwned>(
    path: &Path,
    file_type: &str,
    code: ErrorCode,
) -> MockResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    load_json_file(path, file_type, code).map(Some)
}

/// Replace `path` with `data` via write-to-temp and rename.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> MockResult<()> {
    let parent = parent_dir(path);
    fs::create_dir_all(&parent).map_err(|err| {
        MockError::io(ErrorCode::Io, "failed to create directory", err).with_path(&parent)
    })?;
    let mut temp = NamedTempFile::new_in(&parent).map_err(|err| {
        MockError::io(ErrorCode::Io, "failed to create temporary file", err).with_path(&parent)
    })?;
    temp.write_all(data)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|err| {
            MockError::io(ErrorCode::Io, "failed to write temporary file", err).with_path(path)
        })?;
    temp.persist(path).map_err(|err| {
        MockError::io(ErrorCode::Io, "failed to move file into place", err.error).with_path(path)
    })?;
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub(crate) fn write_json_atomic<T: Serialize>(
    path: &Path,
    value: &T,
    file_type: &str,
) -> MockResult<()> {
    let mut data = serde_json::to_vec_pretty(value).map_err(|err| {
        MockError::io(ErrorCode::Io, format!("failed to serialize {file_type}"), err)
    })?;
    data.push(b'\n');
    write_atomic(path, &data)
}

/// Resolve `path` against `base` unless it is already absolute.
pub(crate) fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Directory containing `path`, or `.` for a bare file name.
pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
