//! Recording a response directory from a declarative config.
//!
//! Each enabled query in a [`GeneratorConfig`] is run against the real program
//! through a [`Recorder`] and stored with overwrite allowed, so re-running a
//! config after a failure is the way to recover. Single records are persisted
//! as soon as they are captured; a failure aborts the run and leaves earlier
//! records on disk.
//!
//! # Key Types
//!
//! - [`GeneratorConfig`] / [`QueryKind`] / [`ItemEdit`] - What to record
//! - [`Generator`] - Runs a config against a backend
//! - [`GenerationObserver`] - Progress hooks for front ends
//! - [`GenerationReport`] - What a run produced

pub mod argv;
mod config;

use config::title_matcher;

pub use config::{
    GeneratorConfig, ItemEdit, QueryDefinition, QueryKind, StateRegistration, DEFAULT_BATCH_SIZE,
};

use crate::directory::{DirectoryLayout, ResponseDirectory};
use crate::error::{MockError, MockResult};
use crate::recording::{ProcessBackend, RecordRequest, Recorder, RecordingBackend};
use crate::state::StateStore;
use crate::storage::parent_dir;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Progress hooks called while a config runs.
pub trait GenerationObserver {
    fn query_started(&mut self, _query: &QueryDefinition) {}
    fn record_saved(&mut self, _name: &str) {}
    fn query_skipped(&mut self, _query: &QueryDefinition) {}
}

/// Observer that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentObserver;

impl GenerationObserver for SilentObserver {}

/// Summary of a finished run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub index_path: PathBuf,
    /// Record names written, in order.
    pub recorded: Vec<String>,
    /// Disabled queries.
    pub skipped: Vec<String>,
    /// Iteration registered in the state store, if any.
    pub state_iteration: Option<usize>,
}

/// The backend a config describes: its program plus `program_env`.
pub fn process_backend(config: &GeneratorConfig) -> ProcessBackend {
    ProcessBackend::new(&config.program).with_envs(config.program_env.clone())
}

/// Runs a generator config.
#[derive(Debug)]
pub struct Generator<'a, B> {
    config: &'a GeneratorConfig,
    recorder: Recorder<B>,
}

impl<'a, B: RecordingBackend> Generator<'a, B> {
    pub fn new(config: &'a GeneratorConfig, backend: B) -> Self {
        Self {
            config,
            recorder: Recorder::new(backend),
        }
    }

    pub fn into_backend(self) -> B {
        self.recorder.into_backend()
    }

    /// Record every enabled query, then register the state if configured.
    pub fn run(&mut self, observer: &mut dyn GenerationObserver) -> MockResult<GenerationReport> {
        let config = self.config;
        config.validate()?;
        let mut layout = DirectoryLayout::new(relative_to(
            &config.response_path,
            &parent_dir(&config.response_dir_file),
        ));
        if let Some(input_path) = config.input_path.as_ref() {
            layout = layout.with_input_dir(relative_to(
                input_path,
                &parent_dir(&config.response_dir_file),
            ));
        }
        let mut directory = ResponseDirectory::open_or_create(&config.response_dir_file, &layout)?;
        let mut report = GenerationReport {
            index_path: config.response_dir_file.clone(),
            ..GenerationReport::default()
        };

        for query in &config.queries {
            if !query.enabled {
                observer.query_skipped(query);
                report.skipped.push(query.name.clone());
                continue;
            }
            observer.query_started(query);
            info!(name = %query.name, kind = query.kind.type_name(), "recording query");
            for name in self.record_query(&mut directory, query)? {
                observer.record_saved(&name);
                report.recorded.push(name);
            }
        }
        directory.save()?;

        if let Some(state) = config.state.as_ref() {
            let mut store = StateStore::open_or_create(&state.state_dir)?;
            store.add_state(
                config.response_dir_file.clone(),
                state.iteration,
                state.set_env_vars.clone(),
                state.pop_env_vars.clone(),
            )?;
            report.state_iteration = Some(state.iteration);
        }
        Ok(report)
    }

    fn record_query(
        &mut self,
        directory: &mut ResponseDirectory,
        query: &QueryDefinition,
    ) -> MockResult<Vec<String>> {
        match &query.kind {
            QueryKind::DocumentGet {
                item,
                vault,
                include_archive,
                alternate_item,
            } => self.record_document(
                directory,
                query,
                item,
                vault.as_ref(),
                *include_archive,
                alternate_item.as_deref(),
            ),
            QueryKind::ItemDeleteMultiple {
                vault,
                categories,
                include_archive,
                tags,
                title_glob,
                archive,
                batch_size,
            } => {
                let list_argv = argv::item_list(categories, *include_archive, tags, Some(vault));
                let items = self.list_items(&list_argv, title_glob.as_deref())?;
                let delete_argv = argv::item_delete("-", *archive, Some(vault));
                self.record_delete_batches(directory, query, &delete_argv, &items, *batch_size)
            }
            kind => {
                let run_argv = argv::single_command(kind).ok_or_else(|| {
                    MockError::config(
                        "query kind has no single command",
                        serde_json::json!({ "name": query.name, "type": kind.type_name() }),
                    )
                })?;
                let request = RecordRequest::new(query.name.clone(), run_argv)
                    .expect_exit(query.expected_return)
                    .changes_state(query.changes_state);
                let invocation = self.recorder.record(request)?;
                let name = invocation.label().to_string();
                directory.add_command_invocation(invocation, true, true)?;
                Ok(vec![name])
            }
        }
    }

    /// Item metadata (`<name>-filename`) and document bytes, committed as one batch.
    fn record_document(
        &mut self,
        directory: &mut ResponseDirectory,
        query: &QueryDefinition,
        item: &str,
        vault: Option<&String>,
        include_archive: bool,
        alternate_item: Option<&str>,
    ) -> MockResult<Vec<String>> {
        let filename = RecordRequest::new(
            format!("{}-filename", query.name),
            argv::item_get(item, vault, include_archive, &[]),
        );
        let document = RecordRequest::new(
            query.name.clone(),
            argv::document_get(alternate_item.unwrap_or(item), vault, include_archive),
        )
        .recorded_as(argv::document_get(item, vault, false))
        .expect_exit(query.expected_return)
        .changes_state(query.changes_state);

        let filename = self.recorder.record(filename)?;
        let document = self.recorder.record(document)?;
        let names = vec![filename.label().to_string(), document.label().to_string()];
        let mut staging = directory.stage();
        staging.stage(filename, true).stage(document, true);
        staging.commit()?;
        Ok(names)
    }

    /// One `<name>_part_NNN` record per chunk; only the last chunk may change state.
    fn record_delete_batches(
        &mut self,
        directory: &mut ResponseDirectory,
        query: &QueryDefinition,
        delete_argv: &[String],
        items: &[Value],
        batch_size: usize,
    ) -> MockResult<Vec<String>> {
        if items.is_empty() {
            warn!(name = %query.name, "no items matched; nothing to delete");
            return Ok(Vec::new());
        }
        let chunk_count = items.len().div_ceil(batch_size);
        let mut names = Vec::with_capacity(chunk_count);
        for (index, chunk) in items.chunks(batch_size).enumerate() {
            let input = serde_json::to_vec(chunk).map_err(|err| {
                MockError::recording(
                    "failed to serialize item chunk",
                    serde_json::json!({ "source": err.to_string() }),
                )
            })?;
            let request = RecordRequest::new(
                format!("{}_part_{:03}", query.name, index * batch_size),
                delete_argv.to_vec(),
            )
            .with_input(input)
            .expect_exit(query.expected_return)
            .changes_state(query.changes_state && index + 1 == chunk_count);
            let invocation = self.recorder.record(request)?;
            names.push(invocation.label().to_string());
            directory.add_command_invocation(invocation, true, true)?;
        }
        Ok(names)
    }

    /// Run an unrecorded `item list` and keep the items whose title matches.
    fn list_items(&mut self, list_argv: &[String], title_glob: Option<&str>) -> MockResult<Vec<Value>> {
        let listing = self.recorder.backend_mut().execute(list_argv, None)?;
        if listing.exit_status != 0 {
            return Err(MockError::recording(
                "listing items to delete failed",
                serde_json::json!({
                    "exit_status": listing.exit_status,
                    "output": String::from_utf8_lossy(&listing.stderr),
                }),
            ));
        }
        let items: Vec<Value> = serde_json::from_slice(&listing.stdout).map_err(|err| {
            MockError::recording(
                "item list output is not a JSON array",
                serde_json::json!({ "source": err.to_string() }),
            )
        })?;
        let Some(pattern) = title_glob else {
            return Ok(items);
        };
        let matcher = title_matcher(pattern)?;
        Ok(items
            .into_iter()
            .filter(|item| {
                item.get("title")
                    .and_then(Value::as_str)
                    .is_some_and(|title| matcher.is_match(title))
            })
            .collect())
    }
}

/// `path` relative to `base` when it lies under it.
fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base)
        .map_or_else(|_| path.to_path_buf(), Path::to_path_buf)
}
