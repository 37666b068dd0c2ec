// Test module - relaxed lint rules
#![allow(clippy::indexing_slicing)]
#![allow(clippy::panic)]
#![allow(clippy::manual_assert)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

//! Generator configs and full recording runs against a scripted backend.

use mockop::generator::{
    GenerationObserver, Generator, GeneratorConfig, ItemEdit, QueryDefinition, QueryKind,
    SilentObserver, DEFAULT_BATCH_SIZE,
};
use mockop::{
    fingerprint, ErrorCode, Execution, MockResult, RecordingBackend, ResponseDirectory, StateStore,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Answers by fingerprint; anything unknown fails like the real tool would.
#[derive(Debug, Default)]
struct ScriptedBackend {
    responses: BTreeMap<String, Execution>,
    calls: Vec<String>,
}

impl ScriptedBackend {
    fn answer(mut self, argv: &[&str], stdout: &str, stderr: &str, exit_status: i32) -> Self {
        self.responses.insert(
            fingerprint(argv),
            Execution {
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
                exit_status,
            },
        );
        self
    }
}

impl RecordingBackend for ScriptedBackend {
    fn execute(&mut self, argv: &[String], _input: Option<&[u8]>) -> MockResult<Execution> {
        let key = fingerprint(argv);
        self.calls.push(key.clone());
        Ok(self.responses.get(&key).cloned().unwrap_or_else(|| Execution {
            stdout: Vec::new(),
            stderr: b"[ERROR] unknown command\n".to_vec(),
            exit_status: 1,
        }))
    }
}

#[derive(Debug, Default)]
struct EventLog(Vec<String>);

impl GenerationObserver for EventLog {
    fn query_started(&mut self, query: &QueryDefinition) {
        self.0.push(format!("start {}", query.name));
    }

    fn record_saved(&mut self, name: &str) {
        self.0.push(format!("saved {name}"));
    }

    fn query_skipped(&mut self, query: &QueryDefinition) {
        self.0.push(format!("skip {}", query.name));
    }
}

const SCENARIO_YAML: &str = r#"
response_dir_file: fixtures/index.json
response_path: fixtures/responses
input_path: fixtures/inputs
program: op
program_env:
  OP_ACCOUNT: acme
state:
  state_dir: state
  iteration: 0
  set_env_vars:
    MOCK_OP_SIGNIN_SUCCEED: "1"
queries:
  - name: get-foo
    type: item-get
    item: foo
    vault: Test
  - name: version
    type: cli-version
    enabled: false
  - name: doc
    type: document-get
    item: doc
    vault: Test
    alternate_item: broken-doc
    expected_return: 1
  - name: delete-all
    type: item-delete-multiple
    vault: Test
    title_glob: "Delete Me*"
    batch_size: 2
    changes_state: true
"#;

fn write_config(dir: &Path, file: &str, body: &str) -> PathBuf {
    let path = dir.join(file);
    fs::write(&path, body).unwrap();
    path
}

fn items() -> serde_json::Value {
    serde_json::json!([
        { "id": "1", "title": "Delete Me 1" },
        { "id": "2", "title": "Keep" },
        { "id": "3", "title": "Delete Me 3" },
        { "id": "4", "title": "Delete Me 4" }
    ])
}

fn scenario_backend() -> ScriptedBackend {
    ScriptedBackend::default()
        .answer(
            &["item", "get", "foo", "--vault", "Test", "--format", "json"],
            r#"{"id":"foo"}"#,
            "",
            0,
        )
        .answer(
            &["item", "get", "doc", "--vault", "Test", "--format", "json"],
            r#"{"id":"doc","files":[{"name":"doc.txt"}]}"#,
            "",
            0,
        )
        .answer(
            &["document", "get", "broken-doc", "--vault", "Test"],
            "",
            "[ERROR] no document\n",
            1,
        )
        .answer(
            &["item", "list", "--vault", "Test", "--format", "json"],
            &items().to_string(),
            "",
            0,
        )
        .answer(&["item", "delete", "-", "--vault", "Test"], "", "", 0)
}

#[test]
fn yaml_config_loads_with_paths_resolved() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_config(tmp.path(), "resp-gen.yaml", SCENARIO_YAML);
    let config = GeneratorConfig::load(&path).unwrap();
    assert_eq!(config.response_dir_file, tmp.path().join("fixtures/index.json"));
    assert_eq!(config.response_path, tmp.path().join("fixtures/responses"));
    assert_eq!(config.program, PathBuf::from("op"));
    assert_eq!(config.program_env["OP_ACCOUNT"], "acme");
    assert_eq!(config.queries.len(), 4);
    assert!(!config.queries[1].enabled);
    assert_eq!(
        config.queries[0].kind,
        QueryKind::ItemGet {
            item: "foo".to_string(),
            vault: Some("Test".to_string()),
            include_archive: false,
            fields: Vec::new(),
        }
    );
    let state = config.state.unwrap();
    assert_eq!(state.state_dir, tmp.path().join("state"));
}

#[test]
fn json_config_and_item_edits_parse() {
    let tmp = tempfile::tempdir().unwrap();
    let body = serde_json::json!({
        "response_dir_file": "index.json",
        "response_path": "responses",
        "program": "./bin/op",
        "queries": [
            {
                "name": "rename",
                "type": "item-edit",
                "item": "foo",
                "edit": { "action": "set-title", "title": "Renamed" }
            },
            { "name": "purge", "type": "item-delete-multiple", "vault": "Test" }
        ]
    });
    let path = write_config(tmp.path(), "resp-gen.json", &body.to_string());
    let config = GeneratorConfig::load(&path).unwrap();
    assert_eq!(config.program, tmp.path().join("./bin/op"));
    match &config.queries[0].kind {
        QueryKind::ItemEdit { edit, .. } => assert_eq!(
            edit,
            &ItemEdit::SetTitle {
                title: "Renamed".to_string()
            }
        ),
        other => panic!("unexpected kind {other:?}"),
    }
    match &config.queries[1].kind {
        QueryKind::ItemDeleteMultiple { batch_size, .. } => {
            assert_eq!(*batch_size, DEFAULT_BATCH_SIZE);
        }
        other => panic!("unexpected kind {other:?}"),
    }
}

#[test]
fn unknown_query_type_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_config(
        tmp.path(),
        "bad.yaml",
        "response_dir_file: index.json\nresponse_path: responses\nprogram: op\nqueries:\n  - name: x\n    type: item-frobnicate\n",
    );
    assert_eq!(GeneratorConfig::load(&path).unwrap_err().code, ErrorCode::Config);
}

#[test]
fn duplicate_query_names_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_config(
        tmp.path(),
        "dup.yaml",
        "response_dir_file: index.json\nresponse_path: responses\nprogram: op\nqueries:\n  - name: x\n    type: cli-version\n  - name: x\n    type: account-list\n",
    );
    assert_eq!(GeneratorConfig::load(&path).unwrap_err().code, ErrorCode::Config);
}

#[test]
fn malformed_title_glob_is_rejected_at_load() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_config(
        tmp.path(),
        "glob.yaml",
        "response_dir_file: index.json\nresponse_path: responses\nprogram: op\nqueries:\n  - name: purge\n    type: item-delete-multiple\n    vault: Test\n    title_glob: \"Delete [Me\"\n",
    );
    let err = GeneratorConfig::load(&path).unwrap_err();
    assert_eq!(err.code, ErrorCode::Config);
    assert_eq!(err.message, "invalid title_glob pattern");
}

#[test]
fn zero_batch_size_fails_the_run_even_without_load() {
    let tmp = tempfile::tempdir().unwrap();
    let config: GeneratorConfig = serde_json::from_value(serde_json::json!({
        "response_dir_file": tmp.path().join("index.json"),
        "response_path": tmp.path().join("responses"),
        "program": "op",
        "queries": [
            { "name": "purge", "type": "item-delete-multiple", "vault": "Test", "batch_size": 0 }
        ]
    }))
    .unwrap();
    let mut generator = Generator::new(&config, scenario_backend());
    let err = generator.run(&mut SilentObserver).unwrap_err();
    assert_eq!(err.code, ErrorCode::Config);
    assert!(generator.into_backend().calls.is_empty());
    assert!(!tmp.path().join("index.json").exists());
}

#[test]
fn run_records_every_enabled_query_and_registers_the_state() {
    let tmp = tempfile::tempdir().unwrap();
    let config = GeneratorConfig::load(&write_config(tmp.path(), "resp-gen.yaml", SCENARIO_YAML)).unwrap();
    let mut events = EventLog::default();
    let mut generator = Generator::new(&config, scenario_backend());
    let report = generator.run(&mut events).unwrap();

    assert_eq!(
        report.recorded,
        ["get-foo", "doc-filename", "doc", "delete-all_part_000", "delete-all_part_002"]
    );
    assert_eq!(report.skipped, ["version"]);
    assert_eq!(report.state_iteration, Some(0));
    assert_eq!(events.0[0], "start get-foo");
    assert_eq!(events.0[2], "skip version");

    // The listing that feeds the delete batches is never recorded.
    let backend = generator.into_backend();
    assert!(backend
        .calls
        .contains(&"item list --vault Test --format json".to_string()));
    let directory = ResponseDirectory::open(&config.response_dir_file).unwrap();
    assert_eq!(
        directory
            .lookup(&["item", "list", "--vault", "Test", "--format", "json"], None)
            .unwrap_err()
            .code,
        ErrorCode::ResponseLookup
    );
    assert_eq!(
        directory.blob_root(),
        tmp.path().join("fixtures").join("responses")
    );

    let store = StateStore::open(tmp.path().join("state")).unwrap();
    assert_eq!(store.states().len(), 1);
    assert_eq!(store.states()[0].response_directory, config.response_dir_file);
    assert_eq!(store.states()[0].set_env_vars["MOCK_OP_SIGNIN_SUCCEED"], "1");
}

#[test]
fn document_bytes_come_from_the_alternate_item_but_replay_under_the_item() {
    let tmp = tempfile::tempdir().unwrap();
    let config = GeneratorConfig::load(&write_config(tmp.path(), "resp-gen.yaml", SCENARIO_YAML)).unwrap();
    Generator::new(&config, scenario_backend())
        .run(&mut SilentObserver)
        .unwrap();
    let directory = ResponseDirectory::open(&config.response_dir_file).unwrap();

    let document = directory
        .lookup(&["document", "get", "doc", "--vault", "Test"], None)
        .unwrap();
    assert_eq!(document.exit_status(), 1);
    assert_eq!(document.stderr(), b"[ERROR] no document\n");
    let metadata = directory
        .lookup(&["item", "get", "doc", "--vault", "Test", "--format", "json"], None)
        .unwrap();
    assert_eq!(metadata.label(), "doc-filename");
}

#[test]
fn matching_items_are_deleted_in_chunks_and_only_the_last_changes_state() {
    let tmp = tempfile::tempdir().unwrap();
    let config = GeneratorConfig::load(&write_config(tmp.path(), "resp-gen.yaml", SCENARIO_YAML)).unwrap();
    Generator::new(&config, scenario_backend())
        .run(&mut SilentObserver)
        .unwrap();
    let directory = ResponseDirectory::open(&config.response_dir_file).unwrap();

    let all = items();
    let first_chunk = serde_json::to_vec(&[all[0].clone(), all[2].clone()]).unwrap();
    let last_chunk = serde_json::to_vec(&[all[3].clone()]).unwrap();
    let delete = ["item", "delete", "-", "--vault", "Test"];

    let first = directory.lookup(&delete, Some(first_chunk.as_slice())).unwrap();
    assert_eq!(first.label(), "delete-all_part_000");
    assert!(!first.mutates_state());
    let last = directory.lookup(&delete, Some(last_chunk.as_slice())).unwrap();
    assert_eq!(last.label(), "delete-all_part_002");
    assert!(last.mutates_state());

    let stored_input = tmp
        .path()
        .join("fixtures/inputs")
        .join(last.input_digest().unwrap().as_str());
    assert_eq!(fs::read(stored_input).unwrap(), last_chunk);
}

#[test]
fn failed_query_aborts_but_keeps_earlier_records() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_config(
        tmp.path(),
        "resp-gen.yaml",
        r"
response_dir_file: index.json
response_path: responses
program: op
queries:
  - name: get-foo
    type: item-get
    item: foo
    vault: Test
  - name: who
    type: whoami
",
    );
    let config = GeneratorConfig::load(&path).unwrap();
    let err = Generator::new(&config, scenario_backend())
        .run(&mut SilentObserver)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Recording);

    let directory = ResponseDirectory::open(&config.response_dir_file).unwrap();
    assert_eq!(directory.len(), 1);
    assert!(directory
        .lookup(&["item", "get", "foo", "--vault", "Test", "--format", "json"], None)
        .is_ok());
}

#[test]
fn rerunning_a_config_overwrites_in_place() {
    let tmp = tempfile::tempdir().unwrap();
    let config = GeneratorConfig::load(&write_config(tmp.path(), "resp-gen.yaml", SCENARIO_YAML)).unwrap();
    for _ in 0..2 {
        Generator::new(&config, scenario_backend())
            .run(&mut SilentObserver)
            .unwrap();
    }
    let directory = ResponseDirectory::open(&config.response_dir_file).unwrap();
    assert_eq!(directory.len(), 5);
    assert_eq!(StateStore::open(tmp.path().join("state")).unwrap().states().len(), 1);
}
