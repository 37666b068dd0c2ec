// Test module - relaxed lint rules
#![allow(clippy::indexing_slicing)]
#![allow(clippy::panic)]
#![allow(clippy::manual_assert)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

//! Response directory behavior against a real filesystem.

use mockop::{
    CommandInvocation, DirectoryLayout, ErrorCode, InputDigest, ResponseDirectory, STDOUT_BLOB,
};
use std::fs;
use std::path::{Path, PathBuf};

fn argv(words: &[&str]) -> Vec<String> {
    words.iter().map(ToString::to_string).collect()
}

fn record(words: &[&str], stdout: &str, exit_status: i32, name: &str) -> CommandInvocation {
    CommandInvocation::new(argv(words), stdout.as_bytes().to_vec(), Vec::new(), exit_status, name)
}

fn new_directory(root: &Path) -> (PathBuf, ResponseDirectory) {
    let index = root.join("index.json");
    let layout = DirectoryLayout::new("responses").with_input_dir("inputs");
    let directory = ResponseDirectory::create(&index, &layout);
    (index, directory)
}

#[test]
fn recorded_response_replays_byte_for_byte() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, mut directory) = new_directory(tmp.path());
    let invocation = CommandInvocation::new(
        argv(&["item", "get", "foo"]),
        b"{\"id\":\"foo\"}\n".to_vec(),
        b"warning: cached\n".to_vec(),
        0,
        "get-foo",
    );
    directory.add_command_invocation(invocation, false, true).unwrap();

    let reloaded = ResponseDirectory::open(&index).unwrap();
    let replayed = reloaded.lookup(&["item", "get", "foo"], None).unwrap();
    assert_eq!(replayed.stdout(), b"{\"id\":\"foo\"}\n");
    assert_eq!(replayed.stderr(), b"warning: cached\n");
    assert_eq!(replayed.exit_status(), 0);
    assert_eq!(replayed.label(), "get-foo");
    assert!(tmp.path().join("responses/get-foo").join(STDOUT_BLOB).is_file());
}

#[test]
fn lookup_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, mut directory) = new_directory(tmp.path());
    directory
        .add_command_invocation(record(&["vault", "list"], "[]", 0, "vaults"), false, true)
        .unwrap();
    let first = directory.lookup(&["vault", "list"], None).unwrap();
    let second = directory.lookup(&["vault", "list"], None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn argument_order_is_part_of_the_key() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, mut directory) = new_directory(tmp.path());
    directory
        .add_command_invocation(record(&["item", "get", "foo", "--vault", "v"], "OK", 0, "ordered"), false, true)
        .unwrap();
    let err = directory
        .lookup(&["item", "get", "--vault", "v", "foo"], None)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ResponseLookup);
}

#[test]
fn arguments_with_spaces_keep_their_boundaries() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, mut directory) = new_directory(tmp.path());
    directory
        .add_command_invocation(record(&["item", "get", "Example Login"], "login", 0, "login"), false, true)
        .unwrap();
    let reloaded = ResponseDirectory::open(&index).unwrap();
    assert!(reloaded.lookup(&["item", "get", "Example Login"], None).is_ok());
    assert!(reloaded.lookup(&["item", "get", "Example", "Login"], None).is_err());
    assert_eq!(
        reloaded.list()[0].argv().unwrap(),
        argv(&["item", "get", "Example Login"])
    );
}

#[test]
fn overwrite_replaces_the_slot_and_last_write_wins() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, mut directory) = new_directory(tmp.path());
    directory
        .add_command_invocation(record(&["item", "get", "foo"], "first", 0, "get-foo"), true, true)
        .unwrap();
    directory
        .add_command_invocation(record(&["item", "get", "foo"], "second", 0, "get-foo-again"), true, true)
        .unwrap();

    let reloaded = ResponseDirectory::open(&index).unwrap();
    assert_eq!(reloaded.len(), 1);
    let replayed = reloaded.lookup(&["item", "get", "foo"], None).unwrap();
    assert_eq!(replayed.stdout(), b"second");
    assert_eq!(replayed.label(), "get-foo-again");
}

#[test]
fn occupied_slot_without_overwrite_is_a_duplicate() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, mut directory) = new_directory(tmp.path());
    directory
        .add_command_invocation(record(&["item", "get", "foo"], "first", 0, "get-foo"), false, true)
        .unwrap();
    let err = directory
        .add_command_invocation(record(&["item", "get", "foo"], "second", 0, "get-foo-2"), false, true)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::DuplicateResponse);
    assert_eq!(
        directory.lookup(&["item", "get", "foo"], None).unwrap().stdout(),
        b"first"
    );
}

#[test]
fn record_name_cannot_be_reused_by_another_command() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, mut directory) = new_directory(tmp.path());
    directory
        .add_command_invocation(record(&["item", "get", "foo"], "foo", 0, "shared"), true, true)
        .unwrap();
    let err = directory
        .add_command_invocation(record(&["item", "get", "bar"], "bar", 0, "shared"), true, true)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::DuplicateResponse);
}

#[test]
fn unsafe_record_names_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, mut directory) = new_directory(tmp.path());
    let err = directory
        .add_command_invocation(record(&["item", "get", "foo"], "foo", 0, "../escape"), true, false)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Config);
    assert!(directory.is_empty());
}

#[test]
fn input_digest_selects_between_responses_for_the_same_command() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, mut directory) = new_directory(tmp.path());
    let delete = ["item", "delete", "-"];
    directory
        .add_command_invocation(record(&delete, "", 0, "delete-a").with_input(b"[\"a\"]".to_vec()), false, false)
        .unwrap();
    directory
        .add_command_invocation(
            CommandInvocation::new(argv(&delete), Vec::new(), b"[ERROR] not found\n".to_vec(), 1, "delete-b")
                .with_input(b"[\"b\"]".to_vec()),
            false,
            false,
        )
        .unwrap();
    directory
        .add_command_invocation(record(&delete, "", 2, "delete-plain"), false, false)
        .unwrap();
    directory.save().unwrap();

    let reloaded = ResponseDirectory::open(&index).unwrap();
    let a = reloaded.lookup(&delete, Some(b"[\"a\"]")).unwrap();
    assert_eq!(a.label(), "delete-a");
    assert_eq!(a.input(), Some(&b"[\"a\"]"[..]));
    let b = reloaded.lookup(&delete, Some(b"[\"b\"]")).unwrap();
    assert_eq!(b.exit_status(), 1);
    assert_eq!(b.stderr(), b"[ERROR] not found\n");

    // Unknown input falls back to the input-independent record.
    let fallback = reloaded.lookup(&delete, Some(b"[\"c\"]")).unwrap();
    assert_eq!(fallback.label(), "delete-plain");
    assert_eq!(fallback.input(), None);
    assert_eq!(reloaded.lookup(&delete, None).unwrap().label(), "delete-plain");
}

#[test]
fn empty_input_is_distinct_from_no_input() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, mut directory) = new_directory(tmp.path());
    directory
        .add_command_invocation(record(&["item", "delete", "-"], "empty", 0, "empty-input").with_input(Vec::new()), false, true)
        .unwrap();
    assert_eq!(
        directory.lookup(&["item", "delete", "-"], Some(b"")).unwrap().stdout(),
        b"empty"
    );
    let err = directory.lookup(&["item", "delete", "-"], None).unwrap_err();
    assert_eq!(err.code, ErrorCode::ResponseLookup);
}

#[test]
fn input_payloads_are_stored_under_their_digest() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, mut directory) = new_directory(tmp.path());
    directory
        .add_command_invocation(record(&["item", "delete", "-"], "", 0, "delete").with_input(b"payload".to_vec()), false, true)
        .unwrap();
    let stored = tmp
        .path()
        .join("inputs")
        .join(InputDigest::of(b"payload").as_str());
    assert_eq!(fs::read(stored).unwrap(), b"payload");
}

#[test]
fn missing_response_names_the_command_and_digest() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, directory) = new_directory(tmp.path());
    let err = directory.lookup(&["item", "get", "nope"], Some(b"x")).unwrap_err();
    assert_eq!(err.code, ErrorCode::ResponseLookup);
    let context = err.context.unwrap();
    assert_eq!(context["command"], "item get nope");
    assert_eq!(context["input_digest"], InputDigest::of(b"x").as_str());
}

#[test]
fn empty_streams_are_stored_as_null() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, mut directory) = new_directory(tmp.path());
    directory
        .add_command_invocation(record(&["item", "delete", "foo"], "", 0, "delete-foo"), false, true)
        .unwrap();
    let raw: serde_json::Value = serde_json::from_slice(&fs::read(&index).unwrap()).unwrap();
    let meta = &raw["commands"]["item delete foo"];
    assert!(meta["stdout"].is_null());
    assert!(meta["stderr"].is_null());
    let replayed = directory.lookup(&["item", "delete", "foo"], None).unwrap();
    assert!(replayed.stdout().is_empty());
}

#[test]
fn dangling_blob_reference_fails_load() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, mut directory) = new_directory(tmp.path());
    directory
        .add_command_invocation(record(&["item", "get", "foo"], "OK", 0, "get-foo"), false, true)
        .unwrap();
    fs::remove_file(tmp.path().join("responses/get-foo").join(STDOUT_BLOB)).unwrap();
    let err = ResponseDirectory::open(&index).unwrap_err();
    assert_eq!(err.code, ErrorCode::DirectoryLoad);
}

#[test]
fn malformed_or_missing_index_fails_load() {
    let tmp = tempfile::tempdir().unwrap();
    let index = tmp.path().join("index.json");
    assert_eq!(
        ResponseDirectory::open(&index).unwrap_err().code,
        ErrorCode::DirectoryLoad
    );
    fs::write(&index, "{ not json").unwrap();
    assert_eq!(
        ResponseDirectory::open(&index).unwrap_err().code,
        ErrorCode::DirectoryLoad
    );
}

#[test]
fn unbalanced_fingerprint_fails_load() {
    let tmp = tempfile::tempdir().unwrap();
    let index = tmp.path().join("index.json");
    let raw = serde_json::json!({
        "response_dir": "responses",
        "commands": {
            "item get 'foo": { "name": "broken", "stdout": null, "stderr": null, "exit_status": 0 }
        },
        "commands_with_input": {}
    });
    fs::write(&index, serde_json::to_vec(&raw).unwrap()).unwrap();
    assert_eq!(
        ResponseDirectory::open(&index).unwrap_err().code,
        ErrorCode::DirectoryLoad
    );
}

#[test]
fn list_shows_plain_commands_then_input_buckets_in_recording_order() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, mut directory) = new_directory(tmp.path());
    directory
        .add_command_invocation(record(&["item", "delete", "-"], "", 0, "delete").with_input(b"[1]".to_vec()), false, false)
        .unwrap();
    directory
        .add_command_invocation(record(&["whoami"], "me", 0, "whoami"), false, false)
        .unwrap();
    directory
        .add_command_invocation(record(&["account", "list"], "[]", 0, "accounts"), false, false)
        .unwrap();
    directory.save().unwrap();

    let listed = ResponseDirectory::open(&index).unwrap().list();
    let names: Vec<&str> = listed.iter().map(|entry| entry.meta.name.as_str()).collect();
    assert_eq!(names, ["whoami", "accounts", "delete"]);
    assert_eq!(listed[0].input_digest, None);
    assert_eq!(listed[2].input_digest, Some(InputDigest::of(b"[1]")));
}

#[test]
fn unsaved_records_are_served_from_memory() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, mut directory) = new_directory(tmp.path());
    directory
        .add_command_invocation(record(&["whoami"], "me", 0, "whoami"), false, false)
        .unwrap();
    assert!(directory.has_unsaved_changes());
    assert!(!index.exists());
    assert_eq!(directory.lookup(&["whoami"], None).unwrap().stdout(), b"me");
    directory.save().unwrap();
    assert!(!directory.has_unsaved_changes());
    assert!(index.is_file());
}

#[test]
fn open_or_create_picks_up_an_existing_index() {
    let tmp = tempfile::tempdir().unwrap();
    let (index, mut directory) = new_directory(tmp.path());
    directory
        .add_command_invocation(record(&["whoami"], "me", 0, "whoami"), false, true)
        .unwrap();
    let reopened =
        ResponseDirectory::open_or_create(&index, &DirectoryLayout::new("elsewhere")).unwrap();
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.blob_root(), tmp.path().join("responses"));
}
