//! Offline end-to-end pipeline test: ingest, index, search, diff

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

const SAMPLE_HTML: &str = concat!(
    "<html><head><title>Quarterly planning</title></head><body>",
    "<h1>Quarterly planning</h1>",
    "<p>Roadmap priorities for the search team.</p>",
    "<p>Follow up with infra about capacity.</p>",
    "</body></html>"
);

fn notemill(json_root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("notemill").expect("binary");
    cmd.arg("--json-root").arg(json_root);
    cmd
}

#[test]
fn ingest_index_search_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let json_root = dir.path().join("data");
    let export = dir.path().join("note.html");
    fs::write(&export, SAMPLE_HTML).expect("write export");

    notemill(&json_root)
        .arg("ingest")
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("Quarterly planning"));

    notemill(&json_root)
        .arg("build-index")
        .assert()
        .success()
        .stdout(predicate::str::contains("Indexed 1 notes"));

    notemill(&json_root)
        .arg("search")
        .arg("roadmap")
        .assert()
        .success()
        .stdout(predicate::str::contains("Quarterly planning"));

    notemill(&json_root)
        .arg("search")
        .arg("nonexistentterm")
        .assert()
        .success()
        .stdout(predicate::str::contains("No results"));

    notemill(&json_root)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Journal entries: 1"))
        .stdout(predicate::str::contains("Index: 1 notes"));

    notemill(&json_root)
        .arg("diff")
        .assert()
        .success()
        .stdout(predicate::str::contains("raw -> clean"));
}

#[test]
fn batch_walks_directories_and_reports() {
    let dir = tempfile::tempdir().expect("tempdir");
    let json_root = dir.path().join("data");
    let exports = dir.path().join("exports");
    fs::create_dir_all(exports.join("inner")).expect("mkdir");
    fs::write(exports.join("a.html"), SAMPLE_HTML).expect("write");
    fs::write(
        exports.join("inner/b.htm"),
        "<html><body><p>second note</p></body></html>",
    )
    .expect("write");

    notemill(&json_root)
        .arg("batch")
        .arg(&exports)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 files, 2 succeeded, 0 failed"));

    // A capped run over a fresh store only touches the first file.
    let capped_root = dir.path().join("capped");
    notemill(&capped_root)
        .arg("batch")
        .arg(&exports)
        .arg("--limit")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 files, 1 succeeded, 0 failed"));

    notemill(&json_root)
        .arg("build-index")
        .arg("--with-vectors")
        .assert()
        .success()
        .stdout(predicate::str::contains("Indexed 2 notes"))
        .stdout(predicate::str::contains("Encoded 2 notes"));

    assert!(json_root.join("vector_store.json").exists());
}

#[test]
fn search_without_an_index_fails_cleanly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let json_root = dir.path().join("data");

    notemill(&json_root)
        .arg("search")
        .arg("anything")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Index not found"));
}
