// SPDX-License-Identifier: MIT OR Apache-2.0

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn fixture() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/users.json")
}

/// Command isolated from any user config, with colors off.
fn udash(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("udash"));
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    let out = String::from_utf8(output.stdout.clone()).expect("utf8");
    serde_json::from_str(&out).expect("json")
}

fn names(records: &Value) -> Vec<String> {
    records
        .as_array()
        .expect("records array")
        .iter()
        .map(|r| r["name"].as_str().expect("name").to_string())
        .collect()
}

#[test]
fn list_json_shows_first_page() {
    let dir = TempDir::new().expect("tempdir");
    let assert = udash(dir.path())
        .args(["--no-persist", "--fixture", fixture(), "--format", "json", "list"])
        .assert()
        .success();

    let view = stdout_json(assert.get_output());
    assert_eq!(view["total_users"], 10);
    assert_eq!(view["filtered_count"], 10);
    assert_eq!(view["page"]["current_page"], 1);
    assert_eq!(view["page"]["total_pages"], 2);
    assert_eq!(view["records"].as_array().expect("records").len(), 6);
    assert_eq!(view["error"], Value::Null);
}

#[test]
fn list_with_search_filter_and_page() {
    let dir = TempDir::new().expect("tempdir");
    let assert = udash(dir.path())
        .args([
            "--no-persist", "--fixture", fixture(), "--format", "json", "list", "--search",
            "hoeger", "--filter", "email",
        ])
        .assert()
        .success();
    let view = stdout_json(assert.get_output());
    assert_eq!(names(&view["records"]), vec!["Kurtis Weissnat"]);
    assert_eq!(view["filter"], "email");

    let assert = udash(dir.path())
        .args([
            "--no-persist", "--fixture", fixture(), "--format", "json", "list", "--page", "2",
            "--per-page", "4",
        ])
        .assert()
        .success();
    let view = stdout_json(assert.get_output());
    assert_eq!(view["page"]["total_pages"], 3);
    assert_eq!(view["page"]["start_index"], 4);
    assert_eq!(
        names(&view["records"]),
        vec![
            "Chelsey Dietrich",
            "Mrs. Dennis Schulist",
            "Kurtis Weissnat",
            "Nicholas Runolfsdottir V"
        ]
    );
}

#[test]
fn list_text_output() {
    let dir = TempDir::new().expect("tempdir");
    udash(dir.path())
        .args(["--no-persist", "--fixture", fixture(), "list", "-s", "romaguera"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Leanne Graham"))
        .stdout(predicate::str::contains("Clementine Bauch"))
        .stdout(predicate::str::contains("Romaguera-Jacobson"))
        .stdout(predicate::str::contains("Ervin Howell").not());
}

#[test]
fn search_json_reports_matches_and_stats() {
    let dir = TempDir::new().expect("tempdir");
    let assert = udash(dir.path())
        .args([
            "--no-persist", "--fixture", fixture(), "--format", "json", "--compact", "search",
            "clementin",
        ])
        .assert()
        .success();

    let output = stdout_json(assert.get_output());
    assert_eq!(output["strategy"], "token");
    assert_eq!(output["total"], 2);
    assert_eq!(output["stats"]["total_results"], 2);
    assert_eq!(output["stats"]["cache_hit"], false);
    assert_eq!(names(&output["results"]), vec!["Clementine Bauch", "Clementina DuBuque"]);
}

#[test]
fn simple_search_skips_fuzzy_rules() {
    let dir = TempDir::new().expect("tempdir");
    let assert = udash(dir.path())
        .args([
            "--no-persist", "--fixture", fixture(), "--format", "json", "search", "hoeger",
            "--simple",
        ])
        .assert()
        .success();

    // Street names are not part of the simple match.
    let output = stdout_json(assert.get_output());
    assert_eq!(output["strategy"], "field");
    assert_eq!(names(&output["results"]), vec!["Kurtis Weissnat", "Clementina DuBuque"]);
}

#[test]
fn search_limit_is_reported_in_text_mode() {
    let dir = TempDir::new().expect("tempdir");
    udash(dir.path())
        .args(["--no-persist", "--fixture", fixture(), "search", "hoeger", "-m", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Patricia Lebsack"))
        .stdout(predicate::str::contains("Showing 1 of 3 matches"));
}

#[test]
fn show_prints_user_details() {
    let dir = TempDir::new().expect("tempdir");
    udash(dir.path())
        .args(["--no-persist", "--fixture", fixture(), "show", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Chelsey Dietrich"))
        .stdout(predicate::str::contains("@Kamren"))
        .stdout(predicate::str::contains("Skiles Walks, Suite 351, Roscoeview, 33263"))
        .stdout(predicate::str::contains("(254) 954-1289"));
}

#[test]
fn show_missing_user_fails_with_status() {
    let dir = TempDir::new().expect("tempdir");
    udash(dir.path())
        .args(["--no-persist", "--fixture", fixture(), "show", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("HTTP error! status: 404"));
}

#[test]
fn unreachable_endpoint_prints_retry_hint() {
    let dir = TempDir::new().expect("tempdir");
    udash(dir.path())
        .args(["--no-persist", "--api-url", "http://127.0.0.1:9/users", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to fetch users"))
        .stderr(predicate::str::contains("Run the command again to retry."));
}

#[test]
fn missing_fixture_fails() {
    let dir = TempDir::new().expect("tempdir");
    udash(dir.path())
        .args(["--no-persist", "--fixture", "does-not-exist.json", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.json"));
}

#[test]
fn search_term_persists_between_runs() {
    let dir = TempDir::new().expect("tempdir");
    let state = dir.path().join("state").join("state.json");
    fs::write(
        dir.path().join(".udashrc.toml"),
        format!("state_file = '{}'\nitems_per_page = 2\n", state.display()),
    )
    .expect("write config");

    udash(dir.path())
        .args(["--fixture", fixture(), "list", "--search", "hoeger", "--page", "2"])
        .assert()
        .success();
    assert!(state.exists());

    let assert = udash(dir.path())
        .args(["--fixture", fixture(), "--format", "json", "list"])
        .assert()
        .success();
    let view = stdout_json(assert.get_output());
    assert_eq!(view["search_term"], "hoeger");
    assert_eq!(view["filtered_count"], 3);
    assert_eq!(view["page"]["current_page"], 2);
    assert_eq!(names(&view["records"]), vec!["Clementina DuBuque"]);
}

#[test]
fn interactive_renders_when_piped_term_settles() {
    let dir = TempDir::new().expect("tempdir");
    let assert = udash(dir.path())
        .args(["--no-persist", "--fixture", fixture(), "--format", "json", "interactive"])
        .write_stdin("/page 2\nkurtis\n")
        .assert()
        .success();

    let out = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let frames: Vec<Value> = out
        .lines()
        .map(|line| serde_json::from_str(line).expect("json frame"))
        .collect();
    assert!(frames.len() >= 3);
    assert_eq!(frames[0]["filtered_count"], 10);
    assert_eq!(frames[1]["page"]["current_page"], 2);
    let last = frames.last().expect("last frame");
    assert_eq!(last["settled_term"], "kurtis");
    assert_eq!(names(&last["records"]), vec!["Kurtis Weissnat"]);
}

#[test]
fn completions_are_generated() {
    let dir = TempDir::new().expect("tempdir");
    udash(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("udash"));
}
