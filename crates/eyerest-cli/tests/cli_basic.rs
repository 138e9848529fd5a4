//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary home directory,
//! so the database and config file start empty.

use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_eyerest"))
        .args(args)
        .env("HOME", home)
        .env_remove("EYEREST_ENV")
        .env("EYEREST_LOG", "warn")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_ok(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    stdout
}

/// Parse a stream of pretty-printed JSON documents.
fn json_docs(stdout: &str) -> Vec<Value> {
    serde_json::Deserializer::from_str(stdout)
        .into_iter::<Value>()
        .collect::<Result<_, _>>()
        .expect("stdout is not JSON")
}

fn home() -> TempDir {
    tempfile::tempdir().unwrap()
}

#[test]
fn test_timer_status_defaults() {
    let home = home();
    let docs = json_docs(&run_ok(home.path(), &["timer", "status"]));
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["type"], "state_snapshot");
    assert_eq!(docs[0]["timer"], "eye");
    assert_eq!(docs[0]["total_secs"], 1200);
    assert_eq!(docs[0]["display"], "20:00");
    assert_eq!(docs[1]["timer"], "posture");
    assert_eq!(docs[1]["total_secs"], 2700);
}

#[test]
fn test_timer_start_persists_running_state() {
    let home = home();
    let docs = json_docs(&run_ok(home.path(), &["timer", "start", "eye"]));
    assert_eq!(docs[0]["type"], "timer_started");

    let docs = json_docs(&run_ok(home.path(), &["timer", "status", "eye"]));
    assert_eq!(docs[0]["phase"], "running");
    assert!(docs[0]["next_break"].is_string());

    let docs = json_docs(&run_ok(home.path(), &["timer", "pause", "eye"]));
    assert_eq!(docs[0]["type"], "timer_paused");
    let docs = json_docs(&run_ok(home.path(), &["timer", "status", "eye"]));
    assert_eq!(docs[0]["phase"], "paused");
}

#[test]
fn test_timer_reset_with_minutes() {
    let home = home();
    let docs = json_docs(&run_ok(
        home.path(),
        &["timer", "reset", "posture", "--minutes", "5"],
    ));
    assert_eq!(docs[0]["type"], "timer_reset");
    assert_eq!(docs[0]["total_secs"], 300);

    let (_, _, code) = run_cli(home.path(), &["timer", "reset", "posture", "--minutes", "0"]);
    assert_ne!(code, 0);
}

#[test]
fn test_timer_rejects_unknown_kind() {
    let home = home();
    let (_, stderr, code) = run_cli(home.path(), &["timer", "start", "kitchen"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("kitchen"));
}

#[test]
fn test_config_set_interval_resets_timer() {
    let home = home();
    run_ok(home.path(), &["timer", "start", "eye"]);
    assert_eq!(run_ok(home.path(), &["config", "set", "eyeInterval", "25"]).trim(), "ok");
    assert_eq!(run_ok(home.path(), &["config", "get", "eyeInterval"]).trim(), "25");

    let docs = json_docs(&run_ok(home.path(), &["timer", "status", "eye"]));
    assert_eq!(docs[0]["total_secs"], 1500);
    assert_eq!(docs[0]["phase"], "paused");
}

#[test]
fn test_config_rejects_bad_input() {
    let home = home();
    let (_, stderr, code) = run_cli(home.path(), &["config", "set", "eyeInterval", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));

    let (_, _, code) = run_cli(home.path(), &["config", "get", "theme"]);
    assert_eq!(code, 1);
}

#[test]
fn test_config_list_and_reset() {
    let home = home();
    run_ok(home.path(), &["config", "set", "soundAlerts", "true"]);
    let docs = json_docs(&run_ok(home.path(), &["config", "list"]));
    assert_eq!(docs[0]["soundAlerts"], true);

    run_ok(home.path(), &["config", "reset"]);
    let docs = json_docs(&run_ok(home.path(), &["config", "list"]));
    assert_eq!(docs[0]["soundAlerts"], false);
    assert_eq!(docs[0]["eyeInterval"], 20);
}

#[test]
fn test_streak_show_and_goals() {
    let home = home();
    let docs = json_docs(&run_ok(home.path(), &["streak", "show"]));
    assert_eq!(docs[0]["streak"]["currentStreak"], 0);
    assert_eq!(docs[0]["week"].as_array().unwrap().len(), 7);
    assert_eq!(docs[0]["message"], "Start your wellness streak today!");

    let docs = json_docs(&run_ok(home.path(), &["streak", "weekly-goal", "20"]));
    assert_eq!(docs[0]["weeklyGoal"], 20);

    let (_, _, code) = run_cli(home.path(), &["streak", "streak-goal", "0"]);
    assert_eq!(code, 1);
}

#[test]
fn test_sound_settings() {
    let home = home();
    run_ok(home.path(), &["sound", "set", "soundType", "bell"]);
    let docs = json_docs(&run_ok(home.path(), &["sound", "show"]));
    assert_eq!(docs[0]["settings"]["soundType"], "bell");
    assert_eq!(docs[0]["tone"]["steps"][0]["frequency_hz"], 523);

    let (_, _, code) = run_cli(home.path(), &["sound", "set", "volume", "3"]);
    assert_eq!(code, 1);
}

#[test]
fn test_stats_start_empty() {
    let home = home();
    let docs = json_docs(&run_ok(home.path(), &["stats", "all"]));
    assert_eq!(docs[0]["total_breaks"], 0);
    let docs = json_docs(&run_ok(home.path(), &["stats", "recent"]));
    assert_eq!(docs[0], Value::Array(vec![]));
}

#[test]
fn test_unopenable_database_reports_storage_error() {
    let home = home();
    let dir = home.path().join(".config").join("eyerest");
    std::fs::create_dir_all(&dir).unwrap();
    let missing = home.path().join("no-such-dir").join("eyerest.db");
    std::fs::write(
        dir.join("config.toml"),
        format!("[storage]\ndatabase = {:?}\n", missing.to_string_lossy()),
    )
    .unwrap();

    let (_, stderr, code) = run_cli(home.path(), &["stats", "all"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Storage error"), "{stderr}");
}

#[test]
fn test_status_polling_does_not_stall_running_timer() {
    let home = home();
    run_ok(home.path(), &["timer", "start", "eye"]);
    for _ in 0..4 {
        std::thread::sleep(std::time::Duration::from_millis(400));
        run_ok(home.path(), &["timer", "status", "eye"]);
    }
    std::thread::sleep(std::time::Duration::from_millis(400));
    let docs = json_docs(&run_ok(home.path(), &["timer", "status", "eye"]));
    let left = docs[0]["time_left_secs"].as_u64().unwrap();
    assert!(left <= 1198, "time_left_secs = {left}");
}
