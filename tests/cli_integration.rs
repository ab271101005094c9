//! CLI integration tests for eview
//!
//! These run the binary headless: listing viewers, one-shot renders,
//! configuration and the devtools console. Every test gets its own config
//! and log locations so the user's files are never read.

use predicates::prelude::*;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Viewer that copies the script to the graphic path
const COPY_VIEWER: &str = r##"
debounce_ms = 200

[[viewers]]
key = "copy"
title = "copy"
command = "#!/bin/sh\necho copying\ncp \"$1\" \"$2\"\n"
extensions = ["txt"]

[[viewers]]
key = "broken"
title = "broken"
command = "#!/bin/sh\necho boom >&2\nexit 3\n"
extensions = ["bad"]
"##;

/// Get a command instance for the eview binary, isolated in `dir`
fn eview_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("eview"));
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env("HOME", dir)
        .env("EVIEW_DEVTOOLS_LOG", dir.join("devtools.log"))
        .env_remove("EVIEW_DEVTOOLS")
        .env_remove("EVIEW_CONFIG");
    cmd
}

/// Temporary directory with a project config defining test viewers
fn setup_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".eview.toml"), COPY_VIEWER).unwrap();
    dir
}

// =============================================================================
// Viewer Tests
// =============================================================================

#[test]
fn test_viewers_lists_builtins() {
    let dir = TempDir::new().unwrap();

    eview_cmd(dir.path())
        .arg("viewers")
        .assert()
        .success()
        .stdout(predicate::str::contains("gnuplot"))
        .stdout(predicate::str::contains("tex2im/math"))
        .stdout(predicate::str::contains("custom"));
}

#[test]
fn test_viewers_json_includes_configured() {
    let dir = setup_project();

    let output = eview_cmd(dir.path())
        .args(["viewers", "--format", "json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let viewers: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let keys: Vec<&str> = viewers
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["key"].as_str().unwrap())
        .collect();

    assert_eq!(
        keys,
        ["gnuplot", "tex2im-math", "tex2im-tikz", "custom", "copy", "broken"]
    );
}

// =============================================================================
// Render Tests
// =============================================================================

#[cfg(unix)]
#[test]
fn test_render_writes_graphic() {
    let dir = setup_project();
    fs::write(dir.path().join("plot.txt"), "hello").unwrap();

    eview_cmd(dir.path())
        .args(["render", "plot.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("copying"))
        .stdout(predicate::str::contains("Wrote"));

    assert_eq!(fs::read_to_string(dir.path().join("plot.png")).unwrap(), "hello");
}

#[cfg(unix)]
#[test]
fn test_render_respects_output_flag() {
    let dir = setup_project();
    fs::write(dir.path().join("plot.txt"), "hello").unwrap();

    eview_cmd(dir.path())
        .args(["render", "plot.txt", "-o", "custom-name.out"])
        .assert()
        .success();

    assert!(dir.path().join("custom-name.out").is_file());
    assert!(!dir.path().join("plot.png").exists());
}

#[cfg(unix)]
#[test]
fn test_render_json_reports_outcome() {
    let dir = setup_project();
    fs::write(dir.path().join("plot.txt"), "hello").unwrap();

    let output = eview_cmd(dir.path())
        .args(["render", "plot.txt", "--format", "json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["viewer"], "copy");
    assert_eq!(report["success"], true);
    assert_eq!(report["status"], 0);
    assert_eq!(report["graphic"]["size"], 5);
}

#[cfg(unix)]
#[test]
fn test_render_failure_exits_nonzero() {
    let dir = setup_project();
    fs::write(dir.path().join("plot.bad"), "anything").unwrap();

    eview_cmd(dir.path())
        .args(["render", "plot.bad"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("boom"))
        .stdout(predicate::str::contains("Render failed (exit 3"));
}

#[cfg(unix)]
#[test]
fn test_render_with_explicit_viewer() {
    let dir = setup_project();
    fs::write(dir.path().join("notes.md"), "# hi").unwrap();

    eview_cmd(dir.path())
        .args(["render", "--viewer", "copy", "notes.md"])
        .assert()
        .success();

    assert!(dir.path().join("notes.png").is_file());
}

#[cfg(unix)]
#[test]
fn test_render_keeps_custom_cmd_file() {
    let dir = setup_project();
    fs::write(dir.path().join("plot.txt"), "hello").unwrap();

    eview_cmd(dir.path())
        .args(["render", "plot.txt", "--cmd-file", "mycmd.sh"])
        .assert()
        .success();

    let cmd = fs::read_to_string(dir.path().join("mycmd.sh")).unwrap();
    assert!(cmd.contains("cp \"$1\" \"$2\""));
}

#[test]
fn test_render_missing_script_fails() {
    let dir = setup_project();

    eview_cmd(dir.path())
        .args(["render", "nope.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Script not found"));
}

#[test]
fn test_render_unknown_viewer_fails() {
    let dir = setup_project();
    fs::write(dir.path().join("plot.txt"), "hello").unwrap();

    eview_cmd(dir.path())
        .args(["render", "--viewer", "nope", "plot.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown viewer 'nope'"));
}

#[test]
fn test_render_unmatched_extension_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("data.xyz"), "1 2 3").unwrap();

    eview_cmd(dir.path())
        .args(["render", "data.xyz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Pass --viewer"));
}

#[test]
fn test_render_empty_script_fails() {
    let dir = setup_project();
    fs::write(dir.path().join("empty.txt"), "").unwrap();

    eview_cmd(dir.path())
        .args(["render", "empty.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to render"));
}

// =============================================================================
// Watch Tests
// =============================================================================

/// Kills a spawned `eview watch` when the test ends, pass or fail
struct Watcher(std::process::Child);

impl Drop for Watcher {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

/// Polls until `path` holds `expected` or the timeout passes
fn wait_for_content(path: &Path, expected: &str) -> bool {
    let deadline = Instant::now() + Duration::from_secs(15);
    while Instant::now() < deadline {
        if fs::read_to_string(path).map(|c| c == expected).unwrap_or(false) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

#[cfg(unix)]
#[test]
fn test_watch_rerenders_on_change() {
    let dir = setup_project();
    let script = dir.path().join("plot.txt");
    let graphic = dir.path().join("plot.png");
    fs::write(&script, "first").unwrap();

    let child = std::process::Command::new(assert_cmd::cargo::cargo_bin!("eview"))
        .current_dir(dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join(".config"))
        .env("HOME", dir.path())
        .env("EVIEW_DEVTOOLS_LOG", dir.path().join("devtools.log"))
        .env_remove("EVIEW_DEVTOOLS")
        .env_remove("EVIEW_CONFIG")
        .args(["watch", "plot.txt"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    let mut watcher = Watcher(child);

    assert!(wait_for_content(&graphic, "first"), "initial render missing");

    // The banner is printed once the directory watch is registered
    let stderr = watcher.0.stderr.take().unwrap();
    let mut lines = BufReader::new(stderr).lines();
    let banner = lines.find(|l| l.as_ref().map(|l| l.contains("Watching")).unwrap_or(true));
    assert!(matches!(banner, Some(Ok(_))), "watch did not start");

    fs::write(&script, "second").unwrap();

    assert!(wait_for_content(&graphic, "second"), "change was not rendered");
}

#[test]
fn test_watch_missing_script_fails() {
    let dir = setup_project();

    eview_cmd(dir.path())
        .args(["watch", "nope.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Script not found"));
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_config_defaults() {
    let dir = TempDir::new().unwrap();

    eview_cmd(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("debounce_ms = 500"));
}

#[test]
fn test_config_reads_project_file() {
    let dir = setup_project();

    eview_cmd(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("debounce_ms = 200"));
}

#[test]
fn test_config_path_lists_sources() {
    let dir = setup_project();

    eview_cmd(dir.path())
        .args(["config", "--path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(".eview.toml"))
        .stdout(predicate::str::contains("Devtools log"));
}

#[test]
fn test_config_env_override() {
    let dir = TempDir::new().unwrap();
    let alt = dir.path().join("alt.toml");
    fs::write(&alt, "debounce_ms = 900\n").unwrap();

    eview_cmd(dir.path())
        .env("EVIEW_CONFIG", &alt)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("debounce_ms = 900"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".eview.toml"), "debounce_ms = 0\n").unwrap();

    eview_cmd(dir.path())
        .arg("viewers")
        .assert()
        .failure()
        .stderr(predicate::str::contains("debounce_ms"));
}

// =============================================================================
// Console Tests
// =============================================================================

#[test]
fn test_console_without_log() {
    let dir = TempDir::new().unwrap();

    eview_cmd(dir.path())
        .arg("console")
        .assert()
        .success()
        .stdout(predicate::str::contains("No devtools log found"));
}

#[cfg(unix)]
#[test]
fn test_console_shows_render_log() {
    let dir = setup_project();
    fs::write(dir.path().join("plot.txt"), "hello").unwrap();

    eview_cmd(dir.path())
        .env("EVIEW_DEVTOOLS", "1")
        .args(["render", "plot.txt"])
        .assert()
        .success();

    eview_cmd(dir.path())
        .args(["console", "-n", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[render] Running copy"));
}

// =============================================================================
// Help Tests
// =============================================================================

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();

    eview_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("console"));
}

// =============================================================================
// Task Runner Tests
// =============================================================================

#[test]
fn test_justfile_console_task() {
    let justfile = fs::read_to_string(Path::new(env!("CARGO_MANIFEST_DIR")).join("justfile")).unwrap();

    let recipe = justfile
        .split("\ntextual-console:\n")
        .nth(1)
        .expect("textual-console recipe");
    assert!(recipe.lines().next().unwrap().contains("cargo run -- console"));
    assert!(justfile.contains("alias console := textual-console"));
    assert!(justfile.contains("EVIEW_DEVTOOLS=1 cargo run -- {{ARGS}}"));
    assert!(justfile.starts_with("set dotenv-load"));
}
