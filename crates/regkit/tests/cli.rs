use assert_cmd::prelude::*;
use predicates::prelude::*;
use regkit::config::RegkitConfig;
use std::path::{Path, PathBuf};
use std::process::Command;

const SNAPSHOT: &str = r#"---
HKEY_LOCAL_MACHINE:
  keys:
    SOFTWARE:
      keys:
        TEST: {}
        Vendor:
          keys:
            TEST: {}
            TESTING: {}
    EMPTY: {}
"#;

fn write_snapshot(dir: &Path) -> PathBuf {
    let path = dir.join("registry.yaml");
    std::fs::write(&path, SNAPSHOT).unwrap();
    path
}

fn regkit() -> Command {
    let mut cmd = Command::cargo_bin("regkit").unwrap();
    cmd.env_remove("REGKIT_CONFIG").env_remove("REGKIT_SNAPSHOT");
    cmd
}

fn regkit_on(snapshot: &Path) -> Command {
    let mut cmd = regkit();
    cmd.arg("--snapshot").arg(snapshot);
    cmd
}

#[test]
fn search_key_lists_matches() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(dir.path());
    regkit_on(&snapshot)
        .args(["SEARCH_KEY", "HKEY_LOCAL_MACHINE", "SOFTWARE", "TEST"])
        .assert()
        .success()
        .stdout(
            "Search result in HKEY_LOCAL_MACHINE\\SOFTWARE\\:\n\
             0. TEST\n\
             1. Vendor\\TEST\n\
             Ok!\n",
        );
}

#[test]
fn search_key_below_empty_key() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(dir.path());
    regkit_on(&snapshot)
        .args(["search-key", "HKLM", "EMPTY", "TEST"])
        .assert()
        .success()
        .stdout("No keys found!\n");
}

#[test]
fn search_key_rejects_empty_term() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(dir.path());
    regkit_on(&snapshot)
        .args(["SEARCH_KEY", "HKLM", "SOFTWARE", ""])
        .assert()
        .failure()
        .stdout("Error!\n");
}

#[test]
fn search_key_missing_root() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(dir.path());
    regkit_on(&snapshot)
        .args(["SEARCH_KEY", "HKLM", "NOPE", "TEST"])
        .assert()
        .failure()
        .stdout("Error!\n")
        .stderr(predicate::str::contains("NOPE"));
}

#[test]
fn snapshot_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(dir.path());
    let config = dir.path().join("regkit.yaml");
    let yaml = serde_yaml::to_string(&RegkitConfig {
        snapshot: Some(snapshot),
        ..Default::default()
    })
    .unwrap();
    std::fs::write(&config, yaml).unwrap();
    regkit()
        .arg("--config")
        .arg(&config)
        .args(["SEARCH_KEY", "HKLM", r"SOFTWARE\Vendor", "TESTING"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0. TESTING\nOk!\n"));
}

#[test]
fn missing_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    regkit()
        .arg("--config")
        .arg(dir.path().join("nope.yaml"))
        .args(["ADD_KEY", "HKLM", "SOFTWARE"])
        .assert()
        .failure()
        .stdout("Error!\n");
}

#[test]
fn add_key_creates_once() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(dir.path());
    regkit_on(&snapshot)
        .args(["ADD_KEY", "HKEY_LOCAL_MACHINE", r"SOFTWARE\NEW"])
        .assert()
        .success()
        .stdout("Ok!\n");
    regkit_on(&snapshot)
        .args(["ADD_KEY", "HKEY_LOCAL_MACHINE", r"SOFTWARE\NEW"])
        .assert()
        .failure()
        .stdout("Error!\n")
        .stderr(predicate::str::contains("already exists"));
    regkit_on(&snapshot)
        .args(["SEARCH_KEY", "HKLM", "SOFTWARE", "NEW"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0. NEW\n"));
}

#[test]
fn add_key_unknown_hive() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(dir.path());
    regkit_on(&snapshot)
        .args(["ADD_KEY", "HKEY_SOMEWHERE", "SOFTWARE"])
        .assert()
        .failure()
        .stdout("Error!\n");
}

#[test]
fn add_value_is_saved() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(dir.path());
    regkit_on(&snapshot)
        .args(["ADD_VALUE", "HKLM", r"SOFTWARE\TEST", "Greeting", "REG_SZ", "hello"])
        .assert()
        .success()
        .stdout("Ok!\n");
    regkit_on(&snapshot)
        .args(["ADD_VALUE", "HKLM", r"SOFTWARE\TEST", "Count", "REG_DWORD", "many"])
        .assert()
        .failure()
        .stdout("Error!\n");

    let saved = std::fs::read_to_string(&snapshot).unwrap();
    assert!(saved.contains("Greeting"));
    assert!(saved.contains("REG_SZ"));
    assert!(saved.contains("hello"));
    assert!(!saved.contains("Count"));
}

#[test]
fn notify_is_unsupported_on_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = write_snapshot(dir.path());
    regkit_on(&snapshot)
        .args(["NOTIFY", "HKLM", "SOFTWARE"])
        .assert()
        .failure()
        .stdout(predicate::str::ends_with("Error!\n"));
}

#[cfg(not(windows))]
#[test]
fn no_live_registry_without_snapshot() {
    regkit()
        .args(["SEARCH_KEY", "HKLM", "SOFTWARE", "TEST"])
        .assert()
        .failure()
        .stdout("Error!\n");
}

#[cfg(unix)]
fn flags_config(dir: &Path, script: &str) -> PathBuf {
    let config = dir.join("regkit.yaml");
    let yaml = serde_yaml::to_string(&RegkitConfig {
        flags_command: vec!["sh".into(), "-c".into(), script.into(), "{key}".into()],
        ..Default::default()
    })
    .unwrap();
    std::fs::write(&config, yaml).unwrap();
    config
}

#[cfg(unix)]
#[test]
fn view_flags_prints_each_flag() {
    let dir = tempfile::tempdir().unwrap();
    let config = flags_config(
        dir.path(),
        r#"printf '\n%s\nREG_KEY_DONT_VIRTUALIZE: 0\nREG_KEY_DONT_SILENT_FAIL: 1\nREG_KEY_RECURSE_FLAG: 0\n' "$0""#,
    );
    regkit()
        .arg("--config")
        .arg(&config)
        .args(["VIEW_FLAGS", "HKEY_LOCAL_MACHINE", r"SOFTWARE\TEST"])
        .assert()
        .success()
        .stdout(
            "Key flags:\n\
             0. Flag name: REG_KEY_DONT_VIRTUALIZE  Flag value: 0\n\
             1. Flag name: REG_KEY_DONT_SILENT_FAIL  Flag value: 1\n\
             2. Flag name: REG_KEY_RECURSE_FLAG  Flag value: 0\n\
             Ok!\n",
        );
}

#[cfg(unix)]
#[test]
fn view_flags_tool_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = flags_config(
        dir.path(),
        "echo 'ERROR: The system was unable to find the specified registry key'; exit 1",
    );
    regkit()
        .arg("--config")
        .arg(&config)
        .args(["VIEW_FLAGS", "HKLM", "NOPE"])
        .assert()
        .failure()
        .stdout("Error!\n")
        .stderr(predicate::str::contains("REG_KEY_DONT_VIRTUALIZE"));
}

#[cfg(unix)]
#[test]
fn view_flags_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let config = flags_config(dir.path(), "exec sleep 10");
    regkit()
        .arg("--config")
        .arg(&config)
        .args(["VIEW_FLAGS", "HKLM", "SOFTWARE", "--timeout", "1"])
        .assert()
        .failure()
        .stdout("Error!\n");
}

#[cfg(unix)]
#[test]
fn view_flags_timeout_is_not_held_by_a_forked_tool() {
    let dir = tempfile::tempdir().unwrap();
    let config = flags_config(dir.path(), "sleep 6; echo $0");
    let started = std::time::Instant::now();
    regkit()
        .arg("--config")
        .arg(&config)
        .args(["VIEW_FLAGS", "HKLM", "SOFTWARE", "--timeout", "1"])
        .assert()
        .failure()
        .stdout("Error!\n");
    assert!(started.elapsed() < std::time::Duration::from_secs(4));
}
