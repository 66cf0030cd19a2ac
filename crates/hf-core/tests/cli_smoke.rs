//! End-to-end smoke test for the hostfacts binary.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn prints_a_json_object_of_facts() {
    let output = Command::cargo_bin("hostfacts")
        .unwrap()
        .args(["--no-overlays", "--quiet"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let document: serde_json::Value =
        serde_json::from_slice(&output).expect("stdout should be one JSON document");
    assert!(document.is_object(), "fact document should be an object");
}

#[test]
fn help_mentions_overlay_switch() {
    Command::cargo_bin("hostfacts")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-overlays"));
}

#[cfg(target_os = "linux")]
#[test]
fn linux_run_reports_kernel_identity() {
    let output = Command::cargo_bin("hostfacts")
        .unwrap()
        .args(["--no-overlays", "--quiet"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let document: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(document["host_kernel"], "Linux");
    assert!(document["host_kernel_release"].is_string());
}
