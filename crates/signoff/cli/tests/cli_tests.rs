//! Command-line tests for the `signoff` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

const CONFIG: &str = r#"
[[templates]]
id = "memo"
name = "Memo"

[[templates.steps]]
step_number = 1
required_role = "AUTHOR"
action = "write"
target_section = "memo"

[[templates.steps]]
step_number = 2
required_role = "HEAD"
action = "sign"
target_section = "memo"
signature_field = "memo.sig"

[[templates.return_rules]]
from_step = 2
roles = ["HEAD"]
"#;

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 1];

fn signoff() -> Command {
    let mut cmd = Command::cargo_bin("signoff").unwrap();
    cmd.env_remove("SIGNOFF_CONFIG").env("NO_COLOR", "1");
    cmd
}

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("signoff.toml"), CONFIG).unwrap();
    std::fs::write(dir.path().join("sig.png"), PNG).unwrap();
    dir
}

fn config(dir: &Path) -> String {
    dir.join("signoff.toml").display().to_string()
}

#[test]
fn check_lists_templates() {
    let dir = workspace();
    signoff()
        .args(["--config", &config(dir.path()), "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("memo"))
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn check_requires_config() {
    signoff()
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--config"));
}

#[test]
fn check_rejects_broken_template() {
    let dir = workspace();
    let broken = CONFIG.replace("step_number = 2", "step_number = 5");
    std::fs::write(dir.path().join("broken.toml"), broken).unwrap();
    signoff()
        .args(["-c", &dir.path().join("broken.toml").display().to_string(), "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid template"));
}

#[test]
fn show_prints_steps_as_json() {
    let dir = workspace();
    let output = signoff()
        .args(["-c", &config(dir.path()), "-o", "json", "show", "memo"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows[1]["signature"], "memo.sig");
    assert_eq!(rows[1]["returns_to"], "1");
}

#[test]
fn inspect_accepts_png_and_rejects_text() {
    let dir = workspace();
    signoff()
        .args(["inspect-signature", &dir.path().join("sig.png").display().to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("image/png"));

    std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
    signoff()
        .args(["inspect-signature", &dir.path().join("notes.txt").display().to_string()])
        .assert()
        .failure();
}

#[test]
fn simulate_runs_a_script() {
    let dir = workspace();
    let script = r#"
- op: open
  template: memo
- op: complete
  step: 1
  user: alice
  role: AUTHOR
- op: register_signature
  user: bob
  image: sig.png
- op: bind
  field: memo.sig
  user: bob
  roles: [HEAD]
- op: complete
  step: 2
  user: bob
  role: HEAD
"#;
    std::fs::write(dir.path().join("run.yaml"), script).unwrap();
    signoff()
        .args([
            "-c",
            &config(dir.path()),
            "simulate",
            &dir.path().join("run.yaml").display().to_string(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("at done"))
        .stdout(predicate::str::contains("audit chain intact"));
}
