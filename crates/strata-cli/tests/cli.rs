//! Runs the `strata` binary against a project on disk.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::{TempDir, tempdir};

const CATALOG: &str = r#"{
  "python": { "version": "3.12.4", "builder": "autotools" },
  "numpy": {
    "version": "1.26.0",
    "builder": "python",
    "inputs": { "python": "python" },
    "excluded_tests": ["test_simd"]
  },
  "backend": {
    "version": "0.4.0",
    "builder": "python",
    "inputs": { "python": "python", "numpy": "numpy" }
  },
  "frontend": { "version": "0.4.0", "builder": "npm" }
}"#;

const LAYER: &str = r#"
components:
  numpy:
    modify:
      version: "1.26.4"
      excluded_tests: { union: [test_mem_policy] }
"#;

const DEPLOYMENT: &str = r"
proxy:
  enable: true
  routes:
    - { prefix: /api, service: backend }
";

fn project(dir: &Path) {
    std::fs::write(dir.join("catalog.json"), CATALOG).unwrap();
    std::fs::write(dir.join("numpy-fixes.yaml"), LAYER).unwrap();
    std::fs::write(dir.join("deploy.yaml"), DEPLOYMENT).unwrap();
    std::fs::write(
        dir.join("strata.yaml"),
        "catalog: catalog.json\nlayers: [numpy-fixes.yaml]\ndeployment: deploy.yaml\n",
    )
    .unwrap();
}

fn setup() -> TempDir {
    let dir = tempdir().unwrap();
    project(dir.path());
    dir
}

fn strata(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_strata"))
        .current_dir(dir)
        .env_remove("STRATA_PROJECT")
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn resolve_prints_layered_plans() {
    let dir = setup();
    let output = strata(dir.path(), &["resolve", "numpy"]);
    assert!(output.status.success(), "{output:?}");

    let plans: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plans["numpy"]["version"], "1.26.4");
    assert_eq!(
        plans["numpy"]["excluded_tests"],
        serde_json::json!(["test_simd", "test_mem_policy"])
    );
    assert_eq!(plans["numpy"]["inputs"]["python"]["kind"], "catalog");
}

#[test]
fn resolve_rejects_unknown_name() {
    let dir = setup();
    let output = strata(dir.path(), &["resolve", "scipy"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("scipy"));
}

#[test]
fn order_lists_dependencies_first() {
    let dir = setup();
    let output = strata(dir.path(), &["order", "--json"]);
    assert!(output.status.success(), "{output:?}");
    let order: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
    assert!(pos("python") < pos("numpy"));
    assert!(pos("numpy") < pos("backend"));
}

#[test]
fn compile_is_byte_identical_across_runs() {
    let dir = setup();
    let first = strata(dir.path(), &["compile"]);
    let second = strata(dir.path(), &["compile"]);
    assert!(first.status.success(), "{first:?}");
    assert_eq!(first.stdout, second.stdout);

    let deployment: Value = serde_json::from_slice(&first.stdout).unwrap();
    assert_eq!(deployment["services"][0]["name"], "backend");
    assert_eq!(deployment["services"][1]["name"], "frontend");
}

#[test]
fn compile_writes_output_file() {
    let dir = setup();
    let out = dir.path().join("deployment.json");
    let output = strata(dir.path(), &["compile", "--output", out.to_str().unwrap()]);
    assert!(output.status.success(), "{output:?}");
    assert!(output.stdout.is_empty());
    let written: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert!(written["routing"].is_object());
}

#[test]
fn route_reports_target_service() {
    let dir = setup();
    let output = strata(dir.path(), &["route", "/api/chat"]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "/api/chat -> backend (http://127.0.0.1:8001)\n");
}

#[test]
fn missing_manifest_fails_with_context() {
    let dir = tempdir().unwrap();
    let output = strata(dir.path(), &["order"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load project manifest"));
}
