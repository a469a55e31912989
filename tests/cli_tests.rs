//! Command-line behavior of the supply-solver binary

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, value: &serde_json::Value) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, value.to_string()).unwrap();
    path
}

fn requirement_set() -> serde_json::Value {
    serde_json::json!({
        "id": "bracket",
        "name": "Bracket",
        "requirements": [
            {"id": "cnc-machining", "name": "CNC Machining"},
            {"id": "welding", "name": "Welding"}
        ]
    })
}

fn provider_catalog() -> serde_json::Value {
    serde_json::json!({
        "version": "1.0.0",
        "providers": [
            {
                "id": "fab-lab",
                "name": "Fab Lab",
                "capabilities": [
                    {"id": "cnc-machining", "name": "cnc machining"},
                    {"id": "welding", "name": "Welding"}
                ]
            },
            {
                "id": "print-shop",
                "name": "Print Shop",
                "capabilities": [{"id": "3d-printing", "name": "3D Printing"}]
            }
        ]
    })
}

fn solver() -> Command {
    Command::cargo_bin("supply-solver").unwrap()
}

#[test]
fn test_help_lists_commands() {
    solver()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("solve"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn test_score_near_miss() {
    solver()
        .args(["score", "CNC Machining", "CNC Machinng", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("near_miss"))
        .stdout(predicate::str::contains("\"distance\": 1"));
}

#[test]
fn test_rules_expand_abbreviation() {
    solver()
        .args(["rules", "--term", "CNC"])
        .assert()
        .success()
        .stdout(predicate::str::contains("computer numerical control"));
}

#[test]
fn test_solve_and_validate_saved_tree() {
    let dir = TempDir::new().unwrap();
    let requirements = write(dir.path(), "requirements.json", &requirement_set());
    let providers = write(dir.path(), "providers.json", &provider_catalog());
    let tree = dir.path().join("tree.json");

    solver()
        .arg("solve")
        .arg(&requirements)
        .arg(&providers)
        .arg("--output")
        .arg(&tree)
        .assert()
        .success()
        .stdout(predicate::str::contains("Fab Lab"))
        .stdout(predicate::str::contains("print-shop"));

    assert!(tree.exists());

    solver()
        .arg("validate")
        .arg(&tree)
        .assert()
        .success()
        .stdout(predicate::str::contains("no issues found"));

    solver()
        .arg("validate")
        .arg(&tree)
        .arg("--providers")
        .arg(&providers)
        .arg("--requirements")
        .arg(&requirements)
        .assert()
        .success();
}

#[test]
fn test_live_validation_detects_withdrawn_capability() {
    let dir = TempDir::new().unwrap();
    let requirements = write(dir.path(), "requirements.json", &requirement_set());
    let providers = write(dir.path(), "providers.json", &provider_catalog());
    let tree = dir.path().join("tree.json");

    solver()
        .arg("solve")
        .arg(&requirements)
        .arg(&providers)
        .arg("--output")
        .arg(&tree)
        .assert()
        .success();

    let mut changed = provider_catalog();
    changed["providers"][0]["capabilities"] = serde_json::json!([{"id": "welding", "name": "Welding"}]);
    let changed = write(dir.path(), "changed.json", &changed);

    solver()
        .arg("validate")
        .arg(&tree)
        .arg("--providers")
        .arg(&changed)
        .assert()
        .failure()
        .stdout(predicate::str::contains("no longer offered"));
}

#[test]
fn test_solve_json_output() {
    let dir = TempDir::new().unwrap();
    let requirements = write(dir.path(), "requirements.json", &requirement_set());
    let providers = write(dir.path(), "providers.json", &provider_catalog());

    let output = solver()
        .arg("solve")
        .arg(&requirements)
        .arg(&providers)
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["solutions"].as_array().unwrap().len(), 1);
    assert_eq!(report["solutions"][0]["provider"], "fab-lab");
    assert_eq!(report["rejections"][0]["reason"]["type"], "unsatisfied");
}

#[test]
fn test_solve_domain_documents() {
    let dir = TempDir::new().unwrap();
    let recipe = write(
        dir.path(),
        "recipe.json",
        &serde_json::json!({
            "title": "Tomato Soup",
            "techniques": ["Simmering"],
            "ingredients": ["Tomato", "Onion"]
        }),
    );
    let kitchens = write(
        dir.path(),
        "kitchens.json",
        &serde_json::json!([
            {"name": "Corner Bistro", "techniques": ["simmering"], "ingredients": ["Tomato", "Onion"]},
            {"name": "Juice Bar", "ingredients": ["Tomato"]}
        ]),
    );

    solver()
        .arg("solve")
        .arg(&recipe)
        .arg(&kitchens)
        .args(["--domain", "cooking", "--format", "tsv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("corner-bistro"))
        .stdout(predicate::str::contains("juice-bar").not());
}

#[test]
fn test_unknown_domain_fails() {
    let dir = TempDir::new().unwrap();
    let requirements = write(dir.path(), "requirements.json", &requirement_set());
    let providers = write(dir.path(), "providers.json", &provider_catalog());

    solver()
        .arg("solve")
        .arg(&requirements)
        .arg(&providers)
        .args(["--domain", "knitting"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown domain"));
}

#[test]
fn test_missing_input_fails() {
    solver()
        .args(["solve", "does-not-exist.json", "also-missing.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}
