#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

const TRIPLES: &str = "\
subject,predicate,object
alice,knows,bob
alice,knows,carol
bob,knows,carol
alice,likes,tea
carol,likes,coffee
";

const PLAN: &str = r#"{
    "op": "optional",
    "left": {"op": "bgp", "patterns": [["?a", "knows", "?b"]]},
    "right": {"op": "bgp", "patterns": [["?b", "likes", "?drink"]]}
}"#;

fn setup(plan: &str) -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let triples = dir.path().join("triples.csv");
    let plan_path = dir.path().join("plan.json");
    fs::write(&triples, TRIPLES).expect("write triples");
    fs::write(&plan_path, plan).expect("write plan");
    (dir, triples, plan_path)
}

fn query_args(triples: &Path, plan: &Path) -> Vec<String> {
    vec![
        "query".into(),
        "--triples".into(),
        triples.display().to_string(),
        "--plan".into(),
        plan.display().to_string(),
    ]
}

#[test]
fn json_rows_carry_terms() {
    let (_dir, triples, plan) = setup(PLAN);
    let output = cargo_bin_cmd!("triejoin")
        .args(["--format", "json"])
        .args(query_args(&triples, &plan))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let mut rows: Vec<Value> = String::from_utf8(output)
        .expect("utf8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid json"))
        .collect();
    rows.sort_by_key(|row| row.to_string());
    assert_eq!(rows.len(), 3);
    assert!(rows.contains(&serde_json::json!({"a": "alice", "b": "carol", "drink": "coffee"})));
    assert!(rows.contains(&serde_json::json!({"a": "bob", "b": "carol", "drink": "coffee"})));
    assert!(rows.contains(&serde_json::json!({"a": "alice", "b": "bob"})));
}

#[test]
fn text_output_respects_limit() {
    let (_dir, triples, plan) = setup(PLAN);
    let output = cargo_bin_cmd!("triejoin")
        .args(query_args(&triples, &plan))
        .args(["--limit", "2"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert_eq!(text.lines().count(), 2);
    assert!(text.lines().all(|line| line.starts_with("?a=")));
}

#[test]
fn unknown_terms_yield_no_rows() {
    let (_dir, triples, plan) =
        setup(r#"{"op": "bgp", "patterns": [["?a", "hates", "?b"]]}"#);
    cargo_bin_cmd!("triejoin")
        .args(query_args(&triples, &plan))
        .assert()
        .success()
        .stdout("");
}

#[test]
fn config_file_is_applied_and_validated() {
    let (dir, triples, plan) = setup(PLAN);
    let good = dir.path().join("good.toml");
    fs::write(&good, "[join]\nbuffer_block = 1\n[store]\nleaf_capacity = 2\n").expect("write");
    cargo_bin_cmd!("triejoin")
        .args(query_args(&triples, &plan))
        .arg("--config")
        .arg(&good)
        .assert()
        .success();

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "[join]\nbuffer_block = 0\n").expect("write");
    let output = cargo_bin_cmd!("triejoin")
        .args(query_args(&triples, &plan))
        .arg("--config")
        .arg(&bad)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.starts_with("error: invalid config"), "{stderr}");
}

#[test]
fn missing_column_fails() {
    let (dir, _triples, plan) = setup(PLAN);
    let broken = dir.path().join("broken.csv");
    fs::write(&broken, "subject,object\nalice,bob\n").expect("write");
    let output = cargo_bin_cmd!("triejoin")
        .args(query_args(&broken, &plan))
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8(output)
        .expect("utf8")
        .contains("column 'predicate' not found"));
}
