#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{json, Value};
use tempfile::TempDir;

const FIXTURE: &str = r#"{
    "tables": [
        {
            "name": "A",
            "columns": [
                { "name": "name", "type": "string" },
                { "name": "links", "link": "list", "target": "B" }
            ],
            "rows": [ { "name": "a", "links": [0, 1, 0] } ]
        },
        {
            "name": "B",
            "columns": [ { "name": "name", "type": "string" } ],
            "rows": [ { "name": "x" }, { "name": "y" } ]
        }
    ]
}"#;

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write file");
    path
}

fn setup() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(&dir, "fixture.json", FIXTURE);
    (dir, path)
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("valid json")
}

#[test]
fn render_follows_links_once_at_unlimited_depth() {
    let (_dir, fixture) = setup();
    let output = cargo_bin_cmd!("linkstore")
        .args(["render", "--table", "A", "--depth=-1"])
        .arg(&fixture)
        .assert()
        .success()
        .get_output()
        .clone();
    assert_eq!(
        stdout_json(&output),
        json!([{
            "_key": 0,
            "name": "a",
            "links": [
                { "_key": 0, "name": "x" },
                { "_key": 1, "name": "y" },
                0
            ]
        }])
    );
}

#[test]
fn render_selected_rows_with_rename() {
    let (_dir, fixture) = setup();
    let output = cargo_bin_cmd!("linkstore")
        .args(["render", "--table", "B", "--row", "1", "--rename", "name=label"])
        .arg(&fixture)
        .assert()
        .success()
        .get_output()
        .clone();
    assert_eq!(stdout_json(&output), json!([{ "_key": 1, "label": "y" }]));
}

#[test]
fn config_file_supplies_render_defaults() {
    let (dir, fixture) = setup();
    let config = write_file(&dir, "linkstore.toml", "[render]\ndepth = 1\nmode = \"xjson\"\n");
    let output = cargo_bin_cmd!("linkstore")
        .arg("--config")
        .arg(&config)
        .args(["render", "--table", "A"])
        .arg(&fixture)
        .assert()
        .success()
        .get_output()
        .clone();
    let rows = stdout_json(&output);
    assert!(rows[0].get("_key").is_none());
    assert_eq!(rows[0]["links"][2], json!({ "name": "x" }));
}

#[test]
fn verify_reports_counts_as_json() {
    let (_dir, fixture) = setup();
    let output = cargo_bin_cmd!("linkstore")
        .args(["verify", "--format", "json", "--level", "full"])
        .arg(&fixture)
        .assert()
        .success()
        .get_output()
        .clone();
    let report = stdout_json(&output);
    assert_eq!(report["success"], json!(true));
    assert_eq!(report["level"], json!("full"));
    assert_eq!(report["counts"]["rows"], json!(3));
    assert_eq!(report["counts"]["forward_refs"], json!(3));
    assert_eq!(report["counts"]["backlink_entries"], json!(3));
}

#[test]
fn verify_prints_text_summary() {
    let (_dir, fixture) = setup();
    let output = cargo_bin_cmd!("linkstore")
        .arg("verify")
        .arg(&fixture)
        .assert()
        .success()
        .get_output()
        .clone();
    let text = String::from_utf8(output.stdout).expect("utf8");
    assert!(text.starts_with("Verify (Full) => success=true"), "got {text}");
}

#[test]
fn remove_row_cascades_and_prints_the_table() {
    let (_dir, fixture) = setup();
    cargo_bin_cmd!("linkstore")
        .args(["remove-row", "--table", "B", "--row", "0"])
        .arg(&fixture)
        .assert()
        .success()
        .stdout("[{\"_key\":1,\"name\":\"y\"}]\n");

    let output = cargo_bin_cmd!("linkstore")
        .args(["remove-row", "--table", "A", "--row", "0", "--strategy", "ordered-erase"])
        .arg(&fixture)
        .assert()
        .success()
        .get_output()
        .clone();
    assert_eq!(stdout_json(&output), json!([]));
}

#[test]
fn missing_table_fails() {
    let (_dir, fixture) = setup();
    cargo_bin_cmd!("linkstore")
        .args(["render", "--table", "C"])
        .arg(&fixture)
        .assert()
        .failure();
}

#[test]
fn negative_depth_other_than_unlimited_is_rejected() {
    let (_dir, fixture) = setup();
    cargo_bin_cmd!("linkstore")
        .args(["render", "--table", "A", "--depth=-2"])
        .arg(&fixture)
        .assert()
        .failure();
}
