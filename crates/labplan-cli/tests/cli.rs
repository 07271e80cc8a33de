//! File-level patch tooling

use labplan_cli::{apply, check, hash, load_container};
use labplan_resource::ResourceKind;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
    path
}

fn container() -> Value {
    json!({
        "equipments": [
            { "name": "confocal", "quantity": 1 },
            { "name": "lightsheet", "quantity": 2 },
            { "name": "cryostat", "quantity": 1 }
        ]
    })
}

#[test]
fn apply_replaces_and_appends() {
    let dir = tempfile::tempdir().unwrap();
    let container = write(&dir, "container.json", &container());
    let patch = write(
        &dir,
        "patch.json",
        &json!({
            "equipments": [
                { "start": 3, "items": [{ "name": "incubator", "quantity": 4 }] },
                { "start": 0, "end": 1, "items": [] }
            ]
        }),
    );

    let result = apply(&container, &patch).unwrap();
    let names: Vec<&str> = result["equipments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["lightsheet", "cryostat", "incubator"]);
    assert_eq!(result["equipments"][2]["index"], 2);
}

#[test]
fn stale_base_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let original = write(&dir, "original.json", &container());
    let base = hash(&original).unwrap();

    let mut changed = container();
    changed["equipments"][0]["quantity"] = json!(5);
    let changed = write(&dir, "changed.json", &changed);

    let patch = write(
        &dir,
        "patch.json",
        &json!({
            "equipments": [{ "start": 0, "end": 1, "items": [] }],
            "baseHash": base.to_string()
        }),
    );
    assert!(apply(&original, &patch).is_ok());
    let err = apply(&changed, &patch).unwrap_err();
    assert!(format!("{err:#}").contains("does not apply"));
}

#[test]
fn check_reports_overlaps() {
    let dir = tempfile::tempdir().unwrap();
    let ok = write(
        &dir,
        "ok.json",
        &json!({ "equipments": [{ "start": 0, "end": 1, "items": [] }] }),
    );
    let summary = check(&ok).unwrap();
    assert_eq!(summary.base, None);
    assert_eq!(summary.splices, vec![(ResourceKind::EquipmentLease, 1)]);

    let overlapping = write(
        &dir,
        "overlap.json",
        &json!({
            "equipments": [
                { "start": 0, "end": 2, "items": [] },
                { "start": 1, "end": 3, "items": [] }
            ]
        }),
    );
    assert!(check(&overlapping).is_err());
}

#[test]
fn missing_file_names_the_path() {
    let err = load_container(std::path::Path::new("/nonexistent/container.json")).unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/container.json"));
}
