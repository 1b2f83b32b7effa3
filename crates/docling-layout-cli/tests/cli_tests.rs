//! Integration tests for the CLI commands

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_docling-layout"))
}

const PAGE_JSON: &str = r#"{
    "page_no": 0,
    "geometry": {"rect": {"r_x0": 0.0, "r_y0": 0.0, "r_x1": 100.0, "r_y1": 0.0,
                          "r_x2": 100.0, "r_y2": 100.0, "r_x3": 0.0, "r_y3": 100.0}},
    "cells": [
        {"index": 0, "text": "Body text",
         "rect": {"r_x0": 10.0, "r_y0": 40.0, "r_x1": 90.0, "r_y1": 40.0,
                  "r_x2": 90.0, "r_y2": 60.0, "r_x3": 10.0, "r_y3": 60.0}},
        {"index": 1, "text": "Heading",
         "rect": {"r_x0": 10.0, "r_y0": 80.0, "r_x1": 90.0, "r_y1": 80.0,
                  "r_x2": 90.0, "r_y2": 90.0, "r_x3": 10.0, "r_y3": 90.0}}
    ],
    "clusters": [
        {"id": 1, "label": "text", "confidence": 0.9,
         "bbox": {"l": 8.0, "b": 38.0, "r": 92.0, "t": 62.0}},
        {"id": 2, "label": "section_header", "confidence": 0.9,
         "bbox": {"l": 8.0, "b": 78.0, "r": 92.0, "t": 92.0}}
    ]
}"#;

fn write_input(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

// ============ PROCESS COMMAND TESTS ============

#[test]
fn test_process_help() {
    cli()
        .arg("process")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("reading order"));
}

#[test]
fn test_process_text_output() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "page.json", PAGE_JSON);

    let output = cli().arg("process").arg(&input).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();

    assert!(stdout.starts_with("Page 0 (2 clusters, 2 cells)"));
    let heading = stdout.find("section_header").unwrap();
    let body = stdout.find("Body text").unwrap();
    assert!(heading < body, "heading should come first:\n{stdout}");
}

#[test]
fn test_process_json_array_output() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "pages.json", &format!("[{PAGE_JSON}]"));
    let out_path = dir.path().join("out.json");

    cli()
        .arg("process")
        .arg(&input)
        .arg("--format")
        .arg("json")
        .arg("-o")
        .arg(&out_path)
        .assert()
        .success();

    let layouts: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out_path).unwrap()).unwrap();
    let clusters = layouts[0]["clusters"].as_array().unwrap();
    assert_eq!(clusters.len(), 2);
    assert_eq!(clusters[0]["id"], 2);
    assert_eq!(layouts[0]["cells"][0]["text"], "Heading");
}

#[test]
fn test_process_invalid_json_fails() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "broken.json", "{not json");

    cli()
        .arg("process")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse JSON input"));
}

#[test]
fn test_process_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "page.json", PAGE_JSON);
    let config = write_input(&dir, "layout.toml", "[postprocessor]\noverlap_threshold = 2.0\n");

    cli()
        .arg("process")
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("overlap_threshold"));
}

// ============ ORDER COMMAND TESTS ============

#[test]
fn test_order_prints_cids() {
    let dir = TempDir::new().unwrap();
    let elements = r#"[
        {"cid": 0, "page_no": 0, "label": "text", "page_width": 100.0, "page_height": 100.0,
         "bbox": {"l": 0.0, "b": 0.0, "r": 100.0, "t": 20.0}},
        {"cid": 1, "page_no": 0, "label": "text", "page_width": 100.0, "page_height": 100.0,
         "bbox": {"l": 0.0, "b": 80.0, "r": 100.0, "t": 100.0}}
    ]"#;
    let input = write_input(&dir, "elements.json", elements);

    cli()
        .arg("order")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::eq("1 0\n"));
}

// ============ CONFIG COMMAND TESTS ============

#[test]
fn test_config_prints_defaults() {
    cli()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[postprocessor]"))
        .stdout(predicate::str::contains("min_cell_overlap = 0.2"))
        .stdout(predicate::str::contains("[reading_order]"));
}

#[test]
fn test_missing_input_fails() {
    cli()
        .arg("process")
        .arg("does-not-exist.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read input file"));
}
