use std::fs;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn meshview(config_dir: &std::path::Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_meshview"))
        .env("MESHVIEW_CONFIG_DIR", config_dir)
        .env_remove("MESHVIEW_CONFIG")
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run meshview")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "meshview failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

#[test]
fn topology_reports_lattice_counts() {
    let root = TempDir::new().unwrap();
    let output = meshview(
        root.path(),
        &["topology", "--width", "3", "--height", "2", "--subdivisions", "4"],
    );
    let json = stdout_json(&output);
    assert_eq!(json["columns"], 9);
    assert_eq!(json["rows"], 5);
    assert_eq!(json["vertices"], 45);
    assert_eq!(json["indices"], 192);
    assert_eq!(json["triangles"], 64);
}

#[test]
fn topology_rejects_zero_subdivisions() {
    let root = TempDir::new().unwrap();
    let output = meshview(root.path(), &["topology", "--subdivisions", "0"]);
    assert!(!output.status.success());
}

#[test]
fn sample_reads_config_from_default_location() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("meshview.toml"),
        r##"
version = 1

[grid]
width = 2
height = 2

[palette]
colors = ["#ff0000", "#00ff00", "#0000ff", "#ffffff"]
"##,
    )
    .unwrap();

    let output = meshview(root.path(), &["sample", "--u", "1", "--v", "1"]);
    let json = stdout_json(&output);
    let position = json["position"].as_array().unwrap();
    assert!((position[0].as_f64().unwrap() - 1.0).abs() < 1e-5);
    assert!((position[1].as_f64().unwrap() - 1.0).abs() < 1e-5);
    let color: Vec<f64> = json["color"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_f64().unwrap())
        .collect();
    for channel in color {
        assert!((channel - 1.0).abs() < 1e-5);
    }
}

#[test]
fn explicit_config_flag_and_overrides() {
    let root = TempDir::new().unwrap();
    let config_path = root.path().join("custom.toml");
    fs::write(&config_path, "version = 1\n[grid]\ntension = 0.5\n").unwrap();

    let output = meshview(
        root.path(),
        &[
            "sample",
            "--config",
            config_path.to_str().unwrap(),
            "--tension",
            "0.25",
            "--u",
            "0",
            "--v",
            "0",
        ],
    );
    let json = stdout_json(&output);
    assert_eq!(json["tension"], 0.25);
}

#[test]
fn invalid_config_fails_cleanly() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("meshview.toml"), "version = 7\n").unwrap();
    let output = meshview(root.path(), &["topology"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("version"), "{stderr}");
}
