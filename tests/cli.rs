use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn heicconv() -> Command {
    Command::cargo_bin("heicconv").unwrap()
}

#[test]
fn no_input_prints_guidance_and_exits_2() {
    heicconv()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--input_file"))
        .stderr(predicate::str::contains("--input_dir"));
}

#[test]
fn missing_input_file_aborts() {
    let dir = TempDir::new().unwrap();
    heicconv()
        .arg("--input_file")
        .arg(dir.path().join("nope.heic"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not exist"))
        .stdout(predicate::str::contains("All conversions completed.").not());
}

#[test]
fn missing_input_dir_aborts() {
    let dir = TempDir::new().unwrap();
    heicconv()
        .arg("--input_dir")
        .arg(dir.path().join("absent"))
        .assert()
        .code(1);
}

#[test]
fn empty_directory_completes() {
    let dir = TempDir::new().unwrap();
    heicconv()
        .arg("--input_dir")
        .arg(dir.path())
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::contains("All conversions completed."));
}

#[test]
fn json_report_goes_to_stdout() {
    let dir = TempDir::new().unwrap();
    let output = heicconv()
        .arg("--input_dir")
        .arg(dir.path())
        .arg("--json")
        .arg("--quiet")
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["total"], 0);
    assert_eq!(report["failed"], 0);
}

#[test]
fn dry_run_lists_outputs_without_converting() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("IMG_0001.HEIC"), b"not decoded in a dry run").unwrap();

    heicconv()
        .arg("--input_dir")
        .arg(dir.path())
        .args(["--format", "png", "--dry-run", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("IMG_0001_HEIC.png"));

    assert!(!dir.path().join("IMG_0001_HEIC.png").exists());
}

#[test]
fn failed_jobs_exit_1_after_completing() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("broken.heic");
    std::fs::write(&source, b"garbage").unwrap();

    heicconv()
        .arg("--input_dir")
        .arg(dir.path())
        .args(["--delete", "--quiet"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("All conversions completed."))
        .stdout(predicate::str::contains("Failed"));

    assert!(source.exists());
}

#[test]
fn quality_out_of_range_is_rejected() {
    heicconv()
        .args(["--input_dir", ".", "--quality", "0"])
        .assert()
        .failure();
}

#[test]
fn example_config_is_written() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("heicconv.toml");

    heicconv()
        .arg("example-config")
        .arg("--output")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated example configuration"));

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("[conversion]"));
    assert!(content.contains("format = \"jpeg\""));
}

#[test]
fn config_file_values_are_used() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "[processing]\nthreads = 0\n").unwrap();

    heicconv()
        .arg("--config")
        .arg(&config)
        .arg("--input_dir")
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Thread count"));
}
