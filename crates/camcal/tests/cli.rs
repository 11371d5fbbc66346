mod common;

use assert_cmd::Command;
use camcal::preview::PREVIEW_DIR_NAME;
use camcal::{ParameterSummary, ARCHIVE_FILE_NAME};
use common::{write_blank, write_dataset, HEIGHT, WIDTH};
use predicates::prelude::*;

fn camcal() -> Command {
    Command::cargo_bin("camcal").expect("camcal binary")
}

#[test]
fn help_lists_usage() {
    camcal()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-gui"))
        .stdout(predicate::str::contains("<IMAGES_DIRECTORY>"));
}

#[test]
fn missing_directory_argument_is_a_usage_error() {
    camcal().assert().code(2);
}

#[test]
fn empty_directory_exits_cleanly_without_output_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    camcal()
        .arg("--no-gui")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Reading images from directory"))
        .stdout(predicate::str::contains("Unable to find any jpeg images"));
    assert!(!dir.path().join(ARCHIVE_FILE_NAME).exists());
}

#[test]
fn undetectable_images_fail_with_message() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_blank(dir.path(), "blank_1.jpg");
    write_blank(dir.path(), "blank_2.jpg");
    camcal()
        .args(["--no-gui", "--seed", "1"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Reading image:"))
        .stderr(predicate::str::contains("not found in any of 2 images"));
    assert!(!dir.path().join(ARCHIVE_FILE_NAME).exists());
}

#[test]
fn corrupt_image_fails() {
    let dir = tempfile::tempdir().expect("temp dir");
    std::fs::write(dir.path().join("broken.jpg"), b"garbage").expect("write");
    camcal()
        .arg("--no-gui")
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot decode image"));
}

#[test]
fn calibrates_directory_and_reports() {
    let dir = tempfile::tempdir().expect("temp dir");
    let written = write_dataset(dir.path());
    let json_path = dir.path().join("params.json");

    camcal()
        .args(["--no-gui", "--seed", "7", "--rows", "8", "--cols", "6", "--json"])
        .arg(&json_path)
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("(1/{})", written.len())))
        .stdout(predicate::str::contains("ret "))
        .stdout(predicate::str::contains("imageSize (640, 480)"))
        .stdout(predicate::str::contains("Total error:  "))
        .stdout(predicate::str::contains("\"intrinsic_parameters\": {"))
        .stdout(predicate::str::contains("   \"width_px\": 640\n"))
        .stdout(predicate::str::contains(" \"distortion_parameters\": {"));

    assert!(dir.path().join(ARCHIVE_FILE_NAME).is_file());
    assert!(!dir.path().join(PREVIEW_DIR_NAME).exists());

    let summary: ParameterSummary =
        serde_json::from_str(&std::fs::read_to_string(&json_path).expect("json file"))
            .expect("valid json");
    assert_eq!(summary.intrinsic_parameters.width_px, WIDTH);
    assert_eq!(summary.intrinsic_parameters.height_px, HEIGHT);
    assert!((summary.intrinsic_parameters.fx - 700.0).abs() < 14.0);
}

#[test]
fn wrong_pattern_size_from_config_finds_nothing() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_dataset(dir.path());
    let config = dir.path().join("camcal.json");
    std::fs::write(&config, r#"{ "chessboard": { "pattern": { "rows": 10, "cols": 7 } } }"#)
        .expect("write config");

    camcal()
        .arg("--no-gui")
        .arg("--config")
        .arg(&config)
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("10x7"));
}
