use std::fs;
use std::path::Path;
use std::process::Command;

use kws_prep::audio::write_wav;
use serde_json::Value;
use tempfile::tempdir;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_kws_prep"))
}

fn tone(freq: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.4 * (2.0 * std::f32::consts::PI * freq * i as f32 / 16_000.0).sin())
        .collect()
}

fn write_classes(path: &Path) {
    fs::write(path, r#"{"yes": 0, "no": 1}"#).unwrap();
}

fn stdout_json(output: &std::process::Output) -> Value {
    let stdout = String::from_utf8(output.stdout.clone()).expect("stdout UTF-8");
    serde_json::from_str(stdout.trim()).expect("JSON payload on stdout")
}

#[test]
fn augment_then_extract_then_inspect() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in");
    fs::create_dir_all(input.join("yes")).unwrap();
    write_wav(&input.join("yes").join("a.wav"), &tone(440.0, 16_000), 16_000).unwrap();
    let augmented = dir.path().join("aug");

    let output = cli()
        .args(["--quiet", "augment", "--denoise", "--workers", "1", "--input"])
        .arg(&input)
        .arg("--output")
        .arg(&augmented)
        .output()
        .expect("failed to run kws_prep augment");
    assert!(output.status.success(), "augment exited with {:?}", output.status.code());
    assert_eq!(stdout_json(&output)["files"], 2);

    let classes = dir.path().join("classes.json");
    write_classes(&classes);
    let features = dir.path().join("train.safetensors");
    let output = cli()
        .args(["--quiet", "extract", "--data"])
        .arg(&augmented)
        .arg("--output")
        .arg(&features)
        .arg("--classes")
        .arg(&classes)
        .output()
        .expect("failed to run kws_prep extract");
    assert_eq!(output.status.code(), Some(0));
    let json = stdout_json(&output);
    assert_eq!(json["accepted"], 2);
    assert_eq!(json["failed"], 0);

    let output = cli()
        .args(["inspect", "--dataset"])
        .arg(&features)
        .output()
        .expect("failed to run kws_prep inspect");
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["examples"], 2);
    assert_eq!(json["input_shape"], serde_json::json!([2, 79, 40, 3]));
    assert_eq!(json["class_counts"], serde_json::json!([2, 0]));

    let output = cli()
        .args(["inspect", "--ledger"])
        .arg(augmented.join("log-augment.txt"))
        .output()
        .expect("failed to run kws_prep inspect --ledger");
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["total_samples"], 16_000 + 15_600);
}

#[test]
fn extract_failures_exit_with_code_two() {
    let dir = tempdir().unwrap();
    let wav_dir = dir.path().join("aug").join("wav");
    fs::create_dir_all(&wav_dir).unwrap();
    write_wav(&wav_dir.join("no-a-1-orig.wav"), &tone(300.0, 16_000), 16_000).unwrap();
    write_wav(&wav_dir.join("yes-b-2-orig.wav"), &[], 16_000).unwrap();

    let classes = dir.path().join("classes.json");
    write_classes(&classes);
    let output = cli()
        .args(["--quiet", "extract", "--data"])
        .arg(dir.path().join("aug"))
        .arg("--output")
        .arg(dir.path().join("out.safetensors"))
        .arg("--classes")
        .arg(&classes)
        .output()
        .expect("failed to run kws_prep extract");
    assert_eq!(output.status.code(), Some(2));
    let json = stdout_json(&output);
    assert_eq!(json["accepted"], 1);
    assert_eq!(json["failed"], 1);
}

#[test]
fn unknown_class_is_an_error() {
    let dir = tempdir().unwrap();
    let wav_dir = dir.path().join("aug").join("wav");
    fs::create_dir_all(&wav_dir).unwrap();
    write_wav(&wav_dir.join("maybe-a-1-orig.wav"), &tone(300.0, 16_000), 16_000).unwrap();

    let classes = dir.path().join("classes.json");
    write_classes(&classes);
    let output = cli()
        .args(["--quiet", "extract", "--data"])
        .arg(dir.path().join("aug"))
        .arg("--output")
        .arg(dir.path().join("out.safetensors"))
        .arg("--classes")
        .arg(&classes)
        .output()
        .expect("failed to run kws_prep extract");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(stderr.contains("code 2004"), "unexpected stderr: {stderr}");
}

#[test]
fn malformed_config_is_rejected() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.json");
    fs::write(&config, "{ not json").unwrap();
    let output = cli()
        .arg("--config")
        .arg(&config)
        .args(["inspect", "--ledger", "missing.txt"])
        .output()
        .expect("failed to run kws_prep");
    assert_eq!(output.status.code(), Some(1));
}
