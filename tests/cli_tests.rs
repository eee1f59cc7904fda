//! CLI integration tests
//!
//! Runs the lwirc binary through cargo and checks exit codes and outputs
//! for the documented invocations.

use std::fs;
use std::path::Path;
use std::process::Command;

/// Run lwirc with the given arguments
fn run_lwirc(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "--quiet", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn stdout_string(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr_string(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Write a few 16-bit grayscale PNG frames
fn write_frames(dir: &Path, count: u32) {
    for index in 0..count {
        let data: Vec<u16> = (0..64u16).map(|i| 30000 + i * 16 + index as u16).collect();
        let buffer =
            image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_raw(8, 8, data).unwrap();
        buffer
            .save(dir.join(format!("frame_{:03}.png", index)))
            .unwrap();
    }
}

#[test]
fn test_help_exits_zero() {
    let output = run_lwirc(&["--help"]);
    assert!(output.status.success());
    let stdout = stdout_string(&output);
    assert!(stdout.contains("--config"));
    assert!(stdout.contains("--gop"));
    assert!(stdout.contains("--residual-near"));
}

#[test]
fn test_no_arguments_exits_one() {
    let output = run_lwirc(&[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_string(&output).contains("--config"));
}

#[test]
fn test_unknown_flag_exits_one() {
    let output = run_lwirc(&["--bogus"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_invalid_parameter_exits_one() {
    let input = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    write_frames(input.path(), 1);

    let output = run_lwirc(&[
        "--input",
        input.path().to_str().unwrap(),
        "--output",
        output_dir.path().to_str().unwrap(),
        "--gop",
        "0",
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_string(&output).contains("gop_period"));
}

#[test]
fn test_compress_directory_succeeds() {
    let input = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    write_frames(input.path(), 4);

    let output = run_lwirc(&[
        "--input",
        input.path().to_str().unwrap(),
        "--output",
        output_dir.path().to_str().unwrap(),
        "--gop",
        "2",
        "--residual-near",
        "0",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        stderr_string(&output)
    );
    assert!(stdout_string(&output).contains("Frames processed: 4"));

    for index in 0..4 {
        assert!(output_dir
            .path()
            .join(format!("frame_{:06}.lwir", index))
            .exists());
    }
    assert!(output_dir.path().join("compression_stats.json").exists());
}

#[test]
fn test_config_file_with_profile() {
    let input = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    write_frames(input.path(), 2);

    let yaml = format!(
        "profiles:\n  fast:\n    input_dir: {}\n    output_dir: {}\n    gop_period: 2\n    residual_near: 0\n",
        input.path().display(),
        output_dir.path().display()
    );
    let config_path = input.path().join("config.yaml");
    fs::write(&config_path, yaml).unwrap();

    let output = run_lwirc(&[
        "--config",
        config_path.to_str().unwrap(),
        "--profile",
        "fast",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        stderr_string(&output)
    );

    let json = fs::read_to_string(output_dir.path().join("compression_stats.json")).unwrap();
    assert!(json.contains("\"gop_period\": 2"));
}

#[test]
fn test_missing_profile_exits_one() {
    let input = tempfile::tempdir().unwrap();
    let config_path = input.path().join("config.yaml");
    fs::write(&config_path, "profiles:\n  a:\n    gop_period: 5\n").unwrap();

    let output = run_lwirc(&["--config", config_path.to_str().unwrap(), "--profile", "b"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_string(&output).contains("profile"));
}
