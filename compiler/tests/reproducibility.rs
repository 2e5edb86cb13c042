// Reproducibility and driver tests.
//
// These tests run the `sgc` binary and verify that identical snapshots give
// byte-identical output, and that failures map to the documented exit codes.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn sgc_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sgc"))
}

fn fixture(name: &str) -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
        .to_str()
        .unwrap()
        .to_string()
}

fn run_sgc(args: &[&str]) -> Output {
    Command::new(sgc_binary())
        .args(args)
        .output()
        .expect("failed to run sgc")
}

fn stdout_of(args: &[&str]) -> String {
    let output = run_sgc(args);
    assert!(
        output.status.success(),
        "sgc failed with args {:?}\nstderr: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("non-UTF8 output")
}

#[test]
fn same_snapshot_identical_words() {
    let path = fixture("branching.json");
    let first = stdout_of(&["--emit", "words", &path]);
    let second = stdout_of(&["--emit", "words", &path]);
    assert_eq!(first, second, "module should be byte-identical across runs");
    assert!(first.starts_with("0x07230203 0x00010000"));
}

#[test]
fn same_snapshot_identical_build_info() {
    let path = fixture("branching.json");
    let first = stdout_of(&["--emit", "build-info", &path]);
    let second = stdout_of(&["--emit", "build-info", &path]);
    assert_eq!(first, second);
    let info: serde_json::Value = serde_json::from_str(&first).unwrap();
    assert_eq!(info["snapshot_hash"].as_str().unwrap().len(), 64);
    assert_eq!(info["compiler_version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn spv_output_matches_words() {
    let path = fixture("branching.json");
    let dir = std::env::temp_dir().join(format!("sgc-repro-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let out = dir.join("out.spv");
    let out_str = out.to_str().unwrap();
    let status = run_sgc(&[&path, "-o", out_str]);
    assert!(status.status.success());
    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(bytes.len() % 4, 0);
    assert_eq!(&bytes[..4], &0x0723_0203u32.to_le_bytes());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn disasm_lists_entry_point() {
    let text = stdout_of(&["--emit", "disasm", &fixture("branching.json")]);
    assert!(text.lines().any(|l| l.starts_with("OpEntryPoint 4 ")));
    assert!(text.contains("OpSelectionMerge"));
}

#[test]
fn missing_file_exits_with_2() {
    let output = run_sgc(&["/nonexistent/snapshot.json"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn malformed_snapshot_exits_with_2() {
    let output = run_sgc(&[&fixture("malformed.json")]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("E0400"));
}

#[test]
fn compile_error_exits_with_1() {
    let output = run_sgc(&["--emit", "disasm", &fixture("two_outputs.json")]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("E0303"), "stderr: {stderr}");
}
