use std::path::Path;
use std::process::Output;

use assert_cmd::Command;

include!(concat!(env!("OUT_DIR"), "/test_files.rs"));

const EXPECT: &str = "# expect: ";
const EXPECT_ERROR: &str = "# expect error: ";

fn do_test(filename: &Path) {
    let content = std::fs::read_to_string(filename)
        .unwrap_or_else(|_| panic!("failed to read {}", filename.display()));

    let output = run_file(filename);
    let stdout = String::from_utf8(output.stdout).unwrap();
    let stdout = stdout.trim_end();
    let stderr = String::from_utf8(output.stderr).unwrap();
    let stderr = stderr.trim_end();

    let expected = find_expects(&content, EXPECT).join("\n");
    assert_eq!(expected, stdout, "stdout={stdout}, stderr={stderr}");

    let expected_errors = find_expects(&content, EXPECT_ERROR);
    if expected_errors.is_empty() {
        assert!(output.status.success(), "stderr={stderr}");
    } else {
        assert!(!output.status.success(), "expected {filename:?} to fail");
        for error in expected_errors {
            assert!(stderr.contains(&error), "missing '{error}' in stderr={stderr}");
        }
    }
}

fn run_file(filename: &Path) -> Output {
    let mut cmd = Command::cargo_bin("gosh").unwrap();
    cmd.env("GOSH_LOG", "error").arg(filename).output().unwrap()
}

fn find_expects(content: &str, marker: &str) -> Vec<String> {
    let mut result = vec![];
    for line in content.lines() {
        if let Some((idx, _)) = line.match_indices(marker).last() {
            result.push(line[idx + marker.len()..].to_owned());
        }
    }

    result
}

#[test]
fn stdin_is_run_as_a_script() {
    let mut cmd = Command::cargo_bin("gosh").unwrap();
    let output = cmd.write_stdin("x := 20\nx * 2 + 2\n").output().unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "42\n");
}

#[test]
fn prints_the_parse_tree() {
    let mut cmd = Command::cargo_bin("gosh").unwrap();
    let output = cmd.arg("--sexpr").write_stdin("1+2*3").output().unwrap();

    assert_eq!(String::from_utf8(output.stdout).unwrap(), "(stmts (+ 1 (* 2 3)))\n7\n");
}

#[test]
fn prints_the_analysis() {
    let mut cmd = Command::cargo_bin("gosh").unwrap();
    let output = cmd.arg("--analyze").write_stdin("f := func(a) { return a + b }").output().unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();

    assert!(stdout.starts_with("func #1:\n"), "{stdout}");
    assert!(stdout.contains("parameters: a\n"), "{stdout}");
    assert!(stdout.contains("free: b\n"), "{stdout}");
    // Capturing the unbound `b` fails once the literal runs.
    assert_eq!(output.status.code(), Some(70));
}

#[test]
fn missing_file_is_reported() {
    let mut cmd = Command::cargo_bin("gosh").unwrap();
    cmd.arg("tests/data/does-not-exist.gosh").assert().failure();
}
