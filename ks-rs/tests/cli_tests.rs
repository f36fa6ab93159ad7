/// Command-line tests: run the built `knit-script` binary against source
/// files in a temporary directory and check exit status, the knitout file
/// and what lands on stdout/stderr.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use indoc::indoc;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_knit-script"))
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(binary())
        .current_dir(dir)
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("KSLIBDIR")
        .output()
        .expect("failed to spawn knit-script")
}

fn stdout(o: &Output) -> String {
    String::from_utf8_lossy(&o.stdout).into_owned()
}

fn stderr(o: &Output) -> String {
    String::from_utf8_lossy(&o.stderr).into_owned()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn compiles_to_default_output_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("swatch.ks"),
        "with Carrier as c1:{ in c1; knit f0; out c1; } print(\"done\");",
    )
    .unwrap();
    let out = run(dir.path(), &["swatch.ks"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "done\n");
    let knitout = std::fs::read_to_string(dir.path().join("swatch.k")).unwrap();
    assert!(knitout.starts_with(";!knitout-2\n"));
    assert!(knitout.ends_with("in 1\nknit - f0 1\nout 1\n"));
}

#[test]
fn explicit_output_and_machine() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.ks"), "rack 1;").unwrap();
    let out = run(
        dir.path(),
        &["a.ks", "-o", "result.k", "--machine", "Kniterate", "--carriers", "4"],
    );
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let knitout = std::fs::read_to_string(dir.path().join("result.k")).unwrap();
    assert!(knitout.contains(";;Machine: Kniterate\n"));
    assert!(knitout.contains(";;Carriers: 1 2 3 4\n"));
    assert!(knitout.ends_with("rack 1\n"));
}

#[test]
fn failure_reports_diagnostic_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("bad.ks"),
        indoc! {"
            x = 1;
            assert x == 2;
        "},
    )
    .unwrap();
    let out = run(dir.path(), &["bad.ks"]);
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.contains("error[AssertionFailure]: assertion failed: x == 2"), "{err}");
    assert!(err.contains("--> bad.ks:2:1"), "{err}");
    assert!(err.contains("assert x == 2;"), "{err}");
    assert!(!dir.path().join("bad.k").exists());
}

#[test]
fn unknown_machine_fails() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.ks"), "").unwrap();
    let out = run(dir.path(), &["a.ks", "--machine", "Loom"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("ConfigError"));
}

#[test]
fn missing_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(dir.path(), &["nope.ks"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("IoError"));
}

#[test]
fn library_dir_flag() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("mylib")).unwrap();
    std::fs::write(dir.path().join("mylib/greet.ks"), "def hello(){ print(\"hi\"); }").unwrap();
    std::fs::write(dir.path().join("a.ks"), "import greet; hello();").unwrap();
    let out = run(dir.path(), &["a.ks", "-L", "mylib"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "hi\n");
}

#[test]
fn list_machines() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(dir.path(), &["--list-machines"]);
    assert!(out.status.success());
    let text = stdout(&out);
    for name in ["SWG091N2", "SWG061N2", "Kniterate"] {
        assert!(text.contains(name), "{text}");
    }
}

#[test]
fn usage_error_without_input() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(dir.path(), &[]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("Usage"));
}
