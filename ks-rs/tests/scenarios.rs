//! End-to-end scenarios: Knit Script source in, knitout (or a diagnostic)
//! out, through the public `knit_script_to_knitout` and `compile_source`
//! entry points.

use std::path::{Path, PathBuf};

use indoc::indoc;
use knit_script::config::MachineConfig;
use knit_script::diag::{Diagnostic, ErrorKind};
use knit_script::machine::Needle;
use knit_script::script::{Interpreter, Library};
use knit_script::{compile_source, knit_script_to_knitout, CompileOptions, CompileOutcome};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// A source file and an output path inside a fresh temporary directory.
struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Workspace { dir: tempfile::tempdir().expect("tempdir") }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn compile_with(&self, src: &str, options: &CompileOptions) -> (CompileOutcome, PathBuf) {
        let input = self.path("program.ks");
        let output = self.path("program.k");
        std::fs::write(&input, src).expect("write source");
        (knit_script_to_knitout(&input, &output, options), output)
    }

    fn compile(&self, src: &str) -> (CompileOutcome, PathBuf) {
        self.compile_with(src, &CompileOptions::default())
    }
}

/// The instruction lines of a knitout file (everything after the header).
fn instructions(knitout: &str) -> Vec<&str> {
    knitout.lines().filter(|l| !l.starts_with(';')).collect()
}

fn read_instructions(path: &Path) -> Vec<String> {
    let text = std::fs::read_to_string(path).expect("read knitout");
    instructions(&text).into_iter().map(str::to_owned).collect()
}

fn compile_err(src: &str) -> Diagnostic {
    compile_source(src, &MachineConfig::default(), &Library::embedded())
        .expect_err("program should fail")
}

fn compiled_lines(src: &str) -> Vec<String> {
    let c = compile_source(src, &MachineConfig::default(), &Library::embedded())
        .unwrap_or_else(|d| panic!("compile failed: {d}"));
    instructions(&c.knitout).into_iter().map(str::to_owned).collect()
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn while_loop_emits_nothing() {
    let ws = Workspace::new();
    let (outcome, out) = ws.compile("i=0; while i<3:{ i=i+1; } assert i==3;");
    assert!(outcome.success, "{:?}", outcome.diagnostics);
    assert!(outcome.diagnostics.is_empty());
    assert!(read_instructions(&out).is_empty());
}

#[test]
fn carrier_block_knits_two_needles() {
    let ws = Workspace::new();
    let (outcome, out) = ws.compile(
        "with Carrier as c1, Direction as Leftward:{ in c1; knit f0; knit f1; out c1; }",
    );
    assert!(outcome.success, "{:?}", outcome.diagnostics);
    assert_eq!(read_instructions(&out), ["in 1", "knit - f0 1", "knit - f1 1", "out 1"]);
}

#[test]
fn racked_transfer() {
    let ws = Workspace::new();
    let (outcome, out) = ws.compile("rack 2; xfer f0 to b2;");
    assert!(outcome.success, "{:?}", outcome.diagnostics);
    assert_eq!(read_instructions(&out), ["rack 2", "xfer f0 b2"]);
}

#[test]
fn racked_transfer_moves_loops() {
    let mut interp = Interpreter::default();
    interp
        .exec_source(indoc! {"
            with Carrier as c1:{ in c1; tuck f0; }
            rack 2;
            xfer f0 to b2;
        "})
        .unwrap();
    let machine = interp.machine();
    assert!(machine.loops_on(Needle::front(0)).is_empty());
    assert_eq!(machine.loops_on(Needle::back(2)).len(), 1);
    assert_eq!(machine.racking(), 2);
    machine.check_invariants().unwrap();
}

#[test]
fn needles_module() {
    let ws = Workspace::new();
    let (outcome, out) = ws.compile("import needles; n = needle(true, 5); assert n == f5;");
    assert!(outcome.success, "{:?}", outcome.diagnostics);
    assert!(read_instructions(&out).is_empty());
}

#[test]
fn function_pass() {
    let ws = Workspace::new();
    let (outcome, out) = ws.compile(indoc! {"
        def pass(n){ knit f0; knit f1; }
        with Carrier as c1, Direction as Leftward:{ in c1; pass(2); out c1; }
    "});
    assert!(outcome.success, "{:?}", outcome.diagnostics);
    assert_eq!(read_instructions(&out), ["in 1", "knit - f0 1", "knit - f1 1", "out 1"]);
}

#[test]
fn failed_assert_writes_nothing() {
    let ws = Workspace::new();
    let (outcome, out) = ws.compile("assert 1==2;");
    assert!(!outcome.success);
    assert_eq!(outcome.diagnostics.len(), 1);
    let d = &outcome.diagnostics[0];
    assert_eq!(d.kind, ErrorKind::AssertionFailure);
    assert_eq!(d.message, "assertion failed: 1 == 2");
    assert_eq!(d.span.map(|s| (s.line, s.column)), Some((1, 1)));
    assert!(!out.exists());
}

// ── Boundaries ────────────────────────────────────────────────────────────────

#[test]
fn empty_program_is_header_only() {
    let ws = Workspace::new();
    let (outcome, out) = ws.compile("");
    assert!(outcome.success);
    let text = std::fs::read_to_string(&out).unwrap();
    assert_eq!(
        text,
        indoc! {"
            ;!knitout-2
            ;;Machine: SWG091N2
            ;;Gauge: 15
            ;;Carriers: 1 2 3 4 5 6 7 8 9 10
            ;;Position: Center
        "}
    );
}

#[test]
fn misaligned_xfer_is_a_rack_error() {
    let ws = Workspace::new();
    let (outcome, out) = ws.compile("rack 1; xfer f0 to b0;");
    assert!(!outcome.success);
    assert_eq!(outcome.diagnostics[0].kind, ErrorKind::Rack);
    assert!(!out.exists());

    let mut interp = Interpreter::default();
    assert!(interp.exec_source("rack 1; xfer f0 to b0;").is_err());
    let emitted: Vec<String> = interp.machine().instructions().iter().map(|i| i.to_string()).collect();
    assert_eq!(emitted, ["rack 1"]);
}

#[test]
fn knit_without_carrier_in() {
    let d = compile_err("with Carrier as c1:{ knit f0; }");
    assert_eq!(d.kind, ErrorKind::CarrierState);
    let d = compile_err("knit f0;");
    assert_eq!(d.kind, ErrorKind::CarrierState);
}

#[test]
fn repeated_rack_is_coalesced() {
    assert_eq!(compiled_lines("rack 2; rack 2; rack 0; rack 0; rack 0;"), ["rack 2", "rack 0"]);
    assert!(compiled_lines("rack 0;").is_empty());
}

#[test]
fn rack_beyond_machine_limit() {
    assert_eq!(compile_err("rack 5;").kind, ErrorKind::Rack);
    assert_eq!(compile_err("Racking = -5;").kind, ErrorKind::Rack);
}

#[test]
fn carrier_crossing_a_parked_carrier() {
    let d = compile_err(indoc! {"
        in c{1,2};
        with Carrier as c2:{ knit f5; }
        with Carrier as c1, Direction as Rightward:{
            knit f0, f9;
        }
    "});
    assert_eq!(d.kind, ErrorKind::YarnCollision);
    assert_eq!(d.span.map(|s| s.line), Some(4));
    assert!(d.message.contains("carrier 2 is parked at needle 5"), "{}", d.message);
}

#[test]
fn stripes_share_the_edge_column() {
    let lines = compiled_lines(indoc! {"
        in c{1,2};
        for row in range(2):{
            with Carrier as c1:{
                in Rightward direction:{ knit f0 through f3; }
                in Leftward direction:{ knit f0 through f3; }
            }
            with Carrier as c2:{
                in Rightward direction:{ knit f0 through f3; }
                in Leftward direction:{ knit f0 through f3; }
            }
        }
    "});
    assert_eq!(lines.len(), 2 + 2 * 16);
    assert_eq!(lines.last().map(String::as_str), Some("knit - f0 2"));
}

#[test]
fn needle_bounds() {
    let d = compile_err("with Carrier as c1:{ in c1; knit f540; }");
    assert_eq!(d.kind, ErrorKind::NeedleBounds);
    let d = compile_err("with Carrier as c1:{ in c1; knit f0 - 1; }");
    assert_eq!(d.kind, ErrorKind::NeedleBounds);
}

#[test]
fn compilation_is_deterministic() {
    let src = indoc! {"
        import cast_ons;
        import stitches;
        with Carrier as c{1,2}:{
            in c{1,2};
            alt_tuck_cast_on(0, 7);
            for row in range(3):{
                in Rightward direction:{ rib_row(0, 7, 2, 2); }
                in Leftward direction:{ stockinette_row(0, 7); }
            }
            out c{1,2};
        }
    "};
    let config = MachineConfig::default();
    let lib = Library::embedded();
    let a = compile_source(src, &config, &lib).unwrap();
    let b = compile_source(src, &config, &lib).unwrap();
    assert_eq!(a.knitout, b.knitout);
    assert!(a.instruction_count > 50);
}

// ── Library modules ───────────────────────────────────────────────────────────

#[test]
fn tuck_cast_on_then_knit() {
    let lines = compiled_lines(indoc! {"
        import cast_ons;
        import stitches;
        with Carrier as c1:{
            in c1;
            tuck_cast_on(0, 3);
            in Rightward direction:{ stockinette_row(0, 3); }
            out c1;
        }
    "});
    assert_eq!(
        lines,
        [
            "in 1",
            "tuck - f3 1",
            "tuck - f2 1",
            "tuck - f1 1",
            "tuck - f0 1",
            "knit + f0 1",
            "knit + f1 1",
            "knit + f2 1",
            "knit + f3 1",
            "out 1",
        ]
    );
}

#[test]
fn library_directory_module() {
    let ws = Workspace::new();
    let lib = ws.path("lib");
    std::fs::create_dir(&lib).unwrap();
    std::fs::write(lib.join("border.ks"), "def edge(){ knit f0, f1; }").unwrap();
    let options = CompileOptions { library_dirs: vec![lib], ..CompileOptions::default() };
    let (outcome, out) = ws.compile_with(
        "import border; with Carrier as c3:{ in c3; in Rightward direction:{ edge(); } }",
        &options,
    );
    assert!(outcome.success, "{:?}", outcome.diagnostics);
    assert_eq!(read_instructions(&out), ["in 3", "knit + f0 3", "knit + f1 3"]);
}

#[test]
fn unknown_module() {
    assert_eq!(compile_err("import lace;").kind, ErrorKind::Import);
}

#[test]
fn smaller_machine_config() {
    let ws = Workspace::new();
    let options = CompileOptions {
        machine_type: "Kniterate".into(),
        carrier_count: 6,
        ..CompileOptions::default()
    };
    let (outcome, out) = ws.compile_with("print(Needle_Count, Carrier_Count);", &options);
    assert!(outcome.success);
    assert_eq!(outcome.output, ["252 6"]);
    let text = std::fs::read_to_string(out).unwrap();
    assert!(text.contains(";;Machine: Kniterate\n"));
    assert!(text.contains(";;Carriers: 1 2 3 4 5 6\n"));

    let options = CompileOptions { carrier_count: 11, ..CompileOptions::default() };
    let (outcome, _) = ws.compile_with("", &options);
    assert_eq!(outcome.diagnostics[0].kind, ErrorKind::Config);
}

// ── Diagnostics ───────────────────────────────────────────────────────────────

#[test]
fn rendered_diagnostic_points_at_the_call() {
    let src = indoc! {"
        def row(){
            knit f0;
        }
        row();
    "};
    let d = compile_err(src);
    assert_eq!(d.kind, ErrorKind::CarrierState);
    assert_eq!(d.span.map(|s| s.line), Some(2));
    assert_eq!(d.call_stack.len(), 1);
    assert_eq!(d.call_stack[0].function, "row");
    assert_eq!(d.call_stack[0].call_site.line, 4);

    let report = d.render("swatch.ks", src);
    assert!(report.starts_with("error[CarrierStateError]: "));
    assert!(report.contains("--> swatch.ks:2:5"));
    assert!(report.contains("knit f0;"));
    assert!(report.contains("in `row` called at swatch.ks:4:1"));
}

#[test]
fn syntax_errors() {
    assert_eq!(compile_err("x = \"open;").kind, ErrorKind::Lex);
    assert_eq!(compile_err("x = ;").kind, ErrorKind::Parse);
    assert_eq!(compile_err("break;").kind, ErrorKind::Parse);
}
