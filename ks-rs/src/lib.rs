//! Knit Script: a small language for programming V-bed weft knitting
//! machines, compiled to knitout.
//!
//! The pipeline is lexer → parser → interpreter, with the interpreter
//! driving a [`machine::Machine`] that validates every operation and
//! records the knitout instruction stream.
//!
//! ```no_run
//! use knit_script::{knit_script_to_knitout, CompileOptions};
//!
//! let outcome = knit_script_to_knitout("swatch.ks", "swatch.k", &CompileOptions::default());
//! for d in &outcome.diagnostics {
//!     eprintln!("{d}");
//! }
//! ```

pub mod cli;
pub mod config;
pub mod diag;
pub mod embedded;
pub mod knitout;
pub mod machine;
pub mod script;

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use config::{MachineConfig, DEFAULT_CARRIER_COUNT, DEFAULT_MACHINE_TYPE};
use diag::{Diagnostic, ErrorKind};
use script::{Interpreter, Library};

/// Options for [`knit_script_to_knitout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub machine_type: String,
    pub carrier_count: u32,
    /// Extra library directories, highest priority first.
    pub library_dirs: Vec<PathBuf>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            machine_type: DEFAULT_MACHINE_TYPE.to_owned(),
            carrier_count: DEFAULT_CARRIER_COUNT,
            library_dirs: Vec::new(),
        }
    }
}

/// Result of [`knit_script_to_knitout`].
#[derive(Debug, Clone, Default)]
pub struct CompileOutcome {
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
    /// Lines written by `print`, including those printed before a failure.
    pub output: Vec<String>,
}

/// A successful in-memory compilation.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub knitout: String,
    pub output: Vec<String>,
    pub instruction_count: usize,
}

/// Interpret `source` and return the printed lines plus either the
/// compiled program or the diagnostic that stopped it.
fn interpret(
    source: &str,
    config: &MachineConfig,
    library: &Library,
) -> (Vec<String>, Result<(String, usize), Diagnostic>) {
    let mut interp = Interpreter::new(config.clone(), library.clone());
    let result = interp.exec_source(source);
    let output = std::mem::take(&mut interp.output);
    let result = result.map(|()| {
        let machine = interp.into_machine();
        let count = machine.instructions().len();
        info!(instructions = count, machine = config.spec.name, "compiled");
        (machine.knitout(), count)
    });
    (output, result)
}

/// Compile Knit Script source to knitout text without touching the
/// filesystem.
pub fn compile_source(
    source: &str,
    config: &MachineConfig,
    library: &Library,
) -> Result<Compiled, Diagnostic> {
    let (output, result) = interpret(source, config, library);
    let (knitout, instruction_count) = result?;
    Ok(Compiled { knitout, output, instruction_count })
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> Diagnostic {
    Diagnostic::new(ErrorKind::Io, format!("cannot {action} `{}`: {e}", path.display()))
}

/// Write `text` to `path` through a temporary file in the same directory,
/// so a failure never leaves a partial file behind.
fn write_atomically(path: &Path, text: &str) -> Result<(), Diagnostic> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| io_error("create a file in", dir, e))?;
    tmp.write_all(text.as_bytes())
        .and_then(|()| tmp.flush())
        .map_err(|e| io_error("write", tmp.path(), e))?;
    tmp.persist(path).map_err(|e| io_error("write", path, e.error))?;
    Ok(())
}

/// Compile the Knit Script file at `source_path` and write knitout to
/// `out_path`.
///
/// On failure nothing is written and `diagnostics` explains why.
pub fn knit_script_to_knitout(
    source_path: impl AsRef<Path>,
    out_path: impl AsRef<Path>,
    options: &CompileOptions,
) -> CompileOutcome {
    let source_path = source_path.as_ref();
    let out_path = out_path.as_ref();
    let failed = |d: Diagnostic, output: Vec<String>| CompileOutcome {
        success: false,
        diagnostics: vec![d],
        output,
    };

    let config = match MachineConfig::new(&options.machine_type, options.carrier_count) {
        Ok(c) => c,
        Err(e) => return failed(e.into(), Vec::new()),
    };
    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => return failed(io_error("read", source_path, e), Vec::new()),
    };
    debug!(path = %source_path.display(), bytes = source.len(), "read source");

    let library = Library::with_dirs(&options.library_dirs);
    let (output, result) = interpret(&source, &config, &library);
    let knitout = match result {
        Ok((knitout, _)) => knitout,
        Err(d) => return failed(d, output),
    };
    if let Err(d) = write_atomically(out_path, &knitout) {
        return failed(d, output);
    }
    CompileOutcome { success: true, diagnostics: Vec::new(), output }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_source_reports_instruction_count() {
        let c = compile_source(
            "with Carrier as c1:{ in c1; knit f0; print(\"done\"); }",
            &MachineConfig::default(),
            &Library::embedded(),
        )
        .unwrap();
        assert_eq!(c.instruction_count, 2);
        assert_eq!(c.output, ["done"]);
        assert!(c.knitout.starts_with(";!knitout-2\n"));
        assert!(c.knitout.ends_with("in 1\nknit - f0 1\n"));
    }

    #[test]
    fn output_survives_failure() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("p.ks");
        let out = dir.path().join("p.k");
        std::fs::write(&src, "print(\"before\"); assert false;").unwrap();
        let outcome = knit_script_to_knitout(&src, &out, &CompileOptions::default());
        assert!(!outcome.success);
        assert_eq!(outcome.output, ["before"]);
        assert!(!out.exists());
    }

    #[test]
    fn bad_config_is_a_config_error() {
        let opts = CompileOptions { machine_type: "Loom".into(), ..CompileOptions::default() };
        let outcome = knit_script_to_knitout("unused.ks", "unused.k", &opts);
        assert_eq!(outcome.diagnostics[0].kind, ErrorKind::Config);
    }

    #[test]
    fn missing_source_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = knit_script_to_knitout(
            dir.path().join("missing.ks"),
            dir.path().join("out.k"),
            &CompileOptions::default(),
        );
        assert_eq!(outcome.diagnostics[0].kind, ErrorKind::Io);
    }
}
