//! Command-line argument parsing.
//!
//! Usage:
//!   knit-script <input.ks> [-o <output.k>] [--machine TYPE] [--carriers N]
//!               [-L <dir>]... [-v]...
//!   knit-script --list-machines

use std::path::{Path, PathBuf};

use clap::Parser as ClapParser;
use directories::ProjectDirs;

use crate::config::{DEFAULT_CARRIER_COUNT, DEFAULT_MACHINE_TYPE};
use crate::CompileOptions;

/// Environment variable naming an extra library directory.
pub const LIBDIR_ENV: &str = "KSLIBDIR";

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, ClapParser)]
#[command(name = "knit-script", version, about = "Compile Knit Script programs to knitout")]
pub struct CliArgs {
    /// Knit Script source file.
    #[arg(required_unless_present = "list_machines")]
    pub input: Option<PathBuf>,

    /// Knitout output file (default: the input path with extension `.k`).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Target machine type.
    #[arg(long = "machine", value_name = "TYPE", default_value = DEFAULT_MACHINE_TYPE)]
    pub machine_type: String,

    /// Number of yarn carriers in use.
    #[arg(long = "carriers", value_name = "N", default_value_t = DEFAULT_CARRIER_COUNT)]
    pub carrier_count: u32,

    /// Library directory searched for `import`; may be repeated, first wins.
    #[arg(short = 'L', value_name = "DIR")]
    pub libdirs: Vec<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// List the supported machine types and exit.
    #[arg(long)]
    pub list_machines: bool,
}

impl CliArgs {
    /// The output path: `-o` if given, else the input with extension `.k`.
    pub fn output_path(&self) -> Option<PathBuf> {
        self.output
            .clone()
            .or_else(|| self.input.as_ref().map(|i| i.with_extension("k")))
    }

    /// Log level named by the `-v` count.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Compile options for these arguments, with library directories
    /// resolved against the environment.
    pub fn compile_options(&self) -> CompileOptions {
        let env = std::env::var_os(LIBDIR_ENV).map(PathBuf::from);
        let data = ProjectDirs::from("", "", "knit-script").map(|d| d.data_dir().join("lib"));
        CompileOptions {
            machine_type: self.machine_type.clone(),
            carrier_count: self.carrier_count,
            library_dirs: resolve_libdirs(&self.libdirs, env, data.as_deref()),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Determine the library search path, highest priority first.
///
/// Priority: each `-L <dir>` flag in order → `$KSLIBDIR` → `<data dir>/lib`
/// when it exists.  The embedded library is always searched last.
pub fn resolve_libdirs(cli: &[PathBuf], env: Option<PathBuf>, data_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = cli.to_vec();
    dirs.extend(env.filter(|d| !d.as_os_str().is_empty()));
    if let Some(d) = data_dir.filter(|d| d.is_dir()) {
        dirs.push(d.to_owned());
    }
    dirs
}

// ── Tests ─────────────────────────────────────────────────────────────────────
