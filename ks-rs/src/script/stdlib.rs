//! Standard-library module registry.
//!
//! A [`Library`] maps module names to their source.  Two kinds exist:
//!
//! * **native** modules, implemented in Rust ([`call_native`]); their
//!   bindings are [`Value::Builtin`]s;
//! * **script** modules, Knit Script source executed once on first import.
//!
//! The embedded `lib/ks` files are always present.  Library directories
//! add `*.ks` files whose stem is an identifier, and shadow embedded
//! modules of the same name.  The first directory listed wins.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, warn};

use super::value::Value;
use crate::diag::Diagnostic;
use crate::embedded;
use crate::machine::{Bed, MachineError, Needle};

/// Where a module's bindings come from.
#[derive(Debug, Clone)]
pub enum ModuleSource {
    /// Built-in functions, by name.
    Native(&'static [&'static str]),
    /// Knit Script source; `origin` names it in diagnostics.
    Script { text: Cow<'static, str>, origin: String },
}

/// The `needles` module.
pub const NEEDLES: &[&str] = &["needle", "front_needle", "back_needle"];

#[derive(Debug, Clone)]
pub struct Library {
    modules: IndexMap<String, ModuleSource>,
}

impl Default for Library {
    fn default() -> Self {
        Self::embedded()
    }
}

/// Module names must be identifiers so that `import name;` can reach them.
fn is_module_name(stem: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(stem))
}

impl Library {
    /// Native modules plus the embedded `lib/ks` files.
    pub fn embedded() -> Self {
        let mut modules = IndexMap::new();
        modules.insert("needles".to_owned(), ModuleSource::Native(NEEDLES));
        for file in embedded::all_embedded() {
            let Some(text) = file.text() else {
                warn!(file = file.name, "embedded library file is not UTF-8; skipped");
                continue;
            };
            modules.insert(
                file.module_name().to_owned(),
                ModuleSource::Script {
                    text: Cow::Borrowed(text),
                    origin: format!("<embedded>/{}", file.name),
                },
            );
        }
        Library { modules }
    }

    /// The embedded library overlaid with every module found in `dirs`.
    ///
    /// Unreadable directories and files are skipped with a warning.
    pub fn with_dirs(dirs: &[PathBuf]) -> Self {
        let mut lib = Self::embedded();
        for dir in dirs.iter().rev() {
            lib.scan(dir);
        }
        lib
    }

    fn scan(&mut self, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot read library directory");
                return;
            }
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "ks"))
            .collect();
        paths.sort();
        for path in paths {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            if !is_module_name(stem) {
                debug!(path = %path.display(), "skipping library file with non-identifier name");
                continue;
            }
            if stem == "needles" {
                warn!(path = %path.display(), "`needles` is a native module and cannot be replaced");
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    debug!(module = stem, path = %path.display(), "library module");
                    self.modules.insert(
                        stem.to_owned(),
                        ModuleSource::Script {
                            text: Cow::Owned(text),
                            origin: path.display().to_string(),
                        },
                    );
                }
                Err(e) => warn!(path = %path.display(), error = %e, "cannot read library file"),
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&ModuleSource> {
        self.modules.get(name)
    }

    /// Registered module names, natives first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}

// ── Native functions ──────────────────────────────────────────────────────────

fn index_arg(v: &Value, what: &str) -> Result<usize, Diagnostic> {
    let i = v.as_int(what)?;
    usize::try_from(i).map_err(|_| MachineError::NegativeNeedle(i).into())
}

fn arity(name: &str, args: &[Value], n: usize) -> Result<(), Diagnostic> {
    if args.len() != n {
        return Err(Diagnostic::arity(format!(
            "{name}() takes {n} argument{}, got {}",
            if n == 1 { "" } else { "s" },
            args.len()
        )));
    }
    Ok(())
}

/// Call native library function `name`.
///
/// Returns `None` if `name` is not a native library function.
pub fn call_native(name: &str, args: Vec<Value>) -> Option<Result<Value, Diagnostic>> {
    let result = match name {
        "needle" => arity(name, &args, 2).and_then(|_| {
            let bed = if args[0].truthy() { Bed::Front } else { Bed::Back };
            Ok(Value::Needle(Needle::new(bed, index_arg(&args[1], "needle index")?)))
        }),
        "front_needle" => arity(name, &args, 1)
            .and_then(|_| Ok(Value::Needle(Needle::front(index_arg(&args[0], "needle index")?)))),
        "back_needle" => arity(name, &args, 1)
            .and_then(|_| Ok(Value::Needle(Needle::back(index_arg(&args[0], "needle index")?)))),
        _ => return None,
    };
    Some(result)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
