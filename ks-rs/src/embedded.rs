//! Embedded copies of the `lib/ks/` standard-library modules.
//!
//! Every `.ks` file in the repository's `lib/ks/` directory is baked into
//! the binary at compile time via `include_bytes!()`, so the standard
//! library is available without any installed library directory.
//!
//! # Resolution order (see `cli::resolve_libdirs`)
//! 1. `-L <dir>` CLI flags, in order    → modules read from disk
//! 2. `$KSLIBDIR` env var               → modules read from disk
//! 3. OS user data dir (`~/.local/share/knit-script/lib` on Linux, etc.)
//! 4. **These embedded files**          → no disk access
//!
//! A module found earlier in the list shadows one of the same name later.

/// A single embedded library file.
pub struct EmbeddedFile {
    pub name: &'static str,
    pub content: &'static [u8],
}

/// All embedded `.ks` files from `lib/ks/`.
pub static EMBEDDED_LIBS: &[EmbeddedFile] = &[
    EmbeddedFile { name: "cast_ons.ks",  content: include_bytes!("../../lib/ks/cast_ons.ks") },
    EmbeddedFile { name: "stitches.ks",  content: include_bytes!("../../lib/ks/stitches.ks") },
];

impl EmbeddedFile {
    /// Module name: the file name without its `.ks` extension.
    pub fn module_name(&self) -> &'static str {
        self.name.strip_suffix(".ks").unwrap_or(self.name)
    }

    /// Content as UTF-8, or `None` if the file is not valid UTF-8.
    pub fn text(&self) -> Option<&'static str> {
        std::str::from_utf8(self.content).ok()
    }
}

/// Look up an embedded file by name (e.g. `"stitches.ks"`).
pub fn get_embedded(name: &str) -> Option<&'static str> {
    EMBEDDED_LIBS
        .iter()
        .find(|f| f.name == name)
        .and_then(EmbeddedFile::text)
}

/// All embedded files in declaration order.
pub fn all_embedded() -> impl Iterator<Item = &'static EmbeddedFile> {
    EMBEDDED_LIBS.iter()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
