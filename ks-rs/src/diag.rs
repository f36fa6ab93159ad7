//! Source spans, error kinds, and the caller-facing [`Diagnostic`].
//!
//! Every stage of the pipeline has its own typed error (`LexError`,
//! `ParseError`, `MachineError`, …).  They all convert into a single
//! [`Diagnostic`], which is what the interpreter propagates and what
//! [`knit_script_to_knitout`](crate::knit_script_to_knitout) reports.

use std::fmt;

use thiserror::Error;

// ── Span ──────────────────────────────────────────────────────────────────────

/// A region of source text.
///
/// `start`/`end` are byte offsets; `line`/`column` locate `start` (1-based,
/// column counted in characters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Span { start, end, line, column }
    }

    /// The span covering `self` through `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end.max(self.end),
            line: self.line,
            column: self.column,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// ── ErrorKind ─────────────────────────────────────────────────────────────────

/// The error taxonomy visible to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Lex,
    Parse,
    Name,
    Arity,
    Type,
    Import,
    NeedleBounds,
    CarrierState,
    Rack,
    YarnCollision,
    AssertionFailure,
    Config,
    Io,
    Recursion,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Lex => "LexError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::Name => "NameError",
            ErrorKind::Arity => "ArityError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Import => "ImportError",
            ErrorKind::NeedleBounds => "NeedleBoundsError",
            ErrorKind::CarrierState => "CarrierStateError",
            ErrorKind::Rack => "RackError",
            ErrorKind::YarnCollision => "YarnCollisionError",
            ErrorKind::AssertionFailure => "AssertionFailure",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Io => "IoError",
            ErrorKind::Recursion => "RecursionError",
        }
    }

    /// `true` for the physical-feasibility family raised by the machine model.
    pub fn is_machine_error(self) -> bool {
        matches!(
            self,
            ErrorKind::NeedleBounds
                | ErrorKind::CarrierState
                | ErrorKind::Rack
                | ErrorKind::YarnCollision
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Diagnostic ────────────────────────────────────────────────────────────────

/// One user-function activation on the call stack at the time of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub function: String,
    pub call_site: Span,
    /// Library module whose source `call_site` refers to; `None` for the
    /// program being compiled.
    pub module: Option<String>,
}

/// A single reportable failure.
///
/// `call_stack` is ordered innermost call first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
    pub call_stack: Vec<StackFrame>,
    /// `span` has already crossed out of the function whose source it
    /// refers to, so enclosing frames must leave it alone.
    pub(crate) settled: bool,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            span: None,
            call_stack: Vec::new(),
            settled: false,
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub fn arity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Arity, message)
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach `span` unless a more precise one is already present.
    pub fn or_at(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    /// Render a multi-line, human-readable report against `source`.
    pub fn render(&self, path: &str, source: &str) -> String {
        let mut out = format!("error[{}]: {}\n", self.kind, self.message);
        if let Some(span) = self.span {
            out.push_str(&format!("  --> {path}:{span}\n"));
            if let Some(text) = source.lines().nth(span.line.saturating_sub(1) as usize) {
                let gutter = span.line.to_string();
                let pad = " ".repeat(gutter.len());
                let col = span.column.saturating_sub(1) as usize;
                let remaining = text.chars().count().saturating_sub(col).max(1);
                let width = source
                    .get(span.start..span.end)
                    .map(|s| s.chars().take_while(|&c| c != '\n').count())
                    .unwrap_or(1)
                    .clamp(1, remaining);
                out.push_str(&format!(" {pad} |\n"));
                out.push_str(&format!(" {gutter} | {text}\n"));
                out.push_str(&format!(
                    " {pad} | {}{}\n",
                    " ".repeat(col),
                    "^".repeat(width)
                ));
            }
        } else {
            out.push_str(&format!("  --> {path}\n"));
        }
        for frame in &self.call_stack {
            let site = match &frame.module {
                Some(module) => format!("module `{module}` {}", frame.call_site),
                None => format!("{path}:{}", frame.call_site),
            };
            out.push_str(&format!("   = in `{}` called at {site}\n", frame.function));
        }
        out
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_merge_keeps_start_location() {
        let a = Span::new(4, 6, 2, 3);
        let b = Span::new(10, 14, 2, 9);
        let m = a.to(b);
        assert_eq!((m.start, m.end, m.line, m.column), (4, 14, 2, 3));
    }

    #[test]
    fn kind_names_match_taxonomy() {
        assert_eq!(ErrorKind::CarrierState.to_string(), "CarrierStateError");
        assert_eq!(ErrorKind::AssertionFailure.to_string(), "AssertionFailure");
        assert!(ErrorKind::Rack.is_machine_error());
        assert!(!ErrorKind::Name.is_machine_error());
    }

    #[test]
    fn or_at_does_not_overwrite() {
        let d = Diagnostic::type_error("bad")
            .at(Span::new(1, 2, 1, 2))
            .or_at(Span::new(5, 9, 3, 1));
        assert_eq!(d.span, Some(Span::new(1, 2, 1, 2)));
    }

    #[test]
    fn render_underlines_span() {
        let src = "x = 1;\nknit y;\n";
        let d = Diagnostic::new(ErrorKind::Name, "name `y` is not defined")
            .at(Span::new(12, 13, 2, 6));
        let text = d.render("prog.ks", src);
        assert!(text.starts_with("error[NameError]: name `y` is not defined"));
        assert!(text.contains("--> prog.ks:2:6"));
        assert!(text.contains(" 2 | knit y;"));
        assert!(text.contains("   |      ^\n"));
    }

    #[test]
    fn render_lists_call_stack() {
        let mut d = Diagnostic::new(ErrorKind::Rack, "misaligned");
        d.call_stack.push(StackFrame {
            function: "pass".into(),
            call_site: Span::new(0, 4, 7, 1),
            module: None,
        });
        d.call_stack.push(StackFrame {
            function: "each".into(),
            call_site: Span::new(0, 4, 3, 5),
            module: Some("stitches".into()),
        });
        let text = d.render("a.ks", "");
        assert!(text.contains("in `pass` called at a.ks:7:1"), "{text}");
        assert!(text.contains("in `each` called at module `stitches` 3:5"), "{text}");
    }
}
