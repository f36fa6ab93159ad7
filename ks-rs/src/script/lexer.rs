//! Knit Script lexer.
//!
//! Whitespace only separates tokens; statements end with `;` and blocks are
//! delimited by braces.  Comments are `//` to end of line and `/* … */`,
//! which nest.
//!
//! Needle literals (`f5`, `b12`) and carrier literals (`c3`, `c{1,3,5}`)
//! are recognised here as single tokens so the parser never has to split an
//! identifier.

use std::fmt;

use thiserror::Error;

use crate::diag::{Diagnostic, ErrorKind, Span};
use crate::machine::Bed;

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Def,
    Return,
    Import,
    As,
    Assert,
    With,
    Break,
    Continue,
    True,
    False,
    None,
    And,
    Or,
    Not,
    Through,
    Xfer,
    To,
    Knit,
    Tuck,
    Miss,
    Split,
    Drop,
    Out,
    InHook,
    OutHook,
    ReleaseHook,
    Rack,
    Pause,
}

impl Keyword {
    fn from_ident(s: &str) -> Option<Keyword> {
        Some(match s {
            "if" => Keyword::If,
            "elif" => Keyword::Elif,
            "else" => Keyword::Else,
            "while" => Keyword::While,
            "for" => Keyword::For,
            "in" => Keyword::In,
            "def" => Keyword::Def,
            "return" => Keyword::Return,
            "import" => Keyword::Import,
            "as" => Keyword::As,
            "assert" => Keyword::Assert,
            "with" => Keyword::With,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            "true" | "True" => Keyword::True,
            "false" | "False" => Keyword::False,
            "none" | "None" => Keyword::None,
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "not" => Keyword::Not,
            "through" => Keyword::Through,
            "xfer" => Keyword::Xfer,
            "to" => Keyword::To,
            "knit" => Keyword::Knit,
            "tuck" => Keyword::Tuck,
            "miss" => Keyword::Miss,
            "split" => Keyword::Split,
            "drop" => Keyword::Drop,
            "out" => Keyword::Out,
            "inhook" => Keyword::InHook,
            "outhook" => Keyword::OutHook,
            "releasehook" => Keyword::ReleaseHook,
            "rack" => Keyword::Rack,
            "pause" => Keyword::Pause,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::Elif => "elif",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::For => "for",
            Keyword::In => "in",
            Keyword::Def => "def",
            Keyword::Return => "return",
            Keyword::Import => "import",
            Keyword::As => "as",
            Keyword::Assert => "assert",
            Keyword::With => "with",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::None => "None",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Not => "not",
            Keyword::Through => "through",
            Keyword::Xfer => "xfer",
            Keyword::To => "to",
            Keyword::Knit => "knit",
            Keyword::Tuck => "tuck",
            Keyword::Miss => "miss",
            Keyword::Split => "split",
            Keyword::Drop => "drop",
            Keyword::Out => "out",
            Keyword::InHook => "inhook",
            Keyword::OutHook => "outhook",
            Keyword::ReleaseHook => "releasehook",
            Keyword::Rack => "rack",
            Keyword::Pause => "pause",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // Literals
    Int(i64),
    Str(String),
    Ident(String),
    Needle(Bed, usize),
    Carriers(Vec<u32>),
    Kw(Keyword),

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Eq, // ==
    Ne, // !=
    Lt,
    Le,
    Gt,
    Ge,

    // Assignment
    Assign,        // =
    PlusAssign,    // +=
    MinusAssign,   // -=
    StarAssign,    // *=
    SlashAssign,   // /=
    PercentAssign, // %=

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Colon,
    Dot,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Int(n) => return write!(f, "integer `{n}`"),
            TokenKind::Str(s) => return write!(f, "string {s:?}"),
            TokenKind::Ident(s) => return write!(f, "identifier `{s}`"),
            TokenKind::Needle(bed, i) => return write!(f, "needle `{}{i}`", bed.prefix()),
            TokenKind::Carriers(ids) => return write!(f, "carrier literal `c{ids:?}`"),
            TokenKind::Kw(k) => return write!(f, "`{}`", k.as_str()),
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::StarStar => "**",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Eq => "==",
            TokenKind::Ne => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::Assign => "=",
            TokenKind::PlusAssign => "+=",
            TokenKind::MinusAssign => "-=",
            TokenKind::StarAssign => "*=",
            TokenKind::SlashAssign => "/=",
            TokenKind::PercentAssign => "%=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Semi => ";",
            TokenKind::Colon => ":",
            TokenKind::Dot => ".",
            TokenKind::Eof => return f.write_str("end of input"),
        };
        write!(f, "`{s}`")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

impl From<LexError> for Diagnostic {
    fn from(e: LexError) -> Self {
        Diagnostic::new(ErrorKind::Lex, e.message).at(e.span)
    }
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    text: &'a str,
    src: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer {
            text: src,
            src: src.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.src.get(self.pos).copied()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if ch & 0xC0 != 0x80 {
            // Count characters, not UTF-8 continuation bytes.
            self.column += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, ch: u8) -> bool {
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn mark(&self) -> Span {
        Span::new(self.pos, self.pos, self.line, self.column)
    }

    fn finish(&self, start: Span) -> Span {
        Span { end: self.pos, ..start }
    }

    fn error(&self, start: Span, message: impl Into<String>) -> LexError {
        LexError {
            span: self.finish(start),
            message: message.into(),
        }
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match (self.peek(), self.peek2()) {
                (Some(b' ' | b'\t' | b'\r' | b'\n'), _) => {
                    self.advance();
                }
                (Some(b'/'), Some(b'/')) => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.advance();
                    }
                }
                (Some(b'/'), Some(b'*')) => self.skip_block_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start = self.mark();
        self.advance();
        self.advance();
        let mut depth = 1usize;
        while depth > 0 {
            match self.advance() {
                None => return Err(self.error(start, "unterminated block comment")),
                Some(b'/') if self.peek() == Some(b'*') => {
                    self.advance();
                    depth += 1;
                }
                Some(b'*') if self.peek() == Some(b'/') => {
                    self.advance();
                    depth -= 1;
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn read_digits(&mut self) -> &'a str {
        let begin = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.advance();
        }
        &self.text[begin..self.pos]
    }

    fn read_number(&mut self, start: Span) -> Result<TokenKind, LexError> {
        let digits = self.read_digits();
        digits
            .parse::<i64>()
            .map(TokenKind::Int)
            .map_err(|_| self.error(start, format!("integer literal `{digits}` is too large")))
    }

    fn read_string(&mut self, start: Span, quote: u8) -> Result<TokenKind, LexError> {
        self.advance();
        let mut bytes = Vec::new();
        loop {
            match self.advance() {
                None | Some(b'\n') => return Err(self.error(start, "unterminated string literal")),
                Some(b'\\') => {
                    let esc = self.mark();
                    let c = match self.advance() {
                        Some(b'n') => b'\n',
                        Some(b't') => b'\t',
                        Some(b'r') => b'\r',
                        Some(b'0') => 0,
                        Some(c @ (b'\\' | b'"' | b'\'')) => c,
                        None => return Err(self.error(start, "unterminated string literal")),
                        Some(_) => {
                            let bad = self.text[esc.start..].chars().next().unwrap_or('?');
                            return Err(LexError {
                                span: Span::new(esc.start - 1, esc.start + bad.len_utf8(), esc.line, esc.column - 1),
                                message: format!("unknown escape sequence `\\{bad}`"),
                            });
                        }
                    };
                    bytes.push(c);
                }
                Some(c) if c == quote => break,
                Some(c) => bytes.push(c),
            }
        }
        // The source is valid UTF-8 and escapes are ASCII, so this cannot fail.
        String::from_utf8(bytes)
            .map(TokenKind::Str)
            .map_err(|_| self.error(start, "string literal is not valid UTF-8"))
    }

    fn read_ident(&mut self) -> &'a str {
        let begin = self.pos;
        while matches!(
            self.peek(),
            Some(b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_')
        ) {
            self.advance();
        }
        &self.text[begin..self.pos]
    }

    /// `c{1, 3, 5}` after the `c` has been consumed.
    fn read_carrier_group(&mut self, start: Span) -> Result<TokenKind, LexError> {
        self.advance();
        let mut ids = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.eat(b'}') {
                break;
            }
            if !ids.is_empty() {
                if !self.eat(b',') {
                    return Err(self.error(start, "expected `,` or `}` in carrier literal"));
                }
                self.skip_trivia()?;
            }
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(self.error(start, "expected a carrier id in carrier literal"));
            }
            ids.push(self.carrier_id(start)?);
        }
        Ok(TokenKind::Carriers(ids))
    }

    fn carrier_id(&mut self, start: Span) -> Result<u32, LexError> {
        let digits = self.read_digits();
        digits
            .parse::<u32>()
            .map_err(|_| self.error(start, format!("carrier id `{digits}` is too large")))
    }

    fn word(&mut self, start: Span) -> Result<TokenKind, LexError> {
        // Carrier group literal: `c{…}`.
        if self.peek() == Some(b'c') && self.peek2() == Some(b'{') {
            self.advance();
            return self.read_carrier_group(start);
        }
        let word = self.read_ident();
        let bytes = word.as_bytes();
        let digits_only = |s: &[u8]| !s.is_empty() && s.iter().all(u8::is_ascii_digit);
        if bytes.len() > 1 && digits_only(&bytes[1..]) {
            let rest = &word[1..];
            match bytes[0] {
                b'f' | b'b' => {
                    let bed = if bytes[0] == b'f' { Bed::Front } else { Bed::Back };
                    // Needle indices must also be representable as script ints.
                    let index = rest
                        .parse::<i64>()
                        .ok()
                        .and_then(|i| usize::try_from(i).ok())
                        .ok_or_else(|| self.error(start, format!("needle index `{rest}` is too large")))?;
                    return Ok(TokenKind::Needle(bed, index));
                }
                b'c' => {
                    let id = rest
                        .parse::<u32>()
                        .map_err(|_| self.error(start, format!("carrier id `{rest}` is too large")))?;
                    return Ok(TokenKind::Carriers(vec![id]));
                }
                _ => {}
            }
        }
        Ok(match Keyword::from_ident(word) {
            Some(kw) => TokenKind::Kw(kw),
            None => TokenKind::Ident(word.to_owned()),
        })
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia()?;
        let start = self.mark();
        let Some(ch) = self.peek() else {
            return Ok(Token { kind: TokenKind::Eof, span: start });
        };

        let kind = match ch {
            b'0'..=b'9' => self.read_number(start)?,
            b'"' | b'\'' => self.read_string(start, ch)?,
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.word(start)?,
            _ => {
                self.advance();
                self.punct(ch, start)?
            }
        };
        Ok(Token { kind, span: self.finish(start) })
    }

    fn punct(&mut self, ch: u8, start: Span) -> Result<TokenKind, LexError> {
        Ok(match ch {
            b'+' => {
                if self.eat(b'=') {
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            b'-' => {
                if self.eat(b'=') {
                    TokenKind::MinusAssign
                } else {
                    TokenKind::Minus
                }
            }
            b'*' => {
                if self.eat(b'*') {
                    TokenKind::StarStar
                } else if self.eat(b'=') {
                    TokenKind::StarAssign
                } else {
                    TokenKind::Star
                }
            }
            b'/' => {
                if self.eat(b'=') {
                    TokenKind::SlashAssign
                } else {
                    TokenKind::Slash
                }
            }
            b'%' => {
                if self.eat(b'=') {
                    TokenKind::PercentAssign
                } else {
                    TokenKind::Percent
                }
            }
            b'=' => {
                if self.eat(b'=') {
                    TokenKind::Eq
                } else {
                    TokenKind::Assign
                }
            }
            b'!' => {
                if self.eat(b'=') {
                    TokenKind::Ne
                } else {
                    return Err(self.error(start, "unexpected character `!` (use `not` for negation)"));
                }
            }
            b'<' => {
                if self.eat(b'=') {
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            b'>' => {
                if self.eat(b'=') {
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semi,
            b':' => TokenKind::Colon,
            b'.' => TokenKind::Dot,
            _ => {
                let c = self.text[start.start..].chars().next().unwrap_or('?');
                // Consume the rest of a multi-byte character so the span covers it.
                while self.pos < start.start + c.len_utf8() {
                    self.advance();
                }
                return Err(self.error(start, format!("unexpected character `{c}`")));
            }
        })
    }
}

/// Tokenize `src`.  The result always ends with an `Eof` token.
pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(src);
    let mut tokens = Vec::new();
    loop {
        let tok = lexer.next_token()?;
        let done = tok.kind == TokenKind::Eof;
        tokens.push(tok);
        if done {
            return Ok(tokens);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn needle_and_carrier_literals() {
        assert_eq!(
            kinds("f5 b12 c3 c{1, 3,5} front c"),
            vec![
                TokenKind::Needle(Bed::Front, 5),
                TokenKind::Needle(Bed::Back, 12),
                TokenKind::Carriers(vec![3]),
                TokenKind::Carriers(vec![1, 3, 5]),
                TokenKind::Ident("front".into()),
                TokenKind::Ident("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn needle_index_must_fit_an_int() {
        assert_eq!(
            kinds("f9223372036854775807")[0],
            TokenKind::Needle(Bed::Front, i64::MAX as usize)
        );
        let e = tokenize("x = f0 - f9223372036854775808;").unwrap_err();
        assert!(e.message.contains("needle index `9223372036854775808` is too large"), "{}", e.message);
        assert_eq!(e.span.column, 10);
    }

    #[test]
    fn identifier_with_needle_prefix_is_not_a_needle() {
        assert_eq!(kinds("f5x")[0], TokenKind::Ident("f5x".into()));
        assert_eq!(kinds("b_1")[0], TokenKind::Ident("b_1".into()));
    }

    #[test]
    fn keywords_and_operators() {
        assert_eq!(
            kinds("while i<=3 and not x ** 2 != 1"),
            vec![
                TokenKind::Kw(Keyword::While),
                TokenKind::Ident("i".into()),
                TokenKind::Le,
                TokenKind::Int(3),
                TokenKind::Kw(Keyword::And),
                TokenKind::Kw(Keyword::Not),
                TokenKind::Ident("x".into()),
                TokenKind::StarStar,
                TokenKind::Int(2),
                TokenKind::Ne,
                TokenKind::Int(1),
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("None none")[..2], [TokenKind::Kw(Keyword::None), TokenKind::Kw(Keyword::None)]);
    }

    #[test]
    fn comments_nest() {
        assert_eq!(
            kinds("a /* x /* y */ z */ b // tail\nc"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Ident("b".into()),
                TokenKind::Ident("c".into()),
                TokenKind::Eof,
            ]
        );
        assert!(tokenize("/* /* */").is_err());
    }

    #[test]
    fn string_escapes() {
        assert_eq!(kinds(r#""a\n\"b\"\\""#)[0], TokenKind::Str("a\n\"b\"\\".into()));
        assert_eq!(kinds("'it\\'s'")[0], TokenKind::Str("it's".into()));
        let e = tokenize(r#""bad \q""#).unwrap_err();
        assert!(e.message.contains("\\q"));
        let e = tokenize("\"open").unwrap_err();
        assert_eq!(e.message, "unterminated string literal");
    }

    #[test]
    fn spans_track_lines_and_columns() {
        let toks = tokenize("x = 1;\n  knit f0;").unwrap();
        let knit = &toks[4];
        assert_eq!(knit.kind, TokenKind::Kw(Keyword::Knit));
        assert_eq!((knit.span.line, knit.span.column), (2, 3));
        assert_eq!(&"x = 1;\n  knit f0;"[knit.span.start..knit.span.end], "knit");
    }

    #[test]
    fn unknown_character_is_lex_error() {
        let e = tokenize("x = 1 @ 2;").unwrap_err();
        assert_eq!(e.message, "unexpected character `@`");
        assert_eq!(e.span.column, 7);
        let d: Diagnostic = tokenize("é").unwrap_err().into();
        assert_eq!(d.kind, ErrorKind::Lex);
    }

    #[test]
    fn malformed_carrier_group() {
        assert!(tokenize("c{1 2}").is_err());
        assert!(tokenize("c{1,}").is_err());
        assert_eq!(kinds("c{}")[0], TokenKind::Carriers(vec![]));
    }
}
