//! Recursive-descent parser for Knit Script.
//!
//! Operator precedence (lowest → highest):
//!   or  →  and  →  not  →  comparison / in / not in  →  through  →
//!   additive  →  multiplicative  →  unary  →  power  →  postfix  →  primary
//!
//! Comparisons do not chain; `**` is right-associative.  Machine operations
//! (`knit`, `xfer`, `rack`, …) are statements with their own argument
//! shapes, never calls.  The parser performs no name lookups or type checks.

use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

use super::ast::*;
use super::lexer::{tokenize, Keyword, Token, TokenKind};
use crate::diag::{Diagnostic, ErrorKind, Span};
use crate::machine::Bed;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, found {found}")]
pub struct ParseError {
    pub span: Span,
    pub expected: String,
    pub found: String,
}

impl From<ParseError> for Diagnostic {
    fn from(e: ParseError) -> Self {
        let span = e.span;
        Diagnostic::new(ErrorKind::Parse, e.to_string()).at(span)
    }
}

type PResult<T> = Result<T, ParseError>;

/// Deepest nesting of expressions and blocks accepted before a parse error.
const MAX_NESTING: usize = 64;

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    loop_depth: usize,
    in_function: bool,
    nesting: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            loop_depth: 0,
            in_function: false,
            nesting: 0,
        }
    }

    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &TokenKind {
        let i = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[i].kind
    }

    fn span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    /// Span of the most recently consumed token.
    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_kw(&mut self, kw: Keyword) -> bool {
        self.eat(&TokenKind::Kw(kw))
    }

    fn at_kw(&self, kw: Keyword) -> bool {
        *self.peek() == TokenKind::Kw(kw)
    }

    fn error(&self, expected: impl Into<String>) -> ParseError {
        ParseError {
            span: self.span(),
            expected: expected.into(),
            found: self.peek().to_string(),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Span> {
        if *self.peek() == kind {
            Ok(self.advance().span)
        } else {
            Err(self.error(kind.to_string()))
        }
    }

    fn expect_kw(&mut self, kw: Keyword) -> PResult<Span> {
        self.expect(TokenKind::Kw(kw))
    }

    fn expect_ident(&mut self, what: &str) -> PResult<Spanned<String>> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                let span = self.advance().span;
                Ok(Spanned::new(name, span))
            }
            _ => Err(self.error(what)),
        }
    }

    fn expect_semi(&mut self) -> PResult<Span> {
        self.expect(TokenKind::Semi)
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn parse_program(&mut self) -> PResult<Program> {
        let mut body = Vec::new();
        while *self.peek() != TokenKind::Eof {
            body.push(self.parse_stmt()?);
        }
        Ok(Program { body })
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.nesting >= MAX_NESTING {
            return Err(self.misplaced(
                format!("at most {MAX_NESTING} levels of nested expressions or blocks"),
                "deeper nesting",
            ));
        }
        self.nesting += 1;
        let result = parse(self);
        self.nesting -= 1;
        result
    }

    /// `{ stmt* }`
    fn parse_block(&mut self) -> PResult<Block> {
        self.expect(TokenKind::LBrace)?;
        let body = self.nested(|p| {
            let mut body = Vec::new();
            while !matches!(p.peek(), TokenKind::RBrace | TokenKind::Eof) {
                body.push(p.parse_stmt()?);
            }
            Ok(body)
        })?;
        self.expect(TokenKind::RBrace)?;
        Ok(body)
    }

    /// `: { stmt* }`
    fn parse_colon_block(&mut self) -> PResult<Block> {
        self.expect(TokenKind::Colon)?;
        self.parse_block()
    }

    fn parse_loop_body(&mut self) -> PResult<Block> {
        self.loop_depth += 1;
        let body = self.parse_colon_block();
        self.loop_depth -= 1;
        body
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let start = self.span();
        let kind = match self.peek().clone() {
            TokenKind::Kw(Keyword::If) => self.parse_if()?,
            TokenKind::Kw(Keyword::While) => {
                self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_loop_body()?;
                StmtKind::While(cond, body)
            }
            TokenKind::Kw(Keyword::For) => {
                self.advance();
                let var = self.expect_ident("loop variable")?.node;
                self.expect_kw(Keyword::In)?;
                let iter = self.parse_expr()?;
                let body = self.parse_loop_body()?;
                StmtKind::For { var, iter, body }
            }
            TokenKind::Kw(Keyword::Def) => self.parse_def(start)?,
            TokenKind::Kw(Keyword::Return) => {
                if !self.in_function {
                    return Err(self.misplaced("`return` inside a function", "`return`"));
                }
                self.advance();
                let value = if *self.peek() == TokenKind::Semi {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect_semi()?;
                StmtKind::Return(value)
            }
            TokenKind::Kw(kw @ (Keyword::Break | Keyword::Continue)) => {
                if self.loop_depth == 0 {
                    let word = format!("`{}`", kw.as_str());
                    return Err(self.misplaced(format!("{word} inside a loop"), word));
                }
                self.advance();
                self.expect_semi()?;
                if kw == Keyword::Break {
                    StmtKind::Break
                } else {
                    StmtKind::Continue
                }
            }
            TokenKind::Kw(Keyword::Import) => {
                self.advance();
                let module = self.expect_ident("module name")?.node;
                let alias = if self.eat_kw(Keyword::As) {
                    Some(self.expect_ident("module alias")?.node)
                } else {
                    None
                };
                self.expect_semi()?;
                StmtKind::Import { module, alias }
            }
            TokenKind::Kw(Keyword::Assert) => {
                self.advance();
                let cond = self.parse_expr()?;
                let message = if self.eat(&TokenKind::Comma) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                self.expect_semi()?;
                StmtKind::Assert { cond, message }
            }
            TokenKind::Kw(Keyword::With) => self.parse_with()?,
            TokenKind::Kw(Keyword::In) => {
                self.advance();
                let value = self.parse_expr()?;
                if matches!(self.peek(), TokenKind::Ident(s) if s == "direction") {
                    self.advance();
                    let body = self.parse_colon_block()?;
                    StmtKind::DirectionBlock(value, body)
                } else {
                    self.expect_semi()?;
                    StmtKind::Carriers(CarrierOp::In, value)
                }
            }
            TokenKind::Kw(kw @ (Keyword::Out | Keyword::InHook | Keyword::OutHook | Keyword::ReleaseHook)) => {
                self.advance();
                let op = match kw {
                    Keyword::Out => CarrierOp::Out,
                    Keyword::InHook => CarrierOp::InHook,
                    Keyword::OutHook => CarrierOp::OutHook,
                    _ => CarrierOp::ReleaseHook,
                };
                let carriers = self.parse_expr()?;
                self.expect_semi()?;
                StmtKind::Carriers(op, carriers)
            }
            TokenKind::Kw(kw @ (Keyword::Knit | Keyword::Tuck | Keyword::Miss | Keyword::Drop)) => {
                self.advance();
                let op = match kw {
                    Keyword::Knit => NeedleOp::Knit,
                    Keyword::Tuck => NeedleOp::Tuck,
                    Keyword::Miss => NeedleOp::Miss,
                    _ => NeedleOp::Drop,
                };
                let needles = self.parse_expr_list()?;
                self.expect_semi()?;
                StmtKind::Needles(op, needles)
            }
            TokenKind::Kw(kw @ (Keyword::Xfer | Keyword::Split)) => {
                self.advance();
                let from = self.parse_expr_list()?;
                self.expect_kw(Keyword::To)?;
                let to = self.parse_transfer_target()?;
                self.expect_semi()?;
                if kw == Keyword::Xfer {
                    StmtKind::Xfer(from, to)
                } else {
                    StmtKind::Split(from, to)
                }
            }
            TokenKind::Kw(Keyword::Rack) => {
                self.advance();
                let r = self.parse_expr()?;
                self.expect_semi()?;
                StmtKind::Rack(r)
            }
            TokenKind::Kw(Keyword::Pause) => {
                self.advance();
                self.expect_semi()?;
                StmtKind::Pause
            }
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            _ => self.parse_expr_stmt()?,
        };
        Ok(Spanned::new(kind, start.to(self.prev_span())))
    }

    fn misplaced(&self, expected: impl Into<String>, found: impl Into<String>) -> ParseError {
        ParseError {
            span: self.span(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    fn parse_if(&mut self) -> PResult<StmtKind> {
        self.advance();
        let mut branches = Vec::new();
        let cond = self.parse_expr()?;
        branches.push((cond, self.parse_colon_block()?));
        while self.eat_kw(Keyword::Elif) {
            let cond = self.parse_expr()?;
            branches.push((cond, self.parse_colon_block()?));
        }
        let else_block = if self.eat_kw(Keyword::Else) {
            Some(self.parse_colon_block()?)
        } else {
            None
        };
        Ok(StmtKind::If { branches, else_block })
    }

    fn parse_def(&mut self, start: Span) -> PResult<StmtKind> {
        self.advance();
        let name = self.expect_ident("function name")?.node;
        self.expect(TokenKind::LParen)?;
        let mut params: Vec<Param> = Vec::new();
        while *self.peek() != TokenKind::RParen {
            let p = self.expect_ident("parameter name")?;
            if params.iter().any(|q| q.name == p.node) {
                return Err(ParseError {
                    span: p.span,
                    expected: "distinct parameter names".into(),
                    found: format!("duplicate parameter `{}`", p.node),
                });
            }
            let default = if self.eat(&TokenKind::Assign) {
                Some(self.parse_expr()?)
            } else {
                if params.iter().any(|q| q.default.is_some()) {
                    return Err(ParseError {
                        span: p.span,
                        expected: "a default value (parameters after a default need one)".into(),
                        found: format!("parameter `{}`", p.node),
                    });
                }
                None
            };
            params.push(Param { name: p.node, default });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        let saved = (self.loop_depth, self.in_function);
        self.loop_depth = 0;
        self.in_function = true;
        let body = self.parse_block();
        (self.loop_depth, self.in_function) = saved;
        let body = body?;

        Ok(StmtKind::FunctionDef(Rc::new(FunctionDecl {
            name,
            params,
            body,
            span: start.to(self.prev_span()),
        })))
    }

    /// `with Name as value, … : { … }`
    fn parse_with(&mut self) -> PResult<StmtKind> {
        self.advance();
        let mut bindings = Vec::new();
        loop {
            let name = self.expect_ident("machine global name")?;
            self.expect_kw(Keyword::As)?;
            let value = self.parse_expr()?;
            bindings.push((name, value));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let body = self.parse_colon_block()?;
        Ok(StmtKind::With { bindings, body })
    }

    fn parse_transfer_target(&mut self) -> PResult<TransferTarget> {
        if let (TokenKind::Ident(side), TokenKind::Ident(word)) = (self.peek(), self.peek_at(1)) {
            if word == "bed" {
                let bed = match side.as_str() {
                    "front" => Some(Bed::Front),
                    "back" => Some(Bed::Back),
                    _ => None,
                };
                if let Some(bed) = bed {
                    self.advance();
                    self.advance();
                    return Ok(TransferTarget::Bed(bed));
                }
            }
        }
        Ok(TransferTarget::Needles(self.parse_expr_list()?))
    }

    fn parse_expr_stmt(&mut self) -> PResult<StmtKind> {
        let expr = self.parse_expr()?;
        let aug = match self.peek() {
            TokenKind::Assign => None,
            TokenKind::PlusAssign => Some(AssignOp::Add),
            TokenKind::MinusAssign => Some(AssignOp::Sub),
            TokenKind::StarAssign => Some(AssignOp::Mul),
            TokenKind::SlashAssign => Some(AssignOp::Div),
            TokenKind::PercentAssign => Some(AssignOp::Rem),
            _ => {
                self.expect_semi()?;
                return Ok(StmtKind::Expr(expr));
            }
        };
        let target = to_target(&expr)?;
        self.advance();
        let value = self.parse_expr()?;
        self.expect_semi()?;
        Ok(match aug {
            None => StmtKind::Assign(target, value),
            Some(op) => StmtKind::AugAssign(target, op, value),
        })
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    fn parse_expr_list(&mut self) -> PResult<Vec<Expr>> {
        let mut items = vec![self.parse_expr()?];
        while self.eat(&TokenKind::Comma) {
            items.push(self.parse_expr()?);
        }
        Ok(items)
    }

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.nested(Self::parse_or)
    }

    fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        let span = lhs.span.to(rhs.span);
        Spanned::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span)
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat_kw(Keyword::Or) {
            let rhs = self.parse_and()?;
            lhs = Self::binary(BinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_not()?;
        while self.eat_kw(Keyword::And) {
            let rhs = self.parse_not()?;
            lhs = Self::binary(BinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> PResult<Expr> {
        if self.at_kw(Keyword::Not) {
            let start = self.advance().span;
            let operand = self.nested(Self::parse_not)?;
            let span = start.to(operand.span);
            return Ok(Spanned::new(ExprKind::Unary(UnaryOp::Not, Box::new(operand)), span));
        }
        self.parse_comparison()
    }

    fn comparison_op(&self) -> Option<(BinOp, usize)> {
        Some(match self.peek() {
            TokenKind::Eq => (BinOp::Eq, 1),
            TokenKind::Ne => (BinOp::Ne, 1),
            TokenKind::Lt => (BinOp::Lt, 1),
            TokenKind::Le => (BinOp::Le, 1),
            TokenKind::Gt => (BinOp::Gt, 1),
            TokenKind::Ge => (BinOp::Ge, 1),
            TokenKind::Kw(Keyword::In) => (BinOp::In, 1),
            TokenKind::Kw(Keyword::Not) if *self.peek_at(1) == TokenKind::Kw(Keyword::In) => {
                (BinOp::NotIn, 2)
            }
            _ => return None,
        })
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let lhs = self.parse_through()?;
        let Some((op, width)) = self.comparison_op() else {
            return Ok(lhs);
        };
        for _ in 0..width {
            self.advance();
        }
        let rhs = self.parse_through()?;
        if self.comparison_op().is_some() {
            return Err(self.misplaced(
                "end of comparison (comparisons do not chain; use `and`)",
                self.peek().to_string(),
            ));
        }
        Ok(Self::binary(op, lhs, rhs))
    }

    fn parse_through(&mut self) -> PResult<Expr> {
        let lhs = self.parse_additive()?;
        if !self.eat_kw(Keyword::Through) {
            return Ok(lhs);
        }
        let rhs = self.parse_additive()?;
        let span = lhs.span.to(rhs.span);
        Ok(Spanned::new(ExprKind::Through(Box::new(lhs), Box::new(rhs)), span))
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Self::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Rem,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Self::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        let start = self.advance().span;
        let operand = self.nested(Self::parse_unary)?;
        let span = start.to(operand.span);
        Ok(Spanned::new(ExprKind::Unary(op, Box::new(operand)), span))
    }

    fn parse_power(&mut self) -> PResult<Expr> {
        let base = self.parse_postfix()?;
        if self.eat(&TokenKind::StarStar) {
            let exp = self.parse_unary()?;
            return Ok(Self::binary(BinOp::Pow, base, exp));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_args()?;
                    let end = self.expect(TokenKind::RParen)?;
                    let span = expr.span.to(end);
                    expr = Spanned::new(ExprKind::Call { callee: Box::new(expr), args }, span);
                }
                TokenKind::LBracket => {
                    self.advance();
                    expr = self.parse_subscript(expr)?;
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_ident("attribute name")?;
                    let span = expr.span.to(name.span);
                    expr = Spanned::new(ExprKind::Attr(Box::new(expr), name.node), span);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_args(&mut self) -> PResult<Vec<Arg>> {
        let mut args = Vec::new();
        let mut seen_keyword = false;
        while *self.peek() != TokenKind::RParen {
            let keyword = match (self.peek(), self.peek_at(1)) {
                (TokenKind::Ident(name), TokenKind::Assign) => Some(name.clone()),
                _ => None,
            };
            if let Some(name) = keyword {
                self.advance();
                self.advance();
                args.push(Arg::Keyword(name, self.parse_expr()?));
                seen_keyword = true;
            } else {
                if seen_keyword {
                    return Err(self.error("keyword argument (positional arguments must come first)"));
                }
                args.push(Arg::Positional(self.parse_expr()?));
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    /// After `[`: either `target[index]` or `target[lo:hi]`.
    fn parse_subscript(&mut self, target: Expr) -> PResult<Expr> {
        let lo = if *self.peek() == TokenKind::Colon {
            None
        } else {
            Some(self.parse_expr()?)
        };
        if self.eat(&TokenKind::Colon) {
            let hi = if *self.peek() == TokenKind::RBracket {
                None
            } else {
                Some(self.parse_expr()?)
            };
            let end = self.expect(TokenKind::RBracket)?;
            let span = target.span.to(end);
            return Ok(Spanned::new(
                ExprKind::Slice {
                    target: Box::new(target),
                    lo: lo.map(Box::new),
                    hi: hi.map(Box::new),
                },
                span,
            ));
        }
        let end = self.expect(TokenKind::RBracket)?;
        let span = target.span.to(end);
        match lo {
            Some(index) => Ok(Spanned::new(ExprKind::Index(Box::new(target), Box::new(index)), span)),
            None => Err(self.error("index expression")),
        }
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let start = self.span();
        let kind = match self.peek().clone() {
            TokenKind::Int(n) => ExprKind::Int(n),
            TokenKind::Str(s) => ExprKind::Str(s),
            TokenKind::Kw(Keyword::True) => ExprKind::Bool(true),
            TokenKind::Kw(Keyword::False) => ExprKind::Bool(false),
            TokenKind::Kw(Keyword::None) => ExprKind::None,
            TokenKind::Needle(bed, i) => ExprKind::Needle(bed, i),
            TokenKind::Carriers(ids) => ExprKind::CarrierSet(ids),
            TokenKind::Ident(name) => ExprKind::Ident(name),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                let end = self.expect(TokenKind::RParen)?;
                return Ok(Spanned::new(inner.node, start.to(end)));
            }
            TokenKind::LBracket => {
                self.advance();
                let items = self.parse_items(TokenKind::RBracket)?;
                let end = self.expect(TokenKind::RBracket)?;
                return Ok(Spanned::new(ExprKind::List(items), start.to(end)));
            }
            TokenKind::LBrace => return self.parse_brace_literal(),
            _ => return Err(self.error("expression")),
        };
        self.advance();
        Ok(Spanned::new(kind, start))
    }

    /// Comma-separated expressions up to (not including) `close`; a trailing
    /// comma is allowed.
    fn parse_items(&mut self, close: TokenKind) -> PResult<Vec<Expr>> {
        let mut items = Vec::new();
        while *self.peek() != close {
            items.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }

    /// `{}` (empty dict), `{k: v, …}` (dict) or `{a, b, …}` (set).
    fn parse_brace_literal(&mut self) -> PResult<Expr> {
        let start = self.advance().span;
        if *self.peek() == TokenKind::RBrace {
            let end = self.advance().span;
            return Ok(Spanned::new(ExprKind::Dict(Vec::new()), start.to(end)));
        }
        let first = self.parse_expr()?;
        if self.eat(&TokenKind::Colon) {
            let mut entries = vec![(first, self.parse_expr()?)];
            while self.eat(&TokenKind::Comma) {
                if *self.peek() == TokenKind::RBrace {
                    break;
                }
                let k = self.parse_expr()?;
                self.expect(TokenKind::Colon)?;
                entries.push((k, self.parse_expr()?));
            }
            let end = self.expect(TokenKind::RBrace)?;
            return Ok(Spanned::new(ExprKind::Dict(entries), start.to(end)));
        }
        let mut items = vec![first];
        if self.eat(&TokenKind::Comma) {
            items.extend(self.parse_items(TokenKind::RBrace)?);
        }
        let end = self.expect(TokenKind::RBrace)?;
        Ok(Spanned::new(ExprKind::Set(items), start.to(end)))
    }
}

fn to_target(expr: &Expr) -> PResult<Target> {
    match &expr.node {
        ExprKind::Ident(name) => Ok(Target::Name(name.clone())),
        ExprKind::Index(base, index) => Ok(Target::Index(Box::new(to_target(base)?), (**index).clone())),
        _ => Err(ParseError {
            span: expr.span,
            expected: "assignment target (a name or subscript)".into(),
            found: "expression".into(),
        }),
    }
}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Parse a complete program.
pub fn parse_program(src: &str) -> Result<Program, Diagnostic> {
    let tokens = tokenize(src)?;
    let program = Parser::new(tokens).parse_program()?;
    debug!(statements = program.body.len(), "parsed program");
    Ok(program)
}

/// Parse a single expression that must span the whole input.
pub fn parse_expression(src: &str) -> Result<Expr, Diagnostic> {
    let mut p = Parser::new(tokenize(src)?);
    let expr = p.parse_expr()?;
    p.expect(TokenKind::Eof)?;
    Ok(expr)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
