//! Canonical Knit Script printer.
//!
//! Output re-parses to a structurally identical tree.  Nested operator
//! expressions are always parenthesized, so the printer never needs to know
//! precedence; blocks are indented by four spaces.

use std::fmt::{self, Write};

use super::ast::*;

const INDENT: &str = "    ";

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Operands that are themselves operator expressions get parentheses.
fn write_operand(f: &mut fmt::Formatter<'_>, e: &Expr) -> fmt::Result {
    match &e.node {
        ExprKind::Binary(..) | ExprKind::Unary(..) | ExprKind::Through(..) => write!(f, "({e})"),
        _ => write!(f, "{e}"),
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Spanned<ExprKind> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            ExprKind::Int(n) => write!(f, "{n}"),
            ExprKind::Bool(true) => f.write_str("true"),
            ExprKind::Bool(false) => f.write_str("false"),
            ExprKind::Str(s) => f.write_str(&escape(s)),
            ExprKind::None => f.write_str("None"),
            ExprKind::Needle(bed, i) => write!(f, "{}{i}", bed.prefix()),
            ExprKind::CarrierSet(ids) => match ids.as_slice() {
                [one] => write!(f, "c{one}"),
                ids => {
                    f.write_str("c{")?;
                    for (i, id) in ids.iter().enumerate() {
                        if i > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{id}")?;
                    }
                    f.write_str("}")
                }
            },
            ExprKind::Ident(name) => f.write_str(name),
            ExprKind::Unary(op, operand) => {
                f.write_str(op.symbol())?;
                write_operand(f, operand)
            }
            ExprKind::Binary(op, lhs, rhs) => {
                write_operand(f, lhs)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, rhs)
            }
            ExprKind::Through(lo, hi) => {
                write_operand(f, lo)?;
                f.write_str(" through ")?;
                write_operand(f, hi)
            }
            ExprKind::Call { callee, args } => {
                write_operand(f, callee)?;
                f.write_str("(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match arg {
                        Arg::Positional(e) => write!(f, "{e}")?,
                        Arg::Keyword(k, e) => write!(f, "{k}={e}")?,
                    }
                }
                f.write_str(")")
            }
            ExprKind::Index(target, index) => {
                write_operand(f, target)?;
                write!(f, "[{index}]")
            }
            ExprKind::Slice { target, lo, hi } => {
                write_operand(f, target)?;
                f.write_str("[")?;
                if let Some(lo) = lo {
                    write!(f, "{lo}")?;
                }
                f.write_str(":")?;
                if let Some(hi) = hi {
                    write!(f, "{hi}")?;
                }
                f.write_str("]")
            }
            ExprKind::Attr(target, name) => {
                write_operand(f, target)?;
                write!(f, ".{name}")
            }
            ExprKind::List(items) => {
                f.write_str("[")?;
                write_list(f, items)?;
                f.write_str("]")
            }
            ExprKind::Set(items) => {
                f.write_str("{")?;
                write_list(f, items)?;
                f.write_str("}")
            }
            ExprKind::Dict(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Name(name) => f.write_str(name),
            Target::Index(base, index) => write!(f, "{base}[{index}]"),
        }
    }
}

// ── Statements ────────────────────────────────────────────────────────────────

struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    /// Emit `head {`, the block body, then `}` plus `tail`.
    fn block(&mut self, head: &str, body: &[Stmt]) {
        self.line(&format!("{head}{{"));
        self.depth += 1;
        for stmt in body {
            self.stmt(stmt);
        }
        self.depth -= 1;
        self.line("}");
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.node {
            StmtKind::Assign(t, v) => self.line(&format!("{t} = {v};")),
            StmtKind::AugAssign(t, op, v) => {
                self.line(&format!("{t} {}= {v};", op.binop().symbol()))
            }
            StmtKind::If { branches, else_block } => {
                for (i, (cond, body)) in branches.iter().enumerate() {
                    let kw = if i == 0 { "if" } else { "elif" };
                    self.block(&format!("{kw} {cond}:"), body);
                }
                if let Some(body) = else_block {
                    self.block("else:", body);
                }
            }
            StmtKind::While(cond, body) => self.block(&format!("while {cond}:"), body),
            StmtKind::For { var, iter, body } => self.block(&format!("for {var} in {iter}:"), body),
            StmtKind::FunctionDef(decl) => {
                let mut head = format!("def {}(", decl.name);
                for (i, p) in decl.params.iter().enumerate() {
                    if i > 0 {
                        head.push_str(", ");
                    }
                    head.push_str(&p.name);
                    if let Some(d) = &p.default {
                        let _ = write!(head, "={d}");
                    }
                }
                head.push_str(")");
                self.block(&head, &decl.body);
            }
            StmtKind::Return(None) => self.line("return;"),
            StmtKind::Return(Some(v)) => self.line(&format!("return {v};")),
            StmtKind::Break => self.line("break;"),
            StmtKind::Continue => self.line("continue;"),
            StmtKind::Import { module, alias: None } => self.line(&format!("import {module};")),
            StmtKind::Import { module, alias: Some(a) } => {
                self.line(&format!("import {module} as {a};"))
            }
            StmtKind::Assert { cond, message: None } => self.line(&format!("assert {cond};")),
            StmtKind::Assert { cond, message: Some(m) } => {
                self.line(&format!("assert {cond}, {m};"))
            }
            StmtKind::Expr(e) => self.line(&format!("{e};")),
            StmtKind::Block(body) => self.block("", body),
            StmtKind::With { bindings, body } => {
                let parts: Vec<String> = bindings
                    .iter()
                    .map(|(name, value)| format!("{} as {value}", name.node))
                    .collect();
                self.block(&format!("with {}:", parts.join(", ")), body);
            }
            StmtKind::DirectionBlock(dir, body) => {
                self.block(&format!("in {dir} direction:"), body)
            }
            StmtKind::Needles(op, needles) => {
                self.line(&format!("{} {};", op.keyword(), join(needles)))
            }
            StmtKind::Xfer(from, to) => self.line(&format!("xfer {} to {};", join(from), target(to))),
            StmtKind::Split(from, to) => {
                self.line(&format!("split {} to {};", join(from), target(to)))
            }
            StmtKind::Carriers(op, cs) => self.line(&format!("{} {cs};", op.keyword())),
            StmtKind::Rack(r) => self.line(&format!("rack {r};")),
            StmtKind::Pause => self.line("pause;"),
        }
    }
}

fn join(items: &[Expr]) -> String {
    items.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ")
}

fn target(t: &TransferTarget) -> String {
    match t {
        TransferTarget::Needles(ns) => join(ns),
        TransferTarget::Bed(bed) => match bed {
            crate::machine::Bed::Front => "front bed".to_owned(),
            crate::machine::Bed::Back => "back bed".to_owned(),
        },
    }
}

/// Print a program in canonical form.
pub fn print_program(program: &Program) -> String {
    let mut p = Printer { out: String::new(), depth: 0 };
    for stmt in &program.body {
        p.stmt(stmt);
    }
    p.out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::{parse_expression, parse_program};

    fn round_trip(src: &str) {
        let a = parse_program(src).unwrap();
        let printed = print_program(&a);
        let b = parse_program(&printed).unwrap_or_else(|e| panic!("{printed}\n{e}"));
        assert_eq!(a, b, "{printed}");
    }

    #[test]
    fn expressions_are_parenthesized() {
        let e = parse_expression("1 + 2 * -x").unwrap();
        assert_eq!(e.to_string(), "1 + (2 * (-x))");
        let e = parse_expression("not a in b").unwrap();
        assert_eq!(e.to_string(), "not (a in b)");
    }

    #[test]
    fn literals_print_canonically() {
        let e = parse_expression(r#"[c{1,3}, c2, f4, b0, "a\"b", None, True, {1: 2}]"#).unwrap();
        assert_eq!(e.to_string(), r#"[c{1,3}, c2, f4, b0, "a\"b", None, true, {1: 2}]"#);
    }

    #[test]
    fn program_round_trip() {
        round_trip(indoc::indoc! {r#"
            import needles as n;
            def pass(count, d=Leftward){
                i = 0;
                while i < count:{ i += 1; if i == 2:{ continue; } elif i > 5:{ break; } else:{ } }
                return i ** 2;
            }
            with Carrier as c{1,2}, Direction as Rightward:{
                in c1;
                knit f0 through f10, b3;
                xfer f0, f1 to back bed;
                split f2 to b2;
                rack -1;
                for x in [1, 2]:{ tuck f0 + x; }
            }
            in Leftward direction:{ miss f1; }
            xs = [1, 2, 3];
            xs[0] = xs[1:][0];
            assert pass(3) == 9, "bad";
            { drop f0; pause; }
            releasehook c1;
        "#});
    }
}
