//! Knit Script interpreter.
//!
//! The [`Interpreter`] owns the scope arena and the [`Machine`] it drives.
//! It walks parsed [`Program`]s statement by statement; expressions are
//! evaluated to [`Value`]s and machine statements are turned into machine
//! primitives using the ambient carrier and direction.
//!
//! Errors are never recovered: the first [`Diagnostic`] unwinds every
//! scope and `with` block (restoring the machine globals on the way out)
//! and is returned to the caller.

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use super::{
    ast::*,
    builtins::{call_builtin, BUILTINS},
    parser::parse_program,
    scope::{ScopeId, Scopes, ROOT},
    stdlib::{call_native, Library, ModuleSource, NEEDLES},
    value::{Function, Key, Module, Range, Value},
};
use crate::config::MachineConfig;
use crate::diag::{Diagnostic, ErrorKind, Span, StackFrame};
use crate::machine::{Bed, CarrierSet, Direction, Machine, MachineError, Needle};

type R<T> = Result<T, Diagnostic>;

/// Deepest allowed chain of nested user-function calls.
pub const MAX_CALL_DEPTH: usize = 256;

/// Globals backed by machine state rather than a scope binding.
const MACHINE_GLOBALS: &[&str] = &["Carrier", "Direction", "Racking", "Loops", "Front_Loops", "Back_Loops"];

/// Machine globals a `with` statement may override.
const WITH_GLOBALS: &[&str] = &["Carrier", "Direction", "Racking"];

// ── ControlFlow ───────────────────────────────────────────────────────────────

/// Non-error control-flow signals that can unwind the call stack.
#[derive(Debug)]
pub enum ControlFlow {
    Break,
    Continue,
    Return(Value),
}

// ── Interpreter ───────────────────────────────────────────────────────────────

pub struct Interpreter {
    machine: Machine,
    scopes: Scopes,
    /// Scope new bindings go into.
    scope: ScopeId,
    /// Working carrier set used by `knit`, `tuck`, `miss` and `split`.
    carrier: Option<CarrierSet>,
    direction: Direction,
    /// Number of user-function activations currently running.
    depth: usize,
    /// Lines printed by `print`.
    pub output: Vec<String>,
    library: Library,
    modules: HashMap<String, Rc<Module>>,
    /// Modules whose top level is executing, outermost first.
    importing: Vec<String>,
    /// Module whose source is currently executing, if any.
    current_module: Option<Rc<str>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(MachineConfig::default(), Library::embedded())
    }
}

impl Interpreter {
    pub fn new(config: MachineConfig, library: Library) -> Self {
        let mut scopes = Scopes::new();
        for &name in BUILTINS {
            scopes.define(ROOT, name, Value::Builtin(name));
        }
        scopes.define(ROOT, "Leftward", Value::Direction(Direction::Leftward));
        scopes.define(ROOT, "Rightward", Value::Direction(Direction::Rightward));
        scopes.define(ROOT, "Needle_Count", Value::Int(config.bed_width() as i64));
        scopes.define(ROOT, "Carrier_Count", Value::Int(config.carrier_count.into()));
        scopes.define(ROOT, "Max_Rack", Value::Int(config.max_rack()));
        Interpreter {
            machine: Machine::new(config),
            scopes,
            scope: ROOT,
            carrier: None,
            direction: Direction::Leftward,
            depth: 0,
            output: Vec::new(),
            library,
            modules: HashMap::new(),
            importing: Vec::new(),
            current_module: None,
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn into_machine(self) -> Machine {
        self.machine
    }

    /// Current value of `name` as seen from the top level.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.machine_global(name)
            .or_else(|| self.scopes.resolve(ROOT, name).cloned())
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    /// Parse and run a complete program.
    pub fn exec_source(&mut self, src: &str) -> R<()> {
        let program = parse_program(src)?;
        self.run(&program)
    }

    /// Run a parsed program in the root scope.
    pub fn run(&mut self, program: &Program) -> R<()> {
        self.exec_block(&program.body)?;
        Ok(())
    }

    /// Execute statements in the current scope.
    pub fn exec_block(&mut self, stmts: &[Stmt]) -> R<Option<ControlFlow>> {
        for stmt in stmts {
            if let Some(cf) = self.exec_stmt(stmt)? {
                return Ok(Some(cf));
            }
        }
        Ok(None)
    }

    /// Execute statements in a fresh child of the current scope.
    fn exec_nested(&mut self, stmts: &[Stmt]) -> R<Option<ControlFlow>> {
        let parent = self.scope;
        self.in_child(parent, |me| me.exec_block(stmts))
    }

    /// Run `f` with a new child of `parent` as the current scope, then pop it.
    fn in_child<T>(&mut self, parent: ScopeId, f: impl FnOnce(&mut Self) -> R<T>) -> R<T> {
        let child = self.scopes.push(parent);
        let saved = std::mem::replace(&mut self.scope, child);
        let result = f(self);
        self.scope = saved;
        self.scopes.pop(child);
        result
    }

    /// Execute a single statement.  Errors without a location get the
    /// statement's span.
    pub fn exec_stmt(&mut self, stmt: &Stmt) -> R<Option<ControlFlow>> {
        self.exec_stmt_inner(stmt).map_err(|d| d.or_at(stmt.span))
    }

    fn exec_stmt_inner(&mut self, stmt: &Stmt) -> R<Option<ControlFlow>> {
        match &stmt.node {
            StmtKind::Expr(e) => {
                self.eval(e)?;
            }

            StmtKind::Assign(target, value) => {
                let v = self.eval(value)?;
                let (name, keys) = self.target_path(target)?;
                self.store(&name, &keys, v)?;
            }

            StmtKind::AugAssign(target, op, value) => {
                let (name, keys) = self.target_path(target)?;
                let current = self.load(&name, &keys)?;
                let rhs = self.eval(value)?;
                let v = Value::binary(op.binop(), &current, &rhs)?;
                self.store(&name, &keys, v)?;
            }

            StmtKind::If { branches, else_block } => {
                for (cond, body) in branches {
                    if self.eval(cond)?.truthy() {
                        return self.exec_nested(body);
                    }
                }
                if let Some(body) = else_block {
                    return self.exec_nested(body);
                }
            }

            StmtKind::While(cond, body) => {
                while self.eval(cond)?.truthy() {
                    match self.exec_nested(body)? {
                        Some(ControlFlow::Break) => break,
                        Some(ControlFlow::Continue) | None => {}
                        Some(cf @ ControlFlow::Return(_)) => return Ok(Some(cf)),
                    }
                }
            }

            StmtKind::For { var, iter, body } => {
                let items = self.eval(iter)?.iterate().map_err(|d| d.or_at(iter.span))?;
                let parent = self.scope;
                return self.in_child(parent, |me| {
                    for item in items {
                        me.scopes.define(me.scope, var, item);
                        match me.exec_nested(body)? {
                            Some(ControlFlow::Break) => break,
                            Some(ControlFlow::Continue) | None => {}
                            Some(cf @ ControlFlow::Return(_)) => return Ok(Some(cf)),
                        }
                    }
                    Ok(None)
                });
            }

            StmtKind::FunctionDef(decl) => {
                let defaults = decl
                    .params
                    .iter()
                    .map(|p| p.default.as_ref().map(|d| self.eval(d)).transpose())
                    .collect::<R<Vec<_>>>()?;
                self.scopes.capture(self.scope);
                let func = Function {
                    decl: Rc::clone(decl),
                    closure: self.scope,
                    defaults,
                    module: self.current_module.clone(),
                };
                self.scopes.define(self.scope, &decl.name, Value::Function(Rc::new(func)));
            }

            StmtKind::Return(value) => {
                let v = match value {
                    Some(e) => self.eval(e)?,
                    None => Value::None,
                };
                return Ok(Some(ControlFlow::Return(v)));
            }
            StmtKind::Break => return Ok(Some(ControlFlow::Break)),
            StmtKind::Continue => return Ok(Some(ControlFlow::Continue)),

            StmtKind::Import { module, alias } => {
                let m = self.import(module)?;
                match alias {
                    Some(alias) => self.scopes.define(self.scope, alias, Value::Module(m)),
                    None => {
                        for (name, value) in &m.bindings {
                            self.scopes.define(self.scope, name, value.clone());
                        }
                    }
                }
            }

            StmtKind::Assert { cond, message } => {
                if !self.eval(cond)?.truthy() {
                    let text = match message {
                        Some(m) => self.eval(m)?.to_string(),
                        None => format!("assertion failed: {cond}"),
                    };
                    return Err(Diagnostic::new(ErrorKind::AssertionFailure, text).at(stmt.span));
                }
            }

            StmtKind::Block(body) => return self.exec_nested(body),

            StmtKind::With { bindings, body } => return self.exec_with(bindings, body),

            StmtKind::DirectionBlock(dir, body) => {
                let d = match self.eval(dir)? {
                    Value::Direction(d) => d,
                    other => {
                        return Err(Diagnostic::type_error(format!(
                            "expected Leftward or Rightward, found `{}`",
                            other.type_name()
                        ))
                        .at(dir.span))
                    }
                };
                let saved = std::mem::replace(&mut self.direction, d);
                let result = self.exec_nested(body);
                self.direction = saved;
                return result;
            }

            StmtKind::Needles(op, exprs) => self.exec_needles(*op, exprs)?,

            StmtKind::Xfer(from, to) => {
                for (f, t) in self.transfer_pairs("xfer", from, to)? {
                    self.machine.xfer(f, t)?;
                }
            }

            StmtKind::Split(from, to) => {
                let pairs = self.transfer_pairs("split", from, to)?;
                let dir = self.direction;
                let cs = self.carrier.clone();
                for (f, t) in pairs {
                    self.machine.split(dir, f, t, cs.as_ref())?;
                }
            }

            StmtKind::Carriers(op, expr) => {
                let v = self.eval(expr)?;
                let cs = to_carrier_set(&v).map_err(|d| d.or_at(expr.span))?;
                match op {
                    CarrierOp::In => self.machine.carrier_in(&cs)?,
                    CarrierOp::Out => self.machine.carrier_out(&cs)?,
                    CarrierOp::InHook => self.machine.inhook(&cs)?,
                    CarrierOp::OutHook => self.machine.outhook(&cs)?,
                    CarrierOp::ReleaseHook => self.machine.releasehook(&cs)?,
                }
            }

            StmtKind::Rack(expr) => {
                let r = self.eval(expr)?.as_int("racking").map_err(|d| d.or_at(expr.span))?;
                self.machine.rack(r)?;
            }

            StmtKind::Pause => self.machine.pause(),
        }
        Ok(None)
    }

    // ── with ──────────────────────────────────────────────────────────────────

    /// Override machine globals for the duration of `body`.  Prior values
    /// are restored in reverse order however the body exits.
    fn exec_with(
        &mut self,
        bindings: &[(Spanned<String>, Expr)],
        body: &[Stmt],
    ) -> R<Option<ControlFlow>> {
        let mut saved: Vec<(&str, Value)> = Vec::new();
        let mut result = Ok(None);
        for (name, expr) in bindings {
            let name_str = name.node.as_str();
            if !WITH_GLOBALS.contains(&name_str) {
                result = Err(Diagnostic::new(
                    ErrorKind::Name,
                    format!("`with` can set Carrier, Direction or Racking, not `{name_str}`"),
                )
                .at(name.span));
                break;
            }
            let old = self.machine_global(name_str).unwrap_or_default();
            match self
                .eval(expr)
                .and_then(|v| self.set_machine_global(name_str, v).map_err(|d| d.or_at(expr.span)))
            {
                Ok(()) => saved.push((name_str, old)),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        if result.is_ok() {
            result = self.exec_nested(body);
        }
        for (name, old) in saved.into_iter().rev() {
            if let Err(e) = self.set_machine_global(name, old) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    // ── Machine statements ────────────────────────────────────────────────────

    fn working_carrier(&self, operation: &'static str) -> R<CarrierSet> {
        self.carrier
            .clone()
            .ok_or_else(|| MachineError::NoWorkingCarrier { operation }.into())
    }

    fn exec_needles(&mut self, op: NeedleOp, exprs: &[Expr]) -> R<()> {
        let mut needles = self.eval_needles(exprs)?;
        let dir = self.direction;
        dir.sort(&mut needles, self.machine.racking());
        if op == NeedleOp::Drop {
            for n in needles {
                self.machine.drop(n)?;
            }
            return Ok(());
        }
        let cs = self.working_carrier(op.keyword())?;
        for n in needles {
            match op {
                NeedleOp::Knit => self.machine.knit(dir, n, &cs)?,
                NeedleOp::Tuck => self.machine.tuck(dir, n, &cs)?,
                NeedleOp::Miss => self.machine.miss(dir, n, &cs)?,
                NeedleOp::Drop => self.machine.drop(n)?,
            }
        }
        Ok(())
    }

    /// Evaluate a needle-list operand, flattening nested lists.
    fn eval_needles(&mut self, exprs: &[Expr]) -> R<Vec<Needle>> {
        let mut out = Vec::new();
        for e in exprs {
            let v = self.eval(e)?;
            collect_needles(v, &mut out).map_err(|d| d.or_at(e.span))?;
        }
        Ok(out)
    }

    /// Source/target pairs for `xfer` and `split`, ordered by the ambient
    /// direction of the source needles.
    fn transfer_pairs(
        &mut self,
        operation: &'static str,
        from: &[Expr],
        to: &TransferTarget,
    ) -> R<Vec<(Needle, Needle)>> {
        let sources = self.eval_needles(from)?;
        let mut pairs = match to {
            TransferTarget::Needles(exprs) => {
                let targets = self.eval_needles(exprs)?;
                if targets.len() != sources.len() {
                    return Err(Diagnostic::type_error(format!(
                        "`{operation}` has {} source needle{} but {} target{}",
                        sources.len(),
                        if sources.len() == 1 { "" } else { "s" },
                        targets.len(),
                        if targets.len() == 1 { "" } else { "s" },
                    )));
                }
                sources.into_iter().zip(targets).collect::<Vec<_>>()
            }
            TransferTarget::Bed(bed) => sources
                .into_iter()
                .map(|n| self.aligned_on(operation, n, *bed).map(|t| (n, t)))
                .collect::<R<Vec<_>>>()?,
        };
        self.direction.sort_by_needle(&mut pairs, self.machine.racking(), |(from, _)| *from);
        Ok(pairs)
    }

    /// The needle on `bed` aligned with `n` at the current racking.
    fn aligned_on(&self, operation: &'static str, n: Needle, bed: Bed) -> R<Needle> {
        if n.bed == bed {
            return Err(MachineError::SameBed { operation, from: n, to: n }.into());
        }
        self.machine.aligned_needle(n).ok_or_else(|| {
            let r = self.machine.racking();
            let index = match n.bed {
                Bed::Front => n.index as i64 + r,
                Bed::Back => n.index as i64 - r,
            };
            MachineError::NegativeNeedle(index).into()
        })
    }

    // ── Machine globals ───────────────────────────────────────────────────────

    fn machine_global(&self, name: &str) -> Option<Value> {
        let loops = |bed| {
            Value::List(
                self.machine
                    .needles_with_loops(bed)
                    .into_iter()
                    .map(Value::Needle)
                    .collect(),
            )
        };
        Some(match name {
            "Carrier" => self.carrier.clone().map_or(Value::None, Value::CarrierSet),
            "Direction" => Value::Direction(self.direction),
            "Racking" => Value::Int(self.machine.racking()),
            "Loops" => loops(None),
            "Front_Loops" => loops(Some(Bed::Front)),
            "Back_Loops" => loops(Some(Bed::Back)),
            _ => return None,
        })
    }

    fn set_machine_global(&mut self, name: &str, value: Value) -> R<()> {
        match name {
            "Carrier" => {
                self.carrier = match value {
                    Value::None => None,
                    v => Some(to_carrier_set(&v)?),
                };
            }
            "Direction" => match value {
                Value::Direction(d) => self.direction = d,
                other => {
                    return Err(Diagnostic::type_error(format!(
                        "Direction must be Leftward or Rightward, not `{}`",
                        other.type_name()
                    )))
                }
            },
            "Racking" => self.machine.rack(value.as_int("Racking")?)?,
            _ => {
                return Err(Diagnostic::type_error(format!("`{name}` is read-only")));
            }
        }
        Ok(())
    }

    // ── Assignment ────────────────────────────────────────────────────────────

    /// Split a target into its root name and the evaluated subscript keys,
    /// outermost first.
    fn target_path(&mut self, target: &Target) -> R<(String, Vec<Value>)> {
        match target {
            Target::Name(name) => Ok((name.clone(), Vec::new())),
            Target::Index(base, index) => {
                let (name, mut keys) = self.target_path(base)?;
                keys.push(self.eval(index)?);
                Ok((name, keys))
            }
        }
    }

    fn lookup(&self, name: &str) -> R<Value> {
        if let Some(v) = self.machine_global(name) {
            return Ok(v);
        }
        self.scopes
            .resolve(self.scope, name)
            .cloned()
            .ok_or_else(|| Diagnostic::new(ErrorKind::Name, format!("name `{name}` is not defined")))
    }

    fn load(&self, name: &str, keys: &[Value]) -> R<Value> {
        let mut v = self.lookup(name)?;
        for key in keys {
            v = v.index(key)?;
        }
        Ok(v)
    }

    fn store(&mut self, name: &str, keys: &[Value], value: Value) -> R<()> {
        let value = if keys.is_empty() {
            value
        } else {
            let mut root = self.lookup(name)?;
            set_path(&mut root, keys, value)?;
            root
        };
        if MACHINE_GLOBALS.contains(&name) {
            self.set_machine_global(name, value)
        } else {
            self.scopes.assign(self.scope, name, value);
            Ok(())
        }
    }

    // ── Imports ───────────────────────────────────────────────────────────────

    fn import(&mut self, name: &str) -> R<Rc<Module>> {
        if let Some(m) = self.modules.get(name) {
            return Ok(Rc::clone(m));
        }
        if self.importing.iter().any(|n| n == name) {
            let chain = self.importing.join(" -> ");
            return Err(Diagnostic::new(
                ErrorKind::Import,
                format!("circular import of module `{name}` ({chain} -> {name})"),
            ));
        }
        let source = self.library.lookup(name).cloned().ok_or_else(|| {
            Diagnostic::new(ErrorKind::Import, format!("no module named `{name}`"))
        })?;

        let bindings = match source {
            ModuleSource::Native(names) => {
                debug!(module = name, "importing native module");
                names.iter().map(|&n| (n.to_owned(), Value::Builtin(n))).collect()
            }
            ModuleSource::Script { text, origin } => {
                debug!(module = name, %origin, "importing module");
                let program = parse_program(&text).map_err(|d| relocate(d, name))?;
                let scope = self.scopes.push(ROOT);
                self.scopes.capture(scope);
                let saved_scope = std::mem::replace(&mut self.scope, scope);
                let saved_module = self.current_module.replace(Rc::from(name));
                self.importing.push(name.to_owned());
                let result = self.exec_block(&program.body);
                self.importing.pop();
                self.current_module = saved_module;
                self.scope = saved_scope;
                result.map_err(|d| relocate(d, name))?;
                self.scopes
                    .bindings(scope)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<IndexMap<_, _>>()
            }
        };
        let module = Rc::new(Module { name: name.to_owned(), bindings });
        self.modules.insert(name.to_owned(), Rc::clone(&module));
        Ok(module)
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    /// Evaluate an expression.  Errors without a location get its span.
    pub fn eval(&mut self, expr: &Expr) -> R<Value> {
        self.eval_inner(expr).map_err(|d| d.or_at(expr.span))
    }

    fn eval_inner(&mut self, expr: &Expr) -> R<Value> {
        Ok(match &expr.node {
            ExprKind::Int(n) => Value::Int(*n),
            ExprKind::Bool(b) => Value::Bool(*b),
            ExprKind::Str(s) => Value::Str(s.clone()),
            ExprKind::None => Value::None,
            ExprKind::Needle(bed, i) => Value::Needle(Needle::new(*bed, *i)),
            ExprKind::CarrierSet(ids) => Value::CarrierSet(CarrierSet::new(ids.clone())?),
            ExprKind::Ident(name) => self.lookup(name)?,

            ExprKind::Unary(op, operand) => {
                let v = self.eval(operand)?;
                Value::unary(*op, &v)?
            }
            ExprKind::Binary(BinOp::And, lhs, rhs) => {
                Value::Bool(self.eval(lhs)?.truthy() && self.eval(rhs)?.truthy())
            }
            ExprKind::Binary(BinOp::Or, lhs, rhs) => {
                Value::Bool(self.eval(lhs)?.truthy() || self.eval(rhs)?.truthy())
            }
            ExprKind::Binary(op, lhs, rhs) => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                Value::binary(*op, &l, &r)?
            }
            ExprKind::Through(lo, hi) => {
                let lo = self.eval(lo)?;
                let hi = self.eval(hi)?;
                through(&lo, &hi, self.machine.config().bed_width())?
            }

            ExprKind::Call { callee, args } => {
                let f = self.eval(callee)?;
                let mut positional = Vec::new();
                let mut keywords = Vec::new();
                for arg in args {
                    match arg {
                        Arg::Positional(e) => positional.push(self.eval(e)?),
                        Arg::Keyword(name, e) => keywords.push((name.clone(), self.eval(e)?)),
                    }
                }
                self.call_value(f, positional, keywords, expr.span)?
            }

            ExprKind::Index(target, index) => {
                let t = self.eval(target)?;
                let i = self.eval(index)?;
                t.index(&i)?
            }
            ExprKind::Slice { target, lo, hi } => {
                let t = self.eval(target)?;
                let lo = lo.as_deref().map(|e| self.eval(e)).transpose()?;
                let hi = hi.as_deref().map(|e| self.eval(e)).transpose()?;
                t.slice(lo.as_ref(), hi.as_ref())?
            }
            ExprKind::Attr(target, name) => self.eval(target)?.attr(name)?,

            ExprKind::List(items) => {
                Value::List(items.iter().map(|e| self.eval(e)).collect::<R<_>>()?)
            }
            ExprKind::Set(items) => {
                let mut set = IndexSet::new();
                for e in items {
                    let v = self.eval(e)?;
                    set.insert(Key::try_from(&v).map_err(|d| d.or_at(e.span))?);
                }
                Value::Set(set)
            }
            ExprKind::Dict(entries) => {
                let mut dict = IndexMap::new();
                for (k, v) in entries {
                    let key = self.eval(k)?;
                    let key = Key::try_from(&key).map_err(|d| d.or_at(k.span))?;
                    dict.insert(key, self.eval(v)?);
                }
                Value::Dict(dict)
            }
        })
    }

    // ── Calls ─────────────────────────────────────────────────────────────────

    fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        keywords: Vec<(String, Value)>,
        call_site: Span,
    ) -> R<Value> {
        match callee {
            Value::Function(f) => self.call_function(&f, args, keywords, call_site),
            Value::Builtin(name) => {
                if let Some((k, _)) = keywords.first() {
                    return Err(Diagnostic::arity(format!(
                        "{name}() does not accept keyword arguments (got `{k}`)"
                    )));
                }
                if name == "print" {
                    let line = args.iter().map(Value::to_string).collect::<Vec<_>>().join(" ");
                    self.output.push(line);
                    return Ok(Value::None);
                }
                let result = if NEEDLES.contains(&name) {
                    call_native(name, args)
                } else {
                    call_builtin(name, args)
                };
                result.unwrap_or_else(|| {
                    Err(Diagnostic::type_error(format!("`{name}` is not callable")))
                })
            }
            other => Err(Diagnostic::type_error(format!(
                "`{}` value is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_function(
        &mut self,
        func: &Function,
        args: Vec<Value>,
        keywords: Vec<(String, Value)>,
        call_site: Span,
    ) -> R<Value> {
        let decl = &func.decl;
        if self.depth >= MAX_CALL_DEPTH {
            return Err(Diagnostic::new(
                ErrorKind::Recursion,
                format!("maximum call depth of {MAX_CALL_DEPTH} exceeded calling `{}`", decl.name),
            ));
        }
        let bound = bind_args(func, args, keywords)?;
        trace!(function = %decl.name, depth = self.depth, "call");

        self.depth += 1;
        let caller_module = std::mem::replace(&mut self.current_module, func.module.clone());
        let result = self.in_child(func.closure, |me| {
            for (param, value) in decl.params.iter().zip(bound) {
                me.scopes.define(me.scope, &param.name, value);
            }
            me.exec_block(&decl.body)
        });
        self.current_module = caller_module.clone();
        self.depth -= 1;

        match result {
            Ok(Some(ControlFlow::Return(v))) => Ok(v),
            Ok(_) => Ok(Value::None),
            Err(d) => {
                // A span attached inside this body refers to the function's own source.
                let mut d = match &func.module {
                    Some(module) if d.span.is_some() && !d.settled => relocate(d, module),
                    _ => d,
                };
                d.settled = d.span.is_some();
                d.call_stack.push(StackFrame {
                    function: decl.name.clone(),
                    call_site,
                    module: caller_module.map(|m| m.to_string()),
                });
                Err(d)
            }
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Match call arguments to parameters: positionals, then keywords, then
/// defaults.
fn bind_args(func: &Function, args: Vec<Value>, keywords: Vec<(String, Value)>) -> R<Vec<Value>> {
    let decl = &func.decl;
    let name = &decl.name;
    let params = &decl.params;
    if args.len() > params.len() {
        return Err(Diagnostic::arity(format!(
            "{name}() takes at most {} argument{}, got {}",
            params.len(),
            if params.len() == 1 { "" } else { "s" },
            args.len()
        )));
    }
    let mut slots: Vec<Option<Value>> = args.into_iter().map(Some).collect();
    slots.resize(params.len(), None);
    for (key, value) in keywords {
        let i = params.iter().position(|p| p.name == key).ok_or_else(|| {
            Diagnostic::arity(format!("{name}() got an unexpected keyword argument `{key}`"))
        })?;
        if slots[i].is_some() {
            return Err(Diagnostic::arity(format!(
                "{name}() got multiple values for argument `{key}`"
            )));
        }
        slots[i] = Some(value);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.or_else(|| func.defaults.get(i).cloned().flatten()).ok_or_else(|| {
                Diagnostic::arity(format!(
                    "{name}() missing required argument `{}`",
                    params[i].name
                ))
            })
        })
        .collect()
}

fn collect_needles(value: Value, out: &mut Vec<Needle>) -> R<()> {
    match value {
        Value::Needle(n) => out.push(n),
        Value::List(items) => {
            for item in items {
                collect_needles(item, out)?;
            }
        }
        Value::Set(keys) => {
            for key in keys {
                collect_needles(Value::from(key), out)?;
            }
        }
        other => {
            return Err(Diagnostic::type_error(format!(
                "expected a needle or a list of needles, found `{}`",
                other.type_name()
            )))
        }
    }
    Ok(())
}

fn to_carrier_set(v: &Value) -> R<CarrierSet> {
    match v {
        Value::CarrierSet(cs) => Ok(cs.clone()),
        Value::Int(n) => Ok(CarrierSet::from_ints(&[*n])?),
        Value::List(items) => {
            let ids = items
                .iter()
                .map(|i| i.as_int("carrier id"))
                .collect::<R<Vec<_>>>()?;
            Ok(CarrierSet::from_ints(&ids)?)
        }
        other => Err(Diagnostic::type_error(format!(
            "expected a carrier set, found `{}`",
            other.type_name()
        ))),
    }
}

/// `lo through hi`: an inclusive integer range, or the needles between two
/// needles on the same bed.  Both needles must lie on a bed `bed_width` wide.
fn through(lo: &Value, hi: &Value, bed_width: usize) -> R<Value> {
    match (lo, hi) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Range(Range::inclusive(*a, *b))),
        (Value::Needle(a), Value::Needle(b)) if a.bed == b.bed => {
            if let Some(&needle) = [a, b].into_iter().find(|n| n.index >= bed_width) {
                return Err(MachineError::NeedleOutOfBounds { needle, bed_width }.into());
            }
            Ok(Value::List(
                Range::inclusive(a.index as i64, b.index as i64)
                    .iter()
                    .map(|i| Value::Needle(Needle::new(a.bed, i as usize)))
                    .collect(),
            ))
        }
        (Value::Needle(a), Value::Needle(b)) => Err(Diagnostic::type_error(format!(
            "`{a} through {b}` spans both beds"
        ))),
        (a, b) => Err(Diagnostic::type_error(format!(
            "`through` needs two ints or two needles, found `{}` and `{}`",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// `container[k0][k1]… = value`, rebuilding each level by value.
fn set_path(container: &mut Value, keys: &[Value], value: Value) -> R<()> {
    match keys {
        [] => {
            *container = value;
            Ok(())
        }
        [key] => container.set_index(key, value),
        [key, rest @ ..] => {
            let mut child = container.index(key)?;
            set_path(&mut child, rest, value)?;
            container.set_index(key, child)
        }
    }
}

/// Re-home a diagnostic raised inside a library module: its span refers to
/// the module source, so fold the location into the message.
fn relocate(mut d: Diagnostic, module: &str) -> Diagnostic {
    let at = d.span.map(|s| format!(" at {s}")).unwrap_or_default();
    d.message = format!("{} (in module `{module}`{at})", d.message);
    d.span = None;
    d.settled = false;
    d.call_stack.clear();
    d
}

// ── Tests ─────────────────────────────────────────────────────────────────────
