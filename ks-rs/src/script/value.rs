//! Runtime values for Knit Script.
//!
//! Knit Script is dynamically typed; every value is a [`Value`] and every
//! operator checks its operand types at run time.  Collections have value
//! semantics: assigning a list copies it, and mutating the copy through a
//! subscript assignment does not affect the original.

use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use super::ast::{BinOp, FunctionDecl, UnaryOp};
use super::scope::ScopeId;
use crate::diag::{Diagnostic, ErrorKind};
use crate::machine::{Bed, CarrierSet, Direction, MachineError, Needle};

type VResult<T> = Result<T, Diagnostic>;

/// A user-defined function: its declaration plus the scope it closes over.
#[derive(Debug)]
pub struct Function {
    pub decl: Rc<FunctionDecl>,
    pub closure: ScopeId,
    /// Default values, evaluated once when the `def` runs.  Parallel to
    /// `decl.params`.
    pub defaults: Vec<Option<Value>>,
    /// The library module that defined the function, if any.
    pub module: Option<Rc<str>>,
}

/// An imported module: its top-level bindings in definition order.
#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub bindings: IndexMap<String, Value>,
}

/// Half-open integer range `[start, stop)` stepping by `step` (never 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    /// Inclusive range from `a` to `b`, descending when `b < a`.
    pub fn inclusive(a: i64, b: i64) -> Range {
        if b >= a {
            Range { start: a, stop: b.saturating_add(1), step: 1 }
        } else {
            Range { start: a, stop: b.saturating_sub(1), step: -1 }
        }
    }

    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            i128::from(self.stop) - i128::from(self.start)
        } else {
            i128::from(self.start) - i128::from(self.stop)
        };
        if span <= 0 {
            return 0;
        }
        let steps = (span as u128).div_ceil(u128::from(self.step.unsigned_abs()));
        usize::try_from(steps).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `i`th element; always inside `start..stop`, so it fits an `i64`.
    fn nth(&self, i: usize) -> i64 {
        let n = i128::from(self.start) + i128::from(self.step) * i as i128;
        n as i64
    }

    pub fn get(&self, i: usize) -> Option<i64> {
        (i < self.len()).then(|| self.nth(i))
    }

    pub fn contains(&self, n: i64) -> bool {
        let in_bounds = if self.step > 0 {
            n >= self.start && n < self.stop
        } else {
            n <= self.start && n > self.stop
        };
        in_bounds && (i128::from(n) - i128::from(self.start)) % i128::from(self.step) == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.len()).map(move |i| self.nth(i))
    }
}

/// Longest string (in bytes) or list a script may build in one operation.
pub const MAX_SEQUENCE_LEN: usize = 1 << 24;

fn too_long(len: Option<usize>) -> Diagnostic {
    let what = len.map_or_else(|| "more than usize::MAX".to_owned(), |n| n.to_string());
    Diagnostic::type_error(format!(
        "sequence of {what} elements is too long (at most {MAX_SEQUENCE_LEN} are allowed)"
    ))
}

/// Length of a sequence about to be materialised.
fn checked_len(len: usize) -> VResult<usize> {
    if len > MAX_SEQUENCE_LEN {
        Err(too_long(Some(len)))
    } else {
        Ok(len)
    }
}

/// Length of `len` elements repeated `times` times; negative counts repeat zero times.
fn repeated_len(len: usize, times: i64) -> VResult<usize> {
    let times = usize::try_from(times.max(0)).map_err(|_| too_long(None))?;
    let total = len.checked_mul(times).ok_or_else(|| too_long(None))?;
    checked_len(total)
}

/// A Knit Script runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Int(i64),
    Bool(bool),
    Str(String),
    Needle(Needle),
    CarrierSet(CarrierSet),
    Direction(Direction),
    List(Vec<Value>),
    Set(IndexSet<Key>),
    Dict(IndexMap<Key, Value>),
    Range(Range),
    Function(Rc<Function>),
    Builtin(&'static str),
    Module(Rc<Module>),
}

/// Hashable values: the only values allowed as set members and dict keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    None,
    Int(i64),
    Bool(bool),
    Str(String),
    Needle(Needle),
    CarrierSet(CarrierSet),
    Direction(Direction),
}

impl TryFrom<&Value> for Key {
    type Error = Diagnostic;

    fn try_from(v: &Value) -> VResult<Key> {
        Ok(match v {
            Value::None => Key::None,
            Value::Int(n) => Key::Int(*n),
            Value::Bool(b) => Key::Bool(*b),
            Value::Str(s) => Key::Str(s.clone()),
            Value::Needle(n) => Key::Needle(*n),
            Value::CarrierSet(cs) => Key::CarrierSet(cs.clone()),
            Value::Direction(d) => Key::Direction(*d),
            other => {
                return Err(Diagnostic::type_error(format!(
                    "unhashable type `{}` cannot be a set member or dict key",
                    other.type_name()
                )))
            }
        })
    }
}

impl From<Key> for Value {
    fn from(k: Key) -> Value {
        match k {
            Key::None => Value::None,
            Key::Int(n) => Value::Int(n),
            Key::Bool(b) => Value::Bool(b),
            Key::Str(s) => Value::Str(s),
            Key::Needle(n) => Value::Needle(n),
            Key::CarrierSet(cs) => Value::CarrierSet(cs),
            Key::Direction(d) => Value::Direction(d),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Needle(a), Value::Needle(b)) => a == b,
            (Value::CarrierSet(a), Value::CarrierSet(b)) => a == b,
            (Value::Direction(a), Value::Direction(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn quote(s: &str) -> String {
    let mut out = String::from("\"");
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `str()` form: strings unquoted, everything else as [`Value::repr`].
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => f.write_str(&other.repr()),
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Str(_) => "str",
            Value::Needle(_) => "needle",
            Value::CarrierSet(_) => "carrier_set",
            Value::Direction(_) => "direction",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Dict(_) => "dict",
            Value::Range(_) => "range",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function",
            Value::Module(_) => "module",
        }
    }

    /// Truthiness: `None`, `0`, `false`, and empty strings or collections
    /// are false; everything else is true.
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Int(n) => *n != 0,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            Value::List(v) => !v.is_empty(),
            Value::Set(s) => !s.is_empty(),
            Value::Dict(d) => !d.is_empty(),
            Value::Range(r) => !r.is_empty(),
            Value::Needle(_)
            | Value::CarrierSet(_)
            | Value::Direction(_)
            | Value::Function(_)
            | Value::Builtin(_)
            | Value::Module(_) => true,
        }
    }

    /// Source-like representation: strings quoted.
    pub fn repr(&self) -> String {
        fn join(items: impl Iterator<Item = String>) -> String {
            items.collect::<Vec<_>>().join(", ")
        }
        match self {
            Value::None => "None".into(),
            Value::Int(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Str(s) => quote(s),
            Value::Needle(n) => n.to_string(),
            Value::CarrierSet(cs) => cs.literal(),
            Value::Direction(d) => d.to_string(),
            Value::List(v) => format!("[{}]", join(v.iter().map(Value::repr))),
            Value::Set(s) => format!(
                "{{{}}}",
                join(s.iter().map(|k| Value::from(k.clone()).repr()))
            ),
            Value::Dict(d) => format!(
                "{{{}}}",
                join(d.iter().map(|(k, v)| format!("{}: {}", Value::from(k.clone()).repr(), v.repr())))
            ),
            Value::Range(r) if r.step == 1 => format!("range({}, {})", r.start, r.stop),
            Value::Range(r) => format!("range({}, {}, {})", r.start, r.stop, r.step),
            Value::Function(func) => format!("<function {}>", func.decl.name),
            Value::Builtin(name) => format!("<built-in function {name}>"),
            Value::Module(m) => format!("<module {}>", m.name),
        }
    }

    pub fn as_int(&self, what: &str) -> VResult<i64> {
        match self {
            Value::Int(n) => Ok(*n),
            other => Err(Diagnostic::type_error(format!(
                "{what} must be an int, not `{}`",
                other.type_name()
            ))),
        }
    }

    /// The elements a `for` loop visits.  Dicts yield their keys.
    pub fn iterate(&self) -> VResult<Vec<Value>> {
        Ok(match self {
            Value::List(v) => v.clone(),
            Value::Set(s) => s.iter().cloned().map(Value::from).collect(),
            Value::Dict(d) => d.keys().cloned().map(Value::from).collect(),
            Value::Range(r) => {
                checked_len(r.len())?;
                r.iter().map(Value::Int).collect()
            }
            Value::CarrierSet(cs) => cs.ids().iter().map(|&id| Value::Int(id.into())).collect(),
            Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
            other => {
                return Err(Diagnostic::type_error(format!(
                    "`{}` value is not iterable",
                    other.type_name()
                )))
            }
        })
    }

    pub fn len(&self) -> VResult<usize> {
        Ok(match self {
            Value::Str(s) => s.chars().count(),
            Value::List(v) => v.len(),
            Value::Set(s) => s.len(),
            Value::Dict(d) => d.len(),
            Value::Range(r) => r.len(),
            Value::CarrierSet(cs) => cs.len(),
            other => {
                return Err(Diagnostic::type_error(format!(
                    "`{}` value has no length",
                    other.type_name()
                )))
            }
        })
    }

    // ── Attributes ────────────────────────────────────────────────────────────

    /// Attribute lookup, dispatched on (value kind, attribute name).
    pub fn attr(&self, name: &str) -> VResult<Value> {
        let found = match (self, name) {
            (Value::Needle(n), "index" | "position") => {
                Some(Value::Int(i64::try_from(n.index).map_err(|_| overflow())?))
            }
            (Value::Needle(n), "is_front") => Some(Value::Bool(n.is_front())),
            (Value::Needle(n), "is_back") => Some(Value::Bool(n.is_back())),
            (Value::Needle(n), "bed") => Some(Value::Str(
                match n.bed {
                    Bed::Front => "front",
                    Bed::Back => "back",
                }
                .into(),
            )),
            (Value::Needle(n), "opposite") => Some(Value::Needle(n.opposite())),
            (Value::CarrierSet(cs), "ids") => {
                Some(Value::List(cs.ids().iter().map(|&id| Value::Int(id.into())).collect()))
            }
            (Value::CarrierSet(cs), "count") => Some(Value::Int(cs.len() as i64)),
            (Value::Direction(d), "opposite") => Some(Value::Direction(d.opposite())),
            (Value::Str(_) | Value::List(_) | Value::Set(_) | Value::Dict(_), "length") => {
                Some(Value::Int(i64::try_from(self.len()?).map_err(|_| overflow())?))
            }
            (Value::Dict(d), "keys") => Some(Value::List(d.keys().cloned().map(Value::from).collect())),
            (Value::Dict(d), "values") => Some(Value::List(d.values().cloned().collect())),
            (Value::Range(r), "start") => Some(Value::Int(r.start)),
            (Value::Range(r), "stop") => Some(Value::Int(r.stop)),
            (Value::Range(r), "step") => Some(Value::Int(r.step)),
            (Value::Module(m), name) => {
                return m.bindings.get(name).cloned().ok_or_else(|| {
                    Diagnostic::new(
                        ErrorKind::Name,
                        format!("module `{}` has no binding `{name}`", m.name),
                    )
                })
            }
            _ => None,
        };
        found.ok_or_else(|| {
            Diagnostic::type_error(format!("`{}` value has no attribute `{name}`", self.type_name()))
        })
    }

    // ── Subscripts ────────────────────────────────────────────────────────────

    pub fn index(&self, idx: &Value) -> VResult<Value> {
        match self {
            Value::List(v) => Ok(v[seq_index(idx, v.len(), "list")?].clone()),
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                Ok(Value::Str(chars[seq_index(idx, chars.len(), "str")?].to_string()))
            }
            Value::Range(r) => {
                let i = seq_index(idx, r.len(), "range")?;
                Ok(Value::Int(r.get(i).unwrap_or_default()))
            }
            Value::CarrierSet(cs) => {
                Ok(Value::Int(cs.ids()[seq_index(idx, cs.len(), "carrier set")?].into()))
            }
            Value::Dict(d) => {
                let key = Key::try_from(idx)?;
                d.get(&key).cloned().ok_or_else(|| {
                    Diagnostic::type_error(format!("key {} is not in the dict", idx.repr()))
                })
            }
            other => Err(Diagnostic::type_error(format!(
                "`{}` value is not subscriptable",
                other.type_name()
            ))),
        }
    }

    /// `target[lo:hi]` with Python clamping; negative bounds count from the end.
    pub fn slice(&self, lo: Option<&Value>, hi: Option<&Value>) -> VResult<Value> {
        if !matches!(self, Value::List(_) | Value::Str(_) | Value::Range(_)) {
            return Err(not_sliceable(self));
        }
        let len = self.len()?;
        let bound = |v: Option<&Value>, default: usize| -> VResult<usize> {
            match v {
                None | Some(Value::None) => Ok(default),
                Some(v) => {
                    let n = v.as_int("slice bound")?;
                    let len = i64::try_from(len).unwrap_or(i64::MAX);
                    let n = if n < 0 { n.saturating_add(len) } else { n };
                    Ok(n.clamp(0, len) as usize)
                }
            }
        };
        let lo = bound(lo, 0)?;
        let hi = bound(hi, len)?.max(lo);
        Ok(match self {
            Value::List(v) => Value::List(v[lo..hi].to_vec()),
            Value::Str(s) => Value::Str(s.chars().skip(lo).take(hi - lo).collect()),
            Value::Range(r) => {
                checked_len(hi - lo)?;
                Value::List((lo..hi).map(|i| Value::Int(r.nth(i))).collect())
            }
            other => return Err(not_sliceable(other)),
        })
    }

    /// `self[idx] = v` in place.
    pub fn set_index(&mut self, idx: &Value, v: Value) -> VResult<()> {
        match self {
            Value::List(items) => {
                let i = seq_index(idx, items.len(), "list")?;
                items[i] = v;
                Ok(())
            }
            Value::Dict(d) => {
                d.insert(Key::try_from(idx)?, v);
                Ok(())
            }
            other => Err(Diagnostic::type_error(format!(
                "`{}` value does not support item assignment",
                other.type_name()
            ))),
        }
    }

    pub fn contains(&self, item: &Value) -> VResult<bool> {
        Ok(match (self, item) {
            (Value::List(v), _) => v.contains(item),
            (Value::Set(s), _) => Key::try_from(item).is_ok_and(|k| s.contains(&k)),
            (Value::Dict(d), _) => Key::try_from(item).is_ok_and(|k| d.contains_key(&k)),
            (Value::Range(r), Value::Int(n)) => r.contains(*n),
            (Value::Range(_), _) => false,
            (Value::Str(s), Value::Str(sub)) => s.contains(sub.as_str()),
            (Value::CarrierSet(cs), Value::Int(n)) => u32::try_from(*n).is_ok_and(|id| cs.contains(id)),
            (Value::CarrierSet(cs), Value::CarrierSet(sub)) => sub.ids().iter().all(|&id| cs.contains(id)),
            (container, item) => {
                return Err(Diagnostic::type_error(format!(
                    "cannot test membership of `{}` in `{}`",
                    item.type_name(),
                    container.type_name()
                )))
            }
        })
    }

    // ── Operators ─────────────────────────────────────────────────────────────

    pub fn unary(op: UnaryOp, v: &Value) -> VResult<Value> {
        match (op, v) {
            (UnaryOp::Not, v) => Ok(Value::Bool(!v.truthy())),
            (UnaryOp::Neg, Value::Int(n)) => n.checked_neg().map(Value::Int).ok_or_else(overflow),
            (UnaryOp::Pos, Value::Int(n)) => Ok(Value::Int(*n)),
            (op, v) => Err(Diagnostic::type_error(format!(
                "bad operand type for unary `{}`: `{}`",
                op.symbol().trim(),
                v.type_name()
            ))),
        }
    }

    /// Evaluate a non-short-circuiting binary operator.
    pub fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> VResult<Value> {
        let result = match (op, lhs, rhs) {
            (BinOp::Eq, a, b) => Value::Bool(a == b),
            (BinOp::Ne, a, b) => Value::Bool(a != b),
            (BinOp::In, a, b) => Value::Bool(b.contains(a)?),
            (BinOp::NotIn, a, b) => Value::Bool(!b.contains(a)?),
            (BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge, a, b) => {
                let ord = compare(a, b).ok_or_else(|| mismatch(op, a, b))?;
                Value::Bool(match op {
                    BinOp::Lt => ord.is_lt(),
                    BinOp::Le => ord.is_le(),
                    BinOp::Gt => ord.is_gt(),
                    _ => ord.is_ge(),
                })
            }

            (BinOp::Add, Value::Int(a), Value::Int(b)) => {
                Value::Int(a.checked_add(*b).ok_or_else(overflow)?)
            }
            (BinOp::Add, Value::Str(a), Value::Str(b)) => Value::Str(format!("{a}{b}")),
            (BinOp::Add, Value::List(a), Value::List(b)) => {
                Value::List(a.iter().chain(b).cloned().collect())
            }
            (BinOp::Add, Value::Needle(n), Value::Int(d))
            | (BinOp::Add, Value::Int(d), Value::Needle(n)) => Value::Needle(shift(n, *d)?),

            (BinOp::Sub, Value::Int(a), Value::Int(b)) => {
                Value::Int(a.checked_sub(*b).ok_or_else(overflow)?)
            }
            (BinOp::Sub, Value::Needle(n), Value::Int(d)) => {
                Value::Needle(shift(n, d.checked_neg().ok_or_else(overflow)?)?)
            }
            (BinOp::Sub, Value::Needle(a), Value::Needle(b)) => {
                let a = i64::try_from(a.index).map_err(|_| overflow())?;
                let b = i64::try_from(b.index).map_err(|_| overflow())?;
                Value::Int(a.checked_sub(b).ok_or_else(overflow)?)
            }

            (BinOp::Mul, Value::Int(a), Value::Int(b)) => {
                Value::Int(a.checked_mul(*b).ok_or_else(overflow)?)
            }
            (BinOp::Mul, Value::Str(s), Value::Int(n))
            | (BinOp::Mul, Value::Int(n), Value::Str(s)) => {
                let total = repeated_len(s.len(), *n)?;
                Value::Str(s.repeat(total.checked_div(s.len()).unwrap_or(0)))
            }
            (BinOp::Mul, Value::List(v), Value::Int(n))
            | (BinOp::Mul, Value::Int(n), Value::List(v)) => {
                let total = repeated_len(v.len(), *n)?;
                Value::List(v.iter().cloned().cycle().take(total).collect())
            }

            (BinOp::Div | BinOp::Rem, Value::Int(_), Value::Int(0)) => {
                return Err(Diagnostic::type_error("division by zero"))
            }
            (BinOp::Div, Value::Int(a), Value::Int(b)) => {
                Value::Int(floor_div(*a, *b).ok_or_else(overflow)?)
            }
            (BinOp::Rem, Value::Int(a), Value::Int(b)) => {
                Value::Int(floor_rem(*a, *b).ok_or_else(overflow)?)
            }

            (BinOp::Pow, Value::Int(_), Value::Int(e)) if *e < 0 => {
                return Err(Diagnostic::type_error("negative exponents are not supported"))
            }
            (BinOp::Pow, Value::Int(a), Value::Int(e)) => {
                let e = u32::try_from(*e).map_err(|_| overflow())?;
                Value::Int(a.checked_pow(e).ok_or_else(overflow)?)
            }

            (op, a, b) => return Err(mismatch(op, a, b)),
        };
        Ok(result)
    }
}

pub(crate) fn overflow() -> Diagnostic {
    Diagnostic::type_error("integer overflow")
}

fn not_sliceable(v: &Value) -> Diagnostic {
    Diagnostic::type_error(format!("`{}` value cannot be sliced", v.type_name()))
}

fn mismatch(op: BinOp, a: &Value, b: &Value) -> Diagnostic {
    Diagnostic::type_error(format!(
        "unsupported operand types for `{}`: `{}` and `{}`",
        op.symbol(),
        a.type_name(),
        b.type_name()
    ))
}

fn shift(n: &Needle, delta: i64) -> VResult<Needle> {
    n.offset(delta)
        .ok_or_else(|| {
            let index = i64::try_from(n.index).unwrap_or(i64::MAX).saturating_add(delta);
            MachineError::NegativeNeedle(index).into()
        })
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if (a % b != 0) && ((a < 0) != (b < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

/// Remainder with the sign of the divisor.
fn floor_rem(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Needle(a), Value::Needle(b)) if a.bed == b.bed => Some(a.index.cmp(&b.index)),
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare(x, y)? {
                    std::cmp::Ordering::Equal => continue,
                    ord => return Some(ord),
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        _ => None,
    }
}

/// Resolve a (possibly negative) index against a sequence of length `len`.
fn seq_index(idx: &Value, len: usize, what: &str) -> VResult<usize> {
    let i = idx.as_int(&format!("{what} index"))?;
    let resolved = if i < 0 { i128::from(i) + len as i128 } else { i128::from(i) };
    usize::try_from(resolved)
        .ok()
        .filter(|&r| r < len)
        .ok_or_else(|| {
            Diagnostic::type_error(format!("{what} index {i} is out of range for length {len}"))
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(op: BinOp, a: Value, b: Value) -> VResult<Value> {
        Value::binary(op, &a, &b)
    }

    #[test]
    fn floor_division_and_remainder() {
        assert_eq!(bin(BinOp::Div, Value::Int(7), Value::Int(2)).unwrap(), Value::Int(3));
        assert_eq!(bin(BinOp::Div, Value::Int(-7), Value::Int(2)).unwrap(), Value::Int(-4));
        assert_eq!(bin(BinOp::Rem, Value::Int(-7), Value::Int(3)).unwrap(), Value::Int(2));
        assert_eq!(bin(BinOp::Rem, Value::Int(7), Value::Int(-3)).unwrap(), Value::Int(-2));
        let e = bin(BinOp::Div, Value::Int(1), Value::Int(0)).unwrap_err();
        assert_eq!(e.kind, ErrorKind::Type);
    }

    #[test]
    fn needle_arithmetic() {
        let f5 = Value::Needle(Needle::front(5));
        assert_eq!(bin(BinOp::Add, f5.clone(), Value::Int(2)).unwrap(), Value::Needle(Needle::front(7)));
        assert_eq!(bin(BinOp::Sub, f5.clone(), Value::Needle(Needle::front(1))).unwrap(), Value::Int(4));
        let e = bin(BinOp::Sub, f5, Value::Int(6)).unwrap_err();
        assert_eq!(e.kind, ErrorKind::NeedleBounds);
    }

    #[test]
    fn mixed_types_are_type_errors() {
        let e = bin(BinOp::Add, Value::Int(1), Value::Str("a".into())).unwrap_err();
        assert_eq!(e.kind, ErrorKind::Type);
        assert!(e.message.contains("`int` and `str`"));
        assert!(bin(BinOp::Lt, Value::Needle(Needle::front(0)), Value::Needle(Needle::back(0))).is_err());
        assert_eq!(bin(BinOp::Eq, Value::Int(1), Value::Bool(true)).unwrap(), Value::Bool(false));
    }

    #[test]
    fn overflow_is_reported() {
        assert!(bin(BinOp::Add, Value::Int(i64::MAX), Value::Int(1)).is_err());
        assert!(bin(BinOp::Pow, Value::Int(2), Value::Int(64)).is_err());
        assert_eq!(bin(BinOp::Pow, Value::Int(2), Value::Int(10)).unwrap(), Value::Int(1024));
    }

    #[test]
    fn huge_repetition_is_an_error() {
        let huge = Value::Int(1 << 62);
        for seq in [Value::Str("ab".into()), Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])] {
            let e = bin(BinOp::Mul, seq.clone(), huge.clone()).unwrap_err();
            assert_eq!(e.kind, ErrorKind::Type);
            assert!(e.message.contains("too long"), "{}", e.message);
            assert!(bin(BinOp::Mul, huge.clone(), seq.clone()).is_err());
            assert!(bin(BinOp::Mul, seq, Value::Int(MAX_SEQUENCE_LEN as i64)).is_err());
        }
        assert_eq!(bin(BinOp::Mul, Value::Str(String::new()), huge.clone()).unwrap(), Value::Str(String::new()));
        assert_eq!(bin(BinOp::Mul, Value::Int(-3), Value::Str("ab".into())).unwrap(), Value::Str(String::new()));
        assert_eq!(bin(BinOp::Mul, Value::Str("ab".into()), Value::Int(2)).unwrap(), Value::Str("abab".into()));
    }

    #[test]
    fn needle_difference_does_not_wrap() {
        let far = Value::Needle(Needle::front(1 << 63));
        let e = bin(BinOp::Sub, Value::Needle(Needle::front(0)), far.clone()).unwrap_err();
        assert_eq!(e.kind, ErrorKind::Type);
        assert!(far.attr("index").is_err());
        let e = bin(BinOp::Sub, Value::Needle(Needle::front(1)), Value::Int(i64::MAX)).unwrap_err();
        assert_eq!(e.kind, ErrorKind::NeedleBounds);
        assert!(bin(BinOp::Add, Value::Needle(Needle::back(usize::MAX)), Value::Int(1)).is_err());
    }

    #[test]
    fn full_width_ranges() {
        let r = Range { start: -i64::MAX, stop: i64::MAX, step: 1 };
        assert!(r.contains(i64::MAX - 1));
        assert!(!r.contains(i64::MAX));
        assert_eq!(r.get(0), Some(-i64::MAX));
        assert_eq!(r.len(), usize::MAX - 1);
        let r = Range { start: i64::MAX, stop: i64::MIN, step: -3 };
        assert!(r.contains(i64::MAX - 3) && !r.contains(i64::MIN + 1));
        assert_eq!(r.iter().nth(1), Some(i64::MAX - 3));
        let e = Value::Range(r).iterate().unwrap_err();
        assert!(e.message.contains("too long"), "{}", e.message);
        assert!(Value::Range(r).index(&Value::Int(-1)).is_ok());
        assert!(Value::Range(r).slice(None, None).is_err());
        assert_eq!(
            Value::Range(r).slice(None, Some(&Value::Int(2))).unwrap(),
            Value::List(vec![Value::Int(i64::MAX), Value::Int(i64::MAX - 3)])
        );
    }

    #[test]
    fn truthiness() {
        assert!(!Value::None.truthy());
        assert!(!Value::Int(0).truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(!Value::List(vec![]).truthy());
        assert!(Value::Range(Range::inclusive(3, 3)).truthy());
        assert!(!Value::Range(Range { start: 0, stop: 0, step: 1 }).truthy());
        assert!(Value::Needle(Needle::front(0)).truthy());
    }

    #[test]
    fn ranges() {
        let r = Range::inclusive(5, 2);
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![5, 4, 3, 2]);
        assert!(r.contains(3) && !r.contains(1));
        let r = Range { start: 0, stop: 10, step: 3 };
        assert_eq!(r.len(), 4);
        assert_eq!(r.get(3), Some(9));
        assert!(r.contains(6) && !r.contains(7));
    }

    #[test]
    fn indexing_and_slicing() {
        let v = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(v.index(&Value::Int(-1)).unwrap(), Value::Int(3));
        assert!(v.index(&Value::Int(3)).is_err());
        assert_eq!(
            v.slice(Some(&Value::Int(1)), None).unwrap(),
            Value::List(vec![Value::Int(2), Value::Int(3)])
        );
        assert_eq!(v.slice(Some(&Value::Int(5)), None).unwrap(), Value::List(vec![]));
        let s = Value::Str("knit".into());
        assert_eq!(s.slice(None, Some(&Value::Int(-1))).unwrap(), Value::Str("kni".into()));
    }

    #[test]
    fn unhashable_keys_rejected() {
        let mut d = Value::Dict(IndexMap::new());
        assert!(d.set_index(&Value::List(vec![]), Value::None).is_err());
        d.set_index(&Value::Needle(Needle::back(2)), Value::Int(1)).unwrap();
        assert_eq!(d.index(&Value::Needle(Needle::back(2))).unwrap(), Value::Int(1));
    }

    #[test]
    fn attributes() {
        let n = Value::Needle(Needle::back(4));
        assert_eq!(n.attr("index").unwrap(), Value::Int(4));
        assert_eq!(n.attr("is_back").unwrap(), Value::Bool(true));
        assert_eq!(n.attr("opposite").unwrap(), Value::Needle(Needle::front(4)));
        let cs = Value::CarrierSet(CarrierSet::new(vec![1, 3]).unwrap());
        assert_eq!(cs.attr("count").unwrap(), Value::Int(2));
        assert_eq!(Value::Int(1).attr("x").unwrap_err().kind, ErrorKind::Type);
    }

    #[test]
    fn membership() {
        let cs = Value::CarrierSet(CarrierSet::new(vec![1, 3]).unwrap());
        assert!(cs.contains(&Value::Int(3)).unwrap());
        assert!(!cs.contains(&Value::Int(2)).unwrap());
        let s = Value::Str("stockinette".into());
        assert!(s.contains(&Value::Str("net".into())).unwrap());
        assert!(Value::Int(3).contains(&Value::Int(3)).is_err());
    }

    #[test]
    fn repr_forms() {
        let v = Value::List(vec![
            Value::Str("a".into()),
            Value::CarrierSet(CarrierSet::single(2).unwrap()),
            Value::Needle(Needle::front(1)),
            Value::None,
        ]);
        assert_eq!(v.to_string(), r#"["a", c2, f1, None]"#);
        assert_eq!(Value::Str("a".into()).to_string(), "a");
    }
}
