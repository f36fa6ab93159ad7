//! Built-in functions available in every program.
//!
//! Each function receives already-evaluated positional arguments.  `print`
//! is listed here but executed by the interpreter, which owns the output
//! buffer.

use super::ast::BinOp;
use super::value::{self, Range, Value};
use crate::diag::Diagnostic;

/// Names bound in the root scope as [`Value::Builtin`].
pub const BUILTINS: &[&str] = &[
    "print", "len", "range", "str", "int", "bool", "list", "abs", "min", "max", "type",
];

type BResult = Result<Value, Diagnostic>;

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), Diagnostic> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(Diagnostic::arity(format!(
            "{name}() takes {expected} argument{}, got {}",
            if max == 1 { "" } else { "s" },
            args.len()
        )));
    }
    Ok(())
}

fn get_int(args: &[Value], i: usize, name: &str) -> Result<i64, Diagnostic> {
    args[i].as_int(&format!("argument {} of {name}()", i + 1))
}

/// Call built-in `name` with `args`.
///
/// Returns `None` if `name` is not a built-in handled here.
pub fn call_builtin(name: &str, args: Vec<Value>) -> Option<BResult> {
    Some(match name {
        "len" => builtin_len(args),
        "range" => builtin_range(args),
        "str" => arity(name, &args, 1, 1).map(|_| Value::Str(args[0].to_string())),
        "int" => builtin_int(args),
        "bool" => arity(name, &args, 1, 1).map(|_| Value::Bool(args[0].truthy())),
        "list" => arity(name, &args, 1, 1).and_then(|_| args[0].iterate().map(Value::List)),
        "abs" => arity(name, &args, 1, 1).and_then(|_| {
            let n = get_int(&args, 0, name)?;
            n.checked_abs()
                .map(Value::Int)
                .ok_or_else(|| Diagnostic::type_error("integer overflow"))
        }),
        "min" => builtin_extreme(name, args, true),
        "max" => builtin_extreme(name, args, false),
        "type" => arity(name, &args, 1, 1).map(|_| Value::Str(args[0].type_name().to_owned())),
        _ => return None,
    })
}

fn builtin_len(args: Vec<Value>) -> BResult {
    arity("len", &args, 1, 1)?;
    i64::try_from(args[0].len()?).map(Value::Int).map_err(|_| value::overflow())
}

/// `range(stop)`, `range(start, stop)`, `range(start, stop, step)`.
fn builtin_range(args: Vec<Value>) -> BResult {
    arity("range", &args, 1, 3)?;
    let ints = (0..args.len())
        .map(|i| get_int(&args, i, "range"))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match *ints.as_slice() {
        [] => (0, 0, 1),
        [stop] => (0, stop, 1),
        [start, stop] => (start, stop, 1),
        [start, stop, step, ..] => (start, stop, step),
    };
    if step == 0 {
        return Err(Diagnostic::type_error("range() step must not be zero"));
    }
    Ok(Value::Range(Range { start, stop, step }))
}

fn builtin_int(args: Vec<Value>) -> BResult {
    arity("int", &args, 1, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Needle(n) => i64::try_from(n.index).map(Value::Int).map_err(|_| value::overflow()),
        Value::Str(s) => s.trim().parse().map(Value::Int).map_err(|_| {
            Diagnostic::type_error(format!("invalid literal for int(): {:?}", s))
        }),
        other => Err(Diagnostic::type_error(format!(
            "int() cannot convert `{}`",
            other.type_name()
        ))),
    }
}

/// `min`/`max` over either one iterable or two or more arguments.
fn builtin_extreme(name: &str, args: Vec<Value>, want_min: bool) -> BResult {
    if args.is_empty() {
        return Err(Diagnostic::arity(format!("{name}() expects at least 1 argument, got 0")));
    }
    let items = if args.len() == 1 { args[0].iterate()? } else { args };
    let mut iter = items.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| Diagnostic::type_error(format!("{name}() of an empty sequence")))?;
    let op = if want_min { BinOp::Lt } else { BinOp::Gt };
    for item in iter {
        if Value::binary(op, &item, &best)?.truthy() {
            best = item;
        }
    }
    Ok(best)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::ErrorKind;
    use crate::machine::Needle;

    fn call(name: &str, args: Vec<Value>) -> BResult {
        call_builtin(name, args).expect("known builtin")
    }

    #[test]
    fn unknown_name_is_none() {
        assert!(call_builtin("nope", vec![]).is_none());
        assert!(call_builtin("print", vec![]).is_none());
    }

    #[test]
    fn len_and_type() {
        let v = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(call("len", vec![v]).unwrap(), Value::Int(2));
        assert_eq!(call("type", vec![Value::Needle(Needle::front(0))]).unwrap(), Value::Str("needle".into()));
        assert_eq!(call("len", vec![Value::Int(1)]).unwrap_err().kind, ErrorKind::Type);
    }

    #[test]
    fn range_forms() {
        assert_eq!(call("range", vec![Value::Int(3)]).unwrap(), Value::Range(Range { start: 0, stop: 3, step: 1 }));
        let r = call("range", vec![Value::Int(10), Value::Int(0), Value::Int(-2)]).unwrap();
        assert_eq!(r.iterate().unwrap().len(), 5);
        assert!(call("range", vec![Value::Int(0), Value::Int(1), Value::Int(0)]).is_err());
        assert_eq!(call("range", vec![]).unwrap_err().kind, ErrorKind::Arity);
    }

    #[test]
    fn huge_ranges_are_not_materialised() {
        let r = call("range", vec![Value::Int(i64::MIN), Value::Int(i64::MAX)]).unwrap();
        assert_eq!(call("len", vec![r.clone()]).unwrap_err().kind, ErrorKind::Type);
        assert_eq!(call("list", vec![r]).unwrap_err().kind, ErrorKind::Type);
    }

    #[test]
    fn conversions() {
        assert_eq!(call("int", vec![Value::Str(" 42 ".into())]).unwrap(), Value::Int(42));
        assert!(call("int", vec![Value::Str("x".into())]).is_err());
        assert_eq!(call("str", vec![Value::Needle(Needle::back(3))]).unwrap(), Value::Str("b3".into()));
        assert_eq!(call("bool", vec![Value::List(vec![])]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn min_max() {
        let xs = Value::List(vec![Value::Int(4), Value::Int(-1), Value::Int(9)]);
        assert_eq!(call("min", vec![xs.clone()]).unwrap(), Value::Int(-1));
        assert_eq!(call("max", vec![xs]).unwrap(), Value::Int(9));
        assert_eq!(call("max", vec![Value::Int(2), Value::Int(7)]).unwrap(), Value::Int(7));
        assert!(call("min", vec![Value::List(vec![])]).is_err());
    }
}
