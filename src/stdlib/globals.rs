//! Global functions

use log::debug;

use crate::frontend::lexer::parse_number;
use crate::interpreter::{Function, Interpreter, Value};
use crate::stdlib::{arg, arg_error, check_any, check_integer, check_table, opt_integer, Builtin};
use crate::utils::RuntimeError;

type Result = std::result::Result<Vec<Value>, RuntimeError>;

pub(super) const FUNCTIONS: &[(&str, Builtin)] = &[
    ("print", print),
    ("type", type_of),
    ("tostring", tostring),
    ("tonumber", tonumber),
    ("pairs", pairs),
    ("ipairs", ipairs),
    ("next", next),
    ("select", select),
    ("assert", assert),
    ("error", error),
    ("pcall", pcall),
    ("rawget", rawget),
    ("rawset", rawset),
    ("rawequal", rawequal),
    ("rawlen", rawlen),
    ("getmetatable", getmetatable),
    ("setmetatable", setmetatable),
    ("unpack", unpack),
    ("require", require),
];

fn print(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let mut parts = Vec::with_capacity(args.len());
    for value in &args {
        parts.push(interpreter.display(value)?);
    }
    let mut line = parts.join(" ");
    line.push('\n');
    interpreter.write_output(&line)?;
    Ok(vec![])
}

fn type_of(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let value = check_any(interpreter, &args, 0, "type")?;
    Ok(vec![Value::string(value.type_name())])
}

fn tostring(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let value = check_any(interpreter, &args, 0, "tostring")?;
    Ok(vec![Value::string(interpreter.tostring(&value)?)])
}

fn tonumber(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let value = check_any(interpreter, &args, 0, "tonumber")?;
    let base = arg(&args, 1);
    if base.is_nil() {
        let number = match &value {
            Value::Number(n) => Some(*n),
            Value::String(s) => parse_number(s),
            _ => None,
        };
        return Ok(vec![number.map(Value::Number).unwrap_or_default()]);
    }

    let base = check_integer(interpreter, &args, 1, "tonumber")?;
    if !(2..=36).contains(&base) {
        return Err(arg_error(interpreter, 1, "tonumber", "base out of range"));
    }
    let text = match &value {
        Value::String(s) => s.to_string(),
        Value::Number(_) => value.to_string(),
        other => {
            return Err(arg_error(
                interpreter,
                0,
                "tonumber",
                format!("string expected, got {}", other.type_name()),
            ))
        }
    };
    Ok(vec![parse_in_base(&text, base as u32).map(Value::Number).unwrap_or_default()])
}

fn parse_in_base(text: &str, base: u32) -> Option<f64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    if digits.is_empty() {
        return None;
    }
    let mut value = 0.0;
    for c in digits.chars() {
        value = value * base as f64 + c.to_digit(base)? as f64;
    }
    Some(if negative { -value } else { value })
}

fn next_function() -> Value {
    Value::function(Function::native("next", next))
}

fn pairs(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let table = check_table(interpreter, &args, 0, "pairs")?;
    Ok(vec![next_function(), Value::Table(table), Value::Nil])
}

fn ipairs(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let table = check_table(interpreter, &args, 0, "ipairs")?;
    let step = Function::native("ipairs_iterator", |interpreter: &mut Interpreter, args: Vec<Value>| {
        let index = arg(&args, 1).as_number().unwrap_or(0.0) + 1.0;
        let value = interpreter.index(&arg(&args, 0), &Value::Number(index))?;
        if value.is_nil() {
            return Ok(vec![Value::Nil]);
        }
        Ok(vec![Value::Number(index), value])
    });
    Ok(vec![Value::function(step), Value::Table(table), Value::Number(0.0)])
}

fn next(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let table = check_table(interpreter, &args, 0, "next")?;
    let entry = table
        .borrow()
        .next(&arg(&args, 1))
        .map_err(|err| interpreter.error(err.to_string()))?;
    Ok(match entry {
        Some((key, value)) => vec![key, value],
        None => vec![Value::Nil],
    })
}

fn select(interpreter: &mut Interpreter, mut args: Vec<Value>) -> Result {
    if let Some(Value::String(s)) = args.first() {
        if &**s == "#" {
            return Ok(vec![Value::Number((args.len() - 1) as f64)]);
        }
    }
    let n = check_integer(interpreter, &args, 0, "select")?;
    let count = args.len() as i64 - 1;
    let start = if n < 0 { count + n } else { n - 1 };
    if n == 0 || start < 0 {
        return Err(arg_error(interpreter, 0, "select", "index out of range"));
    }
    let start = (start as usize + 1).min(args.len());
    Ok(args.split_off(start))
}

fn assert(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let value = check_any(interpreter, &args, 0, "assert")?;
    if value.is_truthy() {
        return Ok(args);
    }
    match args.get(1) {
        Some(message) if !message.is_nil() => Err(raise(interpreter, message.clone())),
        _ => Err(interpreter.error("assertion failed!")),
    }
}

fn error(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    Err(raise(interpreter, arg(&args, 0)))
}

/// An error carrying a script value
fn raise(interpreter: &Interpreter, value: Value) -> RuntimeError {
    let reason = match &value {
        Value::String(_) | Value::Number(_) => value.to_string(),
        other => format!("(error object is a {} value)", other.type_name()),
    };
    let mut err = interpreter.error(reason);
    err.value = Some(value);
    err
}

fn pcall(interpreter: &mut Interpreter, mut args: Vec<Value>) -> Result {
    let function = check_any(interpreter, &args, 0, "pcall")?;
    let rest = args.split_off(1);
    match interpreter.call(&function, rest) {
        Ok(mut values) => {
            values.insert(0, Value::Boolean(true));
            Ok(values)
        }
        Err(err) => {
            debug!("pcall caught: {}", err.reason);
            Ok(vec![Value::Boolean(false), err.to_value()])
        }
    }
}

fn rawget(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let table = check_table(interpreter, &args, 0, "rawget")?;
    let value = table.borrow().get(&arg(&args, 1));
    Ok(vec![value])
}

fn rawset(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let table = check_table(interpreter, &args, 0, "rawset")?;
    interpreter.raw_set(&table, arg(&args, 1), arg(&args, 2))?;
    Ok(vec![Value::Table(table)])
}

fn rawequal(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let a = check_any(interpreter, &args, 0, "rawequal")?;
    let b = check_any(interpreter, &args, 1, "rawequal")?;
    Ok(vec![Value::Boolean(a.raw_equals(&b))])
}

fn rawlen(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let length = match args.first() {
        Some(Value::Table(t)) => t.borrow().len(),
        Some(Value::String(s)) => s.chars().count(),
        _ => return Err(arg_error(interpreter, 0, "rawlen", "table or string expected")),
    };
    Ok(vec![Value::Number(length as f64)])
}

fn getmetatable(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let value = check_any(interpreter, &args, 0, "getmetatable")?;
    let Some(metatable) = interpreter.metatable_of(&value) else {
        return Ok(vec![Value::Nil]);
    };
    let protected = metatable.borrow().get_str("__metatable");
    if !protected.is_nil() {
        return Ok(vec![protected]);
    }
    Ok(vec![Value::Table(metatable)])
}

fn setmetatable(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let table = check_table(interpreter, &args, 0, "setmetatable")?;
    let metatable = match arg(&args, 1) {
        Value::Nil => None,
        Value::Table(t) => Some(t),
        _ => return Err(arg_error(interpreter, 1, "setmetatable", "nil or table expected")),
    };
    let current = table.borrow().metatable();
    if let Some(current) = current {
        if !current.borrow().get_str("__metatable").is_nil() {
            return Err(interpreter.error("cannot change a protected metatable"));
        }
    }
    table.borrow_mut().set_metatable(metatable);
    Ok(vec![Value::Table(table)])
}

/// Most values a single `unpack` may produce
const MAX_UNPACK: i64 = 1_000_000;

/// `unpack(t [, i [, j]])`, shared with `table.unpack`
pub(super) fn unpack(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let table = check_table(interpreter, &args, 0, "unpack")?;
    let length = table.borrow().len() as i64;
    let first = opt_integer(interpreter, &args, 1, "unpack", 1)?;
    let last = opt_integer(interpreter, &args, 2, "unpack", length)?;
    if first > last {
        return Ok(vec![]);
    }
    if last.checked_sub(first).map_or(true, |n| n >= MAX_UNPACK) {
        return Err(interpreter.error("too many results to unpack"));
    }
    let table = table.borrow();
    Ok((first..=last).map(|i| table.get(&Value::Number(i as f64))).collect())
}

fn require(_interpreter: &mut Interpreter, _args: Vec<Value>) -> Result {
    Ok(vec![Value::Nil])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::OutputBuffer;

    fn eval(source: &str) -> Vec<Value> {
        let mut interpreter = Interpreter::new();
        interpreter.run(source).unwrap()
    }

    fn eval_err(source: &str) -> String {
        let mut interpreter = Interpreter::new();
        match interpreter.run(source).unwrap_err() {
            crate::utils::Error::Runtime(err) => err.reason,
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_print_renders_tables() {
        let buffer = OutputBuffer::new();
        let mut interpreter = Interpreter::new().with_output(buffer.clone());
        interpreter.run("print({1, x = 'y'}, true)").unwrap();
        assert_eq!(buffer.contents(), "{\n  [1]: 1\n  [\"x\"]: \"y\"\n} true\n");
    }

    #[test]
    fn test_type_and_tostring() {
        let values = eval("return type(nil), type({}), type(print), tostring(12), tostring(nil)");
        let names: Vec<_> = values.iter().map(|v| v.to_string()).collect();
        assert_eq!(names, vec!["nil", "table", "function", "12", "nil"]);
        assert_eq!(eval_err("type()"), "bad argument #1 to 'type' (value expected)");
    }

    #[test]
    fn test_tonumber() {
        let values = eval("return tonumber('0x10'), tonumber(' 12 '), tonumber('z'), tonumber('ff', 16), tonumber('777', 8)");
        assert_eq!(values[0].as_number(), Some(16.0));
        assert_eq!(values[1].as_number(), Some(12.0));
        assert!(values[2].is_nil());
        assert_eq!(values[3].as_number(), Some(255.0));
        assert_eq!(values[4].as_number(), Some(511.0));
    }

    #[test]
    fn test_pairs_and_ipairs() {
        let values = eval(
            "local t = {10, 20, 30, k = 'v'}
             local keys = ''
             for k, v in pairs(t) do keys = keys .. tostring(k) .. '=' .. tostring(v) .. ';' end
             local sum = 0
             for i, v in ipairs({1, 2, nil, 4}) do sum = sum + v end
             return keys, sum",
        );
        assert_eq!(values[0].to_string(), "1=10;2=20;3=30;k=v;");
        assert_eq!(values[1].as_number(), Some(3.0));
    }

    #[test]
    fn test_next_rejects_unknown_key() {
        assert_eq!(eval_err("next({}, 'missing')"), "invalid key to 'next'");
    }

    #[test]
    fn test_select() {
        let values = eval("return select('#', 1, 2, 3), select(2, 'a', 'b', 'c'), select(-1, 'x', 'y')");
        assert_eq!(values[0].as_number(), Some(3.0));
        // select(2, ...) is truncated to its first value except in last position
        assert_eq!(values[1].to_string(), "b");
        assert_eq!(values[2].to_string(), "y");
    }

    #[test]
    fn test_pcall_and_error() {
        let values = eval("return pcall(error, 'boom')");
        assert!(!values[0].is_truthy());
        assert_eq!(values[1].to_string(), "boom");

        let values = eval("local ok, e = pcall(error, {code = 7}) return ok, e.code");
        assert_eq!(values[1].as_number(), Some(7.0));

        let values = eval("return pcall(function(a, b) return a + b end, 1, 2)");
        assert!(values[0].is_truthy());
        assert_eq!(values[1].as_number(), Some(3.0));

        let values = eval("return pcall(function() local x = nil return x.y end)");
        assert_eq!(values[1].to_string(), "attempt to index a nil value");
    }

    #[test]
    fn test_assert() {
        assert_eq!(eval_err("assert(false)"), "assertion failed!");
        assert_eq!(eval_err("assert(nil, 'custom')"), "custom");
        assert_eq!(eval("return assert(1, 2)").len(), 2);
    }

    #[test]
    fn test_raw_access_bypasses_metatables() {
        let values = eval(
            "local t = setmetatable({}, {__index = function() return 'meta' end})
             return t.x, rawget(t, 'x'), rawequal(t, t), rawlen({1, 2})",
        );
        assert_eq!(values[0].to_string(), "meta");
        assert!(values[1].is_nil());
        assert!(values[2].is_truthy());
        assert_eq!(values[3].as_number(), Some(2.0));
    }

    #[test]
    fn test_protected_metatable() {
        let values = eval("local t = setmetatable({}, {__metatable = 'locked'}) return getmetatable(t)");
        assert_eq!(values[0].to_string(), "locked");
        assert_eq!(
            eval_err("local t = setmetatable({}, {__metatable = 1}) setmetatable(t, {})"),
            "cannot change a protected metatable"
        );
    }

    #[test]
    fn test_unpack() {
        let values = eval("return unpack({1, 2, 3})");
        assert_eq!(values.len(), 3);
        let values = eval("return unpack({1, 2, 3}, 2)");
        assert_eq!(values[0].as_number(), Some(2.0));
    }

    #[test]
    fn test_unpack_extreme_ranges() {
        assert_eq!(eval_err("unpack({}, -9e18, 9e18)"), "too many results to unpack");
        assert_eq!(eval_err("unpack({}, -1e19, 1e19)"), "too many results to unpack");
        assert_eq!(eval_err("table.unpack({}, 0, 1e6)"), "too many results to unpack");
        assert!(eval("return unpack({}, 9e18, -9e18)").is_empty());
        assert_eq!(eval("return unpack({1, 2}, 2, 3)").len(), 2);
    }

    #[test]
    fn test_parse_in_base() {
        assert_eq!(parse_in_base("-101", 2), Some(-5.0));
        assert_eq!(parse_in_base("Zz", 36), Some(35.0 * 36.0 + 35.0));
        assert_eq!(parse_in_base("9", 8), None);
        assert_eq!(parse_in_base("", 10), None);
    }

    #[test]
    fn test_require_is_a_no_op() {
        assert!(eval("return require('anything')")[0].is_nil());
    }

    #[test]
    fn test_pairs_returns_an_iterator_triple() {
        let values = eval("local f, t, k = pairs({}) return type(f), type(t), k");
        assert_eq!(values[0].to_string(), "function");
        assert_eq!(values[1].to_string(), "table");
        assert!(values[2].is_nil());
    }
}
