//! The `table` library

use crate::interpreter::{Interpreter, Value};
use crate::stdlib::{arg, arg_error, check_integer, check_table, opt_integer, opt_string, Builtin};
use crate::utils::RuntimeError;

type Result = std::result::Result<Vec<Value>, RuntimeError>;

pub(super) const FUNCTIONS: &[(&str, Builtin)] = &[
    ("concat", concat),
    ("insert", insert),
    ("remove", remove),
    ("sort", sort),
    ("unpack", super::globals::unpack),
];

/// `insert(t, value)` appends; `insert(t, pos, value)` shifts up
fn insert(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let table = check_table(interpreter, &args, 0, "insert")?;
    let length = table.borrow().len() as i64;
    match args.len() {
        2 => {
            let value = arg(&args, 1);
            interpreter.raw_set(&table, Value::Number((length + 1) as f64), value)?;
        }
        3 => {
            let position = check_integer(interpreter, &args, 1, "insert")?;
            if position < 1 || position > length + 1 {
                return Err(arg_error(interpreter, 1, "insert", "position out of bounds"));
            }
            table.borrow_mut().insert(position as usize - 1, arg(&args, 2));
        }
        _ => return Err(interpreter.error("wrong number of arguments to 'insert'")),
    }
    Ok(vec![])
}

/// `remove(t [, pos])` removes and returns an element, the last by default
fn remove(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let table = check_table(interpreter, &args, 0, "remove")?;
    let length = table.borrow().len() as i64;
    let position = opt_integer(interpreter, &args, 1, "remove", length)?;
    if length == 0 && args.len() < 2 {
        return Ok(vec![Value::Nil]);
    }
    if position < 1 || position > length + 1 {
        return Err(arg_error(interpreter, 1, "remove", "position out of bounds"));
    }
    let removed = table.borrow_mut().remove(position as usize - 1);
    Ok(vec![removed])
}

fn concat(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let table = check_table(interpreter, &args, 0, "concat")?;
    let separator = opt_string(interpreter, &args, 1, "concat", "")?;
    let length = table.borrow().len() as i64;
    let first = opt_integer(interpreter, &args, 2, "concat", 1)?;
    let last = opt_integer(interpreter, &args, 3, "concat", length)?;

    let mut parts = Vec::new();
    for i in first..=last {
        let value = table.borrow().get(&Value::Number(i as f64));
        match value {
            Value::String(s) => parts.push(s.to_string()),
            Value::Number(_) => parts.push(value.to_string()),
            other => {
                return Err(interpreter.error(format!(
                    "invalid value (at index {}) in table for 'concat': {}",
                    i,
                    other.type_name()
                )))
            }
        }
    }
    Ok(vec![Value::string(parts.join(&*separator))])
}

/// `sort(t [, comp])`: stable merge sort of the array part
fn sort(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let table = check_table(interpreter, &args, 0, "sort")?;
    let comparator = match arg(&args, 1) {
        Value::Nil => None,
        f @ Value::Function(_) => Some(f),
        other => {
            return Err(arg_error(
                interpreter,
                1,
                "sort",
                format!("function expected, got {}", other.type_name()),
            ))
        }
    };

    let values = table.borrow().array().to_vec();
    let sorted = merge_sort(values, &mut |a: &Value, b: &Value| match &comparator {
        Some(f) => {
            let result = interpreter.call(f, vec![a.clone(), b.clone()])?;
            Ok(result.first().is_some_and(Value::is_truthy))
        }
        None => interpreter.less_than(a, b),
    })?;

    let mut table = table.borrow_mut();
    for (slot, value) in table.array_mut().iter_mut().zip(sorted) {
        *slot = value;
    }
    Ok(vec![])
}

/// Bottom-up merge sort with a fallible `less` predicate
fn merge_sort<F>(mut values: Vec<Value>, less: &mut F) -> std::result::Result<Vec<Value>, RuntimeError>
where
    F: FnMut(&Value, &Value) -> std::result::Result<bool, RuntimeError>,
{
    let len = values.len();
    let mut width = 1;
    while width < len {
        let mut merged = Vec::with_capacity(len);
        let mut start = 0;
        while start < len {
            let mid = (start + width).min(len);
            let end = (start + 2 * width).min(len);
            let (mut i, mut j) = (start, mid);
            while i < mid && j < end {
                // take from the right only when strictly smaller
                if less(&values[j], &values[i])? {
                    merged.push(values[j].clone());
                    j += 1;
                } else {
                    merged.push(values[i].clone());
                    i += 1;
                }
            }
            merged.extend_from_slice(&values[i..mid]);
            merged.extend_from_slice(&values[j..end]);
            start = end;
        }
        values = merged;
        width *= 2;
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eval(source: &str) -> Vec<String> {
        let mut interpreter = Interpreter::new();
        interpreter
            .run(source)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect()
    }

    fn eval_err(source: &str) -> String {
        let mut interpreter = Interpreter::new();
        interpreter.run(source).unwrap_err().to_string()
    }

    #[test]
    fn test_insert_and_remove() {
        assert_eq!(
            eval(
                "local t = {1, 2, 3}
                 table.insert(t, 4)
                 table.insert(t, 1, 0)
                 local last = table.remove(t)
                 local first = table.remove(t, 1)
                 return table.concat(t, ','), last, first, table.remove({})"
            ),
            vec!["1,2,3", "4", "0", "nil"]
        );
        assert_eq!(
            eval_err("table.insert({}, 5, 1)"),
            "bad argument #2 to 'insert' (position out of bounds)"
        );
    }

    #[test]
    fn test_concat() {
        assert_eq!(eval("return table.concat({1, 'a', 2.5}, '-')"), vec!["1-a-2.5"]);
        assert_eq!(eval("return table.concat({'a', 'b', 'c'}, '', 2, 3)"), vec!["bc"]);
        assert_eq!(
            eval_err("table.concat({1, {}, 3})"),
            "invalid value (at index 2) in table for 'concat': table"
        );
    }

    #[test]
    fn test_sort() {
        assert_eq!(
            eval("local t = {5, 2, 8, 1, 9, 3} table.sort(t) return table.concat(t, ' ')"),
            vec!["1 2 3 5 8 9"]
        );
        assert_eq!(
            eval("local t = {'pear', 'apple', 'fig'} table.sort(t, function(a, b) return a > b end) return table.concat(t, ' ')"),
            vec!["pear fig apple"]
        );
        assert_eq!(eval_err("table.sort({1, 'x'})"), "attempt to compare string with number");
    }

    #[test]
    fn test_sort_is_stable() {
        assert_eq!(
            eval(
                "local t = {{k = 1, v = 'a'}, {k = 0, v = 'b'}, {k = 1, v = 'c'}, {k = 0, v = 'd'}}
                 table.sort(t, function(x, y) return x.k < y.k end)
                 return t[1].v .. t[2].v .. t[3].v .. t[4].v"
            ),
            vec!["bdac"]
        );
    }

    #[test]
    fn test_unpack_alias() {
        assert_eq!(eval("return table.unpack({'a', 'b'})"), vec!["a", "b"]);
    }
}
