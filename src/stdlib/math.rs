//! The `math` library

use crate::interpreter::{Interpreter, Value};
use crate::stdlib::{check_number, Builtin};
use crate::utils::RuntimeError;

type Result = std::result::Result<Vec<Value>, RuntimeError>;

pub(super) const FUNCTIONS: &[(&str, Builtin)] = &[
    ("abs", abs),
    ("ceil", ceil),
    ("floor", floor),
    ("fmod", fmod),
    ("max", max),
    ("min", min),
    ("sqrt", sqrt),
];

fn unary(interpreter: &Interpreter, args: &[Value], name: &str, f: fn(f64) -> f64) -> Result {
    let n = check_number(interpreter, args, 0, name)?;
    Ok(vec![Value::Number(f(n))])
}

fn abs(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    unary(interpreter, &args, "abs", f64::abs)
}

fn ceil(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    unary(interpreter, &args, "ceil", f64::ceil)
}

fn floor(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    unary(interpreter, &args, "floor", f64::floor)
}

fn sqrt(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    unary(interpreter, &args, "sqrt", f64::sqrt)
}

/// Remainder truncated towards zero, unlike the floored `%` operator
fn fmod(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    let a = check_number(interpreter, &args, 0, "fmod")?;
    let b = check_number(interpreter, &args, 1, "fmod")?;
    Ok(vec![Value::Number(a % b)])
}

fn extreme(interpreter: &Interpreter, args: &[Value], name: &str, pick: fn(f64, f64) -> bool) -> Result {
    let mut best = check_number(interpreter, args, 0, name)?;
    for index in 1..args.len() {
        let n = check_number(interpreter, args, index, name)?;
        if pick(n, best) {
            best = n;
        }
    }
    Ok(vec![Value::Number(best)])
}

fn max(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    extreme(interpreter, &args, "max", |n, best| n > best)
}

fn min(interpreter: &mut Interpreter, args: Vec<Value>) -> Result {
    extreme(interpreter, &args, "min", |n, best| n < best)
}
