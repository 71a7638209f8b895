//! Standard library
//!
//! Host functions exposed to scripts: the global functions plus the
//! `string`, `table`, `math` and `os` tables.

mod globals;
mod math;
mod os;
mod string;
mod table;

use std::rc::Rc;

use log::debug;

use crate::interpreter::{Function, Interpreter, Table, TableRef, Value};
use crate::utils::RuntimeError;

/// Signature shared by every library function
pub type Builtin = fn(&mut Interpreter, Vec<Value>) -> Result<Vec<Value>, RuntimeError>;

/// Install the whole library into `interpreter`'s globals
pub fn install(interpreter: &mut Interpreter) {
    for (name, function) in globals::FUNCTIONS {
        interpreter.register(name, *function);
    }
    let globals = interpreter.globals().clone();
    interpreter.set_global("_G", Value::Table(globals));
    interpreter.set_global(
        "_VERSION",
        Value::string(format!("Scuro {}", env!("CARGO_PKG_VERSION"))),
    );

    let string = open(interpreter, "string", string::FUNCTIONS);
    interpreter.set_string_library(string);

    open(interpreter, "table", table::FUNCTIONS);

    let math = open(interpreter, "math", math::FUNCTIONS);
    math.borrow_mut().set_str("pi", Value::Number(std::f64::consts::PI));
    math.borrow_mut().set_str("huge", Value::Number(f64::INFINITY));

    open(interpreter, "os", os::FUNCTIONS);
    debug!("standard library installed");
}

/// Build a library table and bind it to a global
fn open(interpreter: &mut Interpreter, name: &str, functions: &[(&'static str, Builtin)]) -> TableRef {
    let library = Table::new().into_ref();
    for (function_name, function) in functions {
        let qualified = format!("{}.{}", name, function_name);
        library
            .borrow_mut()
            .set_str(function_name, Value::function(Function::native(qualified, *function)));
    }
    interpreter.set_global(name, Value::Table(Rc::clone(&library)));
    library
}

// ==================== Argument checking ====================

/// Argument `index` (zero-based), nil when absent
pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// `bad argument #N to 'name' (message)`
pub(crate) fn arg_error(
    interpreter: &Interpreter,
    index: usize,
    function: &str,
    message: impl AsRef<str>,
) -> RuntimeError {
    interpreter.error(format!(
        "bad argument #{} to '{}' ({})",
        index + 1,
        function,
        message.as_ref()
    ))
}

fn type_error(interpreter: &Interpreter, args: &[Value], index: usize, function: &str, expected: &str) -> RuntimeError {
    let got = match args.get(index) {
        Some(value) => value.type_name(),
        None => "no value",
    };
    arg_error(interpreter, index, function, format!("{} expected, got {}", expected, got))
}

pub(crate) fn check_any(interpreter: &Interpreter, args: &[Value], index: usize, function: &str) -> Result<Value, RuntimeError> {
    args.get(index)
        .cloned()
        .ok_or_else(|| arg_error(interpreter, index, function, "value expected"))
}

pub(crate) fn check_table(interpreter: &Interpreter, args: &[Value], index: usize, function: &str) -> Result<TableRef, RuntimeError> {
    match args.get(index) {
        Some(Value::Table(t)) => Ok(Rc::clone(t)),
        _ => Err(type_error(interpreter, args, index, function, "table")),
    }
}

pub(crate) fn check_number(interpreter: &Interpreter, args: &[Value], index: usize, function: &str) -> Result<f64, RuntimeError> {
    match args.get(index) {
        Some(Value::Number(n)) => Ok(*n),
        _ => Err(type_error(interpreter, args, index, function, "number")),
    }
}

/// A number with no fractional part
pub(crate) fn check_integer(interpreter: &Interpreter, args: &[Value], index: usize, function: &str) -> Result<i64, RuntimeError> {
    let n = check_number(interpreter, args, index, function)?;
    if n.fract() != 0.0 || !n.is_finite() {
        return Err(arg_error(interpreter, index, function, "number has no integer representation"));
    }
    Ok(n as i64)
}

pub(crate) fn opt_integer(
    interpreter: &Interpreter,
    args: &[Value],
    index: usize,
    function: &str,
    default: i64,
) -> Result<i64, RuntimeError> {
    match args.get(index) {
        None | Some(Value::Nil) => Ok(default),
        Some(_) => check_integer(interpreter, args, index, function),
    }
}

/// A string argument; numbers are accepted and converted
pub(crate) fn check_string(interpreter: &Interpreter, args: &[Value], index: usize, function: &str) -> Result<Rc<str>, RuntimeError> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(Rc::clone(s)),
        Some(number @ Value::Number(_)) => Ok(number.to_string().into()),
        _ => Err(type_error(interpreter, args, index, function, "string")),
    }
}

pub(crate) fn opt_string(
    interpreter: &Interpreter,
    args: &[Value],
    index: usize,
    function: &str,
    default: &str,
) -> Result<Rc<str>, RuntimeError> {
    match args.get(index) {
        None | Some(Value::Nil) => Ok(default.into()),
        Some(_) => check_string(interpreter, args, index, function),
    }
}
