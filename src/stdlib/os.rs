//! The `os` library

use std::time::{SystemTime, UNIX_EPOCH};

use crate::interpreter::{Interpreter, Value};
use crate::stdlib::Builtin;
use crate::utils::RuntimeError;

type Result = std::result::Result<Vec<Value>, RuntimeError>;

pub(super) const FUNCTIONS: &[(&str, Builtin)] = &[("clock", clock), ("time", time)];

/// Seconds since the Unix epoch
fn time(interpreter: &mut Interpreter, _args: Vec<Value>) -> Result {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| interpreter.error(format!("system clock error: {}", err)))?
        .as_secs();
    Ok(vec![Value::Number(seconds as f64)])
}

/// Seconds since the interpreter started
fn clock(interpreter: &mut Interpreter, _args: Vec<Value>) -> Result {
    Ok(vec![Value::Number(interpreter.elapsed().as_secs_f64())])
}
