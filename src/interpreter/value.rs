//! Runtime values

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::frontend::ast::FunctionBody;
use crate::interpreter::scope::ScopeRef;
use crate::interpreter::table::{Table, TableRef};
use crate::interpreter::thread::ThreadRef;
use crate::interpreter::Interpreter;
use crate::utils::RuntimeError;

/// Signature of functions implemented by the host
pub type NativeFn = dyn Fn(&mut Interpreter, Vec<Value>) -> Result<Vec<Value>, RuntimeError>;

/// A dynamically typed value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Function(Rc<Function>),
    Table(TableRef),
    Userdata(Rc<Userdata>),
    Thread(ThreadRef),
}

/// A callable value
pub struct Function {
    /// Name used in diagnostics
    pub name: String,
    pub callable: Callable,
}

pub enum Callable {
    Native(Box<NativeFn>),
    /// A closure over the scope it was defined in
    Script { body: Rc<FunctionBody>, scope: ScopeRef },
}

/// An opaque host value
pub struct Userdata {
    pub type_name: String,
    pub data: Box<dyn Any>,
}

/// Identity used for equality and as a table key.
///
/// Nil, booleans, numbers and strings are identified by value; tables,
/// functions, userdata and threads by allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Nil,
    Boolean(bool),
    Number(u64),
    String(Rc<str>),
    Object(usize),
}

impl Address {
    pub fn number(n: f64) -> Self {
        // 0.0 and -0.0 are the same key
        let n = if n == 0.0 { 0.0 } else { n };
        Self::Number(n.to_bits())
    }
}

impl Function {
    pub fn native(
        name: impl Into<String>,
        func: impl Fn(&mut Interpreter, Vec<Value>) -> Result<Vec<Value>, RuntimeError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            callable: Callable::Native(Box::new(func)),
        }
    }

    pub fn script(body: Rc<FunctionBody>, scope: ScopeRef) -> Self {
        Self {
            name: body.name.clone().unwrap_or_else(|| "?".to_string()),
            callable: Callable::Script { body, scope },
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self.callable, Callable::Native(_))
    }
}

impl Value {
    pub fn string(text: impl Into<Rc<str>>) -> Self {
        Self::String(text.into())
    }

    pub fn table(table: Table) -> Self {
        Self::Table(Rc::new(RefCell::new(table)))
    }

    pub fn function(function: Function) -> Self {
        Self::Function(Rc::new(function))
    }

    pub fn userdata(type_name: impl Into<String>, data: impl Any) -> Self {
        Self::Userdata(Rc::new(Userdata {
            type_name: type_name.into(),
            data: Box::new(data),
        }))
    }

    /// The name returned by `type()`
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Function(_) => "function",
            Self::Table(_) => "table",
            Self::Userdata(_) => "userdata",
            Self::Thread(_) => "thread",
        }
    }

    pub fn address(&self) -> Address {
        match self {
            Self::Nil => Address::Nil,
            Self::Boolean(b) => Address::Boolean(*b),
            Self::Number(n) => Address::number(*n),
            Self::String(s) => Address::String(s.clone()),
            Self::Function(f) => Address::Object(Rc::as_ptr(f) as *const () as usize),
            Self::Table(t) => Address::Object(Rc::as_ptr(t) as *const () as usize),
            Self::Userdata(u) => Address::Object(Rc::as_ptr(u) as *const () as usize),
            Self::Thread(t) => Address::Object(Rc::as_ptr(t) as *const () as usize),
        }
    }

    /// `nil` and `false` are falsy, everything else is truthy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::Nil | Self::Boolean(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableRef> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Identity comparison, the `rawequal` primitive
    pub fn raw_equals(&self, other: &Value) -> bool {
        self.address() == other.address()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s.into())
    }
}

impl From<TableRef> for Value {
    fn from(t: TableRef) -> Self {
        Self::Table(t)
    }
}

/// Plain `tostring` rendering, without consulting metatables
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::String(s) => write!(f, "{}", s),
            Self::Function(func) if func.is_native() => {
                write!(f, "builtin: {:#010x}", Rc::as_ptr(func) as *const () as usize)
            }
            Self::Function(func) => write!(f, "function: {:#010x}", Rc::as_ptr(func) as *const () as usize),
            Self::Table(t) => write!(f, "table: {:#010x}", Rc::as_ptr(t) as *const () as usize),
            Self::Userdata(u) => write!(f, "{}: {:#010x}", u.type_name, Rc::as_ptr(u) as *const () as usize),
            Self::Thread(t) => write!(f, "thread: {:#010x}", Rc::as_ptr(t) as *const () as usize),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}

/// Format a number the way `print` shows it (`%.14g`)
pub fn format_number(n: f64) -> String {
    format_general(n, 14)
}

/// C-style `%g` formatting with the given number of significant digits
pub fn format_general(n: f64, precision: usize) -> String {
    if n.is_nan() {
        return if n.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if n == 0.0 {
        return if n.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let precision = precision.max(1);
    // Round to the requested significant digits first so the exponent
    // reflects carries such as 9.99... -> 10
    let scientific = format!("{:.*e}", precision - 1, n);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, n)).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(7.0), "7");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(1.0 / 3.0), "0.33333333333333");
        assert_eq!(format_number(256.0), "256");
        assert_eq!(format_number(1e15), "1e+15");
        assert_eq!(format_number(1e100), "1e+100");
        assert_eq!(format_number(0.00001), "1e-05");
        assert_eq!(format_number(f64::INFINITY), "inf");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn test_general_precision() {
        assert_eq!(format_general(3.14159, 3), "3.14");
        assert_eq!(format_general(123456.0, 3), "1.23e+05");
        assert_eq!(format_general(9.9999, 2), "10");
    }

    #[test]
    fn test_value_addresses() {
        assert_eq!(Value::string("a").address(), Value::from("a").address());
        assert_eq!(Value::Number(0.0).address(), Value::Number(-0.0).address());
        assert_ne!(Value::Number(1.0).address(), Value::string("1").address());
        let a = Value::table(Table::new());
        let b = Value::table(Table::new());
        assert!(!a.raw_equals(&b));
        assert!(a.raw_equals(&a.clone()));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::string("").is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::string("hi").to_string(), "hi");
        assert!(Value::table(Table::new()).to_string().starts_with("table: 0x"));
        let native = Value::function(Function::native("f", |_, _| Ok(vec![])));
        assert!(native.to_string().starts_with("builtin: 0x"));
        assert_eq!(Value::userdata("point", (1, 2)).type_name(), "userdata");
    }
}
