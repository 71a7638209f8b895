//! Operators, indexing and calls, with metatable dispatch

use std::cmp::Ordering;
use std::rc::Rc;

use log::trace;

use crate::frontend::ast::{BinaryOperator, UnaryOperator};
use crate::interpreter::eval::Flow;
use crate::interpreter::table::{self, TableRef};
use crate::interpreter::value::{Callable, Function, Value};
use crate::interpreter::Interpreter;
use crate::utils::RuntimeError;

/// How many `__index`/`__newindex` tables are followed before giving up
const MAX_META_CHAIN: usize = 100;

type Result<T> = std::result::Result<T, RuntimeError>;

impl Interpreter {
    // ==================== Metatables ====================

    /// The metatable of a value, if it has one
    pub fn metatable_of(&self, value: &Value) -> Option<TableRef> {
        match value {
            Value::Table(t) => t.borrow().metatable(),
            _ => None,
        }
    }

    /// Look up `event` in the metatable of `value`
    pub fn metamethod(&self, value: &Value, event: &str) -> Option<Value> {
        let metatable = self.metatable_of(value)?;
        let handler = metatable.borrow().get_str(event);
        (!handler.is_nil()).then_some(handler)
    }

    /// Call a metamethod handler and keep its first result
    fn call_metamethod(&mut self, handler: &Value, args: Vec<Value>) -> Result<Value> {
        let results = self.call_value(handler, args)?;
        Ok(results.into_iter().next().unwrap_or_default())
    }

    /// The handler for a binary event, looked up on the left operand first
    fn binary_metamethod(&self, left: &Value, right: &Value, event: &str) -> Option<Value> {
        self.metamethod(left, event)
            .or_else(|| self.metamethod(right, event))
    }

    // ==================== Calls ====================

    /// Call any value: functions directly, other values through `__call`
    pub fn call_value(&mut self, callee: &Value, mut args: Vec<Value>) -> Result<Vec<Value>> {
        match callee {
            Value::Function(function) => self.call_function(function, args),
            other => match self.metamethod(other, "__call") {
                Some(handler) => {
                    args.insert(0, other.clone());
                    self.call_value(&handler, args)
                }
                None => Err(self.error(format!("attempt to call a {} value", other.type_name()))),
            },
        }
    }

    fn call_function(&mut self, function: &Rc<Function>, args: Vec<Value>) -> Result<Vec<Value>> {
        self.check_stack()?;
        if self.call_depth >= self.options.max_call_depth {
            return Err(self.error("stack overflow"));
        }
        self.call_depth += 1;
        trace!("call {} (depth {})", function.name, self.call_depth);

        let result = match &function.callable {
            Callable::Native(func) => func(self, args),
            Callable::Script { body, scope } => {
                let scope = scope.extend();
                let mut args = args.into_iter();
                for param in &body.params {
                    scope.set_local(&param.name, args.next().unwrap_or_default());
                }
                if body.is_vararg {
                    scope.set_var_args(args.collect());
                }
                self.exec_statements(&body.body, &scope).map(|flow| match flow {
                    Flow::Return(values) => values,
                    _ => Vec::new(),
                })
            }
        };

        self.call_depth -= 1;
        result
    }

    // ==================== Indexing ====================

    /// `base[key]`, following `__index`
    pub fn index(&mut self, base: &Value, key: &Value) -> Result<Value> {
        let mut current = base.clone();
        for _ in 0..MAX_META_CHAIN {
            let handler = match &current {
                Value::Table(t) => {
                    let value = t.borrow().get(key);
                    if !value.is_nil() {
                        return Ok(value);
                    }
                    match self.metamethod(&current, "__index") {
                        Some(handler) => handler,
                        None => return Ok(Value::Nil),
                    }
                }
                Value::String(_) => {
                    return Ok(match &self.string_library {
                        Some(library) => library.borrow().get(key),
                        None => Value::Nil,
                    })
                }
                other => {
                    return Err(self.error(format!("attempt to index a {} value", other.type_name())))
                }
            };

            if let Value::Function(_) = handler {
                return self.call_metamethod(&handler, vec![current, key.clone()]);
            }
            current = handler;
        }
        Err(self.error("'__index' chain too long; possible loop"))
    }

    /// `base[key] = value`, following `__newindex` for absent keys
    pub fn set_index(&mut self, base: &Value, key: Value, value: Value) -> Result<()> {
        let mut current = base.clone();
        for _ in 0..MAX_META_CHAIN {
            let Value::Table(t) = &current else {
                return Err(self.error(format!("attempt to index a {} value", current.type_name())));
            };

            let present = !t.borrow().get(&key).is_nil();
            let handler = if present {
                None
            } else {
                self.metamethod(&current, "__newindex")
            };

            match handler {
                None => return self.raw_set(t, key, value),
                Some(handler @ Value::Function(_)) => {
                    self.call_value(&handler, vec![current.clone(), key, value])?;
                    return Ok(());
                }
                Some(handler) => current = handler,
            }
        }
        Err(self.error("'__newindex' chain too long; possible loop"))
    }

    /// Store without consulting metatables
    pub fn raw_set(&self, table: &TableRef, key: Value, value: Value) -> Result<()> {
        table
            .borrow_mut()
            .set(key, value)
            .map_err(|err| self.error(err.to_string()))
    }

    // ==================== Binary operators ====================

    /// Every binary operator except the short-circuiting `and`/`or`
    pub fn binary_op(&mut self, operator: BinaryOperator, left: Value, right: Value) -> Result<Value> {
        match operator {
            BinaryOperator::Concat => self.concat(left, right),
            BinaryOperator::Eq => Ok(Value::Boolean(self.equals(&left, &right)?)),
            BinaryOperator::Ne => Ok(Value::Boolean(!left.raw_equals(&right))),
            BinaryOperator::Lt => self.less_than(&left, &right).map(Value::Boolean),
            BinaryOperator::Le => self.less_equal(&left, &right).map(Value::Boolean),
            // a > b is b < a
            BinaryOperator::Gt => self.compare(&right, &left, &left, &right, false).map(Value::Boolean),
            BinaryOperator::Ge => self.compare(&right, &left, &left, &right, true).map(Value::Boolean),
            BinaryOperator::And | BinaryOperator::Or => {
                Err(self.error(format!("'{}' is evaluated lazily", operator.symbol())))
            }
            arithmetic => self.arithmetic(arithmetic, left, right),
        }
    }

    pub fn arithmetic(&mut self, operator: BinaryOperator, left: Value, right: Value) -> Result<Value> {
        if let (Value::Number(a), Value::Number(b)) = (&left, &right) {
            let (a, b) = (*a, *b);
            let result = match operator {
                BinaryOperator::Add => a + b,
                BinaryOperator::Sub => a - b,
                BinaryOperator::Mul => a * b,
                BinaryOperator::Div => a / b,
                BinaryOperator::Mod => a - (a / b).floor() * b,
                BinaryOperator::Pow => a.powf(b),
                other => return Err(self.error(format!("'{}' is not arithmetic", other.symbol()))),
            };
            return Ok(Value::Number(result));
        }

        let event = operator.metamethod().unwrap_or("__add");
        if let Some(handler) = self.binary_metamethod(&left, &right, event) {
            return self.call_metamethod(&handler, vec![left, right]);
        }

        let culprit = if left.as_number().is_none() { &left } else { &right };
        Err(self.error(format!(
            "attempt to perform arithmetic on a {} value",
            culprit.type_name()
        )))
    }

    pub fn concat(&mut self, left: Value, right: Value) -> Result<Value> {
        if let (Value::String(a), Value::String(b)) = (&left, &right) {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            return Ok(Value::string(joined));
        }
        if let Some(handler) = self.binary_metamethod(&left, &right, "__concat") {
            return self.call_metamethod(&handler, vec![left, right]);
        }
        Err(self.error(format!(
            "attempt to concatenate a {} with a {}",
            left.type_name(),
            right.type_name()
        )))
    }

    /// `==`: identity first, then `__eq` for two distinct tables
    pub fn equals(&mut self, left: &Value, right: &Value) -> Result<bool> {
        if left.raw_equals(right) {
            return Ok(true);
        }
        if let (Value::Table(_), Value::Table(_)) = (left, right) {
            if let Some(handler) = self.binary_metamethod(left, right, "__eq") {
                let result = self.call_metamethod(&handler, vec![left.clone(), right.clone()])?;
                return Ok(result.is_truthy());
            }
        }
        Ok(false)
    }

    pub fn less_than(&mut self, left: &Value, right: &Value) -> Result<bool> {
        self.compare(left, right, left, right, false)
    }

    pub fn less_equal(&mut self, left: &Value, right: &Value) -> Result<bool> {
        self.compare(left, right, left, right, true)
    }

    /// `a < b` (or `a <= b` when `or_equal`). `shown` are the operands in
    /// source order, used in the error message.
    fn compare(
        &mut self,
        a: &Value,
        b: &Value,
        shown_left: &Value,
        shown_right: &Value,
        or_equal: bool,
    ) -> Result<bool> {
        let event = if or_equal { "__le" } else { "__lt" };
        if let Some(handler) = self.binary_metamethod(a, b, event) {
            let result = self.call_metamethod(&handler, vec![a.clone(), b.clone()])?;
            return Ok(result.is_truthy());
        }

        let ordering = match (a, b) {
            (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
            (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
            _ => {
                return Err(self.error(format!(
                    "attempt to compare {} with {}",
                    shown_left.type_name(),
                    shown_right.type_name()
                )))
            }
        };
        Ok(match ordering {
            Some(Ordering::Less) => true,
            Some(Ordering::Equal) => or_equal,
            // NaN compares false either way
            Some(Ordering::Greater) | None => false,
        })
    }

    // ==================== Unary operators ====================

    pub fn unary_op(&mut self, operator: UnaryOperator, operand: Value) -> Result<Value> {
        match operator {
            UnaryOperator::Not => Ok(Value::Boolean(!operand.is_truthy())),
            UnaryOperator::Neg => {
                if let Value::Number(n) = operand {
                    return Ok(Value::Number(-n));
                }
                if let Some(handler) = self.metamethod(&operand, "__unm") {
                    return self.call_metamethod(&handler, vec![operand.clone(), operand]);
                }
                Err(self.error(format!(
                    "attempt to perform arithmetic on a {} value",
                    operand.type_name()
                )))
            }
            UnaryOperator::Len => self.length(&operand),
        }
    }

    /// `#value`
    pub fn length(&mut self, value: &Value) -> Result<Value> {
        if let Some(handler) = self.metamethod(value, "__len") {
            return self.call_metamethod(&handler, vec![value.clone()]);
        }
        match value {
            Value::Table(t) => Ok(Value::Number(t.borrow().len() as f64)),
            Value::String(s) => Ok(Value::Number(s.chars().count() as f64)),
            other => Err(self.error(format!(
                "attempt to get length of a {} value",
                other.type_name()
            ))),
        }
    }

    // ==================== Conversion ====================

    /// `tostring`, honouring `__tostring` and `__name`
    pub fn tostring(&mut self, value: &Value) -> Result<String> {
        if let Some(handler) = self.metamethod(value, "__tostring") {
            return match self.call_metamethod(&handler, vec![value.clone()])? {
                Value::String(s) => Ok(s.to_string()),
                _ => Err(self.error("'__tostring' must return a string")),
            };
        }
        if let Some(Value::String(name)) = self.metamethod(value, "__name") {
            if let Value::Table(t) = value {
                return Ok(format!("{}: {:#010x}", name, Rc::as_ptr(t) as *const () as usize));
            }
        }
        Ok(value.to_string())
    }

    /// The rendering `print` uses: tables without `__tostring` are expanded
    pub fn display(&mut self, value: &Value) -> Result<String> {
        match value {
            Value::Table(t) if self.metamethod(value, "__tostring").is_none() => {
                Ok(table::stringify(t))
            }
            other => self.tostring(other),
        }
    }
}
