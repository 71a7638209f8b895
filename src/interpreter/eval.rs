//! Statement execution and expression evaluation

use std::rc::Rc;

use crate::frontend::ast::*;
use crate::interpreter::scope::ScopeRef;
use crate::interpreter::table::Table;
use crate::interpreter::value::{Function, Value};
use crate::interpreter::Interpreter;
use crate::utils::{Position, RuntimeError};

type Result<T> = std::result::Result<T, RuntimeError>;

/// How control leaves a statement
#[derive(Debug)]
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Vec<Value>),
}

/// A resolved assignment target
enum Place {
    Name(String),
    Field(Value, Value),
}

impl Interpreter {
    // ==================== Blocks ====================

    /// Run statements in `scope` itself
    pub(crate) fn exec_statements(&mut self, statements: &[Stmt], scope: &ScopeRef) -> Result<Flow> {
        for stmt in statements {
            match self.exec_statement(stmt, scope)? {
                Flow::Normal => {}
                Flow::Continue if !scope.is_in_loop() => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    /// Run statements in a fresh child scope
    fn exec_block(&mut self, statements: &[Stmt], scope: &ScopeRef) -> Result<Flow> {
        self.exec_statements(statements, &scope.extend())
    }

    /// One pass of a loop body. `Some` means the loop must stop and
    /// propagate the flow.
    fn loop_pass(&mut self, body: &[Stmt], scope: &ScopeRef) -> Result<Option<Flow>> {
        match self.exec_block(body, scope)? {
            Flow::Normal | Flow::Continue => Ok(None),
            Flow::Break => Ok(Some(Flow::Normal)),
            flow => Ok(Some(flow)),
        }
    }

    // ==================== Statements ====================

    pub(crate) fn exec_statement(&mut self, stmt: &Stmt, scope: &ScopeRef) -> Result<Flow> {
        self.capture(stmt.syntax_kind(), stmt.position);
        self.check_stack()?;

        match &stmt.kind {
            StmtKind::Local { names, values } => {
                let values = self.eval_list(values, scope)?;
                let mut values = values.into_iter();
                for name in names {
                    scope.set_local(&name.name, values.next().unwrap_or_default());
                }
            }
            StmtKind::Assignment {
                targets,
                operator,
                values,
            } => self.exec_assignment(targets, *operator, values, scope)?,
            StmtKind::Expression(expr) => {
                self.eval_multi(expr, scope)?;
            }
            StmtKind::If {
                condition,
                then_body,
                else_body,
            } => {
                if self.eval(condition, scope)?.is_truthy() {
                    return self.exec_block(then_body, scope);
                }
                return match else_body {
                    Some(ElseBody::If(nested)) => self.exec_statement(nested, scope),
                    Some(ElseBody::Block(body)) => self.exec_block(body, scope),
                    None => Ok(Flow::Normal),
                };
            }
            StmtKind::While { condition, body } => {
                let loop_scope = scope.extend();
                loop_scope.mark_in_loop();
                while self.eval(condition, &loop_scope)?.is_truthy() {
                    if let Some(flow) = self.loop_pass(body, &loop_scope)? {
                        return Ok(flow);
                    }
                }
            }
            StmtKind::Repeat { body, condition } => {
                let loop_scope = scope.extend();
                loop_scope.mark_in_loop();
                loop {
                    // the condition sees the body's locals
                    let body_scope = loop_scope.extend();
                    match self.exec_statements(body, &body_scope)? {
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if self.eval(condition, &body_scope)?.is_truthy() {
                        break;
                    }
                }
            }
            StmtKind::NumericFor {
                variable,
                start,
                limit,
                step,
                body,
            } => return self.exec_numeric_for(variable, start, limit, step.as_ref(), body, scope),
            StmtKind::GenericFor {
                names,
                iterators,
                body,
            } => return self.exec_generic_for(names, iterators, body, scope),
            StmtKind::Do(body) => return self.exec_block(body, scope),
            StmtKind::Return(values) => {
                let values = self.eval_list(values, scope)?;
                return Ok(Flow::Return(values));
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::FunctionDeclaration { target, function } => match target {
                FunctionTarget::Local(name) => {
                    // bound in `scope` so the body can call itself
                    let closure = Function::script(function.clone(), scope.clone());
                    scope.set_local(&name.name, Value::function(closure));
                }
                FunctionTarget::Assign(target) => {
                    let place = self.resolve(target, scope)?;
                    let closure = Function::script(function.clone(), scope.clone());
                    self.write(place, Value::function(closure), scope)?;
                }
            },
            StmtKind::Comment(_) | StmtKind::EndOfFile => {}
        }
        Ok(Flow::Normal)
    }

    fn exec_assignment(
        &mut self,
        targets: &[Expr],
        operator: AssignmentOperator,
        values: &[Expr],
        scope: &ScopeRef,
    ) -> Result<()> {
        match operator {
            AssignmentOperator::Assign => {
                let places = targets
                    .iter()
                    .map(|target| self.resolve(target, scope))
                    .collect::<Result<Vec<_>>>()?;
                let values = self.eval_list(values, scope)?;
                let mut values = values.into_iter();
                for place in places {
                    self.write(place, values.next().unwrap_or_default(), scope)?;
                }
                Ok(())
            }
            AssignmentOperator::Compound(op) => {
                let (Some(target), Some(value)) = (targets.first(), values.first()) else {
                    return Err(self.error("compound assignment expects a single target/value"));
                };
                let place = self.resolve(target, scope)?;
                let current = self.read(&place, scope)?;
                let rhs = self.eval(value, scope)?;
                self.capture(compound_kind(op), target.position);
                let result = self.binary_op(op, current, rhs)?;
                self.write(place, result, scope)
            }
        }
    }

    fn exec_numeric_for(
        &mut self,
        variable: &Identifier,
        start: &Expr,
        limit: &Expr,
        step: Option<&Expr>,
        body: &[Stmt],
        scope: &ScopeRef,
    ) -> Result<Flow> {
        let start = self.for_number(start, scope, "initial")?;
        let limit = self.for_number(limit, scope, "limit")?;
        let step = match step {
            Some(step) => self.for_number(step, scope, "step")?,
            None => 1.0,
        };
        if step == 0.0 {
            return Err(self.error("'for' step is zero"));
        }

        let loop_scope = scope.extend();
        loop_scope.mark_in_loop();
        let mut i = start;
        while (step > 0.0 && i <= limit) || (step < 0.0 && i >= limit) {
            loop_scope.set_local(&variable.name, Value::Number(i));
            if let Some(flow) = self.loop_pass(body, &loop_scope)? {
                return Ok(flow);
            }
            i += step;
        }
        Ok(Flow::Normal)
    }

    fn for_number(&mut self, expr: &Expr, scope: &ScopeRef, what: &str) -> Result<f64> {
        match self.eval(expr, scope)? {
            Value::Number(n) => Ok(n),
            _ => Err(self.error(format!("'for' {} value must be a number", what))),
        }
    }

    fn exec_generic_for(
        &mut self,
        names: &[Identifier],
        iterators: &[Expr],
        body: &[Stmt],
        scope: &ScopeRef,
    ) -> Result<Flow> {
        let mut init = self.eval_list(iterators, scope)?.into_iter();
        let function = init.next().unwrap_or_default();
        let state = init.next().unwrap_or_default();
        let mut control = init.next().unwrap_or_default();

        let loop_scope = scope.extend();
        loop_scope.mark_in_loop();
        loop {
            let results = self.call_value(&function, vec![state.clone(), control.clone()])?;
            let first = results.first().cloned().unwrap_or_default();
            if first.is_nil() {
                break;
            }
            control = first;

            let mut results = results.into_iter();
            for name in names {
                loop_scope.set_local(&name.name, results.next().unwrap_or_default());
            }
            if let Some(flow) = self.loop_pass(body, &loop_scope)? {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    // ==================== Assignment targets ====================

    /// Evaluate the parts of an assignment target once
    fn resolve(&mut self, target: &Expr, scope: &ScopeRef) -> Result<Place> {
        match &target.kind {
            ExprKind::Identifier(name) => Ok(Place::Name(name.clone())),
            ExprKind::PropertyAccess { base, name } => {
                let base = self.eval(base, scope)?;
                Ok(Place::Field(base, Value::string(name.name.as_str())))
            }
            ExprKind::ElementAccess { base, key } => {
                let base = self.eval(base, scope)?;
                let key = self.eval(key, scope)?;
                Ok(Place::Field(base, key))
            }
            _ => Err(self.error("cannot assign to this expression")),
        }
    }

    fn read(&mut self, place: &Place, scope: &ScopeRef) -> Result<Value> {
        match place {
            Place::Name(name) => Ok(self.lookup(name, scope)),
            Place::Field(base, key) => self.index(base, key),
        }
    }

    /// Locals are updated in their declaring scope; anything else is a global
    fn write(&mut self, place: Place, value: Value, scope: &ScopeRef) -> Result<()> {
        match place {
            Place::Name(name) => {
                if let Err(value) = scope.assign(&name, value) {
                    self.globals.borrow_mut().set_str(&name, value);
                }
                Ok(())
            }
            Place::Field(base, key) => self.set_index(&base, key, value),
        }
    }

    fn lookup(&self, name: &str, scope: &ScopeRef) -> Value {
        scope
            .lookup(name)
            .unwrap_or_else(|| self.globals.borrow().get_str(name))
    }

    // ==================== Expressions ====================

    /// Evaluate an expression list: every entry yields one value except the
    /// last, which expands to all of its values.
    pub(crate) fn eval_list(&mut self, exprs: &[Expr], scope: &ScopeRef) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(exprs.len());
        if let Some((last, init)) = exprs.split_last() {
            for expr in init {
                values.push(self.eval(expr, scope)?);
            }
            values.extend(self.eval_multi(last, scope)?);
        }
        Ok(values)
    }

    /// All values of a call or `...`; a single value for anything else
    pub(crate) fn eval_multi(&mut self, expr: &Expr, scope: &ScopeRef) -> Result<Vec<Value>> {
        match &expr.kind {
            ExprKind::Call { callee, args } => {
                let function = self.eval(callee, scope)?;
                let args = self.eval_list(args, scope)?;
                self.capture(expr.syntax_kind(), expr.position);
                if !is_callable(&function) && self.metamethod(&function, "__call").is_none() {
                    return Err(self.error(format!(
                        "attempt to call a {} value{}",
                        function.type_name(),
                        describe_callee(callee, scope)
                    )));
                }
                self.call_value(&function, args)
            }
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                let receiver = self.eval(receiver, scope)?;
                let key = Value::string(method.name.as_str());
                let function = self.index(&receiver, &key)?;
                let mut call_args = vec![receiver];
                call_args.extend(self.eval_list(args, scope)?);
                self.capture(expr.syntax_kind(), expr.position);
                if !is_callable(&function) && self.metamethod(&function, "__call").is_none() {
                    return Err(self.error(format!(
                        "attempt to call a {} value (method '{}')",
                        function.type_name(),
                        method.name
                    )));
                }
                self.call_value(&function, call_args)
            }
            ExprKind::VarArgs => Ok(scope.var_args().to_vec()),
            _ => Ok(vec![self.eval(expr, scope)?]),
        }
    }

    /// Evaluate to exactly one value
    pub(crate) fn eval(&mut self, expr: &Expr, scope: &ScopeRef) -> Result<Value> {
        self.capture(expr.syntax_kind(), expr.position);
        self.check_stack()?;

        match &expr.kind {
            ExprKind::Nil => Ok(Value::Nil),
            ExprKind::Boolean(b) => Ok(Value::Boolean(*b)),
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::String(s) => Ok(Value::string(s.as_str())),
            ExprKind::Identifier(name) => Ok(self.lookup(name, scope)),
            ExprKind::VarArgs => Ok(scope.var_args().first().cloned().unwrap_or_default()),
            ExprKind::Binary {
                operator,
                left,
                right,
            } => {
                let left_value = self.eval(left, scope)?;
                match operator {
                    BinaryOperator::And if !left_value.is_truthy() => Ok(left_value),
                    BinaryOperator::Or if left_value.is_truthy() => Ok(left_value),
                    BinaryOperator::And | BinaryOperator::Or => self.eval(right, scope),
                    op => {
                        let right_value = self.eval(right, scope)?;
                        self.capture(expr.syntax_kind(), expr.position);
                        self.binary_op(*op, left_value, right_value)
                    }
                }
            }
            ExprKind::Unary { operator, operand } => {
                let value = self.eval(operand, scope)?;
                self.capture(expr.syntax_kind(), expr.position);
                self.unary_op(*operator, value)
            }
            ExprKind::PropertyAccess { base, name } => {
                let base = self.eval(base, scope)?;
                self.capture(expr.syntax_kind(), expr.position);
                self.index(&base, &Value::string(name.name.as_str()))
            }
            ExprKind::ElementAccess { base, key } => {
                let base = self.eval(base, scope)?;
                let key = self.eval(key, scope)?;
                self.capture(expr.syntax_kind(), expr.position);
                self.index(&base, &key)
            }
            ExprKind::Call { .. } | ExprKind::MethodCall { .. } => {
                Ok(self.eval_multi(expr, scope)?.into_iter().next().unwrap_or_default())
            }
            ExprKind::Function(body) => Ok(Value::function(Function::script(
                Rc::clone(body),
                scope.clone(),
            ))),
            ExprKind::Table(fields) => self.eval_table(fields, scope),
            // parentheses truncate to one value
            ExprKind::Parenthesized(inner) => self.eval(inner, scope),
        }
    }

    fn eval_table(&mut self, fields: &[TableField], scope: &ScopeRef) -> Result<Value> {
        let table = Table::new().into_ref();
        let mut next_index = 1usize;

        for (i, field) in fields.iter().enumerate() {
            match &field.key {
                FieldKey::Positional if i + 1 == fields.len() && field.value.is_multi_value() => {
                    for value in self.eval_multi(&field.value, scope)? {
                        self.raw_set(&table, Value::Number(next_index as f64), value)?;
                        next_index += 1;
                    }
                }
                FieldKey::Positional => {
                    let value = self.eval(&field.value, scope)?;
                    self.raw_set(&table, Value::Number(next_index as f64), value)?;
                    next_index += 1;
                }
                FieldKey::Named(name) => {
                    let value = self.eval(&field.value, scope)?;
                    table.borrow_mut().set_str(&name.name, value);
                }
                FieldKey::Computed(key) => {
                    let key = self.eval(key, scope)?;
                    let value = self.eval(&field.value, scope)?;
                    self.capture(SyntaxKind::PropertyAssignment, field.position);
                    self.raw_set(&table, key, value)?;
                }
            }
        }
        Ok(Value::Table(table))
    }

    /// Remember the node being evaluated for error positions
    pub(crate) fn capture(&mut self, kind: SyntaxKind, position: Position) {
        if position.is_known() {
            self.last_kind = kind;
            self.last_position = position;
        }
    }
}

fn is_callable(value: &Value) -> bool {
    matches!(value, Value::Function(_))
}

/// Context appended to "attempt to call" errors for named callees
fn describe_callee(callee: &Expr, scope: &ScopeRef) -> String {
    match &callee.kind {
        ExprKind::Identifier(name) if scope.lookup(name).is_some() => format!(" (local '{}')", name),
        ExprKind::Identifier(name) => format!(" (global '{}')", name),
        ExprKind::PropertyAccess { name, .. } => format!(" (field '{}')", name.name),
        _ => String::new(),
    }
}

fn compound_kind(op: BinaryOperator) -> SyntaxKind {
    AssignmentOperator::Compound(op).syntax_kind()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse_source;
    use crate::interpreter::InterpreterOptions;

    fn run(source: &str) -> Result<Vec<Value>> {
        let file = parse_source(source, "test.lua").expect("parse failed");
        let mut interpreter = Interpreter::bare(InterpreterOptions::default());
        interpreter.load(&file)
    }

    fn numbers(values: &[Value]) -> Vec<f64> {
        values.iter().filter_map(Value::as_number).collect()
    }

    #[test]
    fn test_return_values() {
        let values = run("return 1, 2 + 3, (4)").unwrap();
        assert_eq!(numbers(&values), vec![1.0, 5.0, 4.0]);
        assert!(run("return").unwrap().is_empty());
    }

    #[test]
    fn test_locals_and_globals() {
        let values = run("local a = 1 b = 2 do local a = 10 b = a + b end return a, b").unwrap();
        assert_eq!(numbers(&values), vec![1.0, 12.0]);
    }

    #[test]
    fn test_closures_capture_scope() {
        let source = "
            local function counter()
                local n = 0
                return function() n = n + 1 return n end
            end
            local c = counter()
            c() c()
            return c()
        ";
        assert_eq!(numbers(&run(source).unwrap()), vec![3.0]);
    }

    #[test]
    fn test_recursive_local_function() {
        let source = "
            local function fib(n) if n < 2 then return n end return fib(n - 1) + fib(n - 2) end
            return fib(10)
        ";
        assert_eq!(numbers(&run(source).unwrap()), vec![55.0]);
    }

    #[test]
    fn test_loops() {
        let source = "
            local total = 0
            for i = 1, 10 do
                if i % 2 == 0 then continue end
                total = total + i
            end
            local n = 0
            while true do n = n + 1 if n >= 5 then break end end
            local r = 0
            repeat local stop = r >= 3 r = r + 1 until stop
            for i = 10, 1, -3 do total = total + 1000 end
            return total, n, r
        ";
        assert_eq!(numbers(&run(source).unwrap()), vec![4025.0, 5.0, 4.0]);
    }

    #[test]
    fn test_multiple_values() {
        let source = "
            local function three() return 1, 2, 3 end
            local t = {three(), three()}
            local a, b = (three())
            return #t, a, b
        ";
        let values = run(source).unwrap();
        assert_eq!(values[0].as_number(), Some(4.0));
        assert_eq!(values[1].as_number(), Some(1.0));
        assert!(values[2].is_nil());
    }

    #[test]
    fn test_varargs() {
        let source = "
            local function pack(...) return {...}, ... end
            local t, first = pack(7, 8, 9)
            return #t, first
        ";
        assert_eq!(numbers(&run(source).unwrap()), vec![3.0, 7.0]);
    }

    #[test]
    fn test_compound_assignment() {
        let source = "local t = {n = 1} t.n += 4 t.n *= 2 local s = 'a' s ..= 'b' return t.n, s";
        let values = run(source).unwrap();
        assert_eq!(values[0].as_number(), Some(10.0));
        assert_eq!(values[1].to_string(), "ab");
    }

    #[test]
    fn test_method_declaration_and_call() {
        let source = "
            local account = {balance = 10}
            function account:deposit(v) self.balance = self.balance + v return self end
            account:deposit(5):deposit(1)
            return account.balance
        ";
        assert_eq!(numbers(&run(source).unwrap()), vec![16.0]);
    }

    #[test]
    fn test_short_circuit() {
        let values = run("local x = nil return x and x.y, x or 'default', false or nil").unwrap();
        assert!(values[0].is_nil());
        assert_eq!(values[1].to_string(), "default");
        assert!(values[2].is_nil());
    }

    #[test]
    fn test_error_position_points_at_failing_node() {
        let err = run("local a = 1\nlocal b = a + nil").unwrap_err();
        assert_eq!(err.reason, "attempt to perform arithmetic on a nil value");
        assert_eq!(err.position.row, 2);
        assert_eq!(err.script.as_deref(), Some("test.lua"));
    }

    #[test]
    fn test_call_error_names_the_callee() {
        let err = run("missing()").unwrap_err();
        assert_eq!(err.reason, "attempt to call a nil value (global 'missing')");
        let err = run("local t = {} t.go()").unwrap_err();
        assert_eq!(err.reason, "attempt to call a nil value (field 'go')");
    }

    #[test]
    fn test_for_requires_numbers() {
        let err = run("for i = 'a', 2 do end").unwrap_err();
        assert_eq!(err.reason, "'for' initial value must be a number");
        let err = run("for i = 1, 2, 0 do end").unwrap_err();
        assert_eq!(err.reason, "'for' step is zero");
    }

    #[test]
    fn test_stack_overflow() {
        let file = parse_source("local function f() return f() end f()", "deep.lua").unwrap();
        let mut interpreter = Interpreter::bare(InterpreterOptions {
            max_call_depth: 50,
            ..InterpreterOptions::default()
        });
        let err = interpreter.load(&file).unwrap_err();
        assert_eq!(err.reason, "stack overflow");
        assert!(interpreter.has_error());
    }

    #[test]
    fn test_nested_expressions_count_against_the_stack_budget() {
        let source = format!("return {}1{}", "(1 + ".repeat(60), ")".repeat(60));
        let file = parse_source(&source, "nested.lua").unwrap();
        let mut interpreter = Interpreter::bare(InterpreterOptions {
            max_stack_bytes: 1024,
            ..InterpreterOptions::default()
        });
        let err = interpreter.load(&file).unwrap_err();
        assert_eq!(err.reason, "stack overflow");

        let mut interpreter = Interpreter::bare(InterpreterOptions::default());
        let values = interpreter.load(&file).unwrap();
        assert_eq!(values[0].as_number(), Some(61.0));
    }
}
