//! Node construction and cloning helpers
//!
//! The factory is the only place node ids are handed out, so every node in
//! a tree built through one factory has a distinct id.

use std::rc::Rc;

use crate::frontend::ast::*;
use crate::utils::Position;

#[derive(Debug, Default)]
pub struct NodeFactory {
    next_id: u32,
}

impl NodeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn identifier(&mut self, name: impl Into<String>, position: Position) -> Identifier {
        Identifier {
            id: self.next_id(),
            position,
            name: name.into(),
        }
    }

    pub fn expr(&mut self, kind: ExprKind, position: Position) -> Expr {
        Expr {
            id: self.next_id(),
            position,
            kind,
        }
    }

    pub fn stmt(&mut self, kind: StmtKind, position: Position) -> Stmt {
        Stmt {
            id: self.next_id(),
            position,
            kind,
        }
    }

    pub fn field(&mut self, key: FieldKey, value: Expr, position: Position) -> TableField {
        TableField {
            id: self.next_id(),
            position,
            key,
            value,
        }
    }

    pub fn binary(&mut self, operator: BinaryOperator, left: Expr, right: Expr) -> Expr {
        let position = left.position;
        self.expr(
            ExprKind::Binary {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            },
            position,
        )
    }

    pub fn call(&mut self, callee: Expr, args: Vec<Expr>) -> Expr {
        let position = callee.position;
        self.expr(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            position,
        )
    }

    pub fn comment(&mut self, text: impl Into<String>, position: Position) -> Stmt {
        self.stmt(StmtKind::Comment(text.into()), position)
    }

    /// Build the root, terminating the statement list with an `EndOfFile` marker
    pub fn source_file(
        &mut self,
        file_name: impl Into<String>,
        mut statements: Vec<Stmt>,
        end: Position,
    ) -> SourceFile {
        let eof = self.stmt(StmtKind::EndOfFile, end);
        statements.push(eof);
        let id = self.next_id();
        SourceFile::new(id, file_name, statements)
    }

    // ==================== Cloning ====================

    /// Deep copy of an expression with fresh ids and the original positions.
    ///
    /// The copy is detached until it is placed in a new source file.
    pub fn clone_expr(&mut self, expr: &Expr) -> Expr {
        let mut copy = expr.clone();
        self.renumber_expr(&mut copy);
        copy
    }

    /// Deep copy of a statement with fresh ids and the original positions
    pub fn clone_stmt(&mut self, stmt: &Stmt) -> Stmt {
        let mut copy = stmt.clone();
        self.renumber_stmt(&mut copy);
        copy
    }

    fn renumber_block(&mut self, body: &mut [Stmt]) {
        for stmt in body {
            self.renumber_stmt(stmt);
        }
    }

    fn renumber_exprs(&mut self, exprs: &mut [Expr]) {
        for expr in exprs {
            self.renumber_expr(expr);
        }
    }

    fn renumber_function(&mut self, function: &mut Rc<FunctionBody>) {
        let function = Rc::make_mut(function);
        for param in &mut function.params {
            param.id = self.next_id();
        }
        self.renumber_block(&mut function.body);
    }

    fn renumber_expr(&mut self, expr: &mut Expr) {
        expr.id = self.next_id();
        match &mut expr.kind {
            ExprKind::Identifier(_)
            | ExprKind::String(_)
            | ExprKind::Number(_)
            | ExprKind::Boolean(_)
            | ExprKind::Nil
            | ExprKind::VarArgs => {}
            ExprKind::Binary { left, right, .. } => {
                self.renumber_expr(left);
                self.renumber_expr(right);
            }
            ExprKind::Unary { operand, .. } => self.renumber_expr(operand),
            ExprKind::PropertyAccess { base, name } => {
                self.renumber_expr(base);
                name.id = self.next_id();
            }
            ExprKind::ElementAccess { base, key } => {
                self.renumber_expr(base);
                self.renumber_expr(key);
            }
            ExprKind::Call { callee, args } => {
                self.renumber_expr(callee);
                self.renumber_exprs(args);
            }
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                self.renumber_expr(receiver);
                method.id = self.next_id();
                self.renumber_exprs(args);
            }
            ExprKind::Function(function) => self.renumber_function(function),
            ExprKind::Table(fields) => {
                for field in fields {
                    field.id = self.next_id();
                    match &mut field.key {
                        FieldKey::Positional => {}
                        FieldKey::Named(name) => name.id = self.next_id(),
                        FieldKey::Computed(key) => self.renumber_expr(key),
                    }
                    self.renumber_expr(&mut field.value);
                }
            }
            ExprKind::Parenthesized(inner) => self.renumber_expr(inner),
        }
    }

    fn renumber_stmt(&mut self, stmt: &mut Stmt) {
        stmt.id = self.next_id();
        match &mut stmt.kind {
            StmtKind::Assignment { targets, values, .. } => {
                self.renumber_exprs(targets);
                self.renumber_exprs(values);
            }
            StmtKind::Local { names, values } => {
                for name in names {
                    name.id = self.next_id();
                }
                self.renumber_exprs(values);
            }
            StmtKind::Expression(expr) => self.renumber_expr(expr),
            StmtKind::If {
                condition,
                then_body,
                else_body,
            } => {
                self.renumber_expr(condition);
                self.renumber_block(then_body);
                match else_body {
                    Some(ElseBody::If(nested)) => self.renumber_stmt(nested),
                    Some(ElseBody::Block(body)) => self.renumber_block(body),
                    None => {}
                }
            }
            StmtKind::While { condition, body } | StmtKind::Repeat { body, condition } => {
                self.renumber_expr(condition);
                self.renumber_block(body);
            }
            StmtKind::NumericFor {
                variable,
                start,
                limit,
                step,
                body,
            } => {
                variable.id = self.next_id();
                self.renumber_expr(start);
                self.renumber_expr(limit);
                if let Some(step) = step {
                    self.renumber_expr(step);
                }
                self.renumber_block(body);
            }
            StmtKind::GenericFor {
                names,
                iterators,
                body,
            } => {
                for name in names {
                    name.id = self.next_id();
                }
                self.renumber_exprs(iterators);
                self.renumber_block(body);
            }
            StmtKind::Do(body) => self.renumber_block(body),
            StmtKind::Return(values) => self.renumber_exprs(values),
            StmtKind::FunctionDeclaration { target, function } => {
                match target {
                    FunctionTarget::Local(name) => name.id = self.next_id(),
                    FunctionTarget::Assign(expr) => self.renumber_expr(expr),
                }
                self.renumber_function(function);
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Comment(_) | StmtKind::EndOfFile => {}
        }
    }
}
