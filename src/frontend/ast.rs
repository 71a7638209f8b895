//! Abstract Syntax Tree definitions for Scuro
//!
//! Every node carries a [`NodeId`] handed out by the
//! [`NodeFactory`](crate::frontend::factory::NodeFactory), a source
//! [`Position`] and a kind. Children are owned by their parent; the
//! [`SourceFile`] root keeps a side table of parent links keyed by id.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::utils::{Error, Position, Result};

/// Identity of a node, unique within the factory that created it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind tag for every node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    // ==================== Tokens ====================
    PlusToken,
    DashToken,
    AsteriskToken,
    SlashToken,
    PercentToken,
    CaretToken,
    DotDotToken,
    EqualsEqualsToken,
    TildeEqualsToken,
    LessThanToken,
    LessThanEqualsToken,
    GreaterThanToken,
    GreaterThanEqualsToken,
    AndKeyword,
    OrKeyword,
    NotKeyword,
    HashToken,
    EqualsToken,
    PlusEqualsToken,
    DashEqualsToken,
    AsteriskEqualsToken,
    SlashEqualsToken,
    PercentEqualsToken,
    CaretEqualsToken,
    DotDotEqualsToken,

    // ==================== Expressions ====================
    Identifier,
    StringLiteral,
    NumericLiteral,
    TrueKeyword,
    FalseKeyword,
    NilKeyword,
    VarArgsKeyword,
    BinaryExpression,
    UnaryExpression,
    PropertyAccessExpression,
    ElementAccessExpression,
    CallExpression,
    MethodCallExpression,
    FunctionExpression,
    TableExpression,
    ParenthesizedExpression,
    PropertyAssignment,

    // ==================== Statements ====================
    AssignmentStatement,
    VariableDeclaration,
    ExpressionStatement,
    IfStatement,
    WhileStatement,
    RepeatStatement,
    NumericForStatement,
    GenericForStatement,
    DoStatement,
    ReturnStatement,
    BreakStatement,
    ContinueStatement,
    FunctionDeclaration,
    CommentStatement,
    EndOfFileStatement,

    // ==================== Root ====================
    SourceFile,
}

/// The disjoint partitions of [`SyntaxKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCategory {
    Token,
    Expression,
    Statement,
    Root,
}

impl SyntaxKind {
    pub fn category(self) -> NodeCategory {
        use SyntaxKind::*;
        match self {
            PlusToken | DashToken | AsteriskToken | SlashToken | PercentToken | CaretToken
            | DotDotToken | EqualsEqualsToken | TildeEqualsToken | LessThanToken
            | LessThanEqualsToken | GreaterThanToken | GreaterThanEqualsToken | AndKeyword
            | OrKeyword | NotKeyword | HashToken | EqualsToken | PlusEqualsToken
            | DashEqualsToken | AsteriskEqualsToken | SlashEqualsToken | PercentEqualsToken
            | CaretEqualsToken | DotDotEqualsToken => NodeCategory::Token,
            Identifier | StringLiteral | NumericLiteral | TrueKeyword | FalseKeyword
            | NilKeyword | VarArgsKeyword | BinaryExpression | UnaryExpression
            | PropertyAccessExpression | ElementAccessExpression | CallExpression
            | MethodCallExpression | FunctionExpression | TableExpression
            | ParenthesizedExpression | PropertyAssignment => NodeCategory::Expression,
            AssignmentStatement | VariableDeclaration | ExpressionStatement | IfStatement
            | WhileStatement | RepeatStatement | NumericForStatement | GenericForStatement
            | DoStatement | ReturnStatement | BreakStatement | ContinueStatement
            | FunctionDeclaration | CommentStatement | EndOfFileStatement => {
                NodeCategory::Statement
            }
            SourceFile => NodeCategory::Root,
        }
    }

    pub fn is_token(self) -> bool {
        self.category() == NodeCategory::Token
    }

    pub fn is_expression(self) -> bool {
        self.category() == NodeCategory::Expression
    }

    pub fn is_statement(self) -> bool {
        self.category() == NodeCategory::Statement
    }
}

// ==================== Operators ====================

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
}

impl BinaryOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Mod,
            "^" => Self::Pow,
            ".." => Self::Concat,
            "==" => Self::Eq,
            "~=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "and" => Self::And,
            "or" => Self::Or,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "^",
            Self::Concat => "..",
            Self::Eq => "==",
            Self::Ne => "~=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "and",
            Self::Or => "or",
        }
    }

    pub fn syntax_kind(self) -> SyntaxKind {
        match self {
            Self::Add => SyntaxKind::PlusToken,
            Self::Sub => SyntaxKind::DashToken,
            Self::Mul => SyntaxKind::AsteriskToken,
            Self::Div => SyntaxKind::SlashToken,
            Self::Mod => SyntaxKind::PercentToken,
            Self::Pow => SyntaxKind::CaretToken,
            Self::Concat => SyntaxKind::DotDotToken,
            Self::Eq => SyntaxKind::EqualsEqualsToken,
            Self::Ne => SyntaxKind::TildeEqualsToken,
            Self::Lt => SyntaxKind::LessThanToken,
            Self::Le => SyntaxKind::LessThanEqualsToken,
            Self::Gt => SyntaxKind::GreaterThanToken,
            Self::Ge => SyntaxKind::GreaterThanEqualsToken,
            Self::And => SyntaxKind::AndKeyword,
            Self::Or => SyntaxKind::OrKeyword,
        }
    }

    /// Metatable field consulted when the operands don't support the operator
    pub fn metamethod(self) -> Option<&'static str> {
        match self {
            Self::Add => Some("__add"),
            Self::Sub => Some("__sub"),
            Self::Mul => Some("__mul"),
            Self::Div => Some("__div"),
            Self::Mod => Some("__mod"),
            Self::Pow => Some("__pow"),
            Self::Concat => Some("__concat"),
            Self::Eq => Some("__eq"),
            Self::Lt | Self::Gt => Some("__lt"),
            Self::Le | Self::Ge => Some("__le"),
            Self::Ne | Self::And | Self::Or => None,
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod | Self::Pow)
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    /// Arithmetic negation (-)
    Neg,
    /// Logical not
    Not,
    /// Length (#)
    Len,
}

impl UnaryOperator {
    pub fn syntax_kind(self) -> SyntaxKind {
        match self {
            Self::Neg => SyntaxKind::DashToken,
            Self::Not => SyntaxKind::NotKeyword,
            Self::Len => SyntaxKind::HashToken,
        }
    }
}

/// `=` or one of the compound forms such as `+=`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    Assign,
    Compound(BinaryOperator),
}

impl AssignmentOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "=" => Self::Assign,
            "+=" => Self::Compound(BinaryOperator::Add),
            "-=" => Self::Compound(BinaryOperator::Sub),
            "*=" => Self::Compound(BinaryOperator::Mul),
            "/=" => Self::Compound(BinaryOperator::Div),
            "%=" => Self::Compound(BinaryOperator::Mod),
            "^=" => Self::Compound(BinaryOperator::Pow),
            "..=" => Self::Compound(BinaryOperator::Concat),
            _ => return None,
        };
        Some(op)
    }

    pub fn syntax_kind(self) -> SyntaxKind {
        match self {
            Self::Assign => SyntaxKind::EqualsToken,
            Self::Compound(BinaryOperator::Add) => SyntaxKind::PlusEqualsToken,
            Self::Compound(BinaryOperator::Sub) => SyntaxKind::DashEqualsToken,
            Self::Compound(BinaryOperator::Mul) => SyntaxKind::AsteriskEqualsToken,
            Self::Compound(BinaryOperator::Div) => SyntaxKind::SlashEqualsToken,
            Self::Compound(BinaryOperator::Mod) => SyntaxKind::PercentEqualsToken,
            Self::Compound(BinaryOperator::Pow) => SyntaxKind::CaretEqualsToken,
            Self::Compound(_) => SyntaxKind::DotDotEqualsToken,
        }
    }
}

// ==================== Nodes ====================

/// A name occurring in a declaration, parameter list or field access
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub id: NodeId,
    pub position: Position,
    pub name: String,
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub position: Position,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Identifier(String),
    String(String),
    Number(f64),
    Boolean(bool),
    Nil,
    /// `...`
    VarArgs,
    Binary {
        operator: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expr>,
    },
    /// `base.name`
    PropertyAccess { base: Box<Expr>, name: Identifier },
    /// `base[key]`
    ElementAccess { base: Box<Expr>, key: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// `receiver:method(args)`
    MethodCall {
        receiver: Box<Expr>,
        method: Identifier,
        args: Vec<Expr>,
    },
    Function(Rc<FunctionBody>),
    Table(Vec<TableField>),
    Parenthesized(Box<Expr>),
}

/// Parameters and body shared by function expressions and declarations
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    /// Declared name, for diagnostics
    pub name: Option<String>,
    /// Parameter list; methods start with an implicit `self`
    pub params: Vec<Identifier>,
    pub is_vararg: bool,
    pub is_method: bool,
    pub body: Vec<Stmt>,
}

/// One entry of a table constructor
#[derive(Debug, Clone, PartialEq)]
pub struct TableField {
    pub id: NodeId,
    pub position: Position,
    pub key: FieldKey,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKey {
    /// Appended at the next array position
    Positional,
    /// `name = value`
    Named(Identifier),
    /// `[key] = value`
    Computed(Expr),
}

/// Statement node
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub id: NodeId,
    pub position: Position,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Assignment {
        targets: Vec<Expr>,
        operator: AssignmentOperator,
        values: Vec<Expr>,
    },
    /// `local a, b = ...`
    Local {
        names: Vec<Identifier>,
        values: Vec<Expr>,
    },
    Expression(Expr),
    /// `elseif` chains are nested `If` statements in `else_body`
    If {
        condition: Expr,
        then_body: Vec<Stmt>,
        else_body: Option<ElseBody>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    Repeat {
        body: Vec<Stmt>,
        condition: Expr,
    },
    NumericFor {
        variable: Identifier,
        start: Expr,
        limit: Expr,
        step: Option<Expr>,
        body: Vec<Stmt>,
    },
    GenericFor {
        names: Vec<Identifier>,
        iterators: Vec<Expr>,
        body: Vec<Stmt>,
    },
    Do(Vec<Stmt>),
    Return(Vec<Expr>),
    Break,
    Continue,
    FunctionDeclaration {
        target: FunctionTarget,
        function: Rc<FunctionBody>,
    },
    Comment(String),
    EndOfFile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElseBody {
    If(Box<Stmt>),
    Block(Vec<Stmt>),
}

/// Where a `function` statement stores its closure
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionTarget {
    /// `local function name`
    Local(Identifier),
    /// `function name`, `function a.b.c` or `function a.b:c`
    Assign(Expr),
}

impl Expr {
    pub fn syntax_kind(&self) -> SyntaxKind {
        match &self.kind {
            ExprKind::Identifier(_) => SyntaxKind::Identifier,
            ExprKind::String(_) => SyntaxKind::StringLiteral,
            ExprKind::Number(_) => SyntaxKind::NumericLiteral,
            ExprKind::Boolean(true) => SyntaxKind::TrueKeyword,
            ExprKind::Boolean(false) => SyntaxKind::FalseKeyword,
            ExprKind::Nil => SyntaxKind::NilKeyword,
            ExprKind::VarArgs => SyntaxKind::VarArgsKeyword,
            ExprKind::Binary { .. } => SyntaxKind::BinaryExpression,
            ExprKind::Unary { .. } => SyntaxKind::UnaryExpression,
            ExprKind::PropertyAccess { .. } => SyntaxKind::PropertyAccessExpression,
            ExprKind::ElementAccess { .. } => SyntaxKind::ElementAccessExpression,
            ExprKind::Call { .. } => SyntaxKind::CallExpression,
            ExprKind::MethodCall { .. } => SyntaxKind::MethodCallExpression,
            ExprKind::Function(_) => SyntaxKind::FunctionExpression,
            ExprKind::Table(_) => SyntaxKind::TableExpression,
            ExprKind::Parenthesized(_) => SyntaxKind::ParenthesizedExpression,
        }
    }

    /// Calls and `...` may produce any number of values
    pub fn is_multi_value(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Call { .. } | ExprKind::MethodCall { .. } | ExprKind::VarArgs
        )
    }

    pub fn is_call(&self) -> bool {
        matches!(self.kind, ExprKind::Call { .. } | ExprKind::MethodCall { .. })
    }

    /// Whether the expression can appear on the left of `=`
    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Identifier(_) | ExprKind::PropertyAccess { .. } | ExprKind::ElementAccess { .. }
        )
    }
}

impl Stmt {
    pub fn syntax_kind(&self) -> SyntaxKind {
        match &self.kind {
            StmtKind::Assignment { .. } => SyntaxKind::AssignmentStatement,
            StmtKind::Local { .. } => SyntaxKind::VariableDeclaration,
            StmtKind::Expression(_) => SyntaxKind::ExpressionStatement,
            StmtKind::If { .. } => SyntaxKind::IfStatement,
            StmtKind::While { .. } => SyntaxKind::WhileStatement,
            StmtKind::Repeat { .. } => SyntaxKind::RepeatStatement,
            StmtKind::NumericFor { .. } => SyntaxKind::NumericForStatement,
            StmtKind::GenericFor { .. } => SyntaxKind::GenericForStatement,
            StmtKind::Do(_) => SyntaxKind::DoStatement,
            StmtKind::Return(_) => SyntaxKind::ReturnStatement,
            StmtKind::Break => SyntaxKind::BreakStatement,
            StmtKind::Continue => SyntaxKind::ContinueStatement,
            StmtKind::FunctionDeclaration { .. } => SyntaxKind::FunctionDeclaration,
            StmtKind::Comment(_) => SyntaxKind::CommentStatement,
            StmtKind::EndOfFile => SyntaxKind::EndOfFileStatement,
        }
    }
}

// ==================== Traversal ====================

/// A borrowed view of any node in the tree
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    SourceFile(&'a SourceFile),
    Stmt(&'a Stmt),
    Expr(&'a Expr),
    Identifier(&'a Identifier),
    Field(&'a TableField),
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        match self {
            Self::SourceFile(n) => n.id,
            Self::Stmt(n) => n.id,
            Self::Expr(n) => n.id,
            Self::Identifier(n) => n.id,
            Self::Field(n) => n.id,
        }
    }

    pub fn kind(&self) -> SyntaxKind {
        match self {
            Self::SourceFile(_) => SyntaxKind::SourceFile,
            Self::Stmt(n) => n.syntax_kind(),
            Self::Expr(n) => n.syntax_kind(),
            Self::Identifier(_) => SyntaxKind::Identifier,
            Self::Field(_) => SyntaxKind::PropertyAssignment,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Self::SourceFile(_) => Position::start(),
            Self::Stmt(n) => n.position,
            Self::Expr(n) => n.position,
            Self::Identifier(n) => n.position,
            Self::Field(n) => n.position,
        }
    }

    /// Direct children in source order
    pub fn children(&self) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        match *self {
            Self::SourceFile(file) => out.extend(file.statements.iter().map(NodeRef::Stmt)),
            Self::Identifier(_) => {}
            Self::Field(field) => {
                match &field.key {
                    FieldKey::Positional => {}
                    FieldKey::Named(name) => out.push(NodeRef::Identifier(name)),
                    FieldKey::Computed(key) => out.push(NodeRef::Expr(key)),
                }
                out.push(NodeRef::Expr(&field.value));
            }
            Self::Expr(expr) => match &expr.kind {
                ExprKind::Identifier(_)
                | ExprKind::String(_)
                | ExprKind::Number(_)
                | ExprKind::Boolean(_)
                | ExprKind::Nil
                | ExprKind::VarArgs => {}
                ExprKind::Binary { left, right, .. } => {
                    out.push(NodeRef::Expr(left));
                    out.push(NodeRef::Expr(right));
                }
                ExprKind::Unary { operand, .. } => out.push(NodeRef::Expr(operand)),
                ExprKind::PropertyAccess { base, name } => {
                    out.push(NodeRef::Expr(base));
                    out.push(NodeRef::Identifier(name));
                }
                ExprKind::ElementAccess { base, key } => {
                    out.push(NodeRef::Expr(base));
                    out.push(NodeRef::Expr(key));
                }
                ExprKind::Call { callee, args } => {
                    out.push(NodeRef::Expr(callee));
                    out.extend(args.iter().map(NodeRef::Expr));
                }
                ExprKind::MethodCall {
                    receiver,
                    method,
                    args,
                } => {
                    out.push(NodeRef::Expr(receiver));
                    out.push(NodeRef::Identifier(method));
                    out.extend(args.iter().map(NodeRef::Expr));
                }
                ExprKind::Function(function) => push_function(&mut out, function),
                ExprKind::Table(fields) => out.extend(fields.iter().map(NodeRef::Field)),
                ExprKind::Parenthesized(inner) => out.push(NodeRef::Expr(inner)),
            },
            Self::Stmt(stmt) => match &stmt.kind {
                StmtKind::Assignment {
                    targets, values, ..
                } => {
                    out.extend(targets.iter().map(NodeRef::Expr));
                    out.extend(values.iter().map(NodeRef::Expr));
                }
                StmtKind::Local { names, values } => {
                    out.extend(names.iter().map(NodeRef::Identifier));
                    out.extend(values.iter().map(NodeRef::Expr));
                }
                StmtKind::Expression(expr) => out.push(NodeRef::Expr(expr)),
                StmtKind::If {
                    condition,
                    then_body,
                    else_body,
                } => {
                    out.push(NodeRef::Expr(condition));
                    out.extend(then_body.iter().map(NodeRef::Stmt));
                    match else_body {
                        Some(ElseBody::If(nested)) => out.push(NodeRef::Stmt(nested)),
                        Some(ElseBody::Block(body)) => out.extend(body.iter().map(NodeRef::Stmt)),
                        None => {}
                    }
                }
                StmtKind::While { condition, body } => {
                    out.push(NodeRef::Expr(condition));
                    out.extend(body.iter().map(NodeRef::Stmt));
                }
                StmtKind::Repeat { body, condition } => {
                    out.extend(body.iter().map(NodeRef::Stmt));
                    out.push(NodeRef::Expr(condition));
                }
                StmtKind::NumericFor {
                    variable,
                    start,
                    limit,
                    step,
                    body,
                } => {
                    out.push(NodeRef::Identifier(variable));
                    out.push(NodeRef::Expr(start));
                    out.push(NodeRef::Expr(limit));
                    if let Some(step) = step {
                        out.push(NodeRef::Expr(step));
                    }
                    out.extend(body.iter().map(NodeRef::Stmt));
                }
                StmtKind::GenericFor {
                    names,
                    iterators,
                    body,
                } => {
                    out.extend(names.iter().map(NodeRef::Identifier));
                    out.extend(iterators.iter().map(NodeRef::Expr));
                    out.extend(body.iter().map(NodeRef::Stmt));
                }
                StmtKind::Do(body) => out.extend(body.iter().map(NodeRef::Stmt)),
                StmtKind::Return(values) => out.extend(values.iter().map(NodeRef::Expr)),
                StmtKind::FunctionDeclaration { target, function } => {
                    match target {
                        FunctionTarget::Local(name) => out.push(NodeRef::Identifier(name)),
                        FunctionTarget::Assign(expr) => out.push(NodeRef::Expr(expr)),
                    }
                    push_function(&mut out, function);
                }
                StmtKind::Break | StmtKind::Continue | StmtKind::Comment(_) | StmtKind::EndOfFile => {}
            },
        }
        out
    }
}

fn push_function<'a>(out: &mut Vec<NodeRef<'a>>, function: &'a FunctionBody) {
    out.extend(function.params.iter().map(NodeRef::Identifier));
    out.extend(function.body.iter().map(NodeRef::Stmt));
}

// ==================== Source file ====================

/// Root of a parsed script
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub id: NodeId,
    pub file_name: String,
    /// Top-level statements, terminated by an `EndOfFile` statement
    pub statements: Vec<Stmt>,
    parents: HashMap<NodeId, NodeId>,
}

impl SourceFile {
    /// Build the root and record the parent of every node below it
    pub fn new(id: NodeId, file_name: impl Into<String>, statements: Vec<Stmt>) -> Self {
        let mut file = Self {
            id,
            file_name: file_name.into(),
            statements,
            parents: HashMap::new(),
        };
        file.parents = collect_parents(NodeRef::SourceFile(&file));
        file
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    /// Walk parent links from `id` up to this file.
    ///
    /// Fails when the node is not attached to this file.
    pub fn get_source_file(&self, id: NodeId) -> Result<&SourceFile> {
        let mut current = id;
        loop {
            if current == self.id {
                return Ok(self);
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return Err(Error::DetachedNode(id.0)),
            }
        }
    }

    /// Number of nodes below the root
    pub fn node_count(&self) -> usize {
        self.parents.len()
    }

    /// Statements excluding the trailing `EndOfFile` marker
    pub fn body(&self) -> &[Stmt] {
        match self.statements.last() {
            Some(Stmt {
                kind: StmtKind::EndOfFile,
                ..
            }) => &self.statements[..self.statements.len() - 1],
            _ => &self.statements,
        }
    }
}

fn collect_parents(root: NodeRef<'_>) -> HashMap<NodeId, NodeId> {
    let mut parents = HashMap::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        for child in node.children() {
            parents.insert(child.id(), node.id());
            stack.push(child);
        }
    }
    parents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_partitions_are_disjoint() {
        assert!(SyntaxKind::PlusToken.is_token());
        assert!(SyntaxKind::CallExpression.is_expression());
        assert!(!SyntaxKind::CallExpression.is_statement());
        assert!(SyntaxKind::ContinueStatement.is_statement());
        assert_eq!(SyntaxKind::SourceFile.category(), NodeCategory::Root);
        assert_eq!(SyntaxKind::PropertyAssignment.category(), NodeCategory::Expression);
    }

    #[test]
    fn test_operator_symbols_round_trip() {
        for symbol in ["+", "-", "*", "/", "%", "^", "..", "==", "~=", "<", "<=", ">", ">=", "and", "or"] {
            let op = BinaryOperator::from_symbol(symbol).unwrap();
            assert_eq!(op.symbol(), symbol);
            assert!(op.syntax_kind().is_token());
        }
        assert_eq!(BinaryOperator::from_symbol("="), None);
    }

    #[test]
    fn test_compound_assignment_operators() {
        assert_eq!(
            AssignmentOperator::from_symbol("..="),
            Some(AssignmentOperator::Compound(BinaryOperator::Concat))
        );
        assert_eq!(
            AssignmentOperator::from_symbol("..=").unwrap().syntax_kind(),
            SyntaxKind::DotDotEqualsToken
        );
        assert_eq!(AssignmentOperator::Assign.syntax_kind(), SyntaxKind::EqualsToken);
    }

    #[test]
    fn test_comparison_metamethods() {
        assert_eq!(BinaryOperator::Gt.metamethod(), Some("__lt"));
        assert_eq!(BinaryOperator::Ge.metamethod(), Some("__le"));
        assert_eq!(BinaryOperator::Ne.metamethod(), None);
    }
}
