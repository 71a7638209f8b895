//! Parser for Scuro
//!
//! Recursive descent parser with precedence climbing for expressions.

use std::rc::Rc;

use crate::frontend::ast::*;
use crate::frontend::factory::NodeFactory;
use crate::frontend::lexer::{parse_number, Lexer};
use crate::frontend::token::{Token, TokenKind, UNARY_PRIORITY};
use crate::utils::{Error, Position, Result, DEFAULT_FILE_NAME};

/// What kind of construct a block belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Plain,
    Loop,
    Function { vararg: bool },
}

/// Nested blocks and subexpressions allowed in one chunk
pub const MAX_SYNTAX_LEVELS: usize = 200;

/// The parser. A parser instance is consumed by [`Parser::parse`].
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    factory: NodeFactory,
    blocks: Vec<BlockKind>,
    /// Current block and subexpression nesting
    levels: usize,
    file_name: String,
}

impl Parser {
    /// Create a new parser from a lexer
    pub fn new(lexer: Lexer) -> Result<Self> {
        Ok(Self::from_tokens(lexer.tokenize()?))
    }

    /// Create a parser from pre-tokenized input
    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        if !tokens.last().is_some_and(Token::is_eof) {
            let end = tokens.last().map(|t| t.position).unwrap_or_else(Position::start);
            tokens.push(Token::eof(end));
        }
        Self {
            tokens,
            pos: 0,
            factory: NodeFactory::new(),
            blocks: Vec::new(),
            levels: 0,
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check_symbol(&self, symbol: &str) -> bool {
        self.current().is_symbol(symbol)
    }

    fn check_keyword(&self, word: &str) -> bool {
        self.current().is_keyword(word)
    }

    fn consume_symbol(&mut self, symbol: &str) -> bool {
        if self.check_symbol(symbol) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume_keyword(&mut self, word: &str) -> bool {
        if self.check_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<Token> {
        if self.check_symbol(symbol) {
            Ok(self.advance())
        } else {
            Err(self.error_near(format!("`{}` expected", symbol)))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<Token> {
        if self.check_keyword(word) {
            Ok(self.advance())
        } else {
            Err(self.error_near(format!("`{}` expected", word)))
        }
    }

    fn expect_identifier(&mut self) -> Result<Identifier> {
        if self.current().kind == TokenKind::Identifier {
            let token = self.advance();
            Ok(self.factory.identifier(token.value, token.position))
        } else {
            Err(self.error_near("<name> expected"))
        }
    }

    /// Build a parse error pointing at the current token
    fn error_near(&self, message: impl Into<String>) -> Error {
        let token = self.current();
        let near = match token.kind {
            TokenKind::Eof => "<eof>".to_string(),
            _ => format!("`{}`", token.value),
        };
        Error::parse(
            format!("{} near {}", message.into(), near),
            token.describe(),
            token.position,
        )
    }

    fn enter_level(&mut self) -> Result<()> {
        if self.levels >= MAX_SYNTAX_LEVELS {
            return Err(self.error_near("chunk has too many syntax levels"));
        }
        self.levels += 1;
        Ok(())
    }

    fn block_follows(&self) -> bool {
        let token = self.current();
        token.is_eof()
            || token.is_keyword("end")
            || token.is_keyword("else")
            || token.is_keyword("elseif")
            || token.is_keyword("until")
    }

    fn in_loop(&self) -> bool {
        for kind in self.blocks.iter().rev() {
            match kind {
                BlockKind::Loop => return true,
                BlockKind::Function { .. } => return false,
                BlockKind::Plain => {}
            }
        }
        false
    }

    fn in_vararg_function(&self) -> bool {
        for kind in self.blocks.iter().rev() {
            if let BlockKind::Function { vararg } = kind {
                return *vararg;
            }
        }
        true
    }

    // ==================== Parsing Methods ====================

    /// Parse a complete source file
    pub fn parse(mut self) -> Result<SourceFile> {
        let statements = self.parse_block(BlockKind::Function { vararg: true })?;
        if !self.current().is_eof() {
            return Err(self.error_near("<eof> expected"));
        }
        let end = self.current().position;
        log::debug!("parsed {} top-level statements in {}", statements.len(), self.file_name);
        let file_name = std::mem::take(&mut self.file_name);
        Ok(self.factory.source_file(file_name, statements, end))
    }

    fn parse_block(&mut self, kind: BlockKind) -> Result<Vec<Stmt>> {
        self.enter_level()?;
        self.blocks.push(kind);
        let result = self.parse_statement_list();
        self.blocks.pop();
        self.levels -= 1;
        result
    }

    fn parse_statement_list(&mut self) -> Result<Vec<Stmt>> {
        let mut statements = Vec::new();
        loop {
            while self.consume_symbol(";") {}
            if self.block_follows() {
                break;
            }
            let stmt = self.parse_statement()?;
            let terminal = matches!(
                stmt.kind,
                StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue
            );
            statements.push(stmt);
            if terminal {
                while self.consume_symbol(";") {}
                if !self.block_follows() {
                    return Err(self.error_near("`end` expected"));
                }
                break;
            }
        }
        Ok(statements)
    }

    /// Parse a statement, dispatching on its first keyword
    fn parse_statement(&mut self) -> Result<Stmt> {
        let token = self.current().clone();
        if token.kind != TokenKind::Keyword {
            return self.parse_assignment_or_call();
        }
        match token.value.as_str() {
            "if" => self.parse_if(),
            "while" => self.parse_while(),
            "do" => {
                self.advance();
                let body = self.parse_block(BlockKind::Plain)?;
                self.expect_keyword("end")?;
                Ok(self.factory.stmt(StmtKind::Do(body), token.position))
            }
            "for" => self.parse_for(),
            "repeat" => self.parse_repeat(),
            "function" => self.parse_function_declaration(),
            "local" => self.parse_local(),
            "return" => self.parse_return(),
            "break" | "continue" => {
                if !self.in_loop() {
                    return Err(self.error_near(format!(
                        "{} statement must be inside a loop",
                        token.value
                    )));
                }
                self.advance();
                let kind = if token.value == "break" {
                    StmtKind::Break
                } else {
                    StmtKind::Continue
                };
                Ok(self.factory.stmt(kind, token.position))
            }
            _ => self.parse_assignment_or_call(),
        }
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let mut clauses = Vec::new();
        let position = self.expect_keyword("if")?.position;
        let condition = self.parse_expression()?;
        self.expect_keyword("then")?;
        let body = self.parse_block(BlockKind::Plain)?;
        clauses.push((condition, body, position));

        while self.check_keyword("elseif") {
            let position = self.advance().position;
            let condition = self.parse_expression()?;
            self.expect_keyword("then")?;
            let body = self.parse_block(BlockKind::Plain)?;
            clauses.push((condition, body, position));
        }

        let mut else_body = if self.consume_keyword("else") {
            Some(ElseBody::Block(self.parse_block(BlockKind::Plain)?))
        } else {
            None
        };
        self.expect_keyword("end")?;

        // Fold `elseif` clauses from the right into nested if statements
        loop {
            let (condition, then_body, position) = clauses
                .pop()
                .ok_or_else(|| self.error_near("`if` expected"))?;
            let stmt = self.factory.stmt(
                StmtKind::If {
                    condition,
                    then_body,
                    else_body,
                },
                position,
            );
            if clauses.is_empty() {
                return Ok(stmt);
            }
            else_body = Some(ElseBody::If(Box::new(stmt)));
        }
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        let position = self.expect_keyword("while")?.position;
        let condition = self.parse_expression()?;
        self.expect_keyword("do")?;
        let body = self.parse_block(BlockKind::Loop)?;
        self.expect_keyword("end")?;
        Ok(self.factory.stmt(StmtKind::While { condition, body }, position))
    }

    fn parse_repeat(&mut self) -> Result<Stmt> {
        let position = self.expect_keyword("repeat")?.position;
        let body = self.parse_block(BlockKind::Loop)?;
        self.expect_keyword("until")?;
        let condition = self.parse_expression()?;
        Ok(self.factory.stmt(StmtKind::Repeat { body, condition }, position))
    }

    /// Numeric and generic `for`, told apart by the `=` after the first name
    fn parse_for(&mut self) -> Result<Stmt> {
        let position = self.expect_keyword("for")?.position;
        let first = self.expect_identifier()?;

        if self.consume_symbol("=") {
            let start = self.parse_expression()?;
            self.expect_symbol(",")?;
            let limit = self.parse_expression()?;
            let step = if self.consume_symbol(",") {
                Some(self.parse_expression()?)
            } else {
                None
            };
            self.expect_keyword("do")?;
            let body = self.parse_block(BlockKind::Loop)?;
            self.expect_keyword("end")?;
            return Ok(self.factory.stmt(
                StmtKind::NumericFor {
                    variable: first,
                    start,
                    limit,
                    step,
                    body,
                },
                position,
            ));
        }

        if !self.check_symbol(",") && !self.check_keyword("in") {
            return Err(self.error_near("`=` or `in` expected"));
        }
        let mut names = vec![first];
        while self.consume_symbol(",") {
            names.push(self.expect_identifier()?);
        }
        self.expect_keyword("in")?;
        let iterators = self.parse_expression_list()?;
        self.expect_keyword("do")?;
        let body = self.parse_block(BlockKind::Loop)?;
        self.expect_keyword("end")?;
        Ok(self.factory.stmt(
            StmtKind::GenericFor {
                names,
                iterators,
                body,
            },
            position,
        ))
    }

    /// `function a.b.c:m(...) ... end`
    fn parse_function_declaration(&mut self) -> Result<Stmt> {
        let position = self.expect_keyword("function")?.position;
        let first = self.expect_identifier()?;
        let mut full_name = first.name.clone();
        let mut target = self.factory.expr(ExprKind::Identifier(first.name), first.position);
        let mut is_method = false;

        loop {
            let separator = if self.check_symbol(".") {
                "."
            } else if self.check_symbol(":") {
                ":"
            } else {
                break;
            };
            self.advance();
            let name = self.expect_identifier()?;
            full_name.push_str(separator);
            full_name.push_str(&name.name);
            let base_position = target.position;
            target = self.factory.expr(
                ExprKind::PropertyAccess {
                    base: Box::new(target),
                    name,
                },
                base_position,
            );
            if separator == ":" {
                is_method = true;
                break;
            }
        }

        let function = self.parse_function_body(Some(full_name), is_method, position)?;
        Ok(self.factory.stmt(
            StmtKind::FunctionDeclaration {
                target: FunctionTarget::Assign(target),
                function,
            },
            position,
        ))
    }

    fn parse_local(&mut self) -> Result<Stmt> {
        let position = self.expect_keyword("local")?.position;

        if self.consume_keyword("function") {
            let name = self.expect_identifier()?;
            let function = self.parse_function_body(Some(name.name.clone()), false, position)?;
            return Ok(self.factory.stmt(
                StmtKind::FunctionDeclaration {
                    target: FunctionTarget::Local(name),
                    function,
                },
                position,
            ));
        }

        let mut names = vec![self.expect_identifier()?];
        while self.consume_symbol(",") {
            names.push(self.expect_identifier()?);
        }
        let values = if self.consume_symbol("=") {
            self.parse_expression_list()?
        } else {
            Vec::new()
        };
        Ok(self.factory.stmt(StmtKind::Local { names, values }, position))
    }

    fn parse_return(&mut self) -> Result<Stmt> {
        let position = self.expect_keyword("return")?.position;
        let values = if self.block_follows() || self.check_symbol(";") {
            Vec::new()
        } else {
            self.parse_expression_list()?
        };
        Ok(self.factory.stmt(StmtKind::Return(values), position))
    }

    /// A suffixed expression followed by `,` or an assignment operator is an
    /// assignment; otherwise it must be a call.
    fn parse_assignment_or_call(&mut self) -> Result<Stmt> {
        let position = self.current().position;
        let expr = self.parse_suffixed_expression()?;

        if !self.check_symbol(",") && !self.current().is_assignment_operator() {
            if expr.is_call() {
                return Ok(self.factory.stmt(StmtKind::Expression(expr), position));
            }
            return Err(self.error_near("`=` expected"));
        }

        let mut targets = vec![expr];
        while self.consume_symbol(",") {
            targets.push(self.parse_suffixed_expression()?);
        }
        for target in &targets {
            if matches!(target.kind, ExprKind::Parenthesized(_)) {
                return Err(Error::parse(
                    "cannot assign to parenthesized expression",
                    "(",
                    target.position,
                ));
            }
            if !target.is_assignable() {
                return Err(Error::parse(
                    "cannot assign to this expression",
                    "",
                    target.position,
                ));
            }
        }

        let operator = match AssignmentOperator::from_symbol(&self.current().value) {
            Some(op) if self.current().kind == TokenKind::Symbol => op,
            _ => return Err(self.error_near("`=` expected")),
        };
        self.advance();
        if operator != AssignmentOperator::Assign && targets.len() != 1 {
            return Err(Error::parse(
                "compound assignment expects a single target",
                "",
                position,
            ));
        }

        let values = self.parse_expression_list()?;
        if operator != AssignmentOperator::Assign && values.len() != 1 {
            return Err(Error::parse(
                "compound assignment expects a single value",
                "",
                position,
            ));
        }
        Ok(self.factory.stmt(
            StmtKind::Assignment {
                targets,
                operator,
                values,
            },
            position,
        ))
    }

    // ==================== Expressions ====================

    fn parse_expression_list(&mut self) -> Result<Vec<Expr>> {
        let mut exprs = vec![self.parse_expression()?];
        while self.consume_symbol(",") {
            exprs.push(self.parse_expression()?);
        }
        Ok(exprs)
    }

    pub fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_sub_expression(0)
    }

    fn parse_sub_expression(&mut self, limit: u8) -> Result<Expr> {
        self.enter_level()?;
        let result = self.parse_binary_chain(limit);
        self.levels -= 1;
        result
    }

    /// Precedence climbing: keep consuming binary operators whose left
    /// binding power exceeds `limit`.
    fn parse_binary_chain(&mut self, limit: u8) -> Result<Expr> {
        let mut left = if self.current().is_unary_operator() {
            let token = self.advance();
            let operator = match token.value.as_str() {
                "not" => UnaryOperator::Not,
                "#" => UnaryOperator::Len,
                _ => UnaryOperator::Neg,
            };
            let operand = self.parse_sub_expression(UNARY_PRIORITY)?;
            self.factory.expr(
                ExprKind::Unary {
                    operator,
                    operand: Box::new(operand),
                },
                token.position,
            )
        } else {
            self.parse_simple_expression()?
        };

        while let Some((left_power, right_power)) = self.current().binary_precedence() {
            if left_power <= limit {
                break;
            }
            let token = self.advance();
            let operator = BinaryOperator::from_symbol(&token.value)
                .ok_or_else(|| Error::parse("unknown binary operator", token.value.clone(), token.position))?;
            let right = self.parse_sub_expression(right_power)?;
            left = self.factory.binary(operator, left, right);
        }
        Ok(left)
    }

    fn parse_simple_expression(&mut self) -> Result<Expr> {
        let token = self.current().clone();
        let kind = match &token.kind {
            TokenKind::Number => match parse_number(&token.value) {
                Some(value) => ExprKind::Number(value),
                None => return Err(self.error_near("malformed number")),
            },
            TokenKind::String(constant) => ExprKind::String(constant.clone()),
            TokenKind::Keyword => match token.value.as_str() {
                "nil" => ExprKind::Nil,
                "true" => ExprKind::Boolean(true),
                "false" => ExprKind::Boolean(false),
                "function" => {
                    self.advance();
                    let function = self.parse_function_body(None, false, token.position)?;
                    return Ok(self.factory.expr(ExprKind::Function(function), token.position));
                }
                _ => return self.parse_suffixed_expression(),
            },
            TokenKind::Symbol if token.value == "..." => {
                if !self.in_vararg_function() {
                    return Err(self.error_near("cannot use `...` outside a vararg function"));
                }
                ExprKind::VarArgs
            }
            TokenKind::Symbol if token.value == "{" => return self.parse_table(),
            _ => return self.parse_suffixed_expression(),
        };
        self.advance();
        Ok(self.factory.expr(kind, token.position))
    }

    fn parse_primary_expression(&mut self) -> Result<Expr> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Identifier => {
                self.advance();
                Ok(self.factory.expr(ExprKind::Identifier(token.value), token.position))
            }
            TokenKind::Symbol if token.value == "(" => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect_symbol(")")?;
                Ok(self.factory.expr(ExprKind::Parenthesized(Box::new(inner)), token.position))
            }
            _ => Err(self.error_near("unexpected symbol")),
        }
    }

    /// Primary expression followed by any chain of `.name`, `[key]`,
    /// `:name(args)` and call suffixes
    fn parse_suffixed_expression(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary_expression()?;
        loop {
            let token = self.current().clone();
            match &token.kind {
                TokenKind::Symbol if token.value == "." => {
                    self.advance();
                    let name = self.expect_identifier()?;
                    expr = self.factory.expr(
                        ExprKind::PropertyAccess {
                            base: Box::new(expr),
                            name,
                        },
                        token.position,
                    );
                }
                TokenKind::Symbol if token.value == "[" => {
                    self.advance();
                    let key = self.parse_expression()?;
                    self.expect_symbol("]")?;
                    expr = self.factory.expr(
                        ExprKind::ElementAccess {
                            base: Box::new(expr),
                            key: Box::new(key),
                        },
                        token.position,
                    );
                }
                TokenKind::Symbol if token.value == ":" => {
                    self.advance();
                    let method = self.expect_identifier()?;
                    let args = self.parse_call_arguments()?;
                    expr = self.factory.expr(
                        ExprKind::MethodCall {
                            receiver: Box::new(expr),
                            method,
                            args,
                        },
                        token.position,
                    );
                }
                TokenKind::String(_) => {
                    let args = self.parse_call_arguments()?;
                    expr = self.make_call(expr, args, token.position);
                }
                TokenKind::Symbol if token.value == "(" || token.value == "{" => {
                    let args = self.parse_call_arguments()?;
                    expr = self.make_call(expr, args, token.position);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn make_call(&mut self, callee: Expr, args: Vec<Expr>, position: Position) -> Expr {
        self.factory.expr(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            position,
        )
    }

    /// `(a, b)`, `"literal"` or `{ table }`
    fn parse_call_arguments(&mut self) -> Result<Vec<Expr>> {
        let token = self.current().clone();
        match &token.kind {
            TokenKind::String(constant) => {
                self.advance();
                Ok(vec![self.factory.expr(ExprKind::String(constant.clone()), token.position)])
            }
            TokenKind::Symbol if token.value == "{" => Ok(vec![self.parse_table()?]),
            TokenKind::Symbol if token.value == "(" => {
                self.advance();
                if self.consume_symbol(")") {
                    return Ok(Vec::new());
                }
                let args = self.parse_expression_list()?;
                self.expect_symbol(")")?;
                Ok(args)
            }
            _ => Err(self.error_near("function arguments expected")),
        }
    }

    /// `(params) body end`, with an implicit `self` for methods
    fn parse_function_body(
        &mut self,
        name: Option<String>,
        is_method: bool,
        position: Position,
    ) -> Result<Rc<FunctionBody>> {
        let open = self.expect_symbol("(")?;
        let mut params = Vec::new();
        if is_method {
            params.push(self.factory.identifier("self", open.position));
        }
        let mut is_vararg = false;
        if !self.check_symbol(")") {
            loop {
                if self.consume_symbol("...") {
                    is_vararg = true;
                    break;
                }
                params.push(self.expect_identifier()?);
                if !self.consume_symbol(",") {
                    break;
                }
            }
        }
        self.expect_symbol(")")?;

        let body = self.parse_block(BlockKind::Function { vararg: is_vararg })?;
        self.expect_keyword("end")?;
        log::trace!(
            "parsed function {} at {}",
            name.as_deref().unwrap_or("<anonymous>"),
            position
        );
        Ok(Rc::new(FunctionBody {
            name,
            params,
            is_vararg,
            is_method,
            body,
        }))
    }

    /// `{ [k] = v, name = v, v; ... }`
    fn parse_table(&mut self) -> Result<Expr> {
        let position = self.expect_symbol("{")?.position;
        let mut fields = Vec::new();

        while !self.check_symbol("}") {
            let field_position = self.current().position;
            let field = if self.consume_symbol("[") {
                let key = self.parse_expression()?;
                self.expect_symbol("]")?;
                self.expect_symbol("=")?;
                let value = self.parse_expression()?;
                self.factory.field(FieldKey::Computed(key), value, field_position)
            } else if self.current().kind == TokenKind::Identifier && self.peek(1).is_symbol("=") {
                let name = self.expect_identifier()?;
                self.advance();
                let value = self.parse_expression()?;
                self.factory.field(FieldKey::Named(name), value, field_position)
            } else {
                let value = self.parse_expression()?;
                self.factory.field(FieldKey::Positional, value, field_position)
            };
            fields.push(field);

            if !self.consume_symbol(",") && !self.consume_symbol(";") {
                break;
            }
        }
        self.expect_symbol("}")?;
        Ok(self.factory.expr(ExprKind::Table(fields), position))
    }
}

/// Tokenize and parse `source` in one step
pub fn parse_source(source: &str, file_name: &str) -> Result<SourceFile> {
    Parser::new(Lexer::new(source))?
        .with_file_name(file_name)
        .parse()
}
