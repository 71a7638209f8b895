//! Error handling for Scuro

use crate::frontend::ast::SyntaxKind;
use crate::interpreter::{ThreadError, Value};
use crate::utils::Position;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// File name used in diagnostics when the source did not come from a file
pub const DEFAULT_FILE_NAME: &str = "stdin";

/// Any failure produced while lexing, parsing or running a script
#[derive(Error, Debug, Clone)]
pub enum Error {
    // ==================== Lexer Errors ====================
    #[error("{reason}")]
    Lex { reason: String, position: Position },

    // ==================== Parser Errors ====================
    #[error("{message}")]
    Parse {
        message: String,
        /// Text of the offending token (`<eof>` at end of input)
        token: String,
        position: Position,
    },

    // ==================== Runtime Errors ====================
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Thread(#[from] ThreadError),

    // ==================== Tree Errors ====================
    #[error("node #{0} is not attached to a source file")]
    DetachedNode(u32),

    #[error("IO error: {0}")]
    Io(String),
}

/// A runtime failure, positioned at the last AST node the evaluator entered.
#[derive(Error, Debug, Clone)]
#[error("{reason}")]
pub struct RuntimeError {
    pub reason: String,
    pub position: Position,
    pub node: SyntaxKind,
    /// Name of the script that was running
    pub script: Option<String>,
    /// The value passed to `error`, when raised from a script
    pub value: Option<Value>,
}

impl RuntimeError {
    pub fn new(reason: impl Into<String>, node: SyntaxKind, position: Position) -> Self {
        Self {
            reason: reason.into(),
            position,
            node,
            script: None,
            value: None,
        }
    }

    /// The value a protected call hands back to the script
    pub fn to_value(&self) -> Value {
        self.value
            .clone()
            .unwrap_or_else(|| Value::string(self.reason.as_str()))
    }
}

impl Error {
    pub fn lex(reason: impl Into<String>, position: Position) -> Self {
        Self::Lex {
            reason: reason.into(),
            position,
        }
    }

    pub fn parse(message: impl Into<String>, token: impl Into<String>, position: Position) -> Self {
        Self::Parse {
            message: message.into(),
            token: token.into(),
            position,
        }
    }

    /// Get the position associated with this error
    pub fn position(&self) -> Option<Position> {
        match self {
            Self::Lex { position, .. } | Self::Parse { position, .. } => Some(*position),
            Self::Runtime(err) | Self::Thread(ThreadError::Runtime(err)) => Some(err.position),
            Self::Thread(_) | Self::DetachedNode(_) | Self::Io(_) => None,
        }
    }

    /// The script a runtime error was raised in, unless it ran under the
    /// default name
    pub fn script_name(&self) -> Option<&str> {
        match self {
            Self::Runtime(err) | Self::Thread(ThreadError::Runtime(err)) => err
                .script
                .as_deref()
                .filter(|script| *script != DEFAULT_FILE_NAME),
            _ => None,
        }
    }

    /// Render as `<file>:<row>:<column>: <message>` followed by a newline.
    ///
    /// Runtime errors prefer the name of the script they were raised in.
    pub fn render(&self, file_name: &str) -> String {
        let file = self.script_name().unwrap_or(file_name);
        match self.position() {
            Some(pos) => format!("{}:{}:{}: {}\n", file, pos.row, pos.column, self),
            None => format!("{}: {}\n", file, self),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lex_error() {
        let err = Error::lex("unfinished string", Position::new(2, 5, 12));
        assert_eq!(err.render(DEFAULT_FILE_NAME), "stdin:2:5: unfinished string\n");
    }

    #[test]
    fn test_render_runtime_error_prefers_script_name() {
        let mut runtime = RuntimeError::new(
            "attempt to call a nil value",
            SyntaxKind::CallExpression,
            Position::new(1, 1, 0),
        );
        runtime.script = Some("main.lua".to_string());
        let err = Error::from(runtime);
        assert_eq!(err.render("other.lua"), "main.lua:1:1: attempt to call a nil value\n");
    }

    #[test]
    fn test_render_runtime_error_under_default_name() {
        let mut runtime = RuntimeError::new("boom", SyntaxKind::CallExpression, Position::new(3, 7, 20));
        runtime.script = Some(DEFAULT_FILE_NAME.to_string());
        let err = Error::from(runtime);
        assert_eq!(err.script_name(), None);
        assert_eq!(err.render("job.lua"), "job.lua:3:7: boom\n");
    }

    #[test]
    fn test_error_value_defaults_to_reason() {
        let err = RuntimeError::new("boom", SyntaxKind::CallExpression, Position::start());
        assert_eq!(err.to_value().to_string(), "boom");
    }
}
