//! Structured diagnostics
//!
//! JSON-serializable reports for tools that drive the interpreter and want
//! machine-readable results instead of the `<file>:<row>:<col>: msg` text.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::frontend::lexer::Lexer;
use crate::frontend::parser::Parser;
use crate::interpreter::{Interpreter, ThreadError};
use crate::utils::Error;

// ==================== Report Types ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Stable error code (`L0001`, `P0001`, `R0001`, `E9999`)
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

/// Outcome of checking or running one script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFeedback {
    pub success: bool,
    pub source_file: String,
    pub diagnostics: Vec<ErrorReport>,
    pub stats: RunStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub token_count: usize,
    pub statement_count: usize,
    pub lex_time_ms: u64,
    pub parse_time_ms: u64,
    /// Zero when the script was only checked
    pub run_time_ms: u64,
}

// ==================== Error Conversion ====================

impl ErrorReport {
    pub fn from_error(error: &Error, file_name: &str) -> Self {
        let code = match error {
            Error::Lex { .. } => "L0001",
            Error::Parse { .. } => "P0001",
            Error::Runtime(_) | Error::Thread(ThreadError::Runtime(_)) => "R0001",
            Error::Thread(_) | Error::DetachedNode(_) | Error::Io(_) => "E9999",
        };
        let file = error.script_name().unwrap_or(file_name);
        Self {
            code: code.to_string(),
            severity: Severity::Error,
            message: error.to_string(),
            location: error
                .position()
                .filter(|p| p.is_known())
                .map(|p| Location {
                    file: file.to_string(),
                    line: p.row,
                    column: p.column,
                }),
        }
    }
}

impl RunFeedback {
    pub fn success(source_file: String, stats: RunStats) -> Self {
        Self {
            success: true,
            source_file,
            diagnostics: vec![],
            stats,
        }
    }

    pub fn failure(source_file: String, errors: Vec<ErrorReport>, stats: RunStats) -> Self {
        Self {
            success: false,
            source_file,
            diagnostics: errors,
            stats,
        }
    }

    /// Lex and parse `source`, then run it when an interpreter is given,
    /// timing each phase.
    pub fn analyze(source: &str, file_name: &str, interpreter: Option<&mut Interpreter>) -> Self {
        let mut stats = RunStats::default();

        let started = Instant::now();
        let tokens = match Lexer::new(source).tokenize() {
            Ok(tokens) => tokens,
            Err(err) => return Self::failed(&err, file_name, stats),
        };
        stats.lex_time_ms = started.elapsed().as_millis() as u64;
        stats.token_count = tokens.len();

        let started = Instant::now();
        let file = match Parser::from_tokens(tokens).with_file_name(file_name).parse() {
            Ok(file) => file,
            Err(err) => return Self::failed(&err, file_name, stats),
        };
        stats.parse_time_ms = started.elapsed().as_millis() as u64;
        stats.statement_count = file.body().len();

        if let Some(interpreter) = interpreter {
            let started = Instant::now();
            let outcome = interpreter.load(&file);
            stats.run_time_ms = started.elapsed().as_millis() as u64;
            if let Err(err) = outcome {
                return Self::failed(&Error::Runtime(err), file_name, stats);
            }
        }
        Self::success(file_name.to_string(), stats)
    }

    fn failed(error: &Error, file_name: &str, stats: RunStats) -> Self {
        Self::failure(
            file_name.to_string(),
            vec![ErrorReport::from_error(error, file_name)],
            stats,
        )
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Output as compact JSON (for programmatic use)
    pub fn to_json_compact(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::OutputBuffer;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_check_only_counts_statements() {
        let feedback = RunFeedback::analyze("local x = 1\nprint(x)", "ok.lua", None);
        assert!(feedback.success);
        assert_eq!(feedback.stats.statement_count, 2);
        assert!(feedback.stats.token_count > 5);
        assert_eq!(feedback.stats.run_time_ms, 0);
    }

    #[test]
    fn test_lex_error_report() {
        let feedback = RunFeedback::analyze("x = 'open", "bad.lua", None);
        assert!(!feedback.success);
        let report = &feedback.diagnostics[0];
        assert_eq!(report.code, "L0001");
        assert_eq!(report.severity, Severity::Error);
        assert_eq!(report.location.as_ref().map(|l| l.line), Some(1));
    }

    #[test]
    fn test_parse_error_names_token() {
        let feedback = RunFeedback::analyze("if x print(1) end", "bad.lua", None);
        let report = &feedback.diagnostics[0];
        assert_eq!(report.code, "P0001");
        assert!(report.message.starts_with("`then` expected"), "{}", report.message);
        assert!(report.message.contains("near"));
    }

    #[test]
    fn test_runtime_error_report() {
        let mut interpreter = Interpreter::new().with_output(OutputBuffer::new());
        let feedback = RunFeedback::analyze("local t = nil\nreturn t.x", "rt.lua", Some(&mut interpreter));
        let report = &feedback.diagnostics[0];
        assert_eq!(report.code, "R0001");
        assert_eq!(report.message, "attempt to index a nil value");
        assert_eq!(
            report.location,
            Some(Location {
                file: "rt.lua".to_string(),
                line: 2,
                column: 9,
            })
        );
    }

    #[test]
    fn test_json_shape() {
        let feedback = RunFeedback::analyze("return", "empty.lua", None);
        let json: serde_json::Value = serde_json::from_str(&feedback.to_json()).unwrap();
        assert_eq!(json["success"], serde_json::json!(true));
        assert_eq!(json["source_file"], serde_json::json!("empty.lua"));
        assert!(json["diagnostics"].as_array().unwrap().is_empty());
        let compact = feedback.to_json_compact();
        assert!(!compact.contains('\n'));
    }
}
