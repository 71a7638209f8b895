//! Scuro - an embeddable Lua-family scripting engine
//!
//! Source text goes through the [`frontend`] (text stream, lexer, parser)
//! into an AST that the tree-walking [`interpreter`] executes against a set
//! of [`stdlib`] host functions.
//!
//! ```
//! let values = scuro::run_source("return 1 + 2", "example.lua").unwrap();
//! assert_eq!(values[0].as_number(), Some(3.0));
//! ```

pub mod feedback;
pub mod frontend;
pub mod interpreter;
pub mod stdlib;
pub mod utils;

pub use frontend::parser::parse_source;
pub use interpreter::{Interpreter, InterpreterOptions, OutputBuffer, Value};
pub use utils::{Error, Position, Result, RuntimeError};

/// Parse and run `source` in a fresh interpreter with the standard library,
/// returning the values of a top-level `return`.
pub fn run_source(source: &str, file_name: &str) -> Result<Vec<Value>> {
    let mut interpreter = Interpreter::with_options(InterpreterOptions {
        file_name: file_name.to_string(),
        ..InterpreterOptions::default()
    });
    interpreter.run(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_source_reports_file_name() {
        let err = run_source("local a\nlocal b = a + 1", "sum.lua").unwrap_err();
        assert_eq!(
            err.render("ignored"),
            "sum.lua:2:11: attempt to perform arithmetic on a nil value\n"
        );
    }
}
