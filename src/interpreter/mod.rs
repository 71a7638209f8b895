//! Tree-walking interpreter
//!
//! Executes a parsed [`SourceFile`] against a global table and a chain of
//! lexical scopes. Runtime failures are reported as [`RuntimeError`]s
//! positioned at the last node the evaluator entered.

mod eval;
mod operators;
pub mod scope;
pub mod table;
pub mod thread;
pub mod value;

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

use log::{debug, error, info};

use crate::frontend::ast::{SourceFile, SyntaxKind};
use crate::frontend::parser::parse_source;
use crate::stdlib;
use crate::utils::{Position, Result, RuntimeError, DEFAULT_FILE_NAME};

pub(crate) use eval::Flow;
pub use scope::{Scope, ScopeRef};
pub use table::{Table, TableError, TableRef};
pub use thread::{Scheduler, Thread, ThreadError, ThreadRef, ThreadStatus};
pub use value::{Address, Callable, Function, NativeFn, Userdata, Value};

/// Interpreter configuration
///
/// The evaluator recurses on the host thread's stack: every script call and
/// nested expression uses native stack frames. `max_stack_bytes` bounds that
/// use and must leave headroom below the stack size of the thread running
/// the interpreter. The default suits a thread spawned with the standard
/// 2 MiB stack. Hosts that raise `max_stack_bytes` should run the
/// interpreter on a thread built with a larger `stack_size`.
#[derive(Debug, Clone)]
pub struct InterpreterOptions {
    /// Nested calls allowed before raising `stack overflow`
    pub max_call_depth: usize,
    /// Native stack the evaluator may use before raising `stack overflow`
    pub max_stack_bytes: usize,
    /// Name reported in diagnostics
    pub file_name: String,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 200,
            max_stack_bytes: 1024 * 1024,
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }
}

/// An in-memory output sink that can be inspected after running a script
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer(Rc<RefCell<Vec<u8>>>);

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Interpreter {
    globals: TableRef,
    /// Table consulted when indexing string values
    string_library: Option<TableRef>,
    options: InterpreterOptions,
    last_kind: SyntaxKind,
    last_position: Position,
    call_depth: usize,
    /// Stack address where the outermost evaluation entered
    stack_base: Option<usize>,
    has_error: bool,
    output: Box<dyn Write>,
    started: Instant,
}

impl Interpreter {
    /// An interpreter with the standard library installed
    pub fn new() -> Self {
        Self::with_options(InterpreterOptions::default())
    }

    pub fn with_options(options: InterpreterOptions) -> Self {
        let mut interpreter = Self::bare(options);
        stdlib::install(&mut interpreter);
        interpreter
    }

    /// An interpreter with an empty global table
    pub fn bare(options: InterpreterOptions) -> Self {
        Self {
            globals: Table::new().into_ref(),
            string_library: None,
            options,
            last_kind: SyntaxKind::SourceFile,
            last_position: Position::unknown(),
            call_depth: 0,
            stack_base: None,
            has_error: false,
            output: Box::new(io::stdout()),
            started: Instant::now(),
        }
    }

    /// Send `print` output somewhere other than stdout
    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn options(&self) -> &InterpreterOptions {
        &self.options
    }

    // ==================== Globals ====================

    pub fn globals(&self) -> &TableRef {
        &self.globals
    }

    pub fn get_global(&self, name: &str) -> Value {
        self.globals.borrow().get_str(name)
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.borrow_mut().set_str(name, value);
    }

    /// Expose a host function as a global
    pub fn register(
        &mut self,
        name: &str,
        func: impl Fn(&mut Interpreter, Vec<Value>) -> std::result::Result<Vec<Value>, RuntimeError> + 'static,
    ) {
        self.set_global(name, Value::function(Function::native(name, func)));
    }

    pub(crate) fn set_string_library(&mut self, library: TableRef) {
        self.string_library = Some(library);
    }

    // ==================== Running ====================

    /// Parse and run `source` under the configured file name
    pub fn run(&mut self, source: &str) -> Result<Vec<Value>> {
        let file = parse_source(source, &self.options.file_name)?;
        Ok(self.load(&file)?)
    }

    /// Run every top-level statement of `file` in a fresh root scope and
    /// return the values of a top-level `return`.
    pub fn load(&mut self, file: &SourceFile) -> std::result::Result<Vec<Value>, RuntimeError> {
        info!("running {} ({} statements)", file.file_name, file.body().len());
        let scope = Scope::new();
        scope.set_var_args(Vec::new());
        self.call_depth = 0;

        match self.entered(|this| this.exec_statements(file.body(), &scope)) {
            Ok(Flow::Return(values)) => Ok(values),
            Ok(_) => Ok(Vec::new()),
            Err(err) => Err(self.fail(err, &file.file_name)),
        }
    }

    /// Call a script or host function
    pub fn call(&mut self, function: &Value, args: Vec<Value>) -> std::result::Result<Vec<Value>, RuntimeError> {
        self.entered(|this| this.call_value(function, args))
    }

    /// Run `f` with native stack use measured from here. Nested entries
    /// keep the outermost base.
    pub(crate) fn entered<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        if self.stack_base.is_some() {
            return f(self);
        }
        self.stack_base = Some(stack_address());
        let result = f(self);
        self.stack_base = None;
        result
    }

    /// Fail once the evaluator has used more native stack than allowed
    pub(crate) fn check_stack(&self) -> std::result::Result<(), RuntimeError> {
        match self.stack_base {
            Some(base) if base.abs_diff(stack_address()) > self.options.max_stack_bytes => {
                Err(self.error("stack overflow"))
            }
            _ => Ok(()),
        }
    }

    /// Record an error that escaped to the host
    pub(crate) fn fail(&mut self, mut err: RuntimeError, script: &str) -> RuntimeError {
        self.has_error = true;
        if err.script.is_none() {
            err.script = Some(script.to_string());
        }
        error!("{}:{}: {}", script, err.position, err.reason);
        err
    }

    /// Whether an error has escaped to the host since the last reset
    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub fn clear_error(&mut self) {
        self.has_error = false;
    }

    // ==================== Host services ====================

    /// A runtime error at the node currently being evaluated
    pub fn error(&self, reason: impl Into<String>) -> RuntimeError {
        RuntimeError::new(reason, self.last_kind, self.last_position)
    }

    /// The last node the evaluator entered
    pub fn last_node(&self) -> (SyntaxKind, Position) {
        (self.last_kind, self.last_position)
    }

    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    /// Time since the interpreter was created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Write to the output sink
    pub fn write_output(&mut self, text: &str) -> std::result::Result<(), RuntimeError> {
        self.output
            .write_all(text.as_bytes())
            .and_then(|_| self.output.flush())
            .map_err(|err| {
                debug!("output failed: {}", err);
                self.error(format!("cannot write output: {}", err))
            })
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Address of a local in the calling frame
#[inline(always)]
fn stack_address() -> usize {
    let marker = 0u8;
    std::ptr::addr_of!(marker) as usize
}
