//! Cooperative threads
//!
//! A [`Thread`] runs a loaded script one top-level statement at a time, and
//! a [`Scheduler`] interleaves several of them round robin. Nothing here is
//! preemptive: each `step` runs a whole statement to completion.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::{debug, trace};
use thiserror::Error;

use crate::frontend::ast::SourceFile;
use crate::interpreter::eval::Flow;
use crate::interpreter::scope::{Scope, ScopeRef};
use crate::interpreter::value::Value;
use crate::interpreter::Interpreter;
use crate::utils::RuntimeError;

pub type ThreadRef = Rc<RefCell<Thread>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Running,
    Suspended,
    Dead,
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Running => "running",
            Self::Suspended => "suspended",
            Self::Dead => "dead",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug, Clone)]
pub enum ThreadError {
    #[error("cannot resume dead thread")]
    ResumeDead,
    #[error("cannot resume non-suspended thread")]
    ResumeRunning,
    #[error("cannot suspend {0} thread")]
    Suspend(ThreadStatus),
    #[error("cannot step {0} thread")]
    Step(ThreadStatus),
    #[error("thread has not finished")]
    NotFinished,
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

pub struct Thread {
    file: Rc<SourceFile>,
    scope: ScopeRef,
    next_statement: usize,
    status: ThreadStatus,
    returned: Vec<Value>,
}

impl Thread {
    /// A running thread positioned at the first statement of `file`
    pub fn new(file: Rc<SourceFile>) -> Self {
        let scope = Scope::new();
        scope.set_var_args(Vec::new());
        let status = if file.body().is_empty() {
            ThreadStatus::Dead
        } else {
            ThreadStatus::Running
        };
        Self {
            file,
            scope,
            next_statement: 0,
            status,
            returned: Vec::new(),
        }
    }

    pub fn into_ref(self) -> ThreadRef {
        Rc::new(RefCell::new(self))
    }

    pub fn status(&self) -> ThreadStatus {
        self.status
    }

    pub fn file_name(&self) -> &str {
        &self.file.file_name
    }

    /// Execute the next top-level statement.
    ///
    /// Does nothing once the interpreter has recorded an error.
    pub fn step(&mut self, interpreter: &mut Interpreter) -> Result<(), ThreadError> {
        if interpreter.has_error() {
            return Ok(());
        }
        if self.status != ThreadStatus::Running {
            return Err(ThreadError::Step(self.status));
        }

        let file = Rc::clone(&self.file);
        let Some(stmt) = file.body().get(self.next_statement) else {
            self.status = ThreadStatus::Dead;
            return Ok(());
        };
        self.next_statement += 1;
        trace!("{}: statement {}", self.file.file_name, self.next_statement);

        match interpreter.entered(|interpreter| interpreter.exec_statement(stmt, &self.scope)) {
            Ok(Flow::Return(values)) => {
                self.returned = values;
                self.status = ThreadStatus::Dead;
            }
            Ok(_) => {
                if self.next_statement >= file.body().len() {
                    self.status = ThreadStatus::Dead;
                }
            }
            Err(err) => {
                self.status = ThreadStatus::Dead;
                return Err(interpreter.fail(err, &file.file_name).into());
            }
        }
        Ok(())
    }

    pub fn suspend(&mut self) -> Result<(), ThreadError> {
        match self.status {
            ThreadStatus::Running => {
                self.status = ThreadStatus::Suspended;
                Ok(())
            }
            other => Err(ThreadError::Suspend(other)),
        }
    }

    pub fn resume(&mut self) -> Result<(), ThreadError> {
        match self.status {
            ThreadStatus::Suspended => {
                self.status = ThreadStatus::Running;
                Ok(())
            }
            ThreadStatus::Dead => Err(ThreadError::ResumeDead),
            ThreadStatus::Running => Err(ThreadError::ResumeRunning),
        }
    }

    /// Values of the `return` that ended the thread
    pub fn returned_values(&self) -> Result<&[Value], ThreadError> {
        match self.status {
            ThreadStatus::Dead => Ok(&self.returned),
            _ => Err(ThreadError::NotFinished),
        }
    }
}

/// Round-robin driver for cooperative threads
#[derive(Default)]
pub struct Scheduler {
    threads: Vec<ThreadRef>,
    cursor: usize,
    ticks: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new thread for `file`
    pub fn spawn(&mut self, file: Rc<SourceFile>) -> ThreadRef {
        let thread = Thread::new(file).into_ref();
        self.threads.push(Rc::clone(&thread));
        thread
    }

    pub fn add(&mut self, thread: ThreadRef) {
        self.threads.push(thread);
    }

    pub fn threads(&self) -> &[ThreadRef] {
        &self.threads
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Whether any thread can still make progress
    pub fn has_runnable(&self) -> bool {
        self.threads
            .iter()
            .any(|t| t.borrow().status() == ThreadStatus::Running)
    }

    /// Advance exactly one runnable thread by one statement. Returns whether
    /// work remains; always `false` once the interpreter has an error.
    pub fn tick(&mut self, interpreter: &mut Interpreter) -> Result<bool, ThreadError> {
        if interpreter.has_error() {
            debug!("scheduler halted by error after {} ticks", self.ticks);
            return Ok(false);
        }

        let count = self.threads.len();
        let next = (0..count)
            .map(|offset| (self.cursor + offset) % count)
            .find(|&i| self.threads[i].borrow().status() == ThreadStatus::Running);
        let Some(index) = next else {
            return Ok(false);
        };

        self.cursor = (index + 1) % count;
        self.ticks += 1;
        trace!("tick {}: thread {}", self.ticks, index);
        let thread = Rc::clone(&self.threads[index]);
        thread.borrow_mut().step(interpreter)?;

        Ok(!interpreter.has_error() && self.has_runnable())
    }

    /// Tick until no thread can run. Returns the number of ticks taken.
    pub fn run(&mut self, interpreter: &mut Interpreter) -> Result<u64, ThreadError> {
        let start = self.ticks;
        while self.tick(interpreter)? {}
        debug!("scheduler idle after {} ticks", self.ticks - start);
        Ok(self.ticks - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse_source;
    use crate::interpreter::{InterpreterOptions, OutputBuffer};

    fn file(source: &str, name: &str) -> Rc<SourceFile> {
        Rc::new(parse_source(source, name).unwrap())
    }

    #[test]
    fn test_step_runs_one_statement() {
        let mut interpreter = Interpreter::new();
        let mut thread = Thread::new(file("a = 1 a = a + 1 return a * 10", "t.lua"));

        thread.step(&mut interpreter).unwrap();
        assert_eq!(interpreter.get_global("a").as_number(), Some(1.0));
        assert_eq!(thread.status(), ThreadStatus::Running);
        assert!(thread.returned_values().is_err());

        thread.step(&mut interpreter).unwrap();
        thread.step(&mut interpreter).unwrap();
        assert_eq!(thread.status(), ThreadStatus::Dead);
        assert_eq!(thread.returned_values().unwrap()[0].as_number(), Some(20.0));
    }

    #[test]
    fn test_locals_persist_between_steps() {
        let mut interpreter = Interpreter::new();
        let mut thread = Thread::new(file("local x = 5 return x", "t.lua"));
        thread.step(&mut interpreter).unwrap();
        thread.step(&mut interpreter).unwrap();
        assert_eq!(thread.returned_values().unwrap()[0].as_number(), Some(5.0));
    }

    #[test]
    fn test_resume_rules() {
        let mut interpreter = Interpreter::new();
        let mut thread = Thread::new(file("x = 1", "t.lua"));
        assert!(matches!(thread.resume(), Err(ThreadError::ResumeRunning)));
        thread.suspend().unwrap();
        assert!(matches!(thread.step(&mut interpreter), Err(ThreadError::Step(_))));
        thread.resume().unwrap();
        thread.step(&mut interpreter).unwrap();
        assert_eq!(thread.status(), ThreadStatus::Dead);
        let err = thread.resume().unwrap_err();
        assert_eq!(err.to_string(), "cannot resume dead thread");
    }

    #[test]
    fn test_scheduler_interleaves_round_robin() {
        let buffer = OutputBuffer::new();
        let mut interpreter = Interpreter::new().with_output(buffer.clone());
        let mut scheduler = Scheduler::new();
        scheduler.spawn(file("print('a1') print('a2')", "a.lua"));
        scheduler.spawn(file("print('b1') print('b2')", "b.lua"));

        let ticks = scheduler.run(&mut interpreter).unwrap();
        assert_eq!(ticks, 4);
        assert_eq!(buffer.contents(), "a1\nb1\na2\nb2\n");
    }

    #[test]
    fn test_scheduler_skips_suspended_threads() {
        let buffer = OutputBuffer::new();
        let mut interpreter = Interpreter::new().with_output(buffer.clone());
        let mut scheduler = Scheduler::new();
        let paused = scheduler.spawn(file("print('paused')", "p.lua"));
        scheduler.spawn(file("print('running')", "r.lua"));
        paused.borrow_mut().suspend().unwrap();

        scheduler.run(&mut interpreter).unwrap();
        assert_eq!(buffer.contents(), "running\n");
        assert!(!scheduler.has_runnable());
    }

    #[test]
    fn test_scheduler_stops_on_error() {
        let buffer = OutputBuffer::new();
        let mut interpreter =
            Interpreter::with_options(InterpreterOptions::default()).with_output(buffer.clone());
        let mut scheduler = Scheduler::new();
        scheduler.spawn(file("error('boom') print('never')", "bad.lua"));
        scheduler.spawn(file("print('x') print('y')", "good.lua"));

        let err = scheduler.tick(&mut interpreter).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(interpreter.has_error());
        assert!(!scheduler.tick(&mut interpreter).unwrap());
        assert_eq!(buffer.contents(), "");
    }
}
