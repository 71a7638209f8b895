//! Scuro command line
//!
//! Runs, checks or tokenizes script files.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;
use std::thread;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use log::debug;

use scuro::feedback::RunFeedback;
use scuro::frontend::lexer::Lexer;
use scuro::frontend::token::{Token, TokenKind};
use scuro::interpreter::Scheduler;
use scuro::{parse_source, Interpreter, InterpreterOptions};

/// Deep recursion in scripts recurses in the evaluator too
const STACK_SIZE: usize = 64 * 1024 * 1024;

/// Native stack the evaluator may use on the worker thread
const STACK_BUDGET: usize = 48 * 1024 * 1024;

/// Scuro script interpreter
#[derive(Parser, Debug)]
#[command(name = "scuro")]
#[command(version)]
#[command(about = "Scuro - an embeddable Lua-family scripting engine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Script to run
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a script
    Run {
        input: PathBuf,

        /// Print a JSON run report instead of plain diagnostics
        #[arg(long)]
        json: bool,

        /// Print the JSON report on one line
        #[arg(long, requires = "json")]
        compact: bool,

        /// Execute through the cooperative thread scheduler
        #[arg(long)]
        scheduled: bool,

        /// Nested calls allowed before `stack overflow`
        #[arg(long, default_value_t = 200)]
        max_call_depth: usize,
    },
    /// Check a script for syntax errors without running it
    Check {
        input: PathBuf,

        #[arg(long)]
        json: bool,

        #[arg(long, requires = "json")]
        compact: bool,
    },
    /// Print the token stream of a script
    Tokens { input: PathBuf },
    /// Print version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let worker = thread::Builder::new()
        .name("scuro".to_string())
        .stack_size(STACK_SIZE)
        .spawn(move || dispatch(cli))
        .context("failed to start interpreter thread")?;
    let succeeded = worker
        .join()
        .map_err(|_| anyhow!("interpreter thread panicked"))??;

    if !succeeded {
        process::exit(1);
    }
    Ok(())
}

/// Returns whether the command succeeded
fn dispatch(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Some(Commands::Run {
            input,
            json,
            compact,
            scheduled,
            max_call_depth,
        }) => run_file(&input, Report::select(json, compact), scheduled, max_call_depth),
        Some(Commands::Check { input, json, compact }) => check_file(&input, Report::select(json, compact)),
        Some(Commands::Tokens { input }) => print_tokens(&input),
        Some(Commands::Version) => {
            println!("scuro {}", env!("CARGO_PKG_VERSION"));
            println!("License: {}", env!("CARGO_PKG_LICENSE"));
            Ok(true)
        }
        None => match cli.input {
            Some(input) => run_file(&input, None, false, 200),
            None => {
                eprintln!("Error: No input file specified");
                eprintln!("Usage: scuro <FILE> or scuro run <FILE>");
                Ok(false)
            }
        },
    }
}

/// JSON report layout
#[derive(Debug, Clone, Copy)]
enum Report {
    Pretty,
    Compact,
}

impl Report {
    fn select(json: bool, compact: bool) -> Option<Self> {
        match (json, compact) {
            (false, _) => None,
            (true, false) => Some(Self::Pretty),
            (true, true) => Some(Self::Compact),
        }
    }

    fn print(self, feedback: &RunFeedback) {
        match self {
            Self::Pretty => println!("{}", feedback.to_json()),
            Self::Compact => println!("{}", feedback.to_json_compact()),
        }
    }
}

fn read_source(input: &Path) -> anyhow::Result<(String, String)> {
    let source = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    Ok((source, input.display().to_string()))
}

fn run_file(input: &Path, report: Option<Report>, scheduled: bool, max_call_depth: usize) -> anyhow::Result<bool> {
    let (source, file_name) = read_source(input)?;
    let mut interpreter = Interpreter::with_options(InterpreterOptions {
        max_call_depth,
        max_stack_bytes: STACK_BUDGET,
        file_name: file_name.clone(),
    });

    if let Some(report) = report {
        let feedback = RunFeedback::analyze(&source, &file_name, Some(&mut interpreter));
        report.print(&feedback);
        return Ok(feedback.success);
    }

    let outcome = if scheduled {
        run_scheduled(&mut interpreter, &source, &file_name)
    } else {
        interpreter.run(&source).map(|_| ())
    };
    match outcome {
        Ok(()) => Ok(true),
        Err(err) => {
            eprint!("{}", err.render(&file_name));
            Ok(false)
        }
    }
}

fn run_scheduled(interpreter: &mut Interpreter, source: &str, file_name: &str) -> scuro::Result<()> {
    let file = Rc::new(parse_source(source, file_name)?);
    let mut scheduler = Scheduler::new();
    scheduler.spawn(file);
    let ticks = scheduler.run(interpreter)?;
    debug!("{} finished after {} ticks", file_name, ticks);
    Ok(())
}

fn check_file(input: &Path, report: Option<Report>) -> anyhow::Result<bool> {
    let (source, file_name) = read_source(input)?;
    let feedback = RunFeedback::analyze(&source, &file_name, None);

    if let Some(report) = report {
        report.print(&feedback);
    } else if feedback.success {
        println!(
            "{}: ok ({} statements)",
            file_name, feedback.stats.statement_count
        );
    } else {
        for report in &feedback.diagnostics {
            match &report.location {
                Some(loc) => eprintln!("{}:{}:{}: {}", loc.file, loc.line, loc.column, report.message),
                None => eprintln!("{}: {}", file_name, report.message),
            }
        }
    }
    Ok(feedback.success)
}

fn print_tokens(input: &Path) -> anyhow::Result<bool> {
    let (source, file_name) = read_source(input)?;
    let tokens = match Lexer::new(&source).tokenize() {
        Ok(tokens) => tokens,
        Err(err) => {
            eprint!("{}", err.render(&file_name));
            return Ok(false);
        }
    };
    for token in &tokens {
        println!("{}", describe(token));
    }
    Ok(true)
}

fn describe(token: &Token) -> String {
    let kind = match &token.kind {
        TokenKind::Whitespace => "whitespace",
        TokenKind::Comment => "comment",
        TokenKind::String(_) => "string",
        TokenKind::Number => "number",
        TokenKind::Keyword => "keyword",
        TokenKind::Identifier => "identifier",
        TokenKind::Symbol => "symbol",
        TokenKind::Eof => "eof",
    };
    format!("{:>4}:{:<3} {:<10} {}", token.position.row, token.position.column, kind, token.describe())
}
