mod ast_printer;
mod expr;
mod interpreter;
mod lox_callable;
mod lox_class;
mod lox_function;
mod lox_instance;
mod native;
mod object;
mod parser;
mod scanner;
mod stmt;
mod token;
mod token_type;

use std::{env, fs::File, path::Path, sync::Arc};

use ast_printer::AstPrinter;
use expr::ExprId;
use interpreter::{Interpreter, resolver::Resolver};
use object::Object;
use parser::Parser;
use scanner::Scanner;
use snafu::prelude::*;
use token::Token;
use tracing::{instrument, level_filters::LevelFilter, trace};
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    let mut lox = Lox::new();
    let code = match args.len() {
        len if len > 2 => {
            println!("Usage: rlox [script]");
            64
        }
        2 => lox.run_file(&args[1]),
        _ => lox.run_prompt(),
    };
    std::process::exit(code);
}

fn init_tracing() {
    let format = format!("{}=debug", env!("CARGO_CRATE_NAME"));
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| format.into());
    let mut layers = Vec::new();
    let stdout = tracing_subscriber::fmt::layer()
        .with_line_number(true)
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(filter)
        .boxed();
    layers.push(stdout);

    // Full trace log as JSON, when a ./logs directory exists to hold it
    if let Ok(file) = File::create("./logs/log.json") {
        let file_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .without_time()
            .with_writer(Arc::new(file))
            .json()
            .with_span_list(false)
            .flatten_event(true)
            .with_current_span(false)
            .with_filter(LevelFilter::TRACE)
            .boxed();
        layers.push(file_layer);
    }

    tracing_subscriber::Registry::default().with(layers).init();
}

struct Lox {
    had_error: bool,
    had_runtime_error: bool,
    interpreter: Interpreter,
    /// High-water mark for expression ids, carried across REPL lines so the
    /// interpreter's side-table never sees a reused id.
    next_expr_id: ExprId,
}

impl Lox {
    pub fn new() -> Lox {
        Self {
            had_error: false,
            had_runtime_error: false,
            interpreter: Interpreter::new(),
            next_expr_id: 0,
        }
    }

    pub fn run_file<T: AsRef<Path> + Into<String>>(&mut self, script_path: T) -> i32 {
        let script = std::fs::read_to_string(&script_path)
            .context(FileSnafu { path: script_path.into() })
            .expect("Cannot read file");

        if let Err(e) = self.run(script) {
            eprintln!("{e}");
        }

        if self.had_error {
            65
        } else if self.had_runtime_error {
            70
        } else {
            0
        }
    }

    pub fn run_prompt(&mut self) -> i32 {
        let mut rl = rustyline::DefaultEditor::new().expect("Could not build REPL");
        loop {
            match rl.readline("> ") {
                Err(_) => return 0,
                Ok(line) => {
                    if line.is_empty() {
                        return 0;
                    }
                    let _ = rl.add_history_entry(&line);
                    let _ = self.run(line).inspect_err(|e| {
                        eprintln!("{e}");
                    });
                    // A bad line doesn't poison the session
                    self.had_error = false;
                }
            }
        }
    }

    #[instrument(skip(self, script))]
    fn run(&mut self, script: String) -> Result<()> {
        let scanner = Scanner::new(script);
        let tokens = scanner.scan_tokens().inspect_err(|_| {
            self.had_error = true;
        })?;

        let mut parser = Parser::new(tokens);
        parser.continue_ids_from(self.next_expr_id);
        let parsed = parser.parse();
        self.next_expr_id = parser.next_id();
        let statements = parsed.inspect_err(|_| {
            self.had_error = true;
        })?;

        let printer = AstPrinter {};
        trace!(program = %printer.print_program(&statements), "Parsed");

        let mut resolver = Resolver::new(&mut self.interpreter);
        trace!("Resolving vars");
        resolver.resolve_all(&statements).inspect_err(|_| {
            self.had_error = true;
        })?;

        self.interpreter.interpret(statements).inspect_err(|_| {
            self.had_runtime_error = true;
        })?;
        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum LoxError {
    #[snafu(display("[Line {line}] Error {whence}: {message}"))]
    Parsing { line: usize, whence: String, message: String },
    #[snafu(display("Could not read source file at '{path}'"))]
    File { source: std::io::Error, path: String },
    #[snafu(display("Fatal error, exiting"))]
    Fatal,
    #[snafu(display("{message}\n [line {line}]"))]
    Runtime { message: String, line: usize },
    #[snafu(display("Internal error: {message}"))]
    Internal { message: String },
    /// Not an error: carries a `return` value up to its call frame.
    #[snafu(display("Unwinding 'return' (internal signal)"))]
    Return { value: Object },
    #[snafu(whatever, display("Static analysis failed: {message}"))]
    Resolver {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
        #[snafu(implicit)]
        loc: snafu::Location,
    },
}

impl LoxError {
    /// A runtime diagnostic anchored to the offending token's line.
    pub fn runtime(token: &Token, message: impl Into<String>) -> LoxError {
        LoxError::Runtime {
            message: message.into(),
            line: token.line,
        }
    }
}

type Result<T> = std::result::Result<T, LoxError>;
