mod ast;
mod config;
mod env;
mod error;
mod interpreter;
mod parser;
mod resolver;
mod scanner;
mod token;
mod value;

use clap::Parser as ClapParser;
use config::{REPL_PROMPT, WELCOME_MESSAGE, WELCOME_SUBTITLE};
use error::ErrorSink;
use interpreter::Interpreter;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

/// A tree-walking interpreter for Lox
#[derive(ClapParser, Debug)]
#[command(name = "lox")]
#[command(version = config::VERSION)]
#[command(about = "A tree-walking interpreter for the Lox language")]
struct CliArgs {
    /// Script file to execute (optional - if not provided, starts REPL)
    #[arg(value_name = "FILE")]
    script: Vec<PathBuf>,
}

const EX_USAGE: u8 = 64;
const EX_DATAERR: u8 = 65;
const EX_SOFTWARE: u8 = 70;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    match args.script.as_slice() {
        [] => {
            run_prompt();
            ExitCode::SUCCESS
        }
        [path] => run_file(path),
        _ => {
            eprintln!("Usage: lox [script]");
            ExitCode::from(EX_USAGE)
        }
    }
}

fn run_file(path: &PathBuf) -> ExitCode {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            eprintln!("Cannot read script file {}: {err}", path.display());
            return ExitCode::from(EX_USAGE);
        }
    };

    let sink = ErrorSink::new();
    let statements = compile(&contents, &sink);

    if sink.had_static_error() {
        return ExitCode::from(EX_DATAERR);
    }

    let locals = resolver::resolve(&statements, &sink);
    if sink.had_static_error() {
        return ExitCode::from(EX_DATAERR);
    }

    let interpreter = Interpreter::new(locals);
    if let Err(err) = interpreter.interpret(&statements) {
        sink.runtime_error(&err);
        return ExitCode::from(EX_SOFTWARE);
    }

    ExitCode::SUCCESS
}

fn run_prompt() {
    let config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<(), _> = match Editor::with_config(config) {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Failed to initialize REPL: {err}");
            return;
        }
    };

    let history_file = ".lox_history";
    let _ = rl.load_history(history_file);

    println!("{WELCOME_MESSAGE}");
    println!("{WELCOME_SUBTITLE}");

    let sink = ErrorSink::new();
    let globals = Interpreter::new_globals();

    loop {
        match rl.readline(REPL_PROMPT) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                sink.reset();
                let statements = compile(&line, &sink);
                if sink.had_static_error() {
                    continue;
                }

                let locals = resolver::resolve(&statements, &sink);
                if sink.had_static_error() {
                    continue;
                }

                let interpreter = Interpreter::with_globals(Rc::clone(&globals), locals);
                if let Err(err) = interpreter.interpret(&statements) {
                    sink.runtime_error(&err);
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        }
    }

    let _ = rl.save_history(history_file);
}

fn compile(source: &str, sink: &ErrorSink) -> Vec<ast::Stmt> {
    let tokens = scanner::scan(source, sink);
    parser::parse(&tokens, sink)
}
