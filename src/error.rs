// ABOUTME: Error sink and error types shared across the scan/parse/resolve/evaluate pipeline

use crate::token::{Token, TokenKind};
use std::cell::Cell;
use thiserror::Error;

/// A runtime error: type mismatches, wrong arity, undefined variables and
/// properties. Unwinds the evaluator back to the top-level `interpret` call.
///
/// This is distinct from the non-local `return` control-flow signal (see
/// `interpreter::Flow`) — `return` is not an error and never constructs one
/// of these.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
    pub line: usize,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        RuntimeError {
            message: message.into(),
            line,
        }
    }

    pub fn at(token: &Token, message: impl Into<String>) -> Self {
        RuntimeError::new(message, token.line)
    }
}

/// Accumulates static errors (scan/parse/resolve) and the runtime error flag,
/// and owns the exact stderr formatting the language spec mandates.
///
/// The batch driver reads `had_static_error`/`had_runtime_error` after
/// running the pipeline to choose an exit code (§6). In REPL mode the
/// static flag is reset between lines so one bad line doesn't poison the
/// session.
#[derive(Debug, Default)]
pub struct ErrorSink {
    had_static_error: Cell<bool>,
    had_runtime_error: Cell<bool>,
}

impl ErrorSink {
    pub fn new() -> Self {
        ErrorSink::default()
    }

    /// Report a scan error, which has no token to anchor a location on.
    pub fn error(&self, line: usize, message: &str) {
        self.report(line, "", message);
    }

    /// Report a parse or resolve error anchored at a specific token.
    pub fn error_at(&self, token: &Token, message: &str) {
        let location = if token.kind == TokenKind::Eof {
            " at end".to_string()
        } else {
            format!(" at '{}'", token.lexeme)
        };
        self.report(token.line, &location, message);
    }

    fn report(&self, line: usize, location: &str, message: &str) {
        eprintln!("[line {line}] Error{location}: {message}");
        self.had_static_error.set(true);
    }

    pub fn runtime_error(&self, error: &RuntimeError) {
        eprintln!("{}\n[line {}]", error.message, error.line);
        self.had_runtime_error.set(true);
    }

    pub fn had_static_error(&self) -> bool {
        self.had_static_error.get()
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error.get()
    }

    /// Clear the static-error flag between REPL lines; the runtime-error
    /// flag is only informational there and is cleared too.
    pub fn reset(&self) {
        self.had_static_error.set(false);
        self.had_runtime_error.set(false);
    }
}
