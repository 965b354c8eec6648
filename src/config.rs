// ABOUTME: Constants and banner text for the CLI and REPL

pub const VERSION: &str = "0.1.0";
pub const WELCOME_MESSAGE: &str = "Lox Interpreter v0.1.0";
pub const WELCOME_SUBTITLE: &str = "A tree-walking interpreter for Lox";
pub const REPL_PROMPT: &str = "> ";
