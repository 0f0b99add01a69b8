pub mod ast;
pub mod callable;
pub mod config;
pub mod env;
pub mod error;
pub mod highlighter;
pub mod interpreter;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod resolver;
pub mod token;
pub mod value;

use error::Diagnostics;
use interpreter::Interpreter;
use lexer::Lexer;
use parser::Parser;
use resolver::Resolver;

/// Runs one unit of source through the full scan -> parse -> resolve ->
/// interpret pipeline against a persistent `Interpreter`. Used for both
/// whole-file runs and single REPL lines; the REPL calls this once per
/// line, reusing the same `Interpreter` so top-level bindings persist
/// across lines the way the book's REPL does. The parser draws expression
/// ids from the interpreter's own counter rather than starting at zero
/// each call, and the resolved locals are merged in rather than replacing
/// the table outright, so a closure or class method defined on one line
/// keeps working when it's called from a later one.
pub fn run(source: &str, interpreter: &mut Interpreter, diagnostics: &mut Diagnostics) {
    let tokens = Lexer::new(source, diagnostics).scan_tokens();
    let statements = Parser::new(tokens, interpreter.next_expr_id_mut(), diagnostics).parse();
    if diagnostics.had_error() {
        return;
    }

    let locals = Resolver::new(diagnostics).resolve(&statements);
    if diagnostics.had_error() {
        return;
    }
    interpreter.set_locals(locals);

    if let Err(err) = interpreter.interpret(&statements) {
        diagnostics.runtime_error(&err);
    }
}
