// ABOUTME: CLI driver: runs a Lox script from a file, or starts an interactive REPL
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};

use lox::config::{VERSION, WELCOME_MESSAGE, WELCOME_SUBTITLE};
use lox::error::Diagnostics;
use lox::highlighter::LoxHelper;
use lox::interpreter::Interpreter;

const EXIT_USAGE_ERROR: u8 = 64;
const EXIT_STATIC_ERROR: u8 = 64;
const EXIT_RUNTIME_ERROR: u8 = 70;
const HISTORY_FILE: &str = ".lox_history";

#[derive(ClapParser, Debug)]
#[command(name = "lox", version = VERSION, about = "A tree-walking interpreter for the Lox programming language")]
struct CliArgs {
    /// Lox script to run. Omit to start an interactive REPL.
    #[arg(value_name = "SCRIPT")]
    scripts: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    match args.scripts.len() {
        0 => run_prompt(),
        1 => run_file(&args.scripts[0]),
        _ => {
            eprintln!("Usage: lox [script]");
            ExitCode::from(EXIT_USAGE_ERROR)
        }
    }
}

fn run_file(path: &PathBuf) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read file '{}': {err}", path.display());
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    let mut interpreter = Interpreter::new();
    let mut diagnostics = Diagnostics::new();
    lox::run(&source, &mut interpreter, &mut diagnostics);

    for diagnostic in diagnostics.iter() {
        eprintln!("{diagnostic}");
    }

    if diagnostics.had_error() {
        ExitCode::from(EXIT_STATIC_ERROR)
    } else if diagnostics.had_runtime_error() {
        ExitCode::from(EXIT_RUNTIME_ERROR)
    } else {
        ExitCode::SUCCESS
    }
}

fn run_prompt() -> ExitCode {
    println!("{WELCOME_MESSAGE} v{VERSION}");
    println!("{WELCOME_SUBTITLE}");

    let config = Config::builder().auto_add_history(true).build();
    let mut editor = match Editor::with_config(config) {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("Failed to initialize REPL: {err}");
            return ExitCode::FAILURE;
        }
    };
    editor.set_helper(Some(LoxHelper::new()));
    let _ = editor.load_history(HISTORY_FILE);

    let mut interpreter = Interpreter::new();

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let mut diagnostics = Diagnostics::new();
                lox::run(&line, &mut interpreter, &mut diagnostics);
                for diagnostic in diagnostics.iter() {
                    eprintln!("{diagnostic}");
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Readline error: {err}");
                break;
            }
        }
    }

    let _ = editor.save_history(HISTORY_FILE);
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_accepts_no_args() {
        let args = CliArgs::try_parse_from(["lox"]).unwrap();
        assert!(args.scripts.is_empty());
    }

    #[test]
    fn cli_accepts_single_script() {
        let args = CliArgs::try_parse_from(["lox", "main.lox"]).unwrap();
        assert_eq!(args.scripts, vec![PathBuf::from("main.lox")]);
    }

    #[test]
    fn cli_accepts_multiple_scripts_and_usage_check_happens_after_parsing() {
        let args = CliArgs::try_parse_from(["lox", "a.lox", "b.lox"]).unwrap();
        assert_eq!(args.scripts.len(), 2);
    }

    #[test]
    fn cli_definition_is_valid() {
        CliArgs::command().debug_assert();
    }
}
