// ABOUTME: Syntax highlighter for the REPL: ANSI colors for Lox keywords, literals, and comments
use std::borrow::Cow;
use std::collections::HashSet;

use rustyline::completion::Completer;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Helper;

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_KEYWORD: &str = "\x1b[1;35m"; // bold magenta
const COLOR_NUMBER: &str = "\x1b[33m"; // yellow
const COLOR_STRING: &str = "\x1b[32m"; // green
const COLOR_BOOLEAN: &str = "\x1b[33m"; // yellow
const COLOR_COMMENT: &str = "\x1b[90m"; // gray
const COLOR_BRACE: &str = "\x1b[1;34m"; // bold blue

pub struct LoxHelper;

impl LoxHelper {
    pub fn new() -> Self {
        LoxHelper
    }
}

impl Default for LoxHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Helper for LoxHelper {}

impl Completer for LoxHelper {
    type Candidate = String;
}

impl Hinter for LoxHelper {
    type Hint = String;
}

impl Validator for LoxHelper {}

impl Highlighter for LoxHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let keywords = keywords();
        let highlighted = highlight_line(line, &keywords);
        if highlighted == line {
            Cow::Borrowed(line)
        } else {
            Cow::Owned(highlighted)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn keywords() -> HashSet<&'static str> {
    [
        "and", "class", "else", "false", "for", "fun", "if", "nil", "or", "print", "return", "super", "this", "true",
        "var", "while",
    ]
    .iter()
    .copied()
    .collect()
}

fn highlight_line(line: &str, keywords: &HashSet<&'static str>) -> String {
    let mut result = String::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '/' if i + 1 < chars.len() && chars[i + 1] == '/' => {
                result.push_str(COLOR_COMMENT);
                while i < chars.len() {
                    result.push(chars[i]);
                    i += 1;
                }
                result.push_str(COLOR_RESET);
            }

            '"' => {
                result.push_str(COLOR_STRING);
                result.push('"');
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    result.push(chars[i]);
                    i += 1;
                }
                if i < chars.len() {
                    result.push('"');
                    i += 1;
                }
                result.push_str(COLOR_RESET);
            }

            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if i < chars.len() && chars[i] == '.' && i + 1 < chars.len() && chars[i + 1].is_ascii_digit() {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                result.push_str(COLOR_NUMBER);
                result.push_str(&text);
                result.push_str(COLOR_RESET);
            }

            '(' | ')' | '{' | '}' => {
                result.push_str(COLOR_BRACE);
                result.push(chars[i]);
                i += 1;
                result.push_str(COLOR_RESET);
            }

            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                if word == "true" || word == "false" {
                    result.push_str(COLOR_BOOLEAN);
                    result.push_str(&word);
                    result.push_str(COLOR_RESET);
                } else if keywords.contains(word.as_str()) {
                    result.push_str(COLOR_KEYWORD);
                    result.push_str(&word);
                    result.push_str(COLOR_RESET);
                } else {
                    result.push_str(&word);
                }
            }

            c => {
                result.push(c);
                i += 1;
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlights_keyword() {
        let highlighted = highlight_line("var x = nil;", &keywords());
        assert!(highlighted.contains(COLOR_KEYWORD));
    }

    #[test]
    fn highlights_string() {
        let highlighted = highlight_line("print \"hi\";", &keywords());
        assert!(highlighted.contains(COLOR_STRING));
    }

    #[test]
    fn highlights_number() {
        let highlighted = highlight_line("1 + 2.5;", &keywords());
        assert!(highlighted.contains(COLOR_NUMBER));
    }

    #[test]
    fn highlights_comment_to_end_of_line() {
        let highlighted = highlight_line("// a comment", &keywords());
        assert!(highlighted.contains(COLOR_COMMENT));
    }

    #[test]
    fn highlights_boolean_literal_distinctly_from_keywords() {
        let highlighted = highlight_line("true", &keywords());
        assert!(highlighted.contains(COLOR_BOOLEAN));
    }

    #[test]
    fn plain_identifier_is_unchanged() {
        let highlighted = highlight_line("foo", &keywords());
        assert_eq!(highlighted, "foo");
    }
}
