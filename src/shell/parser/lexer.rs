use std::str::Chars;

use crate::shell::error::ShellError;

/// Longest token the lexer accepts, in bytes.
pub const MAX_TOKEN_LEN: usize = 4095;

#[derive(Debug, PartialEq, Clone, Copy)]
enum Mode {
    Normal,
    SingleQuote,
    DoubleQuote,
}

/// Splits one input line into words.
///
/// Quotes switch the lexer between modes and are never copied into the
/// word. A backslash takes the next character literally in every mode.
/// Whitespace only separates words in [`Mode::Normal`]; adjacent quoted and
/// unquoted segments join into a single word. Operators such as `>` or `&`
/// are plain words here and are recognised later by the parser.
pub struct Lexer<'a> {
    input: Chars<'a>,
    mode: Mode,
    limit: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::with_limit(input, MAX_TOKEN_LEN)
    }

    pub fn with_limit(input: &'a str, limit: usize) -> Self {
        Self {
            input: input.chars(),
            mode: Mode::Normal,
            limit,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<String>, ShellError> {
        let mut tokens = Vec::new();
        let mut word = String::new();

        while let Some(c) = self.input.next() {
            match (self.mode, c) {
                (_, '\\') => {
                    // a trailing backslash is dropped
                    if let Some(escaped) = self.input.next() {
                        word.push(escaped);
                    }
                }
                (Mode::Normal, '\'') => self.mode = Mode::SingleQuote,
                (Mode::Normal, '"') => self.mode = Mode::DoubleQuote,
                (Mode::Normal, c) if c.is_whitespace() => {
                    if !word.is_empty() {
                        tokens.push(std::mem::take(&mut word));
                    }
                }
                (Mode::SingleQuote, '\'') | (Mode::DoubleQuote, '"') => self.mode = Mode::Normal,
                (_, c) => word.push(c),
            }

            if word.len() > self.limit {
                return Err(ShellError::TokenTooLong { limit: self.limit });
            }
        }

        // an unterminated quote still flushes what it collected
        if !word.is_empty() {
            tokens.push(word);
        }
        Ok(tokens)
    }
}

pub fn tokenize(line: &str) -> Result<Vec<String>, ShellError> {
    Lexer::new(line).tokenize()
}
