use std::slice::Iter;

use super::ast::{Command, RedirectOp, Redirection};
use crate::shell::error::ShellError;

const BACKGROUND: &str = "&";

/// Separates operators from arguments in a token sequence.
///
/// Grammar: `word+ [('<' | '>') word] ['&']`. Only one redirection is
/// recognised; once its filename is consumed the rest of the line is ignored
/// except for a trailing `&`.
pub struct Parser<'a> {
    tokens: Iter<'a, String>,
    last: Option<&'a String>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [String]) -> Self {
        Parser {
            tokens: tokens.iter(),
            last: tokens.last(),
        }
    }

    /// Returns `None` for an empty token sequence.
    pub fn parse_command(&mut self) -> Result<Option<Command>, ShellError> {
        let name = match self.tokens.next() {
            Some(word) => word.clone(),
            None => return Ok(None),
        };

        let mut command = Command {
            name: name.clone(),
            arguments: vec![name],
            redirection: None,
            background: false,
        };

        while let Some(token) = self.tokens.next() {
            if token == BACKGROUND {
                command.background = true;
                break;
            }
            if let Some(operator) = RedirectOp::from_token(token) {
                command.redirection = Some(self.parse_redirection(operator)?);
                command.background = self.last.is_some_and(|last| last == BACKGROUND)
                    && self.tokens.len() > 0;
                break;
            }
            command.arguments.push(token.clone());
        }

        Ok(Some(command))
    }

    fn parse_redirection(&mut self, operator: RedirectOp) -> Result<Redirection, ShellError> {
        match self.tokens.next() {
            Some(filename) => Ok(Redirection {
                operator,
                filename: filename.clone(),
            }),
            None => Err(ShellError::DanglingRedirection {
                operator: operator.to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::shell::parser::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn parse(line: &str) -> Result<Option<Command>, ShellError> {
        let tokens = tokenize(line).unwrap();
        Parser::new(&tokens).parse_command()
    }

    #[test]
    fn test_simple_command() {
        let cmd = parse("ls -l /tmp").unwrap().unwrap();
        assert_eq!(cmd.name, "ls");
        assert_eq!(cmd.arguments, vec!["ls", "-l", "/tmp"]);
        assert_eq!(cmd.redirection, None);
        assert!(!cmd.background);
    }

    #[test]
    fn test_plain_tokens_pass_through() {
        for line in ["a", "a b c", "echo 'x y' z", "grep -n -- foo bar"] {
            let tokens = tokenize(line).unwrap();
            let cmd = Parser::new(&tokens).parse_command().unwrap().unwrap();
            assert_eq!(cmd.arguments, tokens);
            assert_eq!(cmd.redirection, None);
            assert!(!cmd.background);
        }
    }

    #[test]
    fn test_empty() {
        assert_eq!(parse("").unwrap(), None);
    }

    #[test]
    fn test_output_redirection() {
        let cmd = parse("prog > out.txt").unwrap().unwrap();
        assert_eq!(cmd.arguments, vec!["prog"]);
        assert_eq!(
            cmd.redirection,
            Some(Redirection {
                operator: RedirectOp::Output,
                filename: "out.txt".to_string(),
            })
        );
    }

    #[test]
    fn test_input_redirection() {
        let cmd = parse("sort -r < names").unwrap().unwrap();
        assert_eq!(cmd.arguments, vec!["sort", "-r"]);
        assert_eq!(cmd.redirection.unwrap().operator, RedirectOp::Input);
    }

    #[test]
    fn test_first_redirection_wins() {
        let cmd = parse("cat < in.txt > out.txt extra").unwrap().unwrap();
        assert_eq!(cmd.arguments, vec!["cat"]);
        assert_eq!(
            cmd.redirection,
            Some(Redirection {
                operator: RedirectOp::Input,
                filename: "in.txt".to_string(),
            })
        );
        assert!(!cmd.background);
    }

    #[test]
    fn test_dangling_redirection() {
        let err = parse("echo hello >").unwrap_err();
        assert!(matches!(err, ShellError::DanglingRedirection { ref operator } if operator == ">"));
        assert!(parse("sort <").is_err());
    }

    #[test]
    fn test_background() {
        let cmd = parse("sleep 10 &").unwrap().unwrap();
        assert_eq!(cmd.arguments, vec!["sleep", "10"]);
        assert!(cmd.background);
    }

    #[test]
    fn test_background_after_redirection() {
        let cmd = parse("make > build.log &").unwrap().unwrap();
        assert_eq!(cmd.arguments, vec!["make"]);
        assert_eq!(cmd.redirection.unwrap().filename, "build.log");
        assert!(cmd.background);
    }

    #[test]
    fn test_ampersand_as_filename_is_not_background() {
        let cmd = parse("echo hi > &").unwrap().unwrap();
        assert_eq!(cmd.redirection.unwrap().filename, "&");
        assert!(!cmd.background);
    }
}
