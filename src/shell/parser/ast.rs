use std::fmt;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectOp {
    Input,  // <
    Output, // >
}

impl RedirectOp {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "<" => Some(RedirectOp::Input),
            ">" => Some(RedirectOp::Output),
            _ => None,
        }
    }
}

impl fmt::Display for RedirectOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedirectOp::Input => write!(f, "<"),
            RedirectOp::Output => write!(f, ">"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Redirection {
    pub operator: RedirectOp,
    pub filename: String,
}

/// A command line with operators split out, before the program is resolved.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Command {
    pub name: String,
    /// `arguments[0]` is `name`.
    pub arguments: Vec<String>,
    pub redirection: Option<Redirection>,
    pub background: bool,
}
