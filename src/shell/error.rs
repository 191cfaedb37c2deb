use std::ffi::NulError;
use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("token longer than {limit} bytes")]
    TokenTooLong { limit: usize },

    #[error("line longer than {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("line is not valid UTF-8 at byte {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("syntax error: expected filename after `{operator}`")]
    DanglingRedirection { operator: String },

    #[error("{0}: command not found")]
    CommandNotFound(String),

    #[error("fork failed: {0}")]
    Fork(#[source] Errno),

    #[error("{context}: {source}")]
    Sys {
        context: &'static str,
        #[source]
        source: Errno,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("argument contains a NUL byte")]
    Nul(#[from] NulError),

    #[error("{name}: {message}")]
    Builtin { name: &'static str, message: String },
}

impl ShellError {
    pub fn sys(context: &'static str) -> impl FnOnce(Errno) -> ShellError {
        move |source| ShellError::Sys { context, source }
    }

    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> ShellError {
        let path = path.into();
        move |source| ShellError::Io { path, source }
    }
}
