use std::ffi::{CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use log::debug;
use nix::unistd::Pid;

use crate::shell::error::ShellError;
use crate::shell::parser::{Command, Parser, Redirection};
use crate::utils::path;

/// One command ready to be launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    /// Resolved path handed to `execv`.
    pub program: PathBuf,
    /// argv, starting with the name as typed.
    pub arguments: Vec<String>,
    pub redirection: Option<Redirection>,
    pub background: bool,
    pub pid: Option<Pid>,
    pub pgid: Option<Pid>,
}

impl Process {
    fn new(program: PathBuf, command: Command) -> Self {
        Self {
            program,
            arguments: command.arguments,
            redirection: command.redirection,
            background: command.background,
            pid: None,
            pgid: None,
        }
    }

    /// The command line as it could be typed again.
    pub fn command_line(&self) -> String {
        shell_words::join(&self.arguments)
    }

    pub(crate) fn c_program(&self) -> Result<CString, ShellError> {
        Ok(CString::new(self.program.as_os_str().as_bytes())?)
    }

    pub(crate) fn c_arguments(&self) -> Result<Vec<CString>, ShellError> {
        self.arguments
            .iter()
            .map(|arg| CString::new(arg.as_bytes()).map_err(ShellError::from))
            .collect()
    }
}

/// Builds a [`Process`] against the current `PATH`.
///
/// `Ok(None)` means there is nothing to run: either no tokens or a command
/// that cannot be found.
pub fn build(tokens: &[String]) -> Result<Option<Process>, ShellError> {
    build_with_path(tokens, path::search_path().as_deref())
}

pub fn build_with_path(
    tokens: &[String],
    search_path: Option<&OsStr>,
) -> Result<Option<Process>, ShellError> {
    let command = match Parser::new(tokens).parse_command()? {
        Some(command) => command,
        None => return Ok(None),
    };

    match resolve_program(&command.name, search_path) {
        Some(program) => {
            debug!("jobsh: resolved {} to {}", command.name, program.display());
            Ok(Some(Process::new(program, command)))
        }
        None => Ok(None),
    }
}

/// A name that already points at a file is used as typed. Otherwise names
/// without a `/` are looked up in `search_path`.
fn resolve_program(name: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    let typed = Path::new(name);
    if typed.is_file() {
        return Some(typed.to_path_buf());
    }
    if name.contains('/') {
        return None;
    }
    path::find_file_in_path(name, search_path)
}
