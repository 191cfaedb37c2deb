use std::env;
use std::io::Write;

use log::debug;

use crate::shell::error::ShellError;

/// What the read loop does after a built-in ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit(i32),
}

pub type BuiltinFn = fn(&Builtins, &[String], &mut dyn Write) -> Result<Flow, ShellError>;

pub struct Builtin {
    pub name: &'static str,
    pub doc: &'static str,
    pub run: BuiltinFn,
}

/// Commands the shell runs itself instead of forking. Looked up by the
/// first token before any external command resolution.
pub struct Builtins {
    table: Vec<Builtin>,
}

impl Builtins {
    pub fn empty() -> Self {
        Self { table: Vec::new() }
    }

    /// Adds `builtin`, replacing any entry with the same name.
    pub fn register(&mut self, builtin: Builtin) {
        self.table.retain(|entry| entry.name != builtin.name);
        self.table.push(builtin);
    }

    pub fn lookup(&self, name: &str) -> Option<&Builtin> {
        self.table.iter().find(|entry| entry.name == name)
    }

    pub fn entries(&self) -> impl Iterator<Item = &Builtin> {
        self.table.iter()
    }

    /// Runs the built-in named by `tokens[0]`, if there is one.
    pub fn dispatch(
        &self,
        tokens: &[String],
        out: &mut dyn Write,
    ) -> Option<Result<Flow, ShellError>> {
        let builtin = self.lookup(tokens.first()?)?;
        debug!("jobsh: builtin {}", builtin.name);
        Some((builtin.run)(self, tokens, out))
    }
}

impl Default for Builtins {
    fn default() -> Self {
        let mut builtins = Self::empty();
        builtins.register(Builtin {
            name: "help",
            doc: "show this help menu",
            run: builtin_help,
        });
        builtins.register(Builtin {
            name: "?",
            doc: "show this help menu",
            run: builtin_help,
        });
        builtins.register(Builtin {
            name: "exit",
            doc: "exit the command shell",
            run: builtin_exit,
        });
        builtins.register(Builtin {
            name: "pwd",
            doc: "show the current working directory",
            run: builtin_pwd,
        });
        builtins.register(Builtin {
            name: "cd",
            doc: "change the current working directory",
            run: builtin_cd,
        });
        builtins
    }
}

fn write_failed(name: &'static str) -> impl FnOnce(std::io::Error) -> ShellError {
    move |e| ShellError::Builtin {
        name,
        message: e.to_string(),
    }
}

fn builtin_help(
    builtins: &Builtins,
    _tokens: &[String],
    out: &mut dyn Write,
) -> Result<Flow, ShellError> {
    for entry in builtins.entries() {
        writeln!(out, "{} - {}", entry.name, entry.doc).map_err(write_failed("help"))?;
    }
    Ok(Flow::Continue)
}

fn builtin_exit(
    _builtins: &Builtins,
    tokens: &[String],
    _out: &mut dyn Write,
) -> Result<Flow, ShellError> {
    match tokens.get(1) {
        None => Ok(Flow::Exit(0)),
        Some(code) => code
            .parse::<i32>()
            .map(Flow::Exit)
            .map_err(|_| ShellError::Builtin {
                name: "exit",
                message: format!("{}: numeric argument required", code),
            }),
    }
}

fn builtin_pwd(
    _builtins: &Builtins,
    _tokens: &[String],
    out: &mut dyn Write,
) -> Result<Flow, ShellError> {
    let cwd = env::current_dir().map_err(|e| ShellError::Builtin {
        name: "pwd",
        message: e.to_string(),
    })?;
    writeln!(out, "{}", cwd.display()).map_err(write_failed("pwd"))?;
    Ok(Flow::Continue)
}

fn builtin_cd(
    _builtins: &Builtins,
    tokens: &[String],
    _out: &mut dyn Write,
) -> Result<Flow, ShellError> {
    let path = tokens.get(1).map(|s| s.as_str()).unwrap_or("~");
    let target = shellexpand::tilde(path);
    env::set_current_dir(target.as_ref()).map_err(|e| ShellError::Builtin {
        name: "cd",
        message: format!("{}: {}", path, e),
    })?;
    Ok(Flow::Continue)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn run(words: &[&str]) -> (Option<Result<Flow, ShellError>>, String) {
        let builtins = Builtins::default();
        let mut out = Vec::new();
        let result = builtins.dispatch(&tokens(words), &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_unknown_falls_through() {
        let (result, out) = run(&["ls", "-l"]);
        assert!(result.is_none());
        assert!(out.is_empty());
        assert!(run(&[]).0.is_none());
    }

    #[test]
    fn test_help_lists_every_entry() {
        let (result, out) = run(&["help"]);
        assert_eq!(result.unwrap().unwrap(), Flow::Continue);
        let names: Vec<&str> = out.lines().map(|l| l.split(" - ").next().unwrap()).collect();
        assert_eq!(names, vec!["help", "?", "exit", "pwd", "cd"]);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(run(&["exit"]).0.unwrap().unwrap(), Flow::Exit(0));
        assert_eq!(run(&["exit", "7"]).0.unwrap().unwrap(), Flow::Exit(7));
        let err = run(&["exit", "soon"]).0.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "exit: soon: numeric argument required");
    }

    #[test]
    fn test_pwd() {
        let (result, out) = run(&["pwd"]);
        assert_eq!(result.unwrap().unwrap(), Flow::Continue);
        assert_eq!(out.trim_end(), env::current_dir().unwrap().display().to_string());
    }

    #[test]
    fn test_cd_missing_directory() {
        let before = env::current_dir().unwrap();
        let err = run(&["cd", "/definitely/not/here"]).0.unwrap().unwrap_err();
        assert!(err.to_string().starts_with("cd: /definitely/not/here: "));
        assert_eq!(env::current_dir().unwrap(), before);
    }

    #[test]
    fn test_register_replaces() {
        fn quiet(_: &Builtins, _: &[String], _: &mut dyn Write) -> Result<Flow, ShellError> {
            Ok(Flow::Exit(42))
        }
        let mut builtins = Builtins::default();
        builtins.register(Builtin {
            name: "exit",
            doc: "leave with 42",
            run: quiet,
        });
        let mut out = Vec::new();
        let flow = builtins.dispatch(&tokens(&["exit"]), &mut out).unwrap().unwrap();
        assert_eq!(flow, Flow::Exit(42));
        assert_eq!(builtins.entries().filter(|b| b.name == "exit").count(), 1);
    }
}
