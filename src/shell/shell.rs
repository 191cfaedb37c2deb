use log::{debug, error, warn};
use std::io::{self, BufRead, IsTerminal, Write};

use crate::shell::error::ShellError;
use crate::shell::executor::{Builtins, Executor, Flow};
use crate::shell::job_manager::{JobManager, JobStatus};
use crate::shell::parser::tokenize;
use crate::shell::process;
use crate::shell::signals::{self, Reaper};
use crate::shell::terminal::{JobControl, TerminalController};
use crate::utils::config::Config;
use crate::utils::theme::{load_theme, Theme};

pub struct Shell<'a> {
    config: &'a Config,
    theme: Theme,
    terminal: TerminalController,
    executor: Executor,
    builtins: Builtins,
    _reaper: Reaper,
    line_num: usize,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config) -> Result<Self, ShellError> {
        let terminal = TerminalController::initialize()?;
        let reaper = signals::install_reaper()?;

        if !io::stdout().is_terminal() {
            colored::control::set_override(false);
        }

        Ok(Self {
            config,
            theme: load_theme(&config.theme),
            terminal,
            executor: Executor::new(JobManager::new()),
            builtins: Builtins::default(),
            _reaper: reaper,
            line_num: 0,
        })
    }

    /// Reads and runs lines until `exit` or end of input. Returns the exit
    /// status for the shell process.
    pub fn run(&mut self) -> Result<i32, ShellError> {
        debug!(
            "jobsh: ready, interactive={} pgid={}",
            self.terminal.is_interactive(),
            self.terminal.shell_pgid()
        );

        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut line = Vec::new();

        loop {
            self.report_jobs();
            self.prompt()?;

            line.clear();
            let read = input
                .read_until(b'\n', &mut line)
                .map_err(ShellError::io("<stdin>"))?;
            if read == 0 {
                debug!("jobsh: end of input");
                if self.terminal.is_interactive() {
                    println!();
                }
                return Ok(0);
            }

            match self.handle_line(&line) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit(code)) => {
                    debug!("jobsh: exit {}", code);
                    return Ok(code);
                }
                Err(e) => self.report_error(&e),
            }
            self.line_num += 1;
        }
    }

    fn prompt(&self) -> Result<(), ShellError> {
        if !self.terminal.is_interactive() {
            return Ok(());
        }
        let mut stdout = io::stdout();
        write!(stdout, "{}", (self.theme.prompt_style)(format!("{}: ", self.line_num)))
            .and_then(|_| stdout.flush())
            .map_err(ShellError::io("<stdout>"))
    }

    fn handle_line(&mut self, raw: &[u8]) -> Result<Flow, ShellError> {
        if raw.len() > self.config.max_line_len {
            return Err(ShellError::LineTooLong {
                limit: self.config.max_line_len,
            });
        }
        let line = std::str::from_utf8(raw).map_err(|e| ShellError::InvalidUtf8 {
            offset: e.valid_up_to(),
        })?;
        let tokens = tokenize(line)?;
        if tokens.is_empty() {
            return Ok(Flow::Continue);
        }
        debug!("jobsh: line {}: {:?}", self.line_num, tokens);

        let mut stdout = io::stdout();
        if let Some(result) = self.builtins.dispatch(&tokens, &mut stdout) {
            if let Err(e) = stdout.flush() {
                warn!("jobsh: flush failed: {}", e);
            }
            return result;
        }

        let process = match process::build(&tokens)? {
            Some(process) => process,
            None => return Err(ShellError::CommandNotFound(tokens[0].clone())),
        };
        let command_line = process.command_line();

        // buffered output must not be duplicated into the child
        if let Err(e) = stdout.flush() {
            warn!("jobsh: flush failed: {}", e);
        }
        let pid = self.executor.execute(process, &mut self.terminal)?;

        match self.executor.last_status() {
            None => {
                if self.terminal.is_interactive() {
                    if let Some(job) = self.executor.jobs().get(pid) {
                        println!("[{}] {}", job.index, pid);
                    }
                }
            }
            Some(JobStatus::Stopped(_)) => {
                if let Some(job) = self.executor.jobs().get(pid) {
                    println!();
                    println!("{}", (self.theme.notice_style)(job.to_string()));
                }
            }
            Some(JobStatus::Killed(sig)) => {
                eprintln!(
                    "{}",
                    (self.theme.error_style)(format!("{}: killed by {}", command_line, sig.as_str()))
                );
            }
            Some(status) => debug!("jobsh: {} finished: {}", command_line, status),
        }
        Ok(Flow::Continue)
    }

    fn report_jobs(&mut self) {
        for job in self.executor.jobs_mut().collect_reaped() {
            debug!("jobsh: background job changed: {}", job);
            if self.terminal.is_interactive() && job.is_bg() {
                println!("{}", (self.theme.notice_style)(job.to_string()));
            }
        }
    }

    fn report_error(&self, e: &ShellError) {
        error!("jobsh: line {}: {}", self.line_num, e);
        eprintln!(
            "{} {}",
            self.theme.error_symbol,
            (self.theme.error_style)(format!("{}: {}", self.config.name, e))
        );
    }
}
