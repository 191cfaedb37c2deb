use std::convert::Infallible;
use std::ffi::{CStr, CString};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;

use log::{debug, warn};
use nix::unistd::{dup2, execv, fork, setpgid, ForkResult, Pid};

use crate::shell::error::ShellError;
use crate::shell::job_manager::{JobManager, JobStatus};
use crate::shell::parser::{RedirectOp, Redirection};
use crate::shell::process::Process;
use crate::shell::signals;
use crate::shell::terminal::{ForegroundGuard, JobControl};

/// Exit status of a child that could not set up its redirection or exec.
pub const SETUP_FAILURE_STATUS: i32 = 127;

/// Mode for files created by `>`: rw-r--r--.
const OUTPUT_MODE: u32 = 0o644;

pub struct Executor {
    jobs: JobManager,
    last_status: Option<JobStatus>,
}

impl Executor {
    pub fn new(jobs: JobManager) -> Self {
        Self {
            jobs,
            last_status: None,
        }
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    pub fn jobs_mut(&mut self) -> &mut JobManager {
        &mut self.jobs
    }

    /// How the last foreground job ended; `None` after a background launch.
    pub fn last_status(&self) -> Option<JobStatus> {
        self.last_status
    }

    /// Forks and execs `process` in a new process group.
    ///
    /// A foreground job gets the terminal and is waited for; the terminal
    /// is reclaimed afterwards no matter how the job ended. A background
    /// job is left to the reaper and this returns right away.
    pub fn execute(
        &mut self,
        mut process: Process,
        terminal: &mut dyn JobControl,
    ) -> Result<Pid, ShellError> {
        // everything the child needs is allocated before the fork
        let program = process.c_program()?;
        let argv = process.c_arguments()?;

        debug!("jobsh: launching {:?}", process);
        let blocked = signals::block_sigchld()?;

        // SAFETY: the shell is single threaded; the child only sets up
        // descriptors and signals before exec or _exit.
        let child = match unsafe { fork() } {
            Ok(ForkResult::Child) => run_child(&process, &program, &argv),
            Ok(ForkResult::Parent { child }) => child,
            Err(e) => return Err(ShellError::Fork(e)),
        };

        // Same call as in the child, whichever runs first wins. EACCES means
        // the child already exec'd, which implies it already did it.
        if let Err(e) = setpgid(child, child) {
            debug!("jobsh: setpgid({}) from parent: {}", child, e);
        }

        process.pid = Some(child);
        process.pgid = Some(child);
        let background = process.background;
        self.jobs.add_job(process);

        if background {
            if !signals::track(child) {
                // no reap event will ever arrive for it
                warn!("jobsh: {} runs untracked", child);
                self.jobs.remove_job(child);
            }
            self.last_status = None;
            drop(blocked);
            return Ok(child);
        }

        let status = {
            let _foreground = ForegroundGuard::new(terminal, child);
            self.jobs.wait_fg_job(child)
        };
        drop(blocked);

        self.last_status = Some(status);
        Ok(child)
    }
}

/// The forked child. Never returns into shell code.
fn run_child(process: &Process, program: &CStr, argv: &[CString]) -> ! {
    let err = match setup_child(process, program, argv) {
        Ok(never) => match never {},
        Err(err) => err,
    };
    eprintln!("jobsh: {}: {}", process.arguments[0], err);
    // SAFETY: _exit skips atexit handlers and stdio buffers shared with the shell.
    unsafe { libc::_exit(SETUP_FAILURE_STATUS) }
}

fn setup_child(
    process: &Process,
    program: &CStr,
    argv: &[CString],
) -> Result<Infallible, ShellError> {
    setpgid(Pid::from_raw(0), Pid::from_raw(0)).map_err(ShellError::sys("setpgid"))?;
    signals::reset_for_child().map_err(ShellError::sys("signal"))?;
    if let Some(redirection) = &process.redirection {
        redirect(redirection)?;
    }
    execv(program, argv).map_err(ShellError::sys("exec"))
}

fn redirect(redirection: &Redirection) -> Result<(), ShellError> {
    let (file, target) = match redirection.operator {
        RedirectOp::Input => (
            File::open(&redirection.filename),
            libc::STDIN_FILENO,
        ),
        RedirectOp::Output => (
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(OUTPUT_MODE)
                .open(&redirection.filename),
            libc::STDOUT_FILENO,
        ),
    };
    let file = file.map_err(ShellError::io(&redirection.filename))?;
    dup2(file.as_raw_fd(), target).map_err(ShellError::sys("dup2"))?;
    Ok(())
}
