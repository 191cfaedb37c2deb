use std::io::{self, IsTerminal, Stdin};

use log::{debug, error, warn};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::sys::termios::{tcgetattr, tcsetattr, SetArg, Termios};
use nix::unistd::{getpgrp, getpid, setpgid, tcgetpgrp, tcsetpgrp, Pid};

use super::error::ShellError;
use super::signals;

/// Who owns the terminal. The executor only talks to this trait.
pub trait JobControl {
    fn is_interactive(&self) -> bool;

    /// Gives the terminal to the process group `pgid`.
    fn foreground(&mut self, pgid: Pid) -> Result<(), ShellError>;

    /// Takes the terminal back for the shell's own group.
    fn reclaim(&mut self) -> Result<(), ShellError>;
}

/// The shell's terminal state: set up once at startup, changed only through
/// [`JobControl`], restored when dropped.
pub struct TerminalController {
    terminal: Stdin,
    interactive: bool,
    shell_pgid: Pid,
    tmodes: Option<Termios>,
}

impl TerminalController {
    /// Waits until the shell is in the foreground, moves it into its own
    /// process group and takes the terminal. Without a terminal on stdin
    /// this only records the current group.
    pub fn initialize() -> Result<Self, ShellError> {
        let terminal = io::stdin();
        if !terminal.is_terminal() {
            debug!("jobsh: stdin is not a terminal, job control disabled");
            return Ok(Self::detached());
        }

        // Stopped by SIGTTIN until whoever started us puts us in the
        // foreground and sends SIGCONT.
        loop {
            let pgrp = getpgrp();
            let owner = tcgetpgrp(&terminal).map_err(ShellError::sys("tcgetpgrp"))?;
            if owner == pgrp {
                break;
            }
            debug!("jobsh: terminal owned by {}, waiting for foreground", owner);
            killpg(pgrp, Signal::SIGTTIN).map_err(ShellError::sys("kill"))?;
        }

        signals::ignore_job_control_signals()?;

        let pid = getpid();
        match setpgid(pid, pid) {
            Ok(()) => {}
            // session leaders already lead their group
            Err(Errno::EPERM) => debug!("jobsh: already a session leader"),
            Err(e) => return Err(ShellError::Sys { context: "setpgid", source: e }),
        }
        let shell_pgid = getpgrp();
        tcsetpgrp(&terminal, shell_pgid).map_err(ShellError::sys("tcsetpgrp"))?;

        let tmodes = match tcgetattr(&terminal) {
            Ok(tmodes) => Some(tmodes),
            Err(e) => {
                warn!("jobsh: cannot save terminal modes: {}", e);
                None
            }
        };

        debug!("jobsh: terminal claimed by group {}", shell_pgid);
        Ok(Self {
            terminal,
            interactive: true,
            shell_pgid,
            tmodes,
        })
    }

    /// A controller for a shell that reads from a pipe or file.
    pub fn detached() -> Self {
        Self {
            terminal: io::stdin(),
            interactive: false,
            shell_pgid: getpgrp(),
            tmodes: None,
        }
    }

    pub fn shell_pgid(&self) -> Pid {
        self.shell_pgid
    }

    fn restore_modes(&self) -> Result<(), ShellError> {
        if let Some(tmodes) = &self.tmodes {
            tcsetattr(&self.terminal, SetArg::TCSADRAIN, tmodes)
                .map_err(ShellError::sys("tcsetattr"))?;
        }
        Ok(())
    }
}

impl JobControl for TerminalController {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn foreground(&mut self, pgid: Pid) -> Result<(), ShellError> {
        if !self.interactive {
            return Ok(());
        }
        debug!("jobsh: terminal -> group {}", pgid);
        tcsetpgrp(&self.terminal, pgid).map_err(ShellError::sys("tcsetpgrp"))
    }

    fn reclaim(&mut self) -> Result<(), ShellError> {
        if !self.interactive {
            return Ok(());
        }
        debug!("jobsh: terminal -> shell group {}", self.shell_pgid);
        tcsetpgrp(&self.terminal, self.shell_pgid).map_err(ShellError::sys("tcsetpgrp"))?;
        self.restore_modes()
    }
}

impl Drop for TerminalController {
    fn drop(&mut self) {
        if let Err(e) = self.restore_modes() {
            warn!("jobsh: cannot restore terminal modes: {}", e);
        }
    }
}

/// Hands the terminal to a job for as long as the guard lives. The shell
/// gets it back on drop however the wait ended.
pub struct ForegroundGuard<'a> {
    terminal: &'a mut dyn JobControl,
}

impl<'a> ForegroundGuard<'a> {
    pub fn new(terminal: &'a mut dyn JobControl, pgid: Pid) -> Self {
        if let Err(e) = terminal.foreground(pgid) {
            warn!("jobsh: cannot hand terminal to {}: {}", pgid, e);
        }
        Self { terminal }
    }
}

impl Drop for ForegroundGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.terminal.reclaim() {
            error!("jobsh: cannot reclaim terminal: {}", e);
        }
    }
}
