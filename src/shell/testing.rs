//! Helpers shared by tests that fork or touch process-wide signal state.

use std::sync::{Mutex, MutexGuard};

use nix::unistd::Pid;

use super::error::ShellError;
use super::terminal::JobControl;

static SERIAL: Mutex<()> = Mutex::new(());

/// Tests holding this guard do not race on children, reaper slots or the
/// SIGCHLD disposition.
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Records terminal handovers instead of calling `tcsetpgrp`.
#[derive(Default)]
pub struct RecordingTerminal {
    pub calls: Vec<String>,
    pub fail_foreground: bool,
}

impl JobControl for RecordingTerminal {
    fn is_interactive(&self) -> bool {
        false
    }

    fn foreground(&mut self, pgid: Pid) -> Result<(), ShellError> {
        self.calls.push(format!("foreground {}", pgid));
        if self.fail_foreground {
            return Err(ShellError::Sys {
                context: "tcsetpgrp",
                source: nix::errno::Errno::ENOTTY,
            });
        }
        Ok(())
    }

    fn reclaim(&mut self) -> Result<(), ShellError> {
        self.calls.push("reclaim".to_string());
        Ok(())
    }
}
