//! SIGCHLD reaping and signal dispositions.
//!
//! The handler runs asynchronously with the main loop, so everything it
//! touches lives in fixed-size atomic slots: no allocation, no locks. The
//! main loop claims a slot for every job that is left running in the
//! background and later drains the events the handler recorded.

use std::sync::atomic::{AtomicI32, Ordering};

use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::signal::{
    self, sigaction, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal,
};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use super::error::ShellError;
use super::job_manager::JobStatus;

/// Background jobs the reaper can report on at the same time.
pub const MAX_TRACKED: usize = 64;

/// Signals an interactive shell ignores and its children must not inherit.
const JOB_CONTROL_SIGNALS: [Signal; 5] = [
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
];

const EVENT_NONE: i32 = 0;
const EVENT_EXITED: i32 = 1;
const EVENT_SIGNALED: i32 = 2;
const EVENT_STOPPED: i32 = 3;

struct Slot {
    pid: AtomicI32,
    event: AtomicI32,
    detail: AtomicI32,
}

impl Slot {
    const fn new() -> Self {
        Self {
            pid: AtomicI32::new(0),
            event: AtomicI32::new(EVENT_NONE),
            detail: AtomicI32::new(0),
        }
    }
}

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SLOT: Slot = Slot::new();
static SLOTS: [Slot; MAX_TRACKED] = [EMPTY_SLOT; MAX_TRACKED];

/// A state change the handler observed for a tracked pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReapEvent {
    pub pid: Pid,
    pub status: JobStatus,
}

/// Starts recording events for `pid`. Call with SIGCHLD blocked.
///
/// Returns false when every slot is taken; the child is still reaped but
/// its completion goes unreported.
pub fn track(pid: Pid) -> bool {
    for slot in SLOTS.iter() {
        if slot.pid.load(Ordering::Acquire) == pid.as_raw() {
            return true;
        }
    }
    for slot in SLOTS.iter() {
        if slot
            .pid
            .compare_exchange(0, pid.as_raw(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            slot.event.store(EVENT_NONE, Ordering::Release);
            return true;
        }
    }
    warn!("jobsh: job table full, {} will not be reported", pid);
    false
}

#[cfg(test)]
pub fn is_tracked(pid: Pid) -> bool {
    SLOTS
        .iter()
        .any(|slot| slot.pid.load(Ordering::Acquire) == pid.as_raw())
}

/// Hands every recorded event to `f`. Slots whose job finished are freed,
/// stopped jobs stay tracked. Call with SIGCHLD blocked.
pub fn drain(mut f: impl FnMut(ReapEvent)) {
    for slot in SLOTS.iter() {
        let raw_pid = slot.pid.load(Ordering::Acquire);
        if raw_pid == 0 {
            continue;
        }
        let event = slot.event.swap(EVENT_NONE, Ordering::AcqRel);
        let detail = slot.detail.load(Ordering::Acquire);
        let status = match event {
            EVENT_EXITED => JobStatus::Done(detail),
            EVENT_SIGNALED => match Signal::try_from(detail) {
                Ok(sig) => JobStatus::Killed(sig),
                Err(_) => JobStatus::Done(128 + detail),
            },
            EVENT_STOPPED => match Signal::try_from(detail) {
                Ok(sig) => JobStatus::Stopped(sig),
                Err(_) => JobStatus::Stopped(Signal::SIGSTOP),
            },
            _ => continue,
        };
        if status.is_finished() {
            slot.pid.store(0, Ordering::Release);
        }
        f(ReapEvent {
            pid: Pid::from_raw(raw_pid),
            status,
        });
    }
}

fn record(pid: Pid, event: i32, detail: i32) {
    for slot in SLOTS.iter() {
        if slot.pid.load(Ordering::Acquire) == pid.as_raw() {
            slot.detail.store(detail, Ordering::Release);
            slot.event.store(event, Ordering::Release);
            return;
        }
    }
}

/// Collects every child that has terminated or stopped without blocking.
/// Returns how many state changes were collected.
///
/// Signal-safe: only `waitpid` and atomic stores.
pub fn reap_children() -> usize {
    let mut reaped = 0;
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED)) {
            Ok(WaitStatus::Exited(pid, code)) => record(pid, EVENT_EXITED, code),
            Ok(WaitStatus::Signaled(pid, sig, _)) => record(pid, EVENT_SIGNALED, sig as i32),
            Ok(WaitStatus::Stopped(pid, sig)) => record(pid, EVENT_STOPPED, sig as i32),
            Ok(WaitStatus::StillAlive) => break,
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            // ECHILD: nothing left to wait for
            Err(_) => break,
        }
        reaped += 1;
    }
    reaped
}

extern "C" fn handle_sigchld(_: libc::c_int) {
    let saved = errno::errno();
    reap_children();
    errno::set_errno(saved);
}

/// Keeps the SIGCHLD handler installed; the previous disposition comes back
/// when this is dropped.
pub struct Reaper {
    previous: SigAction,
}

pub fn install_reaper() -> Result<Reaper, ShellError> {
    let action = SigAction::new(
        SigHandler::Handler(handle_sigchld),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: the handler only calls waitpid and stores to atomics.
    let previous = unsafe { sigaction(Signal::SIGCHLD, &action) }
        .map_err(ShellError::sys("sigaction(SIGCHLD)"))?;
    debug!("jobsh: SIGCHLD reaper installed");
    Ok(Reaper { previous })
}

impl Drop for Reaper {
    fn drop(&mut self) {
        // SAFETY: restores whatever was installed before `install_reaper`.
        if let Err(e) = unsafe { sigaction(Signal::SIGCHLD, &self.previous) } {
            warn!("jobsh: cannot restore SIGCHLD disposition: {}", e);
        }
    }
}

/// Blocks SIGCHLD for the calling thread until dropped.
pub struct SigchldBlock {
    previous: SigSet,
}

pub fn block_sigchld() -> Result<SigchldBlock, ShellError> {
    let mut set = SigSet::empty();
    set.add(Signal::SIGCHLD);
    let mut previous = SigSet::empty();
    signal::sigprocmask(SigmaskHow::SIG_BLOCK, Some(&set), Some(&mut previous))
        .map_err(ShellError::sys("sigprocmask"))?;
    Ok(SigchldBlock { previous })
}

impl Drop for SigchldBlock {
    fn drop(&mut self) {
        if let Err(e) = signal::sigprocmask(SigmaskHow::SIG_SETMASK, Some(&self.previous), None) {
            warn!("jobsh: cannot restore signal mask: {}", e);
        }
    }
}

/// Interactive shells must survive terminal generated signals and must be
/// able to call `tcsetpgrp` from the background.
pub fn ignore_job_control_signals() -> Result<(), ShellError> {
    for sig in JOB_CONTROL_SIGNALS {
        // SAFETY: SIG_IGN installs no handler code.
        unsafe { signal::signal(sig, SigHandler::SigIgn) }
            .map_err(ShellError::sys("signal"))?;
    }
    Ok(())
}

/// Runs in the forked child: default dispositions and an empty mask, which
/// `exec` would otherwise inherit.
pub fn reset_for_child() -> Result<(), Errno> {
    for sig in JOB_CONTROL_SIGNALS {
        // SAFETY: SIG_DFL installs no handler code.
        unsafe { signal::signal(sig, SigHandler::SigDfl) }?;
    }
    // SAFETY: as above.
    unsafe { signal::signal(Signal::SIGCHLD, SigHandler::SigDfl) }?;
    signal::sigprocmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None)
}
