use std::collections::HashMap;
use std::fmt;

use log::{debug, error, warn};
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::waitpid;
use nix::sys::wait::WaitPidFlag as WF;
use nix::sys::wait::WaitStatus as WS;
use nix::unistd::Pid;

use super::process::Process;
use super::signals;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Stopped(Signal),
    Done(i32),
    Killed(Signal),
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Done(_) | JobStatus::Killed(_))
    }

    fn from_wait(ws: WS) -> Option<Self> {
        match ws {
            WS::Exited(_, code) => Some(JobStatus::Done(code)),
            WS::Signaled(_, sig, _) => Some(JobStatus::Killed(sig)),
            WS::Stopped(_, sig) => Some(JobStatus::Stopped(sig)),
            WS::Continued(_) => Some(JobStatus::Running),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Running => write!(f, "running"),
            JobStatus::Stopped(_) => write!(f, "stopped"),
            JobStatus::Done(0) => write!(f, "done"),
            JobStatus::Done(code) => write!(f, "exit {}", code),
            JobStatus::Killed(sig) => write!(f, "killed ({})", sig.as_str()),
        }
    }
}

/// A launched process, from fork until it is reaped.
#[derive(Debug, Clone)]
pub struct Job {
    pub index: usize,
    pub process: Process,
    pub status: JobStatus,
}

impl Job {
    pub fn pid(&self) -> Option<Pid> {
        self.process.pid
    }

    pub fn is_bg(&self) -> bool {
        self.process.background
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pid = self.pid().map(|pid| pid.as_raw()).unwrap_or_default();
        write!(
            f,
            "[{}] {} {} {}",
            self.index,
            pid,
            self.status,
            self.process.command_line()
        )
    }
}

/// Running and stopped jobs, keyed by pid.
#[derive(Default)]
pub struct JobManager {
    jobs: HashMap<Pid, Job>,
}

impl JobManager {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
        }
    }

    pub fn get(&self, pid: Pid) -> Option<&Job> {
        self.jobs.get(&pid)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn find_available_index(&self) -> usize {
        let mut index = 1;
        while self.jobs.values().any(|job| job.index == index) {
            index += 1;
        }
        index
    }

    /// Registers a forked process. Returns its job index, or `None` when the
    /// process has no pid yet.
    pub fn add_job(&mut self, process: Process) -> Option<usize> {
        let pid = process.pid?;
        let index = self.find_available_index();
        debug!("jobsh: job [{}] {} {}", index, pid, process.command_line());
        self.jobs.insert(
            pid,
            Job {
                index,
                process,
                status: JobStatus::Running,
            },
        );
        Some(index)
    }

    pub fn remove_job(&mut self, pid: Pid) -> Option<Job> {
        self.jobs.remove(&pid)
    }

    /// Applies a status change. Finished jobs leave the table and are
    /// returned together with jobs that just stopped.
    fn update(&mut self, pid: Pid, status: JobStatus) -> Option<Job> {
        if status.is_finished() {
            let mut job = self.remove_job(pid)?;
            job.status = status;
            return Some(job);
        }
        let job = self.jobs.get_mut(&pid)?;
        job.status = status;
        match status {
            JobStatus::Stopped(_) => {
                job.process.background = true;
                Some(job.clone())
            }
            _ => None,
        }
    }

    /// Blocks until the foreground job `pid` exits, is killed or stops.
    /// Call with SIGCHLD blocked so the reaper cannot take the status first.
    pub fn wait_fg_job(&mut self, pid: Pid) -> JobStatus {
        let status = loop {
            match waitpid(pid, Some(WF::WUNTRACED)) {
                Ok(ws) => match JobStatus::from_wait(ws) {
                    Some(JobStatus::Running) | None => continue,
                    Some(status) => break status,
                },
                Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => {
                    warn!("jobsh: {} was reaped elsewhere, exit status lost", pid);
                    break JobStatus::Done(0);
                }
                Err(e) => {
                    error!("jobsh: waitpid({}) failed: {}", pid, e);
                    break JobStatus::Done(0);
                }
            }
        };

        debug!("jobsh: foreground {} -> {:?}", pid, status);
        if let JobStatus::Stopped(_) = status {
            // now a background job; the reaper collects it when it dies
            signals::track(pid);
        }
        self.update(pid, status);
        status
    }

    /// Picks up what the reaper recorded since the last call. Returns
    /// background jobs that finished or stopped, in index order.
    pub fn collect_reaped(&mut self) -> Vec<Job> {
        let mut events = Vec::new();
        match signals::block_sigchld() {
            Ok(_blocked) => signals::drain(|event| events.push(event)),
            Err(e) => {
                error!("jobsh: cannot collect finished jobs: {}", e);
                return Vec::new();
            }
        }

        let mut changed: Vec<Job> = events
            .into_iter()
            .filter_map(|event| self.update(event.pid, event.status))
            .collect();
        changed.sort_by_key(|job| job.index);
        changed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::shell::parser::tokenize;
    use crate::shell::process::build_with_path;
    use pretty_assertions::assert_eq;
    use std::ffi::OsStr;

    fn process(line: &str, pid: i32) -> Process {
        let tokens = tokenize(line).unwrap();
        let search = OsStr::new("/bin:/usr/bin");
        let mut process = build_with_path(&tokens, Some(search)).unwrap().unwrap();
        process.pid = Some(Pid::from_raw(pid));
        process.pgid = Some(Pid::from_raw(pid));
        process
    }

    #[test]
    fn test_indexes_reuse_smallest_free() {
        let mut jobs = JobManager::new();
        assert_eq!(jobs.add_job(process("sh -c true &", 101)), Some(1));
        assert_eq!(jobs.add_job(process("sh -c true &", 102)), Some(2));
        assert_eq!(jobs.add_job(process("sh -c true &", 103)), Some(3));
        jobs.remove_job(Pid::from_raw(102)).unwrap();
        assert_eq!(jobs.add_job(process("sh -c true &", 104)), Some(2));

        let indexes: Vec<usize> = [101, 104, 103]
            .iter()
            .map(|pid| jobs.get(Pid::from_raw(*pid)).unwrap().index)
            .collect();
        assert_eq!(indexes, vec![1, 2, 3]);
    }

    #[test]
    fn test_unforked_process_is_rejected() {
        let mut jobs = JobManager::new();
        let mut unforked = process("sh", 1);
        unforked.pid = None;
        assert_eq!(jobs.add_job(unforked), None);
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_update_finishes_and_stops() {
        let mut jobs = JobManager::new();
        jobs.add_job(process("sh -c 'sleep 1'", 201));

        let stopped = jobs
            .update(Pid::from_raw(201), JobStatus::Stopped(Signal::SIGTSTP))
            .unwrap();
        assert_eq!(stopped.status, JobStatus::Stopped(Signal::SIGTSTP));
        assert!(stopped.is_bg());
        assert_eq!(jobs.len(), 1);

        let done = jobs
            .update(Pid::from_raw(201), JobStatus::Killed(Signal::SIGKILL))
            .unwrap();
        assert_eq!(done.status, JobStatus::Killed(Signal::SIGKILL));
        assert!(jobs.is_empty());
        assert!(jobs.update(Pid::from_raw(201), JobStatus::Done(0)).is_none());
    }

    #[test]
    fn test_display() {
        let mut jobs = JobManager::new();
        jobs.add_job(process("sh -c 'sleep 5' &", 301));
        let job = jobs.get(Pid::from_raw(301)).unwrap();
        assert_eq!(job.to_string(), "[1] 301 running sh -c 'sleep 5'");

        let done = jobs.update(Pid::from_raw(301), JobStatus::Done(0)).unwrap();
        assert_eq!(done.to_string(), "[1] 301 done sh -c 'sleep 5'");
    }
}
