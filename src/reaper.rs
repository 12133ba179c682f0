//! Collecting the termination status of spawned children.
//!
//! A foreground pipeline is waited on pid by pid, so a job started earlier in
//! the background is never collected by accident. Background pids are kept
//! until a non-blocking sweep sees them exit.

use crate::command::ExitCode;
use crate::external::ProcessHandle;
use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;

/// Owner of every child the interpreter has not collected yet.
#[derive(Debug, Default)]
pub struct Reaper {
    background: Vec<Pid>,
}

impl Reaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until every process of this pipeline has terminated and
    /// returns their exit codes in stage order.
    ///
    /// An interrupt arriving during the wait does not cancel it.
    pub fn wait_foreground(&mut self, handles: Vec<ProcessHandle>) -> Vec<ExitCode> {
        handles
            .into_iter()
            .map(|handle| {
                let code = wait_for_exit(handle.pid());
                log::debug!("stage {} (pid {}) exited with {code}", handle.stage(), handle.pid());
                code
            })
            .collect()
    }

    /// Takes ownership of the handles without waiting.
    pub fn release_background(&mut self, handles: Vec<ProcessHandle>) {
        for handle in handles {
            log::debug!("pid {} left running in the background", handle.pid());
            self.background.push(handle.pid());
        }
    }

    /// Collects background children that have already exited, without
    /// blocking. Returns how many were collected.
    pub fn collect_finished(&mut self) -> usize {
        let before = self.background.len();
        self.background.retain(|&pid| match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => true,
            Ok(status) => match exit_code(status) {
                Some(code) => {
                    log::debug!("background pid {pid} exited with {code}");
                    false
                }
                None => true,
            },
            Err(Errno::EINTR) => true,
            Err(errno) => {
                log::debug!("background pid {pid} no longer waitable: {errno}");
                false
            }
        });
        before - self.background.len()
    }

    /// Number of background children not collected yet.
    pub fn outstanding(&self) -> usize {
        self.background.len()
    }
}

fn wait_for_exit(pid: Pid) -> ExitCode {
    loop {
        match waitpid(pid, None) {
            Ok(status) => {
                if let Some(code) = exit_code(status) {
                    return code;
                }
            }
            Err(Errno::EINTR) => continue,
            Err(errno) => {
                log::warn!("waitpid({pid}): {errno}");
                return -1;
            }
        }
    }
}

/// Exit code of a terminated child, `None` while it is still around.
fn exit_code(status: WaitStatus) -> Option<ExitCode> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(128 + signal as i32),
        _ => None,
    }
}
