//! Launching a pipeline as a chain of child processes.
//!
//! Every stage is forked in left-to-right order. Stage `i` writes into pipe
//! `i` and stage `i + 1` reads from it; the first stage reads the
//! interpreter's standard input and the last one writes to its standard
//! output unless redirected. Pipe ends are [`OwnedFd`]s, so each process
//! closes whatever it does not keep simply by dropping it.

use crate::command::{ExitCode, Pipeline, Stage};
use crate::redirect::{self, RedirectError};
use crate::signals;
use nix::errno::Errno;
#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
use nix::fcntl::OFlag;
use nix::unistd::{self, ForkResult, Pid};
use std::convert::Infallible;
use std::ffi::{CString, NulError};
use std::fmt;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use thiserror::Error;

/// A spawned child of the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pid: Pid,
    stage: usize,
}

impl ProcessHandle {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Position of the stage this process runs, counted from 0.
    pub fn stage(&self) -> usize {
        self.stage
    }
}

/// Failure to create the resources for the next stage.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("pipe: {0}")]
    Pipe(#[source] Errno),
    #[error("fork: {0}")]
    Fork(#[source] Errno),
}

/// A pipeline that could only be partially launched.
///
/// `spawned` holds the stages already running; they are not stopped and
/// are handed to the reaper by the caller.
#[derive(Debug)]
pub struct SpawnFailure {
    pub error: SpawnError,
    pub spawned: Vec<ProcessHandle>,
}

impl fmt::Display for SpawnFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} ({} stage(s) already started)",
            self.error,
            self.spawned.len()
        )
    }
}

impl std::error::Error for SpawnFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Everything that can stop a child before its program image is replaced.
#[derive(Debug, Error)]
enum ChildError {
    #[error("setpgid: {0}")]
    Group(#[source] Errno),
    #[error("sigaction: {0}")]
    Signal(#[source] Errno),
    #[error("dup2: {0}")]
    Wire(#[source] Errno),
    #[error(transparent)]
    Redirect(#[from] RedirectError),
    #[error("argument contains a NUL byte: {0}")]
    Nul(#[from] NulError),
    #[error("{program}: {source}")]
    Exec {
        program: String,
        #[source]
        source: Errno,
    },
}

impl ChildError {
    fn exit_code(&self) -> ExitCode {
        match self {
            ChildError::Exec {
                source: Errno::ENOENT,
                ..
            } => 127,
            ChildError::Exec { .. } => 126,
            _ => 1,
        }
    }
}

/// Forks one process per stage and wires them together.
///
/// Returns the handles in stage order. On a pipe or fork failure the
/// remaining stages are skipped and the handles of the stages already
/// running come back inside the [`SpawnFailure`].
///
/// A background pipeline is moved into a process group of its own, led by
/// its first stage, so an interrupt aimed at the terminal's foreground group
/// never reaches it. This is not job control: the group is never brought
/// back to the foreground.
pub fn spawn_pipeline(pipeline: &Pipeline) -> Result<Vec<ProcessHandle>, SpawnFailure> {
    let stages = pipeline.stages();
    let mut handles = Vec::with_capacity(stages.len());
    // Read end of the previous stage's pipe, owned by the parent until the
    // next child has been forked.
    let mut carried: Option<OwnedFd> = None;
    let mut placement = if pipeline.is_background() {
        Placement::NewGroup
    } else {
        Placement::Inherit
    };

    for (index, stage) in stages.iter().enumerate() {
        let outgoing = if index + 1 < stages.len() {
            match open_pipe() {
                Ok(ends) => Some(ends),
                Err(errno) => return Err(abort(SpawnError::Pipe(errno), handles)),
            }
        } else {
            None
        };

        // Buffered output would otherwise be written twice.
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();

        // SAFETY: the interpreter is single-threaded; the child only touches
        // descriptors and its own copy of the stage before exec or _exit.
        match unsafe { unistd::fork() } {
            Ok(ForkResult::Child) => run_child(stage, placement, carried, outgoing),
            Ok(ForkResult::Parent { child }) => {
                log::debug!("stage {index} ({}) started as pid {child}", stage.program());
                // Same call as in the child, so the group is set whichever side runs first.
                if let Some(group) = placement.group_for(child) {
                    if let Err(errno) = unistd::setpgid(child, group) {
                        log::debug!("setpgid({child}, {group}): {errno}");
                    }
                    placement = Placement::Join(group);
                }
                handles.push(ProcessHandle { pid: child, stage: index });
                drop(carried.take());
                carried = outgoing.map(|(read, write)| {
                    drop(write);
                    read
                });
            }
            Err(errno) => return Err(abort(SpawnError::Fork(errno), handles)),
        }
    }

    Ok(handles)
}

/// Process group a forked stage ends up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Stay in the interpreter's group.
    Inherit,
    /// Lead a new group named after the stage's own pid.
    NewGroup,
    /// Join the group started by an earlier stage.
    Join(Pid),
}

impl Placement {
    /// Group that `pid` has to be moved to, if any.
    fn group_for(self, pid: Pid) -> Option<Pid> {
        match self {
            Placement::Inherit => None,
            Placement::NewGroup => Some(pid),
            Placement::Join(group) => Some(group),
        }
    }
}

/// Both ends are close-on-exec; `dup2` clears the flag on the copy that
/// becomes a standard stream.
#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
fn open_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    unistd::pipe2(OFlag::O_CLOEXEC)
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
fn open_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    unistd::pipe()
}

fn abort(error: SpawnError, spawned: Vec<ProcessHandle>) -> SpawnFailure {
    log::warn!("{error}; {} stage(s) left running", spawned.len());
    SpawnFailure { error, spawned }
}

/// Body of a forked child. Never returns into interpreter code.
fn run_child(
    stage: &Stage,
    placement: Placement,
    carried: Option<OwnedFd>,
    outgoing: Option<(OwnedFd, OwnedFd)>,
) -> ! {
    let code = match exec_stage(stage, placement, carried, outgoing) {
        Ok(never) => match never {},
        Err(err) => {
            eprintln!("{}: {err}", crate::PROGRAM_NAME);
            err.exit_code()
        }
    };
    // SAFETY: _exit skips the interpreter's atexit handlers and buffers,
    // which belong to the parent.
    unsafe { libc::_exit(code) }
}

fn exec_stage(
    stage: &Stage,
    placement: Placement,
    carried: Option<OwnedFd>,
    outgoing: Option<(OwnedFd, OwnedFd)>,
) -> Result<Infallible, ChildError> {
    if let Some(group) = placement.group_for(unistd::getpid()) {
        unistd::setpgid(Pid::from_raw(0), group).map_err(ChildError::Group)?;
    }
    signals::restore_default().map_err(ChildError::Signal)?;

    if let Some(read) = carried {
        wire(&read, libc::STDIN_FILENO)?;
        drop(read);
    }
    if let Some((read, write)) = outgoing {
        wire(&write, libc::STDOUT_FILENO)?;
        drop(read);
        drop(write);
    }

    let invocation = redirect::resolve(stage)?;
    invocation.apply()?;

    let argv = invocation
        .argv
        .iter()
        .map(|arg| CString::new(arg.as_str()))
        .collect::<Result<Vec<_>, _>>()?;
    unistd::execvp(&argv[0], &argv).map_err(|source| ChildError::Exec {
        program: invocation.argv[0].clone(),
        source,
    })
}

fn wire(fd: &OwnedFd, target: RawFd) -> Result<(), ChildError> {
    unistd::dup2(fd.as_raw_fd(), target)
        .map(drop)
        .map_err(ChildError::Wire)
}
