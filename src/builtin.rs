use crate::session::Session;
use anyhow::{Result, anyhow};
use argh::{EarlyExit, FromArgs};
use nix::errno::Errno;
use nix::unistd;
use std::io::Write;

/// What the read loop should do after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// in-process; they never spawn a child.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd".
    const NAME: &'static str;

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<Flow>;
}

pub(crate) type BuiltinFn = fn(&[&str], &mut dyn Write, &mut Session) -> Result<Flow>;

/// Looks up the builtin called `name`.
pub(crate) fn match_builtin(name: &str) -> Option<BuiltinFn> {
    match name {
        n if n == Cd::NAME => Some(run::<Cd>),
        n if n == Exit::NAME => Some(run::<Exit>),
        n if n == History::NAME => Some(run::<History>),
        _ => None,
    }
}

fn run<T: BuiltinCommand>(args: &[&str], stdout: &mut dyn Write, session: &mut Session) -> Result<Flow> {
    match T::from_args(&[T::NAME], args) {
        Ok(cmd) => cmd.execute(stdout, session),
        Err(EarlyExit { output, status }) => match status {
            Ok(()) => {
                stdout.write_all(output.as_bytes())?;
                Ok(Flow::Continue)
            }
            Err(()) => Err(anyhow!("{}", output.trim_end())),
        },
    }
}

/// Formats an errno the way `cd` reports failures.
fn os_error(errno: Errno) -> anyhow::Error {
    anyhow!("Error {} ({})", errno as i32, errno.desc())
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    const NAME: &'static str = "cd";

    fn execute(self, _stdout: &mut dyn Write, _session: &mut Session) -> Result<Flow> {
        let target = self.target.ok_or_else(|| os_error(Errno::EINVAL))?;
        unistd::chdir(target.as_str()).map_err(os_error)?;
        log::debug!("working directory changed to {target}");
        Ok(Flow::Continue)
    }
}

#[derive(FromArgs)]
/// Exit the shell.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    const NAME: &'static str = "exit";

    fn execute(self, _stdout: &mut dyn Write, _session: &mut Session) -> Result<Flow> {
        Ok(Flow::Exit)
    }
}

#[derive(FromArgs)]
/// List the command lines entered in this session, oldest first.
pub struct History {}

impl BuiltinCommand for History {
    const NAME: &'static str = "history";

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<Flow> {
        write!(stdout, "{}", session.history)?;
        Ok(Flow::Continue)
    }
}
