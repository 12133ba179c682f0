//! Redirection resolution for a single stage.
//!
//! [`resolve`] is pure and can run anywhere; [`Invocation::apply`] rewires the
//! calling process's standard input and output and must only be called in a
//! freshly forked child.

use crate::command::Stage;
use nix::errno::Errno;
use nix::unistd;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const INPUT_OPERATOR: &str = "<";
pub const OUTPUT_OPERATOR: &str = ">";

/// Permission bits for files created by `>`: rw-r--r--.
const OUTPUT_MODE: u32 = 0o644;

#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("syntax error: missing file name after '{operator}'")]
    MissingTarget { operator: &'static str },
    #[error("syntax error: redirection without a command")]
    EmptyCommand,
    #[error("{}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("dup2: {source}")]
    Duplicate {
        #[source]
        source: Errno,
    },
}

/// A stage with its redirections pulled out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program name followed by its arguments; never empty.
    pub argv: Vec<String>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// Scans the stage's words left to right, extracting `<` / `>` and the word
/// following each of them.
///
/// A repeated operator replaces the earlier target.
pub fn resolve(stage: &Stage) -> Result<Invocation, RedirectError> {
    let mut argv = Vec::with_capacity(stage.words().len());
    let mut input = None;
    let mut output = None;

    let mut words = stage.words().iter();
    while let Some(word) = words.next() {
        let (slot, operator) = match word.as_str() {
            INPUT_OPERATOR => (&mut input, INPUT_OPERATOR),
            OUTPUT_OPERATOR => (&mut output, OUTPUT_OPERATOR),
            _ => {
                argv.push(word.clone());
                continue;
            }
        };
        let target = words
            .next()
            .ok_or(RedirectError::MissingTarget { operator })?;
        *slot = Some(PathBuf::from(target));
    }

    if argv.is_empty() {
        return Err(RedirectError::EmptyCommand);
    }
    Ok(Invocation {
        argv,
        input,
        output,
    })
}

impl Invocation {
    /// Opens the redirection targets and moves them over standard input and
    /// standard output of the current process.
    pub fn apply(&self) -> Result<(), RedirectError> {
        if let Some(path) = &self.input {
            let file = open_input(path)?;
            replace_fd(&file, libc::STDIN_FILENO)?;
        }
        if let Some(path) = &self.output {
            let file = open_output(path)?;
            replace_fd(&file, libc::STDOUT_FILENO)?;
        }
        Ok(())
    }
}

fn open_input(path: &Path) -> Result<File, RedirectError> {
    File::open(path).map_err(|source| RedirectError::Open {
        path: path.to_owned(),
        source,
    })
}

fn open_output(path: &Path) -> Result<File, RedirectError> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(OUTPUT_MODE)
        .open(path)
        .map_err(|source| RedirectError::Open {
            path: path.to_owned(),
            source,
        })
}

/// Duplicates `file` onto `target`; the original descriptor is closed when
/// `file` goes out of scope in the caller.
fn replace_fd(file: &File, target: RawFd) -> Result<(), RedirectError> {
    unistd::dup2(file.as_raw_fd(), target)
        .map(drop)
        .map_err(|source| RedirectError::Duplicate { source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn stage(line: &str) -> Stage {
        Stage::new(line.split_whitespace().map(str::to_string).collect()).unwrap()
    }

    #[test]
    fn test_plain_stage_has_no_redirections() {
        let inv = resolve(&stage("grep -n main")).unwrap();
        assert_eq!(inv.argv, vec!["grep", "-n", "main"]);
        assert_eq!(inv.input, None);
        assert_eq!(inv.output, None);
    }

    #[test]
    fn test_input_and_output_are_extracted() {
        let inv = resolve(&stage("sort -r < in.txt > out.txt")).unwrap();
        assert_eq!(inv.argv, vec!["sort", "-r"]);
        assert_eq!(inv.input, Some(PathBuf::from("in.txt")));
        assert_eq!(inv.output, Some(PathBuf::from("out.txt")));
    }

    #[test]
    fn test_redirection_may_precede_arguments() {
        let inv = resolve(&stage("cat < in.txt -n")).unwrap();
        assert_eq!(inv.argv, vec!["cat", "-n"]);
        assert_eq!(inv.input, Some(PathBuf::from("in.txt")));
    }

    #[test]
    fn test_last_target_wins() {
        let inv = resolve(&stage("echo hi > a.txt > b.txt")).unwrap();
        assert_eq!(inv.argv, vec!["echo", "hi"]);
        assert_eq!(inv.output, Some(PathBuf::from("b.txt")));
    }

    #[test]
    fn test_bare_operator_is_missing_target() {
        let err = resolve(&stage("cat <")).unwrap_err();
        assert!(matches!(err, RedirectError::MissingTarget { operator: "<" }));

        let err = resolve(&stage("ls >")).unwrap_err();
        assert!(matches!(err, RedirectError::MissingTarget { operator: ">" }));
    }

    #[test]
    fn test_redirection_only_is_empty_command() {
        let err = resolve(&stage("> out.txt")).unwrap_err();
        assert!(matches!(err, RedirectError::EmptyCommand));
    }

    #[test]
    fn test_operator_consumes_next_word_even_if_operator() {
        // `> <` writes to a file literally named "<".
        let inv = resolve(&stage("echo > <")).unwrap();
        assert_eq!(inv.output, Some(PathBuf::from("<")));
    }

    #[test]
    fn test_open_output_truncates_and_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let path = std::env::temp_dir().join(format!("redirect_tests_{}_out", std::process::id()));
        fs::write(&path, "previous contents").unwrap();
        drop(open_output(&path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");

        let _ = fs::remove_file(&path);
        drop(open_output(&path).unwrap());
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        // The process umask may only clear bits.
        assert_eq!(mode & !OUTPUT_MODE, 0);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_open_missing_input_reports_path() {
        let path = Path::new("/nonexistent/redirect_tests/input.txt");
        let err = open_input(path).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/redirect_tests/input.txt"));
    }
}
