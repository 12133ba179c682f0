//! Values describing one command line after it has been split into stages.
//!
//! Both [`Stage`] and [`Pipeline`] are built fresh for every line and are never
//! mutated afterwards; the spawner only borrows them.

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// A child killed by a signal is reported as `128 + signal`, the way POSIX
/// shells do.
pub type ExitCode = i32;

/// One command of a pipeline: the program name followed by its arguments,
/// with any `<` / `>` operators and their operands still in place.
///
/// Redirections are only pulled apart inside the spawned child (see
/// [`crate::redirect`]), so a malformed redirection can never disturb the
/// interpreter's own descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    words: Vec<String>,
}

impl Stage {
    /// Wraps a non-empty run of words. Returns `None` for an empty run.
    pub fn new(words: Vec<String>) -> Option<Self> {
        if words.is_empty() {
            None
        } else {
            Some(Self { words })
        }
    }

    /// Raw words of the stage, program name first.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// The first word, i.e. the program this stage intends to run.
    pub fn program(&self) -> &str {
        &self.words[0]
    }
}

/// Ordered stages connected by pipes, plus the background flag of the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
    background: bool,
}

impl Pipeline {
    pub(crate) fn new(stages: Vec<Stage>, background: bool) -> Self {
        debug_assert!(!stages.is_empty());
        Self { stages, background }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Whether the interpreter returns to the prompt without waiting.
    pub fn is_background(&self) -> bool {
        self.background
    }

    /// Number of internal pipes the spawner creates: one per stage boundary.
    pub fn pipe_count(&self) -> usize {
        self.stages.len() - 1
    }
}
