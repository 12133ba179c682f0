use crate::builtin::{self, Flow};
use crate::command::Pipeline;
use crate::config::Config;
use crate::external::{self, SpawnFailure};
use crate::lexer;
use crate::parser::{self, PIPE_MARKER};
use crate::redirect::{INPUT_OPERATOR, OUTPUT_OPERATOR};
use crate::session::Session;
use crate::signals::Interrupts;
use anyhow::Context;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Write};

/// An interactive command interpreter.
///
/// Each line is either a built-in (`cd`, `exit`, `history`) or a pipeline of
/// external programs, started with one process per stage and waited on
/// unless the line asked for background execution.
///
/// Example
/// ```no_run
/// use pipeshell::{Config, Interpreter};
/// let mut sh = Interpreter::new(&Config::default());
/// sh.execute_line("echo hello | tr a-z A-Z", &mut std::io::stdout()).unwrap();
/// ```
pub struct Interpreter {
    session: Session,
    max_line: usize,
}

impl Interpreter {
    pub fn new(config: &Config) -> Self {
        Self {
            session: Session::new(config.history_size),
            max_line: config.max_line,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs one command line.
    ///
    /// Built-ins write to `stdout`; external programs inherit the process's
    /// standard streams. Returns `Flow::Exit` when the line asked to leave.
    pub fn execute_line(&mut self, line: &str, stdout: &mut dyn Write) -> anyhow::Result<Flow> {
        let tokens = lexer::split_into_tokens(line);
        if tokens.is_empty() {
            return Ok(Flow::Continue);
        }

        if let Some(builtin) = builtin::match_builtin(&tokens.words[0]) {
            // Builtins run in-process; pipes and redirections after them are ignored.
            let args: Vec<&str> = tokens.words[1..]
                .iter()
                .map(String::as_str)
                .take_while(|word| ![PIPE_MARKER, INPUT_OPERATOR, OUTPUT_OPERATOR].contains(word))
                .collect();
            return builtin(&args, stdout, &mut self.session);
        }

        let pipeline = parser::construct_pipeline(tokens)?;
        self.launch(&pipeline)?;
        Ok(Flow::Continue)
    }

    fn launch(&mut self, pipeline: &Pipeline) -> Result<(), SpawnFailure> {
        let reaper = &mut self.session.reaper;
        let handles = match external::spawn_pipeline(pipeline) {
            Ok(handles) => handles,
            Err(mut failure) => {
                reaper.release_background(std::mem::take(&mut failure.spawned));
                return Err(failure);
            }
        };

        if pipeline.is_background() {
            reaper.release_background(handles);
        } else {
            let codes = reaper.wait_foreground(handles);
            log::debug!("pipeline finished with {codes:?}");
        }
        Ok(())
    }

    /// Executes a single line non-interactively, as for `-c`.
    pub fn run_command(&mut self, line: &str) -> anyhow::Result<Flow> {
        let line = clamp_line(line.to_string(), self.max_line);
        if !line.is_empty() {
            self.session.history.record(&line);
        }
        self.execute_line(&line, &mut io::stdout())
    }

    /// The read-eval loop. Returns on `exit` or end of input.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let interrupts = Interrupts::install().context("can't install SIGINT handler")?;
        let mut rl = DefaultEditor::new()?;

        loop {
            self.session.reaper.collect_finished();
            if interrupts.take_pending() {
                println!();
            }

            match rl.readline(&render_prompt()) {
                Ok(line) => {
                    let line = clamp_line(line, self.max_line);
                    if line.is_empty() {
                        continue;
                    }
                    self.session.history.record(&line);
                    if let Err(e) = rl.add_history_entry(line.as_str()) {
                        log::warn!("can't add line to editor history: {e}");
                    }

                    match self.execute_line(&line, &mut io::stdout()) {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Exit) => break,
                        Err(e) => report(&e),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    interrupts.take_pending();
                    println!();
                }
                Err(ReadlineError::Io(e)) if e.kind() == io::ErrorKind::Interrupted => {
                    interrupts.take_pending();
                    println!();
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}

/// Prints an error the way every diagnostic of the shell looks.
pub fn report(err: &anyhow::Error) {
    eprintln!("{}: {err:#}", crate::PROGRAM_NAME);
}

/// `<cwd>$ `, or a bare `$ ` when the working directory is unavailable.
fn render_prompt() -> String {
    match std::env::current_dir() {
        Ok(cwd) => format!("{}$ ", cwd.display()),
        Err(e) => {
            eprintln!("{}: getcwd: {e}", crate::PROGRAM_NAME);
            "$ ".to_string()
        }
    }
}

/// Cuts `line` down to at most `max` bytes, on a character boundary.
fn clamp_line(mut line: String, max: usize) -> String {
    if line.len() > max {
        let mut end = max;
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        log::warn!("command line of {} bytes truncated to {end}", line.len());
        line.truncate(end);
    }
    line
}
