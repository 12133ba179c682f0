//! A small interactive shell built around a pipeline execution engine.
//!
//! A command line is split into whitespace-delimited words, grouped into
//! stages on `|`, and every stage is forked as its own process with its
//! standard streams wired to the neighbouring pipes. `<` and `>` redirect a
//! stage's input and output to files, and a `&` anywhere on the line runs the
//! pipeline in the background.
//!
//! The main entry point is [`Interpreter`]. The front end ([`lexer`],
//! [`parser`], [`command`]) is pure; [`external`], [`redirect`], [`reaper`]
//! and [`signals`] are the parts that talk to the operating system.

mod builtin;
pub mod command;
pub mod config;
pub mod external;
pub mod history;
mod interpreter;
pub mod lexer;
pub mod logging;
pub mod parser;
pub mod reaper;
pub mod redirect;
pub mod session;
pub mod signals;

/// Name used as the prefix of every diagnostic.
pub const PROGRAM_NAME: &str = "pipeshell";

pub use builtin::Flow;
pub use config::Config;
pub use interpreter::{Interpreter, report};
