use argh::FromArgs;
use log::LevelFilter;
use pipeshell::{Config, Interpreter};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(FromArgs)]
/// An interactive shell with pipes, redirection and background jobs.
struct Args {
    #[argh(option)]
    /// read settings from this TOML file instead of ~/.config/pipeshell/config.toml.
    config: Option<PathBuf>,

    #[argh(option)]
    /// log level: off, error, warn, info, debug or trace.
    log_level: Option<LevelFilter>,

    #[argh(option)]
    /// append log records to this file instead of standard error.
    log_file: Option<PathBuf>,

    #[argh(option, short = 'c')]
    /// run a single command line and exit.
    command: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(path) = &self.log_file {
            config.log_file = Some(path.clone());
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let args: Args = argh::from_env();
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    pipeshell::logging::init(config.log_level, config.log_file.as_deref())?;

    let mut sh = Interpreter::new(&config);
    match &args.command {
        Some(line) => match sh.run_command(line) {
            Ok(_) => Ok(ExitCode::SUCCESS),
            Err(e) => {
                pipeshell::report(&e);
                Ok(ExitCode::FAILURE)
            }
        },
        None => {
            sh.repl()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
