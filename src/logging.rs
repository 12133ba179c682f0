use anyhow::{Context, Result};
use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode, WriteLogger};
use std::fs::OpenOptions;
use std::path::Path;

/// Install the process-wide logger.
///
/// Records go to `file` (appended) when one is given, otherwise to standard
/// error. The file is opened close-on-exec, so spawned programs never inherit
/// it.
pub fn init(level: LevelFilter, file: Option<&Path>) -> Result<()> {
    let config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();

    match file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("can't open log file {}", path.display()))?;
            WriteLogger::init(level, config, file)?;
        }
        None => TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto)?,
    }
    Ok(())
}
