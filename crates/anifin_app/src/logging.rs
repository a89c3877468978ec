//! Process logging for the `anifin` binary.
//!
//! Writes to `./anifin.log` in the current working directory and, when
//! configured, to the terminal as well.

use std::fs::File;
use std::path::PathBuf;

use engine_logging::parse_level_filter;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

use crate::config::AppConfig;

const LOG_FILE: &str = "./anifin.log";

/// Initialize the global logger from `config`. Unknown level names fall back
/// to `info`.
pub fn initialize(config: &AppConfig) {
    let level = parse_level_filter(&config.log_level).unwrap_or_else(|| {
        eprintln!(
            "Warning: unknown log level {:?}, using info",
            config.log_level
        );
        LevelFilter::Info
    });
    let logger_config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if config.log_to_terminal {
        loggers.push(TermLogger::new(
            level,
            logger_config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    if let Some(file_logger) = create_file_logger(level, logger_config) {
        loggers.push(file_logger);
    }
    if loggers.is_empty() {
        return;
    }

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("rustls")
        .build()
}

fn create_file_logger(level: LevelFilter, config: Config) -> Option<Box<WriteLogger<File>>> {
    let log_path = PathBuf::from(LOG_FILE);
    match File::create(&log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}
