use std::fs::OpenOptions;
use std::path::Path;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Problems (warnings and errors) are appended here as well as printed.
pub const ERROR_LOG: &str = "error.log";

/// Installs the global logger: the terminal at info (or debug with
/// `verbose`), plus `error_log` for warnings and errors. If the side file
/// cannot be opened the run continues with terminal logging only.
pub fn init_logging(verbose: bool, error_log: &Path) -> Result<(), log::SetLoggerError> {
    let mut builder = ConfigBuilder::new();
    builder
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off);
    // stays at UTC when the local offset is unknown
    let _ = builder.set_time_offset_to_local();
    let config = builder.build();

    let term_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        term_level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    match OpenOptions::new().create(true).append(true).open(error_log) {
        Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Warn, config, file)),
        Err(e) => eprintln!(
            "Failed to open error log file '{}': {}",
            error_log.display(),
            e
        ),
    }

    CombinedLogger::init(loggers)
}
