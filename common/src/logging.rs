//! helper functions for the logging backend
use crate::util::find_project_root;
use crate::AwResult;
use flexi_logger::{
    self, writers::FileLogWriter, Duplicate, FlexiLoggerError, LogTarget, Logger,
};
use log::Level::Warn;
use std::fs;

/// Creates a logging backend
/// By default all logs with Info or higher are written to a logfile in folder logs.
/// All logs with level at least Info are also written to stdout.
/// Logs with level at least Error are also written to stderr.
/// The level can be overridden with `RUST_LOG`.
///
/// logs can be written via log::{error!, warn!, info!, debug!, trace!}
pub fn init_logging() -> AwResult<()> {
    let mut output_dir = find_project_root()?;
    output_dir.push("logs");
    fs::create_dir(&output_dir).unwrap_or_else(|_| {});
    let file_writer = FileLogWriter::builder()
        .directory(output_dir)
        .format(flexi_logger::colored_opt_format)
        .try_build()?;
    Logger::with_env_or_str("info")
        .format(flexi_logger::colored_opt_format)
        .log_target(LogTarget::Writer(Box::new(file_writer)))
        .duplicate_to_stdout(Duplicate::Info)
        .duplicate_to_stderr(Duplicate::Error)
        .start()?;
    log_panics::init();
    Ok(())
}

/// Creates a logging backend for use in testing
/// By default all logs with Warn or higher are printed to stdout.
/// Calling this more than once, also from several threads, is fine.
pub fn init_test_logging() {
    if !log::log_enabled!(Warn) {
        match Logger::with_env_or_str("warn")
            .format(flexi_logger::colored_opt_format)
            .start()
        {
            // another test thread set the logger in between
            Ok(_) | Err(FlexiLoggerError::Log(_)) => {}
            Err(error) => panic!("Logging initialization failed: {}", error),
        }
    }
}
