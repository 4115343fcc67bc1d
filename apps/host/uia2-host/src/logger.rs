//! Process-wide logging for the host.
//!
//! Everything logged through the `log` facade (including driver-core) goes to
//! colored stdout and to a plain `uia2-host.log` in the log directory.

use crate::error::HostError;

use std::fmt::Arguments;
use std::io::stdout;
use std::path::Path;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use fern::{Dispatch, FormatCallback};
use humantime::format_rfc3339;
use log::{LevelFilter, Record, info, warn};

static INIT_LOGGER_ONCE: Once = Once::new();

/// Set by the first call, successful or not.
static LOGGER_ALREADY_CALLED: AtomicBool = AtomicBool::new(false);

pub const LOG_FILE_NAME: &str = "uia2-host.log";

const LOGGER_INITIALIZED_MESSAGE_PREFIX: &str = "Logger initialized with level: ";

const LOGGER_ALREADY_INITIALIZED_MESSAGE: &str = "Logger already initialized";

#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Install the stdout + file logger.
///
/// Only the first call does anything; later calls log a warning and return
/// `Ok`.
///
/// # Errors
///
/// Returns `HostError::Host` when the log file cannot be opened or a global
/// logger is already installed by someone else.
pub fn initialize(log_dir: &Path) -> Result<(), HostError> {
    if LOGGER_ALREADY_CALLED.swap(true, Ordering::SeqCst) {
        warn!("{LOGGER_ALREADY_INITIALIZED_MESSAGE}");
        return Ok(());
    }

    let mut result = Ok(());

    INIT_LOGGER_ONCE.call_once(|| {
        result = initialize_internal(log_dir);
        if result.is_ok() {
            info!("{LOGGER_INITIALIZED_MESSAGE_PREFIX}{LOG_LEVEL:?}");
        }
    });

    result
}

#[track_caller]
fn initialize_internal(log_dir: &Path) -> Result<(), HostError> {
    let log_file_path = log_dir.join(LOG_FILE_NAME);

    let colors = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let stdout_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            write_line(out, message, record, colors.color(record.level()))
        })
        .chain(stdout());

    let log_file = fern::log_file(&log_file_path).map_err(|e| {
        HostError::host(format!(
            "Failed to create log file {}: {e}",
            log_file_path.display()
        ))
    })?;

    let file_dispatch = Dispatch::new()
        .format(|out, message, record| write_line(out, message, record, record.level()))
        .chain(log_file);

    Dispatch::new()
        .level(LOG_LEVEL)
        .chain(stdout_dispatch)
        .chain(file_dispatch)
        .apply()
        .map_err(|e| HostError::host(format!("Failed to initialize logger: {e}")))
}

fn write_line(
    out: FormatCallback<'_>,
    message: &Arguments<'_>,
    record: &Record<'_>,
    level: impl std::fmt::Display,
) {
    out.finish(format_args!(
        "[{date} - {level}] {message} [{file}:{line}]",
        date = format_rfc3339(SystemTime::now()),
        file = record.file().unwrap_or("unknown"),
        line = record.line().unwrap_or(0),
    ))
}
