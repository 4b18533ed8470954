//! Console logger for the `log` facade
//!
//! Lines look like `[12:04:31] [INFO] message` and go to stderr. The last
//! [`CONSOLE_LINES`] lines are also kept in memory so a front-end can show a
//! console panel.

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::collections::VecDeque;
use std::sync::{Mutex, OnceLock};

/// Lines kept in the in-memory console
pub const CONSOLE_LINES: usize = 500;

pub struct ConsoleLogger {
    level: LevelFilter,
    lines: Mutex<VecDeque<String>>,
}

static LOGGER: OnceLock<ConsoleLogger> = OnceLock::new();

impl ConsoleLogger {
    fn new(level: LevelFilter) -> Self {
        Self {
            level,
            lines: Mutex::new(VecDeque::with_capacity(CONSOLE_LINES)),
        }
    }

    fn push(&self, line: String) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if lines.len() >= CONSOLE_LINES {
            lines.pop_front();
        }
        lines.push_back(line);
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(&chrono::Local::now().format("%H:%M:%S").to_string(), record.level(), &record.args().to_string());
        eprintln!("{}", line);
        self.push(line);
    }

    fn flush(&self) {}
}

fn format_line(timestamp: &str, level: Level, message: &str) -> String {
    format!("[{}] [{}] {}", timestamp, level, message)
}

/// Install the console logger. Fails if another logger is already set.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    let logger = LOGGER.get_or_init(|| ConsoleLogger::new(level));
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Snapshot of the in-memory console, oldest first
pub fn recent_lines() -> Vec<String> {
    match LOGGER.get() {
        Some(logger) => logger
            .lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect(),
        None => Vec::new(),
    }
}
