//! Session logging for release runs.
//!
//! `LogCollector` implements `log::Log` and writes every record twice: to
//! stderr for the operator and to a per-session file under `logs/` so a
//! failed multi-hour build leaves a complete transcript behind.
//!
//! ```text
//! log::info!() / backend output
//!     |
//! [LogCollector]
//!     |
//! +---+-------------------+
//! |                       |
//! stderr        logs/gitian-build-<ts>.log
//! ```

use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A formatted log line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: String,
    pub level: log::Level,
    pub message: String,
}

impl LogLine {
    pub fn new(level: log::Level, message: impl Into<String>) -> Self {
        LogLine {
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
            level,
            message: message.into(),
        }
    }

    /// Format: `[HH:MM:SS.mmm] [LEVEL] message`
    pub fn render(&self) -> String {
        format!("[{}] [{}] {}", self.timestamp, self.level, self.message)
    }
}

/// Session log file name for the current time
pub fn session_file_name() -> String {
    format!("gitian-build-{}.log", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Dual stderr/file logger
#[derive(Clone)]
pub struct LogCollector {
    level: LevelFilter,
    session_path: PathBuf,
    file: Arc<Mutex<File>>,
    echo_stderr: bool,
}

impl LogCollector {
    /// Create the logs directory and open a new session file in it.
    pub fn new(log_dir: &Path, level: LevelFilter) -> io::Result<Self> {
        std::fs::create_dir_all(log_dir)?;
        let session_path = log_dir.join(session_file_name());
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&session_path)?;

        Ok(LogCollector {
            level,
            session_path,
            file: Arc::new(Mutex::new(file)),
            echo_stderr: true,
        })
    }

    /// Stop echoing to stderr; only the session file is written.
    pub fn quiet(mut self) -> Self {
        self.echo_stderr = false;
        self
    }

    pub fn session_log_path(&self) -> &Path {
        &self.session_path
    }

    /// Register as the global logger for the `log` macros.
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self)).map(|()| log::set_max_level(level))
    }

    /// Write one line to the configured sinks.
    pub fn write_line(&self, line: &LogLine) {
        let rendered = line.render();
        if self.echo_stderr {
            eprintln!("{}", rendered);
        }
        if let Ok(mut file) = self.file.lock() {
            // A failing disk must not take the build down with it.
            let _ = writeln!(file, "{}", rendered);
        }
    }
}

impl Log for LogCollector {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.write_line(&LogLine::new(record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}
