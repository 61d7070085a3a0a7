use std::{
    fmt::Display,
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::PathBuf,
    sync::{LazyLock, RwLock},
};

use chrono::{Datelike, Timelike};
use regex::Regex;

use crate::{eeprintln, file_utils};

pub mod macros;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogType {
    Info,
    Warn,
    Error,
    Point,
}

impl Display for LogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                LogType::Info => "[info]",
                LogType::Warn => "[warn]",
                LogType::Error => "[error]",
                LogType::Point => "-",
            }
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    pub terminal: bool,
    pub file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            terminal: true,
            file: true,
        }
    }
}

/// Global logger state.
///
/// The log file is opened lazily on the first logged line,
/// and lines are written out by a background thread.
#[derive(Default)]
pub struct LoggingState {
    thread: Option<std::thread::JoinHandle<()>>,
    sender: Option<std::sync::mpsc::Sender<(String, LogType)>>,
    path: Option<PathBuf>,
    config: LogConfig,
}

impl LoggingState {
    #[must_use]
    pub fn create() -> Option<RwLock<LoggingState>> {
        Some(RwLock::new(Self::default()))
    }

    pub fn write_to_logfile(&mut self, s: &str, t: LogType) {
        if !self.config.file {
            return;
        }

        if self.sender.is_none() {
            let Some((file, path)) = get_logs_file() else {
                return;
            };
            let (sender, receiver) = std::sync::mpsc::channel::<(String, LogType)>();
            let thread = std::thread::spawn(move || {
                let mut writer = BufWriter::new(file);
                while let Ok((msg, t)) = receiver.recv() {
                    _ = writeln!(writer, "{t} {msg}");
                    _ = writer.flush();
                }
                _ = writer.get_ref().sync_all();
            });
            self.thread = Some(thread);
            self.sender = Some(sender);
            self.path = Some(path);
        }

        if let Some(sender) = &self.sender {
            _ = sender.send((s.to_owned(), t));
        }
    }

    /// Closes the log channel and waits for
    /// every pending line to reach the disk.
    pub fn finish(&mut self) {
        self.sender = None;
        if let Some(thread) = self.thread.take() {
            _ = thread.join();
        }
    }
}

pub fn set_config(c: LogConfig) {
    if let Some(l) = &*LOGGER {
        if let Ok(mut l) = l.write() {
            l.config = c;
        }
    }
}

/// Path of the log file for this session,
/// if anything has been logged yet.
#[must_use]
pub fn log_file_path() -> Option<PathBuf> {
    LOGGER
        .as_ref()
        .and_then(|l| l.read().ok())
        .and_then(|l| l.path.clone())
}

fn get_logs_file() -> Option<(File, PathBuf)> {
    let logs_dir = file_utils::get_launcher_dir().ok()?.join("logs");
    std::fs::create_dir_all(&logs_dir).ok()?;
    let now = chrono::Local::now();
    let log_file_name = format!(
        "{}-{}-{}-{}-{}-{}.log",
        now.year(),
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    );
    let log_file_path = logs_dir.join(log_file_name);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)
        .ok()?;
    Some((file, log_file_path))
}

pub static LOGGER: LazyLock<Option<RwLock<LoggingState>>> = LazyLock::new(LoggingState::create);

pub fn print_to_file(msg: &str, t: LogType) {
    if let Some(logger) = LOGGER.as_ref() {
        if let Ok(mut lock) = logger.write() {
            lock.write_to_logfile(&strip_ansi_codes(msg), t);
        } else {
            eeprintln!("sl_core::print::print_to_file(): Logger thread panicked!\n[msg]: {msg}");
        }
    }
}

pub fn logger_finish() {
    if let Some(logger) = LOGGER.as_ref() {
        if let Ok(mut lock) = logger.write() {
            lock.finish();
        } else {
            eeprintln!("sl_core::print::logger_finish(): Logger thread panicked!");
        }
    }
}

#[must_use]
pub fn is_print() -> bool {
    LOGGER
        .as_ref()
        .and_then(|l| l.read().ok())
        .is_none_or(|l| l.config.terminal)
}

/// Regex: ESC [ ... letters
/// ESC = `\x1B` or `\u{1b}`
static ANSI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\x1B\[[0-9;]*[A-Za-z]").unwrap()
});

/// Removes ANSI escape codes (colors, formatting, cursor moves) from a string.
pub fn strip_ansi_codes(input: &str) -> String {
    ANSI_REGEX.replace_all(input, "").to_string()
}

/// Used to fix a super annoying bug
pub static IS_GIT_BASH: LazyLock<bool> = LazyLock::new(|| {
    if cfg!(target_os = "windows") {
        std::env::var_os("MSYSTEM").is_some()
            || std::env::var_os("MSYS").is_some()
            || std::env::var_os("MINGW_PREFIX").is_some()
    } else {
        false
    }
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ansi_codes_are_stripped() {
        let colored = "\x1B[33m[info]\x1B[0m Installing \x1B[1mJava\x1B[0m";
        assert_eq!(strip_ansi_codes(colored), "[info] Installing Java");
    }

    #[test]
    fn log_types_have_prefixes() {
        assert_eq!(LogType::Warn.to_string(), "[warn]");
        assert_eq!(LogType::Point.to_string(), "-");
    }
}
