//! Structured logging module for LYRA_OS
//!
//! Writes daily log files to the configured log directory with categories:
//! - SESSION: Startup, seeding and reset lifecycle
//! - SYNC: Local store and cloud drive persistence
//! - CONVERSATION: Turn handling and the reentrancy guard
//! - BACKEND: Generative API calls
//! - ERROR: Faults (all non-fatal)

use chrono::{Local, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use once_cell::sync::Lazy;

/// Log categories for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Session,      // Startup, seeding, reset
    Sync,         // Local/cloud persistence
    Conversation, // Turn handling
    Backend,      // Generative API calls
    Error,        // Faults
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Session => "SESSION",
            LogCategory::Sync => "SYNC",
            LogCategory::Conversation => "CONVERSATION",
            LogCategory::Backend => "BACKEND",
            LogCategory::Error => "ERROR",
        }
    }
}

/// Directory that receives the daily log files (None = console only)
static LOG_DIR: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

/// Get the log file path for today inside `dir`
fn log_file_path(dir: &Path) -> PathBuf {
    let today = Local::now().format("%Y-%m-%d").to_string();
    dir.join(format!("lyra-{}.log", today))
}

fn current_log_dir() -> Option<PathBuf> {
    LOG_DIR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Initialize the logging system - creates the log directory if needed
pub fn init_logging(log_dir: &Path) -> std::io::Result<()> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    *LOG_DIR.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(log_dir.to_path_buf());

    log(LogCategory::Session, None, "LYRA_OS logging initialized");

    Ok(())
}

/// Format a single log line
pub fn format_line(category: LogCategory, session_id: Option<&str>, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let context = session_id
        .map(|id| format!("session={} | ", id.chars().take(8).collect::<String>()))
        .unwrap_or_default();

    format!("[{}] [{}] {}{}\n", timestamp, category.as_str(), context, message)
}

/// Log a message with category and optional session context
pub fn log(category: LogCategory, session_id: Option<&str>, message: &str) {
    let log_line = format_line(category, session_id, message);

    // Console echo (dev)
    print!("{}", log_line);

    let Some(dir) = current_log_dir() else {
        return;
    };

    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path(&dir))
    {
        let _ = file.write_all(log_line.as_bytes());
    }
}

/// Log a session lifecycle event (startup, seed, reset)
pub fn log_session(session_id: Option<&str>, message: &str) {
    log(LogCategory::Session, session_id, message);
}

/// Log a persistence event (local write, cloud read/write)
pub fn log_sync(session_id: Option<&str>, message: &str) {
    log(LogCategory::Sync, session_id, message);
}

/// Log a conversation turn event
pub fn log_conversation(session_id: Option<&str>, message: &str) {
    log(LogCategory::Conversation, session_id, message);
}

/// Log a generative backend event
pub fn log_backend(session_id: Option<&str>, message: &str) {
    log(LogCategory::Backend, session_id, message);
}

/// Log an error
pub fn log_error(session_id: Option<&str>, message: &str) {
    log(LogCategory::Error, session_id, message);
}

/// Clean up old log files (keep last 7 days)
pub fn cleanup_old_logs() -> std::io::Result<usize> {
    let Some(log_dir) = current_log_dir() else {
        return Ok(0);
    };
    let mut deleted = 0;

    if !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(7);

    for entry in fs::read_dir(&log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("lyra-") && n.ends_with(".log"))
            .unwrap_or(false);
        if !is_log {
            continue;
        }

        if let Ok(metadata) = entry.metadata() {
            if let Ok(modified) = metadata.modified() {
                let modified_time: chrono::DateTime<Utc> = modified.into();
                if modified_time < cutoff && fs::remove_file(&path).is_ok() {
                    deleted += 1;
                }
            }
        }
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line_truncates_session_id() {
        let line = format_line(LogCategory::Sync, Some("0123456789abcdef"), "saved");
        assert!(line.contains("[SYNC] session=01234567 | saved"));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn test_format_line_without_session() {
        let line = format_line(LogCategory::Error, None, "boom");
        assert!(line.contains("[ERROR] boom"));
        assert!(!line.contains("session="));
    }

    #[test]
    fn test_short_session_id_is_not_sliced_past_end() {
        let line = format_line(LogCategory::Session, Some("init"), "seeded");
        assert!(line.contains("session=init | seeded"));
    }

    #[test]
    fn test_multibyte_session_id_truncates_on_char_boundary() {
        let line = format_line(LogCategory::Session, Some("sessão-çãé-ü"), "restored");
        assert!(line.contains("session=sessão-ç | restored"));
    }
}
