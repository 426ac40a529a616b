//! Caller-facing log sink.
//!
//! The editor reports parse anomalies and callback failures here. The
//! default sink forwards to `tracing`.

use std::fmt;
use std::sync::{Arc, Mutex};

use smol_str::SmolStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        })
    }
}

pub trait LogSink: Send + Sync {
    /// `scope` names the subsystem, e.g. `parse` or `callback`.
    fn log(&self, level: LogLevel, scope: &str, message: &str);
}

/// Forwards to `tracing` under the `tapestry::editor` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, scope: &str, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "tapestry::editor", scope, "{message}"),
            LogLevel::Info => tracing::info!(target: "tapestry::editor", scope, "{message}"),
            LogLevel::Warn => tracing::warn!(target: "tapestry::editor", scope, "{message}"),
            LogLevel::Error => tracing::error!(target: "tapestry::editor", scope, "{message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub scope: SmolStr,
    pub message: String,
}

/// Records every entry. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn at_level(&self, level: LogLevel) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, scope: &str, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(LogEntry {
                level,
                scope: scope.into(),
                message: message.to_string(),
            });
    }
}
