//! Per-run execution log.

use chrono::Utc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Ordered, append-only log owned by one run.
///
/// Every line is mirrored to `tracing`. After [`RunLog::detach`] the
/// snapshot is frozen and later lines only reach the process log.
#[derive(Debug, Default)]
pub struct RunLog {
    lines: Vec<String>,
    detached: bool,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Level::Info, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(Level::Warn, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Level::Error, message.into());
    }

    fn push(&mut self, level: Level, message: String) {
        match level {
            Level::Info => info!("{message}"),
            Level::Warn => warn!("{message}"),
            Level::Error => error!("{message}"),
        }
        if self.detached {
            return;
        }
        self.lines.push(format!(
            "[{}] {} {}",
            Utc::now().format("%H:%M:%S"),
            level.label(),
            message
        ));
    }

    /// Freeze the log and return its text, one line per entry.
    pub fn detach(&mut self) -> String {
        self.detached = true;
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_keep_order_and_level() {
        let mut log = RunLog::new();
        log.info("classified");
        log.warn("routing attempt 1 failed");
        log.error("drafting failed");

        let lines = log.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("INFO classified"));
        assert!(lines[1].contains("WARN routing attempt 1 failed"));
        assert!(lines[2].contains("ERROR drafting failed"));
    }

    #[test]
    fn detach_freezes_snapshot() {
        let mut log = RunLog::new();
        log.info("before");
        let snapshot = log.detach();
        log.info("after");

        assert!(log.is_detached());
        assert!(snapshot.contains("before"));
        assert_eq!(log.lines().len(), 1);
        assert!(!log.detach().contains("after"));
    }
}
