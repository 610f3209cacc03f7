//! Progress reporting for embedding regeneration.

use crate::current_timestamp;
use serde::{Deserialize, Serialize};

/// Run state of a regeneration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegenerationStatus {
    /// Not started.
    #[default]
    Idle,
    /// Items are being processed.
    Processing,
    /// Every item was processed.
    Completed,
    /// Stopped by the cancellation token.
    Cancelled,
}

/// Kind of progress log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// Informational.
    Info,
    /// An item was embedded.
    Success,
    /// An item failed.
    Error,
    /// An item was skipped.
    Skip,
}

/// One progress log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Kind.
    #[serde(rename = "type")]
    pub kind: LogKind,
    /// Message.
    pub message: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

/// Outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerationStats {
    /// Items embedded.
    pub success: usize,
    /// Items skipped.
    pub skipped: usize,
    /// Items that failed.
    pub errors: usize,
}

/// Snapshot of a regeneration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerationProgress {
    /// Items processed so far.
    pub current: usize,
    /// Items selected for this run.
    pub total: usize,
    /// Run state.
    pub status: RegenerationStatus,
    /// Log lines, oldest first.
    pub logs: Vec<LogEntry>,
    /// Outcome counters.
    pub stats: RegenerationStats,
}

impl RegenerationProgress {
    /// Appends a log line stamped with the current time.
    pub fn log(&mut self, kind: LogKind, message: impl Into<String>) {
        self.logs.push(LogEntry {
            kind,
            message: message.into(),
            timestamp: current_timestamp(),
        });
    }

    /// Returns true once the run has finished, either way.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(
            self.status,
            RegenerationStatus::Completed | RegenerationStatus::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_and_serialize() {
        let mut progress = RegenerationProgress::default();
        progress.log(LogKind::Skip, "no organization");
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["status"], "idle");
        assert_eq!(json["logs"][0]["type"], "skip");
        assert!(!progress.is_finished());
    }
}
