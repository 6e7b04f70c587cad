//! Append-only completion history.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::broadcaster::BroadcasterName;

use super::store::StoreError;

/// Timestamp format used in history records.
pub const HISTORY_TIME_FORMAT: &str = "%Y-%m-%d %Hh%Mm%Ss";

/// Sink for capture completion records.
pub trait HistoryLog: Send + Sync {
    /// Append one `(broadcaster, completed_at)` record.
    fn append(&self, name: &BroadcasterName, at: DateTime<Local>) -> Result<(), StoreError>;
}

/// Format one history record (without the trailing newline).
pub fn format_history_line(name: &BroadcasterName, at: DateTime<Local>) -> String {
    format!("{} - {}", name, at.format(HISTORY_TIME_FORMAT))
}

/// History log appended to a plain text file, one record per line.
#[derive(Debug, Clone)]
pub struct FileHistoryLog {
    path: PathBuf,
}

impl FileHistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryLog for FileHistoryLog {
    fn append(&self, name: &BroadcasterName, at: DateTime<Local>) -> Result<(), StoreError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        writeln!(file, "{}", format_history_line(name, at)).map_err(|e| StoreError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_format_history_line() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();
        let name = BroadcasterName::new("Alice").unwrap();
        assert_eq!(format_history_line(&name, at), "alice - 2024-03-09 07h05m02s");
    }

    #[test]
    fn test_append_only() {
        let dir = TempDir::new().unwrap();
        let log = FileHistoryLog::new(dir.path().join("historique.csv"));
        let at = Local.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        log.append(&BroadcasterName::new("alice").unwrap(), at).unwrap();
        log.append(&BroadcasterName::new("bob").unwrap(), at).unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            contents,
            "alice - 2024-01-01 12h00m00s\nbob - 2024-01-01 12h00m00s\n"
        );
    }
}
