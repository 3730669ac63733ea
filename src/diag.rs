//! Shutdown journal: append-only record of why the warden stopped.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use tracing::warn;

/// Append-only journal of lifecycle endings.
///
/// Purely diagnostic: written when termination begins, never read back by
/// the warden. An unwritable path costs a warning, not the shutdown.
pub struct ShutdownJournal {
    path: Option<PathBuf>,
}

impl ShutdownJournal {
    /// Create a journal writing to `path`, or a disabled one for `None`.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Create a journal that records nothing.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// Append one timestamped line. Best effort.
    pub fn record(&self, reason: &str) {
        let Some(path) = &self.path else {
            return;
        };
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("[{}] {}\n", stamp, reason);
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(error) = result {
            warn!(path = %path.display(), %error, "failed to append shutdown journal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shutdown.log");
        let journal = ShutdownJournal::new(Some(path.clone()));

        journal.record("all clients gone");
        journal.record("operator kill received");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("all clients gone"));
        assert!(lines[1].ends_with("operator kill received"));
    }

    #[test]
    fn test_disabled_journal_writes_nothing() {
        let journal = ShutdownJournal::disabled();
        // Nothing to assert beyond "does not panic or create files";
        // the path simply does not exist.
        journal.record("all clients gone");
    }

    #[test]
    fn test_unwritable_path_is_non_fatal() {
        let journal = ShutdownJournal::new(Some(PathBuf::from("/nonexistent/dir/shutdown.log")));
        journal.record("all clients gone");
    }
}
