//! Per-session transition log.
//!
//! Every accepted event is appended as `[<timestamp>] <EVENT>: <details>`.
//! The log is optional; a handle without a file swallows writes.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{SecondsFormat, Utc};

use crate::sync::lock;

/// Thread-safe handle to an append-only log file.
pub type LogHandle = Arc<Mutex<Option<File>>>;

/// Current UTC time as ISO 8601 with milliseconds (e.g. 2026-02-04T10:15:30.123Z).
fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Write a timestamped line to the log file (if present).
pub fn log_line(handle: &LogHandle, event: &str, details: &str) {
    let mut guard = lock(handle);
    if let Some(ref mut file) = *guard {
        let line = format!("[{}] {}: {}", utc_timestamp(), event, details);
        if let Err(e) = writeln!(file, "{}", line).and_then(|_| file.flush()) {
            log::warn!("Failed to write transition log: {}", e);
        }
    }
}

/// Open (or create) `{log_dir}/{log_id}.log` and return a shared handle.
///
/// Any failure yields a handle without a file.
pub fn open_log_file(log_dir: Option<&Path>, log_id: &str) -> LogHandle {
    let file = log_dir.and_then(|dir| {
        let path = dir.join(format!("{}.log", log_id));
        let opened = std::fs::create_dir_all(dir).and_then(|_| {
            OpenOptions::new().create(true).append(true).open(&path)
        });
        match opened {
            Ok(file) => Some(file),
            Err(e) => {
                log::warn!("Transition log disabled, cannot open {}: {}", path.display(), e);
                None
            }
        }
    });
    Arc::new(Mutex::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    fn read_log(path: &Path) -> String {
        let mut contents = String::new();
        File::open(path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        contents
    }

    #[test]
    fn utc_timestamp_format() {
        let ts = utc_timestamp();
        // YYYY-MM-DDTHH:MM:SS.mmmZ
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), 24);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], "T");
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn open_log_file_creates_file() {
        let dir = tempdir().unwrap();

        let handle = open_log_file(Some(dir.path()), "UI");
        assert!(handle.lock().unwrap().is_some());
        assert!(dir.path().join("UI.log").exists());
    }

    #[test]
    fn open_log_file_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let handle = open_log_file(Some(&nested), "UI");
        assert!(handle.lock().unwrap().is_some());
        assert!(nested.join("UI.log").exists());
    }

    #[test]
    fn open_log_file_none_dir() {
        let handle = open_log_file(None, "UI");
        assert!(handle.lock().unwrap().is_none());
    }

    #[test]
    fn log_line_writes_event_and_details() {
        let dir = tempdir().unwrap();
        let handle = open_log_file(Some(dir.path()), "UI");

        log_line(&handle, "session.toggle", "running -> paused");
        log_line(&handle, "session.reset", "paused -> resetting");

        let contents = read_log(&dir.path().join("UI.log"));
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] session.toggle: running -> paused"));
        assert!(lines[1].contains("session.reset: paused -> resetting"));
    }

    #[test]
    fn log_line_appends_across_handles() {
        let dir = tempdir().unwrap();
        log_line(&open_log_file(Some(dir.path()), "UI"), "A", "1");
        log_line(&open_log_file(Some(dir.path()), "UI"), "B", "2");

        let contents = read_log(&dir.path().join("UI.log"));
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn log_line_handles_none_file() {
        let handle: LogHandle = Arc::new(Mutex::new(None));
        // Should not panic
        log_line(&handle, "session.toggle", "test");
    }
}
