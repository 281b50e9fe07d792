//! Append-only disk fallback for envelopes that could not reach the queue
//!
//! One JSON-serialized envelope per line. The file is created lazily on the
//! first admission-time queue failure and shrunk only by the drainer, which
//! rewrites a temporary sibling and renames it into place so a crash leaves
//! either the old or the new file, never a truncated one.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use tracing::warn;

use crate::envelope::RetryableClick;
use crate::error::Result;

/// Default location, relative to the working directory.
pub const FALLBACK_PATH: &str = "fallback_clicks.jsonl";

/// Handle on the newline-delimited fallback log.
#[derive(Debug, Clone)]
pub struct FallbackLog {
    path: PathBuf,
}

impl FallbackLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Append one serialized envelope line, creating the file if needed.
    pub fn append(&self, payload: &str) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{payload}")?;
        Ok(())
    }

    /// Decode every line of the log. Malformed lines are logged and skipped;
    /// they cannot be rehydrated.
    pub fn read_entries(&self) -> Result<Vec<RetryableClick>> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RetryableClick>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping malformed fallback line: {}", e),
            }
        }

        Ok(entries)
    }

    /// Replace the log with exactly the given envelopes via a temporary
    /// sibling and an atomic rename.
    pub fn rewrite(&self, entries: &[RetryableClick]) -> Result<()> {
        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            for entry in entries {
                let line = serde_json::to_string(entry)?;
                writeln!(writer, "{line}")?;
            }
            writer.flush()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Delete the log after a complete drain.
    pub fn remove(&self) -> Result<()> {
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ClickEvent;
    use chrono::{TimeZone, Utc};

    fn wrapper(ad_id: &str) -> RetryableClick {
        RetryableClick::new(ClickEvent {
            id: format!("id-{ad_id}"),
            ad_id: ad_id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 7, 2, 18, 0, 0).unwrap(),
            ip_address: "1.1.1.1".to_string(),
            video_playback_time: 1.0,
        })
    }

    fn temp_log(dir: &tempfile::TempDir) -> FallbackLog {
        FallbackLog::new(dir.path().join("fallback_clicks.jsonl"))
    }

    #[test]
    fn append_creates_the_file_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let log = temp_log(&dir);
        assert!(!log.exists());

        log.append(&serde_json::to_string(&wrapper("a")).unwrap()).unwrap();
        assert!(log.exists());
    }

    #[test]
    fn append_then_read_round_trips_line_per_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let log = temp_log(&dir);

        let first = wrapper("a");
        let second = wrapper("b");
        log.append(&serde_json::to_string(&first).unwrap()).unwrap();
        log.append(&serde_json::to_string(&second).unwrap()).unwrap();

        let entries = log.read_entries().unwrap();
        assert_eq!(entries, vec![first, second]);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let log = temp_log(&dir);

        log.append("not-json").unwrap();
        log.append(&serde_json::to_string(&wrapper("a")).unwrap()).unwrap();
        log.append("{\"event\":{}}").unwrap();

        let entries = log.read_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event.ad_id, "a");
    }

    #[test]
    fn rewrite_keeps_exactly_the_given_entries() {
        let dir = tempfile::tempdir().unwrap();
        let log = temp_log(&dir);

        for ad in ["a", "b", "c"] {
            log.append(&serde_json::to_string(&wrapper(ad)).unwrap()).unwrap();
        }

        let unprocessed = vec![wrapper("c")];
        log.rewrite(&unprocessed).unwrap();

        let entries = log.read_entries().unwrap();
        assert_eq!(entries, unprocessed);
        assert!(!dir.path().join("fallback_clicks.jsonl.tmp").exists());
    }

    #[test]
    fn remove_deletes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = temp_log(&dir);

        log.append(&serde_json::to_string(&wrapper("a")).unwrap()).unwrap();
        log.remove().unwrap();
        assert!(!log.exists());
    }
}
