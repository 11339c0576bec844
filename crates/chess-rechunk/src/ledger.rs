//! Progress ledger.
//!
//! An append-only JSONL file recording which plan keys have been fully
//! persisted. A key is appended only after its output unit is written
//! in full, so on restart every ledgered key can be skipped and every
//! absent key is redone from scratch.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// One completion record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Plan key, the unit's path relative to the output root.
    pub key: String,
    /// Absolute path of the persisted unit.
    pub output: PathBuf,
    pub completed_at: DateTime<Utc>,
}

struct LedgerInner {
    file: File,
    complete: HashSet<String>,
}

/// Shared, append-only completion log for one output root.
pub struct ProgressLedger {
    path: PathBuf,
    inner: Mutex<LedgerInner>,
}

impl ProgressLedger {
    /// Open or create the ledger, loading previously completed keys.
    ///
    /// A torn final line (the process died mid-append) is skipped with a
    /// warning; its plan simply runs again.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut complete = HashSet::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for (lineno, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<LedgerEntry>(&line) {
                    Ok(entry) => {
                        complete.insert(entry.key);
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            line = lineno + 1,
                            error = %e,
                            "Skipping unparseable ledger line"
                        );
                    }
                }
            }
            info!(
                path = %path.display(),
                completed = complete.len(),
                "Loaded progress ledger"
            );
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        // If the last append was torn, terminate it so the next entry
        // starts on its own line.
        if let Ok(contents) = std::fs::read(&path) {
            if !contents.is_empty() && contents.last() != Some(&b'\n') {
                file.write_all(b"\n")?;
            }
        }

        Ok(Self {
            path,
            inner: Mutex::new(LedgerInner { file, complete }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a plan key was persisted by this or an earlier run.
    pub fn is_complete(&self, key: &str) -> bool {
        match self.inner.lock() {
            Ok(inner) => inner.complete.contains(key),
            Err(poisoned) => poisoned.into_inner().complete.contains(key),
        }
    }

    /// Number of completed keys currently known.
    pub fn completed_count(&self) -> usize {
        match self.inner.lock() {
            Ok(inner) => inner.complete.len(),
            Err(poisoned) => poisoned.into_inner().complete.len(),
        }
    }

    /// Record a plan as fully persisted. Call only after the unit's
    /// write has returned; the entry is flushed to disk before this
    /// returns.
    pub fn mark_complete(&self, key: &str, output: &Path) -> Result<()> {
        let entry = LedgerEntry {
            key: key.to_string(),
            output: output.to_path_buf(),
            completed_at: Utc::now(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.file.write_all(line.as_bytes())?;
        inner.file.flush()?;
        inner.file.sync_all()?;
        inner.complete.insert(entry.key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marks_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        {
            let ledger = ProgressLedger::open(&path).unwrap();
            assert!(!ledger.is_complete("a"));
            ledger.mark_complete("a", Path::new("/out/a.zarr")).unwrap();
            ledger.mark_complete("b", Path::new("/out/b.zarr")).unwrap();
            assert!(ledger.is_complete("a"));
        }

        let reopened = ProgressLedger::open(&path).unwrap();
        assert!(reopened.is_complete("a"));
        assert!(reopened.is_complete("b"));
        assert!(!reopened.is_complete("c"));
        assert_eq!(reopened.completed_count(), 2);
    }

    #[test]
    fn test_torn_final_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        {
            let ledger = ProgressLedger::open(&path).unwrap();
            ledger.mark_complete("a", Path::new("/out/a.zarr")).unwrap();
        }
        // Simulate a crash mid-append.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"key\":\"b\",\"outp").unwrap();
        drop(file);

        let ledger = ProgressLedger::open(&path).unwrap();
        assert!(ledger.is_complete("a"));
        assert!(!ledger.is_complete("b"));

        // The torn plan reruns and appends a clean entry after the junk.
        ledger.mark_complete("b", Path::new("/out/b.zarr")).unwrap();
        drop(ledger);
        let reopened = ProgressLedger::open(&path).unwrap();
        assert!(reopened.is_complete("b"));
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/ledger.jsonl");
        let ledger = ProgressLedger::open(&path).unwrap();
        ledger.mark_complete("a", Path::new("/out/a.zarr")).unwrap();
        assert!(path.exists());
    }
}
