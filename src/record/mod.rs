//! Terminal-item recording: one record per completed/failed/escalated item.
//!
//! The engine writes through the `ItemRecorder` seam; production uses the
//! append-only JSONL `CompletionLog`, tests use `MemoryRecorder`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::domain::CompletionRecord;
use crate::error::Result;

/// Sink for terminal-item records.
pub trait ItemRecorder: Send + Sync {
    fn record(&self, record: &CompletionRecord) -> Result<()>;
}

/// Append-only JSONL log of terminal items.
pub struct CompletionLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl CompletionLog {
    /// Open (or create) the log at the given path, creating parent
    /// directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ItemRecorder for CompletionLog {
    fn record(&self, record: &CompletionRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut file = self.file.lock().expect("log lock poisoned");
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Test recorder collecting records in memory.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    records: Mutex<Vec<CompletionRecord>>,
}

impl MemoryRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<CompletionRecord> {
        self.records.lock().expect("recorder lock poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.records.lock().expect("recorder lock poisoned").len()
    }
}

impl ItemRecorder for MemoryRecorder {
    fn record(&self, record: &CompletionRecord) -> Result<()> {
        self.records
            .lock()
            .expect("recorder lock poisoned")
            .push(record.clone());
        Ok(())
    }
}
