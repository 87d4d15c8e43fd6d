//! Log sink abstraction shared by the middleware and the file writer.

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Destination for formatted log entries.
///
/// Implementations must write each entry atomically: two concurrent calls
/// never interleave their bytes.
pub trait LogSink: Send + Sync {
    fn write_entry(&self, entry: &str) -> io::Result<()>;
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn write_entry(&self, entry: &str) -> io::Result<()> {
        (**self).write_entry(entry)
    }
}

impl<S: LogSink + ?Sized> LogSink for Box<S> {
    fn write_entry(&self, entry: &str) -> io::Result<()> {
        (**self).write_entry(entry)
    }
}

/// Rotation settings for a file sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogSinkConfig {
    /// Destination log file.
    pub path: PathBuf,
    /// Size in bytes that triggers rotation. 0 disables rotation.
    pub max_bytes: u64,
    /// Number of rotated backups to keep. 0 disables rotation.
    pub backup_count: usize,
}

impl LogSinkConfig {
    /// Rotation happens only when both the threshold and backup count are set.
    pub fn rotation_enabled(&self) -> bool {
        self.max_bytes > 0 && self.backup_count > 0
    }
}

/// In-memory sink. Keeps every entry in write order.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    pub fn entries(&self) -> Vec<String> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemorySink {
    fn write_entry(&self, entry: &str) -> io::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| io::Error::other("memory sink lock poisoned"))?;
        entries.push(entry.to_string());
        Ok(())
    }
}
