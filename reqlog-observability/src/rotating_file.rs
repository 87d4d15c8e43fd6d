//! Size-rotated log file writer.
//!
//! Entries are appended to `LogSinkConfig.path`. When the next entry would
//! push the file to `max_bytes` or beyond, the file is rolled over into
//! numbered backups (`responses.log.1` is the newest, `responses.log.N` the
//! oldest) and a fresh file is started. At most `backup_count` backups are
//! kept.
//!
//! Thread-safe: a `Mutex<BufWriter>` serializes writers, so entries from
//! concurrent requests never interleave.

use reqlog_core::sink::{LogSink, LogSinkConfig};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error, info};

// ── Writer ───────────────────────────────────────────────────────────────────

/// A rotating log file writer.
///
/// Call [`RotatingFileWriter::write_entry`] to append one entry. Rotation
/// happens automatically.
pub struct RotatingFileWriter {
    config: LogSinkConfig,
    inner: Mutex<WriterState>,
}

struct WriterState {
    writer: BufWriter<File>,
    current_size: u64,
}

impl RotatingFileWriter {
    /// Create a new writer, opening (or creating) the log file.
    pub fn new(config: LogSinkConfig) -> io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = open_append(&config.path)?;
        let current_size = file.metadata()?.len();

        info!(
            path = %config.path.display(),
            max_bytes = config.max_bytes,
            backup_count = config.backup_count,
            "Response log file opened"
        );

        Ok(Self {
            config,
            inner: Mutex::new(WriterState {
                writer: BufWriter::new(file),
                current_size,
            }),
        })
    }

    pub fn config(&self) -> &LogSinkConfig {
        &self.config
    }

    /// Append `entry` plus a newline. Rotates first if needed.
    pub fn write_entry(&self, entry: &str) -> io::Result<()> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("log writer lock poisoned"))?;

        let bytes = entry.as_bytes();
        let entry_len = bytes.len() as u64 + 1;

        if self.should_rotate(state.current_size, entry_len) {
            state.writer.flush()?;
            rotate_backups(&self.config.path, self.config.backup_count);
            state.writer = BufWriter::new(open_append(&self.config.path)?);
            state.current_size = fs::metadata(&self.config.path)
                .map(|m| m.len())
                .unwrap_or(0);
        }

        state.writer.write_all(bytes)?;
        state.writer.write_all(b"\n")?;
        state.writer.flush()?;
        state.current_size += entry_len;

        Ok(())
    }

    /// Flush buffered data to disk.
    pub fn flush(&self) -> io::Result<()> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("log writer lock poisoned"))?;
        state.writer.flush()
    }

    fn should_rotate(&self, current_size: u64, entry_len: u64) -> bool {
        self.config.rotation_enabled()
            && current_size > 0
            && current_size.saturating_add(entry_len) >= self.config.max_bytes
    }
}

impl LogSink for RotatingFileWriter {
    fn write_entry(&self, entry: &str) -> io::Result<()> {
        RotatingFileWriter::write_entry(self, entry)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Backup path: `responses.log` → `responses.log.3`.
fn backup_path(base: &Path, index: usize) -> PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push(format!(".{index}"));
    PathBuf::from(path)
}

/// Shift `base.1..base.{keep-1}` up by one, then move `base` to `base.1`.
/// Whatever sat at `base.{keep}` is dropped.
fn rotate_backups(base: &Path, keep: usize) {
    for index in (1..keep).rev() {
        let from = backup_path(base, index);
        if from.exists() {
            let to = backup_path(base, index + 1);
            if let Err(e) = replace(&from, &to) {
                error!(
                    error = %e,
                    from = %from.display(),
                    to = %to.display(),
                    "Failed to shift log backup"
                );
            }
        }
    }

    let newest = backup_path(base, 1);
    match replace(base, &newest) {
        Ok(()) => debug!(
            from = %base.display(),
            to = %newest.display(),
            "Rotated response log"
        ),
        Err(e) => error!(
            error = %e,
            from = %base.display(),
            to = %newest.display(),
            "Failed to rotate response log"
        ),
    }
}

fn replace(from: &Path, to: &Path) -> io::Result<()> {
    if to.exists() {
        fs::remove_file(to)?;
    }
    fs::rename(from, to)
}

// ── Tests ────────────────────────────────────────────────────────────────────
