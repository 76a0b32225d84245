//! File-backed download log.
//!
//! The whole log lives in one pretty-printed JSON array. Every append rewrites
//! the document through a temporary file in the same directory so readers
//! never see a partially written log.

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::{error::StoreError, event::DownloadEvent};

/// Append-only store for download events backed by a single JSON document.
#[derive(Clone)]
pub struct EventStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl EventStore {
    /// Create a store persisting to `path`. The file is created on first append.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write an empty log if none exists yet.
    pub fn init(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        self.write_all(&[])
    }

    /// Load every recorded event in append order.
    ///
    /// A missing or blank document yields an empty log. A document that exists
    /// but cannot be parsed is reported as [`StoreError::Malformed`].
    pub fn load_all(&self) -> Result<Vec<DownloadEvent>, StoreError> {
        read_document(&self.path)
    }

    /// Record a download from `ip` in `country` at the current time.
    pub fn record(&self, ip: &str, country: &str) -> Result<DownloadEvent, StoreError> {
        let ev = DownloadEvent::now(ip, country);
        self.append(ev.clone())?;
        Ok(ev)
    }

    /// Append `ev` to the end of the log.
    ///
    /// Appends are serialized across all clones of the store. If the existing
    /// log cannot be parsed its bytes are moved aside to a quarantine file and
    /// the new log starts with `ev` alone.
    pub fn append(&self, ev: DownloadEvent) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut events = match self.load_all() {
            Ok(events) => events,
            Err(StoreError::Malformed { source, .. }) => {
                error!(path = %self.path.display(), error = %source, "download log is unreadable");
                self.quarantine()?;
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        events.push(ev);
        self.write_all(&events)?;
        debug!(total = events.len(), "download event appended");
        Ok(())
    }

    /// Copy the unreadable log next to itself as `<name>.corrupt-<millis>`.
    fn quarantine(&self) -> Result<(), StoreError> {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "downloads.json".into());
        let target = self.path.with_file_name(format!(
            "{}.corrupt-{}",
            name,
            Utc::now().timestamp_millis()
        ));
        fs::copy(&self.path, &target).map_err(|e| StoreError::io(&target, e))?;
        warn!(quarantine = %target.display(), "preserved unreadable download log");
        Ok(())
    }

    /// Atomically replace the log with `events`.
    fn write_all(&self, events: &[DownloadEvent]) -> Result<(), StoreError> {
        let parent_dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent_dir).map_err(|e| StoreError::io(&parent_dir, e))?;
        let mut tmp =
            tempfile::NamedTempFile::new_in(&parent_dir).map_err(|e| StoreError::io(&parent_dir, e))?;
        serde_json::to_writer_pretty(&mut tmp, events)?;
        tmp.write_all(b"\n")
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::io(&self.path, e.error))?;
        Ok(())
    }
}

/// Read a JSON array document, treating a missing or blank file as empty.
///
/// Bytes that are not valid UTF-8 are a parse failure, not an I/O failure.
pub(crate) fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&raw).map_err(|source| StoreError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}
