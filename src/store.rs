//! Session persistence
//!
//! The storage layer only knows how to load, save and clear the whole record
//! under one key. There is no partial-field update primitive; merging happens
//! in [`crate::session::SessionContext`].

use crate::error::FlowError;
use crate::types::SessionRecord;
use std::fs;
use std::path::{Path, PathBuf};

/// Well-known key the record is stored under
pub const DEFAULT_STORAGE_KEY: &str = "currentScreening";

/// Persistence port for the Session Record
pub trait SessionStore {
    /// Load the stored record, `Ok(None)` when nothing is stored
    fn load(&self) -> Result<Option<SessionRecord>, FlowError>;

    /// Replace the stored record with `record`
    fn save(&mut self, record: &SessionRecord) -> Result<(), FlowError>;

    /// Delete the stored record entirely
    fn clear(&mut self) -> Result<(), FlowError>;

    /// Short description for logs and diagnostics
    fn describe(&self) -> String;
}

fn parse_record(raw: &str) -> Result<SessionRecord, FlowError> {
    SessionRecord::from_json(raw).map_err(|e| FlowError::CorruptRecord(e.to_string()))
}

/// In-memory store holding the serialized record, used by tests and embedders
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    raw: Option<String>,
    fail_writes: bool,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with arbitrary stored text (possibly corrupt)
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
            ..Default::default()
        }
    }

    /// Make every subsequent save fail, emulating a full or blocked store
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Stored text as-is
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Number of successful saves
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Option<SessionRecord>, FlowError> {
        self.raw.as_deref().map(parse_record).transpose()
    }

    fn save(&mut self, record: &SessionRecord) -> Result<(), FlowError> {
        if self.fail_writes {
            return Err(FlowError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory store rejected write",
            )));
        }
        self.raw = Some(record.to_json()?);
        self.writes += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), FlowError> {
        self.raw = None;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// File-backed store: one JSON file per storage key inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    key: String,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            key: key.into(),
        }
    }

    /// Store under [`DEFAULT_STORAGE_KEY`]
    pub fn with_default_key(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, DEFAULT_STORAGE_KEY)
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SessionStore for FileStore {
    fn load(&self) -> Result<Option<SessionRecord>, FlowError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        parse_record(&contents).map(Some)
    }

    fn save(&mut self, record: &SessionRecord) -> Result<(), FlowError> {
        fs::create_dir_all(&self.dir)?;
        let serialized = serde_json::to_string_pretty(record)?;

        // Write the full record beside the target, then swap it in.
        let tmp = self.dir.join(format!(".{}.json.tmp", self.key));
        fs::write(&tmp, serialized)?;
        fs::rename(&tmp, self.path())?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), FlowError> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        self.path().display().to_string()
    }
}
