/// Persistent application state and the append-only error log.
///
/// Both live as JSON files in a state directory. Every write goes through a
/// temporary file in the same directory that is then persisted over the
/// target, so a reader never observes a half-written document, and a
/// process-local lock serialises read-modify-write cycles.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

const STATE_FILE: &str = "state.json";
const ERRORS_FILE: &str = "errors.json";

/// Counters and metadata kept between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub first_launch: bool,
    pub version: String,
    /// RFC 3339 timestamp of when the state was created.
    pub last_opened: String,
    /// Total number of files moved across all batches.
    pub files_moved: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            first_launch: false,
            version: env!("CARGO_PKG_VERSION").to_string(),
            last_opened: Utc::now().to_rfc3339(),
            files_moved: 0,
        }
    }
}

/// One entry of the error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub date: String,
    pub error: ErrorDetails,
    pub error_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub stack: String,
    pub message: String,
    pub name: String,
}

impl ErrorRecord {
    /// Builds a record stamped with the current time and a fresh id.
    pub fn new(name: &str, message: &str, stack: &str) -> Self {
        Self {
            date: Utc::now().to_rfc3339(),
            error: ErrorDetails {
                stack: if stack.is_empty() {
                    "No stack available".to_string()
                } else {
                    stack.to_string()
                },
                message: message.to_string(),
                name: name.to_string(),
            },
            error_id: uuid::Uuid::new_v4().simple().to_string().to_uppercase(),
        }
    }

    /// Builds a record from an error, using its source chain as the stack.
    pub fn from_error(name: &str, error: &dyn std::error::Error) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {}", cause));
            source = cause.source();
        }
        Self::new(name, &error.to_string(), &chain.join("\n"))
    }
}

/// Errors that can occur while reading or writing persisted state.
#[derive(Debug)]
pub enum StoreError {
    /// Failed to create the state directory.
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to read a state file.
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to write a state file.
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A state file does not contain the expected JSON.
    InvalidFormat { path: PathBuf, reason: String },
    /// The store lock was poisoned by a panicking writer.
    LockPoisoned,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DirectoryCreationFailed { path, source } => {
                write!(
                    f,
                    "Failed to create state directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::ReadFailed { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
            Self::InvalidFormat { path, reason } => {
                write!(f, "Invalid state file {}: {}", path.display(), reason)
            }
            Self::LockPoisoned => write!(f, "State store lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DirectoryCreationFailed { source, .. }
            | Self::ReadFailed { source, .. }
            | Self::WriteFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value persistence for the sorter.
pub trait StateStore: Send + Sync {
    /// Returns the stored state, if any has been written.
    fn load_state(&self) -> StoreResult<Option<AppState>>;

    /// Applies `update` to the stored state (or a default one) and persists it atomically.
    fn update_state(&self, update: &mut dyn FnMut(&mut AppState)) -> StoreResult<AppState>;

    /// Appends a record to the error log.
    fn append_error(&self, record: ErrorRecord) -> StoreResult<()>;

    /// All recorded errors, oldest first.
    fn errors(&self) -> StoreResult<Vec<ErrorRecord>>;
}

/// JSON files in a state directory.
pub struct JsonFileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::DirectoryCreationFailed {
            path: self.dir.clone(),
            source: e,
        })
    }

    fn read_json<T: for<'de> Deserialize<'de>>(&self, name: &str) -> StoreResult<Option<T>> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| StoreError::ReadFailed {
            path: path.clone(),
            source: e,
        })?;

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::InvalidFormat {
                path,
                reason: e.to_string(),
            })
    }

    /// Writes `value` to a temporary sibling, then persists it over `name`.
    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> StoreResult<()> {
        self.ensure_dir()?;
        let path = self.dir.join(name);
        let write_failed = |source: std::io::Error| StoreError::WriteFailed {
            path: path.clone(),
            source,
        };

        let json = serde_json::to_string_pretty(value).map_err(|e| StoreError::InvalidFormat {
            path: path.clone(),
            reason: format!("JSON serialization failed: {}", e),
        })?;

        let mut temp = NamedTempFile::new_in(&self.dir).map_err(write_failed)?;
        temp.write_all(json.as_bytes()).map_err(write_failed)?;
        temp.as_file().sync_all().map_err(write_failed)?;
        temp.persist(&path).map_err(|e| write_failed(e.error))?;

        Ok(())
    }
}

impl StateStore for JsonFileStore {
    fn load_state(&self) -> StoreResult<Option<AppState>> {
        let _guard = self.lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        self.read_json(STATE_FILE)
    }

    fn update_state(&self, update: &mut dyn FnMut(&mut AppState)) -> StoreResult<AppState> {
        let _guard = self.lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut state = self.read_json(STATE_FILE)?.unwrap_or_default();
        update(&mut state);
        self.write_json(STATE_FILE, &state)?;
        Ok(state)
    }

    fn append_error(&self, record: ErrorRecord) -> StoreResult<()> {
        let _guard = self.lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut records: Vec<ErrorRecord> = self.read_json(ERRORS_FILE)?.unwrap_or_default();
        records.push(record);
        self.write_json(ERRORS_FILE, &records)
    }

    fn errors(&self) -> StoreResult<Vec<ErrorRecord>> {
        let _guard = self.lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(self.read_json(ERRORS_FILE)?.unwrap_or_default())
    }
}

/// In-memory store, used by tests and embedders that do not want files.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<Option<AppState>>,
    errors: Mutex<Vec<ErrorRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn load_state(&self) -> StoreResult<Option<AppState>> {
        let state = self.state.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.clone())
    }

    fn update_state(&self, update: &mut dyn FnMut(&mut AppState)) -> StoreResult<AppState> {
        let mut slot = self.state.lock().map_err(|_| StoreError::LockPoisoned)?;
        let state = slot.get_or_insert_with(AppState::default);
        update(state);
        Ok(state.clone())
    }

    fn append_error(&self, record: ErrorRecord) -> StoreResult<()> {
        self.errors
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .push(record);
        Ok(())
    }

    fn errors(&self) -> StoreResult<Vec<ErrorRecord>> {
        Ok(self
            .errors
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .clone())
    }
}
