/// Batch dispatch of files into identifier folders.
///
/// This module walks a directory listing in order, derives an identifier for
/// every regular file, creates `output/<identifier>` on demand and moves the
/// file into it. Files without an identifier and subdirectories are skipped.
/// The first I/O failure aborts the batch; files moved before it stay moved.
use crate::config::ConfigError;
use crate::identifier::IdentifierMatcher;
use crate::store::StoreError;
use std::borrow::Cow;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A single name from a directory listing.
///
/// The name is kept as the OS gave it so paths built from it always point
/// at the real file, even when it is not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub file_name: OsString,
}

impl DirectoryEntry {
    pub fn new(file_name: impl Into<OsString>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// The name as text, with invalid UTF-8 replaced. Used for matching and messages.
    pub fn display_name(&self) -> Cow<'_, str> {
        self.file_name.to_string_lossy()
    }
}

/// Records a file that was moved during a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    /// The original path of the file before sorting.
    pub original_path: PathBuf,
    /// The new path of the file after sorting.
    pub new_path: PathBuf,
    /// The identifier folder the file was moved to.
    pub identifier: String,
}

/// Outcome of a completed batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Number of entries in the listing, skipped ones included.
    pub total_entries: usize,
    /// Files moved, in the order they were moved.
    pub moves: Vec<MoveRecord>,
    /// Entries that were directories.
    pub skipped_directories: usize,
    /// Files whose name carried no identifier.
    pub skipped_unmatched: Vec<String>,
    /// Identifier folders this batch created or reused.
    pub folders: Vec<String>,
    /// Last progress value reported, `0.0` if nothing was moved.
    pub progress: f64,
}

impl BatchReport {
    pub fn moved(&self) -> usize {
        self.moves.len()
    }
}

/// A move a batch would perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub file_name: String,
    pub identifier: String,
    pub destination: PathBuf,
}

/// File-system operations the dispatcher depends on.
pub trait FileSystem {
    /// Names in `path`, in the order the OS returns them.
    fn list_directory(&self, path: &Path) -> io::Result<Vec<OsString>>;

    /// Whether `path` is a regular file.
    fn is_file(&self, path: &Path) -> io::Result<bool>;

    /// Creates `path` and missing parents. Existing directories are fine.
    fn ensure_directory(&self, path: &Path) -> io::Result<()>;

    /// Moves `src` to `dst`, failing if `dst` already exists.
    fn move_file(&self, src: &Path, dst: &Path) -> io::Result<()>;
}

/// [`FileSystem`] over `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn list_directory(&self, path: &Path) -> io::Result<Vec<OsString>> {
        fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.file_name()))
            .collect()
    }

    fn is_file(&self, path: &Path) -> io::Result<bool> {
        Ok(fs::metadata(path)?.is_file())
    }

    fn ensure_directory(&self, path: &Path) -> io::Result<()> {
        match fs::create_dir_all(path) {
            Ok(()) => Ok(()),
            // Another process may have created it between our checks.
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn move_file(&self, src: &Path, dst: &Path) -> io::Result<()> {
        if dst.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("destination {} already exists", dst.display()),
            ));
        }

        complete_move(src, dst, fs::rename(src, dst))
    }
}

/// Finishes a move given the outcome of `rename`, copying when the rename
/// could not cross devices.
fn complete_move(src: &Path, dst: &Path, renamed: io::Result<()>) -> io::Result<()> {
    match renamed {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            log::debug!(
                "rename across devices, copying {} to {}",
                src.display(),
                dst.display()
            );
            copy_then_remove(src, dst, |from, to| fs::copy(from, to))
        }
        Err(e) => Err(e),
    }
}

/// Copies `src` to `dst` with `copy`, then removes `src`.
///
/// On any failure `dst` is removed again so exactly one copy remains.
fn copy_then_remove<C>(src: &Path, dst: &Path, copy: C) -> io::Result<()>
where
    C: FnOnce(&Path, &Path) -> io::Result<u64>,
{
    if let Err(copy_err) = copy(src, dst) {
        discard_partial_copy(dst);
        return Err(copy_err);
    }
    if let Err(remove_err) = fs::remove_file(src) {
        discard_partial_copy(dst);
        return Err(remove_err);
    }
    Ok(())
}

fn discard_partial_copy(dst: &Path) {
    if !dst.exists() {
        return;
    }
    if let Err(e) = fs::remove_file(dst) {
        log::warn!(
            "could not remove incomplete copy {}: {}",
            dst.display(),
            e
        );
    }
}

/// Errors that can occur while validating or running a batch.
#[derive(Debug)]
pub enum SortError {
    /// No source folder was given.
    SourceNotProvided,
    /// The source folder does not exist.
    SourceNotFound { path: PathBuf },
    /// An output folder was given but does not exist.
    OutputNotFound { path: PathBuf },
    /// The source folder has no entries.
    SourceEmpty { path: PathBuf },
    /// Another batch is already running.
    BatchInProgress,
    /// Failed to list the source folder.
    ListFailed { path: PathBuf, source: io::Error },
    /// Failed to query an entry's metadata.
    StatFailed { path: PathBuf, source: io::Error },
    /// Failed to create an identifier folder.
    DirectoryCreationFailed { path: PathBuf, source: io::Error },
    /// Failed to move a file into its identifier folder.
    FileMoveFailure {
        source: PathBuf,
        destination: PathBuf,
        source_error: io::Error,
    },
    /// Configuration could not be loaded or compiled.
    Config(ConfigError),
    /// Persisted state could not be read or written.
    Store(StoreError),
}

impl SortError {
    /// Error kind name, as written to the error log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceNotProvided
            | Self::SourceNotFound { .. }
            | Self::OutputNotFound { .. }
            | Self::SourceEmpty { .. } => "ValidationError",
            Self::BatchInProgress => "BatchInProgress",
            Self::ListFailed { .. }
            | Self::StatFailed { .. }
            | Self::DirectoryCreationFailed { .. }
            | Self::FileMoveFailure { .. } => "IOError",
            Self::Config(_) => "ConfigError",
            Self::Store(_) => "StoreError",
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == "ValidationError"
    }

    pub fn is_io(&self) -> bool {
        self.kind() == "IOError"
    }
}

impl std::fmt::Display for SortError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceNotProvided => write!(f, "Source folder not provided"),
            Self::SourceNotFound { path } => {
                write!(f, "Source directory does not exist: {}", path.display())
            }
            Self::OutputNotFound { path } => write!(
                f,
                "Output directory was provided but does not exist: {}",
                path.display()
            ),
            Self::SourceEmpty { path } => {
                write!(f, "No files found in source directory {}", path.display())
            }
            Self::BatchInProgress => write!(
                f,
                "A sort is already running. Please wait for it to finish."
            ),
            Self::ListFailed { path, source } => {
                write!(f, "Failed to read directory {}: {}", path.display(), source)
            }
            Self::StatFailed { path, source } => {
                write!(f, "Failed to inspect {}: {}", path.display(), source)
            }
            Self::DirectoryCreationFailed { path, source } => {
                write!(
                    f,
                    "Failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::FileMoveFailure {
                source,
                destination,
                source_error,
            } => {
                write!(
                    f,
                    "Failed to move {} to {}: {}",
                    source.display(),
                    destination.display(),
                    source_error
                )
            }
            Self::Config(e) => write!(f, "{}", e),
            Self::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SortError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ListFailed { source, .. }
            | Self::StatFailed { source, .. }
            | Self::DirectoryCreationFailed { source, .. } => Some(source),
            Self::FileMoveFailure { source_error, .. } => Some(source_error),
            Self::Config(e) => Some(e),
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for SortError {
    fn from(err: ConfigError) -> Self {
        SortError::Config(err)
    }
}

impl From<StoreError> for SortError {
    fn from(err: StoreError) -> Self {
        SortError::Store(err)
    }
}

/// Result type for sorting operations.
pub type SortResult<T> = Result<T, SortError>;

/// Sorts `entries` from `source_folder` into identifier folders under `output_folder`.
///
/// Entries are processed strictly in the given order. After each successful
/// move `on_progress` receives `(index + 1) / entries.len() * 100`; skipped
/// entries still count toward the denominator, so the last value can be
/// below 100.
///
/// # Errors
///
/// The first stat, folder creation or move failure aborts the batch and is
/// returned. Files moved before the failure are not put back.
///
/// # Examples
///
/// ```no_run
/// use file_sorter::dispatcher::{sort_files_into_folders, DirectoryEntry, StdFileSystem};
/// use file_sorter::identifier::StrictMatcher;
/// use std::path::Path;
///
/// let entries = vec![DirectoryEntry::new("09-014-1234-56-789_report.pdf")];
/// let report = sort_files_into_folders(
///     &entries,
///     Path::new("/data/inbox"),
///     Path::new("/data/sorted"),
///     &StrictMatcher,
///     &StdFileSystem,
///     &mut |percent| println!("{percent:.0}%"),
/// );
/// ```
pub fn sort_files_into_folders(
    entries: &[DirectoryEntry],
    source_folder: &Path,
    output_folder: &Path,
    matcher: &dyn IdentifierMatcher,
    file_system: &dyn FileSystem,
    on_progress: &mut dyn FnMut(f64),
) -> SortResult<BatchReport> {
    let total = entries.len();
    let mut report = BatchReport {
        total_entries: total,
        ..Default::default()
    };
    let mut known_folders: HashSet<String> = HashSet::new();

    log::info!(
        "sorting {} entries from {} into {}",
        total,
        source_folder.display(),
        output_folder.display()
    );

    for (index, entry) in entries.iter().enumerate() {
        let file_path = source_folder.join(&entry.file_name);

        let is_file = file_system
            .is_file(&file_path)
            .map_err(|e| SortError::StatFailed {
                path: file_path.clone(),
                source: e,
            })?;
        let name = entry.display_name();
        if !is_file {
            log::debug!("skipping directory {}", name);
            report.skipped_directories += 1;
            continue;
        }

        let Some(identifier) = matcher.extract(&name) else {
            log::debug!("no identifier in {}", name);
            report.skipped_unmatched.push(name.into_owned());
            continue;
        };

        let folder_path = output_folder.join(&identifier);
        if known_folders.insert(identifier.clone()) {
            file_system
                .ensure_directory(&folder_path)
                .map_err(|e| SortError::DirectoryCreationFailed {
                    path: folder_path.clone(),
                    source: e,
                })?;
            report.folders.push(identifier.clone());
        }

        let destination_path = folder_path.join(&entry.file_name);
        file_system
            .move_file(&file_path, &destination_path)
            .map_err(|e| SortError::FileMoveFailure {
                source: file_path.clone(),
                destination: destination_path.clone(),
                source_error: e,
            })?;

        let progress = (index + 1) as f64 * 100.0 / total as f64;
        log::debug!("moved {} to {}/ ({:.1}%)", name, identifier, progress);
        report.progress = progress;
        report.moves.push(MoveRecord {
            original_path: file_path,
            new_path: destination_path,
            identifier,
        });
        on_progress(progress);
    }

    log::info!(
        "batch complete: {} moved, {} unmatched, {} directories skipped",
        report.moved(),
        report.skipped_unmatched.len(),
        report.skipped_directories
    );

    Ok(report)
}

/// Computes the moves a batch would perform, without touching any file.
///
/// # Errors
///
/// Returns `SortError::StatFailed` if an entry cannot be inspected.
pub fn plan_batch(
    entries: &[DirectoryEntry],
    source_folder: &Path,
    output_folder: &Path,
    matcher: &dyn IdentifierMatcher,
    file_system: &dyn FileSystem,
) -> SortResult<Vec<PlannedMove>> {
    let mut planned = Vec::new();

    for entry in entries {
        let file_path = source_folder.join(&entry.file_name);
        let is_file = file_system
            .is_file(&file_path)
            .map_err(|e| SortError::StatFailed {
                path: file_path.clone(),
                source: e,
            })?;
        if !is_file {
            continue;
        }

        let name = entry.display_name();
        if let Some(identifier) = matcher.extract(&name) {
            planned.push(PlannedMove {
                destination: output_folder.join(&identifier).join(&entry.file_name),
                file_name: name.into_owned(),
                identifier,
            });
        }
    }

    Ok(planned)
}
