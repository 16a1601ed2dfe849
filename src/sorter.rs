//! Caller-facing sort operations.
//!
//! [`Sorter`] wraps the dispatcher with what a front end needs: input
//! validation, a guard against overlapping batches, the persisted counters
//! and the error log.

use crate::dispatcher::{
    BatchReport, DirectoryEntry, FileSystem, PlannedMove, SortError, SortResult, StdFileSystem,
    plan_batch, sort_files_into_folders,
};
use crate::identifier::IdentifierMatcher;
use crate::store::{AppState, ErrorRecord, StateStore};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Lifecycle of the most recent batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Marks a batch as running for as long as it is alive.
///
/// Dropping it without calling `complete` or `cancel` (an error return or a
/// panic in the progress callback) leaves the state `Failed`.
struct BatchGuard<'a> {
    state: &'a Mutex<BatchState>,
    previous: BatchState,
    settled: bool,
}

impl BatchGuard<'_> {
    fn complete(mut self) {
        self.settle(BatchState::Completed);
    }

    /// The batch never began; restore the state it found.
    fn cancel(mut self) {
        let previous = self.previous;
        self.settle(previous);
    }

    fn settle(&mut self, next: BatchState) {
        *lock_state(self.state) = next;
        self.settled = true;
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            *lock_state(self.state) = BatchState::Failed;
        }
    }
}

fn lock_state(state: &Mutex<BatchState>) -> MutexGuard<'_, BatchState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Result of a successful sort.
#[derive(Debug, Clone)]
pub struct SortOutcome {
    /// Folder the identifier folders were created in.
    pub output_path: PathBuf,
    pub report: BatchReport,
}

/// Runs sort batches against a matcher, a file system and a state store.
pub struct Sorter<S: StateStore, F: FileSystem = StdFileSystem> {
    matcher: Box<dyn IdentifierMatcher + Send + Sync>,
    store: S,
    file_system: F,
    state: Mutex<BatchState>,
}

impl<S: StateStore> Sorter<S, StdFileSystem> {
    pub fn new(matcher: Box<dyn IdentifierMatcher + Send + Sync>, store: S) -> Self {
        Self::with_file_system(matcher, store, StdFileSystem)
    }
}

impl<S: StateStore, F: FileSystem> Sorter<S, F> {
    pub fn with_file_system(
        matcher: Box<dyn IdentifierMatcher + Send + Sync>,
        store: S,
        file_system: F,
    ) -> Self {
        Self {
            matcher,
            store,
            file_system,
            state: Mutex::new(BatchState::Idle),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// State of the current or most recent batch.
    pub fn state(&self) -> BatchState {
        *lock_state(&self.state)
    }

    /// Returns the persisted counters, creating them on first use.
    ///
    /// An existing state has its `version` refreshed to the running build.
    pub fn get_config(&self) -> SortResult<AppState> {
        let version = env!("CARGO_PKG_VERSION");
        let state = self.store.update_state(&mut |state| {
            state.version = version.to_string();
        })?;
        Ok(state)
    }

    /// Sorts the files in `source` into identifier folders.
    ///
    /// Identifier folders are created under `output`, or under `source` when
    /// no output is given. Returns the effective output path and the batch
    /// report.
    ///
    /// # Errors
    ///
    /// Validation errors are returned before anything is touched and leave
    /// [`Sorter::state`] unchanged. I/O errors abort the batch, are appended to
    /// the error log, and leave already moved files where they are.
    pub fn sort(
        &self,
        source: Option<&Path>,
        output: Option<&Path>,
        on_progress: &mut dyn FnMut(f64),
    ) -> SortResult<SortOutcome> {
        let guard = self.begin()?;

        let (source, output, entries) = match self.validate(source, output) {
            Ok(checked) => checked,
            Err(e) => {
                log::warn!("sort rejected: {}", e);
                guard.cancel();
                return Err(e);
            }
        };

        match self.run_batch(&entries, &source, output, on_progress) {
            Ok(outcome) => {
                guard.complete();
                Ok(outcome)
            }
            Err(e) => {
                log::error!("sort failed: {}", e);
                if e.is_io() {
                    self.record_error(&e);
                }
                Err(e)
            }
        }
    }

    /// Lists the moves `sort` would perform, without moving anything.
    pub fn preview(
        &self,
        source: Option<&Path>,
        output: Option<&Path>,
    ) -> SortResult<(PathBuf, Vec<PlannedMove>)> {
        let (source, output, entries) = self.validate(source, output)?;
        let planned = plan_batch(
            &entries,
            &source,
            &output,
            self.matcher.as_ref(),
            &self.file_system,
        )?;
        Ok((output, planned))
    }

    fn run_batch(
        &self,
        entries: &[DirectoryEntry],
        source: &Path,
        output: PathBuf,
        on_progress: &mut dyn FnMut(f64),
    ) -> SortResult<SortOutcome> {
        let report = sort_files_into_folders(
            entries,
            source,
            &output,
            self.matcher.as_ref(),
            &self.file_system,
            on_progress,
        )?;

        let moved = report.moved() as u64;
        if let Err(e) = self
            .store
            .update_state(&mut |state| state.files_moved += moved)
        {
            log::warn!("could not update moved-file counter: {}", e);
        }

        Ok(SortOutcome {
            output_path: output,
            report,
        })
    }

    /// Checks the inputs and lists the source folder.
    fn validate(
        &self,
        source: Option<&Path>,
        output: Option<&Path>,
    ) -> SortResult<(PathBuf, PathBuf, Vec<DirectoryEntry>)> {
        let source = match source {
            Some(path) if !path.as_os_str().is_empty() => path.to_path_buf(),
            _ => return Err(SortError::SourceNotProvided),
        };
        if !source.exists() {
            return Err(SortError::SourceNotFound { path: source });
        }

        let output = match output {
            Some(path) if !path.as_os_str().is_empty() => {
                if !path.exists() {
                    return Err(SortError::OutputNotFound {
                        path: path.to_path_buf(),
                    });
                }
                path.to_path_buf()
            }
            _ => source.clone(),
        };

        let names = self
            .file_system
            .list_directory(&source)
            .map_err(|e| SortError::ListFailed {
                path: source.clone(),
                source: e,
            })?;
        if names.is_empty() {
            return Err(SortError::SourceEmpty { path: source });
        }

        let entries = names.into_iter().map(DirectoryEntry::new).collect();
        Ok((source, output, entries))
    }

    fn begin(&self) -> SortResult<BatchGuard<'_>> {
        let mut state = lock_state(&self.state);
        if *state == BatchState::Running {
            return Err(SortError::BatchInProgress);
        }
        let previous = *state;
        *state = BatchState::Running;
        Ok(BatchGuard {
            state: &self.state,
            previous,
            settled: false,
        })
    }

    fn record_error(&self, error: &SortError) {
        let record = ErrorRecord::from_error(error.kind(), error);
        if let Err(e) = self.store.append_error(record) {
            log::warn!("could not write error log: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::StrictMatcher;
    use crate::store::MemoryStore;
    use std::fs;
    use tempfile::TempDir;

    fn sorter() -> Sorter<MemoryStore> {
        Sorter::new(Box::new(StrictMatcher), MemoryStore::new())
    }

    #[test]
    fn test_get_config_creates_defaults() {
        let sorter = sorter();
        let state = sorter.get_config().unwrap();
        assert_eq!(state.files_moved, 0);
        assert!(!state.first_launch);
        assert_eq!(state.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_get_config_refreshes_version() {
        let sorter = sorter();
        sorter
            .store()
            .update_state(&mut |s| {
                s.version = "0.0.1".to_string();
                s.files_moved = 12;
            })
            .unwrap();

        let state = sorter.get_config().unwrap();
        assert_eq!(state.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(state.files_moved, 12);
    }

    #[test]
    fn test_missing_source_is_validation_error() {
        let sorter = sorter();
        let err = sorter.sort(None, None, &mut |_| {}).unwrap_err();
        assert!(matches!(err, SortError::SourceNotProvided));

        let err = sorter
            .sort(Some(Path::new("")), None, &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, SortError::SourceNotProvided));
        assert_eq!(sorter.state(), BatchState::Idle);
    }

    #[test]
    fn test_nonexistent_folders_are_validation_errors() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let sorter = sorter();

        let err = sorter
            .sort(Some(&temp_dir.path().join("nope")), None, &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, SortError::SourceNotFound { .. }));

        fs::write(temp_dir.path().join("a.pdf"), "x").unwrap();
        let err = sorter
            .sort(
                Some(temp_dir.path()),
                Some(&temp_dir.path().join("missing-out")),
                &mut |_| {},
            )
            .unwrap_err();
        assert!(matches!(err, SortError::OutputNotFound { .. }));
        assert!(sorter.store().errors().unwrap().is_empty());
    }

    #[test]
    fn test_empty_source_is_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let sorter = sorter();
        let err = sorter
            .sort(Some(temp_dir.path()), None, &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, SortError::SourceEmpty { .. }));
        assert!(err.is_validation());
    }

    #[test]
    fn test_sort_defaults_output_to_source_and_counts_moves() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("09-014-1234-56-789 a.pdf"), "x").unwrap();
        fs::write(base.join("unrelated.pdf"), "x").unwrap();

        let sorter = sorter();
        let outcome = sorter.sort(Some(base), None, &mut |_| {}).unwrap();

        assert_eq!(outcome.output_path, base.to_path_buf());
        assert_eq!(outcome.report.moved(), 1);
        assert_eq!(sorter.state(), BatchState::Completed);
        assert_eq!(
            sorter.store().load_state().unwrap().unwrap().files_moved,
            1
        );
    }

    #[test]
    fn test_io_failure_is_logged() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("in");
        let output = temp_dir.path().join("out");
        fs::create_dir_all(output.join("09014123456789")).unwrap();
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("09-014-1234-56-789.pdf"), "new").unwrap();
        fs::write(output.join("09014123456789/09-014-1234-56-789.pdf"), "old").unwrap();

        let sorter = sorter();
        let err = sorter
            .sort(Some(&source), Some(&output), &mut |_| {})
            .unwrap_err();

        assert!(err.is_io());
        assert_eq!(sorter.state(), BatchState::Failed);
        let errors = sorter.store().errors().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error.name, "IOError");
        assert!(errors[0].error.message.contains("Failed to move"));
    }

    #[test]
    fn test_running_batch_rejects_new_request() {
        let sorter = sorter();
        let guard = sorter.begin().unwrap();
        let err = sorter.sort(None, None, &mut |_| {}).unwrap_err();
        assert!(matches!(err, SortError::BatchInProgress));
        assert_eq!(sorter.state(), BatchState::Running);
        guard.complete();
        assert_eq!(sorter.state(), BatchState::Completed);
    }

    #[test]
    fn test_validation_error_keeps_previous_state() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("09-014-1234-56-789 a.pdf"), "x").unwrap();

        let sorter = sorter();
        sorter.sort(Some(base), None, &mut |_| {}).unwrap();
        assert_eq!(sorter.state(), BatchState::Completed);

        let err = sorter
            .sort(Some(&base.join("nope")), None, &mut |_| {})
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(sorter.state(), BatchState::Completed);
    }

    #[test]
    fn test_dropped_batch_guard_marks_failure() {
        let sorter = sorter();
        drop(sorter.begin().unwrap());
        assert_eq!(sorter.state(), BatchState::Failed);
        assert!(sorter.begin().is_ok());
    }

    #[test]
    fn test_panicking_progress_callback_does_not_wedge_sorter() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("09-014-1234-56-789 a.pdf"), "x").unwrap();
        fs::write(base.join("09-014-1234-56-780 b.pdf"), "x").unwrap();

        let sorter = sorter();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            sorter.sort(Some(base), None, &mut |_| panic!("callback failed"))
        }));
        assert!(result.is_err());
        assert_eq!(sorter.state(), BatchState::Failed);

        let outcome = sorter.sort(Some(base), None, &mut |_| {}).unwrap();
        assert_eq!(outcome.report.moved(), 1);
        assert_eq!(sorter.state(), BatchState::Completed);
    }

    #[test]
    fn test_preview_leaves_files_in_place() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("09-014-1234-56-789 a.pdf"), "x").unwrap();

        let sorter = sorter();
        let (output, planned) = sorter.preview(Some(base), None).unwrap();
        assert_eq!(output, base.to_path_buf());
        assert_eq!(planned.len(), 1);
        assert!(base.join("09-014-1234-56-789 a.pdf").is_file());
        assert_eq!(sorter.state(), BatchState::Idle);
    }
}
