//! Command-line interface module for file-sorter.
//!
//! This module turns a parsed command into calls on [`Sorter`]:
//! - Loading configuration and building the identifier matcher
//! - Running a sort batch with a progress bar
//! - Previewing a batch (dry run)
//! - Showing the persisted counters and the error log

use crate::config::SorterConfig;
use crate::identifier::IdentifierRule;
use crate::output::OutputFormatter;
use crate::sorter::Sorter;
use crate::store::{JsonFileStore, StateStore};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Represents a CLI command to execute.
#[derive(Debug, Clone)]
pub enum SortCommand {
    /// Sort the files of `source` into identifier folders.
    Sort {
        source: PathBuf,
        output: Option<PathBuf>,
        /// If true, show what would happen without moving anything.
        dry_run: bool,
    },
    /// Show the persisted counters.
    Status,
    /// Show the error log.
    Errors,
}

/// Settings that apply to every command.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    /// Explicit configuration file.
    pub config_path: Option<PathBuf>,
    /// Overrides `[identifier]` from the configuration file.
    pub rule: Option<IdentifierRule>,
    /// Overrides `[storage] state_dir` from the configuration file.
    pub state_dir: Option<PathBuf>,
}

/// Runs the CLI application with the given command.
///
/// # Examples
///
/// ```no_run
/// use file_sorter::cli::{run_cli, CliOptions, SortCommand};
/// use std::path::PathBuf;
///
/// let command = SortCommand::Sort {
///     source: PathBuf::from("/path/to/inbox"),
///     output: None,
///     dry_run: false,
/// };
/// match run_cli(command, &CliOptions::default()) {
///     Ok(()) => println!("Operation completed successfully"),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(command: SortCommand, options: &CliOptions) -> Result<(), String> {
    let mut config = SorterConfig::load(options.config_path.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    if let Some(rule) = &options.rule {
        config.identifier = rule.clone();
    }
    if let Some(dir) = &options.state_dir {
        config.storage.state_dir = Some(dir.clone());
    }

    let matcher = config
        .matcher()
        .map_err(|e| format!("Error compiling identifier rule: {}", e))?;
    let state_dir = config
        .state_dir()
        .map_err(|e| format!("Error locating state directory: {}", e))?;
    let sorter = Sorter::new(matcher, JsonFileStore::new(state_dir));

    match command {
        SortCommand::Sort {
            source,
            output,
            dry_run,
        } => {
            if dry_run {
                preview_sort(&sorter, &source, output.as_deref(), &config.identifier)
            } else {
                run_sort(&sorter, &source, output.as_deref(), &config.identifier)
            }
        }
        SortCommand::Status => show_status(&sorter),
        SortCommand::Errors => show_errors(&sorter),
    }
}

/// Sorts the files of `source`, rendering progress as it goes.
fn run_sort(
    sorter: &Sorter<JsonFileStore>,
    source: &Path,
    output: Option<&Path>,
    rule: &IdentifierRule,
) -> Result<(), String> {
    OutputFormatter::info(&format!(
        "Sorting contents of: {} ({} rule)",
        source.display(),
        rule.name()
    ));

    let pb = OutputFormatter::create_progress_bar();
    let result = sorter.sort(Some(source), output, &mut |percent| {
        OutputFormatter::update_progress(&pb, percent);
    });

    match result {
        Ok(outcome) => {
            pb.finish_and_clear();
            let report = &outcome.report;
            for record in &report.moves {
                let name = record
                    .new_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                OutputFormatter::plain(&format!(" - {} → {}/", name, record.identifier));
            }
            if !report.skipped_unmatched.is_empty() {
                OutputFormatter::warning(&format!(
                    "{} {} had no identifier and stayed in place",
                    report.skipped_unmatched.len(),
                    if report.skipped_unmatched.len() == 1 {
                        "file"
                    } else {
                        "files"
                    }
                ));
            }
            OutputFormatter::success(&format!(
                "Files have been sorted and moved to: {}",
                outcome.output_path.display()
            ));
            Ok(())
        }
        Err(e) => {
            pb.abandon();
            OutputFormatter::error(&format!("Failed to sort the files: {}", e));
            Err(e.to_string())
        }
    }
}

/// Shows what a sort would do without moving any file.
fn preview_sort(
    sorter: &Sorter<JsonFileStore>,
    source: &Path,
    output: Option<&Path>,
    rule: &IdentifierRule,
) -> Result<(), String> {
    OutputFormatter::dry_run_notice(&format!(
        "Analyzing contents of: {} ({} rule)",
        source.display(),
        rule.name()
    ));

    let (output_path, planned) = sorter
        .preview(Some(source), output)
        .map_err(|e| e.to_string())?;

    if planned.is_empty() {
        OutputFormatter::warning("No files with an identifier were found.");
        return Ok(());
    }

    OutputFormatter::header("Files would be sorted as follows:");
    let mut identifier_counts: BTreeMap<String, usize> = BTreeMap::new();
    for planned_move in &planned {
        OutputFormatter::plain(&format!(" - {}", planned_move.file_name));
        OutputFormatter::plain(&format!(
            "   → Would move to {}",
            planned_move.destination.display()
        ));
        *identifier_counts
            .entry(planned_move.identifier.clone())
            .or_insert(0) += 1;
    }

    OutputFormatter::summary_table(&identifier_counts, planned.len());
    OutputFormatter::dry_run_notice(&format!(
        "Dry run complete. No files were moved. Output folder: {}",
        output_path.display()
    ));

    Ok(())
}

fn show_status(sorter: &Sorter<JsonFileStore>) -> Result<(), String> {
    let state = sorter.get_config().map_err(|e| e.to_string())?;

    OutputFormatter::header("STATUS");
    OutputFormatter::plain(&format!("Version:      {}", state.version));
    OutputFormatter::plain(&format!("Last opened:  {}", state.last_opened));
    OutputFormatter::plain(&format!("Files moved:  {}", state.files_moved));
    OutputFormatter::plain(&format!(
        "State folder: {}",
        sorter.store().dir().display()
    ));
    Ok(())
}

fn show_errors(sorter: &Sorter<JsonFileStore>) -> Result<(), String> {
    let errors = sorter.store().errors().map_err(|e| e.to_string())?;

    if errors.is_empty() {
        OutputFormatter::success("No errors recorded.");
        return Ok(());
    }

    OutputFormatter::header(&format!("ERRORS ({})", errors.len()));
    for record in &errors {
        OutputFormatter::plain(&format!(
            "[{}] {} {}: {}",
            record.date, record.error_id, record.error.name, record.error.message
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn options(state_dir: &Path) -> CliOptions {
        CliOptions {
            config_path: None,
            rule: Some(IdentifierRule::Strict),
            state_dir: Some(state_dir.to_path_buf()),
        }
    }

    #[test]
    fn test_sort_command_moves_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("in");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("09-014-1234-56-789 a.pdf"), "x").unwrap();

        let command = SortCommand::Sort {
            source: source.clone(),
            output: None,
            dry_run: false,
        };
        run_cli(command, &options(&temp_dir.path().join("state"))).unwrap();

        assert!(source.join("09014123456789/09-014-1234-56-789 a.pdf").is_file());
    }

    #[test]
    fn test_dry_run_moves_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("in");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("09-014-1234-56-789 a.pdf"), "x").unwrap();

        let command = SortCommand::Sort {
            source: source.clone(),
            output: None,
            dry_run: true,
        };
        run_cli(command, &options(&temp_dir.path().join("state"))).unwrap();

        assert!(source.join("09-014-1234-56-789 a.pdf").is_file());
        assert!(!source.join("09014123456789").exists());
    }

    #[test]
    fn test_sort_missing_source_is_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let command = SortCommand::Sort {
            source: temp_dir.path().join("missing"),
            output: None,
            dry_run: false,
        };
        let result = run_cli(command, &options(&temp_dir.path().join("state")));
        assert!(result.is_err());
    }

    #[test]
    fn test_status_and_errors_commands() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let opts = options(temp_dir.path());
        run_cli(SortCommand::Status, &opts).unwrap();
        run_cli(SortCommand::Errors, &opts).unwrap();
        assert!(temp_dir.path().join("state.json").exists());
    }
}
