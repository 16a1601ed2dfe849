//! Output formatting and styling module.
//!
//! Provides a single place for all console output: colored status lines, the
//! batch progress bar and the per-identifier summary table.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use file_sorter::output::OutputFormatter;
    /// OutputFormatter::success("Files sorted");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a percentage progress bar for a sort batch.
    ///
    /// The bar runs from 0 to 100 and is driven by the values the dispatcher
    /// reports after each move.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use file_sorter::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar();
    /// OutputFormatter::update_progress(&pb, 37.5);
    /// pb.finish_with_message("done");
    /// ```
    pub fn create_progress_bar() -> ProgressBar {
        let pb = ProgressBar::new(100);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Moves the bar to `percent`, clamped to `0..=100`.
    pub fn update_progress(pb: &ProgressBar, percent: f64) {
        pb.set_position(percent.clamp(0.0, 100.0).round() as u64);
    }

    /// Prints a summary table of file counts per identifier folder.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use file_sorter::output::OutputFormatter;
    /// use std::collections::BTreeMap;
    ///
    /// let mut counts = BTreeMap::new();
    /// counts.insert("09014123456789".to_string(), 2);
    /// OutputFormatter::summary_table(&counts, 2);
    /// ```
    pub fn summary_table(identifier_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let max_identifier_len = identifier_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(10); // At least "Identifier" width

        println!(
            "{:<width$} | {}",
            "Identifier".bold(),
            "Files".bold(),
            width = max_identifier_len
        );
        println!("{}", "-".repeat(max_identifier_len + 10));

        for (identifier, count) in identifier_counts {
            println!(
                "{:<width$} | {} {}",
                identifier,
                count.to_string().green(),
                file_word(*count),
                width = max_identifier_len
            );
        }

        println!("{}", "-".repeat(max_identifier_len + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            file_word(total_files),
            width = max_identifier_len
        );
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn file_word(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
