//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: colored status lines,
//! the dry-run action list, a progress bar for live runs and the final
//! summary table.

use crate::file_organizer::{PlannedAction, Placement};
use crate::report::RunReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use samplesort::output::OutputFormatter;
    /// OutputFormatter::error("Failed to copy Kick_01.wav");
    /// ```
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

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a progress bar for file operations.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use samplesort::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// Formats one action as `source -> destination [mode]`.
    pub fn action_line(action: &PlannedAction) -> String {
        let note = match action.placement {
            Placement::New => String::new(),
            Placement::Renamed { suffix } => format!(" (renamed, _{})", suffix).yellow().to_string(),
            Placement::AlreadyPresent => " (already present)".dimmed().to_string(),
        };
        format!(
            "{}  ->  {}  [{}]{}",
            action.source.display(),
            action.destination.display(),
            action.kind,
            note
        )
    }

    /// Prints a summary table with file counts by category.
    pub fn summary_table(category_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let max_category_len = category_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = max_category_len
        );
        println!("{}", "-".repeat(max_category_len + 10));

        for (category, count) in category_counts {
            let file_word = if *count == 1 { "file" } else { "files" };
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                file_word,
                width = max_category_len
            );
        }

        println!("{}", "-".repeat(max_category_len + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            if total_files == 1 { "file" } else { "files" },
            width = max_category_len
        );
    }

    /// Prints the category table followed by outcome counts and failures.
    pub fn run_summary(report: &RunReport) {
        Self::summary_table(&report.per_category, report.processed);

        let verb = if report.dry_run {
            "Would place"
        } else {
            "Placed"
        };
        println!();
        println!("{}: {}", verb, report.succeeded().to_string().green());
        println!(
            "Collisions resolved: {}",
            report.collisions_resolved.to_string().yellow()
        );
        println!(
            "Skipped: {} ({} filtered, {} already present)",
            report.skipped(),
            report.skipped_filtered,
            report.already_present
        );

        if report.failed.is_empty() {
            println!("Failed: {}", "0".green());
        } else {
            println!("Failed: {}", report.failed.len().to_string().red());
            for failure in &report.failed {
                eprintln!("  - {}: {}", failure.path.display(), failure.reason);
            }
        }
    }
}
