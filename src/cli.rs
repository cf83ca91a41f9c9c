//! Command-line interface module for samplesort.
//!
//! This module handles all CLI-related functionality including:
//! - Argument definitions
//! - Configuration loading and merging with flags
//! - Run orchestration and progress output
//! - The final summary

use crate::config::SortConfig;
use crate::file_category::{AUDIO_EXTENSIONS, NON_AUDIO_EXTENSIONS};
use crate::file_organizer::{
    ActionKind, OrganizeError, OrganizeResult, RunEvent, RunOptions, run_into,
};
use crate::output::OutputFormatter;
use crate::report::RunReport;
use clap::Parser;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};

/// Reorganize pack-based sample libraries into type-based folders.
#[derive(Debug, Clone, Parser)]
#[command(name = "samplesort")]
#[command(version)]
pub struct Cli {
    /// Root of the pack-organized library (e.g. ~/Splice/Sounds)
    #[arg(long, value_name = "PATH")]
    pub source: PathBuf,

    /// Root of the new type-organized tree
    #[arg(long, value_name = "PATH")]
    pub dest: PathBuf,

    /// How to place files at the destination
    #[arg(long, value_enum)]
    pub mode: ActionKind,

    /// Show what would happen without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Only process these extensions (comma separated, e.g. wav,aif)
    #[arg(long, value_delimiter = ',', value_name = "LIST")]
    pub ext: Option<Vec<String>>,

    /// Only process common audio formats
    #[arg(long, conflicts_with = "ext")]
    pub audio_only: bool,

    /// Process audio formats plus MIDI, project and preset files
    #[arg(long, conflicts_with = "ext")]
    pub include_non_audio: bool,

    /// Path to a configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use folder names when the filename alone does not match a rule
    #[arg(long)]
    pub use_folders: bool,

    /// Append detected tempo and key to destination names
    #[arg(long)]
    pub tag_names: bool,

    /// Only print errors and the summary
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Expands a leading `~` using the `HOME` environment variable.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Merges command-line flags with the loaded configuration.
///
/// Flags win over configuration: `--ext` or the audio presets replace the
/// configured extension list, and `--use-folders` / `--tag-names` switch the
/// options on even when the config leaves them off.
///
/// # Errors
///
/// Returns a configuration error if filters or rules are invalid.
pub fn build_options(cli: &Cli, config: &SortConfig) -> OrganizeResult<RunOptions> {
    let mut options = RunOptions::new(expand_home(&cli.source), expand_home(&cli.dest), cli.mode)
        .dry_run(cli.dry_run);

    let extensions: Option<Vec<String>> = if let Some(ref list) = cli.ext {
        Some(list.clone())
    } else if cli.audio_only || cli.include_non_audio {
        let mut list: Vec<String> = AUDIO_EXTENSIONS.iter().map(|e| e.to_string()).collect();
        if cli.include_non_audio {
            list.extend(NON_AUDIO_EXTENSIONS.iter().map(|e| e.to_string()));
        }
        Some(list)
    } else {
        config.extensions.clone()
    };
    if let Some(list) = extensions {
        options = options.with_extensions(list);
    }

    options.classify_by_folders = cli.use_folders || config.classify_by_folders;
    options.tag_names = cli.tag_names || config.naming.tag_bpm_key;
    options.rules = config.rule_table()?;
    options.filters = config.compile_filters()?;
    Ok(options)
}

/// Loads the configuration and merges it with the flags.
fn prepare(cli: &Cli) -> OrganizeResult<RunOptions> {
    let config = SortConfig::load(cli.config.as_deref())?;
    build_options(cli, &config)
}

/// Runs the CLI application.
///
/// Loads configuration, executes the run with progress output and always
/// prints the summary, even when a configuration error or a fatal error
/// stops the run early.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use samplesort::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from([
///     "samplesort", "--source", "/samples/packs", "--dest", "/samples/by-type",
///     "--mode", "symlink", "--dry-run",
/// ]);
/// match run_cli(&cli) {
///     Ok(report) => println!("{} files processed", report.processed),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(cli: &Cli) -> OrganizeResult<RunReport> {
    let options = match prepare(cli) {
        Ok(options) => options,
        Err(error) => {
            let report = RunReport::new(cli.mode, cli.dry_run);
            print_report(cli, &report, Some(&error));
            return Err(error);
        }
    };
    let verbose = !cli.quiet && !cli.json;

    if verbose {
        let message = format!(
            "Reorganizing {} into {} ({})",
            options.source_root.display(),
            options.dest_root.display(),
            options.mode
        );
        if options.dry_run {
            OutputFormatter::dry_run_notice(&message);
        } else {
            OutputFormatter::info(&message);
        }
    }

    let mut report = RunReport::new(options.mode, options.dry_run);
    let mut progress: Option<ProgressBar> = None;

    let result = run_into(&options, &mut report, |event| match event {
        RunEvent::Started { total } => {
            if verbose && total == 0 {
                OutputFormatter::warning("No files found to reorganize.");
            } else if verbose && !options.dry_run {
                progress = Some(OutputFormatter::create_progress_bar(total as u64));
            }
        }
        RunEvent::Placed(action) => {
            if let Some(ref pb) = progress {
                pb.println(OutputFormatter::action_line(action));
                pb.inc(1);
            } else if verbose {
                OutputFormatter::plain(&OutputFormatter::action_line(action));
            }
        }
        // Fatal errors are reported once by the caller
        RunEvent::Failed(error) if error.is_fatal() => {}
        RunEvent::Failed(error) => {
            if let Some(ref pb) = progress {
                pb.inc(1);
                pb.suspend(|| OutputFormatter::error(&error.to_string()));
            } else {
                OutputFormatter::error(&error.to_string());
            }
        }
    });

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    print_report(cli, &report, result.as_ref().err());
    result.map(|()| report)
}

/// Prints the report as JSON or as the summary table.
fn print_report(cli: &Cli, report: &RunReport, fatal: Option<&OrganizeError>) {
    if cli.json {
        match report.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => OutputFormatter::error(&format!("Could not serialize report: {}", e)),
        }
        return;
    }

    OutputFormatter::run_summary(report);
    if fatal.is_some() {
        return;
    }
    if report.dry_run {
        OutputFormatter::success("Dry run complete. No files were modified.");
    } else if report.has_failures() {
        OutputFormatter::warning("Some files could not be placed. Please review errors above.");
    } else {
        OutputFormatter::success("Reorganization complete!");
    }
}
