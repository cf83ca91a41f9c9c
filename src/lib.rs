//! samplesort - reorganize sample packs into a type-based library
//!
//! This library classifies audio sample files by filename keywords into a
//! fixed taxonomy (Drums/Kicks, Bass, Vocals, ...) and moves, copies or
//! symlinks them into a destination tree, with collision handling, a dry-run
//! preview and optional TOML configuration for filters and extra rules.

pub mod cli;
pub mod config;
pub mod file_category;
pub mod file_organizer;
pub mod output;
pub mod report;
pub mod sample_tags;

pub use config::{CompiledFilters, ConfigError, SortConfig};
pub use file_category::{Category, RuleTable, classify};
pub use file_organizer::{
    ActionKind, OrganizeError, OrganizeResult, Placement, PlannedAction, RunOptions,
    SampleOrganizer, SourceFile, run, run_into,
};
pub use report::RunReport;

pub use cli::{Cli, run_cli};
