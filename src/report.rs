/// Run report for a reorganization pass.
///
/// The report is the only state that survives a run. It lists every planned
/// action in traversal order and keeps the counters printed in the final
/// summary.
use crate::file_organizer::{ActionKind, Placement, PlannedAction};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A file that could not be placed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Accumulated result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// RFC 3339 timestamp of when the run started.
    pub started_at: String,
    /// Whether the run was a preview only.
    pub dry_run: bool,
    /// The action requested for every file.
    pub mode: ActionKind,
    /// Planned (dry run) or performed (live) actions, in traversal order.
    pub actions: Vec<PlannedAction>,
    /// Number of classified files per category label.
    pub per_category: BTreeMap<String, usize>,
    /// Number of files that received a `_N` suffix.
    pub collisions_resolved: usize,
    /// Number of files skipped by the extension filter or config filters.
    pub skipped_filtered: usize,
    /// Number of files already present at their destination.
    pub already_present: usize,
    /// Files that failed, with reasons.
    pub failed: Vec<FailedFile>,
    /// Number of files that reached classification.
    pub processed: usize,
}

impl RunReport {
    /// Creates an empty report for a run.
    pub fn new(mode: ActionKind, dry_run: bool) -> Self {
        Self {
            started_at: chrono::Utc::now().to_rfc3339(),
            dry_run,
            mode,
            actions: Vec::new(),
            per_category: BTreeMap::new(),
            collisions_resolved: 0,
            skipped_filtered: 0,
            already_present: 0,
            failed: Vec::new(),
            processed: 0,
        }
    }

    /// Records a planned or completed action.
    pub fn record_action(&mut self, action: PlannedAction) {
        match action.placement {
            Placement::AlreadyPresent => self.already_present += 1,
            Placement::Renamed { .. } => self.collisions_resolved += 1,
            Placement::New => {}
        }
        self.actions.push(action);
    }

    /// Counts a classified file under its category.
    pub fn record_classified(&mut self, category: &str) {
        self.processed += 1;
        *self.per_category.entry(category.to_string()).or_insert(0) += 1;
    }

    pub fn record_filtered(&mut self) {
        self.skipped_filtered += 1;
    }

    pub fn record_failure(&mut self, path: PathBuf, reason: impl Into<String>) {
        self.failed.push(FailedFile {
            path,
            reason: reason.into(),
        });
    }

    /// Number of files placed (or that would be placed) at a destination.
    pub fn succeeded(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| a.placement != Placement::AlreadyPresent)
            .count()
    }

    /// Total skipped files: filtered out plus already present.
    pub fn skipped(&self) -> usize {
        self.skipped_filtered + self.already_present
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Serializes the report as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
