/// Materialization of classified samples into the destination tree.
///
/// This module walks a source directory, classifies every file, computes its
/// destination under `<dest>/<Category>/<file name>`, resolves name collisions
/// and then moves, copies or symlinks the file. In dry-run mode the same plan
/// is computed but nothing on disk is touched, not even directories.
use crate::config::{CompiledFilters, normalize_extension};
use crate::file_category::{Category, RuleTable};
pub use crate::file_category::{AUDIO_EXTENSIONS, NON_AUDIO_EXTENSIONS};
use crate::report::RunReport;
use crate::sample_tags::{split_extension, tagged_file_name};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Default highest `_N` suffix tried before giving up on a name.
pub const MAX_COLLISION_SUFFIX: usize = 9_999;

/// File created and removed in the destination root to prove it is writable.
const WRITE_CHECK_FILE: &str = ".samplesort-write-check";

/// How a file is materialized at its destination.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Relocate the file; the source path no longer exists afterwards.
    Move,
    /// Create an independent byte-identical duplicate.
    Copy,
    /// Create a symbolic link pointing at the original file.
    Symlink,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Move => "move",
            ActionKind::Copy => "copy",
            ActionKind::Symlink => "symlink",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of destination resolution for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    /// The original name was free.
    New,
    /// The original name was taken; `_suffix` was appended.
    Renamed { suffix: usize },
    /// The destination already holds this file from an earlier run.
    AlreadyPresent,
}

/// A regular file found under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Path below the source root.
    pub relative_path: PathBuf,
    pub file_name: String,
    /// Lowercase extension without the dot.
    pub extension: Option<String>,
}

impl SourceFile {
    fn new(path: PathBuf, root: &Path) -> Self {
        let relative_path = path.strip_prefix(root).unwrap_or(path.as_path()).to_path_buf();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| normalize_extension(&e.to_string_lossy()));
        Self {
            path,
            relative_path,
            file_name,
            extension,
        }
    }
}

/// One file's planned (dry run) or performed (live) action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAction {
    pub source: PathBuf,
    pub category: Category,
    pub kind: ActionKind,
    pub destination: PathBuf,
    pub placement: Placement,
}

/// Errors that can occur while reorganizing samples.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The source root does not exist.
    #[error("Source path not found: {}", .path.display())]
    PathNotFound { path: PathBuf },
    /// The source root exists but is not a directory.
    #[error("Source path is not a directory: {}", .path.display())]
    NotADirectory { path: PathBuf },
    /// The destination root cannot be created or written.
    #[error("Destination is not writable: {}: {source}", .path.display())]
    DestinationNotWritable { path: PathBuf, source: io::Error },
    /// A source entry could not be read or a destination written.
    #[error("Permission denied: {}: {source}", .path.display())]
    Permission { path: PathBuf, source: io::Error },
    /// Symbolic links are not available on this platform or filesystem.
    #[error("Symbolic links are not supported at {}: {source}", .path.display())]
    FilesystemCapability { path: PathBuf, source: io::Error },
    /// No free `_N` name was found for a destination.
    #[error("No free destination name for {} after {attempts} attempts", .path.display())]
    CollisionResolutionExhausted { path: PathBuf, attempts: usize },
    /// Any other filesystem failure for a single path.
    #[error("I/O error at {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

impl OrganizeError {
    /// Fatal errors abort the run; the rest are recorded per file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PathNotFound { .. }
                | Self::NotADirectory { .. }
                | Self::DestinationNotWritable { .. }
                | Self::FilesystemCapability { .. }
                | Self::Config(_)
        )
    }

    /// Path the error refers to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::PathNotFound { path }
            | Self::NotADirectory { path }
            | Self::DestinationNotWritable { path, .. }
            | Self::Permission { path, .. }
            | Self::FilesystemCapability { path, .. }
            | Self::CollisionResolutionExhausted { path, .. }
            | Self::Io { path, .. } => Some(path),
            Self::Config(_) => None,
        }
    }

    fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            Self::Permission {
                path: path.to_path_buf(),
                source,
            }
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Result type for reorganization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Everything a run needs.
pub struct RunOptions {
    pub source_root: PathBuf,
    pub dest_root: PathBuf,
    pub mode: ActionKind,
    pub dry_run: bool,
    /// Lowercase extensions without dots. `None` processes every file.
    pub extensions: Option<HashSet<String>>,
    /// Fall back to folder names when the filename is unsorted.
    pub classify_by_folders: bool,
    /// Insert tempo/key tags into destination names.
    pub tag_names: bool,
    /// Highest `_N` suffix tried per file.
    pub max_collision_suffix: usize,
    pub rules: RuleTable,
    pub filters: CompiledFilters,
}

impl RunOptions {
    /// Creates options with the built-in rules, default filters and no
    /// extension filter.
    pub fn new(
        source_root: impl Into<PathBuf>,
        dest_root: impl Into<PathBuf>,
        mode: ActionKind,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            dest_root: dest_root.into(),
            mode,
            dry_run: false,
            extensions: None,
            classify_by_folders: false,
            tag_names: false,
            max_collision_suffix: MAX_COLLISION_SUFFIX,
            rules: RuleTable::new(),
            filters: CompiledFilters::default(),
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Restricts the run to the given extensions (case-insensitive, dot optional).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = Some(
            extensions
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        );
        self
    }
}

/// Progress notifications emitted while a run executes.
#[derive(Debug)]
pub enum RunEvent<'a> {
    /// Traversal finished; `total` files passed the filters.
    Started { total: usize },
    /// A file was planned (dry run) or materialized (live).
    Placed(&'a PlannedAction),
    /// A file failed and was recorded in the report.
    Failed(&'a OrganizeError),
}

/// Classifies and materializes samples for a single run.
pub struct SampleOrganizer<'a> {
    options: &'a RunOptions,
    source_root: PathBuf,
    dest_root: PathBuf,
    claimed: HashSet<PathBuf>,
}

impl<'a> SampleOrganizer<'a> {
    /// Validates the roots and, in live mode, creates the destination root.
    ///
    /// # Errors
    ///
    /// Returns `PathNotFound` or `NotADirectory` for a bad source root and
    /// `DestinationNotWritable` when the destination cannot be prepared.
    pub fn new(options: &'a RunOptions) -> OrganizeResult<Self> {
        let source_root = fs::canonicalize(&options.source_root).map_err(|_| {
            OrganizeError::PathNotFound {
                path: options.source_root.clone(),
            }
        })?;
        if !source_root.is_dir() {
            return Err(OrganizeError::NotADirectory { path: source_root });
        }

        let not_writable = |source: io::Error| OrganizeError::DestinationNotWritable {
            path: options.dest_root.clone(),
            source,
        };

        if !options.dry_run {
            fs::create_dir_all(&options.dest_root).map_err(not_writable)?;
            check_writable(&options.dest_root).map_err(not_writable)?;
        }

        let dest_root = resolve_root(&options.dest_root).map_err(not_writable)?;

        Ok(Self {
            options,
            source_root,
            dest_root,
            claimed: HashSet::new(),
        })
    }

    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    /// Enumerates regular files under the source root in lexicographic order.
    ///
    /// Filtered files are counted in the report. Unreadable entries are
    /// recorded as failures and traversal continues. When the destination
    /// lies inside the source, it is not descended into.
    pub fn source_files(&self, report: &mut RunReport) -> Vec<SourceFile> {
        let prune_dest =
            self.dest_root != self.source_root && self.dest_root.starts_with(&self.source_root);
        let walker = WalkDir::new(&self.source_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !(prune_dest && entry.path().starts_with(&self.dest_root)));

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.source_root.clone());
                    let reason = match e.into_io_error() {
                        Some(io_error) => OrganizeError::from_io(&path, io_error).to_string(),
                        None => "filesystem loop detected".to_string(),
                    };
                    report.record_failure(path, reason);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let file = SourceFile::new(entry.into_path(), &self.source_root);
            if self.accepts(&file) {
                files.push(file);
            } else {
                report.record_filtered();
            }
        }
        files
    }

    fn accepts(&self, file: &SourceFile) -> bool {
        if let Some(ref allowed) = self.options.extensions {
            match file.extension {
                Some(ref ext) if allowed.contains(ext) => {}
                _ => return false,
            }
        }
        self.options.filters.should_include(&file.relative_path)
    }

    /// Classifies a file with the configured rule table.
    pub fn classify(&self, file: &SourceFile) -> Category {
        if self.options.classify_by_folders {
            self.options.rules.classify_path(&file.relative_path)
        } else {
            self.options.rules.classify(&file.file_name)
        }
    }

    /// Computes the destination for a classified file and claims it.
    ///
    /// Candidates are `name.ext`, `name_1.ext`, `name_2.ext`, ... A candidate
    /// is taken when it exists on disk or was claimed earlier in this run.
    /// An existing candidate that already holds this source ends the search
    /// with `Placement::AlreadyPresent`.
    pub fn plan(&mut self, file: &SourceFile, category: Category) -> OrganizeResult<PlannedAction> {
        let file_name = if self.options.tag_names {
            tagged_file_name(&file.file_name)
        } else {
            file.file_name.clone()
        };
        let dest_dir = self.dest_root.join(category.relative_path());
        let (destination, placement) = self.resolve_destination(file, &dest_dir, &file_name)?;

        self.claimed.insert(destination.clone());

        Ok(PlannedAction {
            source: file.path.clone(),
            category,
            kind: self.options.mode,
            destination,
            placement,
        })
    }

    fn resolve_destination(
        &self,
        file: &SourceFile,
        dest_dir: &Path,
        file_name: &str,
    ) -> OrganizeResult<(PathBuf, Placement)> {
        let (stem, ext) = split_extension(file_name);

        let max_suffix = self.options.max_collision_suffix;
        for suffix in 0..=max_suffix {
            let candidate = if suffix == 0 {
                dest_dir.join(file_name)
            } else {
                dest_dir.join(format!("{}_{}{}", stem, suffix, ext))
            };

            if self.claimed.contains(&candidate) {
                continue;
            }
            if candidate == file.path {
                return Ok((candidate, Placement::AlreadyPresent));
            }

            match fs::symlink_metadata(&candidate) {
                Ok(metadata) => {
                    if self.holds_source(&candidate, &metadata, file)? {
                        return Ok((candidate, Placement::AlreadyPresent));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    let placement = if suffix == 0 {
                        Placement::New
                    } else {
                        Placement::Renamed { suffix }
                    };
                    return Ok((candidate, placement));
                }
                Err(e) => return Err(OrganizeError::from_io(&candidate, e)),
            }
        }

        Err(OrganizeError::CollisionResolutionExhausted {
            path: dest_dir.join(file_name),
            attempts: max_suffix + 1,
        })
    }

    /// Whether an existing destination entry is this source from an earlier run.
    fn holds_source(
        &self,
        candidate: &Path,
        metadata: &fs::Metadata,
        file: &SourceFile,
    ) -> OrganizeResult<bool> {
        match self.options.mode {
            ActionKind::Symlink => {
                if !metadata.file_type().is_symlink() {
                    return Ok(false);
                }
                Ok(match fs::canonicalize(candidate) {
                    Ok(target) => target == file.path,
                    Err(_) => false,
                })
            }
            ActionKind::Copy => {
                if !metadata.is_file() {
                    return Ok(false);
                }
                let source_len = fs::metadata(&file.path)
                    .map_err(|e| OrganizeError::from_io(&file.path, e))?
                    .len();
                if metadata.len() != source_len {
                    return Ok(false);
                }
                let existing =
                    file_digest(candidate).map_err(|e| OrganizeError::from_io(candidate, e))?;
                let original =
                    file_digest(&file.path).map_err(|e| OrganizeError::from_io(&file.path, e))?;
                Ok(existing == original)
            }
            ActionKind::Move => Ok(false),
        }
    }

    /// Performs a planned action on disk.
    ///
    /// Creates the category directory first. Does nothing for files that are
    /// already present.
    pub fn materialize(&self, action: &PlannedAction) -> OrganizeResult<()> {
        if action.placement == Placement::AlreadyPresent {
            return Ok(());
        }
        if let Some(parent) = action.destination.parent() {
            fs::create_dir_all(parent).map_err(|e| OrganizeError::from_io(parent, e))?;
        }

        match action.kind {
            ActionKind::Move => move_file(&action.source, &action.destination),
            ActionKind::Copy => copy_file(&action.source, &action.destination),
            ActionKind::Symlink => symlink_file(&action.source, &action.destination),
        }
    }
}

/// Creates and removes a file in `dir`.
///
/// Mode bits alone do not say whether this user may write there.
fn check_writable(dir: &Path) -> io::Result<()> {
    let path = dir.join(WRITE_CHECK_FILE);
    File::create(&path)?;
    fs::remove_file(&path)
}

/// Canonicalizes a root that may not exist yet (dry run) through its parent.
fn resolve_root(path: &Path) -> io::Result<PathBuf> {
    if let Ok(canonical) = fs::canonicalize(path) {
        return Ok(canonical);
    }
    let absolute = std::path::absolute(path)?;
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => match fs::canonicalize(parent) {
            Ok(parent) => Ok(parent.join(name)),
            Err(_) => Ok(absolute),
        },
        _ => Ok(absolute),
    }
}

fn move_file(source: &Path, destination: &Path) -> OrganizeResult<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_file(source, destination)?;
            fs::remove_file(source).map_err(|e| OrganizeError::from_io(source, e))
        }
        Err(e) => Err(OrganizeError::from_io(source, e)),
    }
}

fn copy_file(source: &Path, destination: &Path) -> OrganizeResult<()> {
    fs::copy(source, destination)
        .map(|_| ())
        .map_err(|e| match fs::metadata(source) {
            Err(_) => OrganizeError::from_io(source, e),
            Ok(_) => OrganizeError::from_io(destination, e),
        })
}

fn symlink_file(source: &Path, destination: &Path) -> OrganizeResult<()> {
    create_symlink(source, destination).map_err(|e| {
        if is_capability_error(&e) {
            OrganizeError::FilesystemCapability {
                path: destination.to_path_buf(),
                source: e,
            }
        } else {
            OrganizeError::from_io(destination, e)
        }
    })
}

#[cfg(unix)]
fn create_symlink(source: &Path, destination: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, destination)
}

#[cfg(windows)]
fn create_symlink(source: &Path, destination: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(source, destination)
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_source: &Path, _destination: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}

/// symlink(2) reports EPERM when the filesystem has no symlink support.
#[cfg(unix)]
const SYMLINK_UNSUPPORTED_CODE: i32 = 1;

/// ERROR_PRIVILEGE_NOT_HELD
#[cfg(windows)]
const SYMLINK_UNSUPPORTED_CODE: i32 = 1314;

fn is_capability_error(error: &io::Error) -> bool {
    if error.kind() == io::ErrorKind::Unsupported {
        return true;
    }
    #[cfg(any(unix, windows))]
    if error.raw_os_error() == Some(SYMLINK_UNSUPPORTED_CODE) {
        return true;
    }
    false
}

fn file_digest(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_vec())
}

/// Runs a full pass and returns the report.
///
/// # Errors
///
/// Returns the first fatal error. Per-file failures are recorded in the
/// report instead.
///
/// # Examples
///
/// ```no_run
/// use samplesort::file_organizer::{ActionKind, RunOptions, run};
///
/// let options = RunOptions::new("/samples/packs", "/samples/by-type", ActionKind::Symlink)
///     .dry_run(true);
/// let report = run(&options).expect("run failed");
/// for action in &report.actions {
///     println!("{} -> {}", action.source.display(), action.destination.display());
/// }
/// ```
pub fn run(options: &RunOptions) -> OrganizeResult<RunReport> {
    let mut report = RunReport::new(options.mode, options.dry_run);
    run_into(options, &mut report, |_| {})?;
    Ok(report)
}

/// Runs a full pass, filling `report` as it goes.
///
/// The report keeps everything recorded up to a fatal error, so callers can
/// still print a summary after an abort.
pub fn run_into<F>(options: &RunOptions, report: &mut RunReport, mut on_event: F) -> OrganizeResult<()>
where
    F: FnMut(RunEvent<'_>),
{
    let mut organizer = SampleOrganizer::new(options)?;
    let files = organizer.source_files(report);
    on_event(RunEvent::Started { total: files.len() });

    process_files(&mut organizer, &files, report, &mut on_event, |organizer, action| {
        organizer.materialize(action)
    })
}

/// Plans and materializes `files` in order, stopping at the first fatal error.
fn process_files<F, M>(
    organizer: &mut SampleOrganizer<'_>,
    files: &[SourceFile],
    report: &mut RunReport,
    on_event: &mut F,
    mut materialize: M,
) -> OrganizeResult<()>
where
    F: FnMut(RunEvent<'_>),
    M: FnMut(&SampleOrganizer<'_>, &PlannedAction) -> OrganizeResult<()>,
{
    let dry_run = organizer.options.dry_run;
    for file in files {
        let category = organizer.classify(file);
        report.record_classified(category.as_str());

        let result = organizer.plan(file, category).and_then(|action| {
            if !dry_run {
                materialize(organizer, &action)?;
            }
            Ok(action)
        });

        match result {
            Ok(action) => {
                on_event(RunEvent::Placed(&action));
                report.record_action(action);
            }
            Err(error) => {
                on_event(RunEvent::Failed(&error));
                let path = error.path().unwrap_or(file.path.as_path()).to_path_buf();
                report.record_failure(path, error.to_string());
                if error.is_fatal() {
                    return Err(error);
                }
            }
        }
    }

    Ok(())
}
