//! Configuration for file filtering, custom rules and naming.
//!
//! This module loads optional settings from a TOML file. It supports:
//! - Skipping files by exact name, glob pattern, extension or regex
//! - Include (whitelist) patterns that override the exclude rules
//! - Extra classification rules tried before the built-in table
//! - Tempo/key tagging of destination names
//!
//! # Configuration File Format
//!
//! ```toml
//! extensions = ["wav", "aif", "flac"]
//! classify_by_folders = false
//!
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["**/__MACOSX/**"]
//! extensions = ["asd", "reapeaks"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//!
//! [[rules]]
//! category = "Drums/909"
//! keywords = ["909"]
//!
//! [naming]
//! tag_bpm_key = false
//! ```

use crate::file_category::{Category, CategoryRule, RuleTable};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration loading and compilation.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// A custom rule names a category that cannot be used as a folder path.
    #[error("Invalid category '{0}': expected segments like \"Drums/Claps\"")]
    InvalidCategory(String),
    /// A custom rule has no keywords.
    #[error("Rule for category '{0}' has no keywords")]
    EmptyRule(String),
    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SortConfig {
    /// Default extension filter, used when none is given on the command line.
    #[serde(default)]
    pub extensions: Option<Vec<String>>,

    /// Fall back to folder names when the filename alone is unsorted.
    #[serde(default)]
    pub classify_by_folders: bool,

    #[serde(default)]
    pub filters: FilterRules,

    /// Extra rules tried before the built-in table, in order.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    #[serde(default)]
    pub naming: NamingConfig,
}

/// File filter rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to include hidden files (starting with "."). Defaults to false.
    #[serde(default)]
    pub enable_hidden_files: bool,

    /// Rules for excluding files.
    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    #[serde(default)]
    pub include: IncludeRules,
}

/// Rules for excluding files from reorganization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., ".DS_Store", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns matched against the path relative to the source root.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude (e.g., "asd", "reapeaks").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns matched against the filename.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    /// Glob patterns that override exclude rules.
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// A user rule mapping keywords to a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub category: String,
    pub keywords: Vec<String>,
    /// If set, one of these must also appear in the name.
    #[serde(default)]
    pub qualifiers: Vec<String>,
}

/// Destination naming options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Append detected tempo and key, e.g. `"Loop [120bpm Am].wav"`.
    #[serde(default)]
    pub tag_bpm_key: bool,
}

impl SortConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.samplesortrc.toml` in the current directory
    /// 3. Look for `~/.config/samplesort/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".samplesortrc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("samplesort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if file does not exist.
    /// Returns `ConfigError::ConfigInvalid` if TOML parsing fails.
    /// Returns `ConfigError::IoError` if file cannot be read.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Compile the filter section into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }

    /// Build the rule table: custom rules first, then the built-ins.
    ///
    /// # Errors
    ///
    /// Returns an error if a rule names an unusable category or has no keywords.
    pub fn rule_table(&self) -> Result<RuleTable, ConfigError> {
        let custom = self
            .rules
            .iter()
            .map(|rule| {
                let category = Category::parse(&rule.category)
                    .ok_or_else(|| ConfigError::InvalidCategory(rule.category.clone()))?;
                if rule.keywords.iter().all(|k| k.trim().is_empty()) {
                    return Err(ConfigError::EmptyRule(rule.category.clone()));
                }
                Ok(CategoryRule::new(category, &rule.keywords, &rule.qualifiers))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RuleTable::with_custom_rules(custom))
    }
}

/// Normalizes an extension for comparison: lowercase, no leading dot.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Pre-compiled filter rules.
#[derive(Default)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let compile_globs = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| {
                    Pattern::new(pattern)
                        .map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Check if a file should be processed.
    ///
    /// `relative_path` is the path below the source root. Checks run in order:
    /// include patterns, hidden files and folders, exact names, extensions, globs, regex.
    pub fn should_include(&self, relative_path: &Path) -> bool {
        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return true;
        }

        if !self.enable_hidden_files && is_hidden(relative_path) {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = relative_path.extension()
            && self
                .exclude_extensions
                .contains(&normalize_extension(&ext.to_string_lossy()))
        {
            return false;
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }
}

/// Whether the file or any folder above it starts with a dot.
fn is_hidden(relative_path: &Path) -> bool {
    relative_path.components().any(|component| match component {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(toml: &str) -> CompiledFilters {
        SortConfig::from_toml(toml)
            .unwrap()
            .compile_filters()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = SortConfig::default();
        assert!(!config.filters.enable_hidden_files);
        assert!(config.extensions.is_none());
        assert!(config.rules.is_empty());
        assert!(!config.naming.tag_bpm_key);
        assert!(!config.classify_by_folders);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = SortConfig::from_toml("").unwrap();
        assert!(config.rules.is_empty());
        assert!(config.compile_filters().is_ok());
    }

    #[test]
    fn test_hidden_file_excluded_by_default() {
        let compiled = CompiledFilters::default();
        assert!(!compiled.should_include(Path::new(".DS_Store")));
        assert!(!compiled.should_include(Path::new("Pack/._kick.wav")));
        assert!(compiled.should_include(Path::new("Pack/kick.wav")));
    }

    #[test]
    fn test_files_in_hidden_folders_excluded_by_default() {
        let compiled = CompiledFilters::default();
        assert!(!compiled.should_include(Path::new("Pack/.cache/kick.wav")));
        assert!(!compiled.should_include(Path::new(".git/objects/ab")));
        assert!(compiled.should_include(Path::new("Pack.v2/kick.wav")));

        let enabled = filters("[filters]\nenable_hidden_files = true\n");
        assert!(enabled.should_include(Path::new("Pack/.cache/kick.wav")));
    }

    #[test]
    fn test_hidden_file_included_when_enabled() {
        let compiled = filters("[filters]\nenable_hidden_files = true\n");
        assert!(compiled.should_include(Path::new(".hidden_kick.wav")));
    }

    #[test]
    fn test_exclude_filenames_and_extensions() {
        let compiled = filters(
            r#"
            [filters.exclude]
            filenames = ["Thumbs.db"]
            extensions = [".asd", "REAPEAKS"]
            "#,
        );
        assert!(!compiled.should_include(Path::new("Pack/Thumbs.db")));
        assert!(!compiled.should_include(Path::new("kick.wav.asd")));
        assert!(!compiled.should_include(Path::new("kick.reapeaks")));
        assert!(compiled.should_include(Path::new("kick.wav")));
    }

    #[test]
    fn test_exclude_glob_patterns() {
        let compiled = filters(
            r#"
            [filters.exclude]
            patterns = ["**/__MACOSX/**", "Presets/**"]
            "#,
        );
        assert!(!compiled.should_include(Path::new("Pack/__MACOSX/kick.wav")));
        assert!(!compiled.should_include(Path::new("Presets/lead.fxp")));
        assert!(compiled.should_include(Path::new("Pack/Presets_Old/lead.wav")));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let compiled = filters(
            r#"
            [filters.exclude]
            extensions = ["mid"]

            [filters.include]
            patterns = ["**/keep_*.mid"]
            "#,
        );
        assert!(compiled.should_include(Path::new("Pack/keep_chords.mid")));
        assert!(!compiled.should_include(Path::new("Pack/chords.mid")));
    }

    #[test]
    fn test_exclude_regex() {
        let compiled = filters(
            r#"
            [filters.exclude]
            regex = ['^preview_.*\.mp3$']
            "#,
        );
        assert!(!compiled.should_include(Path::new("Pack/preview_pack.mp3")));
        assert!(compiled.should_include(Path::new("Pack/kick.mp3")));
    }

    #[test]
    fn test_invalid_patterns_return_errors() {
        let bad_regex = SortConfig::from_toml("[filters.exclude]\nregex = [\"[invalid(\"]\n")
            .unwrap()
            .compile_filters();
        assert!(matches!(
            bad_regex,
            Err(ConfigError::InvalidRegexPattern { .. })
        ));

        let bad_glob = SortConfig::from_toml("[filters.exclude]\npatterns = [\"[invalid\"]\n")
            .unwrap()
            .compile_filters();
        assert!(matches!(bad_glob, Err(ConfigError::InvalidGlobPattern(_))));
    }

    #[test]
    fn test_invalid_toml() {
        let result = SortConfig::from_toml("extensions = 3");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = SortConfig::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_custom_rules_build_table() {
        let config = SortConfig::from_toml(
            r#"
            [[rules]]
            category = "Drums/Claps/Snaps"
            keywords = ["snap", "finger"]

            [[rules]]
            category = "Loops/Melodic"
            keywords = ["loop"]
            qualifiers = ["melod", "chord"]
            "#,
        )
        .unwrap();
        let table = config.rule_table().unwrap();

        assert_eq!(table.classify("Finger_Snap.wav").as_str(), "Drums/Claps/Snaps");
        assert_eq!(table.classify("Chord_Loop_Am.wav").as_str(), "Loops/Melodic");
        assert_eq!(table.classify("Kick.wav").as_str(), "Drums/Kicks");
    }

    #[test]
    fn test_custom_rule_validation() {
        let bad_category = SortConfig::from_toml(
            "[[rules]]\ncategory = \"../escape\"\nkeywords = [\"x\"]\n",
        )
        .unwrap();
        assert!(matches!(
            bad_category.rule_table(),
            Err(ConfigError::InvalidCategory(_))
        ));

        let no_keywords =
            SortConfig::from_toml("[[rules]]\ncategory = \"Misc\"\nkeywords = [\" \"]\n").unwrap();
        assert!(matches!(
            no_keywords.rule_table(),
            Err(ConfigError::EmptyRule(_))
        ));
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(".WAV"), "wav");
        assert_eq!(normalize_extension(" aif "), "aif");
    }
}
