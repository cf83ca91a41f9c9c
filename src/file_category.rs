/// Sample categorization by filename keywords.
///
/// This module maps sample filenames to a fixed, hierarchical taxonomy
/// (e.g. "Drums/Kicks", "Synth/Pads", "Vocals") using an ordered rule table.
/// Rules are tried in priority order and the first match wins.
///
/// # Examples
///
/// ```
/// use samplesort::file_category::classify;
///
/// assert_eq!(classify("909_Kick_Short.wav").as_str(), "Drums/Kicks");
/// assert_eq!(classify("Vocal_Chop_A.wav").as_str(), "Vocals");
/// assert_eq!(classify("mystery.wav").as_str(), "Unsorted");
/// ```
use crate::sample_tags::split_extension;
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// A node in the category taxonomy, stored as a slash-delimited label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category(Cow<'static, str>);

impl Category {
    /// Fallback for files no rule matches.
    pub const UNSORTED: Category = Category(Cow::Borrowed("Unsorted"));

    /// Wraps a label from the built-in table.
    pub const fn from_static(label: &'static str) -> Self {
        Category(Cow::Borrowed(label))
    }

    /// Parses a user supplied label such as `"Drums/Claps"`.
    ///
    /// Whitespace around each segment is dropped. Returns `None` when the
    /// label has empty segments, `.` or `..` segments, or would escape the
    /// destination root.
    ///
    /// # Examples
    ///
    /// ```
    /// use samplesort::file_category::Category;
    ///
    /// assert!(Category::parse("Drums/Claps").is_some());
    /// assert!(Category::parse("../Claps").is_none());
    /// assert!(Category::parse("Drums//Claps").is_none());
    /// ```
    pub fn parse(label: &str) -> Option<Self> {
        let trimmed = label.trim().trim_matches('/');
        if trimmed.is_empty() {
            return None;
        }
        let segments: Vec<&str> = trimmed.split('/').map(str::trim).collect();
        let valid = segments.iter().all(|segment| {
            !segment.is_empty()
                && *segment != "."
                && *segment != ".."
                && !segment.contains('\\')
                && !segment.contains(':')
        });
        valid.then(|| Category(Cow::Owned(segments.join("/"))))
    }

    /// Returns the label exactly as written, e.g. `"Drums/Kicks"`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the individual path segments of the label.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Returns the label as a relative path using platform separators.
    pub fn relative_path(&self) -> PathBuf {
        self.segments().collect()
    }

    pub fn is_unsorted(&self) -> bool {
        *self == Self::UNSORTED
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Static definition of a built-in rule.
#[derive(Debug, Clone)]
pub struct BuiltinRule {
    pub category: &'static str,
    /// Any one of these must occur in the name.
    pub keywords: &'static [&'static str],
    /// If non-empty, any one of these must also occur.
    pub qualifiers: &'static [&'static str],
}

const fn rule(category: &'static str, keywords: &'static [&'static str]) -> BuiltinRule {
    BuiltinRule {
        category,
        keywords,
        qualifiers: &[],
    }
}

/// Audio formats handled by `--audio-only`.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "aif", "aiff", "flac", "mp3", "ogg", "m4a"];

/// Project and preset formats added by `--include-non-audio`.
pub const NON_AUDIO_EXTENSIONS: &[&str] = &["mid", "midi", "als", "adg", "fxp", "nki"];

/// Sidecar and document files that ship inside sample packs.
const SIDECAR_EXTENSIONS: &[&str] = &[
    "asd", "reapeaks", "txt", "pdf", "nfo", "rtf", "zip", "rx2", "rex", "sfz", "nkm", "fxb",
];

/// Returns the part of a filename the rules see.
///
/// Only extensions of known file types are dropped, so `"Tight.Kick"` is
/// matched as a whole while `"untitled.fxp"` is matched as `"untitled"`.
fn match_text(filename: &str) -> &str {
    let (stem, ext) = split_extension(filename);
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    let known = [AUDIO_EXTENSIONS, NON_AUDIO_EXTENSIONS, SIDECAR_EXTENSIONS]
        .iter()
        .any(|list| list.contains(&ext.as_str()));
    if known { stem } else { filename }
}

/// Built-in rules in priority order. First match wins.
pub const BUILTIN_RULES: &[BuiltinRule] = &[
    // Drum one shots
    rule("Drums/Kicks", &["kick", "kck", "bd", "subkick"]),
    rule("Drums/Snares", &["snare", "snr", "rimshot", "rim"]),
    rule("Drums/Claps", &["clap"]),
    rule("Drums/Hats", &["hi hat", "hihat", "hat", "hh"]),
    rule("Drums/Toms", &["tom"]),
    rule(
        "Drums/Cymbals",
        &["ride", "crash", "splash", "china", "cymbal"],
    ),
    rule(
        "Drums/Percussion",
        &[
            "shaker",
            "tamb",
            "tambourine",
            "bongo",
            "conga",
            "timbale",
            "cowbell",
            "clave",
            "guiro",
            "agogo",
            "block",
        ],
    ),
    // Drum loops and breaks
    rule(
        "Loops/Drums/Breaks",
        &["break", "breakbeat", "amen", "funky drummer"],
    ),
    rule("Loops/Drums/Tops", &["top loop", "tops"]),
    BuiltinRule {
        category: "Loops/Drums",
        keywords: &["loop"],
        qualifiers: &["drum", "beat", "perc", "groove"],
    },
    // Bass
    rule("Bass/808", &["808"]),
    rule("Bass", &["bass", "sub"]),
    // Synths and keys
    rule("Synth/Pads", &["pad"]),
    rule("Synth/Leads", &["lead"]),
    rule("Synth/Plucks", &["pluck"]),
    rule("Synth/Arps", &["arpeggio", "arp"]),
    rule("Synth", &["synth"]),
    rule(
        "Keys",
        &["piano", "keys", "rhodes", "wurlitzer", "organ", "epiano"],
    ),
    // Guitars and strings
    rule("Guitar", &["guitar", "gtr"]),
    rule(
        "Strings",
        &["violin", "viola", "cello", "strings", "pizzicato"],
    ),
    // Brass and winds
    rule(
        "Brass",
        &["sax", "saxophone", "trumpet", "trombone", "horn", "brass"],
    ),
    rule(
        "Winds",
        &["flute", "clarinet", "oboe", "bassoon", "woodwind"],
    ),
    rule(
        "Vocals",
        &["vocal", "vox", "choir", "chant", "adlib", "ad lib"],
    ),
    rule(
        "FX",
        &[
            "fx",
            "sfx",
            "sweep",
            "riser",
            "rise",
            "downlifter",
            "downer",
            "impact",
            "boom",
            "whoosh",
            "glitch",
            "stutter",
        ],
    ),
    rule(
        "Textures Foley",
        &[
            "noise", "texture", "atmo", "ambience", "ambient", "drone", "foley", "field",
        ],
    ),
    // Generic loops and one shots if nothing else matched
    rule("Loops/Misc", &["loop"]),
    rule("One Shots/Misc", &["one shot", "oneshot", "shot"]),
];

/// Lowercases a name and turns `_`, `-` and `.` into spaces.
///
/// Used on both filenames and keywords, so "hi-hat" in the table matches
/// "Hi_Hat" on disk.
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '_' | '-' | '.' => ' ',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
}

/// A compiled rule: normalized keywords and qualifiers mapped to a category.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    category: Category,
    keywords: Vec<String>,
    qualifiers: Vec<String>,
}

impl CategoryRule {
    /// Creates a rule, normalizing every keyword and dropping blank ones.
    pub fn new<K, Q>(category: Category, keywords: K, qualifiers: Q) -> Self
    where
        K: IntoIterator,
        K::Item: AsRef<str>,
        Q: IntoIterator,
        Q::Item: AsRef<str>,
    {
        let prepare = |words: Vec<String>| -> Vec<String> {
            words
                .into_iter()
                .map(|w| normalize(&w))
                .filter(|w| !w.trim().is_empty())
                .collect()
        };
        Self {
            category,
            keywords: prepare(keywords.into_iter().map(|k| k.as_ref().to_string()).collect()),
            qualifiers: prepare(
                qualifiers
                    .into_iter()
                    .map(|q| q.as_ref().to_string())
                    .collect(),
            ),
        }
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    /// Checks the rule against already normalized text.
    pub fn matches(&self, normalized: &str) -> bool {
        let hit = |words: &[String]| words.iter().any(|w| normalized.contains(w.as_str()));
        hit(&self.keywords) && (self.qualifiers.is_empty() || hit(&self.qualifiers))
    }
}

impl From<&BuiltinRule> for CategoryRule {
    fn from(rule: &BuiltinRule) -> Self {
        CategoryRule::new(
            Category::from_static(rule.category),
            rule.keywords.iter().copied(),
            rule.qualifiers.iter().copied(),
        )
    }
}

/// Ordered, first-match-wins rule table.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<CategoryRule>,
}

static BUILTIN_TABLE: LazyLock<RuleTable> = LazyLock::new(RuleTable::new);

impl RuleTable {
    /// Creates a table holding only the built-in rules.
    pub fn new() -> Self {
        Self {
            rules: BUILTIN_RULES.iter().map(CategoryRule::from).collect(),
        }
    }

    /// Shared instance of the built-in table.
    pub fn builtin() -> &'static RuleTable {
        &BUILTIN_TABLE
    }

    /// Returns a table where `custom` rules are tried before the built-ins.
    pub fn with_custom_rules(custom: Vec<CategoryRule>) -> Self {
        let mut table = Self::new();
        if !custom.is_empty() {
            let mut rules = custom;
            rules.append(&mut table.rules);
            table.rules = rules;
        }
        table
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Classifies a filename. Always returns a category.
    ///
    /// # Examples
    ///
    /// ```
    /// use samplesort::file_category::RuleTable;
    ///
    /// let table = RuleTable::new();
    /// assert_eq!(table.classify("Kick_Loop_120.wav").as_str(), "Drums/Kicks");
    /// assert_eq!(table.classify("Drum_Loop_120.wav").as_str(), "Loops/Drums");
    /// assert_eq!(table.classify("").as_str(), "Unsorted");
    /// ```
    pub fn classify(&self, filename: &str) -> Category {
        self.classify_text(&normalize(match_text(filename)))
            .unwrap_or(Category::UNSORTED)
    }

    /// Classifies a path relative to the source root.
    ///
    /// The filename is tried first. If it yields "Unsorted", the parent
    /// folder names are tried from nearest to farthest.
    pub fn classify_path(&self, relative: &Path) -> Category {
        let file_name = relative
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        let category = self.classify(&file_name);
        if !category.is_unsorted() {
            return category;
        }

        relative
            .parent()
            .into_iter()
            .flat_map(|p| p.components().rev())
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy()),
                _ => None,
            })
            .find_map(|folder| self.classify_text(&normalize(&folder)))
            .unwrap_or(Category::UNSORTED)
    }

    fn classify_text(&self, normalized: &str) -> Option<Category> {
        if normalized.trim().is_empty() {
            return None;
        }
        self.rules
            .iter()
            .find(|rule| rule.matches(normalized))
            .map(|rule| rule.category.clone())
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Classifies a filename against the built-in table.
pub fn classify(filename: &str) -> Category {
    RuleTable::builtin().classify(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kick_variants() {
        assert_eq!(classify("Kick.wav").as_str(), "Drums/Kicks");
        assert_eq!(classify("KCK_hard.aif").as_str(), "Drums/Kicks");
        assert_eq!(classify("BD_01.wav").as_str(), "Drums/Kicks");
        assert_eq!(classify("deep_SUBKICK.flac").as_str(), "Drums/Kicks");
    }

    #[test]
    fn test_example_scenario() {
        assert_eq!(classify("909_Kick_Short.wav").as_str(), "Drums/Kicks");
        assert_eq!(classify("Clap_Tight.wav").as_str(), "Drums/Claps");
        assert_eq!(classify("Vocal_Chop_A.wav").as_str(), "Vocals");
        assert_eq!(classify("Riser_Long.wav").as_str(), "FX");
    }

    #[test]
    fn test_first_match_wins() {
        // Kicks are listed before any loop rule
        assert_eq!(classify("kick_loop.wav").as_str(), "Drums/Kicks");
        // 808 comes before the generic bass rule
        assert_eq!(classify("808_bass.wav").as_str(), "Bass/808");
    }

    #[test]
    fn test_loop_needs_drum_term() {
        assert_eq!(classify("Drum_Loop_01.wav").as_str(), "Loops/Drums");
        assert_eq!(classify("Perc Loop 90bpm.wav").as_str(), "Loops/Drums");
        assert_eq!(classify("Guitar_Loop.wav").as_str(), "Guitar");
        assert_eq!(classify("Melodic_Loop.wav").as_str(), "Loops/Misc");
    }

    #[test]
    fn test_separators_are_normalized() {
        assert_eq!(classify("Hi-Hat_Open.wav").as_str(), "Drums/Hats");
        assert_eq!(classify("Top_Loop_02.wav").as_str(), "Loops/Drums/Tops");
        assert_eq!(classify("AD-LIB_yeah.wav").as_str(), "Vocals");
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("SNARE.WAV").as_str(), "Drums/Snares");
        assert_eq!(classify("sNr_2.wav").as_str(), "Drums/Snares");
        assert_eq!(classify("VOX.wav").as_str(), "Vocals");
    }

    #[test]
    fn test_unsorted_edge_cases() {
        assert_eq!(classify(""), Category::UNSORTED);
        assert_eq!(classify(".wav"), Category::UNSORTED);
        assert_eq!(classify("   "), Category::UNSORTED);
        assert_eq!(classify("untitled.wav"), Category::UNSORTED);
    }

    #[test]
    fn test_extension_is_not_matched() {
        // "fx" only appears in the extension
        assert_eq!(classify("untitled.fxp"), Category::UNSORTED);
        assert_eq!(classify("untitled.FXB"), Category::UNSORTED);
        assert_eq!(classify("Kick_01.wav.asd").as_str(), "Drums/Kicks");
    }

    #[test]
    fn test_unknown_suffix_is_part_of_name() {
        assert_eq!(classify("Tight.Kick").as_str(), "Drums/Kicks");
        assert_eq!(classify("808.kick").as_str(), "Drums/Kicks");
        assert_eq!(classify("Loop.KICK").as_str(), "Drums/Kicks");
        assert_eq!(classify("Warm.Pad.wav").as_str(), "Synth/Pads");
    }

    #[test]
    fn test_multiple_hits_single_match() {
        let table = RuleTable::new();
        let kicks = table
            .rules()
            .iter()
            .find(|r| r.category().as_str() == "Drums/Kicks")
            .unwrap();
        assert!(kicks.matches(&normalize("kick kck bd")));
        assert_eq!(classify("kick_kck_bd.wav").as_str(), "Drums/Kicks");
    }

    #[test]
    fn test_classify_is_total() {
        for name in ["\u{0}", "日本語.wav", "....", "a.b.c.d", "\\", "/"] {
            let _ = classify(name);
        }
    }

    #[test]
    fn test_custom_rules_take_priority() {
        let custom = CategoryRule::new(
            Category::parse("Drums/909").unwrap(),
            ["909"],
            Vec::<String>::new(),
        );
        let table = RuleTable::with_custom_rules(vec![custom]);
        assert_eq!(table.classify("909_Kick_Short.wav").as_str(), "Drums/909");
        assert_eq!(table.classify("808_Kick.wav").as_str(), "Drums/Kicks");
    }

    #[test]
    fn test_classify_path_falls_back_to_folders() {
        let table = RuleTable::new();
        assert_eq!(
            table
                .classify_path(Path::new("Pack/Vocals/take_01.wav"))
                .as_str(),
            "Vocals"
        );
        // Nearest folder wins
        assert_eq!(
            table
                .classify_path(Path::new("Bass Pack/Pads/one.wav"))
                .as_str(),
            "Synth/Pads"
        );
        // Filename takes precedence over folders
        assert_eq!(
            table
                .classify_path(Path::new("Vocals/Kick_01.wav"))
                .as_str(),
            "Drums/Kicks"
        );
        assert_eq!(
            table.classify_path(Path::new("Misc/untitled.wav")),
            Category::UNSORTED
        );
    }

    #[test]
    fn test_category_paths() {
        let category = Category::from_static("Drums/Kicks");
        assert_eq!(category.segments().collect::<Vec<_>>(), vec!["Drums", "Kicks"]);
        assert_eq!(category.relative_path(), Path::new("Drums").join("Kicks"));
        assert_eq!(category.to_string(), "Drums/Kicks");
    }

    #[test]
    fn test_category_parse_rejects_escapes() {
        assert!(Category::parse("").is_none());
        assert!(Category::parse("/").is_none());
        assert!(Category::parse("Drums/../etc").is_none());
        assert!(Category::parse("C:/Drums").is_none());
        assert_eq!(
            Category::parse("/Drums/Claps/").unwrap().as_str(),
            "Drums/Claps"
        );
    }

    #[test]
    fn test_category_parse_trims_segments() {
        let category = Category::parse(" Drums / Hand Claps ").unwrap();
        assert_eq!(category.as_str(), "Drums/Hand Claps");
        assert_eq!(category.relative_path(), Path::new("Drums").join("Hand Claps"));
        assert!(Category::parse("Drums/ .. /etc").is_none());
        assert!(Category::parse("Drums/   /Claps").is_none());
    }
}
