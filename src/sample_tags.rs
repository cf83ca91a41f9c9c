//! Tempo and key tags for destination filenames.
//!
//! Sample packs usually encode tempo ("120bpm") and musical key ("Am",
//! "F#_min") somewhere in the filename. When tagging is enabled, the
//! detected values are appended to the destination name so they survive
//! the move out of the pack folder:
//!
//! ```
//! use samplesort::sample_tags::tagged_file_name;
//!
//! assert_eq!(
//!     tagged_file_name("Bass_Loop_Am_120bpm.wav"),
//!     "Bass_Loop_Am_120bpm [120bpm Am].wav"
//! );
//! assert_eq!(tagged_file_name("kick.wav"), "kick.wav");
//! ```

use regex::Regex;
use std::sync::LazyLock;

static BPM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^0-9])(\d{2,3})\s?bpm").expect("valid bpm pattern")
});

static KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s_\-])([A-G][#b]?)(?:[\s_\-]?((?i:major|minor|maj|min|m)))?(?:$|[\s_\-])")
        .expect("valid key pattern")
});

/// Tempo and key detected in a filename.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleTags {
    pub bpm: Option<u16>,
    pub key: Option<String>,
}

impl SampleTags {
    /// Extracts tags from a file stem (the name without extension).
    pub fn detect(stem: &str) -> Self {
        let bpm = BPM_PATTERN
            .captures(stem)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok());

        let key = KEY_PATTERN.captures(stem).and_then(|caps| {
            let root = caps.get(1)?.as_str();
            let quality = caps.get(2).map(|m| m.as_str().to_lowercase());
            Some(match quality.as_deref() {
                Some("m" | "min" | "minor") => format!("{}m", root),
                _ => root.to_string(),
            })
        });

        Self { bpm, key }
    }

    pub fn is_empty(&self) -> bool {
        self.bpm.is_none() && self.key.is_none()
    }

    /// Renders the tags as `" [120bpm Am]"`, or an empty string.
    pub fn suffix(&self) -> String {
        let mut parts = Vec::new();
        if let Some(bpm) = self.bpm {
            parts.push(format!("{}bpm", bpm));
        }
        if let Some(ref key) = self.key {
            parts.push(key.clone());
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!(" [{}]", parts.join(" "))
        }
    }
}

/// Splits a filename into stem and extension (with the dot).
///
/// A leading dot does not start an extension, so ".wav" has no extension.
pub fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => file_name.split_at(idx),
        _ => (file_name, ""),
    }
}

/// Returns the filename with tempo and key tags inserted before the extension.
pub fn tagged_file_name(file_name: &str) -> String {
    let (stem, ext) = split_extension(file_name);
    let tags = SampleTags::detect(stem);
    format!("{}{}{}", stem, tags.suffix(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_bpm() {
        assert_eq!(SampleTags::detect("Loop_120bpm").bpm, Some(120));
        assert_eq!(SampleTags::detect("Loop 95 BPM").bpm, Some(95));
        assert_eq!(SampleTags::detect("Loop_1200bpm").bpm, None);
        assert_eq!(SampleTags::detect("Loop").bpm, None);
    }

    #[test]
    fn test_detect_key_qualities() {
        assert_eq!(SampleTags::detect("Pad_Am").key.as_deref(), Some("Am"));
        assert_eq!(SampleTags::detect("Pad_F#_min").key.as_deref(), Some("F#m"));
        assert_eq!(SampleTags::detect("Pad Eb Major").key.as_deref(), Some("Eb"));
        assert_eq!(SampleTags::detect("Pad_C").key.as_deref(), Some("C"));
        assert_eq!(SampleTags::detect("Pad_Cminor").key.as_deref(), Some("Cm"));
    }

    #[test]
    fn test_key_requires_separators() {
        // Capital letters inside words are not keys
        assert_eq!(SampleTags::detect("BigDrum").key, None);
        assert_eq!(SampleTags::detect("Clap").key, None);
    }

    #[test]
    fn test_suffix_format() {
        let tags = SampleTags {
            bpm: Some(128),
            key: Some("Gm".to_string()),
        };
        assert_eq!(tags.suffix(), " [128bpm Gm]");
        assert_eq!(SampleTags::default().suffix(), "");
        assert!(SampleTags::default().is_empty());
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("kick.wav"), ("kick", ".wav"));
        assert_eq!(split_extension("a.b.aif"), ("a.b", ".aif"));
        assert_eq!(split_extension(".wav"), (".wav", ""));
        assert_eq!(split_extension("kick"), ("kick", ""));
    }

    #[test]
    fn test_tagged_file_name() {
        assert_eq!(
            tagged_file_name("Keys_Loop_90bpm_C_maj.wav"),
            "Keys_Loop_90bpm_C_maj [90bpm C].wav"
        );
        assert_eq!(tagged_file_name("snare.wav"), "snare.wav");
    }
}
