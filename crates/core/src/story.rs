//! Story parameters, duration tiers, and audience buckets.
//!
//! [`StoryParameters`] is the immutable input of one generation attempt.
//! It is persisted as JSONB on the job row and re-validated whenever a
//! caller supplies a fresh copy (create and retry).

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum length of the story theme.
pub const MAX_THEME_LEN: usize = 200;

/// Maximum number of named characters in one story.
pub const MAX_CHARACTERS: usize = 10;

/// Maximum length of a character name.
pub const MAX_CHARACTER_NAME_LEN: usize = 100;

/// Maximum length of a character description.
pub const MAX_CHARACTER_DESCRIPTION_LEN: usize = 500;

/// Maximum length of the free-text custom request.
pub const MAX_CUSTOM_PROMPT_LEN: usize = 2000;

/// Maximum length of a language tag such as `pt-BR`.
pub const MAX_LANGUAGE_TAG_LEN: usize = 5;

/// A primary language subtag with an optional two-letter region.
static LANGUAGE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{2,3}(?:[-_][A-Za-z]{2})?$").expect("valid regex"));

/// Voice ids end up as a URL path segment at the speech provider.
static VOICE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Duration tier
// ---------------------------------------------------------------------------

/// Coarse story length selector.
///
/// The minimum word count is a property of the tier alone; the audience
/// age never moves the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationTier {
    Short,
    Medium,
    Long,
}

impl DurationTier {
    /// Every tier, shortest first.
    pub const ALL: [DurationTier; 3] = [Self::Short, Self::Medium, Self::Long];

    /// Minimum number of words an accepted story must contain.
    pub fn min_words(self) -> usize {
        match self {
            Self::Short => 300,
            Self::Medium => 600,
            Self::Long => 900,
        }
    }

    /// Approximate read-aloud time at a slow bedtime pace (~100 wpm).
    pub fn read_aloud_minutes(self) -> usize {
        self.min_words() / 100
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }
}

impl std::fmt::Display for DurationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Age bucket
// ---------------------------------------------------------------------------

/// Audience category derived from the user-facing target-age range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeBucket {
    Toddler,
    Preschool,
    EarlyElementary,
    Elementary,
    Mixed,
}

impl AgeBucket {
    /// Map a target-age range such as `"5-7"` to its bucket.
    ///
    /// Surrounding whitespace and spaces around the dash are ignored, as is
    /// an en-dash in place of the hyphen. Anything unrecognised is `Mixed`.
    pub fn from_target_age(target_age: &str) -> Self {
        let normalized: String = target_age
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| if c == '\u{2013}' { '-' } else { c })
            .collect();

        match normalized.as_str() {
            "2-4" => Self::Toddler,
            "3-5" => Self::Preschool,
            "5-7" => Self::EarlyElementary,
            "6-10" => Self::Elementary,
            _ => Self::Mixed,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Toddler => "toddlers (ages 2-4)",
            Self::Preschool => "preschoolers (ages 3-5)",
            Self::EarlyElementary => "early readers (ages 5-7)",
            Self::Elementary => "school-age children (ages 6-10)",
            Self::Mixed => "a mixed-age family audience",
        }
    }

    /// Vocabulary and tone guidance baked into the story prompt.
    pub fn tone_guidance(self) -> &'static str {
        match self {
            Self::Toddler => {
                "Use very simple words and short sentences. Repeat gentle, \
                 comforting phrases. Keep the plot tiny and predictable, with \
                 sounds, colours and familiar objects. Nothing scary at all."
            }
            Self::Preschool => {
                "Use simple vocabulary and short sentences with a little \
                 rhythm. Include friendly animals or helpers, a small problem \
                 that is solved kindly, and a warm, sleepy ending."
            }
            Self::EarlyElementary => {
                "Use clear, vivid language with a few new words explained by \
                 context. Give the characters a small adventure with gentle \
                 suspense, teamwork, and a calm resolution."
            }
            Self::Elementary => {
                "Use richer vocabulary and varied sentence lengths. Build a \
                 fuller plot with curiosity, problem solving and a meaningful \
                 lesson, while keeping the tone soothing for bedtime."
            }
            Self::Mixed => {
                "Write for listeners of different ages: simple enough for the \
                 youngest, with small details older children will enjoy. Keep \
                 the mood cosy and the ending peaceful."
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// A named character supplied by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Character {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Structured story preferences for a single generation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryParameters {
    pub theme: String,
    #[serde(default)]
    pub characters: Vec<Character>,
    pub language: String,
    pub voice: String,
    pub duration_tier: DurationTier,
    pub target_age: String,
    #[serde(default)]
    pub custom_prompt: Option<String>,
}

impl StoryParameters {
    /// Audience bucket derived from `target_age`.
    pub fn age_bucket(&self) -> AgeBucket {
        AgeBucket::from_target_age(&self.target_age)
    }

    /// Name of the first character, if any.
    pub fn lead_character(&self) -> Option<&str> {
        self.characters.first().map(|c| c.name.as_str())
    }

    /// The custom request with surrounding whitespace removed, or `None`
    /// when it is absent or blank.
    pub fn custom_request(&self) -> Option<&str> {
        self.custom_prompt
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Validate user-supplied parameters.
    pub fn validate(&self) -> Result<(), CoreError> {
        let theme = self.theme.trim();
        if theme.is_empty() {
            return Err(CoreError::Validation("Theme must not be empty".into()));
        }
        if theme.chars().count() > MAX_THEME_LEN {
            return Err(CoreError::Validation(format!(
                "Theme must be at most {MAX_THEME_LEN} characters"
            )));
        }

        if self.characters.len() > MAX_CHARACTERS {
            return Err(CoreError::Validation(format!(
                "At most {MAX_CHARACTERS} characters are allowed"
            )));
        }
        for (i, character) in self.characters.iter().enumerate() {
            let name = character.name.trim();
            if name.is_empty() {
                return Err(CoreError::Validation(format!(
                    "Character {} must have a name",
                    i + 1
                )));
            }
            if name.chars().count() > MAX_CHARACTER_NAME_LEN {
                return Err(CoreError::Validation(format!(
                    "Character name '{name}' exceeds {MAX_CHARACTER_NAME_LEN} characters"
                )));
            }
            if character.description.chars().count() > MAX_CHARACTER_DESCRIPTION_LEN {
                return Err(CoreError::Validation(format!(
                    "Description of '{name}' exceeds {MAX_CHARACTER_DESCRIPTION_LEN} characters"
                )));
            }
        }

        let language = self.language.trim();
        if language.len() > MAX_LANGUAGE_TAG_LEN || !LANGUAGE_TAG.is_match(language) {
            return Err(CoreError::Validation(format!(
                "Invalid language code '{}'",
                self.language
            )));
        }

        if self.voice.trim().is_empty() {
            return Err(CoreError::Validation("Voice must not be empty".into()));
        }
        if !VOICE_ID.is_match(&self.voice) {
            return Err(CoreError::Validation(format!(
                "Invalid voice id '{}'",
                self.voice
            )));
        }

        if let Some(prompt) = &self.custom_prompt {
            if prompt.chars().count() > MAX_CUSTOM_PROMPT_LEN {
                return Err(CoreError::Validation(format!(
                    "Custom prompt must be at most {MAX_CUSTOM_PROMPT_LEN} characters"
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Word counting
// ---------------------------------------------------------------------------

/// Count words by splitting on runs of whitespace.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn params() -> StoryParameters {
        StoryParameters {
            theme: "adventure".into(),
            characters: vec![Character::new("Alex", "brave")],
            language: "en".into(),
            voice: "voice-1".into(),
            duration_tier: DurationTier::Short,
            target_age: "5-7".into(),
            custom_prompt: None,
        }
    }

    #[test]
    fn min_words_per_tier() {
        assert_eq!(DurationTier::Short.min_words(), 300);
        assert_eq!(DurationTier::Medium.min_words(), 600);
        assert_eq!(DurationTier::Long.min_words(), 900);
    }

    #[test]
    fn age_buckets_map_known_ranges() {
        assert_eq!(AgeBucket::from_target_age("2-4"), AgeBucket::Toddler);
        assert_eq!(AgeBucket::from_target_age("3-5"), AgeBucket::Preschool);
        assert_eq!(AgeBucket::from_target_age("5-7"), AgeBucket::EarlyElementary);
        assert_eq!(AgeBucket::from_target_age("6-10"), AgeBucket::Elementary);
        assert_eq!(AgeBucket::from_target_age("mixed"), AgeBucket::Mixed);
    }

    #[test]
    fn age_bucket_tolerates_spacing_and_en_dash() {
        assert_eq!(AgeBucket::from_target_age(" 6 - 10 "), AgeBucket::Elementary);
        assert_eq!(AgeBucket::from_target_age("2\u{2013}4"), AgeBucket::Toddler);
    }

    #[test]
    fn unknown_age_is_mixed() {
        assert_eq!(AgeBucket::from_target_age("11-13"), AgeBucket::Mixed);
        assert_eq!(AgeBucket::from_target_age(""), AgeBucket::Mixed);
    }

    #[test]
    fn word_count_splits_on_whitespace_runs() {
        assert_eq!(word_count("one  two\n\nthree\tfour"), 4);
        assert_eq!(word_count("   "), 0);
    }

    #[test]
    fn parameters_deserialize_from_camel_case() {
        let json = serde_json::json!({
            "theme": "space",
            "characters": [{"name": "Mia"}],
            "language": "en",
            "voice": "v",
            "durationTier": "long",
            "targetAge": "3-5",
            "customPrompt": "include a dragon"
        });
        let parsed: StoryParameters = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.duration_tier, DurationTier::Long);
        assert_eq!(parsed.characters[0].description, "");
        assert_eq!(parsed.custom_request(), Some("include a dragon"));
    }

    #[test]
    fn valid_parameters_pass() {
        assert!(params().validate().is_ok());
    }

    #[test]
    fn blank_theme_is_rejected() {
        let mut p = params();
        p.theme = "  ".into();
        assert_matches!(p.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn unnamed_character_is_rejected() {
        let mut p = params();
        p.characters.push(Character::new("", "quiet"));
        assert_matches!(p.validate(), Err(CoreError::Validation(msg)) if msg.contains("Character 2"));
    }

    #[test]
    fn bad_language_code_is_rejected() {
        let mut p = params();
        p.language = "english!".into();
        assert_matches!(p.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn regional_language_code_is_accepted() {
        let mut p = params();
        p.language = "pt-BR".into();
        assert!(p.validate().is_ok());
        p.language = " es_mx ".into();
        assert!(p.validate().is_ok());
    }

    #[test]
    fn language_tag_is_checked_as_a_whole() {
        for tag in ["en-!!!!", "en_anything_at_all_long", "en-", "e", "en-U$"] {
            let mut p = params();
            p.language = tag.into();
            assert_matches!(p.validate(), Err(CoreError::Validation(_)), "{tag}");
        }
    }

    #[test]
    fn voice_id_must_be_a_single_path_segment() {
        for voice in ["../x", "../../v1/user?x=", "a/b", "id with space", "x#frag"] {
            let mut p = params();
            p.voice = voice.into();
            assert_matches!(
                p.validate(),
                Err(CoreError::Validation(msg)) if msg.contains("voice id"),
                "{voice}"
            );
        }
        let mut p = params();
        p.voice = "a".repeat(65);
        assert_matches!(p.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn provider_style_voice_ids_are_accepted() {
        let mut p = params();
        p.voice = "21m00Tcm4TlvDq8ikWAM".into();
        assert!(p.validate().is_ok());
        p.voice = "narrator_soft-2".into();
        assert!(p.validate().is_ok());
    }

    #[test]
    fn blank_custom_prompt_is_ignored() {
        let mut p = params();
        p.custom_prompt = Some("   ".into());
        assert_eq!(p.custom_request(), None);
    }
}
