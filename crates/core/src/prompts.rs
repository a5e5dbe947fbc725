//! Prompt construction for the vision, title, and story model calls, plus
//! clean-up of model replies.
//!
//! Everything here is pure string building so it can be tested without a
//! model behind it.

use std::sync::LazyLock;

use regex::Regex;

use crate::analysis::ImageAnalysis;
use crate::language::prompt_language;
use crate::story::StoryParameters;

/// Longest title accepted from a model, in characters.
pub const MAX_TITLE_LEN: usize = 80;

/// Instructions sent alongside each uploaded image.
pub const VISION_INSTRUCTIONS: &str = "You are helping write a children's bedtime story. \
Describe this image for a storyteller. Reply with a single JSON object with the keys \
\"description\" (two or three sentences), \"characters\" (array of people, animals or toys \
visible), \"setting\" (where it takes place), \"mood\" (one or two words) and \"objects\" \
(array of notable objects). Keep every detail child-friendly.";

/// A system/user prompt pair plus an output budget for the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

const STORYTELLER_SYSTEM: &str = "You are a gentle, imaginative bedtime storyteller. \
You write original, calming stories for children that are safe, kind and age-appropriate. \
You never include violence, frightening imagery, or brand names.";

// ---------------------------------------------------------------------------
// Shared sections
// ---------------------------------------------------------------------------

/// Summarize image analyses for inclusion in a prompt.
///
/// Placeholder analyses carry no information and are skipped. Returns
/// `None` when nothing useful remains.
pub fn image_context(analyses: &[ImageAnalysis]) -> Option<String> {
    let lines: Vec<String> = analyses
        .iter()
        .enumerate()
        .filter(|(_, a)| !a.placeholder)
        .map(|(i, a)| {
            let mut line = format!("Image {}: {}", i + 1, a.description);
            if !a.setting.is_empty() {
                line.push_str(&format!(" Setting: {}.", a.setting));
            }
            if !a.mood.is_empty() {
                line.push_str(&format!(" Mood: {}.", a.mood));
            }
            if !a.characters.is_empty() {
                line.push_str(&format!(" Characters: {}.", a.characters.join(", ")));
            }
            if !a.objects.is_empty() {
                line.push_str(&format!(" Objects: {}.", a.objects.join(", ")));
            }
            line
        })
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn character_roster(params: &StoryParameters) -> String {
    if params.characters.is_empty() {
        return "No specific characters were requested; invent a friendly main character."
            .to_string();
    }
    params
        .characters
        .iter()
        .map(|c| {
            let description = c.description.trim();
            if description.is_empty() {
                format!("- {}", c.name.trim())
            } else {
                format!("- {}: {}", c.name.trim(), description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Story
// ---------------------------------------------------------------------------

/// Prompt for the full story text.
pub fn story_prompt(params: &StoryParameters, analyses: &[ImageAnalysis]) -> Prompt {
    let bucket = params.age_bucket();
    let min_words = params.duration_tier.min_words();
    let language = prompt_language(&params.language);

    let mut user = format!(
        "Write a bedtime story in {language} for {audience}.\n\n\
         Theme: {theme}\n\n\
         Characters:\n{roster}\n\n\
         Tone and vocabulary: {tone}\n",
        audience = bucket.label(),
        theme = params.theme.trim(),
        roster = character_roster(params),
        tone = bucket.tone_guidance(),
    );

    if let Some(context) = image_context(analyses) {
        user.push_str(&format!(
            "\nThe family shared these pictures; weave their scenes and details into the story:\n{context}\n"
        ));
    }

    if let Some(request) = params.custom_request() {
        user.push_str(&format!("\nSpecial request from the parent: {request}\n"));
    }

    user.push_str(&format!(
        "\nLength: the story MUST be at least {min_words} words long \
         (about {minutes} minutes when read aloud slowly). Do not stop early.\n\
         Structure: a cosy opening, a gentle adventure, and a calm ending that \
         helps the listener fall asleep.\n\
         Output only the story text in {language}, with no title and no headings.",
        minutes = params.duration_tier.read_aloud_minutes(),
    ));

    Prompt {
        system: STORYTELLER_SYSTEM.to_string(),
        user,
        max_tokens: token_budget(min_words) + 400,
    }
}

/// Prompt asking the model to continue a story that came back short.
pub fn extension_prompt(params: &StoryParameters, story: &str, missing_words: usize) -> Prompt {
    let language = prompt_language(&params.language);
    let user = format!(
        "Here is a bedtime story that is too short:\n\n{story}\n\n\
         Continue it seamlessly in {language} with roughly {missing_words} more words. \
         Keep the same characters, tone and tense, add one more gentle scene, and \
         finish with a sleepy, peaceful ending. Output only the new text that comes \
         after the existing story, without repeating it.",
    );

    Prompt {
        system: STORYTELLER_SYSTEM.to_string(),
        user,
        max_tokens: token_budget(missing_words) + 200,
    }
}

/// Rough output-token budget for `words` words in any supported language.
fn token_budget(words: usize) -> u32 {
    u32::try_from(words.saturating_mul(2)).unwrap_or(u32::MAX)
}

// ---------------------------------------------------------------------------
// Title
// ---------------------------------------------------------------------------

/// Prompt for a short story title.
pub fn title_prompt(params: &StoryParameters, analyses: &[ImageAnalysis]) -> Prompt {
    let language = prompt_language(&params.language);
    let mut user = format!(
        "Suggest a title for a bedtime story for {audience}.\n\
         Theme: {theme}\n\
         Characters:\n{roster}\n",
        audience = params.age_bucket().label(),
        theme = params.theme.trim(),
        roster = character_roster(params),
    );
    if let Some(context) = image_context(analyses) {
        user.push_str(&format!("Pictures:\n{context}\n"));
    }
    user.push_str(&format!(
        "Reply with only the title in {language}: at most eight words, no quotes."
    ));

    Prompt {
        system: STORYTELLER_SYSTEM.to_string(),
        user,
        max_tokens: 30,
    }
}

static TITLE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:\*\*)?\s*(?:story\s+)?title\s*:\s*").expect("valid regex"));

/// Clean a model-generated title.
///
/// Takes the first non-empty line, strips a leading `Title:` label, Markdown
/// emphasis and surrounding quotes, and caps the length. Returns `None` when
/// nothing usable remains.
pub fn clean_title(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = TITLE_PREFIX.replace(line, "");
    let trimmed = line
        .trim()
        .trim_start_matches('#')
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '*' | '\u{201C}' | '\u{201D}' | '`'))
        .trim();

    if trimmed.is_empty() {
        return None;
    }

    let capped: String = trimmed.chars().take(MAX_TITLE_LEN).collect();
    Some(capped.trim_end().to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
