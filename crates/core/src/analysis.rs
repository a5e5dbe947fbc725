//! Uploaded image references and per-image scene analyses.

use serde::{Deserialize, Serialize};

/// Description stored on the placeholder analysis of an image that could
/// not be analyzed.
pub const PLACEHOLDER_DESCRIPTION: &str = "An image the family shared for this story.";

/// A stored upload, referenced by storage key and public URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub key: String,
    pub url: String,
    pub content_type: String,
}

/// Structured scene description of one uploaded image.
///
/// Scoped to a single generation attempt; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub setting: String,
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub objects: Vec<String>,
    #[serde(skip)]
    pub placeholder: bool,
}

impl ImageAnalysis {
    /// Stand-in record for an image whose analysis failed.
    pub fn placeholder() -> Self {
        Self {
            description: PLACEHOLDER_DESCRIPTION.to_string(),
            placeholder: true,
            ..Default::default()
        }
    }

    /// Parse a vision-model reply.
    ///
    /// Accepts a bare JSON object or one wrapped in a Markdown code fence.
    /// A reply that is not valid JSON is kept verbatim as the description.
    /// An empty reply yields a placeholder.
    pub fn from_model_reply(reply: &str) -> Self {
        let trimmed = strip_code_fence(reply.trim());
        if trimmed.is_empty() {
            return Self::placeholder();
        }

        let json_slice = match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if end > start => &trimmed[start..=end],
            _ => trimmed,
        };

        match serde_json::from_str::<ImageAnalysis>(json_slice) {
            Ok(mut parsed) => {
                parsed.description = parsed.description.trim().to_string();
                if parsed.description.is_empty() {
                    parsed.description = PLACEHOLDER_DESCRIPTION.to_string();
                }
                parsed
            }
            Err(_) => Self {
                description: trimmed.to_string(),
                ..Default::default()
            },
        }
    }
}

/// Remove a surrounding ```` ``` ```` / ```` ```json ```` fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let reply = r#"{"description":"A cat on a bed","characters":["cat"],"setting":"bedroom","mood":"calm","objects":["pillow"]}"#;
        let a = ImageAnalysis::from_model_reply(reply);
        assert_eq!(a.description, "A cat on a bed");
        assert_eq!(a.characters, vec!["cat"]);
        assert_eq!(a.objects, vec!["pillow"]);
        assert!(!a.placeholder);
    }

    #[test]
    fn parses_fenced_json_with_missing_fields() {
        let reply = "```json\n{\"description\": \"A beach\", \"mood\": \"sunny\"}\n```";
        let a = ImageAnalysis::from_model_reply(reply);
        assert_eq!(a.description, "A beach");
        assert_eq!(a.mood, "sunny");
        assert!(a.characters.is_empty());
    }

    #[test]
    fn non_json_reply_becomes_description() {
        let a = ImageAnalysis::from_model_reply("Two children building a sandcastle.");
        assert_eq!(a.description, "Two children building a sandcastle.");
        assert!(!a.placeholder);
    }

    #[test]
    fn empty_reply_is_placeholder() {
        assert!(ImageAnalysis::from_model_reply("   ").placeholder);
    }
}
