//! Language code handling for prompts and localized fallbacks.

/// Lower-case a language tag and strip any region suffix
/// (`"pt-BR"` -> `"pt"`, `"EN_us"` -> `"en"`).
pub fn normalize_language(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// English display name for a language code, used inside model prompts.
///
/// Returns `None` for codes we have no name for; callers fall back to the
/// raw code.
pub fn language_name(code: &str) -> Option<&'static str> {
    let name = match normalize_language(code).as_str() {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "nl" => "Dutch",
        "pl" => "Polish",
        "sv" => "Swedish",
        "tr" => "Turkish",
        "ru" => "Russian",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        "hi" => "Hindi",
        "ar" => "Arabic",
        _ => return None,
    };
    Some(name)
}

/// Display name for prompts: the known name, or the code itself.
pub fn prompt_language(code: &str) -> String {
    language_name(code)
        .map(str::to_string)
        .unwrap_or_else(|| code.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_region_and_case() {
        assert_eq!(normalize_language("pt-BR"), "pt");
        assert_eq!(normalize_language(" EN_us "), "en");
    }

    #[test]
    fn known_and_unknown_names() {
        assert_eq!(language_name("es"), Some("Spanish"));
        assert_eq!(language_name("xx"), None);
        assert_eq!(prompt_language("xx"), "xx");
        assert_eq!(prompt_language("de-AT"), "German");
    }
}
