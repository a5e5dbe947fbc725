//! Deterministic fallback title and story.
//!
//! Used when the model calls fail. Both are pure functions of the story
//! parameters, so they cannot fail and always return the same output for
//! the same input.

use crate::language::normalize_language;
use crate::story::{word_count, Character, StoryParameters};

// ---------------------------------------------------------------------------
// Title
// ---------------------------------------------------------------------------

/// Localized `"{character}'s {Theme} Adventure"` title.
pub fn fallback_title(theme: &str, lead_character: Option<&str>, language: &str) -> String {
    let theme = title_case(theme.trim());
    let lead = lead_character.map(str::trim).filter(|n| !n.is_empty());

    match (normalize_language(language).as_str(), lead) {
        ("es", Some(name)) => format!("La aventura de {theme} de {name}"),
        ("es", None) => format!("La aventura de {theme}"),
        ("fr", Some(name)) => format!("L'aventure de {name} : {theme}"),
        ("fr", None) => format!("L'aventure : {theme}"),
        ("de", Some(name)) => format!("{name} und das {theme}-Abenteuer"),
        ("de", None) => format!("Das {theme}-Abenteuer"),
        ("it", Some(name)) => format!("L'avventura di {name}: {theme}"),
        ("it", None) => format!("L'avventura: {theme}"),
        ("pt", Some(name)) => format!("A aventura de {name}: {theme}"),
        ("pt", None) => format!("A aventura: {theme}"),
        (_, Some(name)) => format!("{name}'s {theme} Adventure"),
        (_, None) => format!("The {theme} Adventure"),
    }
}

/// Upper-case the first letter of every word.
fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Story
// ---------------------------------------------------------------------------

/// Localized template text. `{hero}`, `{theme}` and `{friends}` are
/// substituted before assembly.
struct StoryTemplate {
    default_hero: &'static str,
    default_friends: &'static str,
    joiner: &'static str,
    opening: &'static str,
    transitions: &'static [&'static str],
    middles: &'static [&'static str],
    closing: &'static str,
}

const ENGLISH: StoryTemplate = StoryTemplate {
    default_hero: "Little Star",
    default_friends: "a tiny glowing firefly",
    joiner: " and ",
    opening: "Once upon a time, when the sky was turning the colour of warm honey, {hero} \
        was getting ready for a very special {theme} adventure. Along came {friends} as well, \
        because the best adventures are always shared. The evening air was soft and still, \
        and somewhere far away an owl was humming a sleepy little tune.",
    transitions: &[
        "Then",
        "After a while",
        "A little later",
        "Soon",
        "Before long",
        "Quietly",
        "Just then",
    ],
    middles: &[
        "{hero} followed a winding path lit by silver moonlight. Every step felt \
         like a gentle drum beat, and every star above seemed to wink hello. The {theme} \
         world was full of surprises, but none of them were scary, only curious and kind.",
        "{friends} found a small wooden bridge over a whispering stream. The water \
         sang a slow song, and the friends stopped to listen. {hero} dipped a toe in \
         the cool water and laughed softly, because it tickled like a feather.",
        "{hero} met a wise old tortoise who knew everything about {theme}. The \
         tortoise spoke very slowly, so everyone had to be very patient. He told them that \
         the greatest treasures are found by those who are gentle and brave at the same time.",
        "the wind carried the smell of warm bread and sweet flowers. {hero} took a deep, \
         slow breath in, and a long, slow breath out. {friends} did the same, and all \
         at once everyone felt calm and cosy, like a blanket fresh from the sun.",
        "a little cloud floated down to say hello. It was soft as a pillow and it \
         offered to carry them for a while. {hero} climbed on and watched the {theme} \
         land drift by below, all quiet and sparkling in the night.",
        "{hero} helped a lost baby rabbit find its way home. The rabbit's family \
         was so happy that they shared their favourite bedtime song. It went hush, \
         hush, little one, the day is done, and everyone hummed along.",
    ],
    closing: "At last, the moon rose high and round, and it was time to go home. \
        {hero} and {friends} walked back along the sleepy path, yawning big, happy yawns. \
        They had discovered so much about {theme}, and the best part was that tomorrow \
        there would be another adventure waiting. {hero} snuggled into a warm, soft bed, \
        closed both eyes, and drifted into the sweetest dreams. Goodnight, {hero}. \
        Goodnight, little one.",
};

const SPANISH: StoryTemplate = StoryTemplate {
    default_hero: "Estrellita",
    default_friends: "una luciérnaga brillante",
    joiner: " y ",
    opening: "Había una vez, cuando el cielo se volvía del color de la miel tibia, {hero} \
        se preparaba para una aventura muy especial de {theme}. También vino {friends}, \
        porque las mejores aventuras siempre se comparten. El aire de la tarde era suave \
        y tranquilo, y a lo lejos un búho tarareaba una canción dormilona.",
    transitions: &[
        "Entonces",
        "Después de un rato",
        "Un poco más tarde",
        "Pronto",
        "Al poco tiempo",
        "En silencio",
        "Justo en ese momento",
    ],
    middles: &[
        "{hero} siguió un camino serpenteante iluminado por la luna plateada. Cada \
         paso sonaba como un tambor suave, y cada estrella parecía guiñar un ojo. El mundo \
         de {theme} estaba lleno de sorpresas, pero ninguna daba miedo, solo curiosidad.",
        "encontraron un pequeño puente de madera sobre un arroyo que susurraba. El agua \
         cantaba una canción lenta, y se detuvieron a escuchar. {hero} metió un pie en \
         el agua fresca y se rió bajito, porque hacía cosquillas como una pluma.",
        "{hero} conoció a una tortuga sabia que lo sabía todo sobre {theme}. La \
         tortuga hablaba muy despacio, así que todos tuvieron que ser pacientes. Les contó \
         que los mayores tesoros los encuentran quienes son amables y valientes a la vez.",
        "el viento trajo olor a pan tibio y flores dulces. {hero} respiró hondo y \
         despacio, y soltó el aire muy despacio. {friends} hizo lo mismo, y de pronto todos \
         se sintieron tranquilos y abrigados, como con una manta recién calentada al sol.",
        "una nubecita bajó a saludar. Era suave como una almohada y se ofreció a \
         llevarlos un rato. {hero} subió y miró pasar la tierra de {theme} allá abajo, \
         silenciosa y brillante en la noche.",
        "{hero} ayudó a un conejito perdido a encontrar su casa. Su familia se puso \
         tan contenta que compartió su canción favorita para dormir. Decía así: calla, \
         calla, pequeñito, el día ya se fue, y todos la tararearon juntos.",
    ],
    closing: "Por fin, la luna subió alta y redonda, y llegó la hora de volver a casa. \
        {hero} y {friends} regresaron por el camino dormido, bostezando grandes bostezos \
        felices. Habían descubierto muchísimo sobre {theme}, y lo mejor era que mañana \
        habría otra aventura esperando. {hero} se acurrucó en una cama suave y tibia, \
        cerró los ojos y se quedó dormido entre los sueños más dulces. Buenas noches, \
        {hero}. Buenas noches, pequeño.",
};

fn template_for(language: &str) -> &'static StoryTemplate {
    match normalize_language(language).as_str() {
        "es" => &SPANISH,
        _ => &ENGLISH,
    }
}

/// Deterministic story assembled from theme, characters, and language,
/// padded with middle scenes until it reaches the duration tier's minimum
/// word count.
pub fn fallback_story(params: &StoryParameters) -> String {
    let template = template_for(&params.language);
    let theme = params.theme.trim();
    let theme = if theme.is_empty() { "dream" } else { theme };

    let hero = params
        .lead_character()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(template.default_hero);
    let friends = companions(&params.characters, template);

    let fill = |text: &str| {
        text.replace("{hero}", hero)
            .replace("{friends}", &friends)
            .replace("{theme}", theme)
    };

    let closing = fill(template.closing);
    let closing_words = word_count(&closing);
    let target = params.duration_tier.min_words();

    let mut paragraphs = vec![capitalize_first(&fill(template.opening))];
    let mut words = word_count(&paragraphs[0]);
    let mut index = 0;

    while words + closing_words < target {
        let transition = template.transitions[index % template.transitions.len()];
        let middle = template.middles[index % template.middles.len()];
        let paragraph = format!("{transition}, {}", fill(middle));
        words += word_count(&paragraph);
        paragraphs.push(paragraph);
        index += 1;
    }

    paragraphs.push(closing);
    paragraphs.join("\n\n")
}

/// Everyone but the lead, joined for prose, or the template's default
/// companion when the lead travels alone.
fn companions(characters: &[Character], template: &StoryTemplate) -> String {
    let names: Vec<&str> = characters
        .iter()
        .skip(1)
        .map(|c| c.name.trim())
        .filter(|n| !n.is_empty())
        .collect();

    match names.as_slice() {
        [] => template.default_friends.to_string(),
        [only] => (*only).to_string(),
        [rest @ .., last] => format!("{}{}{}", rest.join(", "), template.joiner, last),
    }
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::DurationTier;

    fn params(language: &str, tier: DurationTier) -> StoryParameters {
        StoryParameters {
            theme: "space".into(),
            characters: vec![
                Character::new("Alex", "brave"),
                Character::new("Mia", ""),
                Character::new("Pip", "a robot"),
            ],
            language: language.into(),
            voice: "v".into(),
            duration_tier: tier,
            target_age: "5-7".into(),
            custom_prompt: None,
        }
    }

    #[test]
    fn english_title_uses_lead_and_theme() {
        assert_eq!(
            fallback_title("sleepy forest", Some("Alex"), "en"),
            "Alex's Sleepy Forest Adventure"
        );
        assert_eq!(fallback_title("space", Some("Alex"), "en-GB"), "Alex's Space Adventure");
    }

    #[test]
    fn title_without_character() {
        assert_eq!(fallback_title("space", None, "en"), "The Space Adventure");
        assert_eq!(fallback_title("space", Some("  "), "en"), "The Space Adventure");
    }

    #[test]
    fn localized_titles() {
        assert_eq!(fallback_title("espacio", Some("Alex"), "es"), "La aventura de Espacio de Alex");
        assert_eq!(fallback_title("Weltraum", Some("Mia"), "de"), "Mia und das Weltraum-Abenteuer");
    }

    #[test]
    fn title_is_deterministic() {
        let a = fallback_title("dragons", Some("Alex"), "fr");
        let b = fallback_title("dragons", Some("Alex"), "fr");
        assert_eq!(a, b);
    }

    #[test]
    fn story_meets_every_tier_floor() {
        for tier in DurationTier::ALL {
            for language in ["en", "es", "ja"] {
                let story = fallback_story(&params(language, tier));
                assert!(
                    word_count(&story) >= tier.min_words(),
                    "{language}/{tier}: {} words",
                    word_count(&story)
                );
            }
        }
    }

    #[test]
    fn story_mentions_theme_and_characters() {
        let story = fallback_story(&params("en", DurationTier::Short));
        assert!(story.contains("space"));
        assert!(story.contains("Alex"));
        assert!(story.contains("Mia and Pip"));
        assert!(story.starts_with("Once upon a time"));
        assert!(!story.contains('{'));
    }

    #[test]
    fn spanish_story_uses_spanish_template() {
        let story = fallback_story(&params("es", DurationTier::Short));
        assert!(story.starts_with("Había una vez"));
        assert!(story.contains("Mia y Pip"));
    }

    #[test]
    fn story_without_characters_uses_defaults() {
        let mut p = params("en", DurationTier::Short);
        p.characters.clear();
        let story = fallback_story(&p);
        assert!(story.contains("Goodnight, Little Star."));
        assert!(story.contains("a tiny glowing firefly"));
    }

    #[test]
    fn story_is_deterministic() {
        let p = params("en", DurationTier::Long);
        assert_eq!(fallback_story(&p), fallback_story(&p));
    }
}
