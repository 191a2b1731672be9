//! Caption → YouTube title, description and tags.

use serde::{Deserialize, Serialize};

use super::sanitize::sanitize;

/// Maximum title length in characters
pub const TITLE_MAX_CHARS: usize = 70;

/// Maximum number of tags emitted
pub const MAX_TAGS: usize = 15;

/// Title used when the caption's first line is blank
pub const DEFAULT_TITLE: &str = "Short video";

/// Call-to-action appended to every description
pub const DESCRIPTION_FOOTER: &str =
    "Reposted with permission from the creator.\nLike, comment & subscribe for more! ❤️";

/// Tokens shorter than this are never tags
const MIN_TAG_CHARS: usize = 3;

/// Common English function words excluded from tags
pub const STOPWORDS: &[&str] = &[
    "the", "and", "a", "to", "in", "of", "for", "on", "is", "with", "this", "that", "it", "you",
    "from", "are", "as", "be", "at", "by", "an", "or", "have", "was", "but", "not",
];

/// Metadata attached to a published video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoMetadata {
    /// At most `TITLE_MAX_CHARS` characters, never empty
    pub title: String,

    /// Caption followed by the fixed footer
    pub description: String,

    /// Lowercase, deduplicated, first-seen order, at most `MAX_TAGS`
    pub tags: Vec<String>,
}

/// Derive SEO metadata from a caption.
///
/// Pure function of `caption`.
pub fn generate(caption: &str) -> SeoMetadata {
    SeoMetadata {
        title: title_from(caption),
        description: description_from(caption),
        tags: tags_from(caption),
    }
}

fn title_from(caption: &str) -> String {
    let first_line = caption.split(['\n', '\r']).next().unwrap_or_default();
    let title = sanitize(first_line, TITLE_MAX_CHARS);
    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title
    }
}

fn description_from(caption: &str) -> String {
    let mut description = caption.trim().to_string();
    if !description.is_empty() {
        description.push_str("\n\n");
    }
    description.push_str(DESCRIPTION_FOOTER);
    description
}

fn tags_from(caption: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();

    for token in caption
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let token = token.to_ascii_lowercase();

        if token.len() < MIN_TAG_CHARS
            || token.bytes().all(|b| b.is_ascii_digit())
            || STOPWORDS.contains(&token.as_str())
            || tags.contains(&token)
        {
            continue;
        }

        tags.push(token);
        if tags.len() >= MAX_TAGS {
            break;
        }
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_is_first_line() {
        let meta = generate("Sunset at the pier\nshot on a phone #travel");
        assert_eq!(meta.title, "Sunset at the pier");
    }

    #[test]
    fn test_title_fallback() {
        assert_eq!(generate("").title, DEFAULT_TITLE);
        assert_eq!(generate("   \nsecond line").title, DEFAULT_TITLE);
    }

    #[test]
    fn test_title_truncated_on_word_boundary() {
        let caption = "word ".repeat(30);
        let meta = generate(&caption);
        assert!(meta.title.chars().count() <= TITLE_MAX_CHARS);
        assert!(meta.title.ends_with("word"));
    }

    #[test]
    fn test_description_with_caption() {
        let meta = generate("  Hello there  ");
        assert_eq!(
            meta.description,
            format!("Hello there\n\n{}", DESCRIPTION_FOOTER)
        );
    }

    #[test]
    fn test_description_without_caption() {
        assert_eq!(generate("").description, DESCRIPTION_FOOTER);
        assert_eq!(generate(" \n ").description, DESCRIPTION_FOOTER);
    }

    #[test]
    fn test_tags_dedup_and_stopwords() {
        let meta = generate("Cats and cats and DOGS");
        assert_eq!(meta.tags, vec!["cats", "dogs"]);
    }

    #[test]
    fn test_tags_drop_short_and_numeric() {
        let meta = generate("go to 2024 at #la with 3am vibes");
        assert_eq!(meta.tags, vec!["3am", "vibes"]);
    }

    #[test]
    fn test_tags_split_on_non_ascii() {
        let meta = generate("#café_culture naïve coffee-time");
        assert_eq!(meta.tags, vec!["caf", "culture", "coffee", "time"]);
    }

    #[test]
    fn test_tags_capped() {
        let words: Vec<String> = (0..30).map(|i| format!("word{}x", i)).collect();
        let meta = generate(&words.join(" "));
        assert_eq!(meta.tags.len(), MAX_TAGS);
        assert_eq!(meta.tags, words[..MAX_TAGS].to_vec());
    }

    #[test]
    fn test_generate_is_deterministic() {
        let caption = "Morning run 🏃\n\n#fitness #running #morning #fitness";
        assert_eq!(generate(caption), generate(caption));
    }
}
