//! Free-text normalization for titles.

/// Normalize `text` into a single line of at most `max_length` characters.
///
/// Leading/trailing whitespace is trimmed and every internal whitespace run
/// (newlines included) collapses to one space. Overlong text is truncated to
/// `max_length` characters and then cut back to the last space in that
/// prefix so no word is split; a prefix without any space is kept as-is.
///
/// Lengths are counted in characters, not bytes. `max_length` must be > 0.
pub fn sanitize(text: &str, max_length: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_length {
        return collapsed;
    }

    let truncated: String = collapsed.chars().take(max_length).collect();
    match truncated.rfind(' ') {
        Some(pos) => truncated[..pos].to_string(),
        None => truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(sanitize("", 10), "");
        assert_eq!(sanitize("   \n\t ", 10), "");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(sanitize("  hello \n\n  world\t!  ", 100), "hello world !");
    }

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(sanitize("exactly ten", 11), "exactly ten");
    }

    #[test]
    fn test_cuts_at_word_boundary() {
        // Prefix "hello wor" -> last space -> "hello"
        assert_eq!(sanitize("hello world", 9), "hello");
    }

    #[test]
    fn test_cut_when_boundary_falls_on_space() {
        // Prefix "abc def " still cuts back to its last space
        assert_eq!(sanitize("abc def ghi", 8), "abc def");
    }

    #[test]
    fn test_no_space_falls_back_to_raw_truncation() {
        assert_eq!(sanitize("abcdefghijkl", 5), "abcde");
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let text = "ééééé ééééé";
        let out = sanitize(text, 7);
        assert_eq!(out, "ééééé");
        assert!(out.chars().count() <= 7);
    }

    #[test]
    fn test_never_exceeds_limit() {
        let samples = [
            "a b c d e f g h i j k l m n o p",
            "one\ntwo\nthree\nfour five six seven",
            "supercalifragilisticexpialidocious is long",
            "  spaced    out     words    here ",
            "🎉🎉🎉 party 🎉🎉🎉 time",
        ];
        for sample in samples {
            for n in 1..40 {
                let out = sanitize(sample, n);
                assert!(out.chars().count() <= n, "{:?} @ {} -> {:?}", sample, n, out);
                assert!(!out.contains("  "));
                assert!(!out.contains('\n'));
            }
        }
    }
}
