//! HTML-to-text normalization shared by the adapters.

use std::sync::LazyLock;

use regex::Regex;

static BLOCK_BREAKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(?:p|div|li|ul|ol|h[1-6]|tr|table|section|blockquote)>|<li[^>]*>")
        .unwrap_or_else(|e| panic!("invalid block-break regex: {e}"))
});

static TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[^>]*>").unwrap_or_else(|e| panic!("invalid tag regex: {e}"))
});

static HORIZONTAL_WS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t\r\u{a0}]+").unwrap_or_else(|e| panic!("invalid whitespace regex: {e}"))
});

/// Normalize an HTML fragment to plain text: block-level elements
/// become newlines, remaining tags are stripped, entities are decoded,
/// and whitespace runs collapse. Blank lines are dropped.
pub fn html_to_text(html: &str) -> String {
    let broken = BLOCK_BREAKS.replace_all(html, "\n");
    let stripped = TAGS.replace_all(&broken, "");
    let decoded = html_escape::decode_html_entities(&stripped);
    let collapsed = HORIZONTAL_WS.replace_all(&decoded, " ");

    collapsed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split normalized posting text into (description, requirements) on
/// the first requirements-style heading line. Postings without such a
/// heading keep everything in the description and get an empty
/// requirements string.
pub fn split_sections(text: &str) -> (String, String) {
    let lines: Vec<&str> = text.lines().collect();
    let split_at = lines.iter().position(|line| is_requirements_heading(line));

    match split_at {
        Some(idx) => (
            lines[..idx].join("\n").trim().to_string(),
            lines[idx + 1..].join("\n").trim().to_string(),
        ),
        None => (text.trim().to_string(), String::new()),
    }
}

fn is_requirements_heading(line: &str) -> bool {
    // Headings are short; a sentence that merely mentions
    // "requirements" mid-paragraph doesn't count.
    if line.len() > 80 {
        return false;
    }
    let lower = line.to_lowercase();
    ["requirements", "qualifications", "what you'll need", "who you are"]
        .iter()
        .any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_elements_become_newlines() {
        let html = "<p>First paragraph</p><p>Second paragraph</p>";
        assert_eq!(html_to_text(html), "First paragraph\nSecond paragraph");
    }

    #[test]
    fn test_list_items_become_lines() {
        let html = "<ul><li>Rust</li><li>Postgres</li></ul>";
        assert_eq!(html_to_text(html), "Rust\nPostgres");
    }

    #[test]
    fn test_inline_tags_stripped_without_breaks() {
        let html = "Build <strong>reliable</strong> systems";
        assert_eq!(html_to_text(html), "Build reliable systems");
    }

    #[test]
    fn test_entities_decoded() {
        let html = "<p>Pay &amp; benefits &mdash; competitive</p>";
        assert_eq!(html_to_text(html), "Pay & benefits \u{2014} competitive");
    }

    #[test]
    fn test_whitespace_collapsed() {
        let html = "<p>lots   of\t  spaces</p>\n\n\n<p>here</p>";
        assert_eq!(html_to_text(html), "lots of spaces\nhere");
    }

    #[test]
    fn test_split_on_requirements_heading() {
        let text = "We build crawlers.\nYou will own the pipeline.\nRequirements\n5 years Rust\nPostgres";
        let (description, requirements) = split_sections(text);
        assert_eq!(description, "We build crawlers.\nYou will own the pipeline.");
        assert_eq!(requirements, "5 years Rust\nPostgres");
    }

    #[test]
    fn test_split_on_qualifications_heading() {
        let text = "About the role\nMinimum Qualifications\nBS or equivalent";
        let (description, requirements) = split_sections(text);
        assert_eq!(description, "About the role");
        assert_eq!(requirements, "BS or equivalent");
    }

    #[test]
    fn test_no_heading_means_empty_requirements() {
        let text = "Just a description with no sections";
        let (description, requirements) = split_sections(text);
        assert_eq!(description, text);
        assert_eq!(requirements, "");
    }

    #[test]
    fn test_long_sentences_are_not_headings() {
        let text = format!(
            "Intro\n{} requirements gathering experience is a plus across many teams and offices\nOutro",
            "Our stakeholders value"
        );
        let (description, requirements) = split_sections(&text);
        assert!(requirements.is_empty());
        assert!(description.contains("Outro"));
    }
}
