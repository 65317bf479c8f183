//! Post-processing: deterministic cleanup of service-generated Markdown.
//!
//! The adaptation service runs an LLM, and its output occasionally carries
//! artefacts the editor should never see: the whole answer wrapped in
//! ` ```markdown ` fences, Windows line endings, trailing blanks, long runs
//! of empty lines, zero-width characters. Each rule here is a pure
//! `&str → String` pass that removes one of them without touching content.
//!
//! Rules run in a fixed order: trailing whitespace is trimmed before blank
//! lines are collapsed, so whitespace-only lines count as blank.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to content returned by the service.
///
/// Rules (applied in order):
/// 1. Strip outer markdown fences
/// 2. Normalise line endings (CRLF / CR → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Drop leading blank lines and trailing whitespace of the whole text
pub fn normalize_content(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    trim_document(&s)
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\n(.*)\n```\s*$").expect("valid fence regex")
});

fn strip_markdown_fences(input: &str) -> String {
    let unified = input.replace("\r\n", "\n");
    match RE_OUTER_FENCES.captures(unified.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{4,}").expect("valid blank-line regex"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").into_owned()
}

// ── Rule 5: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 6: Trim the document ────────────────────────────────────────────────

fn trim_document(input: &str) -> String {
    input.trim_start_matches('\n').trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        let input = "```markdown\n# Jane Doe\nEngineer\n```";
        assert_eq!(normalize_content(input), "# Jane Doe\nEngineer");
    }

    #[test]
    fn test_strip_fences_crlf() {
        let input = "```\r\n# Title\r\nbody\r\n```\r\n";
        assert_eq!(normalize_content(input), "# Title\nbody");
    }

    #[test]
    fn test_inner_fences_untouched() {
        let input = "Intro\n```\ncode\n```\nOutro";
        assert_eq!(strip_markdown_fences(input), input);
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(trim_trailing_whitespace("a  \n  b\t\n"), "a\n  b\n");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_whitespace_only_lines_collapse() {
        assert_eq!(normalize_content("a\n  \n \n\t\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_trim_document() {
        assert_eq!(normalize_content("\n\n# Name\n\n"), "# Name");
        assert_eq!(normalize_content(""), "");
    }

    #[test]
    fn test_clean_content_passthrough() {
        let input = "# Jane Doe\n## Engineer\n\n* **Rust**";
        assert_eq!(normalize_content(input), input);
    }
}
