//! Markdown ⇄ HTML conversion for the subset the adaptation service emits.
//!
//! The service returns Markdown; the editor works in HTML; downloads go
//! back to Markdown. Both directions go through one small tree
//! ([`Document`]) so a document that was never edited comes back
//! byte-for-byte:
//!
//! ```text
//!  Markdown ──parse_markdown──▶ Document ──render_html──▶ HTML
//!      ▲                                                    │
//!      └──────render_markdown◀── Document ◀──parse_html─────┘
//! ```
//!
//! Supported: `#`/`##`/`###` headings, paragraphs, `* ` lists, blank
//! lines, `**bold**` and `*italic*`.

mod html;
#[allow(clippy::module_inception)]
mod markdown;
mod tree;

use once_cell::sync::Lazy;
use regex::Regex;

pub use html::{escape, parse_html, render_html};
pub use markdown::{parse_inlines, parse_markdown, render_inlines, render_markdown};
pub use tree::{plain_text, Block, Document, Inline};

/// Convert Markdown to the editor's HTML.
pub fn markdown_to_html(md: &str) -> String {
    render_html(&parse_markdown(md))
}

/// Convert (possibly hand-edited) HTML back to Markdown.
pub fn html_to_markdown(html: &str) -> String {
    render_markdown(&parse_html(html))
}

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9_]\S*").expect("valid regex"));

/// True if every word starts upper-case and continues lower-case
/// ("Senior Software Engineer"). Words are runs starting at a word
/// character; punctuation in between is left alone.
pub fn is_title_case(line: &str) -> bool {
    let titled = WORD_RE.replace_all(line, |caps: &regex::Captures<'_>| {
        let word = &caps[0];
        let mut chars = word.chars();
        match chars.next() {
            Some(first) => first
                .to_uppercase()
                .chain(chars.flat_map(char::to_lowercase))
                .collect::<String>(),
            None => String::new(),
        }
    });
    titled == line
}
