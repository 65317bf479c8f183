//! Markdown side of the converter: line-oriented parser and renderer.

use super::tree::{push_text, Block, Document, Inline};

/// Parse Markdown into a [`Document`].
///
/// Every input line becomes one block (or one line of a paragraph/list),
/// so `render_markdown(&parse_markdown(s)) == s` for any `s` whose list
/// items use `* ` and whose line endings are `\n`.
pub fn parse_markdown(input: &str) -> Document {
    let mut blocks: Vec<Block> = Vec::new();
    if input.is_empty() {
        return Document { blocks };
    }

    for raw in input.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        if line.is_empty() {
            blocks.push(Block::Blank);
            continue;
        }

        if let Some((level, rest)) = heading(line) {
            blocks.push(Block::Heading {
                level,
                content: parse_inlines(rest),
            });
            continue;
        }

        if let Some(rest) = list_item(line) {
            let item = parse_inlines(rest);
            match blocks.last_mut() {
                Some(Block::List(items)) => items.push(item),
                _ => blocks.push(Block::List(vec![item])),
            }
            continue;
        }

        let text = parse_inlines(line);
        match blocks.last_mut() {
            Some(Block::Paragraph(lines)) => lines.push(text),
            _ => blocks.push(Block::Paragraph(vec![text])),
        }
    }

    Document { blocks }
}

/// Render a [`Document`] back to Markdown, one line per block line.
pub fn render_markdown(doc: &Document) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(doc.blocks.len());
    for block in &doc.blocks {
        match block {
            Block::Heading { level, content } => {
                let hashes = "#".repeat(usize::from((*level).clamp(1, 3)));
                lines.push(format!("{hashes} {}", render_inlines(content)));
            }
            Block::Paragraph(text_lines) => {
                lines.extend(text_lines.iter().map(|l| render_inlines(l)));
            }
            Block::List(items) => {
                lines.extend(items.iter().map(|i| format!("* {}", render_inlines(i))));
            }
            Block::Blank => lines.push(String::new()),
        }
    }
    lines.join("\n")
}

fn heading(line: &str) -> Option<(u8, &str)> {
    if let Some(rest) = line.strip_prefix("# ") {
        Some((1, rest))
    } else if let Some(rest) = line.strip_prefix("## ") {
        Some((2, rest))
    } else {
        line.strip_prefix("### ").map(|rest| (3, rest))
    }
}

fn list_item(line: &str) -> Option<&str> {
    line.strip_prefix("* ").or_else(|| line.strip_prefix("- "))
}

/// Parse `**strong**` and `*emphasis*` spans.
///
/// Lossless: every byte of `s` ends up either in a text node or in the
/// delimiters of a span, so rendering the result reproduces `s` exactly.
/// Unmatched or empty delimiters stay literal text.
pub fn parse_inlines(s: &str) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut rest = s;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("**") {
            match after.find("**") {
                Some(end) if end > 0 => {
                    out.push(Inline::Strong(parse_inlines(&after[..end])));
                    rest = &after[end + 2..];
                }
                _ => {
                    push_text(&mut out, "**");
                    rest = after;
                }
            }
            continue;
        }

        if let Some(after) = rest.strip_prefix('*') {
            match after.find('*') {
                Some(end) if end > 0 => {
                    out.push(Inline::Emphasis(parse_inlines(&after[..end])));
                    rest = &after[end + 1..];
                }
                _ => {
                    push_text(&mut out, "*");
                    rest = after;
                }
            }
            continue;
        }

        let next = rest.find('*').unwrap_or(rest.len());
        push_text(&mut out, &rest[..next]);
        rest = &rest[next..];
    }

    out
}

pub fn render_inlines(inlines: &[Inline]) -> String {
    let mut s = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(t) => s.push_str(t),
            Inline::Strong(children) => {
                s.push_str("**");
                s.push_str(&render_inlines(children));
                s.push_str("**");
            }
            Inline::Emphasis(children) => {
                s.push('*');
                s.push_str(&render_inlines(children));
                s.push('*');
            }
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Inline {
        Inline::Text(s.into())
    }

    #[test]
    fn headings_levels() {
        let doc = parse_markdown("# One\n## Two\n### Three\n#### Four");
        assert_eq!(
            doc.blocks[0],
            Block::Heading {
                level: 1,
                content: vec![text("One")]
            }
        );
        assert!(matches!(doc.blocks[1], Block::Heading { level: 2, .. }));
        assert!(matches!(doc.blocks[2], Block::Heading { level: 3, .. }));
        // Level 4 is outside the subset and stays text.
        assert_eq!(doc.blocks[3], Block::Paragraph(vec![vec![text("#### Four")]]));
    }

    #[test]
    fn consecutive_lines_group() {
        let doc = parse_markdown("a\nb\n\n* x\n* y");
        assert_eq!(
            doc.blocks,
            vec![
                Block::Paragraph(vec![vec![text("a")], vec![text("b")]]),
                Block::Blank,
                Block::List(vec![vec![text("x")], vec![text("y")]]),
            ]
        );
    }

    #[test]
    fn inline_spans() {
        assert_eq!(
            parse_inlines("a **b** *c*"),
            vec![
                text("a "),
                Inline::Strong(vec![text("b")]),
                text(" "),
                Inline::Emphasis(vec![text("c")]),
            ]
        );
    }

    #[test]
    fn nested_emphasis_inside_strong() {
        assert_eq!(
            parse_inlines("**bold *and* italic**"),
            vec![Inline::Strong(vec![
                text("bold "),
                Inline::Emphasis(vec![text("and")]),
                text(" italic"),
            ])]
        );
    }

    #[test]
    fn unmatched_delimiters_stay_literal() {
        assert_eq!(parse_inlines("2 * 3"), vec![text("2 * 3")]);
        assert_eq!(parse_inlines("a ** b"), vec![text("a ** b")]);
        assert_eq!(parse_inlines("****"), vec![text("****")]);
    }

    #[test]
    fn inline_parse_is_lossless() {
        for s in [
            "***x***",
            "*a**b*",
            "**a*b**",
            "* lone",
            "trailing *",
            "**",
            "x*y*z**w**",
        ] {
            assert_eq!(render_inlines(&parse_inlines(s)), s, "input {s:?}");
        }
    }

    #[test]
    fn markdown_roundtrip_preserves_layout() {
        let md = "# Jane Doe\n## Engineer\n\nLine one\nLine **two**\n\n\n* a\n* *b*\n";
        assert_eq!(render_markdown(&parse_markdown(md)), md);
    }

    #[test]
    fn dash_items_normalise_to_star() {
        assert_eq!(render_markdown(&parse_markdown("- a\n- b")), "* a\n* b");
    }

    #[test]
    fn empty_input_is_empty_document() {
        assert!(parse_markdown("").is_empty());
        assert_eq!(render_markdown(&Document::default()), "");
    }
}
