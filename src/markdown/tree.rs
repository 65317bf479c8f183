//! The intermediate document tree shared by both formats.
//!
//! Only the subset the service produces is modelled: headings 1–3,
//! paragraphs (a run of consecutive text lines), unordered lists, blank
//! lines, and bold / italic inline spans.

/// An inline span inside a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Strong(Vec<Inline>),
    Emphasis(Vec<Inline>),
}

/// A block-level element. One Markdown line maps to exactly one block or
/// one line of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// `#`, `##` or `###` heading; `level` is 1..=3.
    Heading { level: u8, content: Vec<Inline> },
    /// Consecutive text lines, each kept as its own line.
    Paragraph(Vec<Vec<Inline>>),
    /// Consecutive `* ` items.
    List(Vec<Vec<Inline>>),
    /// An empty line.
    Blank,
}

/// A parsed document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The text of every line with markup removed, in document order.
    /// Blank lines yield empty strings.
    pub fn plain_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Heading { content, .. } => out.push(plain_text(content)),
                Block::Paragraph(lines) | Block::List(lines) => {
                    out.extend(lines.iter().map(|l| plain_text(l)))
                }
                Block::Blank => out.push(String::new()),
            }
        }
        out
    }
}

/// Concatenated text of a span list, markup removed.
pub fn plain_text(inlines: &[Inline]) -> String {
    let mut s = String::new();
    collect_text(inlines, &mut s);
    s
}

fn collect_text(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(t) => out.push_str(t),
            Inline::Strong(children) | Inline::Emphasis(children) => collect_text(children, out),
        }
    }
}

/// Append text, merging with a trailing `Text` node so the tree stays
/// canonical (never two adjacent text nodes).
pub(crate) fn push_text(out: &mut Vec<Inline>, s: &str) {
    if s.is_empty() {
        return;
    }
    if let Some(Inline::Text(prev)) = out.last_mut() {
        prev.push_str(s);
    } else {
        out.push(Inline::Text(s.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_text_merges() {
        let mut v = Vec::new();
        push_text(&mut v, "a");
        push_text(&mut v, "");
        push_text(&mut v, "b");
        assert_eq!(v, vec![Inline::Text("ab".into())]);
    }

    #[test]
    fn plain_lines_strip_markup() {
        let doc = Document {
            blocks: vec![
                Block::Heading {
                    level: 1,
                    content: vec![Inline::Strong(vec![Inline::Text("Jane".into())])],
                },
                Block::Blank,
                Block::List(vec![vec![Inline::Text("x".into())]]),
            ],
        };
        assert_eq!(doc.plain_lines(), vec!["Jane", "", "x"]);
    }
}
