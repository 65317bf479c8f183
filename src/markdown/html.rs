//! HTML side of the converter.
//!
//! The renderer emits a fixed, minimal tag set. The parser accepts that
//! tag set plus what a hand editor or a rich-text widget tends to add
//! (`<b>`, `<i>`, `<div>`, `<ol>`, attributes, entities, stray
//! indentation), and drops tags it does not know while keeping their text.

use super::tree::{push_text, Block, Document, Inline};

/// Render a [`Document`] as an HTML fragment, one block per line.
pub fn render_html(doc: &Document) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(doc.blocks.len());
    for block in &doc.blocks {
        let html = match block {
            Block::Heading { level, content } => {
                let level = (*level).clamp(1, 3);
                format!("<h{level}>{}</h{level}>", render_inlines(content))
            }
            Block::Paragraph(lines) => {
                let body: Vec<String> = lines.iter().map(|l| render_inlines(l)).collect();
                format!("<p>{}</p>", body.join("<br>"))
            }
            Block::List(items) => {
                let body: String = items
                    .iter()
                    .map(|i| format!("<li>{}</li>", render_inlines(i)))
                    .collect();
                format!("<ul>{body}</ul>")
            }
            Block::Blank => "<br>".to_string(),
        };
        parts.push(html);
    }
    parts.join("\n")
}

fn render_inlines(inlines: &[Inline]) -> String {
    let mut s = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(t) => s.push_str(&escape(t)),
            Inline::Strong(children) => {
                s.push_str("<strong>");
                s.push_str(&render_inlines(children));
                s.push_str("</strong>");
            }
            Inline::Emphasis(children) => {
                s.push_str("<em>");
                s.push_str(&render_inlines(children));
                s.push_str("</em>");
            }
        }
    }
    s
}

/// Escape text for element content.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

// ── Tokenizer ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Open(String),
    Close(String),
    Text(String),
}

fn tokenize(html: &str) -> Vec<Tok> {
    let mut tokens = Vec::new();
    let mut raw = String::new();
    let mut rest = html;

    while let Some(pos) = rest.find('<') {
        raw.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(comment) = tail.strip_prefix("<!--") {
            rest = match comment.find("-->") {
                Some(end) => &comment[end + 3..],
                None => "",
            };
            continue;
        }

        match parse_tag(tail) {
            Some((tok, len)) => {
                flush_text(&mut raw, &mut tokens);
                tokens.push(tok);
                rest = &tail[len..];
            }
            None => {
                raw.push('<');
                rest = &tail[1..];
            }
        }
    }
    raw.push_str(rest);
    flush_text(&mut raw, &mut tokens);
    tokens
}

fn flush_text(raw: &mut String, tokens: &mut Vec<Tok>) {
    if raw.is_empty() {
        return;
    }
    let text = decode_entities(&fold_newlines(raw));
    raw.clear();
    if !text.is_empty() {
        tokens.push(Tok::Text(text));
    }
}

/// Parse `<name ...>` or `</name>` at the start of `tail`, returning the
/// token and the number of bytes consumed.
fn parse_tag(tail: &str) -> Option<(Tok, usize)> {
    let inner = &tail[1..];
    let (closing, inner) = match inner.strip_prefix('/') {
        Some(after) => (true, after),
        None => (false, inner),
    };
    let name_len = inner
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    if name_len == 0 {
        return None;
    }
    let end = tail.find('>')?;
    let name = inner[..name_len].to_ascii_lowercase();
    let tok = if closing {
        Tok::Close(name)
    } else {
        Tok::Open(name)
    };
    Some((tok, end + 1))
}

/// Whitespace runs that contain a line break are source formatting, not
/// content: dropped at the edges of a text run, a single space inside it.
fn fold_newlines(raw: &str) -> String {
    if !raw.contains(['\n', '\r']) {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut run = String::new();
    let mut seen_content = false;

    for c in raw.chars() {
        if c.is_whitespace() {
            run.push(c);
            continue;
        }
        if !run.is_empty() {
            if run.contains(['\n', '\r']) {
                if seen_content {
                    out.push(' ');
                }
            } else {
                out.push_str(&run);
            }
            run.clear();
        }
        out.push(c);
        seen_content = true;
    }
    if !run.contains(['\n', '\r']) {
        out.push_str(&run);
    }
    out
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|c| (c, semi + 1)));
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

// ── Tree building ────────────────────────────────────────────────────────

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "p" | "div" | "ul" | "ol" | "li"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Strong,
    Emphasis,
}

fn mark_of(name: &str) -> Option<Mark> {
    match name {
        "strong" | "b" => Some(Mark::Strong),
        "em" | "i" => Some(Mark::Emphasis),
        _ => None,
    }
}

/// Accumulates one line of inline content with open bold/italic frames.
#[derive(Default)]
struct InlineBuilder {
    root: Vec<Inline>,
    frames: Vec<(Mark, Vec<Inline>)>,
}

impl InlineBuilder {
    fn current(&mut self) -> &mut Vec<Inline> {
        match self.frames.last_mut() {
            Some((_, children)) => children,
            None => &mut self.root,
        }
    }

    fn text(&mut self, s: &str) {
        push_text(self.current(), s);
    }

    fn open(&mut self, name: &str) {
        if let Some(mark) = mark_of(name) {
            self.frames.push((mark, Vec::new()));
        }
    }

    fn close(&mut self, name: &str) {
        let Some(mark) = mark_of(name) else { return };
        if self.frames.last().map(|(m, _)| *m) == Some(mark) {
            self.pop_frame();
        }
    }

    fn pop_frame(&mut self) {
        if let Some((mark, children)) = self.frames.pop() {
            // Empty spans would render as bare delimiters.
            if children.is_empty() {
                return;
            }
            let node = match mark {
                Mark::Strong => Inline::Strong(children),
                Mark::Emphasis => Inline::Emphasis(children),
            };
            self.current().push(node);
        }
    }

    fn is_empty(&self) -> bool {
        self.root.is_empty() && self.frames.iter().all(|(_, c)| c.is_empty())
    }

    /// Close any open spans and hand back the line, leaving the builder empty.
    fn finish(&mut self) -> Vec<Inline> {
        while !self.frames.is_empty() {
            self.pop_frame();
        }
        std::mem::take(&mut self.root)
    }
}

/// Parse an HTML fragment into a [`Document`].
///
/// For any document `d` produced by the Markdown parser,
/// `parse_html(&render_html(&d)) == d`.
pub fn parse_html(html: &str) -> Document {
    let tokens = tokenize(html);
    let mut blocks: Vec<Block> = Vec::new();
    let mut p = 0;

    while p < tokens.len() {
        match &tokens[p] {
            Tok::Open(name) => match name.as_str() {
                "h1" | "h2" | "h3" => {
                    let name = name.clone();
                    let level = name.as_bytes()[1] - b'0';
                    p += 1;
                    let content = collect_until_close(&tokens, &mut p, &name);
                    blocks.push(Block::Heading { level, content });
                }
                "p" | "div" | "h4" | "h5" | "h6" => {
                    let name = name.clone();
                    p += 1;
                    let lines = collect_lines(&tokens, &mut p, Some(&name));
                    push_lines(&mut blocks, lines);
                }
                "ul" | "ol" => {
                    let name = name.clone();
                    p += 1;
                    let items = collect_items(&tokens, &mut p, &name);
                    push_items(&mut blocks, items);
                }
                "li" => {
                    p += 1;
                    let item = collect_until_close(&tokens, &mut p, "li");
                    push_items(&mut blocks, vec![item]);
                }
                "br" => {
                    p += 1;
                    blocks.push(Block::Blank);
                }
                _ => {
                    let lines = collect_lines(&tokens, &mut p, None);
                    push_loose_lines(&mut blocks, lines);
                }
            },
            Tok::Close(_) => p += 1,
            Tok::Text(t) if t.trim().is_empty() => p += 1,
            Tok::Text(_) => {
                let lines = collect_lines(&tokens, &mut p, None);
                push_loose_lines(&mut blocks, lines);
            }
        }
    }

    Document { blocks }
}

fn push_lines(blocks: &mut Vec<Block>, lines: Vec<Vec<Inline>>) {
    if lines.len() == 1 && lines[0].is_empty() {
        blocks.push(Block::Blank);
    } else {
        blocks.push(Block::Paragraph(lines));
    }
}

fn push_loose_lines(blocks: &mut Vec<Block>, lines: Vec<Vec<Inline>>) {
    let has_content = lines
        .iter()
        .any(|l| !super::tree::plain_text(l).trim().is_empty());
    if has_content {
        blocks.push(Block::Paragraph(lines));
    }
}

fn push_items(blocks: &mut Vec<Block>, items: Vec<Vec<Inline>>) {
    if items.is_empty() {
        return;
    }
    match blocks.last_mut() {
        Some(Block::List(existing)) => existing.extend(items),
        _ => blocks.push(Block::List(items)),
    }
}

/// Lines of a `<p>`/`<div>` (when `closing` is set) or of loose top-level
/// content (stops before the next block tag). `<br>` separates lines.
fn collect_lines(tokens: &[Tok], p: &mut usize, closing: Option<&str>) -> Vec<Vec<Inline>> {
    let mut lines = Vec::new();
    let mut line = InlineBuilder::default();
    let mut depth = 0usize;

    while *p < tokens.len() {
        match &tokens[*p] {
            Tok::Open(n) if n == "br" => {
                lines.push(line.finish());
                *p += 1;
            }
            Tok::Open(n) if is_block(n) => match closing {
                None => break,
                Some(c) if n == c => {
                    depth += 1;
                    if !line.is_empty() {
                        lines.push(line.finish());
                    }
                    *p += 1;
                }
                Some(_) => *p += 1,
            },
            Tok::Close(n) if is_block(n) => match closing {
                None => break,
                Some(c) if n == c => {
                    *p += 1;
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    if !line.is_empty() {
                        lines.push(line.finish());
                    }
                }
                Some(_) => *p += 1,
            },
            Tok::Open(n) => {
                line.open(n);
                *p += 1;
            }
            Tok::Close(n) => {
                line.close(n);
                *p += 1;
            }
            Tok::Text(t) => {
                line.text(t);
                *p += 1;
            }
        }
    }

    let last = line.finish();
    if !last.is_empty() || lines.is_empty() {
        lines.push(last);
    }
    lines
}

/// Inline content of a heading or list item, up to its closing tag.
fn collect_until_close(tokens: &[Tok], p: &mut usize, name: &str) -> Vec<Inline> {
    let mut line = InlineBuilder::default();
    let is_item = name == "li";

    while *p < tokens.len() {
        match &tokens[*p] {
            Tok::Close(n) if n == name => {
                *p += 1;
                break;
            }
            // A new item or the end of the list closes an unterminated <li>.
            Tok::Open(n) if is_item && n == "li" => break,
            Tok::Close(n) if is_item && (n == "ul" || n == "ol") => break,
            Tok::Open(n) | Tok::Close(n) if is_block(n) || n == "br" => *p += 1,
            Tok::Open(n) => {
                line.open(n);
                *p += 1;
            }
            Tok::Close(n) => {
                line.close(n);
                *p += 1;
            }
            Tok::Text(t) => {
                line.text(t);
                *p += 1;
            }
        }
    }
    line.finish()
}

fn collect_items(tokens: &[Tok], p: &mut usize, name: &str) -> Vec<Vec<Inline>> {
    let mut items = Vec::new();

    while *p < tokens.len() {
        match &tokens[*p] {
            Tok::Close(n) if n == name => {
                *p += 1;
                break;
            }
            Tok::Open(n) if n == "li" => {
                *p += 1;
                items.push(collect_until_close(tokens, p, "li"));
            }
            Tok::Text(t) if !t.trim().is_empty() => {
                let mut line = InlineBuilder::default();
                line.text(t);
                items.push(line.finish());
                *p += 1;
            }
            _ => *p += 1,
        }
    }
    items
}
