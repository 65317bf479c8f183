//! Presentation of an adaptation result: title and label per action, the
//! editable rendered content, and the formatted job description.

use crate::config::ActionKind;
use crate::markdown::{escape, html_to_markdown, is_title_case, markdown_to_html};
use crate::output::{AdaptationResult, ProcessOutput, ProcessStats};
use std::fmt;

/// Called with the re-derived canonical Markdown after every edit.
pub type ChangeListener = Box<dyn Fn(&str) + Send + Sync>;

/// Lines at least this long are never promoted to subheadings.
const HEADING_MAX_CHARS: usize = 100;

const NO_JOB_DESCRIPTION: &str =
    r#"<p class="no-content">No job description could be extracted from the provided URL.</p>"#;
const EMPTY_JOB_DESCRIPTION: &str = r#"<p class="no-content">No job description available.</p>"#;

/// Rendered content that the user may edit.
///
/// Holds the HTML shown to the user and the canonical Markdown derived from
/// it. Each [`input`](Self::input) re-derives the Markdown and notifies the
/// listener; there is no debounce.
pub struct EditableContent {
    html: String,
    markdown: String,
    listener: Option<ChangeListener>,
}

impl fmt::Debug for EditableContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditableContent")
            .field("html", &self.html)
            .field("markdown", &self.markdown)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl EditableContent {
    pub fn new(markdown: &str, listener: Option<ChangeListener>) -> Self {
        Self {
            html: markdown_to_html(markdown),
            markdown: markdown.to_string(),
            listener,
        }
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// Canonical Markdown: the service output until the first edit, the
    /// conversion of the edited HTML afterwards.
    pub fn markdown(&self) -> &str {
        &self.markdown
    }

    /// Apply an edit to the rendered HTML.
    pub fn input(&mut self, html: impl Into<String>) -> &str {
        self.html = html.into();
        self.markdown = html_to_markdown(&self.html);
        if let Some(listener) = &self.listener {
            listener(&self.markdown);
        }
        &self.markdown
    }

    pub fn set_listener(&mut self, listener: ChangeListener) {
        self.listener = Some(listener);
    }
}

/// A result ready for display.
#[derive(Debug)]
pub struct RenderedResult {
    pub action: ActionKind,
    pub title: &'static str,
    pub label: &'static str,
    pub content: EditableContent,
    pub job_description: Option<String>,
    pub job_description_html: String,
}

impl RenderedResult {
    /// Snapshot for serialisation.
    pub fn to_output(&self, stats: ProcessStats) -> ProcessOutput {
        ProcessOutput {
            action: self.action,
            title: self.title.to_string(),
            label: self.label.to_string(),
            markdown: self.content.markdown().to_string(),
            html: self.content.html().to_string(),
            job_description: self.job_description.clone(),
            job_description_html: self.job_description_html.clone(),
            stats,
        }
    }

    /// A standalone HTML page with the editable content and the job
    /// description side by side.
    pub fn to_html_page(&self) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: system-ui, sans-serif; margin: 2rem auto; max-width: 70rem; }}
.results {{ display: grid; grid-template-columns: 2fr 1fr; gap: 2rem; }}
.editable {{ border: 1px dashed #ccc; padding: 10px; min-height: 300px; }}
.no-content {{ color: #777; font-style: italic; }}
</style>
</head>
<body>
<h1>{title}</h1>
<div class="results">
<section>
<h2>{label}</h2>
<div class="editable" contenteditable="true" spellcheck="true">
{content}
</div>
</section>
<section>
<h2>Job Description</h2>
{job}
</section>
</div>
</body>
</html>
"#,
            title = escape(self.title),
            label = escape(self.label),
            content = self.content.html(),
            job = self.job_description_html,
        )
    }
}

/// Heading shown above the results.
pub fn title_for(action: ActionKind) -> &'static str {
    match action {
        ActionKind::AdaptCv => "Your Adapted CV",
        ActionKind::CoverLetter => "Your Cover Letter",
        ActionKind::GeneralPurpose => "Your Processed Content",
    }
}

/// Label above the editable content.
pub fn label_for(action: ActionKind) -> &'static str {
    match action {
        ActionKind::AdaptCv => "Adapted CV",
        ActionKind::CoverLetter => "Cover Letter",
        ActionKind::GeneralPurpose => "Processed Content",
    }
}

/// Render a result for display, installing `on_change` on the editable
/// content.
pub fn render(result: &AdaptationResult, on_change: Option<ChangeListener>) -> RenderedResult {
    RenderedResult {
        action: result.action,
        title: title_for(result.action),
        label: label_for(result.action),
        content: EditableContent::new(&result.content, on_change),
        job_description: result.job_description.clone(),
        job_description_html: format_job_description(result.job_description.as_deref()),
    }
}

/// Format scraped job-description text as HTML.
///
/// Non-empty lines shorter than 100 characters that are ALL CAPS or Title
/// Case become `<h3>` subheadings, every other line a `<p>`.
pub fn format_job_description(text: Option<&str>) -> String {
    let text = match text {
        None | Some("") => return NO_JOB_DESCRIPTION.to_string(),
        Some(t) if t.trim().is_empty() => return EMPTY_JOB_DESCRIPTION.to_string(),
        Some(t) => t,
    };

    let mut html = String::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if looks_like_heading(line) {
            html.push_str(&format!("<h3>{}</h3>", escape(line)));
        } else {
            html.push_str(&format!("<p>{}</p>", escape(line)));
        }
    }
    html
}

fn looks_like_heading(line: &str) -> bool {
    line.chars().count() < HEADING_MAX_CHARS
        && (line == line.to_uppercase() || is_title_case(line))
}
