//! Result types returned by the adaptation client and the session.

use crate::config::ActionKind;
use serde::{Deserialize, Serialize};

/// A successful backend response, normalised across action kinds.
///
/// The service names the content field after the action (`adapted_cv`,
/// `cover_letter`, `processed_content`); the client maps it into `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptationResult {
    pub action: ActionKind,
    /// Markdown produced by the service.
    pub content: String,
    /// Text scraped from the job posting, when the service could extract it.
    pub job_description: Option<String>,
    pub original_cv_length: Option<u64>,
    pub job_description_length: Option<u64>,
}

/// Statistics for one `process` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStats {
    pub original_cv_length: Option<u64>,
    pub job_description_length: Option<u64>,
    /// Wall-clock time of the backend round trip.
    pub duration_ms: u64,
}

/// Everything `process` produced, in a form that serialises cleanly for
/// `--json` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutput {
    pub action: ActionKind,
    /// Results title, e.g. "Your Cover Letter".
    pub title: String,
    /// Label above the editable content.
    pub label: String,
    /// Canonical Markdown, what downloads export.
    pub markdown: String,
    /// Rendered HTML of the content.
    pub html: String,
    pub job_description: Option<String>,
    pub job_description_html: String,
    pub stats: ProcessStats,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy") || self.status.eq_ignore_ascii_case("ok")
    }
}
