//! Configuration types for the adaptation client.
//!
//! Service URL, accepted job sites, accepted upload types, the size ceiling
//! and cache bounds all live in [`AdapterConfig`], built via its
//! [`AdapterConfigBuilder`]. The CLI maps a handful of them from flags and
//! environment variables.

use crate::error::CvAdaptError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Environment variable that overrides the default cache directory.
pub const CACHE_DIR_ENV: &str = "CV_ADAPT_CACHE_DIR";

/// Configuration for an adaptation session.
///
/// Built via [`AdapterConfig::builder()`] or using
/// [`AdapterConfig::default()`].
///
/// # Example
/// ```rust
/// use cv_adapter::AdapterConfig;
///
/// let config = AdapterConfig::builder()
///     .service_url("https://cv.example.org")
///     .max_file_size(5 * 1024 * 1024)
///     .build()
///     .unwrap();
/// assert_eq!(config.endpoint("/adapt-cv"), "https://cv.example.org/api/adapt-cv");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Root URL of the adaptation service. Default: `http://localhost:8080`.
    pub service_url: String,

    /// Path prefix of the API routes. Default: `/api`.
    ///
    /// The health probe lives at the service root, outside the prefix.
    pub api_prefix: String,

    /// Job-posting sites accepted for the job URL. A host matches when it
    /// equals an entry or is a subdomain of it.
    pub allowed_domains: Vec<String>,

    /// Upload MIME types accepted by the service.
    pub allowed_mime_types: Vec<String>,

    /// Maximum upload size in bytes. Default: 10 MiB.
    pub max_file_size: u64,

    /// Directory holding the cache file. `None` resolves to
    /// [`default_cache_dir`] at session start.
    pub cache_dir: Option<PathBuf>,

    /// Maximum number of cached uploads. Default: 10.
    pub cache_max_entries: usize,

    /// Days a cached upload stays readable. Default: 7.
    pub cache_retention_days: i64,

    /// Per-request timeout in seconds; `None` waits indefinitely. Default: 180.
    ///
    /// Adaptation runs an LLM on the server side, so responses routinely
    /// take tens of seconds.
    pub request_timeout_secs: Option<u64>,

    /// Which form field the PDF conversion request carries. Default: HTML.
    pub pdf_payload: PdfPayload,

    /// Seconds a PDF preview file is kept before it is deleted. Default: 60.
    pub preview_ttl_secs: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:8080".to_string(),
            api_prefix: "/api".to_string(),
            allowed_domains: vec![
                "linkedin.com".to_string(),
                "indeed.com".to_string(),
                "reed.co.uk".to_string(),
            ],
            allowed_mime_types: vec!["application/pdf".to_string(), "text/plain".to_string()],
            max_file_size: 10 * 1024 * 1024,
            cache_dir: None,
            cache_max_entries: 10,
            cache_retention_days: 7,
            request_timeout_secs: Some(180),
            pdf_payload: PdfPayload::default(),
            preview_ttl_secs: 60,
        }
    }
}

impl AdapterConfig {
    /// Create a new builder for `AdapterConfig`.
    pub fn builder() -> AdapterConfigBuilder {
        AdapterConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full URL of an API route, e.g. `endpoint("/adapt-cv")`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.service_url.trim_end_matches('/'),
            normalise_prefix(&self.api_prefix),
            path
        )
    }

    /// URL of the service health probe.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.service_url.trim_end_matches('/'))
    }

    /// The cache directory in effect: the configured one, else the default.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }
}

fn normalise_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Returns the directory used for the upload cache.
///
/// Default locations:
/// - **macOS**: `~/Library/Caches/cv-adapt/`
/// - **Linux**: `~/.cache/cv-adapt/`
/// - **Windows**: `%LOCALAPPDATA%\cv-adapt\`
///
/// Override by setting `CV_ADAPT_CACHE_DIR`.
pub fn default_cache_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var(CACHE_DIR_ENV) {
        if !override_dir.is_empty() {
            return PathBuf::from(override_dir);
        }
    }

    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir);

    base.join("cv-adapt")
}

/// Builder for [`AdapterConfig`].
#[derive(Debug)]
pub struct AdapterConfigBuilder {
    config: AdapterConfig,
}

impl AdapterConfigBuilder {
    pub fn service_url(mut self, url: impl Into<String>) -> Self {
        self.config.service_url = url.into();
        self
    }

    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.api_prefix = prefix.into();
        self
    }

    pub fn allowed_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn allowed_mime_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_mime_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = Some(dir.into());
        self
    }

    pub fn cache_max_entries(mut self, n: usize) -> Self {
        self.config.cache_max_entries = n;
        self
    }

    pub fn cache_retention_days(mut self, days: i64) -> Self {
        self.config.cache_retention_days = days;
        self
    }

    pub fn request_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn pdf_payload(mut self, payload: PdfPayload) -> Self {
        self.config.pdf_payload = payload;
        self
    }

    pub fn preview_ttl_secs(mut self, secs: u64) -> Self {
        self.config.preview_ttl_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AdapterConfig, CvAdaptError> {
        let c = &self.config;
        let url = reqwest::Url::parse(&c.service_url).map_err(|e| {
            CvAdaptError::InvalidConfig(format!("service URL '{}': {e}", c.service_url))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(CvAdaptError::InvalidConfig(format!(
                "service URL must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if c.allowed_domains.is_empty() {
            return Err(CvAdaptError::InvalidConfig(
                "at least one allowed job domain is required".into(),
            ));
        }
        if c.allowed_mime_types.is_empty() {
            return Err(CvAdaptError::InvalidConfig(
                "at least one allowed MIME type is required".into(),
            ));
        }
        if c.max_file_size == 0 {
            return Err(CvAdaptError::InvalidConfig(
                "maximum file size must be ≥ 1 byte".into(),
            ));
        }
        if c.cache_max_entries == 0 {
            return Err(CvAdaptError::InvalidConfig(
                "cache must hold at least one entry".into(),
            ));
        }
        if c.cache_retention_days < 1 {
            return Err(CvAdaptError::InvalidConfig(format!(
                "cache retention must be ≥ 1 day, got {}",
                c.cache_retention_days
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which backend transformation is requested.
///
/// | Kind | Endpoint | Result field | Instructions |
/// |------|----------|--------------|--------------|
/// | `AdaptCv` | `/adapt-cv` | `adapted_cv` | optional |
/// | `CoverLetter` | `/generate-cover-letter` | `cover_letter` | optional |
/// | `GeneralPurpose` | `/general-purpose` | `processed_content` | required |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Rewrite the CV against the job posting. (default)
    #[default]
    AdaptCv,
    /// Write a cover letter from the CV and job posting.
    CoverLetter,
    /// Free-form transformation steered by the user's instructions.
    GeneralPurpose,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [
        ActionKind::AdaptCv,
        ActionKind::CoverLetter,
        ActionKind::GeneralPurpose,
    ];

    /// API route, relative to the API prefix.
    pub fn endpoint(self) -> &'static str {
        match self {
            ActionKind::AdaptCv => "/adapt-cv",
            ActionKind::CoverLetter => "/generate-cover-letter",
            ActionKind::GeneralPurpose => "/general-purpose",
        }
    }

    /// Name of the response field carrying the content.
    pub fn content_field(self) -> &'static str {
        match self {
            ActionKind::AdaptCv => "adapted_cv",
            ActionKind::CoverLetter => "cover_letter",
            ActionKind::GeneralPurpose => "processed_content",
        }
    }

    pub fn requires_instructions(self) -> bool {
        matches!(self, ActionKind::GeneralPurpose)
    }

    pub fn button_label(self) -> &'static str {
        match self {
            ActionKind::AdaptCv => "Adapt CV",
            ActionKind::CoverLetter => "Generate Cover Letter",
            ActionKind::GeneralPurpose => "Process",
        }
    }

    pub fn loading_message(self) -> &'static str {
        match self {
            ActionKind::AdaptCv => "Processing your CV adaptation...",
            ActionKind::CoverLetter => "Generating your cover letter...",
            ActionKind::GeneralPurpose => "Processing your request...",
        }
    }

    /// Fallback message when a failed response carries nothing usable.
    pub fn default_error(self) -> &'static str {
        match self {
            ActionKind::AdaptCv => "Failed to adapt CV",
            ActionKind::CoverLetter => "Failed to generate cover letter",
            ActionKind::GeneralPurpose => "Failed to process request",
        }
    }

    /// Stable kebab-case name, as used on the command line and in JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::AdaptCv => "adapt-cv",
            ActionKind::CoverLetter => "cover-letter",
            ActionKind::GeneralPurpose => "general-purpose",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Form field used for `/convert-to-pdf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PdfPayload {
    /// Rendered HTML in the `content` field. (default)
    #[default]
    Html,
    /// Canonical Markdown in the `markdown_content` field (older services).
    Markdown,
}
