//! HTTP client for the adaptation service.
//!
//! ## Endpoints
//!
//! | Action | Route | Result field |
//! |--------|-------|--------------|
//! | adapt CV | `POST {api}/adapt-cv` | `adapted_cv` |
//! | cover letter | `POST {api}/generate-cover-letter` | `cover_letter` |
//! | general purpose | `POST {api}/general-purpose` | `processed_content` |
//! | PDF | `POST {api}/convert-to-pdf` | binary body |
//! | health | `GET {service}/health` | `{status, version}` |
//!
//! Action requests are `multipart/form-data` with `cv_file`, `job_url` and,
//! when given, `additional_instructions`. Every failure is reduced to a
//! single message: a non-2xx `{"detail": ...}` body becomes
//! [`CvAdaptError::Backend`], a request that never got an answer becomes
//! [`CvAdaptError::Transport`]. There are no retries.

use crate::config::{ActionKind, AdapterConfig};
use crate::error::CvAdaptError;
use crate::output::{AdaptationResult, HealthStatus};
use crate::selection::SelectedFile;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One adaptation request.
#[derive(Debug, Clone)]
pub struct AdaptationRequest {
    pub action: ActionKind,
    pub file: SelectedFile,
    pub job_url: String,
    /// Free-text steering; required by [`ActionKind::GeneralPurpose`].
    pub instructions: Option<String>,
}

/// What to rasterise into a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfSource {
    /// Rendered HTML, sent as the `content` field.
    Html(String),
    /// Canonical Markdown, sent as the legacy `markdown_content` field.
    Markdown(String),
}

impl PdfSource {
    pub fn field_name(&self) -> &'static str {
        match self {
            PdfSource::Html(_) => "content",
            PdfSource::Markdown(_) => "markdown_content",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            PdfSource::Html(s) | PdfSource::Markdown(s) => s,
        }
    }
}

/// The service seen from the session and the download manager.
///
/// Implemented over HTTP by [`HttpAdaptationClient`]; tests supply fakes.
#[async_trait]
pub trait AdaptationBackend: Send + Sync {
    /// Run one adaptation action.
    async fn process(&self, request: &AdaptationRequest) -> Result<AdaptationResult, CvAdaptError>;

    /// Rasterise content into PDF bytes.
    async fn convert_to_pdf(&self, source: &PdfSource) -> Result<Bytes, CvAdaptError>;
}

/// reqwest-backed [`AdaptationBackend`].
#[derive(Debug, Clone)]
pub struct HttpAdaptationClient {
    http: reqwest::Client,
    config: AdapterConfig,
}

impl HttpAdaptationClient {
    pub fn new(config: &AdapterConfig) -> Result<Self, CvAdaptError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("cv-adapt/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| CvAdaptError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// Probe `GET {service}/health`.
    pub async fn health(&self) -> Result<HealthStatus, CvAdaptError> {
        let url = self.config.health_url();
        debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(CvAdaptError::Backend {
                status: status.as_u16(),
                message: error_message(status, &body, "Health check failed"),
            });
        }
        serde_json::from_str(&body).map_err(|e| CvAdaptError::MalformedResponse {
            detail: format!("health response: {e}"),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> CvAdaptError {
        let message = match (e.is_timeout(), self.config.request_timeout_secs) {
            (true, Some(secs)) => format!("request timed out after {secs}s"),
            (true, None) => "request timed out".to_string(),
            _ if e.is_connect() => format!("connection failed ({})", self.config.service_url),
            _ => e.to_string(),
        };
        warn!("Transport error: {}", message);
        CvAdaptError::Transport { message }
    }

    fn form_for(&self, request: &AdaptationRequest) -> Result<Form, CvAdaptError> {
        let file = &request.file;
        let part = Part::stream_with_length(reqwest::Body::from(file.bytes.clone()), file.size())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| {
                CvAdaptError::Internal(format!("MIME type '{}': {e}", file.mime_type))
            })?;

        let mut form = Form::new()
            .part("cv_file", part)
            .text("job_url", request.job_url.clone());
        if let Some(instructions) = request
            .instructions
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            form = form.text("additional_instructions", instructions.to_string());
        }
        Ok(form)
    }
}

#[async_trait]
impl AdaptationBackend for HttpAdaptationClient {
    async fn process(&self, request: &AdaptationRequest) -> Result<AdaptationResult, CvAdaptError> {
        let action = request.action;
        let url = self.config.endpoint(action.endpoint());
        info!(
            "POST {} ({}, file '{}', {} bytes)",
            url,
            action,
            request.file.file_name,
            request.file.size()
        );

        let form = self.form_for(request)?;
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        debug!("{} answered {} ({} bytes)", url, status, body.len());

        if !status.is_success() {
            let message = error_message(status, &body, action.default_error());
            warn!("{} failed: {} {}", action, status.as_u16(), message);
            return Err(CvAdaptError::Backend {
                status: status.as_u16(),
                message,
            });
        }
        parse_result(action, &body)
    }

    async fn convert_to_pdf(&self, source: &PdfSource) -> Result<Bytes, CvAdaptError> {
        let url = self.config.endpoint("/convert-to-pdf");
        info!("POST {} ({} chars of {})", url, source.content().len(), source.field_name());

        let form = Form::new().text(source.field_name(), source.content().to_string());
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CvAdaptError::Backend {
                status: status.as_u16(),
                message: error_message(status, &body, "Failed to generate PDF"),
            });
        }
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        if bytes.is_empty() {
            return Err(CvAdaptError::MalformedResponse {
                detail: "empty PDF body".into(),
            });
        }
        debug!("Received PDF ({} bytes)", bytes.len());
        Ok(bytes)
    }
}

// ── Response parsing ─────────────────────────────────────────────────────

fn parse_result(action: ActionKind, body: &str) -> Result<AdaptationResult, CvAdaptError> {
    let value: Value = serde_json::from_str(body).map_err(|e| CvAdaptError::MalformedResponse {
        detail: format!("response is not JSON: {e}"),
    })?;
    let field = action.content_field();
    let content = value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| CvAdaptError::MalformedResponse {
            detail: format!("missing '{field}' in response"),
        })?
        .to_string();

    Ok(AdaptationResult {
        action,
        content,
        job_description: value
            .get("job_description")
            .and_then(Value::as_str)
            .map(str::to_string),
        original_cv_length: value.get("original_cv_length").and_then(Value::as_u64),
        job_description_length: value.get("job_description_length").and_then(Value::as_u64),
    })
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Detail>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Detail {
    Message(String),
    Fields(Vec<FieldError>),
    Other(Value),
}

#[derive(Deserialize)]
struct FieldError {
    #[serde(default)]
    loc: Vec<Value>,
    #[serde(default)]
    msg: String,
}

impl FieldError {
    fn describe(&self) -> String {
        let loc: Vec<String> = self
            .loc
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        if loc.is_empty() {
            self.msg.clone()
        } else {
            format!("{}: {}", loc.join("."), self.msg)
        }
    }
}

/// The user-facing message for a failed response.
///
/// `detail` as a string is used verbatim; as a list of `{loc, msg}` it is
/// joined into one line (`body.job_url: invalid; ...`). A JSON body without
/// a usable `detail` yields `fallback`; a body that is not JSON at all
/// yields the HTTP status text.
pub fn error_message(status: StatusCode, body: &str, fallback: &str) -> String {
    let parsed: ErrorBody = match serde_json::from_str(body) {
        Ok(b) => b,
        Err(_) => {
            return status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| fallback.to_string())
        }
    };

    let message = match parsed.detail {
        Some(Detail::Message(s)) => s,
        Some(Detail::Fields(fields)) => fields
            .iter()
            .map(FieldError::describe)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        Some(Detail::Other(v)) if !v.is_null() => v.to_string(),
        _ => String::new(),
    };
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}
