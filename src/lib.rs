//! # cv-adapter
//!
//! Adapt a CV to a job posting through a remote adaptation service, then
//! review, edit and export the result.
//!
//! The service does the heavy lifting (text extraction, job-page scraping,
//! the LLM call). This crate is everything around it: validating and
//! caching the uploaded CV, checking the job URL, talking to the service,
//! turning its Markdown into editable HTML and back, and exporting the
//! edited result as Markdown or PDF.
//!
//! ## Flow
//!
//! ```text
//! CV file ─┐
//!          ├─ 1. Select    validate type/size, cache bytes locally (7 days)
//! job URL ─┤  2. Validate  http(s) on an accepted job site
//!          ├─ 3. Process   multipart POST to /adapt-cv, /generate-cover-letter
//!          │               or /general-purpose
//!          ├─ 4. Clean     strip fences, line endings, blank runs
//!          ├─ 5. Present   Markdown → HTML, job description → headings/paragraphs
//!          ├─ 6. Edit      HTML → canonical Markdown on every input
//!          └─ 7. Export    {name}_{role}.md / .pdf, or a short-lived PDF preview
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cv_adapter::{ActionKind, AdapterConfig, Session};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AdapterConfig::builder()
//!         .service_url("http://localhost:8080")
//!         .build()?;
//!     let session = Session::connect(config)?;
//!     session.select_upload_path(Path::new("cv.pdf"))?;
//!     session.set_job_url("https://www.linkedin.com/jobs/view/123");
//!     session.set_action(ActionKind::CoverLetter);
//!
//!     let output = session.process().await?;
//!     println!("{}", output.markdown);
//!     session.downloads().export_markdown(Path::new(".")).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `cv-adapt` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! cv-adapter = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod job_url;
pub mod markdown;
pub mod observer;
pub mod output;
pub mod postprocess;
pub mod presenter;
pub mod selection;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{cache_id, CacheMetadata, CacheStore, CachedDocument, ContentCache, FileStore, MemoryStore};
pub use client::{AdaptationBackend, AdaptationRequest, HttpAdaptationClient, PdfSource};
pub use config::{default_cache_dir, ActionKind, AdapterConfig, AdapterConfigBuilder, PdfPayload};
pub use download::{DownloadManager, PdfPreview};
pub use error::{CacheError, CvAdaptError, ErrorCategory};
pub use job_url::{is_valid_job_url, validate_job_url};
pub use markdown::{html_to_markdown, markdown_to_html};
pub use observer::{NoopObserver, SessionObserver};
pub use output::{AdaptationResult, HealthStatus, ProcessOutput, ProcessStats};
pub use presenter::{EditableContent, RenderedResult};
pub use selection::{FileSelection, SelectedFile, Selection, SelectionSource};
pub use session::{Phase, Session};
