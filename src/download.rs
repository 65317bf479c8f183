//! Markdown export, PDF download and PDF preview of the current content.
//!
//! The manager tracks the canonical Markdown of the last result (updated on
//! every edit) and the action that produced it. File names are derived from
//! the content: a cover letter is always `cover_letter.{ext}`; anything else
//! is `{name}_{role}.{ext}` from its first two non-empty lines.

use crate::client::{AdaptationBackend, PdfSource};
use crate::config::{ActionKind, AdapterConfig, PdfPayload};
use crate::error::CvAdaptError;
use crate::markdown::{markdown_to_html, parse_html, parse_markdown, Document};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static RE_UNSAFE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\s-]").expect("valid filename regex"));
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

#[derive(Debug, Clone)]
struct CurrentContent {
    markdown: String,
    action: ActionKind,
}

/// Exports the current content as Markdown or PDF.
pub struct DownloadManager {
    backend: Arc<dyn AdaptationBackend>,
    current: Mutex<Option<CurrentContent>>,
    payload: PdfPayload,
    preview_ttl: Duration,
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("payload", &self.payload)
            .field("preview_ttl", &self.preview_ttl)
            .finish_non_exhaustive()
    }
}

impl DownloadManager {
    pub fn new(backend: Arc<dyn AdaptationBackend>, config: &AdapterConfig) -> Self {
        Self {
            backend,
            current: Mutex::new(None),
            payload: config.pdf_payload,
            preview_ttl: Duration::from_secs(config.preview_ttl_secs),
        }
    }

    /// Replace the tracked content.
    pub fn set_current(&self, markdown: impl Into<String>, action: ActionKind) {
        *self.slot() = Some(CurrentContent {
            markdown: markdown.into(),
            action,
        });
    }

    pub fn clear(&self) {
        *self.slot() = None;
    }

    /// The tracked canonical Markdown, if any.
    pub fn current_markdown(&self) -> Option<String> {
        self.slot().as_ref().map(|c| c.markdown.clone())
    }

    /// File name for the current content with extension `ext` (no dot).
    pub fn filename(&self, ext: &str) -> Result<String, CvAdaptError> {
        let current = self.require_current()?;
        Ok(filename_for(&current.markdown, current.action, ext))
    }

    /// Write the canonical Markdown to `dir/{filename}.md`.
    pub async fn export_markdown(&self, dir: &Path) -> Result<PathBuf, CvAdaptError> {
        let current = self.require_current()?;
        let path = dir.join(filename_for(&current.markdown, current.action, "md"));
        write_atomic(&path, current.markdown.as_bytes()).await?;
        info!("Wrote {}", path.display());
        Ok(path)
    }

    /// Have the service rasterise the content and write `dir/{filename}.pdf`.
    pub async fn download_pdf(&self, dir: &Path) -> Result<PathBuf, CvAdaptError> {
        let current = self.require_current()?;
        let bytes = self.render_pdf(&current).await?;
        let path = dir.join(filename_for(&current.markdown, current.action, "pdf"));
        write_atomic(&path, &bytes).await?;
        info!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Render the content to a temporary PDF that is deleted once the
    /// preview lifetime has passed (see [`PdfPreview::expire`]).
    pub async fn preview_pdf(&self) -> Result<PdfPreview, CvAdaptError> {
        let current = self.require_current()?;
        let bytes = self.render_pdf(&current).await?;

        let mut tmp = tempfile::Builder::new()
            .prefix("cv-preview-")
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| CvAdaptError::Internal(format!("tempfile: {e}")))?;
        tmp.write_all(&bytes)
            .map_err(|e| CvAdaptError::Internal(format!("tempfile write: {e}")))?;
        let path = tmp.into_temp_path();
        debug!("Preview written to {}", path.display());

        Ok(PdfPreview {
            path,
            created: Instant::now(),
            ttl: self.preview_ttl,
        })
    }

    async fn render_pdf(&self, current: &CurrentContent) -> Result<bytes::Bytes, CvAdaptError> {
        let source = match self.payload {
            PdfPayload::Html => PdfSource::Html(markdown_to_html(&current.markdown)),
            PdfPayload::Markdown => PdfSource::Markdown(current.markdown.clone()),
        };
        self.backend.convert_to_pdf(&source).await
    }

    fn require_current(&self) -> Result<CurrentContent, CvAdaptError> {
        self.slot()
            .clone()
            .filter(|c| !c.markdown.is_empty())
            .ok_or(CvAdaptError::NoContent)
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<CurrentContent>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A PDF preview on disk. The file is removed when this value is dropped.
#[derive(Debug)]
pub struct PdfPreview {
    path: tempfile::TempPath,
    created: Instant,
    ttl: Duration,
}

impl PdfPreview {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Time left before [`expire`](Self::expire) deletes the file.
    pub fn remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.created.elapsed())
    }

    /// Launch the platform viewer on the file. Best effort.
    pub fn open_viewer(&self) -> Result<(), CvAdaptError> {
        let path = self.path();
        let mut cmd = if cfg!(target_os = "macos") {
            std::process::Command::new("open")
        } else if cfg!(target_os = "windows") {
            let mut c = std::process::Command::new("cmd");
            c.args(["/C", "start", ""]);
            c
        } else {
            std::process::Command::new("xdg-open")
        };
        cmd.arg(path)
            .spawn()
            .map(|_| ())
            .map_err(|e| CvAdaptError::Internal(format!("could not open viewer: {e}")))
    }

    /// Wait out the preview lifetime, then delete the file.
    pub async fn expire(self) {
        tokio::time::sleep(self.remaining()).await;
        let shown = self.path.display().to_string();
        if let Err(e) = self.path.close() {
            warn!("Could not remove preview {}: {}", shown, e);
        } else {
            debug!("Preview {} released", shown);
        }
    }
}

// ── File names ───────────────────────────────────────────────────────────

/// File name for `content` produced by `action`, with extension `ext`.
pub fn filename_for(markdown: &str, action: ActionKind, ext: &str) -> String {
    if action == ActionKind::CoverLetter {
        return format!("cover_letter.{ext}");
    }
    let (name, role) = extract_name_and_role(markdown);
    format!("{}_{}.{ext}", slug(&name), slug(&role))
}

/// Name and role from the first two non-empty lines of Markdown content,
/// markup stripped. Falls back to `CV` / `Document`.
pub fn extract_name_and_role(markdown: &str) -> (String, String) {
    name_and_role(&parse_markdown(markdown))
}

/// Same as [`extract_name_and_role`], reading rendered HTML.
pub fn extract_name_and_role_html(html: &str) -> (String, String) {
    name_and_role(&parse_html(html))
}

fn name_and_role(doc: &Document) -> (String, String) {
    let lines = doc.plain_lines();
    let mut non_empty = lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty());
    let name = clean(non_empty.next(), "CV");
    let role = clean(non_empty.next(), "Document");
    (name, role)
}

fn clean(line: Option<&str>, fallback: &str) -> String {
    let cleaned = line
        .map(|l| RE_UNSAFE.replace_all(l, "").trim().to_string())
        .unwrap_or_default();
    if cleaned.chars().count() < 2 {
        fallback.to_string()
    } else {
        cleaned
    }
}

fn slug(s: &str) -> String {
    RE_SPACES.replace_all(s, "_").to_lowercase()
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CvAdaptError> {
    let failed = |e| CvAdaptError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(failed)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, bytes).await.map_err(failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(failed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AdaptationRequest;
    use crate::output::AdaptationResult;
    use async_trait::async_trait;
    use bytes::Bytes;

    struct PdfOnly {
        seen: Mutex<Vec<PdfSource>>,
    }

    #[async_trait]
    impl AdaptationBackend for PdfOnly {
        async fn process(&self, _: &AdaptationRequest) -> Result<AdaptationResult, CvAdaptError> {
            Err(CvAdaptError::Internal("unused".into()))
        }

        async fn convert_to_pdf(&self, source: &PdfSource) -> Result<Bytes, CvAdaptError> {
            self.seen.lock().unwrap().push(source.clone());
            Ok(Bytes::from_static(b"%PDF-1.7 fake"))
        }
    }

    fn manager(config: &AdapterConfig) -> (Arc<PdfOnly>, DownloadManager) {
        let backend = Arc::new(PdfOnly {
            seen: Mutex::new(Vec::new()),
        });
        let m = DownloadManager::new(backend.clone(), config);
        (backend, m)
    }

    #[test]
    fn name_and_role_from_markdown() {
        assert_eq!(
            filename_for("# Jane Doe\n## Senior Rust Engineer\n\nBody", ActionKind::AdaptCv, "md"),
            "jane_doe_senior_rust_engineer.md"
        );
        assert_eq!(
            filename_for("\n\n**Jöhn O'Neil**\n*Dev-Ops (Lead)*", ActionKind::GeneralPurpose, "pdf"),
            "jhn_oneil_dev-ops_lead.pdf"
        );
    }

    #[test]
    fn fallbacks_for_short_lines() {
        assert_eq!(filename_for("# J\n", ActionKind::AdaptCv, "md"), "cv_document.md");
        assert_eq!(filename_for("# Jane", ActionKind::AdaptCv, "md"), "jane_document.md");
    }

    #[test]
    fn cover_letter_name_is_fixed() {
        assert_eq!(
            filename_for("# Jane Doe\n## Engineer", ActionKind::CoverLetter, "md"),
            "cover_letter.md"
        );
        assert_eq!(filename_for("", ActionKind::CoverLetter, "pdf"), "cover_letter.pdf");
    }

    #[test]
    fn html_variant_matches() {
        assert_eq!(
            extract_name_and_role_html("<h1>Jane Doe</h1>\n<h2>Data <em>Scientist</em></h2>"),
            ("Jane Doe".to_string(), "Data Scientist".to_string())
        );
    }

    #[tokio::test]
    async fn nothing_to_download_is_an_error() {
        let (_, m) = manager(&AdapterConfig::default());
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(m.filename("md"), Err(CvAdaptError::NoContent)));
        assert!(matches!(
            m.export_markdown(dir.path()).await,
            Err(CvAdaptError::NoContent)
        ));
        assert!(matches!(m.preview_pdf().await, Err(CvAdaptError::NoContent)));
    }

    #[tokio::test]
    async fn export_writes_canonical_markdown() {
        let (_, m) = manager(&AdapterConfig::default());
        m.set_current("# Jane Doe\n## Engineer", ActionKind::AdaptCv);
        let dir = tempfile::tempdir().unwrap();
        let path = m.export_markdown(dir.path()).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "jane_doe_engineer.md");
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "# Jane Doe\n## Engineer"
        );
    }

    #[tokio::test]
    async fn pdf_payload_follows_config() {
        let config = AdapterConfig::builder()
            .pdf_payload(PdfPayload::Markdown)
            .build()
            .unwrap();
        let (backend, m) = manager(&config);
        m.set_current("Dear team", ActionKind::CoverLetter);
        let dir = tempfile::tempdir().unwrap();
        let path = m.download_pdf(dir.path()).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "cover_letter.pdf");
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7 fake");
        assert_eq!(
            backend.seen.lock().unwrap()[0],
            PdfSource::Markdown("Dear team".into())
        );

        let (backend, m) = manager(&AdapterConfig::default());
        m.set_current("# Jane", ActionKind::AdaptCv);
        m.download_pdf(dir.path()).await.unwrap();
        assert_eq!(
            backend.seen.lock().unwrap()[0],
            PdfSource::Html("<h1>Jane</h1>".into())
        );
    }

    #[tokio::test]
    async fn preview_is_released_after_ttl() {
        let config = AdapterConfig::builder().preview_ttl_secs(0).build().unwrap();
        let (_, m) = manager(&config);
        m.set_current("# Jane", ActionKind::AdaptCv);
        let preview = m.preview_pdf().await.unwrap();
        let path = preview.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "pdf");

        preview.expire().await;
        assert!(!path.exists());
    }
}
