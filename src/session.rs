//! The adaptation session: one user's file, job URL, action and result.
//!
//! [`Session`] composes the pieces that a front-end would otherwise wire
//! together by hand:
//!
//! ```text
//!  select_upload / select_cached ──▶ FileSelection ──▶ ContentCache
//!  set_job_url ──▶ validate_job_url
//!  process ──▶ AdaptationBackend ──▶ normalize_content ──▶ presenter::render
//!                                                              │
//!  edit_content ──▶ EditableContent::input ──▶ DownloadManager ◀┘
//! ```
//!
//! Collaborators (backend, cache, observer) are injected, so tests run a
//! session against a fake backend and an in-memory cache.
//!
//! Only one request runs at a time: a `process` call made while another is
//! loading is rejected with [`CvAdaptError::RequestInFlight`]. The phase
//! always returns to [`Phase::Idle`] when a request ends, including when the
//! future is dropped mid-flight.

use crate::cache::{CachedDocument, ContentCache};
use crate::client::{AdaptationBackend, AdaptationRequest, HttpAdaptationClient};
use crate::config::{ActionKind, AdapterConfig};
use crate::download::DownloadManager;
use crate::error::CvAdaptError;
use crate::job_url::validate_job_url;
use crate::observer::{NoopObserver, SessionObserver};
use crate::output::{AdaptationResult, ProcessOutput, ProcessStats};
use crate::postprocess::normalize_content;
use crate::presenter::{self, ChangeListener, RenderedResult};
use crate::selection::{FileSelection, SelectedFile, SelectionSource};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Shown when a failure carries no message of its own.
pub const GENERIC_ERROR: &str = "An error occurred while processing your request. Please try again.";

/// Whether a request is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
}

struct State {
    selection: FileSelection,
    job_url: String,
    job_url_valid: bool,
    action: ActionKind,
    instructions: String,
    phase: Phase,
    rendered: Option<RenderedResult>,
}

/// One adaptation session.
pub struct Session {
    config: AdapterConfig,
    backend: Arc<dyn AdaptationBackend>,
    cache: Arc<ContentCache>,
    observer: Arc<dyn SessionObserver>,
    downloads: Arc<DownloadManager>,
    state: Mutex<State>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("service_url", &self.config.service_url)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(
        config: AdapterConfig,
        backend: Arc<dyn AdaptationBackend>,
        cache: Arc<ContentCache>,
    ) -> Self {
        let downloads = Arc::new(DownloadManager::new(backend.clone(), &config));
        let state = State {
            selection: FileSelection::new(cache.clone(), &config),
            job_url: String::new(),
            job_url_valid: false,
            action: ActionKind::default(),
            instructions: String::new(),
            phase: Phase::Idle,
            rendered: None,
        };
        Self {
            config,
            backend,
            cache,
            observer: Arc::new(NoopObserver),
            downloads,
            state: Mutex::new(state),
        }
    }

    /// Session over HTTP with the file-backed cache from `config`.
    pub fn connect(config: AdapterConfig) -> Result<Self, CvAdaptError> {
        let backend: Arc<dyn AdaptationBackend> = Arc::new(HttpAdaptationClient::new(&config)?);
        let cache = Arc::new(ContentCache::from_config(&config));
        Ok(Self::new(config, backend, cache))
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    // ── Inputs ───────────────────────────────────────────────────────────

    /// Select an uploaded file (validated, cached on first sight).
    pub fn select_upload(&self, file: SelectedFile) -> Result<(), CvAdaptError> {
        let result = self.lock().selection.choose_upload(file);
        self.notify_enabled();
        result
    }

    /// Select a file from disk.
    pub fn select_upload_path(&self, path: &Path) -> Result<(), CvAdaptError> {
        let result = self.lock().selection.choose_upload_path(path);
        self.notify_enabled();
        result
    }

    /// Select a previously cached file by name.
    pub fn select_cached(&self, file_name: &str) -> Result<(), CvAdaptError> {
        let result = self.lock().selection.choose_cached(file_name);
        self.notify_enabled();
        result
    }

    /// Wipe the cache. The caller is responsible for asking the user first.
    pub fn clear_cache(&self) -> bool {
        let cleared = self.cache.clear_all();
        if cleared {
            self.lock().selection.on_cache_cleared();
            self.notify_enabled();
        }
        cleared
    }

    /// Record the job URL and return whether it is acceptable.
    pub fn set_job_url(&self, raw: &str) -> bool {
        let valid = match validate_job_url(raw, &self.config.allowed_domains) {
            Ok(_) => true,
            Err(e) => {
                debug!("Job URL not accepted: {}", e);
                false
            }
        };
        {
            let mut st = self.lock();
            st.job_url = raw.trim().to_string();
            st.job_url_valid = valid;
        }
        self.notify_enabled();
        valid
    }

    pub fn set_action(&self, action: ActionKind) {
        self.lock().action = action;
    }

    pub fn action(&self) -> ActionKind {
        self.lock().action
    }

    pub fn set_instructions(&self, text: impl Into<String>) {
        self.lock().instructions = text.into();
    }

    /// True when a file is selected and the job URL is valid.
    pub fn can_process(&self) -> bool {
        let st = self.lock();
        st.selection.current_file().is_some() && st.job_url_valid
    }

    pub fn current_file_name(&self) -> Option<String> {
        self.lock()
            .selection
            .current_file()
            .map(|f| f.file_name.clone())
    }

    pub fn selection_source(&self) -> Option<SelectionSource> {
        self.lock().selection.source()
    }

    /// The file-selection rejection message, while still visible.
    pub fn selection_error(&self) -> Option<String> {
        self.lock().selection.active_error().map(str::to_string)
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn cached_documents(&self) -> Vec<CachedDocument> {
        self.cache.list_all()
    }

    // ── Processing ───────────────────────────────────────────────────────

    /// Send the selected file and job URL to the service for the current
    /// action, then present the result.
    ///
    /// Validation failures (missing file or URL, missing instructions for
    /// the general-purpose action) are reported without any network call.
    /// Every failure is also passed to the observer as one message.
    pub async fn process(&self) -> Result<ProcessOutput, CvAdaptError> {
        let request = match self.begin() {
            Ok(r) => r,
            Err(CvAdaptError::RequestInFlight) => {
                warn!("process() called while a request is in flight");
                return Err(CvAdaptError::RequestInFlight);
            }
            Err(e) => {
                self.observer.on_error(&e.to_string());
                return Err(e);
            }
        };
        let _loading = LoadingGuard { session: self };
        let action = request.action;

        self.observer.on_error_cleared();
        self.observer.on_loading_start(action);
        info!("{}", action.loading_message());

        let started = Instant::now();
        let outcome = self.backend.process(&request).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                info!("{} completed in {} ms", action, duration_ms);
                Ok(self.present(result, duration_ms))
            }
            Err(e) => {
                let message = e.to_string();
                let message = if message.trim().is_empty() {
                    GENERIC_ERROR.to_string()
                } else {
                    message
                };
                warn!("{} failed: {}", action, message);
                self.observer.on_error(&message);
                Err(e)
            }
        }
    }

    fn begin(&self) -> Result<AdaptationRequest, CvAdaptError> {
        let mut st = self.lock();
        let file = match (st.selection.current_file(), st.job_url_valid) {
            (Some(f), true) => f.clone(),
            _ => return Err(CvAdaptError::MissingInputs),
        };
        let instructions = st.instructions.trim().to_string();
        if st.action.requires_instructions() && instructions.is_empty() {
            return Err(CvAdaptError::MissingInstructions);
        }
        if st.phase == Phase::Loading {
            return Err(CvAdaptError::RequestInFlight);
        }
        st.phase = Phase::Loading;

        Ok(AdaptationRequest {
            action: st.action,
            file,
            job_url: st.job_url.clone(),
            instructions: (!instructions.is_empty()).then_some(instructions),
        })
    }

    fn present(&self, result: AdaptationResult, duration_ms: u64) -> ProcessOutput {
        let action = result.action;
        let result = AdaptationResult {
            content: normalize_content(&result.content),
            ..result
        };

        let downloads = self.downloads.clone();
        let listener: ChangeListener = Box::new(move |md: &str| downloads.set_current(md, action));
        let rendered = presenter::render(&result, Some(listener));
        self.downloads
            .set_current(rendered.content.markdown(), action);

        let output = rendered.to_output(ProcessStats {
            original_cv_length: result.original_cv_length,
            job_description_length: result.job_description_length,
            duration_ms,
        });
        self.lock().rendered = Some(rendered);
        self.observer.on_result(&output);
        output
    }

    // ── Result ───────────────────────────────────────────────────────────

    /// Apply an edit to the rendered content; returns the new canonical
    /// Markdown, which downloads now export.
    pub fn edit_content(&self, html: &str) -> Result<String, CvAdaptError> {
        let mut st = self.lock();
        let rendered = st.rendered.as_mut().ok_or(CvAdaptError::NoContent)?;
        Ok(rendered.content.input(html).to_string())
    }

    /// Canonical Markdown of the current result.
    pub fn current_content(&self) -> Option<String> {
        self.lock()
            .rendered
            .as_ref()
            .map(|r| r.content.markdown().to_string())
    }

    /// Rendered HTML of the current result.
    pub fn current_html(&self) -> Option<String> {
        self.lock()
            .rendered
            .as_ref()
            .map(|r| r.content.html().to_string())
    }

    /// Standalone HTML results page for the current result.
    pub fn results_page(&self) -> Option<String> {
        self.lock().rendered.as_ref().map(RenderedResult::to_html_page)
    }

    pub fn downloads(&self) -> Arc<DownloadManager> {
        self.downloads.clone()
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify_enabled(&self) {
        let enabled = self.can_process();
        self.observer.on_process_enabled(enabled);
    }
}

/// Restores [`Phase::Idle`] when a request ends, however it ends.
struct LoadingGuard<'a> {
    session: &'a Session,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.session.lock().phase = Phase::Idle;
        self.session.observer.on_loading_end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::client::PdfSource;
    use async_trait::async_trait;
    use bytes::Bytes;

    struct Echo;

    #[async_trait]
    impl AdaptationBackend for Echo {
        async fn process(&self, r: &AdaptationRequest) -> Result<AdaptationResult, CvAdaptError> {
            Ok(AdaptationResult {
                action: r.action,
                content: "```markdown\n# Jane Doe\n## Engineer\n```".into(),
                job_description: Some("ABOUT".into()),
                original_cv_length: Some(r.file.size()),
                job_description_length: Some(5),
            })
        }

        async fn convert_to_pdf(&self, _: &PdfSource) -> Result<Bytes, CvAdaptError> {
            Ok(Bytes::from_static(b"%PDF"))
        }
    }

    fn session() -> Session {
        let config = AdapterConfig::default();
        let cache = Arc::new(ContentCache::with_store(MemoryStore::new(), &config));
        Session::new(config, Arc::new(Echo), cache)
    }

    #[test]
    fn can_process_needs_file_and_url() {
        let s = session();
        assert!(!s.can_process());
        s.select_upload(SelectedFile::new("cv.txt", "text/plain", &b"Jane"[..]))
            .unwrap();
        assert!(!s.can_process());
        assert!(!s.set_job_url("https://example.com/job"));
        assert!(!s.can_process());
        assert!(s.set_job_url("https://www.linkedin.com/jobs/view/1"));
        assert!(s.can_process());
    }

    #[tokio::test]
    async fn missing_inputs_is_reported() {
        let s = session();
        let err = s.process().await.unwrap_err();
        assert_eq!(err.to_string(), "Please provide both a CV file and job URL.");
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn result_is_cleaned_and_tracked_for_download() {
        let s = session();
        s.select_upload(SelectedFile::new("cv.txt", "text/plain", &b"Jane"[..]))
            .unwrap();
        s.set_job_url("https://uk.indeed.com/viewjob?jk=1");
        let out = s.process().await.unwrap();
        assert_eq!(out.markdown, "# Jane Doe\n## Engineer");
        assert_eq!(out.stats.original_cv_length, Some(4));
        assert_eq!(out.job_description_html, "<h3>ABOUT</h3>");
        assert_eq!(
            s.downloads().filename("md").unwrap(),
            "jane_doe_engineer.md"
        );

        let md = s
            .edit_content("<h1>John Roe</h1><h2>Architect</h2>")
            .unwrap();
        assert_eq!(md, "# John Roe\n## Architect");
        assert_eq!(s.current_content().as_deref(), Some("# John Roe\n## Architect"));
        assert_eq!(
            s.downloads().filename("pdf").unwrap(),
            "john_roe_architect.pdf"
        );
    }

    #[test]
    fn edit_without_result_is_no_content() {
        let s = session();
        assert!(matches!(s.edit_content("<p>x</p>"), Err(CvAdaptError::NoContent)));
    }

    #[test]
    fn clearing_cache_drops_cached_selection() {
        let s = session();
        s.select_upload(SelectedFile::new("cv.txt", "text/plain", &b"Jane"[..]))
            .unwrap();
        s.select_cached("cv.txt").unwrap();
        assert_eq!(s.selection_source(), Some(SelectionSource::Cache));
        assert!(s.clear_cache());
        assert!(s.current_file_name().is_none());
        assert!(s.cached_documents().is_empty());
    }
}
