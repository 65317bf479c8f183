//! Active input file tracking.
//!
//! A session works on at most one CV at a time, either freshly uploaded or
//! restored from the [`ContentCache`]. Uploads are validated (type first,
//! then size) and persisted to the cache the first time a name is seen.
//! Rejections leave a short-lived inline error behind, as a form field
//! would.

use crate::cache::{CacheMetadata, ContentCache};
use crate::config::AdapterConfig;
use crate::error::CvAdaptError;
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long a rejection message stays visible.
pub const ERROR_VISIBLE_FOR: Duration = Duration::from_secs(3);

/// A file ready to be sent to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl SelectedFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Where the active file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    Upload,
    Cache,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    None,
    Selected {
        file: SelectedFile,
        source: SelectionSource,
    },
}

#[derive(Debug, Clone)]
struct TransientNotice {
    message: String,
    shown_at: Instant,
}

/// Tracks the active file and validates new uploads.
#[derive(Debug)]
pub struct FileSelection {
    cache: Arc<ContentCache>,
    allowed_mime_types: Vec<String>,
    max_file_size: u64,
    state: Selection,
    notice: Option<TransientNotice>,
}

impl FileSelection {
    pub fn new(cache: Arc<ContentCache>, config: &AdapterConfig) -> Self {
        Self {
            cache,
            allowed_mime_types: config.allowed_mime_types.clone(),
            max_file_size: config.max_file_size,
            state: Selection::None,
            notice: None,
        }
    }

    /// Validate and activate an uploaded file.
    ///
    /// On rejection the selection is cleared and the error message stays
    /// available from [`active_error`](Self::active_error) for three seconds.
    pub fn choose_upload(&mut self, file: SelectedFile) -> Result<(), CvAdaptError> {
        if let Err(e) = self.validate(&file.file_name, &file.mime_type, file.size()) {
            self.reject(&e);
            return Err(e);
        }
        self.notice = None;

        if !self.cache.contains(&file.file_name) {
            let metadata = CacheMetadata {
                mime_type: Some(file.mime_type.clone()),
                size_bytes: Some(file.size()),
            };
            if self.cache.save(&file.bytes, &file.file_name, metadata).is_none() {
                warn!("Upload '{}' was not cached", file.file_name);
            }
        }

        info!(
            "Selected upload '{}' ({} bytes, {})",
            file.file_name,
            file.size(),
            file.mime_type
        );
        self.state = Selection::Selected {
            file,
            source: SelectionSource::Upload,
        };
        Ok(())
    }

    /// Read a local file and activate it as an upload.
    ///
    /// The MIME type is guessed from the extension. Type and size are
    /// checked before the file is read.
    pub fn choose_upload_path(&mut self, path: &Path) -> Result<(), CvAdaptError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();

        let size = match std::fs::metadata(path) {
            Ok(m) if m.is_file() => m.len(),
            Ok(_) => {
                return Err(CvAdaptError::FileNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(map_io(path, e)),
        };
        if let Err(e) = self.validate(&file_name, &mime_type, size) {
            self.reject(&e);
            return Err(e);
        }

        let bytes = std::fs::read(path).map_err(|e| map_io(path, e))?;
        debug!("Read {} bytes from {}", bytes.len(), path.display());
        self.choose_upload(SelectedFile::new(file_name, mime_type, bytes))
    }

    /// Activate a previously cached file, replacing any upload.
    pub fn choose_cached(&mut self, file_name: &str) -> Result<(), CvAdaptError> {
        let doc = self
            .cache
            .get(file_name)
            .ok_or_else(|| CvAdaptError::NotCached {
                file_name: file_name.to_string(),
            })?;
        let bytes = doc.decode()?;
        let mime_type = doc
            .metadata
            .mime_type
            .clone()
            .or_else(|| mime_guess::from_path(file_name).first_raw().map(str::to_string))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        info!("Selected cached document '{}' ({})", file_name, doc.id);
        self.notice = None;
        self.state = Selection::Selected {
            file: SelectedFile::new(doc.file_name, mime_type, bytes),
            source: SelectionSource::Cache,
        };
        Ok(())
    }

    /// The cache was wiped: a cache-sourced selection is gone, an upload stays.
    pub fn on_cache_cleared(&mut self) {
        if self.source() == Some(SelectionSource::Cache) {
            debug!("Cache cleared; dropping cached selection");
            self.state = Selection::None;
        }
    }

    pub fn current_file(&self) -> Option<&SelectedFile> {
        match &self.state {
            Selection::Selected { file, .. } => Some(file),
            Selection::None => None,
        }
    }

    pub fn source(&self) -> Option<SelectionSource> {
        match &self.state {
            Selection::Selected { source, .. } => Some(*source),
            Selection::None => None,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.state
    }

    /// The last rejection message, while it is still visible.
    pub fn active_error(&self) -> Option<&str> {
        self.active_error_at(Instant::now())
    }

    fn active_error_at(&self, now: Instant) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|n| now.duration_since(n.shown_at) < ERROR_VISIBLE_FOR)
            .map(|n| n.message.as_str())
    }

    fn validate(&self, file_name: &str, mime_type: &str, size: u64) -> Result<(), CvAdaptError> {
        if !self.allowed_mime_types.iter().any(|m| m == mime_type) {
            return Err(CvAdaptError::UnsupportedFileType {
                file_name: file_name.to_string(),
                mime_type: mime_type.to_string(),
            });
        }
        if size > self.max_file_size {
            return Err(CvAdaptError::FileTooLarge {
                file_name: file_name.to_string(),
                size_bytes: size,
                max_bytes: self.max_file_size,
            });
        }
        Ok(())
    }

    fn reject(&mut self, error: &CvAdaptError) {
        warn!("Rejected file: {}", error);
        self.state = Selection::None;
        self.notice = Some(TransientNotice {
            message: error.to_string(),
            shown_at: Instant::now(),
        });
    }
}

fn map_io(path: &Path, e: std::io::Error) -> CvAdaptError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => CvAdaptError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => CvAdaptError::FileNotFound {
            path: path.to_path_buf(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    fn setup() -> (Arc<ContentCache>, FileSelection) {
        let config = AdapterConfig::default();
        let cache = Arc::new(ContentCache::with_store(MemoryStore::new(), &config));
        let sel = FileSelection::new(cache.clone(), &config);
        (cache, sel)
    }

    #[test]
    fn upload_is_selected_and_cached() {
        let (cache, mut sel) = setup();
        sel.choose_upload(SelectedFile::new("cv.txt", "text/plain", &b"Jane"[..]))
            .unwrap();
        assert_eq!(sel.source(), Some(SelectionSource::Upload));
        assert_eq!(sel.current_file().unwrap().file_name, "cv.txt");
        assert_eq!(cache.get("cv.txt").unwrap().decode().unwrap(), b"Jane");
    }

    #[test]
    fn existing_cache_entry_is_not_overwritten() {
        let (cache, mut sel) = setup();
        cache.save(b"first", "cv.txt", CacheMetadata::default());
        sel.choose_upload(SelectedFile::new("cv.txt", "text/plain", &b"second"[..]))
            .unwrap();
        assert_eq!(cache.get("cv.txt").unwrap().decode().unwrap(), b"first");
        // The selection itself carries the new bytes.
        assert_eq!(&sel.current_file().unwrap().bytes[..], b"second");
    }

    #[test]
    fn wrong_type_rejected_before_size() {
        let (_, mut sel) = setup();
        let big = vec![0u8; 11 * 1024 * 1024];
        let err = sel
            .choose_upload(SelectedFile::new("cv.docx", "application/msword", big))
            .unwrap_err();
        assert!(matches!(err, CvAdaptError::UnsupportedFileType { .. }));
        assert_eq!(sel.active_error(), Some("Please select a PDF or TXT file."));
        assert!(sel.current_file().is_none());
    }

    #[test]
    fn oversize_rejected_and_clears_previous() {
        let (_, mut sel) = setup();
        sel.choose_upload(SelectedFile::new("a.txt", "text/plain", &b"ok"[..]))
            .unwrap();
        let big = vec![0u8; 10 * 1024 * 1024 + 1];
        let err = sel
            .choose_upload(SelectedFile::new("b.pdf", "application/pdf", big))
            .unwrap_err();
        assert_eq!(err.to_string(), "File size must be less than 10MB.");
        assert!(sel.current_file().is_none());
    }

    #[test]
    fn exactly_max_size_is_accepted() {
        let (_, mut sel) = setup();
        let max = vec![0u8; 10 * 1024 * 1024];
        assert!(sel
            .choose_upload(SelectedFile::new("b.pdf", "application/pdf", max))
            .is_ok());
    }

    #[test]
    fn error_notice_expires() {
        let (_, mut sel) = setup();
        let _ = sel.choose_upload(SelectedFile::new("x.png", "image/png", &b""[..]));
        let later = Instant::now() + ERROR_VISIBLE_FOR + Duration::from_millis(1);
        assert!(sel.active_error().is_some());
        assert!(sel.active_error_at(later).is_none());
    }

    #[test]
    fn cached_selection_replaces_upload_and_clears_on_wipe() {
        let (cache, mut sel) = setup();
        cache.save(
            b"%PDF-1.4",
            "old.pdf",
            CacheMetadata {
                mime_type: Some("application/pdf".into()),
                size_bytes: Some(8),
            },
        );
        sel.choose_upload(SelectedFile::new("new.txt", "text/plain", &b"x"[..]))
            .unwrap();
        sel.choose_cached("old.pdf").unwrap();
        assert_eq!(sel.source(), Some(SelectionSource::Cache));
        let f = sel.current_file().unwrap();
        assert_eq!(f.mime_type, "application/pdf");
        assert_eq!(&f.bytes[..], b"%PDF-1.4");

        cache.clear_all();
        sel.on_cache_cleared();
        assert!(sel.current_file().is_none());
    }

    #[test]
    fn cache_wipe_keeps_upload() {
        let (_, mut sel) = setup();
        sel.choose_upload(SelectedFile::new("new.txt", "text/plain", &b"x"[..]))
            .unwrap();
        sel.on_cache_cleared();
        assert_eq!(sel.source(), Some(SelectionSource::Upload));
    }

    #[test]
    fn unknown_cached_name_errors() {
        let (_, mut sel) = setup();
        assert!(matches!(
            sel.choose_cached("nope.pdf"),
            Err(CvAdaptError::NotCached { .. })
        ));
    }

    #[test]
    fn upload_from_path_guesses_mime() {
        let (_, mut sel) = setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.txt");
        std::fs::write(&path, "Jane Doe").unwrap();
        sel.choose_upload_path(&path).unwrap();
        let f = sel.current_file().unwrap();
        assert_eq!(f.file_name, "resume.txt");
        assert_eq!(f.mime_type, "text/plain");
    }

    #[test]
    fn missing_path_is_file_not_found() {
        let (_, mut sel) = setup();
        let err = sel
            .choose_upload_path(Path::new("/definitely/not/here.pdf"))
            .unwrap_err();
        assert!(matches!(err, CvAdaptError::FileNotFound { .. }));
    }
}
