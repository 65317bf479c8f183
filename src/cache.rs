//! Local content cache for uploaded CV files.
//!
//! Uploads are kept as base64 in one JSON array under a single storage key
//! (one file on disk, `cv_original_cache.json`) so a CV can be reused
//! without picking the file again. The cache is bounded (newest first,
//! oldest evicted past `max_entries`) and entries expire lazily: anything
//! older than the retention window is filtered out on every read and
//! dropped on the next write.
//!
//! Failures never escape: every [`CacheError`] is logged and turned into
//! "nothing stored" / "nothing found". There is no locking; two processes
//! writing at once may lose one of the writes.

use crate::config::AdapterConfig;
use crate::error::{CacheError, CvAdaptError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// File name of the storage key inside the cache directory.
pub const CACHE_FILE_NAME: &str = "cv_original_cache.json";

/// Free-form facts about the upload, kept alongside the bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// One cached upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedDocument {
    /// Display id derived from the file name; see [`cache_id`].
    pub id: String,
    pub file_name: String,
    /// The upload's bytes, base64 (standard alphabet, padded).
    pub original_content: String,
    /// Creation time, stored as milliseconds since the epoch.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: CacheMetadata,
}

impl CachedDocument {
    /// Decode the stored payload back to the original bytes.
    pub fn decode(&self) -> Result<Vec<u8>, CvAdaptError> {
        STANDARD
            .decode(self.original_content.as_bytes())
            .map_err(|e| {
                warn!("Cached document '{}' does not decode: {}", self.file_name, e);
                CvAdaptError::CorruptCacheEntry {
                    file_name: self.file_name.clone(),
                }
            })
    }
}

/// Display id for a file name: `original_cv_` followed by the base-36
/// magnitude of a wrapping 32-bit `h * 31 + c` hash over UTF-16 units.
///
/// Identity in the cache is the file name itself; the id only labels entries.
pub fn cache_id(file_name: &str) -> String {
    let hash = file_name
        .encode_utf16()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(i32::from(c)));
    format!("original_cv_{}", to_base36(hash.unsigned_abs()))
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

// ── Storage backends ─────────────────────────────────────────────────────

/// A single storage key holding the serialised cache.
pub trait CacheStore: Send + Sync {
    /// Current contents, or `None` when the key has never been written.
    fn load(&self) -> Result<Option<String>, CacheError>;

    /// Replace the contents.
    fn store(&self, contents: &str) -> Result<(), CacheError>;

    /// Remove the key entirely.
    fn clear(&self) -> Result<(), CacheError>;
}

/// File-backed store. Writes go to a temp file in the same directory and
/// are renamed over the target, so readers never see a partial file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `dir/cv_original_cache.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(CACHE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for FileStore {
    fn load(&self) -> Result<Option<String>, CacheError> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Read(e)),
        }
    }

    fn store(&self, contents: &str) -> Result<(), CacheError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(CacheError::Write)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(CacheError::Write)?;
        tmp.write_all(contents.as_bytes())
            .map_err(CacheError::Write)?;
        tmp.persist(&self.path)
            .map_err(|e| CacheError::Write(e.error))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Write(e)),
        }
    }
}

/// In-memory store with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Option<String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes larger than `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            data: Mutex::new(None),
            quota: Some(bytes),
        }
    }

    /// Store with pre-existing raw contents.
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            data: Mutex::new(Some(contents.into())),
            quota: None,
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CacheStore for MemoryStore {
    fn load(&self) -> Result<Option<String>, CacheError> {
        Ok(self.slot().clone())
    }

    fn store(&self, contents: &str) -> Result<(), CacheError> {
        if let Some(quota) = self.quota {
            if contents.len() > quota {
                return Err(CacheError::QuotaExceeded {
                    needed: contents.len(),
                    quota,
                });
            }
        }
        *self.slot() = Some(contents.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        *self.slot() = None;
        Ok(())
    }
}

// ── ContentCache ─────────────────────────────────────────────────────────

/// Bounded, expiring cache of uploaded files keyed by file name.
pub struct ContentCache {
    store: Box<dyn CacheStore>,
    max_entries: usize,
    retention: Duration,
}

impl std::fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("max_entries", &self.max_entries)
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

impl ContentCache {
    pub fn new(store: impl CacheStore + 'static, max_entries: usize, retention_days: i64) -> Self {
        Self {
            store: Box::new(store),
            max_entries: max_entries.max(1),
            retention: Duration::days(retention_days.max(1)),
        }
    }

    /// File-backed cache in the configured (or default) cache directory.
    pub fn from_config(config: &AdapterConfig) -> Self {
        let store = FileStore::in_dir(config.resolved_cache_dir());
        debug!("Cache file: {}", store.path().display());
        Self::with_store(store, config)
    }

    /// Cache over an arbitrary store, bounds taken from `config`.
    pub fn with_store(store: impl CacheStore + 'static, config: &AdapterConfig) -> Self {
        Self::new(store, config.cache_max_entries, config.cache_retention_days)
    }

    /// Persist an upload, replacing any entry with the same file name.
    ///
    /// Returns the entry's id, or `None` if the write failed.
    pub fn save(&self, bytes: &[u8], file_name: &str, metadata: CacheMetadata) -> Option<String> {
        self.save_at(bytes, file_name, metadata, Utc::now())
    }

    /// Freshest non-expired entry for `file_name`.
    pub fn get(&self, file_name: &str) -> Option<CachedDocument> {
        self.get_at(file_name, Utc::now())
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.get(file_name).is_some()
    }

    /// All non-expired entries, newest first.
    pub fn list_all(&self) -> Vec<CachedDocument> {
        self.list_at(Utc::now())
    }

    /// Remove every entry. Irreversible; callers confirm with the user first.
    pub fn clear_all(&self) -> bool {
        match self.store.clear() {
            Ok(()) => {
                info!("Cleared document cache");
                true
            }
            Err(e) => {
                warn!("Error clearing document cache: {}", e);
                false
            }
        }
    }

    pub(crate) fn save_at(
        &self,
        bytes: &[u8],
        file_name: &str,
        metadata: CacheMetadata,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let entry = CachedDocument {
            id: cache_id(file_name),
            file_name: file_name.to_string(),
            original_content: STANDARD.encode(bytes),
            timestamp: now,
            metadata,
        };
        let id = entry.id.clone();

        let mut entries = self.list_at(now);
        entries.retain(|e| e.file_name != file_name);
        entries.insert(0, entry);
        entries.truncate(self.max_entries);

        let json = match serde_json::to_string(&entries) {
            Ok(j) => j,
            Err(e) => {
                warn!("Error serialising document cache: {}", e);
                return None;
            }
        };
        match self.store.store(&json) {
            Ok(()) => {
                debug!("Cached '{}' as {} ({} entries)", file_name, id, entries.len());
                Some(id)
            }
            Err(e) => {
                warn!("Error saving '{}' to document cache: {}", file_name, e);
                None
            }
        }
    }

    pub(crate) fn get_at(&self, file_name: &str, now: DateTime<Utc>) -> Option<CachedDocument> {
        self.list_at(now)
            .into_iter()
            .find(|e| e.file_name == file_name)
    }

    pub(crate) fn list_at(&self, now: DateTime<Utc>) -> Vec<CachedDocument> {
        match self.read_fresh(now) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Error reading document cache: {}", e);
                Vec::new()
            }
        }
    }

    fn read_fresh(&self, now: DateTime<Utc>) -> Result<Vec<CachedDocument>, CacheError> {
        let Some(raw) = self.store.load()? else {
            return Ok(Vec::new());
        };
        let entries: Vec<CachedDocument> =
            serde_json::from_str(&raw).map_err(|e| CacheError::Corrupt(e.to_string()))?;
        Ok(entries
            .into_iter()
            .filter(|e| now - e.timestamp < self.retention)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ContentCache {
        ContentCache::new(MemoryStore::new(), 10, 7)
    }

    fn meta() -> CacheMetadata {
        CacheMetadata {
            mime_type: Some("text/plain".into()),
            size_bytes: Some(5),
        }
    }

    #[test]
    fn id_is_rolling_hash_base36() {
        assert_eq!(cache_id("a"), "original_cv_2p");
        assert_eq!(cache_id("ab"), "original_cv_2e9");
        assert_eq!(cache_id(""), "original_cv_0");
        assert_eq!(cache_id("cv.pdf"), cache_id("cv.pdf"));
    }

    #[test]
    fn save_then_get_roundtrips_bytes() {
        let c = cache();
        let id = c.save(b"hello", "cv.txt", meta()).unwrap();
        assert_eq!(id, cache_id("cv.txt"));
        let doc = c.get("cv.txt").unwrap();
        assert_eq!(doc.decode().unwrap(), b"hello");
        assert_eq!(doc.metadata, meta());
    }

    #[test]
    fn same_name_supersedes() {
        let c = cache();
        c.save(b"one", "cv.txt", meta());
        c.save(b"two", "cv.txt", meta());
        let all = c.list_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].decode().unwrap(), b"two");
    }

    #[test]
    fn eleventh_save_evicts_oldest() {
        let c = cache();
        let t0 = Utc::now();
        for i in 0..11 {
            c.save_at(b"x", &format!("cv{i}.txt"), meta(), t0 + Duration::seconds(i));
        }
        let all = c.list_at(t0 + Duration::seconds(20));
        assert_eq!(all.len(), 10);
        assert_eq!(all[0].file_name, "cv10.txt");
        assert!(all.iter().all(|e| e.file_name != "cv0.txt"));
        assert!(all.iter().any(|e| e.file_name == "cv1.txt"));
    }

    #[test]
    fn entries_expire_after_retention() {
        let c = cache();
        let t0 = Utc::now();
        c.save_at(b"x", "old.txt", meta(), t0);
        assert!(c.get_at("old.txt", t0 + Duration::days(7) - Duration::seconds(1)).is_some());
        assert!(c.get_at("old.txt", t0 + Duration::days(7)).is_none());
    }

    #[test]
    fn expired_entries_dropped_on_next_write() {
        let store = std::sync::Arc::new(MemoryStore::new());
        struct Shared(std::sync::Arc<MemoryStore>);
        impl CacheStore for Shared {
            fn load(&self) -> Result<Option<String>, CacheError> {
                self.0.load()
            }
            fn store(&self, contents: &str) -> Result<(), CacheError> {
                self.0.store(contents)
            }
            fn clear(&self) -> Result<(), CacheError> {
                self.0.clear()
            }
        }
        let c = ContentCache::new(Shared(store.clone()), 10, 7);
        let t0 = Utc::now();
        c.save_at(b"x", "old.txt", meta(), t0);
        c.save_at(b"y", "new.txt", meta(), t0 + Duration::days(8));
        let raw = store.load().unwrap().unwrap();
        assert!(!raw.contains("old.txt"));
        assert!(raw.contains("new.txt"));
    }

    #[test]
    fn quota_failure_returns_none_and_keeps_previous() {
        let c = ContentCache::new(MemoryStore::with_quota(400), 10, 7);
        assert!(c.save(b"small", "a.txt", meta()).is_some());
        let big = vec![b'z'; 1000];
        assert!(c.save(&big, "b.txt", meta()).is_none());
        let all = c.list_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].file_name, "a.txt");
    }

    #[test]
    fn corrupt_storage_reads_as_empty() {
        let c = ContentCache::new(MemoryStore::with_contents("{not json"), 10, 7);
        assert!(c.list_all().is_empty());
        assert!(c.get("cv.txt").is_none());
        // The next save overwrites the corrupt key.
        assert!(c.save(b"x", "cv.txt", meta()).is_some());
        assert_eq!(c.list_all().len(), 1);
    }

    #[test]
    fn clear_all_removes_everything() {
        let c = cache();
        c.save(b"x", "a.txt", meta());
        assert!(c.clear_all());
        assert!(c.list_all().is_empty());
    }

    #[test]
    fn serialised_shape_uses_camel_case_and_millis() {
        let c = ContentCache::new(MemoryStore::new(), 10, 7);
        let t = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        c.save_at(b"hi", "cv.txt", meta(), t);
        let doc = c.get_at("cv.txt", t).unwrap();
        let v = serde_json::to_value(&doc).unwrap();
        assert_eq!(v["fileName"], "cv.txt");
        assert_eq!(v["originalContent"], "aGk=");
        assert_eq!(v["timestamp"], 1_700_000_000_123i64);
        assert_eq!(v["metadata"]["mimeType"], "text/plain");
    }

    #[test]
    fn corrupt_payload_fails_decode() {
        let doc = CachedDocument {
            id: cache_id("x"),
            file_name: "x".into(),
            original_content: "***".into(),
            timestamp: Utc::now(),
            metadata: CacheMetadata::default(),
        };
        assert!(matches!(
            doc.decode(),
            Err(CvAdaptError::CorruptCacheEntry { .. })
        ));
    }

    #[test]
    fn file_store_roundtrip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let c = ContentCache::new(FileStore::in_dir(dir.path().join("nested")), 10, 7);
        c.save(b"pdf-bytes", "cv.pdf", meta());
        assert!(dir.path().join("nested").join(CACHE_FILE_NAME).exists());
        assert_eq!(c.get("cv.pdf").unwrap().decode().unwrap(), b"pdf-bytes");
        assert!(c.clear_all());
        assert!(!dir.path().join("nested").join(CACHE_FILE_NAME).exists());
        // Clearing an absent key still succeeds.
        assert!(c.clear_all());
    }
}
