//! Disk-backed conditional cache for large vendor datasets
//!
//! Each resource key owns three files in the cache directory:
//!
//! ```text
//! <key>          payload (opaque vendor bytes)
//! <key>.etag     ETag of the stored payload
//! <key>.expires  freshness deadline, decimal Unix epoch seconds
//! ```
//!
//! Missing sidecars are a normal cold-cache state. Files are replaced by
//! writing a temporary sibling and renaming it over the target, so a reader
//! never observes a partially written payload. Refreshes are serialized per
//! key; callers that queued behind a refresh reuse its outcome instead of
//! contacting the server again, whether it succeeded or failed.

use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{ETAG, HeaderMap};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::http::fetch::{FetchError, FetchResponse};
use crate::http::freshness::{build_conditional_headers, compute_expiry};
use crate::version::error::CacheError;

/// Stored state of one cached resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub resource_key: String,
    pub payload_path: PathBuf,
    pub etag: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Modification time of the payload file
    pub last_modified: Option<DateTime<Utc>>,
}

/// How the returned payload was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Still inside its freshness window, or refreshed by a concurrent caller
    Fresh,
    /// Server answered `304 Not Modified`
    Revalidated,
    /// A new payload was downloaded
    Downloaded,
    /// Refresh failed; previously stored payload returned
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPayload {
    pub path: PathBuf,
    pub freshness: Freshness,
}

#[derive(Default)]
struct KeyState {
    /// Held for the duration of a refresh; holds the failure reason of the
    /// last attempt, `None` when it succeeded
    refresh: tokio::sync::Mutex<Option<String>>,
    /// Number of finished refresh attempts
    attempts: AtomicU64,
}

pub struct ConditionalCache {
    dir: PathBuf,
    keys: Mutex<HashMap<String, Arc<KeyState>>>,
}

impl ConditionalCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            keys: Mutex::new(HashMap::new()),
        }
    }

    pub fn payload_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn etag_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.etag"))
    }

    fn expiry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.expires"))
    }

    /// Acquire key map lock with proper error handling
    fn lock_keys(&self) -> Result<MutexGuard<'_, HashMap<String, Arc<KeyState>>>, CacheError> {
        self.keys.lock().map_err(|_| CacheError::LockPoisoned)
    }

    fn key_state(&self, key: &str) -> Result<Arc<KeyState>, CacheError> {
        let mut keys = self.lock_keys()?;
        Ok(Arc::clone(keys.entry(key.to_string()).or_default()))
    }

    /// Read the stored validators for `key`.
    ///
    /// Without a payload the sidecars are meaningless and are ignored.
    pub async fn load_entry(&self, key: &str) -> Result<CacheEntry, CacheError> {
        let payload_path = self.payload_path(key);

        let metadata = match fs::metadata(&payload_path).await {
            Ok(metadata) => Some(metadata),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let Some(metadata) = metadata else {
            return Ok(CacheEntry {
                resource_key: key.to_string(),
                payload_path,
                etag: None,
                expires_at: None,
                last_modified: None,
            });
        };

        let etag = read_sidecar(&self.etag_path(key)).await?;
        let expires_at = read_sidecar(&self.expiry_path(key))
            .await?
            .and_then(|value| parse_epoch(&value));

        Ok(CacheEntry {
            resource_key: key.to_string(),
            payload_path,
            etag,
            expires_at,
            last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    /// Return a usable local copy of `key`, refreshing it through `fetch`
    /// when its freshness window has elapsed.
    ///
    /// `fetch` receives the conditional request headers. A failed refresh
    /// falls back to the stored payload when one exists.
    pub async fn get_or_refresh<F, Fut>(
        &self,
        key: &str,
        fetch: F,
    ) -> Result<CachedPayload, CacheError>
    where
        F: FnOnce(HeaderMap) -> Fut,
        Fut: Future<Output = Result<FetchResponse, FetchError>>,
    {
        let state = self.key_state(key)?;
        let observed = state.attempts.load(Ordering::Acquire);
        let mut last_failure = state.refresh.lock().await;

        let entry = self.load_entry(key).await?;
        let has_payload = entry.last_modified.is_some() || fs::try_exists(&entry.payload_path).await?;

        if state.attempts.load(Ordering::Acquire) != observed {
            match last_failure.clone() {
                Some(reason) => {
                    debug!("Reusing failed refresh of {} from a concurrent request", key);
                    return self.fallback(key, entry.payload_path, has_payload, reason);
                }
                None if has_payload => {
                    debug!("Reusing {} refreshed by a concurrent request", key);
                    return Ok(CachedPayload {
                        path: entry.payload_path,
                        freshness: Freshness::Fresh,
                    });
                }
                None => {}
            }
        }

        if has_payload && entry.expires_at.is_some_and(|expiry| expiry > Utc::now()) {
            debug!("Skipping web request for {} due to valid cache", key);
            return Ok(CachedPayload {
                path: entry.payload_path,
                freshness: Freshness::Fresh,
            });
        }

        let headers = if has_payload {
            build_conditional_headers(&entry)
        } else {
            HeaderMap::new()
        };
        debug!("Refreshing {} with headers: {:?}", key, headers);

        let result = fetch(headers).await;
        let fetched_at = Utc::now();

        let outcome = match result {
            Ok(response) if response.status == StatusCode::NOT_MODIFIED && has_payload => self
                .revalidate(key, &response, fetched_at)
                .await
                .map(|()| Ok(Freshness::Revalidated)),
            Ok(response) if response.status.is_success() => self
                .store(key, &response, fetched_at)
                .await
                .map(|()| Ok(Freshness::Downloaded)),
            Ok(response) => Ok(Err(format!("unexpected status {}", response.status))),
            Err(e) => Ok(Err(e.to_string())),
        };

        *last_failure = match &outcome {
            Ok(Ok(_)) => None,
            Ok(Err(reason)) => Some(reason.clone()),
            Err(e) => Some(e.to_string()),
        };
        state.attempts.fetch_add(1, Ordering::Release);

        match outcome? {
            Ok(freshness) => Ok(CachedPayload {
                path: entry.payload_path,
                freshness,
            }),
            Err(reason) => self.fallback(key, entry.payload_path, has_payload, reason),
        }
    }

    /// Extend the freshness window after a `304`
    async fn revalidate(
        &self,
        key: &str,
        response: &FetchResponse,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        if let Some(expiry) = compute_expiry(&response.headers, fetched_at) {
            write_atomic(&self.expiry_path(key), expiry.timestamp().to_string().as_bytes()).await?;
        }
        debug!("{} not modified", key);
        Ok(())
    }

    /// Persist a `200` response.
    ///
    /// The previous validators are removed before the payload is replaced,
    /// so an interrupted store leaves a payload without validators rather
    /// than one paired with another payload's ETag.
    async fn store(
        &self,
        key: &str,
        response: &FetchResponse,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).await?;

        let etag_path = self.etag_path(key);
        let expiry_path = self.expiry_path(key);
        remove_if_exists(&etag_path).await?;
        remove_if_exists(&expiry_path).await?;

        write_atomic(&self.payload_path(key), &response.body).await?;

        if let Some(etag) = response.headers.get(ETAG).and_then(|v| v.to_str().ok()) {
            write_atomic(&etag_path, etag.as_bytes()).await?;
        }
        if let Some(expiry) = compute_expiry(&response.headers, fetched_at) {
            write_atomic(&expiry_path, expiry.timestamp().to_string().as_bytes()).await?;
        }

        info!("Downloaded {} ({} bytes)", key, response.body.len());
        Ok(())
    }

    fn fallback(
        &self,
        key: &str,
        payload_path: PathBuf,
        has_payload: bool,
        reason: String,
    ) -> Result<CachedPayload, CacheError> {
        if has_payload {
            warn!("Failed to refresh {}, using stale copy: {}", key, reason);
            return Ok(CachedPayload {
                path: payload_path,
                freshness: Freshness::Stale,
            });
        }

        Err(CacheError::Retrieval {
            resource: key.to_string(),
            reason,
        })
    }
}

async fn read_sidecar(path: &Path) -> Result<Option<String>, CacheError> {
    match fs::read_to_string(path).await {
        Ok(content) => {
            let content = content.trim();
            Ok((!content.is_empty()).then(|| content.to_string()))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Parse decimal epoch seconds, tolerating a fractional part
fn parse_epoch(value: &str) -> Option<DateTime<Utc>> {
    let seconds: f64 = value.trim().parse().ok()?;
    if !seconds.is_finite() {
        return None;
    }
    DateTime::from_timestamp(seconds.trunc() as i64, 0)
}

async fn remove_if_exists(path: &Path) -> Result<(), CacheError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Replace `path` with `content` via a temporary sibling and a rename.
///
/// The temporary file is deleted when the write fails or the future is
/// dropped before the rename.
async fn write_atomic(path: &Path, content: &[u8]) -> Result<(), CacheError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let (file, temp_path) = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(dir)?
        .into_parts();

    let mut file = fs::File::from_std(file);
    file.write_all(content).await?;
    file.sync_all().await?;
    drop(file);

    temp_path.persist(path).map_err(|e| e.error)?;
    Ok(())
}
