//! On-disk response cache with a fixed freshness window.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::util::{unix_now, url_hash};

/// How long a cached response is served before it is fetched again.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    url: String,
    stored_at: u64,
    body: String,
}

/// Response bodies keyed by full request URL (path and query string).
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    /// `<user cache dir>/sdmx-json`, or `./data_cache` when the platform has
    /// no cache directory.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .map(|d| d.join("sdmx-json"))
            .unwrap_or_else(|| PathBuf::from("data_cache"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the stored body if it is younger than the TTL.
    pub fn get(&self, url: &str) -> Option<String> {
        self.get_at(url, unix_now())
    }

    fn get_at(&self, url: &str, now: u64) -> Option<String> {
        let path = self.entry_path(url);
        let text = fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_str(&text) {
            Ok(e) => e,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "removing corrupt cache entry");
                remove_entry(&path);
                return None;
            }
        };
        if entry.url != url {
            debug!(url, cached = %entry.url, "cache key collision");
            return None;
        }
        let age = now.saturating_sub(entry.stored_at);
        if age >= self.ttl.as_secs() {
            debug!(url, age, "removing stale cache entry");
            remove_entry(&path);
            return None;
        }
        Some(entry.body)
    }

    /// Stores a response body. Failures are logged, never returned.
    pub fn put(&self, url: &str, body: &str) {
        self.put_at(url, body, unix_now());
    }

    fn put_at(&self, url: &str, body: &str, now: u64) {
        if let Err(e) = self.write_entry(url, body, now) {
            warn!(url, dir = %self.dir.display(), error = %e, "failed to write response cache");
        }
    }

    fn write_entry(&self, url: &str, body: &str, now: u64) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let entry = CacheEntry {
            url: url.to_string(),
            stored_at: now,
            body: body.to_string(),
        };
        // Each writer gets its own temp file; the rename makes the entry visible.
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&mut tmp, &entry)?;
        tmp.flush()?;
        tmp.persist(self.entry_path(url))?;
        Ok(())
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.json", url_hash(url)))
    }
}

fn remove_entry(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        debug!(path = %path.display(), error = %e, "failed to remove cache entry");
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Self::default_dir(), DEFAULT_TTL)
    }
}
