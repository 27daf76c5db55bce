//! Pluggable response cache keyed by URL.
//!
//! Payloads may round-trip through an intermediate serialized store, so
//! a cached binary buffer can come back in several wire shapes: a bare
//! JSON array of bytes, a `{"type": "Buffer", "data": [..]}` envelope,
//! or a base64 string. [`reconstruct_buffer`] restores all of them; a
//! shape it cannot restore is treated as a cache miss, never an error.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Value, json};
use tracing::debug;

/// One cached response plus its revalidation validators.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CachedEntry {
    pub data: Value,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub stored_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl CachedEntry {
    pub fn new(
        data: Value,
        etag: Option<String>,
        last_modified: Option<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            data,
            etag,
            last_modified,
            stored_at: Utc::now(),
            ttl_secs: ttl.as_secs(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.stored_at);
        age.num_seconds() >= self.ttl_secs as i64
    }

    pub fn has_validators(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }
}

/// Abstract cache store. Absence of a backend degrades the fetch client
/// to always-miss rather than failing.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, url: &str) -> Option<CachedEntry>;

    async fn set(&self, url: &str, entry: CachedEntry);

    async fn get_many(&self, urls: &[String]) -> Vec<Option<CachedEntry>> {
        let mut out = Vec::with_capacity(urls.len());
        for url in urls {
            out.push(self.get(url).await);
        }
        out
    }

    async fn set_many(&self, entries: Vec<(String, CachedEntry)>) {
        for (url, entry) in entries {
            self.set(&url, entry).await;
        }
    }
}

/// In-process cache backend with per-entry TTL expiry.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CachedEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, url: &str) -> Option<CachedEntry> {
        let expired = match self.entries.get(url) {
            Some(entry) if entry.is_expired(Utc::now()) => true,
            Some(entry) => return Some(entry.clone()),
            None => return None,
        };
        if expired {
            self.entries.remove(url);
            debug!(url, "cache entry expired");
        }
        None
    }

    async fn set(&self, url: &str, entry: CachedEntry) {
        self.entries.insert(url.to_string(), entry);
    }
}

/// Serialize a binary payload into the envelope shape stored in cache.
pub fn buffer_envelope(bytes: &[u8]) -> Value {
    json!({ "type": "Buffer", "data": BASE64.encode(bytes) })
}

/// Restore a binary payload from any of the known cached wire shapes.
pub fn reconstruct_buffer(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Array(items) => {
            let mut bytes = Vec::with_capacity(items.len());
            for item in items {
                let n = item.as_u64()?;
                bytes.push(u8::try_from(n).ok()?);
            }
            Some(bytes)
        }
        Value::String(encoded) => BASE64.decode(encoded).ok(),
        Value::Object(obj) => {
            if obj.get("type").and_then(Value::as_str) != Some("Buffer") {
                return None;
            }
            reconstruct_buffer(obj.get("data")?)
        }
        _ => None,
    }
}
