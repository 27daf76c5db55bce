use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use conflux_config::FetchSettings;
use reqwest::StatusCode;
use reqwest::header::{
    ETAG, HeaderMap, HeaderName, HeaderValue, IF_MODIFIED_SINCE,
    IF_NONE_MATCH, LAST_MODIFIED,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};

use super::cache::{
    CacheBackend, CachedEntry, buffer_envelope, reconstruct_buffer,
};
use super::retry::RetryPolicy;

/// How the caller wants the response body typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Json,
    Text,
    Buffer,
    Stream,
}

/// Cache lifetime class. Perceptual-hash style payloads rarely change
/// and take the long TTL; everything else takes the short one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    Short,
    Long,
}

/// Where a returned payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Fresh,
    Cache,
}

/// A typed response body.
#[derive(Debug)]
pub enum Payload {
    Json(Value),
    Text(String),
    Buffer(Vec<u8>),
    /// Unconsumed response; streams bypass the cache entirely.
    Stream(reqwest::Response),
}

impl Payload {
    pub fn into_json(self) -> Option<Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Payload::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// A completed fetch.
#[derive(Debug)]
pub struct Fetched {
    pub payload: Payload,
    pub headers: HeaderMap,
    pub provenance: Provenance,
}

/// Per-call fetch tuning.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub kind: ResponseKind,
    /// Overrides the client's configured timeout when set; by default
    /// small payloads take `fetch.timeout_secs` and buffer/stream
    /// payloads take `fetch.bulk_timeout_secs`.
    pub timeout: Option<Duration>,
    pub ttl: TtlClass,
    /// Overrides the client's default policy when set.
    pub retry: Option<RetryPolicy>,
}

impl FetchOptions {
    fn with_kind(kind: ResponseKind) -> Self {
        let ttl = match kind {
            ResponseKind::Buffer => TtlClass::Long,
            _ => TtlClass::Short,
        };
        Self {
            kind,
            timeout: None,
            ttl,
            retry: None,
        }
    }

    pub fn json() -> Self {
        Self::with_kind(ResponseKind::Json)
    }

    pub fn text() -> Self {
        Self::with_kind(ResponseKind::Text)
    }

    pub fn buffer() -> Self {
        Self::with_kind(ResponseKind::Buffer)
    }

    pub fn stream() -> Self {
        Self::with_kind(ResponseKind::Stream)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn ttl(mut self, ttl: TtlClass) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// Resilient HTTP GET client: cache consult with conditional
/// revalidation, bounded jittered retries, and a one-shot degraded
/// transport fallback for malformed JSON.
pub struct FetchClient {
    http: reqwest::Client,
    /// HTTP/1.1-only client used exactly once per call when the primary
    /// transport hands back JSON that fails to parse; some upstream
    /// configurations intermittently corrupt chunked JSON over h2.
    fallback: reqwest::Client,
    cache: Option<Arc<dyn CacheBackend>>,
    settings: FetchSettings,
}

impl fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchClient")
            .field("cache", &self.cache.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

impl FetchClient {
    pub fn new(
        settings: FetchSettings,
        cache: Option<Arc<dyn CacheBackend>>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().build().map_err(|e| {
            SyncError::Internal(format!("failed to build HTTP client: {e}"))
        })?;
        let fallback =
            reqwest::Client::builder().http1_only().build().map_err(|e| {
                SyncError::Internal(format!(
                    "failed to build fallback HTTP client: {e}"
                ))
            })?;
        Ok(Self {
            http,
            fallback,
            cache,
            settings,
        })
    }

    fn default_retry(&self) -> RetryPolicy {
        RetryPolicy::from_settings(&self.settings.retry)
    }

    fn timeout_for(&self, kind: ResponseKind) -> Duration {
        match kind {
            ResponseKind::Json | ResponseKind::Text => {
                self.settings.timeout()
            }
            ResponseKind::Buffer | ResponseKind::Stream => {
                self.settings.bulk_timeout()
            }
        }
    }

    fn ttl_for(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Short => {
                Duration::from_secs(self.settings.cache.ttl_short_secs)
            }
            TtlClass::Long => {
                Duration::from_secs(self.settings.cache.ttl_long_secs)
            }
        }
    }

    /// Fetch `url`, consulting the cache first and retrying transient
    /// failures per policy. Backoff sleeps hold no locks.
    pub async fn fetch(
        &self,
        url: &str,
        opts: FetchOptions,
    ) -> Result<Fetched> {
        let retry = opts
            .retry
            .clone()
            .unwrap_or_else(|| self.default_retry());
        let timeout = opts
            .timeout
            .unwrap_or_else(|| self.timeout_for(opts.kind));

        let mut cached = if matches!(opts.kind, ResponseKind::Stream) {
            None
        } else {
            match &self.cache {
                Some(backend) => {
                    let entry = backend.get(url).await;
                    match &entry {
                        Some(_) => debug!(url, "cache hit"),
                        None => debug!(url, "cache miss"),
                    }
                    entry
                }
                None => None,
            }
        };

        // A fresh-enough entry without validators is served directly;
        // entries carrying validators go through a conditional GET.
        if let Some(entry) = &cached {
            if !entry.has_validators() {
                match retype_cached(entry, opts.kind) {
                    Some(payload) => {
                        return Ok(Fetched {
                            headers: validator_headers(entry),
                            payload,
                            provenance: Provenance::Cache,
                        });
                    }
                    None => {
                        warn!(url, "cached payload unusable; treating as miss");
                        cached = None;
                    }
                }
            }
        }

        let mut attempt: u32 = 0;
        loop {
            let mut request = self.http.get(url).timeout(timeout);
            if let Some(entry) = &cached {
                if let Some(etag) = &entry.etag {
                    request = request.header(IF_NONE_MATCH, etag);
                }
                if let Some(last_modified) = &entry.last_modified {
                    request =
                        request.header(IF_MODIFIED_SINCE, last_modified);
                }
            }
            debug!(url, attempt, "fetch attempt");

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::NOT_MODIFIED {
                        match cached.take() {
                            Some(entry) => {
                                if let Some(payload) =
                                    retype_cached(&entry, opts.kind)
                                {
                                    debug!(url, "revalidated from cache");
                                    return Ok(Fetched {
                                        headers: validator_headers(&entry),
                                        payload,
                                        provenance: Provenance::Cache,
                                    });
                                }
                                // Unusable cached payload counts as a
                                // miss; refetch unconditionally.
                                warn!(
                                    url,
                                    "cached payload failed reconstruction \
                                     after 304; refetching"
                                );
                                continue;
                            }
                            None => {
                                return Err(SyncError::payload(
                                    url,
                                    "304 response without a cached entry",
                                ));
                            }
                        }
                    }

                    if status.is_success() {
                        return self
                            .consume(url, response, &opts, timeout)
                            .await;
                    }

                    let code = status.as_u16();
                    if RetryPolicy::retryable_status(code)
                        && attempt < retry.limit
                    {
                        attempt += 1;
                        let delay = retry.delay(attempt);
                        debug!(
                            url,
                            attempt,
                            status = code,
                            delay_ms = delay.as_millis() as u64,
                            "transient status; retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(SyncError::transport(
                        url,
                        Some(code),
                        format!("upstream returned {status}"),
                    ));
                }
                Err(err) => {
                    if attempt < retry.limit {
                        attempt += 1;
                        let delay = retry.delay(attempt);
                        debug!(
                            url,
                            attempt,
                            error = %err,
                            delay_ms = delay.as_millis() as u64,
                            "network failure; retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(SyncError::transport(
                        url,
                        err.status().map(|s| s.as_u16()),
                        err.to_string(),
                    ));
                }
            }
        }
    }

    /// Parse a successful response per the requested kind and write the
    /// fresh payload back to cache.
    async fn consume(
        &self,
        url: &str,
        response: reqwest::Response,
        opts: &FetchOptions,
        timeout: Duration,
    ) -> Result<Fetched> {
        let headers = response.headers().clone();
        let etag = header_string(&headers, &ETAG);
        let last_modified = header_string(&headers, &LAST_MODIFIED);

        let (payload, cacheable) = match opts.kind {
            ResponseKind::Stream => (Payload::Stream(response), None),
            ResponseKind::Text => {
                let text = response.text().await.map_err(|e| {
                    SyncError::transport(url, None, e.to_string())
                })?;
                (Payload::Text(text.clone()), Some(Value::String(text)))
            }
            ResponseKind::Buffer => {
                let bytes = response.bytes().await.map_err(|e| {
                    SyncError::transport(url, None, e.to_string())
                })?;
                let bytes = bytes.to_vec();
                let envelope = buffer_envelope(&bytes);
                (Payload::Buffer(bytes), Some(envelope))
            }
            ResponseKind::Json => {
                let text = response.text().await.map_err(|e| {
                    SyncError::transport(url, None, e.to_string())
                })?;
                let value = match serde_json::from_str::<Value>(&text) {
                    Ok(value) => value,
                    Err(parse_err) => {
                        warn!(
                            url,
                            error = %parse_err,
                            "malformed JSON from primary transport; \
                             attempting HTTP/1.1 fallback"
                        );
                        self.fallback_json(url, timeout, &parse_err)
                            .await?
                    }
                };
                (Payload::Json(value.clone()), Some(value))
            }
        };

        if let (Some(backend), Some(data)) = (&self.cache, cacheable) {
            let entry = CachedEntry::new(
                data,
                etag,
                last_modified,
                self.ttl_for(opts.ttl),
            );
            backend.set(url, entry).await;
            debug!(url, "cache store");
        }

        Ok(Fetched {
            payload,
            headers,
            provenance: Provenance::Fresh,
        })
    }

    /// Exactly one fallback fetch over the simpler transport before
    /// surfacing a payload error.
    async fn fallback_json(
        &self,
        url: &str,
        timeout: Duration,
        original: &serde_json::Error,
    ) -> Result<Value> {
        let response = self
            .fallback
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                SyncError::payload(
                    url,
                    format!(
                        "malformed JSON ({original}); fallback transport \
                         failed: {e}"
                    ),
                )
            })?;
        if !response.status().is_success() {
            return Err(SyncError::payload(
                url,
                format!(
                    "malformed JSON ({original}); fallback returned {}",
                    response.status()
                ),
            ));
        }
        response.json::<Value>().await.map_err(|e| {
            SyncError::payload(
                url,
                format!(
                    "malformed JSON ({original}); fallback parse failed: {e}"
                ),
            )
        })
    }
}

/// Re-type a cached payload to the requested kind. `None` means the
/// cached shape cannot serve this request and must be treated as a miss.
fn retype_cached(entry: &CachedEntry, kind: ResponseKind) -> Option<Payload> {
    match kind {
        ResponseKind::Json => Some(Payload::Json(entry.data.clone())),
        ResponseKind::Text => entry
            .data
            .as_str()
            .map(|s| Payload::Text(s.to_string())),
        ResponseKind::Buffer => {
            reconstruct_buffer(&entry.data).map(Payload::Buffer)
        }
        ResponseKind::Stream => None,
    }
}

fn validator_headers(entry: &CachedEntry) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(etag) = &entry.etag {
        if let Ok(value) = HeaderValue::from_str(etag) {
            headers.insert(ETAG, value);
        }
    }
    if let Some(last_modified) = &entry.last_modified {
        if let Ok(value) = HeaderValue::from_str(last_modified) {
            headers.insert(LAST_MODIFIED, value);
        }
    }
    headers
}

fn header_string(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
