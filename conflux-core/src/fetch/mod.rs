//! Resilient, cache-aware outbound fetch layer.
//!
//! Every other component pulls metadata and image payloads through
//! [`FetchClient`]: conditional requests against a pluggable
//! [`CacheBackend`], bounded exponential-backoff retries, and a single
//! degraded-transport fallback for intermittently corrupted JSON.

mod cache;
mod client;
mod retry;

pub use cache::{
    buffer_envelope, reconstruct_buffer, CacheBackend, CachedEntry,
    MemoryCache,
};
pub use client::{
    FetchClient, FetchOptions, Fetched, Payload, Provenance, ResponseKind,
    TtlClass,
};
pub use retry::RetryPolicy;
