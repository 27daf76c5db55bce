use std::collections::HashMap;
use std::time::Duration;

use conflux_model::ServerDescriptor;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Retry tuning for the fetch client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after the initial attempt; a fetch runs at most
    /// `limit + 1` times.
    pub limit: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            limit: 3,
            base_delay_ms: 250,
            max_delay_ms: 10_000,
            jitter_ms: 100,
        }
    }
}

/// Cache TTL tuning. Perceptual-hash style payloads rarely change and
/// get the long TTL; everything else gets the short one.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_short_secs: u64,
    pub ttl_long_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_short_secs: 15 * 60,
            ttl_long_secs: 30 * 24 * 60 * 60,
        }
    }
}

/// Fetch client tuning.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Per-request timeout for small cacheable payloads.
    pub timeout_secs: Option<u64>,
    /// Per-request timeout for bulk payloads (video, large buffers).
    pub bulk_timeout_secs: Option<u64>,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(10))
    }

    pub fn bulk_timeout(&self) -> Duration {
        Duration::from_secs(self.bulk_timeout_secs.unwrap_or(120))
    }
}

/// Orchestrator tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Worker ceiling for per-title processing within one run.
    pub max_concurrency: usize,
    /// Language placed first in caption ordering.
    pub primary_language: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            primary_language: "en".to_string(),
        }
    }
}

/// Root settings document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfluxSettings {
    pub servers: Vec<ServerDescriptor>,
    pub fetch: FetchSettings,
    pub sync: SyncSettings,
}

impl Default for ConfluxSettings {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            fetch: FetchSettings::default(),
            sync: SyncSettings::default(),
        }
    }
}

impl ConfluxSettings {
    /// Reject configurations that would make arbitration ambiguous.
    pub fn validate(&self) -> Result<()> {
        let mut by_priority: HashMap<u32, &ServerDescriptor> = HashMap::new();
        let mut seen_ids = HashMap::new();

        for server in &self.servers {
            if let Some(previous) =
                seen_ids.insert(server.id.clone(), server)
            {
                return Err(ConfigError::DuplicateServerId(
                    previous.id.to_string(),
                ));
            }
            if let Some(previous) =
                by_priority.insert(server.priority, server)
            {
                return Err(ConfigError::DuplicatePriority {
                    a: previous.id.to_string(),
                    b: server.id.to_string(),
                    priority: server.priority,
                });
            }
        }

        if self.sync.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "sync.max_concurrency must be at least 1".into(),
            ));
        }
        if self.fetch.retry.max_delay_ms < self.fetch.retry.base_delay_ms {
            return Err(ConfigError::Invalid(
                "fetch.retry.max_delay_ms must be >= base_delay_ms".into(),
            ));
        }

        Ok(())
    }

    /// Servers in descending precedence (lowest priority number first).
    /// Stable, so equal priorities would keep declaration order; those
    /// are rejected by [`validate`](Self::validate) anyway.
    pub fn servers_by_precedence(&self) -> Vec<&ServerDescriptor> {
        let mut servers: Vec<&ServerDescriptor> = self.servers.iter().collect();
        servers.sort_by_key(|s| s.priority);
        servers
    }
}
