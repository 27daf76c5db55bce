//! Run-scoped outcomes and the persisted sync history record.

use chrono::{DateTime, Utc};

use crate::fields::FieldGroup;
use crate::ids::ServerId;
use crate::keys::TitleKey;
use crate::media_kind::MediaKind;

/// Per-title outcome of one orchestrator pass.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SyncOutcome {
    pub key: TitleKey,
    pub created: bool,
    pub updated_groups: Vec<FieldGroup>,
    pub errors: Vec<String>,
}

impl SyncOutcome {
    pub fn new(key: TitleKey) -> Self {
        Self {
            key,
            created: false,
            updated_groups: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// One contained failure, attributed to a title (and group when known).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TitleError {
    pub key: TitleKey,
    pub group: Option<FieldGroup>,
    pub message: String,
}

/// Processed/error tallies for one media kind.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct KindCounts {
    pub processed: u64,
    pub errors: u64,
}

/// Aggregated result of one per-server run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RunReport {
    pub server: ServerId,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub counts: Vec<(MediaKind, KindCounts)>,
    pub outcomes: Vec<SyncOutcome>,
    pub errors: Vec<TitleError>,
    pub cancelled: bool,
}

impl RunReport {
    /// Total number of field-group writes performed across all titles.
    pub fn fields_written(&self) -> usize {
        self.outcomes.iter().map(|o| o.updated_groups.len()).sum()
    }

    pub fn created_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.created).count()
    }
}

/// Persisted record of one run, consumed by the verification engine.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SyncHistoryEntry {
    pub server: ServerId,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub counts: Vec<(MediaKind, KindCounts)>,
    pub error_count: u64,
}

impl SyncHistoryEntry {
    pub fn from_report(report: &RunReport) -> Self {
        Self {
            server: report.server.clone(),
            started_at: report.started_at,
            elapsed_secs: report.elapsed_secs,
            counts: report.counts.clone(),
            error_count: report.errors.len() as u64,
        }
    }
}
