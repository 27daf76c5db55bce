//! Post-sync verification: a read-only audit pass that cross-references
//! raw server inventories against the canonical store. Discrepancies
//! are report entries, never errors, and nothing here mutates state.

use std::collections::BTreeMap;

use conflux_model::{
    CanonicalRecord, MediaKind, ServerId, ServerSnapshot, TitleKey,
};
use tracing::debug;

use crate::error::Result;
use crate::store::RecordStore;

/// A title advertised upstream with no canonical record.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MissingContent {
    pub key: TitleKey,
    pub advertised_by: Vec<ServerId>,
}

/// Essential fields a complete record is expected to carry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingVideoUrl,
    MissingPoster,
    MissingDuration,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IssueKind::MissingVideoUrl => "missing video URL",
            IssueKind::MissingPoster => "missing poster",
            IssueKind::MissingDuration => "missing duration",
        };
        f.write_str(name)
    }
}

/// Incomplete records grouped by issue and media category, ranked by
/// frequency (largest bucket first).
#[derive(Debug, Clone, serde::Serialize)]
pub struct IssueBucket {
    pub kind: MediaKind,
    pub issue: IssueKind,
    pub count: u64,
    pub keys: Vec<TitleKey>,
}

/// Consecutive missing-episode range within one show season.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EpisodeGap {
    pub show: String,
    pub season: u32,
    pub first_missing: u32,
    pub last_missing: u32,
}

impl std::fmt::Display for EpisodeGap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} season {}: missing episodes {}-{}",
            self.show, self.season, self.first_missing, self.last_missing
        )
    }
}

/// The full audit output, shaped for a dashboard or CLI consumer.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuditReport {
    pub missing: Vec<MissingContent>,
    pub issues: Vec<IssueBucket>,
    pub episode_gaps: Vec<EpisodeGap>,
    /// Essential-field absences attributed per server. An absent field
    /// has no recorded source, so attribution falls back through the
    /// record's metadata source, video source, and discovery server.
    pub server_failures: BTreeMap<ServerId, u64>,
    /// Average seconds per processed item, per media kind, across all
    /// recorded runs.
    pub avg_processing_secs: Vec<(MediaKind, f64)>,
}

/// Read-only audit engine over the canonical store.
pub struct VerificationEngine<'a> {
    store: &'a dyn RecordStore,
}

impl std::fmt::Debug for VerificationEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationEngine").finish()
    }
}

impl<'a> VerificationEngine<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// Produce the full audit report for the given point-in-time
    /// snapshots.
    pub async fn audit(
        &self,
        snapshots: &[ServerSnapshot],
    ) -> Result<AuditReport> {
        let missing = self.missing_content(snapshots).await?;

        let mut records = Vec::new();
        for kind in MediaKind::ALL {
            records.extend(self.store.all_records(kind).await?);
        }

        let (issues, server_failures) = rank_issues(&records);
        let episode_gaps = episode_gaps(&records);
        let avg_processing_secs = self.average_timings().await?;

        debug!(
            missing = missing.len(),
            issue_buckets = issues.len(),
            gaps = episode_gaps.len(),
            "audit pass complete"
        );

        Ok(AuditReport {
            missing,
            issues,
            episode_gaps,
            server_failures,
            avg_processing_secs,
        })
    }

    /// Titles/seasons/episodes present upstream but absent canonically.
    pub async fn missing_content(
        &self,
        snapshots: &[ServerSnapshot],
    ) -> Result<Vec<MissingContent>> {
        let mut advertised: BTreeMap<TitleKey, Vec<ServerId>> =
            BTreeMap::new();
        for snapshot in snapshots {
            for key in snapshot.titles.keys() {
                advertised
                    .entry(key.clone())
                    .or_default()
                    .push(snapshot.server.clone());
            }
        }

        let mut missing = Vec::new();
        for (key, advertised_by) in advertised {
            if self.store.find_by_key(&key).await?.is_none() {
                missing.push(MissingContent { key, advertised_by });
            }
        }
        Ok(missing)
    }

    async fn average_timings(&self) -> Result<Vec<(MediaKind, f64)>> {
        let history = self.store.sync_history().await?;
        let mut elapsed: BTreeMap<MediaKind, (f64, u64)> = BTreeMap::new();
        for entry in &history {
            for (kind, counts) in &entry.counts {
                if counts.processed == 0 {
                    continue;
                }
                let slot = elapsed.entry(*kind).or_insert((0.0, 0));
                slot.0 += entry.elapsed_secs;
                slot.1 += counts.processed;
            }
        }
        Ok(elapsed
            .into_iter()
            .map(|(kind, (secs, items))| (kind, secs / items as f64))
            .collect())
    }
}

fn essential_issues(record: &CanonicalRecord) -> Vec<IssueKind> {
    let mut issues = Vec::new();
    let playable = matches!(record.kind, MediaKind::Movie | MediaKind::Episode);

    if playable && record.fields.video_url.is_none() {
        issues.push(IssueKind::MissingVideoUrl);
    }
    if record.fields.poster_url.is_none() {
        issues.push(IssueKind::MissingPoster);
    }
    if playable && record.fields.technical.duration_secs.is_none() {
        issues.push(IssueKind::MissingDuration);
    }
    issues
}

fn attributed_server(record: &CanonicalRecord) -> ServerId {
    record
        .fields
        .metadata
        .as_ref()
        .map(|m| m.source.clone())
        .or_else(|| {
            record.fields.video_url.as_ref().map(|v| v.source.clone())
        })
        .unwrap_or_else(|| record.initial_discovery_server.clone())
}

fn rank_issues(
    records: &[CanonicalRecord],
) -> (Vec<IssueBucket>, BTreeMap<ServerId, u64>) {
    let mut buckets: BTreeMap<(MediaKind, IssueKind), Vec<TitleKey>> =
        BTreeMap::new();
    let mut failures: BTreeMap<ServerId, u64> = BTreeMap::new();

    for record in records {
        let issues = essential_issues(record);
        if issues.is_empty() {
            continue;
        }
        let server = attributed_server(record);
        *failures.entry(server).or_default() += issues.len() as u64;
        for issue in issues {
            buckets
                .entry((record.kind, issue))
                .or_default()
                .push(record.key.clone());
        }
    }

    let mut ranked: Vec<IssueBucket> = buckets
        .into_iter()
        .map(|((kind, issue), keys)| IssueBucket {
            kind,
            issue,
            count: keys.len() as u64,
            keys,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    (ranked, failures)
}

/// Scan sorted episode numbers per show season for non-consecutive
/// runs, reported as explicit numeric ranges.
fn episode_gaps(records: &[CanonicalRecord]) -> Vec<EpisodeGap> {
    let mut seasons: BTreeMap<(String, u32), Vec<u32>> = BTreeMap::new();
    for record in records {
        if let TitleKey::Episode {
            show,
            season,
            episode,
        } = &record.key
        {
            seasons
                .entry((show.clone(), *season))
                .or_default()
                .push(*episode);
        }
    }

    let mut gaps = Vec::new();
    for ((show, season), mut episodes) in seasons {
        episodes.sort_unstable();
        episodes.dedup();
        for pair in episodes.windows(2) {
            if pair[1] > pair[0] + 1 {
                gaps.push(EpisodeGap {
                    show: show.clone(),
                    season,
                    first_missing: pair[0] + 1,
                    last_missing: pair[1] - 1,
                });
            }
        }
    }
    gaps
}
