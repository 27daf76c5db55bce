//! Per-server sync run driver: Bootstrap → FieldSync → Aggregate.
//!
//! Runs for different servers may execute concurrently against the same
//! canonical store; correctness relies on the arbiter deciding from a
//! point-in-time availability index and on writes being partial patches
//! keyed by stable title identity. There is no rollback: every applied
//! field update stays applied even if a later title fails.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use conflux_config::SyncSettings;
use conflux_model::{
    FieldGroup, KindCounts, LanguageCode, MediaKind, RunReport,
    ServerDescriptor, ServerSnapshot, SyncHistoryEntry, SyncOutcome,
    TitleAssets, TitleError, TitleKey,
};
use futures::StreamExt;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::availability::FieldAvailabilityIndex;
use crate::bootstrap::bootstrap_titles;
use crate::error::{Result, SyncError};
use crate::fetch::FetchClient;
use crate::store::RecordStore;
use crate::sync::{
    SyncContext, sync_captions, sync_metadata, sync_technical,
    sync_url_group,
};

const URL_GROUPS: [FieldGroup; 5] = [
    FieldGroup::VideoUrl,
    FieldGroup::Poster,
    FieldGroup::Backdrop,
    FieldGroup::Logo,
    FieldGroup::Chapters,
];

/// Drives one server's snapshot through bootstrap and all field
/// synchronizers with a bounded worker pool.
pub struct SyncOrchestrator {
    store: Arc<dyn RecordStore>,
    fetch: Arc<FetchClient>,
    settings: SyncSettings,
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("settings", &self.settings)
            .finish()
    }
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        fetch: Arc<FetchClient>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            fetch,
            settings,
        }
    }

    pub async fn run(
        &self,
        server: &ServerDescriptor,
        snapshot: &ServerSnapshot,
        index: &FieldAvailabilityIndex,
    ) -> Result<RunReport> {
        self.run_with_cancel(server, snapshot, index, None).await
    }

    /// Run with a cooperative cancellation signal, honored between
    /// titles; already-committed field updates stay committed.
    pub async fn run_with_cancel(
        &self,
        server: &ServerDescriptor,
        snapshot: &ServerSnapshot,
        index: &FieldAvailabilityIndex,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<RunReport> {
        if snapshot.server != server.id {
            return Err(SyncError::Internal(format!(
                "snapshot belongs to {} but run is for {}",
                snapshot.server, server.id
            )));
        }
        // The one catastrophic early abort: nothing to process at all.
        if snapshot.is_empty() {
            return Err(SyncError::Internal(format!(
                "snapshot for {} is empty; aborting run",
                server.id
            )));
        }

        let started_at = Utc::now();
        let started = Instant::now();

        let bootstrap =
            bootstrap_titles(self.store.as_ref(), &server.id, snapshot)
                .await?;
        let primary =
            LanguageCode::new(self.settings.primary_language.clone());

        let is_cancelled =
            || cancel.as_ref().is_some_and(|rx| *rx.borrow());

        let primary = &primary;
        let jobs = snapshot.titles.iter().map(|(key, assets)| {
            // Checked lazily as the worker pool pulls the next title.
            let skip = is_cancelled();
            let created = bootstrap.discovered.contains(key);
            async move {
                if skip {
                    None
                } else {
                    Some(
                        self.process_title(
                            server, index, primary, key, assets, created,
                        )
                        .await,
                    )
                }
            }
        });

        let mut outcomes = Vec::with_capacity(snapshot.titles.len());
        let mut errors: Vec<TitleError> = Vec::new();
        let mut cancelled = false;

        let mut stream = futures::stream::iter(jobs)
            .buffer_unordered(self.settings.max_concurrency.max(1));
        while let Some(result) = stream.next().await {
            match result {
                Some((outcome, title_errors)) => {
                    errors.extend(title_errors);
                    outcomes.push(outcome);
                }
                None => cancelled = true,
            }
        }
        drop(stream);

        let counts = tally(&outcomes);
        let report = RunReport {
            server: server.id.clone(),
            started_at,
            elapsed_secs: started.elapsed().as_secs_f64(),
            counts,
            outcomes,
            errors,
            cancelled,
        };

        info!(
            server = %server.id,
            titles = report.outcomes.len(),
            created = report.created_count(),
            fields_written = report.fields_written(),
            errors = report.errors.len(),
            cancelled = report.cancelled,
            "sync run completed"
        );

        if let Err(e) = self
            .store
            .record_sync_history(SyncHistoryEntry::from_report(&report))
            .await
        {
            warn!(server = %server.id, error = %e, "failed to persist sync history");
        }

        Ok(report)
    }

    /// All field groups for one title. Failures are contained per
    /// group: a broken poster never stops the captions.
    async fn process_title(
        &self,
        server: &ServerDescriptor,
        index: &FieldAvailabilityIndex,
        primary: &LanguageCode,
        key: &TitleKey,
        assets: &TitleAssets,
        created: bool,
    ) -> (SyncOutcome, Vec<TitleError>) {
        let mut outcome = SyncOutcome::new(key.clone());
        outcome.created = created;
        let mut errors = Vec::new();

        let record = match self.store.find_by_key(key).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                let error = TitleError {
                    key: key.clone(),
                    group: None,
                    message: "title absent after bootstrap; skipped".into(),
                };
                outcome.errors.push(error.message.clone());
                errors.push(error);
                return (outcome, errors);
            }
            Err(e) => {
                let error = TitleError {
                    key: key.clone(),
                    group: None,
                    message: e.to_string(),
                };
                outcome.errors.push(error.message.clone());
                errors.push(error);
                return (outcome, errors);
            }
        };

        let ctx = SyncContext {
            server,
            index,
            store: self.store.as_ref(),
            fetch: self.fetch.as_ref(),
            primary_language: primary,
        };

        let mut note = |group: FieldGroup,
                        result: Result<Option<FieldGroup>>,
                        outcome: &mut SyncOutcome,
                        errors: &mut Vec<TitleError>| {
            match result {
                Ok(Some(written)) => outcome.updated_groups.push(written),
                Ok(None) => {}
                Err(e) => {
                    warn!(key = %key, group = %group, error = %e, "field group sync failed");
                    let error = TitleError {
                        key: key.clone(),
                        group: Some(group),
                        message: e.to_string(),
                    };
                    outcome.errors.push(format!("{group}: {e}"));
                    errors.push(error);
                }
            }
        };

        let result = sync_metadata(&ctx, key, assets, &record).await;
        note(FieldGroup::Metadata, result, &mut outcome, &mut errors);

        for group in URL_GROUPS {
            let result =
                sync_url_group(&ctx, key, assets, &record, group).await;
            note(group, result, &mut outcome, &mut errors);
        }

        let result = sync_captions(&ctx, key, assets, &record).await;
        note(FieldGroup::Captions, result, &mut outcome, &mut errors);

        let result = sync_technical(&ctx, key, assets, &record).await;
        note(FieldGroup::TechnicalInfo, result, &mut outcome, &mut errors);

        (outcome, errors)
    }
}

fn tally(outcomes: &[SyncOutcome]) -> Vec<(MediaKind, KindCounts)> {
    let mut counts: BTreeMap<MediaKind, KindCounts> = BTreeMap::new();
    for outcome in outcomes {
        let entry = counts.entry(outcome.key.kind()).or_default();
        entry.processed += 1;
        if !outcome.errors.is_empty() {
            entry.errors += 1;
        }
    }
    counts.into_iter().collect()
}
