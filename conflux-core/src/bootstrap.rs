//! Placeholder creation for titles discovered only upstream.

use std::collections::HashSet;

use conflux_model::{CanonicalRecord, ServerId, ServerSnapshot, TitleKey};
use tracing::{debug, info};

use crate::error::Result;
use crate::store::RecordStore;

/// What the bootstrapper attempted and what actually landed.
#[derive(Debug, Default)]
pub struct BootstrapSummary {
    /// Keys that had no canonical record before this run.
    pub discovered: HashSet<TitleKey>,
    /// How many placeholder inserts the store accepted; may be lower
    /// than `discovered.len()` when a concurrent run raced the insert.
    pub inserted: usize,
}

/// Insert minimal placeholder records for every title the snapshot
/// advertises that the canonical store does not know yet.
///
/// The insert is best-effort: duplicate-key losses from racing runs are
/// fine because per-title lookups re-resolve afterwards.
pub async fn bootstrap_titles(
    store: &dyn RecordStore,
    server: &ServerId,
    snapshot: &ServerSnapshot,
) -> Result<BootstrapSummary> {
    let mut summary = BootstrapSummary::default();
    let mut placeholders = Vec::new();

    for key in snapshot.titles.keys() {
        if store.find_by_key(key).await?.is_none() {
            summary.discovered.insert(key.clone());
            placeholders
                .push(CanonicalRecord::placeholder(key.clone(), server.clone()));
        }
    }

    if placeholders.is_empty() {
        debug!(server = %server, "no new titles to bootstrap");
        return Ok(summary);
    }

    summary.inserted = store.bulk_insert_placeholders(placeholders).await?;
    info!(
        server = %server,
        discovered = summary.discovered.len(),
        inserted = summary.inserted,
        "bootstrapped placeholder records"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;
    use conflux_model::TitleAssets;

    #[tokio::test]
    async fn only_unknown_titles_are_bootstrapped() {
        let store = MemoryRecordStore::new();
        let server = ServerId::from("alpha");

        let existing = CanonicalRecord::placeholder(
            TitleKey::movie("Heat"),
            ServerId::from("beta"),
        );
        store
            .bulk_insert_placeholders(vec![existing])
            .await
            .unwrap();

        let mut snapshot = ServerSnapshot::new(server.clone());
        snapshot.insert(TitleKey::movie("Heat"), TitleAssets::default());
        snapshot.insert(TitleKey::movie("Ronin"), TitleAssets::default());

        let summary =
            bootstrap_titles(&store, &server, &snapshot).await.unwrap();
        assert_eq!(summary.inserted, 1);
        assert!(summary.discovered.contains(&TitleKey::movie("Ronin")));
        assert!(!summary.discovered.contains(&TitleKey::movie("Heat")));

        // The pre-existing record keeps its original discovery server.
        let heat = store
            .find_by_key(&TitleKey::movie("Heat"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(heat.initial_discovery_server, ServerId::from("beta"));
    }
}
