//! Per-run index of which servers currently advertise which field.
//!
//! Built once per sync invocation from a point-in-time set of server
//! snapshots and never mutated afterwards: recomputing mid-pass would
//! let a field write rely on availability that goes stale within the
//! same run. Synchronizers receive it as an immutable borrow.

use std::collections::HashMap;

use conflux_model::{
    FieldGroup, LanguageCode, ServerDescriptor, ServerId, ServerSnapshot,
    TitleKey,
};

/// Ordered availability lists, highest-precedence server first.
///
/// A server entirely missing a field never appears in that field's list
/// and therefore never blocks lower-priority servers from winning it.
#[derive(Debug, Default)]
pub struct FieldAvailabilityIndex {
    groups: HashMap<(TitleKey, FieldGroup), Vec<ServerId>>,
    captions: HashMap<(TitleKey, LanguageCode), Vec<ServerId>>,
}

impl FieldAvailabilityIndex {
    /// Scan all snapshots before any writes occur.
    ///
    /// Servers are visited in descending precedence (ascending priority
    /// number), so each availability list is priority-ordered by
    /// construction; ties cannot occur because duplicate priorities are
    /// rejected at configuration load.
    pub fn build(
        servers: &[ServerDescriptor],
        snapshots: &[ServerSnapshot],
    ) -> Self {
        let mut ordered: Vec<&ServerDescriptor> = servers.iter().collect();
        ordered.sort_by_key(|s| s.priority);

        let mut index = FieldAvailabilityIndex::default();
        for descriptor in ordered {
            let Some(snapshot) =
                snapshots.iter().find(|s| s.server == descriptor.id)
            else {
                continue;
            };
            for (key, assets) in &snapshot.titles {
                for group in FieldGroup::ALL {
                    if assets.advertises(group) {
                        index
                            .groups
                            .entry((key.clone(), group))
                            .or_default()
                            .push(descriptor.id.clone());
                    }
                }
                for lang in assets.subtitles.keys() {
                    index
                        .captions
                        .entry((key.clone(), lang.clone()))
                        .or_default()
                        .push(descriptor.id.clone());
                }
            }
        }
        index
    }

    /// Servers currently advertising `group` for `key`, best first.
    pub fn availability(
        &self,
        key: &TitleKey,
        group: FieldGroup,
    ) -> &[ServerId] {
        self.groups
            .get(&(key.clone(), group))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Servers currently advertising captions in `lang` for `key`.
    pub fn caption_availability(
        &self,
        key: &TitleKey,
        lang: &LanguageCode,
    ) -> &[ServerId] {
        self.captions
            .get(&(key.clone(), lang.clone()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
