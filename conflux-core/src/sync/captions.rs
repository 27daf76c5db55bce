//! Synchronizer for subtitle tracks, arbitrated per language.
//!
//! Unlike the single-URL groups, caption precedence is decided per
//! language: server A can win `en` while server B wins `fr` on the same
//! title. The merged map is rewritten as a whole with a deterministic
//! language order (primary language first, remaining codes
//! lexicographic) and the record's caption source is the source of the
//! map's primary entry.

use std::collections::BTreeMap;

use conflux_model::{
    CanonicalRecord, CaptionEntry, CaptionsPatch, FieldGroup, LanguageCode,
    RecordPatch, TitleAssets, TitleKey,
};
use tracing::debug;

use crate::arbiter;
use crate::error::Result;

use super::{SyncContext, resolve_url};

/// Deterministic caption language order: the configured primary
/// language first when present, then lexicographic language code.
pub fn caption_order(
    entries: &BTreeMap<LanguageCode, CaptionEntry>,
    primary: &LanguageCode,
) -> Vec<LanguageCode> {
    let mut order: Vec<LanguageCode> = Vec::with_capacity(entries.len());
    if entries.contains_key(primary) {
        order.push(primary.clone());
    }
    // BTreeMap keys iterate sorted already.
    order.extend(entries.keys().filter(|l| *l != primary).cloned());
    order
}

pub async fn sync_captions(
    ctx: &SyncContext<'_>,
    key: &TitleKey,
    assets: &TitleAssets,
    record: &CanonicalRecord,
) -> Result<Option<FieldGroup>> {
    if assets.subtitles.is_empty() {
        return Ok(None);
    }

    let mut entries = record.fields.captions.clone();
    let mut changed = false;

    for (lang, track) in &assets.subtitles {
        if !arbiter::may_write_caption(ctx.index, key, lang, &ctx.server.id) {
            continue;
        }
        let resolved = resolve_url(&ctx.server.base_url, &track.url, key)?;
        let candidate = CaptionEntry {
            url: resolved,
            src_lang: track.src_lang.clone(),
            source: ctx.server.id.clone(),
        };
        if entries.get(lang) != Some(&candidate) {
            entries.insert(lang.clone(), candidate);
            changed = true;
        }
    }

    let order = caption_order(&entries, ctx.primary_language);
    let primary_source = order
        .first()
        .and_then(|lang| entries.get(lang))
        .map(|entry| entry.source.clone());

    let unchanged = !changed
        && order == record.fields.caption_order
        && primary_source == record.fields.caption_source;
    if unchanged {
        return Ok(None);
    }

    let mut patch = RecordPatch {
        captions: Some(CaptionsPatch {
            entries,
            order,
            primary_source,
        }),
        ..Default::default()
    };
    patch.strip_locked(&record.locks);
    if patch.is_empty() {
        return Ok(None);
    }

    ctx.store.upsert_patch(key, patch).await?;
    debug!(key = %key, server = %ctx.server.id, "caption map written");
    Ok(Some(FieldGroup::Captions))
}
