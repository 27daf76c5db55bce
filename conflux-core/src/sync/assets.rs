//! Synchronizer for the single-URL field groups: playable asset,
//! poster, backdrop, logo, and chapter markers.

use conflux_model::{
    CanonicalRecord, FieldGroup, FieldPath, RecordPatch, Sourced,
    TitleAssets, TitleKey,
};
use tracing::debug;

use crate::arbiter;
use crate::error::Result;

use super::{SyncContext, resolve_url};

fn path_for(group: FieldGroup) -> Option<FieldPath> {
    match group {
        FieldGroup::VideoUrl => Some(FieldPath::VideoUrl),
        FieldGroup::Poster => Some(FieldPath::PosterUrl),
        FieldGroup::Backdrop => Some(FieldPath::BackdropUrl),
        FieldGroup::Logo => Some(FieldPath::LogoUrl),
        FieldGroup::Chapters => Some(FieldPath::ChaptersUrl),
        _ => None,
    }
}

/// Sync one single-URL group for one title. Returns the group when a
/// write happened, `None` when the template stopped early.
pub async fn sync_url_group(
    ctx: &SyncContext<'_>,
    key: &TitleKey,
    assets: &TitleAssets,
    record: &CanonicalRecord,
    group: FieldGroup,
) -> Result<Option<FieldGroup>> {
    let Some(path) = path_for(group) else {
        return Ok(None);
    };
    let Some(raw) = assets.url_for(group) else {
        return Ok(None);
    };
    if !arbiter::may_write(ctx.index, key, group, &ctx.server.id) {
        return Ok(None);
    }

    let resolved = resolve_url(&ctx.server.base_url, raw, key)?;

    // Change test: resolved URL differs OR source id differs.
    let unchanged = record.url_field(path).is_some_and(|stored| {
        stored.value == resolved && stored.source == ctx.server.id
    });
    if unchanged {
        return Ok(None);
    }

    let mut patch = RecordPatch::default();
    patch.set_url(path, Sourced::new(resolved, ctx.server.id.clone()));
    patch.strip_locked(&record.locks);
    if patch.is_empty() {
        return Ok(None);
    }

    ctx.store.upsert_patch(key, patch).await?;
    debug!(key = %key, group = %group, server = %ctx.server.id, "url field written");
    Ok(Some(group))
}
