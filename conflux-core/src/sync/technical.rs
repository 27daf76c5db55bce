//! Synchronizer for technical video characteristics.
//!
//! A server need not supply every sub-field; present sub-fields are
//! merged over the stored ones. The change test fires when any present
//! sub-field deeply differs, when the winning server differs from the
//! recorded source, or when the advertised media timestamp is strictly
//! newer than the stored one.

use conflux_model::{
    CanonicalRecord, FieldGroup, RecordPatch, TechnicalInfo, TechnicalPatch,
    TitleAssets, TitleKey,
};
use tracing::debug;

use crate::arbiter;
use crate::error::Result;

use super::SyncContext;

pub async fn sync_technical(
    ctx: &SyncContext<'_>,
    key: &TitleKey,
    assets: &TitleAssets,
    record: &CanonicalRecord,
) -> Result<Option<FieldGroup>> {
    let Some(info) = assets.technical.as_ref().filter(|t| !t.is_empty())
    else {
        return Ok(None);
    };
    if !arbiter::may_write(
        ctx.index,
        key,
        FieldGroup::TechnicalInfo,
        &ctx.server.id,
    ) {
        return Ok(None);
    }

    if !change_test(info, record, ctx) {
        return Ok(None);
    }

    let mut patch = RecordPatch {
        technical: Some(TechnicalPatch {
            dimensions: info.dimensions,
            duration_secs: info.duration_secs,
            hdr: info.hdr,
            quality: info.quality.clone(),
            size_bytes: info.size_bytes,
            media_last_modified: info.media_last_modified,
            source: ctx.server.id.clone(),
        }),
        ..Default::default()
    };
    patch.strip_locked(&record.locks);
    if patch.is_empty() {
        return Ok(None);
    }

    ctx.store.upsert_patch(key, patch).await?;
    debug!(key = %key, server = %ctx.server.id, "technical info written");
    Ok(Some(FieldGroup::TechnicalInfo))
}

fn change_test(
    info: &TechnicalInfo,
    record: &CanonicalRecord,
    ctx: &SyncContext<'_>,
) -> bool {
    let stored = &record.fields.technical;

    let source_differs = stored.source.as_ref() != Some(&ctx.server.id);

    let strictly_newer = match (
        info.media_last_modified,
        stored.media_last_modified,
    ) {
        (Some(new), Some(old)) => new > old,
        (Some(_), None) => true,
        _ => false,
    };

    let subfield_differs = info
        .dimensions
        .is_some_and(|d| stored.dimensions != Some(d))
        || info
            .duration_secs
            .is_some_and(|d| stored.duration_secs != Some(d))
        || info.hdr.is_some_and(|h| stored.hdr != Some(h))
        || info
            .quality
            .as_ref()
            .is_some_and(|q| stored.quality.as_ref() != Some(q))
        || info
            .size_bytes
            .is_some_and(|s| stored.size_bytes != Some(s));

    subfield_differs || source_differs || strictly_newer
}
