//! Synchronizer for the identity/metadata document.

use chrono::{DateTime, Utc};
use conflux_model::{
    CanonicalRecord, FieldGroup, FieldPath, MetadataDocument, RecordPatch,
    Sourced, TitleAssets, TitleKey,
};
use serde_json::Value;
use tracing::debug;

use crate::arbiter;
use crate::error::{Result, SyncError};
use crate::fetch::FetchOptions;

use super::{SyncContext, resolve_url};

/// Pull the metadata document this server advertises and write it if
/// the server reports a newer `last_updated` or the document deeply
/// differs from the stored one.
pub async fn sync_metadata(
    ctx: &SyncContext<'_>,
    key: &TitleKey,
    assets: &TitleAssets,
    record: &CanonicalRecord,
) -> Result<Option<FieldGroup>> {
    let Some(raw) = assets.metadata_url.as_deref() else {
        return Ok(None);
    };
    if !arbiter::may_write(ctx.index, key, FieldGroup::Metadata, &ctx.server.id)
    {
        return Ok(None);
    }
    // The whole group is one lockable path; skipping before the fetch
    // saves a round trip the lock strip would discard anyway.
    if record.locks.is_locked(FieldPath::Metadata) {
        return Ok(None);
    }

    let resolved = resolve_url(&ctx.server.base_url, raw, key)?;
    let fetched = ctx.fetch.fetch(&resolved, FetchOptions::json()).await?;
    let value = fetched.payload.into_json().ok_or_else(|| {
        SyncError::payload(&resolved, "metadata payload is not JSON")
    })?;
    let document = parse_document(value);

    let changed = match &record.fields.metadata {
        Some(stored) => {
            reported_newer(&document, &stored.value) || stored.value != document
        }
        None => true,
    };
    if !changed {
        return Ok(None);
    }

    let patch = RecordPatch {
        metadata: Some(Sourced::new(document, ctx.server.id.clone())),
        ..Default::default()
    };
    ctx.store.upsert_patch(key, patch).await?;
    debug!(key = %key, server = %ctx.server.id, "metadata written");
    Ok(Some(FieldGroup::Metadata))
}

fn parse_document(value: Value) -> MetadataDocument {
    let last_updated = value
        .get("last_updated")
        .or_else(|| value.get("lastUpdated"))
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<DateTime<Utc>>().ok());
    MetadataDocument {
        last_updated,
        fields: value,
    }
}

fn reported_newer(new: &MetadataDocument, stored: &MetadataDocument) -> bool {
    match (new.last_updated, stored.last_updated) {
        (Some(new_ts), Some(stored_ts)) => new_ts > stored_ts,
        (Some(_), None) => true,
        _ => false,
    }
}
