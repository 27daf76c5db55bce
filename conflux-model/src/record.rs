//! The canonical, merged record and its per-field provenance.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::fields::{FieldPath, LanguageCode};
use crate::ids::{RecordId, ServerId};
use crate::keys::TitleKey;
use crate::media_kind::MediaKind;
use crate::snapshot::{
    Dimensions, MediaQuality, MetadataDocument,
};

/// A field value together with the server that last wrote it.
#[derive(
    Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize,
)]
pub struct Sourced<T> {
    pub value: T,
    pub source: ServerId,
    pub updated_at: DateTime<Utc>,
}

impl<T> Sourced<T> {
    pub fn new(value: T, source: ServerId) -> Self {
        Self {
            value,
            source,
            updated_at: Utc::now(),
        }
    }
}

/// One merged subtitle track in the canonical caption map.
#[derive(
    Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct CaptionEntry {
    pub url: String,
    pub src_lang: Option<String>,
    pub source: ServerId,
}

/// Operator-maintained set of field paths exempt from automatic writes.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct LockSet(BTreeSet<FieldPath>);

impl LockSet {
    pub fn lock(&mut self, path: FieldPath) {
        self.0.insert(path);
    }

    pub fn unlock(&mut self, path: FieldPath) {
        self.0.remove(&path);
    }

    pub fn is_locked(&self, path: FieldPath) -> bool {
        self.0.contains(&path)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Technical sub-fields, each independently sourced from whichever
/// server last won the technical group.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct TechnicalFields {
    pub dimensions: Option<Dimensions>,
    pub duration_secs: Option<f64>,
    pub hdr: Option<bool>,
    pub quality: Option<MediaQuality>,
    pub size_bytes: Option<u64>,
    pub media_last_modified: Option<DateTime<Utc>>,
    pub source: Option<ServerId>,
}

/// Every independently sourced field of a canonical record.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct CanonicalFields {
    pub metadata: Option<Sourced<MetadataDocument>>,
    pub video_url: Option<Sourced<String>>,
    pub poster_url: Option<Sourced<String>>,
    pub backdrop_url: Option<Sourced<String>>,
    pub logo_url: Option<Sourced<String>>,
    pub chapters_url: Option<Sourced<String>>,
    pub captions: BTreeMap<LanguageCode, CaptionEntry>,
    /// Deterministic language order: primary language first, remaining
    /// codes lexicographic. Recomputed on every caption write.
    pub caption_order: Vec<LanguageCode>,
    /// Source of the primary caption entry (first in `caption_order`).
    pub caption_source: Option<ServerId>,
    pub technical: TechnicalFields,
}

/// The single merged, persisted record per title/season/episode.
///
/// Created once by the bootstrapper and only ever field-patched after
/// that; discovery provenance is set at creation and never overwritten.
#[derive(
    Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize,
)]
pub struct CanonicalRecord {
    pub id: RecordId,
    pub kind: MediaKind,
    pub key: TitleKey,
    pub title: String,
    pub original_title: String,
    pub initial_discovery_server: ServerId,
    pub initial_discovery_date: DateTime<Utc>,
    pub fields: CanonicalFields,
    pub locks: LockSet,
}

impl CanonicalRecord {
    /// Minimal placeholder shape inserted by the bootstrapper.
    pub fn placeholder(key: TitleKey, discovered_by: ServerId) -> Self {
        let title = key.title().to_string();
        Self {
            id: RecordId::new(),
            kind: key.kind(),
            key,
            original_title: title.clone(),
            title,
            initial_discovery_server: discovered_by,
            initial_discovery_date: Utc::now(),
            fields: CanonicalFields::default(),
            locks: LockSet::default(),
        }
    }

    /// The stored sourced-URL slot for a single-URL field path.
    pub fn url_field(&self, path: FieldPath) -> Option<&Sourced<String>> {
        match path {
            FieldPath::VideoUrl => self.fields.video_url.as_ref(),
            FieldPath::PosterUrl => self.fields.poster_url.as_ref(),
            FieldPath::BackdropUrl => self.fields.backdrop_url.as_ref(),
            FieldPath::LogoUrl => self.fields.logo_url.as_ref(),
            FieldPath::ChaptersUrl => self.fields.chapters_url.as_ref(),
            _ => None,
        }
    }
}
