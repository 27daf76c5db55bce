//! Partial, `$set`-style record updates built by field synchronizers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::fields::{FieldGroup, FieldPath, LanguageCode};
use crate::ids::ServerId;
use crate::record::{
    CanonicalRecord, CaptionEntry, LockSet, Sourced,
};
use crate::snapshot::{Dimensions, MediaQuality, MetadataDocument};

/// Partial technical-info update; only present sub-fields are merged.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TechnicalPatch {
    pub dimensions: Option<Dimensions>,
    pub duration_secs: Option<f64>,
    pub hdr: Option<bool>,
    pub quality: Option<MediaQuality>,
    pub size_bytes: Option<u64>,
    pub media_last_modified: Option<DateTime<Utc>>,
    pub source: ServerId,
}

impl TechnicalPatch {
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_none()
            && self.duration_secs.is_none()
            && self.hdr.is_none()
            && self.quality.is_none()
            && self.size_bytes.is_none()
            && self.media_last_modified.is_none()
    }
}

/// Full replacement of the caption map plus recomputed order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CaptionsPatch {
    pub entries: BTreeMap<LanguageCode, CaptionEntry>,
    pub order: Vec<LanguageCode>,
    pub primary_source: Option<ServerId>,
}

/// A partial update for one canonical record.
///
/// Synchronizers populate only the slots whose change test fired, then
/// strip operator-locked paths before the patch reaches the store.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct RecordPatch {
    pub metadata: Option<Sourced<MetadataDocument>>,
    pub video_url: Option<Sourced<String>>,
    pub poster_url: Option<Sourced<String>>,
    pub backdrop_url: Option<Sourced<String>>,
    pub logo_url: Option<Sourced<String>>,
    pub chapters_url: Option<Sourced<String>>,
    pub captions: Option<CaptionsPatch>,
    pub technical: Option<TechnicalPatch>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.metadata.is_none()
            && self.video_url.is_none()
            && self.poster_url.is_none()
            && self.backdrop_url.is_none()
            && self.logo_url.is_none()
            && self.chapters_url.is_none()
            && self.captions.is_none()
            && self.technical.as_ref().is_none_or(TechnicalPatch::is_empty)
    }

    pub fn set_url(&mut self, path: FieldPath, value: Sourced<String>) {
        match path {
            FieldPath::VideoUrl => self.video_url = Some(value),
            FieldPath::PosterUrl => self.poster_url = Some(value),
            FieldPath::BackdropUrl => self.backdrop_url = Some(value),
            FieldPath::LogoUrl => self.logo_url = Some(value),
            FieldPath::ChaptersUrl => self.chapters_url = Some(value),
            _ => {}
        }
    }

    /// Drop any slot whose path the operator has locked. Locked
    /// technical sub-fields are dropped individually; the rest of the
    /// technical patch survives.
    pub fn strip_locked(&mut self, locks: &LockSet) {
        if locks.is_empty() {
            return;
        }
        if locks.is_locked(FieldPath::Metadata) {
            self.metadata = None;
        }
        if locks.is_locked(FieldPath::VideoUrl) {
            self.video_url = None;
        }
        if locks.is_locked(FieldPath::PosterUrl) {
            self.poster_url = None;
        }
        if locks.is_locked(FieldPath::BackdropUrl) {
            self.backdrop_url = None;
        }
        if locks.is_locked(FieldPath::LogoUrl) {
            self.logo_url = None;
        }
        if locks.is_locked(FieldPath::ChaptersUrl) {
            self.chapters_url = None;
        }
        if locks.is_locked(FieldPath::Captions) {
            self.captions = None;
        }
        if let Some(tech) = self.technical.as_mut() {
            if locks.is_locked(FieldPath::TechDimensions) {
                tech.dimensions = None;
            }
            if locks.is_locked(FieldPath::TechDuration) {
                tech.duration_secs = None;
            }
            if locks.is_locked(FieldPath::TechHdr) {
                tech.hdr = None;
            }
            if locks.is_locked(FieldPath::TechQuality) {
                tech.quality = None;
            }
            if locks.is_locked(FieldPath::TechSize) {
                tech.size_bytes = None;
            }
            if locks.is_locked(FieldPath::TechMediaLastModified) {
                tech.media_last_modified = None;
            }
            if tech.is_empty() {
                self.technical = None;
            }
        }
    }

    /// Field groups this patch would write, for result reporting.
    pub fn groups(&self) -> Vec<FieldGroup> {
        let mut groups = Vec::new();
        if self.metadata.is_some() {
            groups.push(FieldGroup::Metadata);
        }
        if self.video_url.is_some() {
            groups.push(FieldGroup::VideoUrl);
        }
        if self.poster_url.is_some() {
            groups.push(FieldGroup::Poster);
        }
        if self.backdrop_url.is_some() {
            groups.push(FieldGroup::Backdrop);
        }
        if self.logo_url.is_some() {
            groups.push(FieldGroup::Logo);
        }
        if self.chapters_url.is_some() {
            groups.push(FieldGroup::Chapters);
        }
        if self.captions.is_some() {
            groups.push(FieldGroup::Captions);
        }
        if self.technical.as_ref().is_some_and(|t| !t.is_empty()) {
            groups.push(FieldGroup::TechnicalInfo);
        }
        groups
    }

    /// Apply this patch in place. Discovery provenance and locks are
    /// never touched; absent slots leave stored values as they are.
    pub fn apply_to(&self, record: &mut CanonicalRecord) {
        if let Some(metadata) = &self.metadata {
            record.fields.metadata = Some(metadata.clone());
        }
        if let Some(url) = &self.video_url {
            record.fields.video_url = Some(url.clone());
        }
        if let Some(url) = &self.poster_url {
            record.fields.poster_url = Some(url.clone());
        }
        if let Some(url) = &self.backdrop_url {
            record.fields.backdrop_url = Some(url.clone());
        }
        if let Some(url) = &self.logo_url {
            record.fields.logo_url = Some(url.clone());
        }
        if let Some(url) = &self.chapters_url {
            record.fields.chapters_url = Some(url.clone());
        }
        if let Some(captions) = &self.captions {
            record.fields.captions = captions.entries.clone();
            record.fields.caption_order = captions.order.clone();
            record.fields.caption_source = captions.primary_source.clone();
        }
        if let Some(tech) = &self.technical {
            let stored = &mut record.fields.technical;
            if let Some(dimensions) = tech.dimensions {
                stored.dimensions = Some(dimensions);
            }
            if let Some(duration) = tech.duration_secs {
                stored.duration_secs = Some(duration);
            }
            if let Some(hdr) = tech.hdr {
                stored.hdr = Some(hdr);
            }
            if let Some(quality) = &tech.quality {
                stored.quality = Some(quality.clone());
            }
            if let Some(size) = tech.size_bytes {
                stored.size_bytes = Some(size);
            }
            if let Some(modified) = tech.media_last_modified {
                stored.media_last_modified = Some(modified);
            }
            stored.source = Some(tech.source.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::TitleKey;

    fn patch_with_poster(url: &str) -> RecordPatch {
        let mut patch = RecordPatch::default();
        patch.set_url(
            FieldPath::PosterUrl,
            Sourced::new(url.to_string(), ServerId::from("alpha")),
        );
        patch
    }

    #[test]
    fn strip_locked_removes_only_locked_slots() {
        let mut patch = patch_with_poster("http://a/p.jpg");
        patch.set_url(
            FieldPath::BackdropUrl,
            Sourced::new("http://a/b.jpg".into(), ServerId::from("alpha")),
        );

        let mut locks = LockSet::default();
        locks.lock(FieldPath::PosterUrl);
        patch.strip_locked(&locks);

        assert!(patch.poster_url.is_none());
        assert!(patch.backdrop_url.is_some());
        assert!(!patch.is_empty());
    }

    #[test]
    fn technical_patch_emptied_by_locks_drops_out() {
        let mut patch = RecordPatch {
            technical: Some(TechnicalPatch {
                dimensions: None,
                duration_secs: Some(60.0),
                hdr: None,
                quality: None,
                size_bytes: None,
                media_last_modified: None,
                source: ServerId::from("alpha"),
            }),
            ..Default::default()
        };
        let mut locks = LockSet::default();
        locks.lock(FieldPath::TechDuration);
        patch.strip_locked(&locks);
        assert!(patch.technical.is_none());
        assert!(patch.is_empty());
    }

    #[test]
    fn apply_merges_technical_subfields() {
        let mut record = CanonicalRecord::placeholder(
            TitleKey::movie("Heat"),
            ServerId::from("alpha"),
        );
        record.fields.technical.hdr = Some(true);

        let patch = RecordPatch {
            technical: Some(TechnicalPatch {
                dimensions: None,
                duration_secs: Some(10_230.0),
                hdr: None,
                quality: None,
                size_bytes: None,
                media_last_modified: None,
                source: ServerId::from("beta"),
            }),
            ..Default::default()
        };
        patch.apply_to(&mut record);

        // Present sub-fields merge; absent ones keep stored values.
        assert_eq!(record.fields.technical.hdr, Some(true));
        assert_eq!(record.fields.technical.duration_secs, Some(10_230.0));
        assert_eq!(
            record.fields.technical.source,
            Some(ServerId::from("beta"))
        );
    }
}
