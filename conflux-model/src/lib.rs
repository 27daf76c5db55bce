//! Core data model definitions shared across Conflux crates.
#![allow(missing_docs)]

pub mod error;
pub mod fields;
pub mod ids;
pub mod keys;
pub mod media_kind;
pub mod patch;
pub mod prelude;
pub mod record;
pub mod results;
pub mod snapshot;

// Intentionally curated re-exports for downstream consumers.
pub use error::{ModelError, Result as ModelResult};
pub use fields::{FieldGroup, FieldPath, LanguageCode};
pub use ids::{RecordId, ServerId};
pub use keys::TitleKey;
pub use media_kind::MediaKind;
pub use patch::{CaptionsPatch, RecordPatch, TechnicalPatch};
pub use record::{
    CanonicalFields, CanonicalRecord, CaptionEntry, LockSet, Sourced,
};
pub use results::{
    KindCounts, RunReport, SyncHistoryEntry, SyncOutcome, TitleError,
};
pub use snapshot::{
    Dimensions, MediaQuality, MetadataDocument, ServerDescriptor,
    ServerSnapshot, SubtitleTrack, TechnicalInfo, TitleAssets,
};
