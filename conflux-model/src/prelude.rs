//! Convenience re-exports for downstream crates and tests.

pub use crate::error::{ModelError, Result as ModelResult};
pub use crate::fields::{FieldGroup, FieldPath, LanguageCode};
pub use crate::ids::{RecordId, ServerId};
pub use crate::keys::TitleKey;
pub use crate::media_kind::MediaKind;
pub use crate::patch::{CaptionsPatch, RecordPatch, TechnicalPatch};
pub use crate::record::{
    CanonicalFields, CanonicalRecord, CaptionEntry, LockSet, Sourced,
    TechnicalFields,
};
pub use crate::results::{
    KindCounts, RunReport, SyncHistoryEntry, SyncOutcome, TitleError,
};
pub use crate::snapshot::{
    Dimensions, MediaQuality, MetadataDocument, ServerDescriptor,
    ServerSnapshot, SubtitleTrack, TechnicalInfo, TitleAssets,
};
