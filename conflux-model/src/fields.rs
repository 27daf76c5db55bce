//! Closed field identifiers used by priority arbitration and locks.
//!
//! The upstream wire shapes address fields by dotted string paths
//! (`urls.poster`, `mediaQuality.viewingExperience...`). Inside the
//! engine those collapse into two small enums: [`FieldGroup`] is the
//! unit a synchronizer owns and the arbiter decides on, [`FieldPath`]
//! is the unit a patch writes and an operator locks.

/// A semantic group of fields handled by one synchronizer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    Metadata,
    VideoUrl,
    Poster,
    Backdrop,
    Logo,
    Chapters,
    Captions,
    TechnicalInfo,
}

impl FieldGroup {
    pub const ALL: [FieldGroup; 8] = [
        FieldGroup::Metadata,
        FieldGroup::VideoUrl,
        FieldGroup::Poster,
        FieldGroup::Backdrop,
        FieldGroup::Logo,
        FieldGroup::Chapters,
        FieldGroup::Captions,
        FieldGroup::TechnicalInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldGroup::Metadata => "metadata",
            FieldGroup::VideoUrl => "video_url",
            FieldGroup::Poster => "poster",
            FieldGroup::Backdrop => "backdrop",
            FieldGroup::Logo => "logo",
            FieldGroup::Chapters => "chapters",
            FieldGroup::Captions => "captions",
            FieldGroup::TechnicalInfo => "technical_info",
        }
    }
}

impl std::fmt::Display for FieldGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An individually writable (and lockable) field of a canonical record.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FieldPath {
    Metadata,
    VideoUrl,
    PosterUrl,
    BackdropUrl,
    LogoUrl,
    ChaptersUrl,
    Captions,
    TechDimensions,
    TechDuration,
    TechHdr,
    TechQuality,
    TechSize,
    TechMediaLastModified,
}

impl FieldPath {
    /// The group a path is arbitrated under.
    pub fn group(&self) -> FieldGroup {
        match self {
            FieldPath::Metadata => FieldGroup::Metadata,
            FieldPath::VideoUrl => FieldGroup::VideoUrl,
            FieldPath::PosterUrl => FieldGroup::Poster,
            FieldPath::BackdropUrl => FieldGroup::Backdrop,
            FieldPath::LogoUrl => FieldGroup::Logo,
            FieldPath::ChaptersUrl => FieldGroup::Chapters,
            FieldPath::Captions => FieldGroup::Captions,
            FieldPath::TechDimensions
            | FieldPath::TechDuration
            | FieldPath::TechHdr
            | FieldPath::TechQuality
            | FieldPath::TechSize
            | FieldPath::TechMediaLastModified => FieldGroup::TechnicalInfo,
        }
    }
}

/// BCP-47-ish language code for subtitle tracks ("en", "fr", "pt-BR").
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct LanguageCode(pub String);

impl LanguageCode {
    pub fn new(code: impl Into<String>) -> Self {
        LanguageCode(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LanguageCode {
    fn from(value: &str) -> Self {
        LanguageCode(value.to_string())
    }
}
