use crate::media_kind::MediaKind;

/// Stable identity of a canonical record.
///
/// Movies key on title alone; TV content keys on show title plus season
/// and episode numbers. Keys are what upserts address, so they must stay
/// stable across runs and across servers advertising the same content.
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
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TitleKey {
    Movie { title: String },
    Show { show: String },
    Season { show: String, season: u32 },
    Episode { show: String, season: u32, episode: u32 },
}

impl TitleKey {
    pub fn movie(title: impl Into<String>) -> Self {
        TitleKey::Movie {
            title: title.into(),
        }
    }

    pub fn show(show: impl Into<String>) -> Self {
        TitleKey::Show { show: show.into() }
    }

    pub fn season(show: impl Into<String>, season: u32) -> Self {
        TitleKey::Season {
            show: show.into(),
            season,
        }
    }

    pub fn episode(show: impl Into<String>, season: u32, episode: u32) -> Self {
        TitleKey::Episode {
            show: show.into(),
            season,
            episode,
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            TitleKey::Movie { .. } => MediaKind::Movie,
            TitleKey::Show { .. } => MediaKind::Show,
            TitleKey::Season { .. } => MediaKind::Season,
            TitleKey::Episode { .. } => MediaKind::Episode,
        }
    }

    /// The displayable title this key is anchored on.
    pub fn title(&self) -> &str {
        match self {
            TitleKey::Movie { title } => title,
            TitleKey::Show { show }
            | TitleKey::Season { show, .. }
            | TitleKey::Episode { show, .. } => show,
        }
    }
}

impl std::fmt::Display for TitleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TitleKey::Movie { title } => write!(f, "movie:{title}"),
            TitleKey::Show { show } => write!(f, "show:{show}"),
            TitleKey::Season { show, season } => {
                write!(f, "season:{show}:s{season:02}")
            }
            TitleKey::Episode {
                show,
                season,
                episode,
            } => write!(f, "episode:{show}:s{season:02}e{episode:02}"),
        }
    }
}
