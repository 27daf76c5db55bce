//! Server-side inventory types and the snapshot ingestion boundary.
//!
//! Upstream file servers advertise loosely shaped JSON: `dimensions` may
//! be a plain object or keyed by quality variant, `length` may be a
//! number or a per-quality map, subtitle entries may be bare URL strings
//! or objects. All of that is normalized here, once, so synchronizers
//! only ever see resolved values.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use url::Url;

use crate::error::{ModelError, Result};
use crate::fields::{FieldGroup, LanguageCode};
use crate::ids::ServerId;
use crate::keys::TitleKey;

/// A configured upstream file server.
///
/// `priority` is a total order over servers (lower number = higher
/// precedence) used to order per-field availability lists; it is never
/// consulted globally. Duplicate priorities are rejected at config load.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ServerDescriptor {
    pub id: ServerId,
    pub priority: u32,
    pub base_url: Url,
}

/// One language's subtitle track as advertised by a server.
#[derive(
    Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct SubtitleTrack {
    pub url: String,
    pub src_lang: Option<String>,
}

/// Pixel dimensions of the primary video asset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Codec/quality descriptors reported alongside the playable asset.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct MediaQuality {
    pub resolution: Option<String>,
    pub codec: Option<String>,
    pub dolby_vision: Option<bool>,
    pub hdr10: Option<bool>,
}

/// Technical characteristics of the playable asset.
///
/// A server need not supply all sub-fields; absent ones are simply not
/// merged into the canonical record.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct TechnicalInfo {
    pub dimensions: Option<Dimensions>,
    pub duration_secs: Option<f64>,
    pub hdr: Option<bool>,
    pub quality: Option<MediaQuality>,
    pub size_bytes: Option<u64>,
    pub media_last_modified: Option<DateTime<Utc>>,
}

impl TechnicalInfo {
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_none()
            && self.duration_secs.is_none()
            && self.hdr.is_none()
            && self.quality.is_none()
            && self.size_bytes.is_none()
            && self.media_last_modified.is_none()
    }
}

/// A fetched identity/metadata payload for one title.
#[derive(
    Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize,
)]
pub struct MetadataDocument {
    pub last_updated: Option<DateTime<Utc>>,
    pub fields: Value,
}

/// Everything one server advertises for one title.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct TitleAssets {
    pub metadata_url: Option<String>,
    pub video_url: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub logo_url: Option<String>,
    pub chapters_url: Option<String>,
    pub subtitles: BTreeMap<LanguageCode, SubtitleTrack>,
    pub technical: Option<TechnicalInfo>,
}

impl TitleAssets {
    /// Whether this server advertises anything for the given group.
    pub fn advertises(&self, group: FieldGroup) -> bool {
        match group {
            FieldGroup::Metadata => self.metadata_url.is_some(),
            FieldGroup::VideoUrl => self.video_url.is_some(),
            FieldGroup::Poster => self.poster_url.is_some(),
            FieldGroup::Backdrop => self.backdrop_url.is_some(),
            FieldGroup::Logo => self.logo_url.is_some(),
            FieldGroup::Chapters => self.chapters_url.is_some(),
            FieldGroup::Captions => !self.subtitles.is_empty(),
            FieldGroup::TechnicalInfo => {
                self.technical.as_ref().is_some_and(|t| !t.is_empty())
            }
        }
    }

    /// The raw (possibly relative) URL backing a single-URL group.
    pub fn url_for(&self, group: FieldGroup) -> Option<&str> {
        match group {
            FieldGroup::Metadata => self.metadata_url.as_deref(),
            FieldGroup::VideoUrl => self.video_url.as_deref(),
            FieldGroup::Poster => self.poster_url.as_deref(),
            FieldGroup::Backdrop => self.backdrop_url.as_deref(),
            FieldGroup::Logo => self.logo_url.as_deref(),
            FieldGroup::Chapters => self.chapters_url.as_deref(),
            FieldGroup::Captions | FieldGroup::TechnicalInfo => None,
        }
    }
}

/// One server's current advertised inventory, flattened to title keys.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ServerSnapshot {
    pub server: ServerId,
    pub titles: BTreeMap<TitleKey, TitleAssets>,
}

impl ServerSnapshot {
    pub fn new(server: ServerId) -> Self {
        Self {
            server,
            titles: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: TitleKey, assets: TitleAssets) {
        self.titles.insert(key, assets);
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Ingest a raw inventory document as served by a file server.
    ///
    /// Expected top-level shape: `{"movies": {title: assets},
    /// "shows": {show: assets + "seasons": {n: assets + "episodes":
    /// {n: assets}}}}`. Unknown keys are ignored; malformed asset
    /// values fail the whole ingestion rather than silently dropping
    /// titles.
    pub fn from_value(server: ServerId, raw: &Value) -> Result<Self> {
        let mut snapshot = ServerSnapshot::new(server);

        let obj = raw.as_object().ok_or_else(|| {
            ModelError::InvalidSnapshot("inventory root is not an object".into())
        })?;

        if let Some(movies) = obj.get("movies").and_then(Value::as_object) {
            for (title, entry) in movies {
                let assets = parse_assets(entry)?;
                snapshot.insert(TitleKey::movie(title.clone()), assets);
            }
        }

        if let Some(shows) = obj.get("shows").and_then(Value::as_object) {
            for (show, entry) in shows {
                let assets = parse_assets(entry)?;
                snapshot.insert(TitleKey::show(show.clone()), assets);

                let Some(seasons) =
                    entry.get("seasons").and_then(Value::as_object)
                else {
                    continue;
                };
                for (season_no, season_entry) in seasons {
                    let season = parse_number_key(season_no, "season")?;
                    let season_assets = parse_assets(season_entry)?;
                    snapshot.insert(
                        TitleKey::season(show.clone(), season),
                        season_assets,
                    );

                    let Some(episodes) =
                        season_entry.get("episodes").and_then(Value::as_object)
                    else {
                        continue;
                    };
                    for (episode_no, episode_entry) in episodes {
                        let episode =
                            parse_number_key(episode_no, "episode")?;
                        let episode_assets = parse_assets(episode_entry)?;
                        snapshot.insert(
                            TitleKey::episode(show.clone(), season, episode),
                            episode_assets,
                        );
                    }
                }
            }
        }

        Ok(snapshot)
    }
}

fn parse_number_key(raw: &str, what: &str) -> Result<u32> {
    raw.parse::<u32>().map_err(|_| {
        ModelError::InvalidSnapshot(format!("non-numeric {what} key: {raw}"))
    })
}

fn parse_assets(entry: &Value) -> Result<TitleAssets> {
    let mut assets = TitleAssets::default();
    let Some(obj) = entry.as_object() else {
        return Err(ModelError::InvalidSnapshot(
            "title entry is not an object".into(),
        ));
    };

    if let Some(urls) = obj.get("urls").and_then(Value::as_object) {
        assets.metadata_url = string_field(urls.get("metadata"));
        assets.video_url = string_field(urls.get("mp4"));
        assets.poster_url = string_field(urls.get("poster"));
        assets.backdrop_url = string_field(urls.get("backdrop"));
        assets.logo_url = string_field(urls.get("logo"));
        assets.chapters_url = string_field(urls.get("chapters"));

        if let Some(subs) = urls.get("subtitles").and_then(Value::as_object) {
            for (lang, track) in subs {
                if let Some(parsed) = parse_subtitle(track) {
                    assets
                        .subtitles
                        .insert(LanguageCode::new(lang.clone()), parsed);
                }
            }
        }
    }

    let technical = parse_technical(obj);
    if !technical.is_empty() {
        assets.technical = Some(technical);
    }

    Ok(assets)
}

fn parse_subtitle(track: &Value) -> Option<SubtitleTrack> {
    match track {
        Value::String(url) => Some(SubtitleTrack {
            url: url.clone(),
            src_lang: None,
        }),
        Value::Object(obj) => Some(SubtitleTrack {
            url: obj.get("url")?.as_str()?.to_string(),
            src_lang: obj
                .get("srcLang")
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
        _ => None,
    }
}

fn parse_technical(obj: &serde_json::Map<String, Value>) -> TechnicalInfo {
    let mut info = TechnicalInfo {
        dimensions: obj.get("dimensions").and_then(resolve_dimensions),
        duration_secs: obj
            .get("length")
            .or_else(|| obj.get("duration"))
            .and_then(resolve_duration),
        hdr: obj.get("hdr").and_then(Value::as_bool),
        quality: obj.get("mediaQuality").and_then(parse_quality),
        size_bytes: obj
            .get("additionalMetadata")
            .and_then(|m| m.get("size"))
            .and_then(Value::as_u64),
        media_last_modified: None,
    };

    info.media_last_modified = obj
        .get("urls")
        .and_then(|u| u.get("mediaLastModified"))
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<DateTime<Utc>>().ok());

    info
}

/// `dimensions` arrives either as `{width, height}` or keyed by quality
/// variant (`{"1080p": {width, height}, ...}`). Variant maps resolve to
/// the largest advertised variant.
fn resolve_dimensions(value: &Value) -> Option<Dimensions> {
    let obj = value.as_object()?;
    if obj.contains_key("width") || obj.contains_key("height") {
        // Values outside u32 are garbage, not huge frames.
        return Some(Dimensions {
            width: u32::try_from(obj.get("width")?.as_u64()?).ok()?,
            height: u32::try_from(obj.get("height")?.as_u64()?).ok()?,
        });
    }
    obj.values()
        .filter_map(resolve_dimensions)
        .max_by_key(|d| (d.width, d.height))
}

/// `length`/`duration` arrives either as a number of seconds or keyed by
/// quality variant; variant maps resolve to the longest value.
fn resolve_duration(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(obj) => obj
            .values()
            .filter_map(resolve_duration)
            .max_by(|a, b| a.total_cmp(b)),
        _ => None,
    }
}

fn parse_quality(value: &Value) -> Option<MediaQuality> {
    let obj = value.as_object()?;
    let experience = obj.get("viewingExperience").and_then(Value::as_object);
    Some(MediaQuality {
        resolution: obj
            .get("resolution")
            .and_then(Value::as_str)
            .map(str::to_string),
        codec: obj
            .get("codec")
            .and_then(Value::as_str)
            .map(str::to_string),
        dolby_vision: experience
            .and_then(|e| e.get("dolbyVision"))
            .and_then(Value::as_bool),
        hdr10: experience
            .and_then(|e| e.get("hdr10"))
            .and_then(Value::as_bool),
    })
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}
