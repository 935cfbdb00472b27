//! Catalog content types shared by the stores, the playback engine and the gateways.

use crate::view::ViewType;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The three kinds of playable content in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Volume,
    Single,
    Article,
}

impl ContentKind {
    /// Stable identifier used for cache rows and remote endpoints.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Volume => "vols",
            Self::Single => "singles",
            Self::Article => "articles",
        }
    }

    /// The paged collection view listing this kind.
    #[must_use]
    pub const fn collection_view(self) -> ViewType {
        match self {
            Self::Volume => ViewType::Vols,
            Self::Single => ViewType::Singles,
            Self::Article => ViewType::Articles,
        }
    }

    /// The detail view for one item of this kind.
    #[must_use]
    pub const fn info_view(self) -> ViewType {
        match self {
            Self::Volume => ViewType::VolInfo,
            Self::Single => ViewType::SingleInfo,
            Self::Article => ViewType::ArticleInfo,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content-agnostic track information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMeta {
    pub name: String,
    pub artist: String,
    pub album: String,
    pub cover: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyric: Option<String>,
}

/// Anything that carries a playable track.
pub trait Track {
    fn meta(&self) -> &TrackMeta;
}

impl Track for TrackMeta {
    fn meta(&self) -> &TrackMeta {
        self
    }
}

/// A collection item that can be cached, fetched and paged.
///
/// `sort_key` is the reconciliation key: the newest persisted key is what the
/// remote source is asked to fetch past.
pub trait Content: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const KIND: ContentKind;

    fn id(&self) -> u64;

    fn sort_key(&self) -> i64;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolTrack {
    pub id: u64,
    pub vol: u32,
    pub color: String,
    #[serde(flatten)]
    pub meta: TrackMeta,
}

impl Track for VolTrack {
    fn meta(&self) -> &TrackMeta {
        &self.meta
    }
}

/// A themed multi-track release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolInfo {
    pub id: u64,
    pub vol: u32,
    pub title: String,
    pub link: String,
    pub cover: String,
    pub color: String,
    pub author: String,
    pub author_avatar: String,
    pub date: String,
    pub desc: String,
    pub tags: Vec<String>,
    pub similar_vols: Vec<u32>,
    pub tracks: Vec<VolTrack>,
}

impl Content for VolInfo {
    const KIND: ContentKind = ContentKind::Volume;

    fn id(&self) -> u64 {
        self.id
    }

    fn sort_key(&self) -> i64 {
        i64::from(self.vol)
    }
}

/// A standalone one-track recommendation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Single {
    pub id: u64,
    #[serde(default)]
    pub desc: String,
    /// Publication date as a sortable integer (e.g. `20181224`).
    pub date: i64,
    #[serde(default)]
    pub recommender: String,
    #[serde(default)]
    pub color: String,
    #[serde(flatten)]
    pub meta: TrackMeta,
}

impl Track for Single {
    fn meta(&self) -> &TrackMeta {
        &self.meta
    }
}

impl Content for Single {
    const KIND: ContentKind = ContentKind::Single;

    fn id(&self) -> u64 {
        self.id
    }

    fn sort_key(&self) -> i64 {
        self.date
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleTrack {
    pub id: u64,
    pub article_id: u64,
    pub color: String,
    #[serde(flatten)]
    pub meta: TrackMeta,
}

impl Track for ArticleTrack {
    fn meta(&self) -> &TrackMeta {
        &self.meta
    }
}

/// An editorial piece with zero or more embedded tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArticleInfo {
    pub id: u64,
    pub title: String,
    pub cover: String,
    pub intro: String,
    pub color: String,
    pub meta_info: String,
    pub date: String,
    pub url: String,
    pub desc: String,
    pub author: String,
    pub author_avatar: String,
    pub tracks: Vec<ArticleTrack>,
}

impl Content for ArticleInfo {
    const KIND: ContentKind = ContentKind::Article;

    fn id(&self) -> u64 {
        self.id
    }

    fn sort_key(&self) -> i64 {
        i64::try_from(self.id).unwrap_or(i64::MAX)
    }
}
