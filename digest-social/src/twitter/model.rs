//! Backend-neutral post model.
//!
//! Both upstream shapes are normalised into these types by
//! [`crate::twitter::extract`]; nothing downstream looks at wire JSON.
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowercase a handle and drop any leading `@`.
pub fn normalize_handle(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_lowercase()
}

/// Content author. Equality and hashing go through the lowercase handle
/// because upstreams disagree about casing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub handle: String,
    pub display_name: String,
    pub avatar_url: String,
}

impl Account {
    pub fn key(&self) -> String {
        normalize_handle(&self.handle)
    }

    pub fn profile_url(&self) -> String {
        format!("https://x.com/{}", self.handle)
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Account {}

impl Hash for Account {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    AnimatedGif,
    Other,
}

impl MediaKind {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "photo" => MediaKind::Photo,
            "video" => MediaKind::Video,
            "animated_gif" => MediaKind::AnimatedGif,
            _ => MediaKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
    pub kind: MediaKind,
    /// Still image for videos and GIFs; photos use `url` directly.
    pub preview_url: Option<String>,
}

impl Media {
    /// Image that can be shown inline in an email, if any.
    pub fn display_image(&self) -> Option<&str> {
        match self.kind {
            MediaKind::Photo => Some(self.url.as_str()).filter(|u| !u.is_empty()),
            _ => self.preview_url.as_deref().filter(|u| !u.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Url,
    Mention,
    Hashtag,
}

/// Offset-addressed substring of a post's raw text that becomes a link.
///
/// `start..end` are character (not byte) offsets into the unmodified text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub start: usize,
    pub end: usize,
    pub kind: EntityKind,
    /// Link text.
    pub display: String,
    /// Link destination.
    pub href: String,
}

impl EntitySpan {
    pub fn url(start: usize, end: usize, display: &str, href: &str) -> Self {
        Self {
            start,
            end,
            kind: EntityKind::Url,
            display: display.to_string(),
            href: href.to_string(),
        }
    }

    pub fn mention(start: usize, end: usize, handle: &str) -> Self {
        Self {
            start,
            end,
            kind: EntityKind::Mention,
            display: format!("@{handle}"),
            href: format!("https://x.com/{handle}"),
        }
    }

    pub fn hashtag(start: usize, end: usize, tag: &str) -> Self {
        Self {
            start,
            end,
            kind: EntityKind::Hashtag,
            display: format!("#{tag}"),
            href: format!("https://x.com/hashtag/{tag}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub text: String,
    /// Always UTC.
    pub created_at: DateTime<Utc>,
    pub author: Account,
    pub media: Vec<Media>,
    pub url: String,
    pub entities: Vec<EntitySpan>,
}

impl Post {
    pub fn permalink(handle: &str, id: &str) -> String {
        format!("https://x.com/{handle}/status/{id}")
    }
}

const LEGACY_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Parse an upstream timestamp into UTC.
///
/// Accepts RFC 3339 / ISO-8601 (`2024-11-29T00:17:53.000Z`), naive ISO
/// (treated as UTC) and the legacy `Fri Nov 29 00:17:53 +0000 2024` form.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, LEGACY_FORMAT) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
