//! X API v2 `/2/tweets/search/recent` response shapes.
//!
//! Missing `Option` fields deserialize as `None`; list-valued fields default
//! to empty.
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SearchResponse {
    /// Kept untyped so one malformed tweet does not fail the whole page.
    pub data: Vec<Value>,
    pub includes: Includes,
    pub meta: Meta,
    /// Partial errors reported alongside a 200.
    pub errors: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Meta {
    pub next_token: Option<String>,
    pub result_count: Option<u64>,
}

/// Objects expanded out of the tweets, referenced by id or media key.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Includes {
    pub users: Vec<User>,
    pub media: Vec<MediaItem>,
}

impl Includes {
    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn media(&self, key: &str) -> Option<&MediaItem> {
        self.media
            .iter()
            .find(|m| m.media_key.as_deref() == Some(key))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaItem {
    pub media_key: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<String>,
    pub preview_image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub created_at: Option<String>,
    pub entities: Option<Entities>,
    pub attachments: Option<Attachments>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Attachments {
    pub media_keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Entities {
    pub urls: Vec<UrlEntity>,
    pub mentions: Vec<MentionEntity>,
    pub hashtags: Vec<HashtagEntity>,
}

/// Offsets are code points into the tweet text, end exclusive.
#[derive(Debug, Clone, Deserialize)]
pub struct UrlEntity {
    pub start: usize,
    pub end: usize,
    pub url: Option<String>,
    pub expanded_url: Option<String>,
    pub display_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MentionEntity {
    pub start: usize,
    pub end: usize,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HashtagEntity {
    pub start: usize,
    pub end: usize,
    pub tag: String,
}
