//! Normalise upstream tweet JSON into [`Post`]s.
//!
//! Every function here works on a single tweet so the caller can skip a
//! malformed one and keep the rest of the page.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::twitter::io_types::{IoEntities, IoTweet};
use crate::twitter::model::{Account, EntitySpan, Media, MediaKind, Post, parse_timestamp};
use crate::twitter::types::{Entities, Includes, Tweet};

/// Parse a timestamp, falling back to "now" so one odd value never drops a post.
fn created_at_or_now(raw: Option<&str>, post_id: &str) -> DateTime<Utc> {
    match raw.and_then(parse_timestamp) {
        Some(ts) => ts,
        None => {
            tracing::warn!(
                post_id,
                raw = raw.unwrap_or(""),
                "extract.timestamp_unparseable; using now"
            );
            Utc::now()
        }
    }
}

/// Convert one twitterapi.io `advanced_search` tweet.
pub fn post_from_io(value: &Value) -> Result<Post> {
    let tweet: IoTweet =
        serde_json::from_value(value.clone()).context("malformed twitterapi.io tweet")?;
    if tweet.author.user_name.trim().is_empty() {
        anyhow::bail!("tweet {} has an empty author userName", tweet.id);
    }

    let handle = tweet.author.user_name.clone();
    let author = Account {
        id: tweet.author.id.clone(),
        display_name: tweet.author.name.clone().unwrap_or_else(|| handle.clone()),
        avatar_url: tweet.author.profile_picture.clone().unwrap_or_default(),
        handle: handle.clone(),
    };

    let media = tweet
        .extended_entities
        .as_ref()
        .map(|ext| {
            ext.media
                .iter()
                .filter_map(|m| {
                    let url = m.media_url_https.clone().or_else(|| m.url.clone())?;
                    let kind = MediaKind::from_wire(m.kind.as_deref().unwrap_or("photo"));
                    let preview_url = match kind {
                        MediaKind::Photo => None,
                        _ => m.media_url_https.clone(),
                    };
                    Some(Media {
                        url,
                        kind,
                        preview_url,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let url = tweet
        .url
        .clone()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| Post::permalink(&handle, &tweet.id));

    Ok(Post {
        created_at: created_at_or_now(tweet.created_at.as_deref(), &tweet.id),
        entities: tweet.entities.as_ref().map(spans_from_io).unwrap_or_default(),
        id: tweet.id,
        text: tweet.text,
        author,
        media,
        url,
    })
}

/// twitterapi.io entities carry `[start, end]` index pairs.
pub fn spans_from_io(entities: &IoEntities) -> Vec<EntitySpan> {
    fn bounds(indices: &[usize]) -> Option<(usize, usize)> {
        match indices {
            [start, end, ..] if start < end => Some((*start, *end)),
            _ => None,
        }
    }

    let mut spans = Vec::new();
    for u in &entities.urls {
        let Some((start, end)) = bounds(&u.indices) else {
            continue;
        };
        let Some(href) = u.expanded_url.as_deref().or(u.url.as_deref()) else {
            continue;
        };
        let display = u.display_url.as_deref().unwrap_or(href);
        spans.push(EntitySpan::url(start, end, display, href));
    }
    for m in &entities.user_mentions {
        if let (Some((start, end)), Some(name)) = (bounds(&m.indices), m.screen_name.as_deref()) {
            spans.push(EntitySpan::mention(start, end, name));
        }
    }
    for h in &entities.hashtags {
        if let (Some((start, end)), Some(tag)) = (bounds(&h.indices), h.text.as_deref()) {
            spans.push(EntitySpan::hashtag(start, end, tag));
        }
    }
    spans
}

/// Convert one v2 tweet, joining its author and media from `includes`.
pub fn post_from_v2(value: &Value, includes: Option<&Includes>) -> Result<Post> {
    let tweet: Tweet = serde_json::from_value(value.clone()).context("malformed v2 tweet")?;
    let author_id = tweet
        .author_id
        .as_deref()
        .with_context(|| format!("tweet {} has no author_id", tweet.id))?;
    let user = includes
        .and_then(|inc| inc.user(author_id))
        .with_context(|| format!("author {author_id} missing from includes"))?;

    let author = Account {
        id: user.id.clone(),
        handle: user.username.clone(),
        display_name: user.name.clone().unwrap_or_else(|| user.username.clone()),
        avatar_url: user.profile_image_url.clone().unwrap_or_default(),
    };

    // attachments.media_keys -> includes.media
    let media = match (&tweet.attachments, includes) {
        (Some(att), Some(inc)) => att
            .media_keys
            .iter()
            .filter_map(|k| inc.media(k))
            .filter_map(|m| {
                let kind = MediaKind::from_wire(m.kind.as_deref().unwrap_or(""));
                let url = m.url.clone().or_else(|| m.preview_image_url.clone())?;
                Some(Media {
                    url,
                    kind,
                    preview_url: m.preview_image_url.clone(),
                })
            })
            .collect(),
        _ => vec![],
    };

    Ok(Post {
        created_at: created_at_or_now(tweet.created_at.as_deref(), &tweet.id),
        entities: tweet.entities.as_ref().map(spans_from_v2).unwrap_or_default(),
        url: Post::permalink(&author.handle, &tweet.id),
        id: tweet.id,
        text: tweet.text,
        author,
        media,
    })
}

pub fn spans_from_v2(entities: &Entities) -> Vec<EntitySpan> {
    let mut spans = Vec::new();
    for u in &entities.urls {
        if u.start >= u.end {
            continue;
        }
        let Some(href) = u.expanded_url.as_deref().or(u.url.as_deref()) else {
            continue;
        };
        let display = u.display_url.as_deref().unwrap_or(href);
        spans.push(EntitySpan::url(u.start, u.end, display, href));
    }
    for m in &entities.mentions {
        if m.start < m.end {
            spans.push(EntitySpan::mention(m.start, m.end, &m.username));
        }
    }
    for h in &entities.hashtags {
        if h.start < h.end {
            spans.push(EntitySpan::hashtag(h.start, h.end, &h.tag));
        }
    }
    spans
}
