//! twitterapi.io backend: followings-based account resolution and
//! `advanced_search` batches.
//!
//! Auth is a plain `x-api-key` header. Search results carry no ordering
//! guarantee, so pages are never cut short on an old post.
use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use digest_http::{Auth, HttpClient, HttpError, RequestOpts};
use reqwest::header::{HeaderName, HeaderValue};

use crate::error::SocialError;
use crate::twitter::backend::{SearchPage, TimelineBackend, from_clause};
use crate::twitter::extract::post_from_io;
use crate::twitter::io_types::{IoFollowingsPage, IoSearchPage};

const FOLLOWINGS_PATH: &str = "twitter/user/followings";
const SEARCH_PATH: &str = "twitter/tweet/advanced_search";
/// Upper bound on followings pages for one seed account.
pub const MAX_FOLLOWINGS_PAGES: usize = 50;

#[derive(Clone)]
pub struct TwitterApiIo {
    http: HttpClient,
    api_key: String,
    seed_handle: String,
    followings_cooldown: Duration,
}

impl TwitterApiIo {
    pub fn new(http: HttpClient, api_key: impl Into<String>, seed_handle: &str) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            seed_handle: seed_handle.trim().trim_start_matches('@').to_string(),
            followings_cooldown: Duration::from_secs(1),
        }
    }

    pub fn with_followings_cooldown(mut self, cooldown: Duration) -> Self {
        self.followings_cooldown = cooldown;
        self
    }

    pub fn seed_handle(&self) -> &str {
        &self.seed_handle
    }

    fn auth(&self) -> Result<Auth<'_>, SocialError> {
        let value = HeaderValue::from_str(self.api_key.trim())
            .map_err(|e| HttpError::Build(format!("invalid api key header: {e}")))?;
        Ok(Auth::Header {
            name: HeaderName::from_static("x-api-key"),
            value,
        })
    }

    /// `(from:a OR from:b) -filter:replies -filter:retweets since:2024-11-28_12:00:00_UTC`
    pub fn search_query(handles: &[String], since: DateTime<Utc>) -> String {
        format!(
            "{} -filter:replies -filter:retweets since:{}",
            from_clause(handles),
            since.format("%Y-%m-%d_%H:%M:%S_UTC")
        )
    }

    /// Everyone the seed account follows, in upstream order.
    ///
    /// A failed page ends pagination with whatever was collected so far;
    /// the caller decides whether an empty result is fatal.
    pub async fn followings(&self) -> Result<Vec<String>, SocialError> {
        let mut handles = Vec::new();
        let mut cursor = String::new();

        for page in 1..=MAX_FOLLOWINGS_PAGES {
            if page > 1 && !self.followings_cooldown.is_zero() {
                tokio::time::sleep(self.followings_cooldown).await;
            }

            let opts = RequestOpts {
                auth: Some(self.auth()?),
                query: Some(vec![
                    ("userName", Cow::Borrowed(self.seed_handle.as_str())),
                    ("cursor", Cow::Borrowed(cursor.as_str())),
                ]),
                ..Default::default()
            };
            let body: IoFollowingsPage = match self.http.get_json(FOLLOWINGS_PATH, opts).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(seed = %self.seed_handle, page, error = %e, "followings.page_failed");
                    break;
                }
            };
            if body.paging.is_error() {
                tracing::warn!(
                    seed = %self.seed_handle,
                    page,
                    message = %body.paging.error_message(),
                    "followings.upstream_error"
                );
                break;
            }

            let before = handles.len();
            handles.extend(
                body.followings
                    .as_deref()
                    .unwrap_or(&[])
                    .iter()
                    .filter_map(|u| u.get("userName").and_then(|v| v.as_str()))
                    .filter(|h| !h.is_empty())
                    .map(str::to_string),
            );
            tracing::info!(
                seed = %self.seed_handle,
                page,
                added = handles.len() - before,
                total = handles.len(),
                "followings.page"
            );

            if !body.paging.has_next() {
                break;
            }
            match body.paging.cursor() {
                Some(next) => cursor = next,
                None => break,
            }
            if page == MAX_FOLLOWINGS_PAGES {
                tracing::warn!(seed = %self.seed_handle, "followings.page_cap_reached");
            }
        }

        Ok(handles)
    }
}

#[async_trait]
impl TimelineBackend for TwitterApiIo {
    fn name(&self) -> &'static str {
        "twitterapi_io"
    }

    fn account_source(&self) -> String {
        format!("followings of @{}", self.seed_handle)
    }

    async fn resolve_accounts(&self) -> Result<Vec<String>, SocialError> {
        self.followings().await
    }

    fn batch_query(&self, handles: &[String], since: DateTime<Utc>) -> String {
        Self::search_query(handles, since)
    }

    async fn search_page(
        &self,
        query: &str,
        _since: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<SearchPage, SocialError> {
        let opts = RequestOpts {
            auth: Some(self.auth()?),
            query: Some(vec![
                ("query", Cow::Borrowed(query)),
                ("queryType", Cow::Borrowed("Latest")),
                ("cursor", Cow::Borrowed(cursor.unwrap_or(""))),
            ]),
            ..Default::default()
        };
        let body: IoSearchPage = self.http.get_json(SEARCH_PATH, opts).await?;
        if body.paging.is_error() {
            return Err(SocialError::Upstream(body.paging.error_message()));
        }

        let raw = body.tweets.unwrap_or_default();
        let mut posts = Vec::with_capacity(raw.len());
        for value in &raw {
            match post_from_io(value) {
                Ok(post) => posts.push(post),
                Err(e) => tracing::warn!(error = %format!("{e:#}"), "search.post_skipped"),
            }
        }

        Ok(SearchPage {
            posts,
            raw_count: raw.len(),
            has_next_page: body.paging.has_next(),
            next_cursor: body.paging.cursor(),
            newest_first: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn query_encodes_handles_filters_and_window() {
        let since = Utc.with_ymd_and_hms(2024, 11, 28, 12, 0, 0).unwrap();
        let q = TwitterApiIo::search_query(&["a".into(), "b".into()], since);
        assert_eq!(
            q,
            "(from:a OR from:b) -filter:replies -filter:retweets since:2024-11-28_12:00:00_UTC"
        );
    }

    #[test]
    fn seed_handle_is_normalised() {
        let http = HttpClient::new("https://api.twitterapi.io").unwrap();
        let client = TwitterApiIo::new(http, "k", " @jack ");
        assert_eq!(client.seed_handle(), "jack");
    }
}
