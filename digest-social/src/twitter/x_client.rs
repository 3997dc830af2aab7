//! Official X API v2 backend: static handle list plus `/2/tweets/search/recent`.
//!
//! Recent search only reaches back seven days, so `start_time` is clamped
//! into that window. `sort_order=recency` makes pages strictly newest-first,
//! which lets the fetcher stop paginating at the first post older than the
//! digest window.
use std::borrow::Cow;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use digest_http::{Auth, HttpClient, RequestOpts};

use crate::error::SocialError;
use crate::twitter::backend::{SearchPage, TimelineBackend, from_clause};
use crate::twitter::extract::post_from_v2;
use crate::twitter::resolver::load_handle_list;
use crate::twitter::types::SearchResponse;

const SEARCH_PATH: &str = "2/tweets/search/recent";
const TWEET_FIELDS: &str = "created_at,entities,attachments,author_id";
const USER_FIELDS: &str = "name,username,profile_image_url";
const MEDIA_FIELDS: &str = "url,preview_image_url,type";

#[derive(Clone)]
pub struct XApi {
    http: HttpClient,
    bearer: String,
    handles_file: PathBuf,
}

impl XApi {
    pub fn new(http: HttpClient, bearer_token: impl Into<String>, handles_file: PathBuf) -> Self {
        Self {
            http,
            bearer: bearer_token.into(),
            handles_file,
        }
    }

    /// `(from:a OR from:b) -is:retweet -is:reply`; the window goes in `start_time`.
    pub fn search_query(handles: &[String]) -> String {
        format!("{} -is:retweet -is:reply", from_clause(handles))
    }

    /// `since`, moved forward if it falls outside the recent-search window.
    fn start_time(since: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        // Some slack so the request stays inside the window by the time it lands.
        let earliest = now - Duration::days(7) + Duration::minutes(1);
        since.max(earliest)
    }
}

#[async_trait]
impl TimelineBackend for XApi {
    fn name(&self) -> &'static str {
        "x_api"
    }

    fn account_source(&self) -> String {
        format!("handle list {}", self.handles_file.display())
    }

    async fn resolve_accounts(&self) -> Result<Vec<String>, SocialError> {
        load_handle_list(&self.handles_file).await
    }

    fn batch_query(&self, handles: &[String], _since: DateTime<Utc>) -> String {
        Self::search_query(handles)
    }

    async fn search_page(
        &self,
        query: &str,
        since: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<SearchPage, SocialError> {
        let start = Self::start_time(since, Utc::now());
        let mut params: Vec<(&str, Cow<'_, str>)> = vec![
            ("query", Cow::Borrowed(query)),
            (
                "start_time",
                start.to_rfc3339_opts(SecondsFormat::Secs, true).into(),
            ),
            ("max_results", Cow::Borrowed("100")),
            ("sort_order", Cow::Borrowed("recency")),
            ("expansions", Cow::Borrowed("author_id,attachments.media_keys")),
            ("tweet.fields", Cow::Borrowed(TWEET_FIELDS)),
            ("user.fields", Cow::Borrowed(USER_FIELDS)),
            ("media.fields", Cow::Borrowed(MEDIA_FIELDS)),
        ];
        if let Some(token) = cursor {
            params.push(("next_token", Cow::Borrowed(token)));
        }

        let resp: SearchResponse = self
            .http
            .get_json(
                SEARCH_PATH,
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.bearer)),
                    query: Some(params),
                    ..Default::default()
                },
            )
            .await?;

        if !resp.errors.is_empty() {
            tracing::debug!(count = resp.errors.len(), "search.partial_errors");
        }

        let raw = resp.data;
        let mut posts = Vec::with_capacity(raw.len());
        for value in &raw {
            match post_from_v2(value, Some(&resp.includes)) {
                Ok(post) => posts.push(post),
                Err(e) => tracing::warn!(error = %format!("{e:#}"), "search.post_skipped"),
            }
        }

        let next_token = resp.meta.next_token.filter(|t| !t.is_empty());
        Ok(SearchPage {
            posts,
            raw_count: raw.len(),
            has_next_page: next_token.is_some(),
            next_cursor: next_token,
            newest_first: true,
        })
    }
}
