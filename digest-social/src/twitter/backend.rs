//! The capability a backend must provide to drive [`DigestPipeline`].
//!
//! [`DigestPipeline`]: crate::twitter::DigestPipeline
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SocialError;
use crate::twitter::model::Post;

/// One page of search results, already normalised.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub posts: Vec<Post>,
    /// Items the upstream returned, including ones skipped as malformed.
    /// Zero means the page was empty.
    pub raw_count: usize,
    pub has_next_page: bool,
    pub next_cursor: Option<String>,
    /// The endpoint guarantees strictly descending `created_at`.
    pub newest_first: bool,
}

#[async_trait]
pub trait TimelineBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Where accounts come from, as shown when none resolve.
    fn account_source(&self) -> String {
        self.name().to_string()
    }

    /// Handles to track, in upstream order, before deduplication or bounding.
    async fn resolve_accounts(&self) -> Result<Vec<String>, SocialError>;

    /// Search query for posts by any of `handles`, excluding replies and
    /// reposts, created at or after `since`.
    fn batch_query(&self, handles: &[String], since: DateTime<Utc>) -> String;

    async fn search_page(
        &self,
        query: &str,
        since: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<SearchPage, SocialError>;
}

/// `(from:a OR from:b ...)`
pub fn from_clause(handles: &[String]) -> String {
    let parts: Vec<String> = handles.iter().map(|h| format!("from:{h}")).collect();
    format!("({})", parts.join(" OR "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_clause_joins_with_or() {
        let handles = vec!["a".to_string(), "b".to_string()];
        assert_eq!(from_clause(&handles), "(from:a OR from:b)");
        assert_eq!(from_clause(&handles[..1]), "(from:a)");
    }
}
