//! Batched search over the tracked accounts.
//!
//! Accounts are split into batches of [`BATCH_SIZE`] so the generated query
//! stays under upstream length limits; each batch is one query paginated by
//! cursor, capped at [`MAX_PAGES_PER_BATCH`] pages. Requests are awaited one
//! at a time: batches in partition order, pages in cursor order.
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::SocialError;
use crate::twitter::aggregate::{AuthorDigest, group_by_author};
use crate::twitter::backend::TimelineBackend;
use crate::twitter::model::Post;
use crate::twitter::resolver::bound_accounts;

pub const BATCH_SIZE: usize = 20;
pub const MAX_PAGES_PER_BATCH: usize = 10;

/// Cooldowns that keep a run under upstream rate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub between_batches: Duration,
    pub between_pages: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            between_batches: Duration::from_secs(3),
            between_pages: Duration::from_secs(2),
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            between_batches: Duration::ZERO,
            between_pages: Duration::ZERO,
        }
    }
}

/// Why pagination of a batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    NoNextPage,
    NoCursor,
    EmptyPage,
    PageCap,
    ReachedOlder,
    RequestFailed,
}

/// Result of paginating one batch query.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub posts: Vec<Post>,
    pub pages: usize,
    pub stop: StopReason,
}

impl BatchOutcome {
    /// The very first page failed, so nothing is known about this batch.
    pub fn failed(&self) -> bool {
        self.stop == StopReason::RequestFailed && self.pages == 0
    }
}

/// `resolve -> bound -> fetch -> aggregate`, over any [`TimelineBackend`].
///
/// The backend is handed in at construction and lives as long as the
/// pipeline, typically one subscriber's run.
pub struct DigestPipeline {
    backend: Arc<dyn TimelineBackend>,
    max_accounts: usize,
    pacing: Pacing,
}

impl DigestPipeline {
    pub fn new(backend: Arc<dyn TimelineBackend>, max_accounts: usize) -> Self {
        Self {
            backend,
            max_accounts,
            pacing: Pacing::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Tracked handles, deduplicated and capped at `max_accounts`.
    pub async fn resolve_accounts(&self) -> Result<Vec<String>, SocialError> {
        let handles = self.backend.resolve_accounts().await?;
        bound_accounts(handles, self.max_accounts, &self.backend.account_source())
    }

    /// Every post by `accounts` since `since`, in fetch order.
    ///
    /// Fails only when every batch failed on its first page.
    pub async fn fetch(
        &self,
        accounts: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<Post>, SocialError> {
        let batches: Vec<&[String]> = accounts.chunks(BATCH_SIZE).collect();
        let total = batches.len();
        let mut posts = Vec::new();
        let mut failed = 0usize;

        for (i, batch) in batches.iter().enumerate() {
            if i > 0 && !self.pacing.between_batches.is_zero() {
                tokio::time::sleep(self.pacing.between_batches).await;
            }
            tracing::info!(
                backend = self.backend.name(),
                batch = i + 1,
                total,
                handles = batch.len(),
                "fetch.batch.start"
            );

            let outcome = self.search_batch(batch, since).await;
            if outcome.failed() {
                failed += 1;
            }
            tracing::info!(
                batch = i + 1,
                total,
                pages = outcome.pages,
                posts = outcome.posts.len(),
                stop = ?outcome.stop,
                "fetch.batch.done"
            );
            posts.extend(outcome.posts);
        }

        if total > 0 && failed == total {
            return Err(SocialError::AllBatchesFailed { batches: total });
        }
        tracing::info!(batches = total, posts = posts.len(), "fetch.done");
        Ok(posts)
    }

    /// Paginate one batch query until the upstream runs out, a page fails,
    /// or the page cap is hit.
    pub async fn search_batch(&self, batch: &[String], since: DateTime<Utc>) -> BatchOutcome {
        let query = self.backend.batch_query(batch, since);
        let mut cursor: Option<String> = None;
        let mut posts = Vec::new();
        let mut pages = 0usize;

        let stop = loop {
            if pages >= MAX_PAGES_PER_BATCH {
                break StopReason::PageCap;
            }
            if pages > 0 && !self.pacing.between_pages.is_zero() {
                tokio::time::sleep(self.pacing.between_pages).await;
            }

            let page = match self
                .backend
                .search_page(&query, since, cursor.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(page = pages + 1, error = %e, "fetch.page_failed");
                    break StopReason::RequestFailed;
                }
            };
            pages += 1;

            let mut reached_older = false;
            for post in page.posts {
                if page.newest_first && post.created_at < since {
                    reached_older = true;
                    break;
                }
                posts.push(post);
            }

            if reached_older {
                break StopReason::ReachedOlder;
            }
            if page.raw_count == 0 {
                break StopReason::EmptyPage;
            }
            if !page.has_next_page {
                break StopReason::NoNextPage;
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break StopReason::NoCursor,
            }
        };

        tracing::debug!(pages, posts = posts.len(), stop = ?stop, "fetch.batch.stopped");
        BatchOutcome { posts, pages, stop }
    }

    /// Resolve, fetch and group in one call.
    pub async fn run(&self, since: DateTime<Utc>) -> Result<AuthorDigest, SocialError> {
        let accounts = self.resolve_accounts().await?;
        tracing::info!(
            backend = self.backend.name(),
            accounts = accounts.len(),
            since = %since,
            "pipeline.accounts_resolved"
        );
        let posts = self.fetch(&accounts, since).await?;
        Ok(group_by_author(posts))
    }
}
