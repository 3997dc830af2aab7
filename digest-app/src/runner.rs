//! Per-subscriber fetch, render and send.
//!
//! Each subscriber's whole sequence finishes before the next one starts. A
//! failure is logged, reported to the operator when one is configured, and
//! counted; it never stops the remaining subscribers.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use digest_common::{DigestError, DigestWindow};
use digest_mail::{DigestRenderer, MailError, MailTransport, send_failure_notice};
use digest_social::SocialError;
use digest_social::twitter::{DigestPipeline, Pacing, TimelineBackend};

use crate::subscribers::Subscriber;

/// Builds the backend for one digest from an optional subscriber handle.
pub type BackendFactory =
    Box<dyn Fn(Option<&str>) -> Result<Arc<dyn TimelineBackend>, DigestError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Sent { message_id: String, posts: usize },
    /// Nothing was posted in the window; no email went out.
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTally {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunTally {
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    fn record(&mut self, result: &Result<Outcome, DigestError>) {
        match result {
            Ok(Outcome::Sent { .. }) => self.succeeded += 1,
            Ok(Outcome::Skipped) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

fn classify(err: SocialError) -> DigestError {
    if err.is_resolution() {
        DigestError::Resolution(err.to_string())
    } else {
        DigestError::Fetch(err.to_string())
    }
}

pub struct Runner {
    backends: BackendFactory,
    transport: Arc<dyn MailTransport>,
    renderer: DigestRenderer,
    days: u32,
    max_accounts: usize,
    pacing: Pacing,
    operator: Option<String>,
}

impl Runner {
    pub fn new(
        backends: BackendFactory,
        transport: Arc<dyn MailTransport>,
        renderer: DigestRenderer,
    ) -> Self {
        Self {
            backends,
            transport,
            renderer,
            days: 1,
            max_accounts: 49,
            pacing: Pacing::default(),
            operator: None,
        }
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.days = days.max(1);
        self
    }

    pub fn with_max_accounts(mut self, max_accounts: usize) -> Self {
        self.max_accounts = max_accounts;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Address that receives failure notices.
    pub fn with_operator(mut self, operator: Option<String>) -> Self {
        self.operator = operator;
        self
    }

    /// One digest, without failure reporting.
    pub async fn digest_once(
        &self,
        handle: Option<&str>,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> Result<Outcome, DigestError> {
        let window = DigestWindow::trailing_days(now, self.days);
        let backend = (self.backends)(handle)?;
        let pipeline =
            DigestPipeline::new(backend, self.max_accounts).with_pacing(self.pacing);

        let digest = pipeline.run(window.start).await.map_err(classify)?;
        tracing::info!(
            backend = pipeline.backend_name(),
            posts = digest.total_posts(),
            authors = digest.groups().len(),
            "digest.fetched"
        );
        if digest.is_empty() {
            tracing::info!(recipient, "digest.skipped; no posts in window");
            return Ok(Outcome::Skipped);
        }

        let content = self.renderer.render(&digest, &window, Some(recipient));
        tracing::info!(subject = %content.subject, "digest.rendered");
        let message_id = self
            .transport
            .send(recipient, &content)
            .await
            .map_err(|e| match e {
                MailError::EmptyBody => DigestError::Render(e.to_string()),
                other => DigestError::Delivery(other.to_string()),
            })?;
        Ok(Outcome::Sent {
            message_id,
            posts: digest.total_posts(),
        })
    }

    /// One digest; on failure the operator gets a best-effort notice.
    pub async fn run_digest(
        &self,
        handle: Option<&str>,
        recipient: &str,
    ) -> Result<Outcome, DigestError> {
        let result = self.digest_once(handle, recipient, Utc::now()).await;
        if let Err(e) = &result {
            tracing::error!(
                handle = handle.unwrap_or("-"),
                recipient,
                kind = e.kind(),
                error = %e,
                "digest.failed"
            );
            if let Some(operator) = self.operator.as_deref() {
                send_failure_notice(self.transport.as_ref(), operator, &e.to_string(), e.kind())
                    .await;
            }
        }
        result
    }

    /// Every subscriber in order, one at a time.
    pub async fn run_all(&self, subscribers: &[Subscriber]) -> RunTally {
        let mut tally = RunTally::default();
        for (i, sub) in subscribers.iter().enumerate() {
            tracing::info!(
                n = i + 1,
                of = subscribers.len(),
                handle = %sub.twitter_handle,
                "run.subscriber.start"
            );
            let result = self
                .run_digest(Some(&sub.twitter_handle), &sub.email)
                .await;
            tally.record(&result);
        }
        tracing::info!(
            succeeded = tally.succeeded,
            skipped = tally.skipped,
            failed = tally.failed,
            "run.done"
        );
        tally
    }
}
