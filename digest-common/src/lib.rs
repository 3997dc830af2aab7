//! Common types and utilities shared across the digest crates.
//!
//! This crate holds the digest window, the per-subscriber error taxonomy,
//! and observability helpers. It stays dependency-light so every crate in
//! the workspace can pull it in.
//!
//! # Overview
//!
//! - [`DigestWindow`]: half-open `[start, end)` range of posts in one email
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`DigestError`] and [`Result`]: failures that abort one subscriber's run
//!
//! # Examples
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use digest_common::DigestWindow;
//!
//! let now = Utc.with_ymd_and_hms(2024, 11, 29, 12, 0, 0).unwrap();
//! let window = DigestWindow::trailing_days(now, 1);
//! assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 11, 28, 12, 0, 0).unwrap());
//! assert!(!window.contains(now));
//! ```
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub mod observability;

/// Time range covered by one digest email.
///
/// `start` is inclusive and `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DigestWindow {
    /// Window of the last `days` days ending at `now`.
    pub fn trailing_days(now: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: now - Duration::days(i64::from(days)),
            end: now,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Reasons a single subscriber's digest could not be produced or delivered.
///
/// Failures local to one post or one page never reach this type; they are
/// logged and absorbed where they happen.
#[derive(thiserror::Error, Debug)]
pub enum DigestError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No accounts could be resolved for the subscriber.
    #[error("Account resolution failed: {0}")]
    Resolution(String),

    /// Tweets could not be fetched at all.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// The email body could not be produced.
    #[error("Render failed: {0}")]
    Render(String),

    /// The transport rejected or failed to send the email.
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DigestError {
    /// Short machine-friendly label used in logs and failure notices.
    pub fn kind(&self) -> &'static str {
        match self {
            DigestError::Config(_) => "config",
            DigestError::Resolution(_) => "resolution",
            DigestError::Fetch(_) => "fetch",
            DigestError::Render(_) => "render",
            DigestError::Delivery(_) => "delivery",
            DigestError::Other(_) => "other",
        }
    }
}

/// Convenient alias for results that use [`DigestError`].
pub type Result<T> = std::result::Result<T, DigestError>;
