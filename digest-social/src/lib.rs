//! Upstream social clients and the digest fetch pipeline.
//!
//! The `twitter` module holds the post model, both backend implementations
//! (twitterapi.io and the official X API v2), account resolution, the batched
//! search fetcher and the per-author aggregator. Everything above it (rendering,
//! delivery) only sees [`twitter::AuthorDigest`].
pub mod error;
pub mod twitter;

pub use error::SocialError;
