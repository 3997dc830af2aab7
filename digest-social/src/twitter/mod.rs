//! Twitter/X digest pipeline.
//!
//! `resolve accounts -> batch search -> aggregate`, written once against the
//! [`TimelineBackend`] capability and instantiated with either
//! [`TwitterApiIo`] (followings-based) or [`XApi`] (static handle list).
pub mod aggregate;
pub mod backend;
pub mod extract;
pub mod fetcher;
pub mod io_client;
pub mod io_types;
pub mod model;
pub mod resolver;
pub mod types;
pub mod x_client;

pub use aggregate::{AuthorDigest, AuthorGroup, group_by_author};
pub use backend::{SearchPage, TimelineBackend, from_clause};
pub use fetcher::{BATCH_SIZE, DigestPipeline, MAX_PAGES_PER_BATCH, Pacing};
pub use io_client::TwitterApiIo;
pub use model::{Account, EntityKind, EntitySpan, Media, MediaKind, Post, normalize_handle};
pub use x_client::XApi;
