use std::path::PathBuf;

use digest_http::HttpError;
use thiserror::Error;

/// Failures surfaced by the fetch pipeline.
///
/// Errors for a single post or a single page are absorbed and logged inside
/// the pipeline; only the variants below ever reach a caller.
#[derive(Debug, Error)]
pub enum SocialError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("upstream reported an error: {0}")]
    Upstream(String),
    #[error("no accounts resolved from {origin}; check that source and the API credentials")]
    NoAccounts { origin: String },
    #[error("could not read handle list {}: {source}", path.display())]
    HandleList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("all {batches} search batches failed")]
    AllBatchesFailed { batches: usize },
}

impl SocialError {
    /// Whether this failure means no accounts could be determined at all.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            SocialError::NoAccounts { .. } | SocialError::HandleList { .. }
        )
    }
}
