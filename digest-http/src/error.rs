use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::redact;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
    #[error("rate limited on every attempt ({attempts} attempts)")]
    RetriesExhausted { attempts: usize },
}

impl HttpError {
    /// Upstream status code behind the failure, if there was one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Api { status, .. } => Some(*status),
            HttpError::RetriesExhausted { .. } => Some(StatusCode::TOO_MANY_REQUESTS),
            _ => None,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ErrorBody {
    /// X API v2 problem list.
    errors: Vec<ErrorBody>,
    message: String,
    msg: String,
    detail: String,
    title: String,
    error: String,
}

impl ErrorBody {
    fn first_text(self) -> Option<String> {
        let own = [self.message, self.msg, self.detail, self.error, self.title]
            .into_iter()
            .find(|s| !s.trim().is_empty());
        own.or_else(|| self.errors.into_iter().find_map(ErrorBody::first_text))
    }
}

/// Best human-readable message from an error body.
pub(crate) fn api_message(body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::first_text)
        .unwrap_or_else(|| redact::snippet(body))
}
