//! Email delivery.
//!
//! [`MailTransport`] is the seam the runner talks to; [`ResendTransport`]
//! posts to the Resend HTTP API through the shared retrying client.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use digest_http::{Auth, HttpClient, HttpError, RequestOpts};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::EmailContent;

#[derive(Debug, Error)]
pub enum MailError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("invalid recipient address: {0:?}")]
    InvalidRecipient(String),
    #[error("email has neither an HTML nor a text body")]
    EmptyBody,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver `content` to `to`, returning the provider's message id.
    async fn send(&self, to: &str, content: &EmailContent) -> Result<String, MailError>;
}

#[derive(Debug, Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Clone)]
pub struct ResendTransport {
    http: HttpClient,
    api_key: String,
    from: String,
}

impl ResendTransport {
    pub fn new(http: HttpClient, api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    Some(s).filter(|s| !s.trim().is_empty())
}

#[async_trait]
impl MailTransport for ResendTransport {
    fn name(&self) -> &'static str {
        "resend"
    }

    async fn send(&self, to: &str, content: &EmailContent) -> Result<String, MailError> {
        let to = to.trim();
        if to.is_empty() || !to.contains('@') {
            return Err(MailError::InvalidRecipient(to.to_string()));
        }
        let payload = ResendEmail {
            from: &self.from,
            to: [to],
            subject: &content.subject,
            html: non_empty(&content.html_body),
            text: non_empty(&content.text_body),
        };
        if payload.html.is_none() && payload.text.is_none() {
            return Err(MailError::EmptyBody);
        }

        let resp: ResendResponse = self
            .http
            .post_json_opts(
                "emails",
                &payload,
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.api_key)),
                    ..Default::default()
                },
            )
            .await?;
        let id = resp.id.unwrap_or_else(|| "unknown".to_string());
        tracing::info!(transport = "resend", id = %id, subject = %content.subject, "mail.sent");
        Ok(id)
    }
}

/// Text-only notice telling the operator a digest could not be produced.
pub fn failure_notice(error: &str, kind: &str, at: DateTime<Utc>) -> EmailContent {
    EmailContent {
        subject: format!("❌ X Digest failed – {}", at.format("%b %d")),
        html_body: String::new(),
        text_body: format!(
            "Your X digest failed to generate.\n\n\
             Error: {error}\n\n\
             Error type: {kind}\n\n\
             Please check the logs for more details.\n\n\
             ---\n\
             This is an automated message from your X Digest bot.\n"
        ),
    }
}

/// Best effort: a failure to notify is logged and otherwise ignored.
pub async fn send_failure_notice(
    transport: &dyn MailTransport,
    to: &str,
    error: &str,
    kind: &str,
) -> bool {
    let notice = failure_notice(error, kind, Utc::now());
    match transport.send(to, &notice).await {
        Ok(id) => {
            tracing::info!(id = %id, "mail.failure_notice.sent");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "mail.failure_notice.failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn notice_carries_error_and_kind() {
        let at = Utc.with_ymd_and_hms(2024, 11, 29, 8, 0, 0).unwrap();
        let notice = failure_notice("no accounts", "Resolution", at);
        assert_eq!(notice.subject, "❌ X Digest failed – Nov 29");
        assert!(notice.html_body.is_empty());
        assert!(notice.text_body.contains("Error: no accounts"));
        assert!(notice.text_body.contains("Error type: Resolution"));
    }

    #[test]
    fn payload_omits_empty_html() {
        let payload = ResendEmail {
            from: "a@example.com",
            to: ["b@example.com"],
            subject: "s",
            html: non_empty(""),
            text: non_empty("body"),
        };
        let v = serde_json::to_value(&payload).unwrap();
        assert!(v.get("html").is_none());
        assert_eq!(v["to"], serde_json::json!(["b@example.com"]));
    }
}
