//! Retrying JSON-over-HTTP client shared by the tweet backends and the mail
//! transport.
//!
//! Retry rules, applied per request:
//! - `429 Too Many Requests`: wait `base_delay * 2^attempt`, then retry
//! - network failure (connect, timeout, body read): wait `base_delay`, then
//!   retry, but only for idempotent methods. A POST may already have reached
//!   the server, so its first network failure is final.
//! - any other non-2xx status: fail at once
//!
//! When the attempt budget runs out on 429s the result is
//! [`HttpError::RetriesExhausted`]; a final network failure is returned as
//! [`HttpError::Network`]. Secrets never reach the logs. Setting
//! `DIGEST_HTTP_RAW=1` adds a redacted curl line and the response body at
//! the `http.raw` target.
//!
//! ```no_run
//! # async fn demo() -> Result<(), digest_http::HttpError> {
//! let client = digest_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", digest_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```

mod error;
mod redact;

pub use error::HttpError;

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::sleep;

/// How a request authenticates.
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// `Authorization: Bearer <token>`. Quotes and whitespace around or
    /// inside the token are stripped first.
    Bearer(&'a str),
    /// A custom header such as `x-api-key`.
    Header { name: HeaderName, value: HeaderValue },
}

impl Auth<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Auth::Bearer(_) => "bearer",
            Auth::Header { .. } => "header",
        }
    }
}

/// How often and how patiently a request is retried.
///
/// ```
/// use digest_http::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts, 5);
/// assert_eq!(policy.rate_limit_delay(0), Duration::from_secs(3));
/// assert_eq!(policy.rate_limit_delay(2), Duration::from_secs(12));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: usize,
    /// Fixed delay after a network failure and the base of the 429 backoff.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Backoff after the `attempt`-th (0-based) rate-limited response.
    pub fn rate_limit_delay(&self, attempt: usize) -> Duration {
        let exp = u32::try_from(attempt).unwrap_or(u32::MAX).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }

    /// Delay after a network-level failure. Not exponential.
    pub fn network_delay(&self) -> Duration {
        self.base_delay
    }
}

/// Per-request options.
///
/// ```
/// use digest_http::{Auth, RequestOpts};
/// use std::borrow::Cow;
///
/// let opts = RequestOpts {
///     auth: Some(Auth::Bearer("token")),
///     query: Some(vec![("max_results", Cow::Borrowed("100"))]),
///     attempts: Some(1),
///     ..Default::default()
/// };
/// assert!(opts.timeout.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    /// Overrides [`RetryPolicy::max_attempts`] for this request.
    pub attempts: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
}

/// Everything needed to send one attempt, computed once per request.
struct Prepared {
    method: Method,
    url: Url,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    timeout: Duration,
    max_attempts: usize,
    /// Whether a network failure may be retried.
    retry_network: bool,
    auth_kind: &'static str,
}

impl Prepared {
    fn endpoint(&self) -> String {
        format!("{}{}", self.url.host_str().unwrap_or("-"), self.url.path())
    }
}

/// Result of a single attempt.
enum Attempt<T> {
    Done(Result<T, HttpError>),
    Network(String),
    RateLimited,
}

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> String {
    format!("r{}", REQUEST_SEQ.fetch_add(1, Ordering::Relaxed))
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub retry: RetryPolicy,
}

impl HttpClient {
    /// Client rooted at `base`; request paths are joined onto it.
    pub fn new(base: &str) -> Result<Self, HttpError> {
        // Without a trailing slash `join` would replace the last segment.
        let rooted = format!("{}/", base.trim().trim_end_matches('/'));
        let base = Url::parse(&rooted).map_err(|e| HttpError::Url(format!("{base:?}: {e}")))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let prepared = self.prepare::<()>(Method::GET, path, None, opts)?;
        self.execute(&prepared).await
    }

    pub async fn post_json_opts<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let prepared = self.prepare(Method::POST, path, Some(body), opts)?;
        self.execute(&prepared).await
    }

    fn prepare<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<Prepared, HttpError>
    where
        B: Serialize + ?Sized,
    {
        let url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|e| HttpError::Url(e.to_string()))?;

        let mut headers = opts.headers.unwrap_or_default();
        let auth_kind = opts.auth.as_ref().map_or("none", Auth::kind);
        match opts.auth {
            Some(Auth::Bearer(token)) => {
                let mut value = bearer_header(token)?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Some(Auth::Header { name, mut value }) => {
                value.set_sensitive(true);
                headers.insert(name, value);
            }
            None => {}
        }

        let body = match body {
            Some(b) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Some(serde_json::to_vec(b).map_err(|e| HttpError::Build(format!("json body: {e}")))?)
            }
            None => None,
        };

        let query = opts
            .query
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.into_owned()))
            .collect();

        Ok(Prepared {
            retry_network: method.is_idempotent(),
            method,
            url,
            query,
            headers,
            body,
            timeout: opts.timeout.unwrap_or(self.default_timeout),
            max_attempts: opts.attempts.unwrap_or(self.retry.max_attempts).max(1),
            auth_kind,
        })
    }

    async fn execute<T: DeserializeOwned>(&self, req: &Prepared) -> Result<T, HttpError> {
        for attempt in 0..req.max_attempts {
            let last = attempt + 1 == req.max_attempts;
            let wait = match self.attempt(req, attempt).await {
                Attempt::Done(result) => return result,
                Attempt::Network(message) if last => return Err(HttpError::Network(message)),
                Attempt::Network(message) if !req.retry_network => {
                    tracing::warn!(
                        method = %req.method,
                        endpoint = %req.endpoint(),
                        %message,
                        "http.network_error.not_retried"
                    );
                    return Err(HttpError::Network(message));
                }
                Attempt::Network(message) => {
                    let delay = self.retry.network_delay();
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = req.max_attempts,
                        backoff_ms = delay.as_millis() as u64,
                        %message,
                        "http.retrying.network"
                    );
                    delay
                }
                Attempt::RateLimited if last => break,
                Attempt::RateLimited => {
                    let delay = self.retry.rate_limit_delay(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = req.max_attempts,
                        backoff_ms = delay.as_millis() as u64,
                        "http.retrying.rate_limited"
                    );
                    delay
                }
            };
            sleep(wait).await;
        }

        tracing::warn!(
            max_attempts = req.max_attempts,
            endpoint = %req.endpoint(),
            "http.retries_exhausted"
        );
        Err(HttpError::RetriesExhausted {
            attempts: req.max_attempts,
        })
    }

    async fn attempt<T: DeserializeOwned>(&self, req: &Prepared, attempt: usize) -> Attempt<T> {
        let req_id = next_request_id();
        tracing::debug!(
            %req_id,
            attempt = attempt + 1,
            max_attempts = req.max_attempts,
            method = %req.method,
            endpoint = %req.endpoint(),
            query = ?redact::params(&req.query),
            auth_kind = req.auth_kind,
            "http.request.start"
        );
        let raw = redact::raw_enabled();
        if raw {
            let curl = redact::curl(
                &req.method,
                &req.url,
                &req.query,
                &req.headers,
                req.body.as_deref(),
            );
            tracing::debug!(target: "http.raw", %req_id, %curl, "request");
        }

        let mut rb = self
            .inner
            .request(req.method.clone(), req.url.clone())
            .timeout(req.timeout)
            .headers(req.headers.clone());
        if !req.query.is_empty() {
            rb = rb.query(&req.query);
        }
        if let Some(body) = &req.body {
            rb = rb.body(body.clone());
        }

        let started = Instant::now();
        let resp = match rb.send().await {
            Ok(resp) => resp,
            Err(e) => return Attempt::Network(e.to_string()),
        };
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return Attempt::Network(e.to_string()),
        };

        let request_id = header_str(&headers, "x-request-id")
            .or_else(|| header_str(&headers, "x-correlation-id"))
            .unwrap_or("-")
            .to_string();
        tracing::debug!(
            %req_id,
            %status,
            duration_ms = started.elapsed().as_millis() as u64,
            body_len = bytes.len(),
            x_request_id = %request_id,
            rate_limit.remaining = ?header_str(&headers, "x-rate-limit-remaining"),
            rate_limit.reset = ?header_str(&headers, "x-rate-limit-reset"),
            "http.response"
        );
        if raw {
            let shown = &bytes[..bytes.len().min(redact::RAW_MAX_BODY)];
            tracing::info!(
                target: "http.raw",
                %req_id,
                headers = ?redact::headers(&headers),
                body = %String::from_utf8_lossy(shown),
                truncated = bytes.len() > redact::RAW_MAX_BODY,
                "response"
            );
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::RateLimited;
        }
        if !status.is_success() {
            let message = error::api_message(&bytes);
            tracing::warn!(%req_id, %status, %message, x_request_id = %request_id, "http.error");
            return Attempt::Done(Err(HttpError::Api {
                status,
                message,
                request_id,
            }));
        }

        Attempt::Done(serde_json::from_slice::<T>(&bytes).map_err(|e| {
            let snippet = redact::snippet(&bytes);
            tracing::warn!(
                %req_id,
                line = e.line(),
                column = e.column(),
                error = %e,
                body_snippet = %snippet,
                "http.response.decode_error"
            );
            HttpError::Decode(e.to_string(), snippet)
        }))
    }
}

/// `Bearer <token>` with quotes and ASCII whitespace removed from the token.
fn bearer_header(raw: &str) -> Result<HeaderValue, HttpError> {
    let token: String = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if token.is_empty() {
        return Err(HttpError::Build("bearer token is empty".into()));
    }
    if !token.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(HttpError::Build(
            "bearer token has non-ASCII or control characters".into(),
        ));
    }
    HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))
}
