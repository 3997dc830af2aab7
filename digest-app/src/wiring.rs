//! Build clients, backends and the runner from [`DigestConfig`].
use std::sync::Arc;

use digest_common::{DigestError, Result};
use digest_config::{BackendConfig, DigestConfig};
use digest_http::{HttpClient, RetryPolicy};
use digest_mail::{DigestRenderer, MailTransport, ResendTransport};
use digest_social::twitter::{Pacing, TimelineBackend, TwitterApiIo, XApi};

use crate::runner::{BackendFactory, Runner};

pub fn http_client(cfg: &DigestConfig, base: &str) -> Result<HttpClient> {
    let client = HttpClient::new(base)
        .map_err(|e| DigestError::Config(format!("base url {base:?}: {e}")))?
        .with_timeout(cfg.http.timeout())
        .with_retry(RetryPolicy {
            max_attempts: cfg.http.max_attempts.max(1),
            base_delay: cfg.http.base_delay(),
        });
    Ok(client)
}

/// Backend for one digest. For twitterapi.io, `handle` (when given)
/// replaces the configured seed handle; the X API backend ignores it.
pub fn backend(
    cfg: &DigestConfig,
    handle: Option<&str>,
) -> Result<Arc<dyn TimelineBackend>> {
    match &cfg.backend {
        BackendConfig::TwitterapiIo {
            api_key,
            seed_handle,
            base_url,
        } => {
            let seed = handle
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .unwrap_or(seed_handle);
            if seed.trim().is_empty() {
                return Err(DigestError::Config(
                    "no handle given and backend.seed_handle is empty".into(),
                ));
            }
            let client = TwitterApiIo::new(http_client(cfg, base_url)?, api_key.clone(), seed)
                .with_followings_cooldown(cfg.pacing.followings_cooldown());
            Ok(Arc::new(client))
        }
        BackendConfig::XApi {
            bearer_token,
            handles_file,
            base_url,
        } => Ok(Arc::new(XApi::new(
            http_client(cfg, base_url)?,
            bearer_token.clone(),
            handles_file.clone(),
        ))),
    }
}

pub fn pacing(cfg: &DigestConfig) -> Pacing {
    Pacing {
        between_batches: cfg.pacing.batch_cooldown(),
        between_pages: cfg.pacing.page_cooldown(),
    }
}

pub fn transport(cfg: &DigestConfig) -> Result<Arc<dyn MailTransport>> {
    let http = http_client(cfg, &cfg.email.api_base)?;
    Ok(Arc::new(ResendTransport::new(
        http,
        cfg.email.resend_api_key.clone(),
        cfg.email.from.clone(),
    )))
}

pub fn runner(cfg: &DigestConfig) -> Result<Runner> {
    let shared = Arc::new(cfg.clone());
    let factory: BackendFactory = Box::new(move |handle: Option<&str>| backend(&shared, handle));
    let renderer =
        DigestRenderer::new(&cfg.digest.timezone).with_public_base_url(cfg.public_base_url());

    Ok(Runner::new(factory, transport(cfg)?, renderer)
        .with_days(cfg.digest.days)
        .with_max_accounts(cfg.digest.max_accounts)
        .with_pacing(pacing(cfg))
        .with_operator(cfg.operator_email().map(str::to_string)))
}
