//! Loader for digest configuration with YAML + environment overlays.
//!
//! Sources are merged in this order, later ones winning:
//! 1. an optional or required YAML/TOML/JSON file (`digest.yaml` by default)
//! 2. inline snippets added with [`DigestConfigLoader::with_yaml_str`]
//! 3. `DIGEST__`-prefixed environment variables (`DIGEST__DIGEST__DAYS=3`)
//!
//! String values may reference `${VAR}` placeholders, expanded after merging.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

pub const DEFAULT_TWITTERAPI_IO_BASE: &str = "https://api.twitterapi.io";
pub const DEFAULT_X_API_BASE: &str = "https://api.twitter.com";
pub const DEFAULT_RESEND_BASE: &str = "https://api.resend.com";

#[derive(Debug, Clone, Deserialize)]
pub struct DigestConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub digest: DigestSettings,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub pacing: PacingSettings,
    #[serde(default)]
    pub email: EmailSettings,
    #[serde(default)]
    pub subscribers: SubscriberSettings,
}

/// Which upstream serves tweets; the tag is `kind`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// twitterapi.io: accounts come from the seed handle's followings.
    TwitterapiIo {
        api_key: String,
        #[serde(default)]
        seed_handle: String,
        #[serde(default = "default_twitterapi_io_base")]
        base_url: String,
    },
    /// Official X API v2: accounts come from a static handle list.
    XApi {
        bearer_token: String,
        #[serde(default = "default_handles_file")]
        handles_file: PathBuf,
        #[serde(default = "default_x_api_base")]
        base_url: String,
    },
}

impl BackendConfig {
    pub fn name(&self) -> &'static str {
        match self {
            BackendConfig::TwitterapiIo { .. } => "twitterapi_io",
            BackendConfig::XApi { .. } => "x_api",
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DigestSettings {
    /// Length of the digest window in days.
    #[serde(default = "default_days")]
    pub days: u32,
    #[serde(default = "default_max_accounts")]
    pub max_accounts: usize,
    /// IANA zone used when rendering timestamps.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            days: default_days(),
            max_accounts: default_max_accounts(),
            timezone: default_timezone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HttpSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Cooldowns between upstream calls.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PacingSettings {
    #[serde(default = "default_batch_cooldown_ms")]
    pub batch_cooldown_ms: u64,
    #[serde(default = "default_page_cooldown_ms")]
    pub page_cooldown_ms: u64,
    #[serde(default = "default_followings_cooldown_ms")]
    pub followings_cooldown_ms: u64,
}

impl PacingSettings {
    pub fn batch_cooldown(&self) -> Duration {
        Duration::from_millis(self.batch_cooldown_ms)
    }

    pub fn page_cooldown(&self) -> Duration {
        Duration::from_millis(self.page_cooldown_ms)
    }

    pub fn followings_cooldown(&self) -> Duration {
        Duration::from_millis(self.followings_cooldown_ms)
    }
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            batch_cooldown_ms: default_batch_cooldown_ms(),
            page_cooldown_ms: default_page_cooldown_ms(),
            followings_cooldown_ms: default_followings_cooldown_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EmailSettings {
    #[serde(default)]
    pub resend_api_key: String,
    #[serde(default)]
    pub from: String,
    /// Operator address: single-run recipient and target of failure notices.
    #[serde(default)]
    pub to: Option<String>,
    /// Public URL of the subscription site, used for unsubscribe links.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_resend_base")]
    pub api_base: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            resend_api_key: String::new(),
            from: String::new(),
            to: None,
            base_url: None,
            api_base: default_resend_base(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SubscriberSettings {
    #[serde(default = "default_subscribers_path")]
    pub path: PathBuf,
}

impl Default for SubscriberSettings {
    fn default() -> Self {
        Self {
            path: default_subscribers_path(),
        }
    }
}

fn default_twitterapi_io_base() -> String {
    DEFAULT_TWITTERAPI_IO_BASE.into()
}
fn default_x_api_base() -> String {
    DEFAULT_X_API_BASE.into()
}
fn default_resend_base() -> String {
    DEFAULT_RESEND_BASE.into()
}
fn default_handles_file() -> PathBuf {
    PathBuf::from("usernames.txt")
}
fn default_subscribers_path() -> PathBuf {
    PathBuf::from("data/subscribers.json")
}
fn default_days() -> u32 {
    1
}
fn default_max_accounts() -> usize {
    49
}
fn default_timezone() -> String {
    "UTC".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> usize {
    5
}
fn default_base_delay_ms() -> u64 {
    3000
}
fn default_batch_cooldown_ms() -> u64 {
    3000
}
fn default_page_cooldown_ms() -> u64 {
    2000
}
fn default_followings_cooldown_ms() -> u64 {
    1000
}

/// Empty, or an unexpanded `${VAR}` placeholder.
fn is_unset(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.starts_with("${")
}

impl DigestConfig {
    /// Check required values, reporting every missing one at once.
    ///
    /// ```
    /// use digest_config::DigestConfigLoader;
    ///
    /// let cfg = DigestConfigLoader::new()
    ///     .with_yaml_str("backend:\n  kind: twitterapi_io\n  api_key: ''\n")
    ///     .load()
    ///     .unwrap();
    /// let err = cfg.validate().unwrap_err().to_string();
    /// assert!(err.contains("backend.api_key"));
    /// assert!(err.contains("backend.seed_handle"));
    /// assert!(err.contains("email.from"));
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();

        match &self.backend {
            BackendConfig::TwitterapiIo {
                api_key,
                seed_handle,
                ..
            } => {
                if is_unset(api_key) {
                    missing.push("backend.api_key");
                }
                if is_unset(seed_handle) {
                    missing.push("backend.seed_handle");
                }
            }
            BackendConfig::XApi { bearer_token, .. } => {
                if is_unset(bearer_token) {
                    missing.push("backend.bearer_token");
                }
            }
        }

        if is_unset(&self.email.resend_api_key) {
            missing.push("email.resend_api_key");
        }
        if is_unset(&self.email.from) {
            missing.push("email.from");
        }

        if !missing.is_empty() {
            return Err(ConfigError::Message(format!(
                "missing required configuration: {}",
                missing.join(", ")
            )));
        }
        if self.digest.days == 0 {
            return Err(ConfigError::Message("digest.days must be at least 1".into()));
        }
        if self.digest.max_accounts == 0 {
            return Err(ConfigError::Message(
                "digest.max_accounts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Operator address, if configured and expanded.
    pub fn operator_email(&self) -> Option<&str> {
        self.email.to.as_deref().filter(|s| !is_unset(s))
    }

    /// Public site URL, if configured and expanded.
    pub fn public_base_url(&self) -> Option<&str> {
        self.email.base_url.as_deref().filter(|s| !is_unset(s))
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (files + env overrides).
pub struct DigestConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env: Option<Environment>,
}

impl Default for DigestConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DigestConfigLoader {
    /// Start with `DIGEST__` environment overrides only.
    ///
    /// ```
    /// use digest_config::{BackendConfig, DigestConfigLoader};
    ///
    /// let cfg = DigestConfigLoader::new()
    ///     .with_yaml_str("backend:\n  kind: x_api\n  bearer_token: t\n")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert!(matches!(cfg.backend, BackendConfig::XApi { .. }));
    /// assert_eq!(cfg.digest.days, 1);
    /// assert_eq!(cfg.digest.max_accounts, 49);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env: Some(
                Environment::with_prefix("DIGEST")
                    .separator("__")
                    .try_parsing(true),
            ),
        }
    }

    /// Skip environment overrides (tests, explicit files only).
    pub fn without_env(mut self) -> Self {
        self.env = None;
        self
    }

    /// Attach a required YAML/TOML/JSON file; the format is inferred from the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent (env-only deployments).
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders and deserialize.
    pub fn load(self) -> Result<DigestConfig, ConfigError> {
        let mut builder = self.builder;
        if let Some(env) = self.env {
            builder = builder.add_source(env);
        }
        let cfg = builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
