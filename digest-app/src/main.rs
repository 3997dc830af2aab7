//! `xdigest`: fetch recent posts from followed accounts and email a digest.
//!
//! ```bash
//! xdigest run --handle nasa --to me@example.com
//! xdigest run-all
//! xdigest subscribers add nasa reader@example.com
//! xdigest check-config
//! ```
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use digest_common::observability::{LogConfig, LogFormat, init_logging};
use digest_config::{DigestConfig, DigestConfigLoader};

use runner::Outcome;
use subscribers::{AddOutcome, Subscriber, SubscriberStore};

mod runner;
mod subscribers;
mod wiring;

#[derive(Parser)]
#[command(name = "xdigest", version, about = "Email digests of recent posts on X")]
struct Cli {
    /// Configuration file (YAML). Missing is fine; env vars can carry everything.
    #[arg(long, global = true, default_value = "digest.yaml")]
    config: PathBuf,

    /// `text` or `json`.
    #[arg(long, global = true, env = "DIGEST_LOG_FORMAT", default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build and send one digest.
    Run {
        /// Account whose followings are digested (defaults to backend.seed_handle).
        #[arg(long)]
        handle: Option<String>,
        /// Recipient (defaults to email.to).
        #[arg(long)]
        to: Option<String>,
    },
    /// Send a digest to every active subscriber, one after another.
    RunAll,
    /// Manage the subscriber registry.
    Subscribers {
        /// Registry file, overriding subscribers.path.
        #[arg(long)]
        store: Option<PathBuf>,
        #[command(subcommand)]
        action: SubscriberAction,
    },
    /// Load and validate configuration, then exit.
    CheckConfig,
}

#[derive(Subcommand)]
enum SubscriberAction {
    List,
    Add { handle: String, email: String },
    Remove { email: String },
}

fn load_config(path: &Path) -> Result<DigestConfig> {
    DigestConfigLoader::new()
        .with_optional_file(path)
        .load()
        .with_context(|| format!("loading configuration ({})", path.display()))
}

fn load_validated(path: &Path) -> Result<DigestConfig> {
    let cfg = load_config(path)?;
    cfg.validate()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_path = init_logging(LogConfig {
        format: LogFormat::parse(&cli.log_format),
        ..LogConfig::default()
    })?;
    tracing::debug!(path = %log_path.display(), "logging.ready");

    match cli.command {
        Command::Run { handle, to } => {
            let cfg = load_validated(&cli.config)?;
            let Some(recipient) = to.or_else(|| cfg.operator_email().map(str::to_string)) else {
                bail!("no recipient: pass --to or set email.to");
            };
            let runner = wiring::runner(&cfg)?;
            match runner.run_digest(handle.as_deref(), &recipient).await? {
                Outcome::Sent { message_id, posts } => {
                    println!("sent {posts} posts to {recipient} (id {message_id})");
                }
                Outcome::Skipped => println!("no posts in window; nothing sent"),
            }
        }
        Command::RunAll => {
            let cfg = load_validated(&cli.config)?;
            let store = SubscriberStore::new(&cfg.subscribers.path);
            let subs = store.all_active();
            if subs.is_empty() {
                tracing::warn!(path = %store.path().display(), "run.no_subscribers");
                println!("no active subscribers");
                return Ok(());
            }
            let tally = wiring::runner(&cfg)?.run_all(&subs).await;
            println!(
                "{} sent, {} skipped, {} failed (of {})",
                tally.succeeded,
                tally.skipped,
                tally.failed,
                tally.total()
            );
            if tally.failed > 0 {
                bail!("{} of {} digests failed", tally.failed, tally.total());
            }
        }
        Command::Subscribers { store, action } => {
            let path = match store {
                Some(path) => path,
                None => load_config(&cli.config)?.subscribers.path,
            };
            let store = SubscriberStore::new(path);
            match action {
                SubscriberAction::List => {
                    let active = store.all_active();
                    for s in &active {
                        println!("@{}\t{}\t{}", s.twitter_handle, s.email, s.subscribed_at);
                    }
                    println!("{} active", active.len());
                }
                SubscriberAction::Add { handle, email } => {
                    let sub = Subscriber::new(&handle, &email);
                    if sub.twitter_handle.is_empty() || !sub.email.contains('@') {
                        bail!("need a handle and a valid email");
                    }
                    match store.add(sub)? {
                        AddOutcome::Added => println!("added {email}"),
                        AddOutcome::Updated => println!("updated {email}"),
                        AddOutcome::Unchanged => println!("{email} already subscribed"),
                    }
                }
                SubscriberAction::Remove { email } => {
                    let Some(sub) = store.get_by_email(&email) else {
                        bail!("no subscriber with email {email}");
                    };
                    store.deactivate(&sub.email)?;
                    println!("unsubscribed {} (@{})", sub.email, sub.twitter_handle);
                }
            }
        }
        Command::CheckConfig => {
            let cfg = load_validated(&cli.config)?;
            println!(
                "ok: backend={} days={} max_accounts={} timezone={}",
                cfg.backend.name(),
                cfg.digest.days,
                cfg.digest.max_accounts,
                cfg.digest.timezone
            );
        }
    }
    Ok(())
}
