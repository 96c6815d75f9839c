//! Relaybot CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use relaybot::conversation::{DialogHistory, SnippetCache};
use relaybot::dispatcher::{DispatcherSettings, MessageDispatcher};
use relaybot::llm::LlmManager;
use relaybot::messaging::{MessagingDyn, TelegramAdapter};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relaybot")]
#[command(about = "Telegram bot that relays conversations to an OpenAI-compatible API")]
struct Cli {
    /// Path to config file (optional, environment variables still apply)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.debug {
            EnvFilter::new("info,relaybot=debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("starting relaybot");

    let config = if let Some(config_path) = cli.config {
        relaybot::config::Config::load_from_path(&config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        relaybot::config::Config::load()
            .with_context(|| "failed to load configuration from environment")?
    };

    let llm = Arc::new(
        LlmManager::new(&config.llm).with_context(|| "failed to initialize LLM manager")?,
    );
    tracing::info!(
        model = llm.model(),
        keys = llm.key_count(),
        base_url = %config.llm.base_url,
        "LLM manager initialized"
    );

    let messaging: Arc<dyn MessagingDyn> =
        Arc::new(TelegramAdapter::new(config.telegram.token.clone()));
    let inbound = messaging
        .start()
        .await
        .with_context(|| "failed to start telegram adapter")?;

    if config.telegram.channel_id.is_none() {
        tracing::warn!("no channel configured, membership gate is disabled");
    }

    let dispatcher = Arc::new(MessageDispatcher::new(
        messaging.clone(),
        llm,
        DialogHistory::new(config.bot.history_capacity),
        SnippetCache::new(config.bot.snippet_capacity, config.bot.snippet_ttl),
        DispatcherSettings::from_config(&config),
    ));

    tracing::info!("relaybot started");

    tokio::select! {
        _ = dispatcher.run(inbound) => {
            tracing::info!("inbound stream closed");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    tracing::info!("shutting down...");
    if let Err(error) = messaging.shutdown().await {
        tracing::warn!(%error, "failed to shut down telegram adapter");
    }

    tracing::info!("relaybot stopped");
    Ok(())
}
