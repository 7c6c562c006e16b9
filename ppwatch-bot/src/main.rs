//! ppwatch
//!
//! IRC bot that watches the Hive blockchain for podpings and announces
//! matching feed updates to subscribed channels.

mod bot;
mod commands;
mod config;
mod shutdown;

use bot::IrcBot;
use clap::Parser;
use config::{ConfigLoader, MetadataSetup};
use ppwatch_core::events::{outbound_message_channel, podping_event_channel};
use ppwatch_core::processors::{Dispatcher, DispatcherConfig, HiveWatcher, MetadataProvider};
use shutdown::{shutdown_signal, spawn_config_reload_handler};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// ppwatch - Podping-to-IRC notification bot
#[derive(Parser, Debug)]
#[command(name = "ppwatch")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    let config_path = match resolve_config_path(args.config) {
        Ok(path) => path,
        Err(usage) => {
            eprintln!("{usage}");
            std::process::exit(1);
        }
    };

    tracing::info!("Starting ppwatch v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&config_path));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", config_path);

    let config = loaded_config.file;
    let rules = Arc::new(RwLock::new(loaded_config.rules));

    // Shutdown fan-out and the pipeline channels
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (event_tx, event_rx) = podping_event_channel();
    let (outbound_tx, outbound_rx) = outbound_message_channel();

    // Optional Podcast Index metadata provider
    let metadata: Option<Arc<dyn MetadataProvider>> = match config.podcast_index.metadata_client()
    {
        MetadataSetup::Configured(client) => {
            tracing::info!("Podcast Index client initialized");
            Some(Arc::new(client))
        }
        MetadataSetup::Disabled => {
            tracing::warn!("Podcast Index not configured, metadata unavailable");
            None
        }
        MetadataSetup::Invalid(e) => {
            tracing::error!("Invalid Podcast Index configuration: {}", e);
            return Err(e.into());
        }
    };

    // Spawn the watcher
    let watcher = HiveWatcher::new(
        config.hive.nodes.clone(),
        Duration::from_secs(config.hive.poll_interval_secs),
        event_tx,
    );
    let watcher_handle = tokio::spawn(watcher.run(shutdown_rx.clone()));

    // Spawn the dispatcher
    let dispatcher = Dispatcher::new(
        rules.clone(),
        metadata,
        outbound_tx,
        DispatcherConfig {
            message_format: config.message.format.clone(),
            api_timeout: Duration::from_secs(config.api_timeout_secs),
            verify_live_status: config.verify_live_status,
        },
    );
    let dispatcher_handle = tokio::spawn(dispatcher.run(shutdown_rx.clone(), event_rx));

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify = spawn_config_reload_handler(rules.clone(), config_loader);

    // Translate SIGTERM/SIGINT into the shutdown watch channel
    let signal_shutdown_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = signal_shutdown_tx.send(true);
    });

    // Connect and run the bot
    let irc_bot = IrcBot::connect(&config, rules).await.map_err(|e| {
        tracing::error!("Failed to connect to IRC: {}", e);
        e
    })?;
    let result = irc_bot.run(shutdown_rx, outbound_rx).await;

    // Stop the pipeline whether the bot exited cleanly or not
    let _ = shutdown_tx.send(true);
    reload_notify.notify_one();
    let _ = watcher_handle.await;
    let _ = dispatcher_handle.await;

    tracing::info!("ppwatch shutdown complete");
    result
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,irc=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

const USAGE: &str = "Usage: ppwatch --config <path> (or set CONFIG_FILE)";

/// The config path from `--config` or the `CONFIG_FILE` env var (clap folds
/// both into `Args::config`). No path at all is a usage error; the caller
/// prints it to stderr and exits 1.
fn resolve_config_path(config: Option<PathBuf>) -> Result<PathBuf, &'static str> {
    config.ok_or(USAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_path_is_a_usage_error() {
        let err = resolve_config_path(None).expect_err("no path is an error");
        assert!(err.starts_with("Usage:"));
        assert!(err.contains("--config"));
        assert!(err.contains("CONFIG_FILE"));
    }

    #[test]
    fn provided_config_path_passes_through() {
        let path = resolve_config_path(Some(PathBuf::from("/etc/ppwatch.json")))
            .expect("path resolves");
        assert_eq!(path, PathBuf::from("/etc/ppwatch.json"));
    }

    #[test]
    fn config_flag_parses_into_args() {
        let args = Args::parse_from(["ppwatch", "--config", "/tmp/bot.json"]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/bot.json")));
    }
}
