//! Dispatcher processor.
//!
//! The Dispatcher is responsible for:
//! - Receiving `PodpingEvent`s from the watcher
//! - Matching each URL against the shared `RuleSet`
//! - Enriching matched URLs with the podcast title (bounded by a timeout;
//!   lookup failures degrade to a placeholder name)
//! - Rendering the configured message template
//! - Emitting one `OutboundMessage` per (channel, url) pair
//! - For `live`/`liveEnd` podpings, verifying the feed's liveItem state
//!   and emitting a follow-up note when the feed disagrees
//!
//! The rule set lives behind `Arc<RwLock<..>>` so runtime subscription
//! commands and SIGHUP reloads are picked up without a restart.

use kanau::processor::Processor;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::events::{
    OutboundMessage, OutboundMessageSender, PodpingEvent, PodpingEventReceiver, PodpingReason,
};
use crate::live;
use crate::rules::RuleSet;
use crate::utils::url::encode_feed_url;

/// Default announcement template.
///
/// Recognized placeholders: `{title}`, `{url}`, `{reason}`, `{trx_id}`.
pub const DEFAULT_MESSAGE_FORMAT: &str =
    "Podping received: {title} {url} ({reason}) (tx: {trx_id})";

/// Title used when no metadata provider is configured or the lookup fails.
const UNKNOWN_PODCAST: &str = "Unknown Podcast";

/// Source of podcast titles for message enrichment.
///
/// The only implementation outside tests is the Podcast Index client; the
/// trait keeps the dispatcher testable without a network.
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// The podcast's title for a feed URL, or `None` when unknown.
    async fn podcast_title(&self, feed_url: &str) -> Option<String>;
}

#[async_trait::async_trait]
impl MetadataProvider for podcast_index::PodcastIndexClient {
    async fn podcast_title(&self, feed_url: &str) -> Option<String> {
        match self.lookup_by_feed_url(feed_url).await {
            Ok(Some(metadata)) => {
                let title = metadata.display_name().to_string();
                (!title.is_empty()).then_some(title)
            }
            Ok(None) => None,
            Err(e) => {
                debug!(url = %feed_url, error = %e, "Metadata lookup failed");
                None
            }
        }
    }
}

/// Dispatcher tuning knobs, all sourced from the config file.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Announcement template, see [`DEFAULT_MESSAGE_FORMAT`].
    pub message_format: String,
    /// Upper bound for metadata lookups and feed fetches.
    pub api_timeout: Duration,
    /// Whether live/liveEnd podpings trigger feed verification.
    pub verify_live_status: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            message_format: DEFAULT_MESSAGE_FORMAT.to_string(),
            api_timeout: Duration::from_secs(10),
            verify_live_status: true,
        }
    }
}

/// Dispatcher matches podpings to channels and formats announcements.
pub struct Dispatcher {
    rules: Arc<RwLock<RuleSet>>,
    metadata: Option<Arc<dyn MetadataProvider>>,
    outbound_tx: OutboundMessageSender,
    http_client: reqwest::Client,
    config: DispatcherConfig,
}

impl Dispatcher {
    /// Create a new Dispatcher.
    ///
    /// # Arguments
    ///
    /// * `rules` - shared rule set, also mutated by the IRC command layer
    /// * `metadata` - optional title source; `None` disables enrichment
    /// * `outbound_tx` - sender for formatted messages
    /// * `config` - template, timeout, and verification settings
    pub fn new(
        rules: Arc<RwLock<RuleSet>>,
        metadata: Option<Arc<dyn MetadataProvider>>,
        outbound_tx: OutboundMessageSender,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            rules,
            metadata,
            outbound_tx,
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            config,
        }
    }

    /// Run the Dispatcher until shutdown is signaled.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>, mut event_rx: PodpingEventReceiver) {
        info!("Dispatcher started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Dispatcher received shutdown signal");
                        break;
                    }
                }

                Some(event) = event_rx.recv() => {
                    let _ = self.process(event).await;
                }

                else => {
                    info!("PodpingEvent channel closed");
                    break;
                }
            }
        }

        info!("Dispatcher shutdown complete");
    }

    /// Render the announcement for one URL.
    async fn render_message(&self, url: &str, event: &PodpingEvent) -> String {
        let title = match &self.metadata {
            Some(provider) => {
                match tokio::time::timeout(self.config.api_timeout, provider.podcast_title(url))
                    .await
                {
                    Ok(Some(title)) => title,
                    Ok(None) => UNKNOWN_PODCAST.to_string(),
                    Err(_) => {
                        warn!(%url, "Timeout fetching metadata");
                        UNKNOWN_PODCAST.to_string()
                    }
                }
            }
            None => UNKNOWN_PODCAST.to_string(),
        };

        render_template(
            &self.config.message_format,
            &[
                ("title", title.as_str()),
                ("url", url),
                ("reason", &event.reason.to_string()),
                ("trx_id", &event.trx_id),
            ],
        )
    }

    /// Verify the feed against a live/liveEnd reason; `None` when the feed
    /// agrees and no follow-up is needed.
    async fn live_follow_up(&self, url: &str, reason: &PodpingReason) -> Option<String> {
        let fetch_url = encode_feed_url(url);
        let observed =
            match live::feed_has_live_item(&self.http_client, &fetch_url, self.config.api_timeout)
                .await
            {
                Ok(is_live) => Some(is_live),
                Err(e) => {
                    warn!(%url, error = %e, "Could not verify liveItem status");
                    None
                }
            };
        live::verification_note(reason, observed)
    }
}

impl Processor<PodpingEvent> for Dispatcher {
    type Output = ();
    type Error = Infallible;

    async fn process(&self, event: PodpingEvent) -> Result<(), Infallible> {
        debug!(
            trx_id = %event.trx_id,
            reason = %event.reason,
            urls = event.urls.len(),
            "Received podping"
        );

        // Resolve deliveries under the read lock, then drop it before any
        // network I/O.
        let deliveries: Vec<(String, String)> = {
            let rules = self.rules.read().await;
            event
                .urls
                .iter()
                .flat_map(|url| {
                    rules
                        .matches(url)
                        .into_iter()
                        .map(|channel| (channel.to_string(), url.clone()))
                        .collect::<Vec<_>>()
                })
                .collect()
        };

        if deliveries.is_empty() {
            debug!(trx_id = %event.trx_id, "No channel subscribed to any URL");
            return Ok(());
        }

        for (channel, url) in deliveries {
            let body = self.render_message(&url, &event).await;
            if self
                .outbound_tx
                .send(OutboundMessage {
                    channel: channel.clone(),
                    body,
                })
                .await
                .is_err()
            {
                warn!("Outbound channel closed, dropping deliveries");
                return Ok(());
            }

            if self.config.verify_live_status && event.reason.is_live_transition() {
                if let Some(note) = self.live_follow_up(&url, &event.reason).await {
                    let _ = self
                        .outbound_tx
                        .send(OutboundMessage {
                            channel,
                            body: format!("  -> {note}"),
                        })
                        .await;
                }
            }
        }

        Ok(())
    }
}

/// Replace `{key}` placeholders in a template.
///
/// Unknown placeholders are left in place so template typos stay visible.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::events::outbound_message_channel;
    use crate::rules::{RuleSet, RuleSpec};
    use std::collections::BTreeMap;

    struct FixedTitle(&'static str);

    #[async_trait::async_trait]
    impl MetadataProvider for FixedTitle {
        async fn podcast_title(&self, _feed_url: &str) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    fn shared_rules(channel: &str, pattern: &str) -> Arc<RwLock<RuleSet>> {
        let mut filters = BTreeMap::new();
        filters.insert(channel.to_string(), vec![RuleSpec::exact(pattern)]);
        Arc::new(RwLock::new(RuleSet::compile(&filters).unwrap()))
    }

    fn update_event(urls: &[&str]) -> PodpingEvent {
        PodpingEvent {
            trx_id: "deadbeef".to_string(),
            block_num: 1,
            reason: PodpingReason::Update,
            urls: urls.iter().map(|u| u.to_string()).collect(),
        }
    }

    fn test_config() -> DispatcherConfig {
        DispatcherConfig {
            verify_live_status: false,
            ..DispatcherConfig::default()
        }
    }

    #[tokio::test]
    async fn matched_podping_produces_announcement() {
        let (outbound_tx, mut outbound_rx) = outbound_message_channel();
        let dispatcher = Dispatcher::new(
            shared_rules("#podcasts", "https://example.com/feed.xml"),
            Some(Arc::new(FixedTitle("Example Show"))),
            outbound_tx,
            test_config(),
        );

        dispatcher
            .process(update_event(&["https://example.com/feed.xml"]))
            .await
            .unwrap();

        let message = outbound_rx.recv().await.unwrap();
        assert_eq!(message.channel, "#podcasts");
        assert_eq!(
            message.body,
            "Podping received: Example Show https://example.com/feed.xml (update) (tx: deadbeef)"
        );
    }

    #[tokio::test]
    async fn unmatched_podping_is_dropped() {
        let (outbound_tx, mut outbound_rx) = outbound_message_channel();
        let dispatcher = Dispatcher::new(
            shared_rules("#podcasts", "https://example.com/feed.xml"),
            None,
            outbound_tx,
            test_config(),
        );

        dispatcher
            .process(update_event(&["https://unrelated.org/feed.xml"]))
            .await
            .unwrap();

        assert!(outbound_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn missing_metadata_provider_uses_placeholder() {
        let (outbound_tx, mut outbound_rx) = outbound_message_channel();
        let dispatcher = Dispatcher::new(
            shared_rules("#podcasts", "https://example.com/feed.xml"),
            None,
            outbound_tx,
            test_config(),
        );

        dispatcher
            .process(update_event(&["https://example.com/feed.xml"]))
            .await
            .unwrap();

        let message = outbound_rx.recv().await.unwrap();
        assert!(message.body.contains("Unknown Podcast"));
    }

    #[tokio::test]
    async fn rule_changes_are_visible_without_restart() {
        let (outbound_tx, mut outbound_rx) = outbound_message_channel();
        let rules = shared_rules("#podcasts", "https://example.com/feed.xml");
        let dispatcher = Dispatcher::new(rules.clone(), None, outbound_tx, test_config());

        rules
            .write()
            .await
            .subscribe("#extra", RuleSpec::exact("https://new.example/feed.xml"))
            .unwrap();

        dispatcher
            .process(update_event(&["https://new.example/feed.xml"]))
            .await
            .unwrap();

        let message = outbound_rx.recv().await.unwrap();
        assert_eq!(message.channel, "#extra");
    }

    #[test]
    fn template_rendering_replaces_known_keys_only() {
        let rendered = render_template(
            "{title} | {url} | {missing}",
            &[("title", "A"), ("url", "B")],
        );
        assert_eq!(rendered, "A | B | {missing}");
    }
}
